//! HTTP client for the Reflex profile/advertising API.

pub mod client;
pub mod types;

pub use client::ApiClient;
