//! Core domain + application logic for the Reflex engagement bot.
//!
//! This crate is framework-agnostic. Telegram and the Reflex HTTP API live
//! behind ports (traits); the Telegram side is implemented in `reflex-telegram`.

pub mod ads;
pub mod admin;
pub mod api;
pub mod broadcast;
pub mod cadence;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod locks;
pub mod logging;
pub mod media_group;
pub mod messaging;
pub mod ports;
pub mod upload;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
