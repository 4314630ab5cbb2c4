use std::sync::Arc;

use reflex_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), reflex_core::Error> {
    reflex_core::logging::init("reflex")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(
        broadcast_at = %cfg.broadcast_time,
        ad_cadence = cfg.ad_cadence,
        "starting reflex bot"
    );

    reflex_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| reflex_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
