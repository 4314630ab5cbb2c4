use std::{sync::Arc, time::Duration};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use reflex_core::{
    ads::AdRenderer,
    admin::CampaignAdmin,
    api::ApiClient,
    broadcast::{BroadcastConfig, Broadcaster},
    cadence::CadenceGate,
    config::Config,
    media_group::MediaGroupDebouncer,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    ports::{MediaResolver, ProfileApi},
    upload::{InMemorySessionStore, UploadFlow},
};

use crate::handlers::{self, photo::PendingPhoto};
use crate::TelegramMessenger;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub messenger: Arc<dyn MessagingPort>,
    pub profiles: Arc<dyn ProfileApi>,
    pub uploads: Arc<UploadFlow>,
    pub cadence: Arc<CadenceGate>,
    pub ads: Arc<AdRenderer>,
    pub broadcaster: Broadcaster,
    pub campaigns: Arc<CampaignAdmin>,
    pub photos: Arc<MediaGroupDebouncer<PendingPhoto>>,
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "bot started"),
        Err(e) => warn!(error = %e, "get_me failed"),
    }
    info!(api = %cfg.api_url, admins = cfg.admin_ids.len(), "configuration loaded");

    let api = Arc::new(ApiClient::new(cfg.api_url.clone())?);
    let telegram = Arc::new(TelegramMessenger::new(bot.clone()));

    // Broadcasts fan out over the whole user base; the throttle keeps them
    // under Telegram's flood limits. RetryAfter is still retried below it.
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        telegram.clone(),
        ThrottleConfig::default(),
    ));
    let resolver: Arc<dyn MediaResolver> = telegram;

    let uploads = Arc::new(UploadFlow::new(
        api.clone(),
        resolver,
        Arc::new(InMemorySessionStore::default()),
        cfg.session_idle_ttl,
    ));
    let shutdown = CancellationToken::new();
    uploads.spawn_sweeper(SWEEP_INTERVAL, shutdown.clone());

    let ads = Arc::new(AdRenderer::new(api.clone(), messenger.clone()));
    let broadcaster = Broadcaster::new(
        BroadcastConfig {
            daily_at: cfg.broadcast_time,
            throttle: cfg.broadcast_throttle,
            concurrency: cfg.broadcast_concurrency,
        },
        api.clone(),
        ads.clone(),
    );
    broadcaster.start_daily().await;

    let photos = handlers::photo::debouncer(
        cfg.media_group_timeout,
        uploads.clone(),
        messenger.clone(),
    );

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        messenger,
        profiles: api.clone(),
        uploads,
        cadence: Arc::new(CadenceGate::in_memory(cfg.ad_cadence)),
        ads,
        broadcaster: broadcaster.clone(),
        campaigns: Arc::new(CampaignAdmin::new(api, cfg.admin_api_token.clone())),
        photos,
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    shutdown.cancel();
    broadcaster.stop().await;
    info!("bot stopped");
    Ok(())
}
