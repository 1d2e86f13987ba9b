use sentinel_frontend::api::{self, ApiState};
use sentinel_frontend::config::AppConfig;
use sentinel_frontend::discord::{
    spawn_reaction_dispatch, DiscordRest, DiscordStatusSurface, Gateway, REACTION_QUEUE_SIZE,
};
use sentinel_frontend::logging;

use sentinel_backend::query::GameQueryClient;
use sentinel_backend::rating::{HttpRatingSink, RatingLedger, ReactionIntake};
use sentinel_backend::roster::RosterEnricher;
use sentinel_backend::scheduled::{
    ScheduledTaskConfig, ScheduledTaskManager, StatusPipeline, StatusScheduler,
};
use sentinel_backend::status::{DisplayStateStore, EmbedRenderer};

use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = AppConfig::from_file(&config_path)?;

    let _logging_guard = logging::init_logging("logs", "sentinel", &config.log_level)?;

    tracing::info!("Sentinel starting (config: {})", config_path);

    let rest = Arc::new(DiscordRest::new(&config.discord.api_base, &config.discord.token)?);
    let (presence_tx, presence_rx) = watch::channel(None);
    let status_surface = Arc::new(DiscordStatusSurface::new(
        rest.clone(),
        &config.discord.status_channel_id,
        presence_tx,
    ));

    // Status pipeline
    let query = Arc::new(GameQueryClient::new(&config.game_server));
    let enricher = config
        .game_server
        .roster_export_path
        .as_ref()
        .map(RosterEnricher::new);
    if enricher.is_none() {
        tracing::info!("No roster export configured, using the query roster");
    }
    let scheduler = Arc::new(
        StatusScheduler::new(
            StatusPipeline::new(query, enricher),
            EmbedRenderer::new(&config.status),
            status_surface,
            DisplayStateStore::new(&config.status.state_file),
        )
        .await?,
    );

    // Reaction voting
    let (ledger, reactions_tx) = match &config.rating {
        Some(rating_config) => {
            let ledger = Arc::new(RatingLedger::new(rating_config.entry_ttl()?));
            let sink = Arc::new(HttpRatingSink::new(rating_config)?);
            let intake = Arc::new(ReactionIntake::new(
                ledger.clone(),
                rest.clone(),
                sink,
                rating_config.member_role_id.clone(),
            ));
            let (tx, rx) = mpsc::channel(REACTION_QUEUE_SIZE);
            spawn_reaction_dispatch(intake, rx);
            tracing::info!("✓ Reaction voting enabled ({})", rating_config.endpoint_base);
            (Some(ledger), Some(tx))
        }
        None => {
            tracing::info!("No [rating] section, reaction voting disabled");
            (None, None)
        }
    };

    let gateway_handle = Gateway::new(
        &config.discord.gateway_url,
        &config.discord.token,
        presence_rx,
        reactions_tx,
    )
    .start();
    tracing::info!("✓ Gateway task started");

    let task_config = ScheduledTaskConfig {
        poll_interval_secs: config.status.poll_interval_secs,
        ..ScheduledTaskConfig::default()
    };
    let mut task_manager = ScheduledTaskManager::new(task_config, scheduler.clone());
    if let Some(ledger) = &ledger {
        task_manager = task_manager.with_ledger(ledger.clone());
    }
    task_manager.start_all();

    let api_state = ApiState {
        scheduler,
        ledger,
        reactions: rest,
    };
    let api_addr = config.api.listen_address();
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, &api_addr).await {
            tracing::error!("Control API error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received.");

    task_manager.shutdown().await;
    gateway_handle.abort();

    Ok(())
}
