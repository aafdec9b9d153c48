//! Camp Tracker — entry point.
//!
//! Receives forwarded clan-bot webhook payloads, keeps per-contributor
//! weekly material totals in a durable JSON store, rolls the week over
//! every Saturday 00:00 local, and posts summary embeds back to a Discord
//! webhook.  Exposes a small Axum REST API for stats and administration.

mod api;
mod config;
mod errors;
mod ingest;
mod notify;
mod parse;
mod payload;
mod scheduler;
mod store;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use reqwest::Client;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use notify::DiscordNotifier;
use store::{AggregateStore, JsonFileStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    // Load config from environment.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;
    info!(
        "Camp tracker starting. DISCORD_WEBHOOK={}, ADMIN_SECRET={}",
        if config.discord_webhook.is_some() { "[set]" } else { "[MISSING]" },
        if config.admin_secret.is_some() { "[set]" } else { "[MISSING]" },
    );

    // Load durable state (missing file initialises empty and persists).
    let store = Arc::new(AggregateStore::open(Arc::new(JsonFileStore::new(
        &config.data_file,
    )))?);

    // Outbound notifications get a bounded timeout; a slow Discord must
    // not hold the inbound request path past it.
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(config.notify_timeout_secs))
        .build()?;
    let notifier: Arc<dyn notify::Notifier> = Arc::new(DiscordNotifier::new(
        client,
        config.discord_webhook.clone(),
    ));

    // ─── Weekly rollover task ─────────────────────────────
    let _rollover_task = scheduler::spawn_weekly_rollover(store.clone(), notifier.clone());

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(api::ApiState {
        store,
        notifier,
        admin_secret: config.admin_secret.clone(),
        label_priority: config.amount_label_priority,
    });

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/syn-county", post(api::receive_webhook))
        .route("/stats/user/:id", get(api::user_stats))
        .route("/stats/top", get(api::top_stats))
        .route("/admin/reset", post(api::admin_reset))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(api_state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
