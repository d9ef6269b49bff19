use alert_relay::fetcher::build_client;
use alert_relay::{
    handle_trigger, AlertRelay, FanOut, HttpFeedFetcher, MemoryWatermarkStore, NotifySink,
    PgWatermarkStore, RelayConfig, WatermarkStore, WebhookSink,
};
use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "alert-relay", about = "Relay newly published alert bulletins to webhook endpoints")]
struct Cli {
    /// Trigger event payload (JSON). Only logged.
    #[arg(long)]
    event: Option<String>,

    /// Render messages without delivering them or committing watermarks.
    #[arg(long)]
    dry_run: bool,

    /// Keep watermarks in memory instead of Postgres.
    #[arg(long)]
    memory_store: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("alert_relay=info".parse()?))
        .init();

    let cli = Cli::parse();
    info!("Starting alert relay");

    let config = RelayConfig::from_env()?;
    config.log_redacted();

    let fetcher = Arc::new(HttpFeedFetcher::new(config.fetch.clone())?);

    let store: Arc<dyn WatermarkStore> = if cli.memory_store {
        warn!("Using in-memory watermarks; nothing persists past this run");
        Arc::new(MemoryWatermarkStore::new())
    } else {
        let database_url = config
            .database_url
            .as_deref()
            .context("DATABASE_URL is required unless --memory-store is given")?;
        let store = PgWatermarkStore::connect(
            database_url,
            config.watermark_resource.clone(),
            config.watermark_prefix.clone(),
        )
        .await
        .context("Failed to connect to the watermark database")?;
        store.migrate().await?;
        Arc::new(store)
    };

    let http = build_client(&config.fetch)?;
    let sinks = config
        .webhook_urls
        .iter()
        .map(|url| Ok(Box::new(WebhookSink::new(url.clone(), http.clone())?) as Box<dyn NotifySink>))
        .collect::<alert_relay::Result<Vec<_>>>()?;
    if sinks.is_empty() {
        warn!("No WEBHOOK_URLS configured; new alerts advance watermarks without being delivered");
    }

    let relay = AlertRelay::from_config(&config, fetcher, store, FanOut::new(sinks))?
        .with_dry_run(cli.dry_run);

    let event = match cli.event {
        Some(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        None => Value::Null,
    };

    let response = handle_trigger(&relay, &event).await;
    println!("{}", serde_json::to_string(&response)?);

    info!("Alert relay finished");
    Ok(())
}
