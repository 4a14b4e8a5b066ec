use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use viewonce_relay::client::ClientConnector;
use viewonce_relay::pairing::{PhonePrompt, PresetPrompt, StdinPrompt};
use viewonce_relay::store::{JsonFileRegistry, MultiFileAuthStore};
use viewonce_relay::{liveness, logging, Config, SessionManager};

#[derive(Parser)]
#[command(name = "viewonce-relay")]
#[command(about = "Forwards view-once media received on a linked WhatsApp device to its owner")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to relay.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, overrides the configured one
    #[arg(long)]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    logging::init(cli.log.as_deref().unwrap_or(&config.logging.filter));
    logging::install_panic_hook();

    if config.http.enabled {
        let listener = liveness::bind(config.http_addr()?).await?;
        logging::spawn_logged("liveness", liveness::serve(listener));
    }

    let prompt: Arc<dyn PhonePrompt> = match &config.session.phone_number {
        Some(number) => Arc::new(PresetPrompt(number.clone())),
        None => Arc::new(StdinPrompt::default()),
    };
    let mut manager = SessionManager::new(
        Arc::new(ClientConnector::new()),
        Arc::new(MultiFileAuthStore::new(&config.session.auth_dir)),
        Arc::new(JsonFileRegistry::new(&config.registry.path)),
        prompt,
    )
    .with_browser(config.session.browser.clone());

    let supervisor = tokio::spawn(async move {
        match manager.run().await {
            Ok(halt) => tracing::warn!(?halt, "session supervisor stopped"),
            Err(e) => tracing::error!(error = %e, "session supervisor failed"),
        }
    });

    tracing::info!("relay running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    tracing::info!("shutting down");
    supervisor.abort();
    Ok(())
}
