//! Reference CLI for the iHuman SDK: logs live execution events.
//!
//! Authenticates when credentials are given, opens the live connection,
//! subscribes to the execution (if any), and logs every event until
//! Ctrl-C.
//!
//! Usage:
//!   IHUMAN_EMAIL=a@b.com IHUMAN_PASSWORD=pw ih-watch <execution-id>
//!
//! Env vars:
//!   IHUMAN_BASE_URL  — service address (default: http://localhost:5173)
//!   IHUMAN_API_KEY   — static API key, used when not logged in
//!   RUST_LOG         — log filter (default: info)

use std::path::PathBuf;

use clap::Parser;
use ih_sdk::{ClientConfig, EventKind, IhumanClient};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ih-watch", version, about = "Watch live iHuman execution events")]
struct Cli {
    /// Execution to subscribe to. Without it, only connection events show.
    execution_id: Option<String>,

    /// TOML file with client settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Service address; overrides the config file and IHUMAN_BASE_URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Static API key; overrides the config file and IHUMAN_API_KEY.
    #[arg(long)]
    api_key: Option<String>,

    #[arg(long, env = "IHUMAN_EMAIL")]
    email: Option<String>,

    #[arg(long, env = "IHUMAN_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Exit instead of reconnecting when the socket drops.
    #[arg(long)]
    no_reconnect: bool,
}

impl Cli {
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        }
        .apply_env();

        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone());
        }
        if self.no_reconnect {
            config.auto_reconnect = false;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.client_config()?;
    tracing::info!(base_url = %config.base_url, sdk = IhumanClient::version(), "starting");

    let client = IhumanClient::new(config)?;
    for kind in EventKind::ALL {
        client.on(kind, move |event| {
            tracing::info!(event = kind.as_str(), payload = %event.payload(), "event");
        });
    }

    match (&cli.email, &cli.password) {
        (Some(email), Some(password)) => {
            let user = client.authenticate(email, password).await?;
            tracing::info!(user_id = %user.id, "logged in");
        }
        (Some(_), None) | (None, Some(_)) => {
            anyhow::bail!("--email and --password must be given together");
        }
        (None, None) => {}
    }

    client.connect(cli.execution_id.as_deref()).await?;
    if let Some(id) = &cli.execution_id {
        client.subscribe(id).await?;
    }

    let mut state = client.watch_connection();
    tokio::select! {
        r = tokio::signal::ctrl_c() => {
            r?;
            tracing::info!("interrupted, closing");
        }
        // Only returns when reconnect is off (or gives up) and the socket is gone.
        _ = state.wait_for(|s| *s == ih_sdk::ConnectionState::Disconnected) => {
            tracing::info!("connection closed");
        }
    }

    client.close().await;
    Ok(())
}
