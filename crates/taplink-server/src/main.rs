use anyhow::Context;
use clap::Parser;
use taplink_server::config::ServerConfig;
use taplink_server::session::SessionManager;
use taplink_server::{keys, net};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::parse();

    // Unusable key material is the one startup condition worth dying for.
    let material = keys::load_or_bootstrap(&config.keys)
        .with_context(|| format!("loading key material from {}", config.keys.display()))?;

    let (manager, sessions) = SessionManager::new(material);
    tokio::spawn(manager.run());

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(
        addr = %config.bind,
        reader_path = %config.reader_path,
        "taplink server listening"
    );

    net::run(listener, config.reader_path, sessions)
        .await
        .context("accept loop failed")?;
    Ok(())
}
