use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use taplink_core::constants::{DEFAULT_BIND_ADDR, DEFAULT_KEYS_FILE, DEFAULT_READER_PATH};

/// Relay between one NFC reader device and browser UI clients.
#[derive(Debug, Clone, Parser)]
#[command(name = "taplink-server", version)]
pub struct ServerConfig {
    /// Address to listen on for WebSocket connections
    #[arg(long, default_value = DEFAULT_BIND_ADDR)]
    pub bind: SocketAddr,

    /// Key material file (JSON map of key name to 32-char hex string)
    #[arg(long, default_value = DEFAULT_KEYS_FILE)]
    pub keys: PathBuf,

    /// Request path that classifies a connection as the reader; all other
    /// paths are treated as UI clients
    #[arg(long, default_value = DEFAULT_READER_PATH)]
    pub reader_path: String,
}
