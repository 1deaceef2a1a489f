use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Command validation errors, surfaced to the issuing UI session only
    #[error("Reader not connected.")]
    ReaderUnavailable,

    #[error("No card present to execute command.")]
    NoCardPresent,

    #[error("Unknown command received: {0}")]
    UnknownCommand(String),

    #[error("Missing keys in key material for enrollment: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error(
        "Invalid hex format or length (must be 32 hex chars / 16 bytes) for keys: {}",
        .0.join(", ")
    )]
    InvalidKeyFormat(Vec<String>),

    #[error("A command is already in flight: {0}")]
    CommandPending(String),

    #[error("Failed to send command to reader: {0}")]
    SendFailed(String),

    // Connection/message errors, absorbed locally
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    // Shape validation
    #[error("Invalid card UID: {0}")]
    InvalidCardUid(String),

    // Startup errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
