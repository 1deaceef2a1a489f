//! Shared constants for the taplink relay.
//!
//! Key names and lengths mirror what the reader firmware expects on the
//! wire, so changing them breaks compatibility with deployed readers.

/// Number of log lines retained in the in-memory ring.
///
/// Oldest entries are evicted once the ring is full. New UI clients
/// receive the current ring contents as their `log_history` snapshot.
pub const LOG_RING_CAPACITY: usize = 100;

/// Length in bytes of every card key.
pub const KEY_LENGTH: usize = 16;

/// Length in hex characters of every card key (2 per byte).
pub const KEY_HEX_LENGTH: usize = KEY_LENGTH * 2;

/// Key slot used by the reader for authentication commands.
pub const AUTH_KEY_SLOT: u8 = 1;

/// Key material entries required by the `enroll` command, in wire order.
pub const ENROLL_KEY_NAMES: [&str; 6] = [
    "masterKey",
    "authKey",
    "readKey",
    "writeKey",
    "changeKey",
    "defaultKey",
];

/// Key material entry required by the `authenticate` command.
pub const AUTH_KEY_NAME: &str = "authKey";

/// Reserved key-file entry carrying an operator warning, never a key.
pub const WARNING_KEY: &str = "WARNING";

/// Request path that classifies an inbound connection as the reader.
///
/// Every other path is treated as a UI client.
pub const DEFAULT_READER_PATH: &str = "/reader";

/// Default listen address for the relay.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Default key material file.
pub const DEFAULT_KEYS_FILE: &str = "keys.json";

/// Maximum accepted card UID length in bytes.
///
/// UIDs are opaque reader-supplied strings kept verbatim; the cap only
/// stops a misbehaving peer from stuffing unbounded input into state and
/// command payloads. ISO 14443 UIDs with separators stay far below it.
pub const MAX_UID_LENGTH: usize = 128;
