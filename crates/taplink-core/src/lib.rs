pub mod constants;
pub mod error;
pub mod state;
pub mod types;

pub use error::{Error, Result};
pub use state::{ReaderState, ReaderStatus, ReportOutcome};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
