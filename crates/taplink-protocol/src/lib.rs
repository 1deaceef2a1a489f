//! Wire protocol for the taplink relay.
//!
//! Both connection directions exchange UTF-8 text frames holding a single
//! JSON envelope of the form `{"type": "...", ...}`. Each direction is
//! modeled as a closed sum type with an explicit `Unknown` variant, so an
//! unrecognized tag is a handled case rather than a silent default.

pub mod command;
pub mod keys;
pub mod message;

pub use command::{CommandKind, CommandPayload, EnrollKeys, ReaderBound, build_command};
pub use keys::{KeyLookup, KeyMaterial};
pub use message::{
    CommandResultPayload, ReaderMessage, ResultLogs, ServerEvent, UiMessage, parse_reader_message,
    parse_ui_message,
};
