//! taplink relay server.
//!
//! Mediates between a single NFC reader device and any number of browser
//! UI clients over WebSocket connections. All mutable state (reader
//! ownership, card presence, UI session set, log ring) lives inside one
//! [`session::SessionManager`] task; connection tasks only translate
//! socket I/O into events for it.

pub mod config;
pub mod dispatch;
pub mod keys;
pub mod log_ring;
pub mod net;
pub mod session;
