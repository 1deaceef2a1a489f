//! Reader connection and card-presence state.
//!
//! A single [`ReaderState`] exists per relay process. It is owned by the
//! session manager and mutated only through the methods here, which encode
//! the full transition table for reader connect/disconnect events and
//! card-presence reports. Each mutating method returns what changed so the
//! caller can decide whether a status broadcast is due; redundant reports
//! (same card re-announced) deliberately produce no outcome, suppressing
//! broadcast traffic.
//!
//! # States
//!
//! - `WaitingForReader`: no reader connection is owned
//! - `WaitingForCard`: a reader is connected, no card on the antenna
//! - `CardPresent`: a reader is connected and a card UID is known
//!
//! # Invariant
//!
//! `current_card_uid` is non-null only while `reader_connected` is true and
//! `status` is `CardPresent`.

use crate::types::CardUid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reader lifecycle status, serialized in the wire format the UI expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReaderStatus {
    /// No reader connection is currently owned.
    WaitingForReader,

    /// A reader is connected and idle, no card on the antenna.
    WaitingForCard,

    /// A reader is connected and a card is present.
    CardPresent,
}

impl ReaderStatus {
    /// Returns `true` if a card is currently present.
    #[must_use]
    pub fn is_card_present(self) -> bool {
        matches!(self, ReaderStatus::CardPresent)
    }
}

impl fmt::Display for ReaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status_str = match self {
            ReaderStatus::WaitingForReader => "WAITING_FOR_READER",
            ReaderStatus::WaitingForCard => "WAITING_FOR_CARD",
            ReaderStatus::CardPresent => "CARD_PRESENT",
        };
        write!(f, "{status_str}")
    }
}

/// Outcome of applying a card-presence report to [`ReaderState`].
///
/// Tells the caller which log line and broadcast (if any) the report
/// warrants. `Unchanged` covers both the silent `last_seen` refresh for a
/// re-announced card and reports that arrive while no reader state applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// A card appeared, or a different card replaced the previous one.
    CardPresented(CardUid),

    /// The previously present card left the antenna.
    CardRemoved(CardUid),

    /// No card is present and the status was forced back to
    /// `WaitingForCard` from some other value.
    Corrected,

    /// Nothing observable changed; no broadcast is due.
    Unchanged,
}

impl ReportOutcome {
    /// Returns `true` if the outcome warrants a status broadcast.
    #[must_use]
    pub fn changed(&self) -> bool {
        !matches!(self, ReportOutcome::Unchanged)
    }
}

/// Snapshot of the reader connection and card presence, broadcast to UI
/// clients as the `status_update` payload.
///
/// Field names on the wire match what deployed UI bundles consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderState {
    /// Current lifecycle status.
    #[serde(rename = "readerStatus")]
    pub status: ReaderStatus,

    /// UID of the card on the antenna, if any.
    pub current_card_uid: Option<CardUid>,

    /// Epoch milliseconds of the last report received from the reader.
    pub last_seen: Option<i64>,

    /// Whether a live reader connection is currently owned.
    pub reader_connected: bool,
}

impl ReaderState {
    /// Initial state before any reader has connected.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: ReaderStatus::WaitingForReader,
            current_card_uid: None,
            last_seen: None,
            reader_connected: false,
        }
    }

    /// A reader connection was accepted; assume it is ready for a card.
    ///
    /// Card state is reset: the new connection has not reported yet, so any
    /// UID from a previous connection is stale.
    pub fn attach_reader(&mut self) {
        self.reader_connected = true;
        self.status = ReaderStatus::WaitingForCard;
        self.current_card_uid = None;
    }

    /// The owned reader connection was lost or replaced.
    pub fn detach_reader(&mut self) {
        self.reader_connected = false;
        self.status = ReaderStatus::WaitingForReader;
        self.current_card_uid = None;
    }

    /// Apply a card-presence report from the reader.
    ///
    /// `now_ms` is recorded as `last_seen` for every report, with or
    /// without a card. The returned [`ReportOutcome`] says whether the
    /// report changed anything observable:
    ///
    /// - A new or different UID moves to `CardPresent`
    /// - A repeated identical UID refreshes `last_seen` only
    /// - A no-card report clears a present card back to `WaitingForCard`
    /// - A no-card report with any other status (while connected) forces
    ///   `WaitingForCard`
    pub fn apply_report(&mut self, uid: Option<CardUid>, now_ms: i64) -> ReportOutcome {
        self.last_seen = Some(now_ms);

        match uid {
            Some(uid) => {
                if self.current_card_uid.as_ref() != Some(&uid) {
                    self.current_card_uid = Some(uid.clone());
                    self.status = ReaderStatus::CardPresent;
                    ReportOutcome::CardPresented(uid)
                } else {
                    ReportOutcome::Unchanged
                }
            }
            None => {
                if let Some(removed) = self.current_card_uid.take() {
                    self.status = ReaderStatus::WaitingForCard;
                    ReportOutcome::CardRemoved(removed)
                } else if self.reader_connected && self.status != ReaderStatus::WaitingForCard {
                    self.status = ReaderStatus::WaitingForCard;
                    ReportOutcome::Corrected
                } else {
                    ReportOutcome::Unchanged
                }
            }
        }
    }
}

impl Default for ReaderState {
    fn default() -> Self {
        Self::new()
    }
}
