//! Command dispatch validation.
//!
//! Runs the precondition chain for a UI-issued command against the current
//! reader state before any payload is built: reader attached, card
//! present, no command already in flight, command name known, key material
//! valid. The first failure is returned as the error to surface to the
//! issuing UI session. Delivery and the `command_sent` broadcast are the
//! session manager's side.

use taplink_core::{CardUid, Error, ReaderState, Result};
use taplink_protocol::{CommandKind, CommandPayload, KeyMaterial, build_command};

/// The single command currently awaiting a `command_result` from the
/// reader.
///
/// Set when a command payload is handed to the reader connection, cleared
/// when any result arrives or the reader connection is lost (a result can
/// no longer arrive). While set, further dispatch attempts are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub command: String,
    pub uid: CardUid,
}

/// Validate a command request and build the reader-bound payload.
///
/// `reader_attached` is whether the session manager currently owns an open
/// reader handle; the state snapshot alone cannot distinguish a handle
/// that just failed.
///
/// # Errors
/// Returns the first failing precondition: `ReaderUnavailable`,
/// `NoCardPresent`, `CommandPending`, `UnknownCommand`, `MissingKeys`, or
/// `InvalidKeyFormat`.
pub fn validate(
    reader_attached: bool,
    state: &ReaderState,
    pending: Option<&PendingCommand>,
    command_name: &str,
    keys: &KeyMaterial,
) -> Result<CommandPayload> {
    if !reader_attached {
        return Err(Error::ReaderUnavailable);
    }

    let uid = match &state.current_card_uid {
        Some(uid) if state.status.is_card_present() => uid,
        _ => return Err(Error::NoCardPresent),
    };

    if let Some(pending) = pending {
        return Err(Error::CommandPending(pending.command.clone()));
    }

    let kind = CommandKind::parse(command_name)?;
    build_command(kind, uid, keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use taplink_core::constants::ENROLL_KEY_NAMES;

    fn uid() -> CardUid {
        CardUid::new("04A1B2").unwrap()
    }

    fn card_present_state() -> ReaderState {
        let mut state = ReaderState::new();
        state.attach_reader();
        state.apply_report(Some(uid()), 1);
        state
    }

    fn full_material() -> KeyMaterial {
        KeyMaterial::from_map(
            ENROLL_KEY_NAMES
                .iter()
                .map(|name| (name.to_string(), "AA".repeat(16)))
                .collect(),
        )
    }

    #[test]
    fn test_reader_unavailable_checked_first() {
        // Even with no card and no keys, a missing reader wins.
        let state = ReaderState::new();
        let err = validate(false, &state, None, "enroll", &KeyMaterial::default()).unwrap_err();
        assert!(matches!(err, Error::ReaderUnavailable));
    }

    #[test]
    fn test_no_card_present() {
        let mut state = ReaderState::new();
        state.attach_reader();

        let err = validate(true, &state, None, "authenticate", &full_material()).unwrap_err();
        assert!(matches!(err, Error::NoCardPresent));
    }

    #[test]
    fn test_no_card_regardless_of_key_material() {
        let mut state = ReaderState::new();
        state.attach_reader();

        // Empty key material would fail validation, but the card check
        // comes first.
        let err =
            validate(true, &state, None, "enroll", &KeyMaterial::default()).unwrap_err();
        assert!(matches!(err, Error::NoCardPresent));
    }

    #[test]
    fn test_pending_command_rejected() {
        let pending = PendingCommand {
            command: "enroll".to_string(),
            uid: uid(),
        };

        let err = validate(
            true,
            &card_present_state(),
            Some(&pending),
            "authenticate",
            &full_material(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::CommandPending(name) if name == "enroll"));
    }

    #[test]
    fn test_unknown_command() {
        let err = validate(
            true,
            &card_present_state(),
            None,
            "format",
            &full_material(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownCommand(name) if name == "format"));
    }

    #[test]
    fn test_valid_authenticate_builds_payload() {
        let payload = validate(
            true,
            &card_present_state(),
            None,
            "authenticate",
            &full_material(),
        )
        .unwrap();

        assert_eq!(payload.command, "authenticate");
        assert_eq!(payload.uid, uid());
        assert_eq!(payload.key_no, Some(1));
    }

    #[test]
    fn test_missing_keys_surface() {
        let mut map: HashMap<String, String> = ENROLL_KEY_NAMES
            .iter()
            .map(|name| (name.to_string(), "AA".repeat(16)))
            .collect();
        map.remove("defaultKey");
        let keys = KeyMaterial::from_map(map);

        let err = validate(true, &card_present_state(), None, "enroll", &keys).unwrap_err();
        assert!(matches!(err, Error::MissingKeys(names) if names == vec!["defaultKey"]));
    }
}
