//! Command validation and reader-bound payload construction.
//!
//! [`build_command`] is the pure half of command dispatch: given a command
//! name, the present card UID, and the loaded key material, it either
//! produces the complete payload for the reader or the exact validation
//! error to surface to the issuing UI session. Connection-state
//! preconditions (reader attached, card present) are the session manager's
//! responsibility.

use crate::keys::{KeyLookup, KeyMaterial};
use serde::Serialize;
use std::fmt;
use taplink_core::{
    CardUid, Error, Key16, Result,
    constants::{AUTH_KEY_NAME, AUTH_KEY_SLOT, ENROLL_KEY_NAMES},
};

/// Commands a UI session may issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Provision the present card with the full key set.
    Enroll,

    /// Validate the present card against the auth key.
    Authenticate,
}

impl CommandKind {
    /// Parse a command name from a UI request.
    ///
    /// # Errors
    /// Returns `Error::UnknownCommand` for any name other than `enroll`
    /// or `authenticate`.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "enroll" => Ok(CommandKind::Enroll),
            "authenticate" => Ok(CommandKind::Authenticate),
            other => Err(Error::UnknownCommand(other.to_string())),
        }
    }

    /// Wire name of the command.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Enroll => "enroll",
            CommandKind::Authenticate => "authenticate",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full key set attached to an `enroll` command, decoded to raw bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollKeys {
    pub master_key: Key16,
    pub auth_key: Key16,
    pub read_key: Key16,
    pub write_key: Key16,
    pub change_key: Key16,
    pub default_key: Key16,
}

/// Payload of a reader-bound command envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandPayload {
    pub command: String,
    pub uid: CardUid,

    /// Present for `enroll` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<EnrollKeys>,

    /// Key slot, present for `authenticate` only.
    #[serde(rename = "keyNo", skip_serializing_if = "Option::is_none")]
    pub key_no: Option<u8>,

    /// Decoded auth key, present for `authenticate` only.
    #[serde(rename = "authKey", skip_serializing_if = "Option::is_none")]
    pub auth_key: Option<Key16>,
}

/// Envelope for messages sent to the reader.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ReaderBound {
    Command(CommandPayload),
}

impl ReaderBound {
    /// Serialize to the single-frame JSON envelope.
    ///
    /// # Errors
    /// Returns `Error::Serialize` if JSON encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialize(e.to_string()))
    }
}

/// Validate key material for a command and build the reader-bound payload.
///
/// # Errors
/// Returns `Error::MissingKeys` naming every absent key, or
/// `Error::InvalidKeyFormat` naming every present-but-undecodable key.
/// Missing keys take precedence when both occur.
pub fn build_command(
    kind: CommandKind,
    uid: &CardUid,
    keys: &KeyMaterial,
) -> Result<CommandPayload> {
    match kind {
        CommandKind::Enroll => build_enroll(uid, keys),
        CommandKind::Authenticate => build_authenticate(uid, keys),
    }
}

fn build_enroll(uid: &CardUid, keys: &KeyMaterial) -> Result<CommandPayload> {
    let mut missing = Vec::new();
    let mut invalid = Vec::new();
    let mut take = |name: &str| match keys.decode(name) {
        KeyLookup::Missing => {
            missing.push(name.to_string());
            None
        }
        KeyLookup::Invalid => {
            invalid.push(name.to_string());
            None
        }
        KeyLookup::Ok(key) => Some(key),
    };

    // Lookup order follows ENROLL_KEY_NAMES so error lists come out in
    // wire order.
    let [master, auth, read, write, change, default] = ENROLL_KEY_NAMES;
    let looked = (
        take(master),
        take(auth),
        take(read),
        take(write),
        take(change),
        take(default),
    );

    match looked {
        (
            Some(master_key),
            Some(auth_key),
            Some(read_key),
            Some(write_key),
            Some(change_key),
            Some(default_key),
        ) => Ok(CommandPayload {
            command: CommandKind::Enroll.as_str().to_string(),
            uid: uid.clone(),
            keys: Some(EnrollKeys {
                master_key,
                auth_key,
                read_key,
                write_key,
                change_key,
                default_key,
            }),
            key_no: None,
            auth_key: None,
        }),
        _ if !missing.is_empty() => Err(Error::MissingKeys(missing)),
        _ => Err(Error::InvalidKeyFormat(invalid)),
    }
}

fn build_authenticate(uid: &CardUid, keys: &KeyMaterial) -> Result<CommandPayload> {
    let auth_key = match keys.decode(AUTH_KEY_NAME) {
        KeyLookup::Missing => return Err(Error::MissingKeys(vec![AUTH_KEY_NAME.to_string()])),
        KeyLookup::Invalid => {
            return Err(Error::InvalidKeyFormat(vec![AUTH_KEY_NAME.to_string()]));
        }
        KeyLookup::Ok(key) => key,
    };

    Ok(CommandPayload {
        command: CommandKind::Authenticate.as_str().to_string(),
        uid: uid.clone(),
        keys: None,
        key_no: Some(AUTH_KEY_SLOT),
        auth_key: Some(auth_key),
    })
}
