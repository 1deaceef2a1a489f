//! Message envelopes for each connection direction.
//!
//! Inbound parsing goes through an intermediate `serde_json::Value` so the
//! `type` tag can be inspected first: a bad JSON frame or a payload of the
//! wrong shape is a `MalformedMessage` error (logged and dropped by the
//! caller), while a well-formed frame with an unrecognized tag is the
//! explicit `Unknown` variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use taplink_core::{CardUid, Error, ReaderState, Result};

/// Card-presence report and command outcome messages from the reader.
#[derive(Debug, Clone, PartialEq)]
pub enum ReaderMessage {
    /// Periodic presence report; `uid` is absent when no card is on the
    /// antenna.
    Status { uid: Option<CardUid> },

    /// Outcome of a previously dispatched command.
    CommandResult(CommandResultPayload),

    /// Free-form log line emitted by the reader firmware.
    Log(String),

    /// Well-formed envelope with an unrecognized `type` tag.
    Unknown(String),
}

/// Payload of a reader `command_result` message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommandResultPayload {
    pub uid: Option<CardUid>,
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub logs: Option<ResultLogs>,
}

/// Reader firmware sends `logs` either as an array of lines or a single
/// string; accept both.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ResultLogs {
    Many(Vec<String>),
    One(String),
}

impl ResultLogs {
    /// Flatten into individual log lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<String> {
        match self {
            ResultLogs::Many(lines) => lines,
            ResultLogs::One(line) => vec![line],
        }
    }
}

/// Command requests from UI clients.
#[derive(Debug, Clone, PartialEq)]
pub enum UiMessage {
    /// Request to run a named command against the present card.
    Command(String),

    /// Well-formed envelope with an unrecognized `type` tag.
    Unknown(String),
}

#[derive(Deserialize)]
struct StatusPayload {
    #[serde(default)]
    uid: Option<String>,
}

impl StatusPayload {
    // An absent or empty uid both mean no card on the antenna; anything
    // else is carried verbatim.
    fn into_uid(self) -> Result<Option<CardUid>> {
        match self.uid.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => {
                let uid = CardUid::new(raw)
                    .map_err(|e| Error::MalformedMessage(format!("status payload: {e}")))?;
                Ok(Some(uid))
            }
        }
    }
}

fn envelope_type(value: &Value) -> Result<&str> {
    value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MalformedMessage("missing \"type\" field".to_string()))
}

fn payload(value: &Value) -> Result<Value> {
    value
        .get("payload")
        .cloned()
        .ok_or_else(|| Error::MalformedMessage("missing \"payload\" field".to_string()))
}

/// Parse a text frame received from the reader connection.
///
/// # Errors
/// Returns `Error::MalformedMessage` for invalid JSON or a recognized
/// `type` whose payload has the wrong shape.
pub fn parse_reader_message(raw: &str) -> Result<ReaderMessage> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| Error::MalformedMessage(e.to_string()))?;

    match envelope_type(&value)? {
        "status" => {
            let payload: StatusPayload = serde_json::from_value(payload(&value)?)
                .map_err(|e| Error::MalformedMessage(format!("status payload: {e}")))?;
            Ok(ReaderMessage::Status {
                uid: payload.into_uid()?,
            })
        }
        "command_result" => {
            let payload: CommandResultPayload = serde_json::from_value(payload(&value)?)
                .map_err(|e| Error::MalformedMessage(format!("command_result payload: {e}")))?;
            Ok(ReaderMessage::CommandResult(payload))
        }
        "log" => {
            let line = payload(&value)?
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::MalformedMessage("log payload must be a string".to_string())
                })?;
            Ok(ReaderMessage::Log(line))
        }
        other => Ok(ReaderMessage::Unknown(other.to_string())),
    }
}

/// Parse a text frame received from a UI connection.
///
/// # Errors
/// Returns `Error::MalformedMessage` for invalid JSON or a `command`
/// envelope without a string `command` field.
pub fn parse_ui_message(raw: &str) -> Result<UiMessage> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| Error::MalformedMessage(e.to_string()))?;

    match envelope_type(&value)? {
        "command" => {
            let command = value
                .get("command")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Error::MalformedMessage("missing \"command\" field".to_string())
                })?;
            Ok(UiMessage::Command(command.to_string()))
        }
        other => Ok(UiMessage::Unknown(other.to_string())),
    }
}

/// Events broadcast (or sent directly) to UI sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full reader state snapshot.
    StatusUpdate(ReaderState),

    /// Current log ring contents, oldest first. Sent once per UI connect.
    LogHistory(Vec<String>),

    /// A single live log line.
    Log(String),

    /// A command was delivered to the reader; UI disables controls until
    /// the matching `command_result` arrives.
    CommandSent { command: String },

    /// Outcome relayed from the reader.
    CommandResult {
        #[serde(skip_serializing_if = "Option::is_none")]
        uid: Option<CardUid>,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Command validation or delivery failure, sent to the issuer only.
    CommandError { message: String },
}

impl ServerEvent {
    /// Serialize to the single-frame JSON envelope.
    ///
    /// # Errors
    /// Returns `Error::Serialize` if JSON encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialize(e.to_string()))
    }
}
