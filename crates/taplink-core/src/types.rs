use crate::{
    Result,
    constants::{KEY_HEX_LENGTH, KEY_LENGTH, MAX_UID_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Card unique identifier as reported by the reader.
///
/// The string is opaque and kept verbatim: reader firmwares differ in
/// casing and separator convention (`"04a1b2"`, `"04:A1:B2"`), and logs
/// and command payloads must echo exactly what the reader sent. Only
/// non-empty and a length cap are enforced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardUid(String);

impl CardUid {
    /// Create a new card UID.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardUid` if the UID is empty or longer than
    /// [`MAX_UID_LENGTH`] bytes.
    pub fn new(uid: &str) -> Result<Self> {
        if uid.is_empty() {
            return Err(Error::InvalidCardUid("UID must not be empty".to_string()));
        }
        if uid.len() > MAX_UID_LENGTH {
            return Err(Error::InvalidCardUid(format!(
                "UID must be at most {MAX_UID_LENGTH} bytes, got {}",
                uid.len()
            )));
        }

        Ok(CardUid(uid.to_string()))
    }

    /// Get the UID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CardUid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CardUid::new(s)
    }
}

impl TryFrom<String> for CardUid {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        CardUid::new(&s)
    }
}

impl From<CardUid> for String {
    fn from(uid: CardUid) -> String {
        uid.0
    }
}

/// A decoded 16-byte card key.
///
/// The relay validates shape only; the bytes are opaque payload forwarded
/// to the reader. Serialized as a plain byte array on the wire.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Key16([u8; KEY_LENGTH]);

impl Key16 {
    /// Decode a key from a 32-character hex string.
    ///
    /// Returns `None` if the string has the wrong length or contains a
    /// non-hex character. Callers aggregate failures per key name, so no
    /// error detail is carried here.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != KEY_HEX_LENGTH || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        let mut bytes = [0u8; KEY_LENGTH];
        for (i, chunk) in hex.as_bytes().chunks_exact(2).enumerate() {
            let pair = std::str::from_utf8(chunk).ok()?;
            bytes[i] = u8::from_str_radix(pair, 16).ok()?;
        }
        Some(Key16(bytes))
    }

    /// Get the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

/// Key bytes are secrets; keep them out of debug output and logs.
impl fmt::Debug for Key16 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Key16(****)")
    }
}
