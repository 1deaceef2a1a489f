//! Key material: named 16-byte secrets, validated for shape only.
//!
//! The relay never interprets key bytes; it checks that a named key exists
//! and decodes from hex to exactly 16 bytes before attaching it to a
//! reader-bound command. The reserved `WARNING` entry of the key file is an
//! operator notice, never a key.

use std::collections::HashMap;
use std::fmt;
use taplink_core::{Key16, constants::WARNING_KEY};

/// Result of looking up and decoding a single named key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLookup {
    /// The name is absent from the key material.
    Missing,

    /// The name is present but the value is not 32 hex characters.
    Invalid,

    /// The key decoded cleanly.
    Ok(Key16),
}

/// Mapping from key name to hex-encoded secret, loaded once at startup.
#[derive(Clone, Default)]
pub struct KeyMaterial {
    entries: HashMap<String, String>,
    warning: Option<String>,
}

impl KeyMaterial {
    /// Build key material from a raw name-to-hex map.
    ///
    /// A `WARNING` entry is split off as the operator warning and excluded
    /// from key lookups.
    #[must_use]
    pub fn from_map(mut map: HashMap<String, String>) -> Self {
        let warning = map.remove(WARNING_KEY);
        Self {
            entries: map,
            warning,
        }
    }

    /// Operator warning carried by the key file, if any.
    #[must_use]
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    /// Raw hex value for a named key.
    #[must_use]
    pub fn hex(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Look up and decode a named key.
    #[must_use]
    pub fn decode(&self, name: &str) -> KeyLookup {
        match self.hex(name) {
            None => KeyLookup::Missing,
            Some(hex) => match Key16::from_hex(hex) {
                None => KeyLookup::Invalid,
                Some(key) => KeyLookup::Ok(key),
            },
        }
    }

    /// Number of named keys (excluding any warning entry).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no keys are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Key values are secrets; debug output shows names only.
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("KeyMaterial")
            .field("names", &names)
            .field("warning", &self.warning)
            .finish()
    }
}
