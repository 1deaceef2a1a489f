//! Key file loading with first-run bootstrap.
//!
//! The key file is a flat JSON object mapping key names to 32-character
//! hex strings, read once at startup. When the file is absent a
//! placeholder set is written out so the server comes up in a working
//! (but loudly flagged) demo configuration. A file that exists but does
//! not parse is fatal: silently running with partial key material is
//! worse than refusing to start.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use taplink_core::constants::WARNING_KEY;
use taplink_core::{Error, Result};
use taplink_protocol::KeyMaterial;
use tracing::{info, warn};

const PLACEHOLDER_WARNING: &str =
    "These are placeholder keys for development only. Replace before production use.";

const PLACEHOLDER_KEYS: [(&str, &str); 6] = [
    ("defaultKey", "00"),
    ("masterKey", "11"),
    ("authKey", "AA"),
    ("readKey", "BB"),
    ("writeKey", "CC"),
    ("changeKey", "DD"),
];

/// Load key material from `path`, writing a placeholder file first if none
/// exists.
///
/// # Errors
/// Returns `Error::Io` if the file cannot be read or the placeholder file
/// cannot be written, and `Error::Config` if an existing file is not a
/// JSON object of strings.
pub fn load_or_bootstrap(path: &Path) -> Result<KeyMaterial> {
    if !path.exists() {
        warn!(path = %path.display(), "key file not found, writing placeholder keys");
        let placeholder = placeholder_map();
        let json = serde_json::to_string_pretty(&placeholder)
            .map_err(|err| Error::Serialize(err.to_string()))?;
        fs::write(path, json)?;

        let material = KeyMaterial::from_map(placeholder.into_iter().collect());
        echo_warning(&material);
        return Ok(material);
    }

    let raw = fs::read_to_string(path)?;
    let map: std::collections::HashMap<String, String> = serde_json::from_str(&raw)
        .map_err(|err| Error::Config(format!("invalid key file {}: {err}", path.display())))?;

    let material = KeyMaterial::from_map(map);
    echo_warning(&material);
    info!(
        path = %path.display(),
        keys = material.len(),
        "loaded key material"
    );
    Ok(material)
}

// BTreeMap keeps the written file in a stable key order.
fn placeholder_map() -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = PLACEHOLDER_KEYS
        .iter()
        .map(|(name, byte)| (name.to_string(), byte.repeat(16)))
        .collect();
    map.insert(WARNING_KEY.to_string(), PLACEHOLDER_WARNING.to_string());
    map
}

fn echo_warning(material: &KeyMaterial) {
    if let Some(warning) = material.warning() {
        warn!("*** {warning} ***");
    }
}
