use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::util::fs as ufs;

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = ufs::read_to_string(path)?;
    parse_json_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Reads a JSON file, yielding `None` when it does not exist.
pub fn read_json_opt<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.is_file() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

pub fn parse_json_str<T: DeserializeOwned>(raw: &str) -> Result<T> {
    // Some editors save manifests with a BOM.
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    anyhow::ensure!(!trimmed.is_empty(), "empty JSON document");
    serde_json::from_str(trimmed).context("invalid JSON")
}

/// Writes pretty JSON with two-space indentation and a trailing newline.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut rendered = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to render {}", path.display()))?;
    rendered.push('\n');
    ufs::write_string(path, &rendered)
}

/// Reads `version` from a package.json-like document.
pub fn package_version(path: &Path) -> Result<Option<String>> {
    let Some(value) = read_json_opt::<Value>(path)? else {
        return Ok(None);
    };
    Ok(value
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string))
}
