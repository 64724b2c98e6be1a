use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// User-level tool configuration (`~/.config/ojet/config.toml`).
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ToolConfig {
    /// Map of tool name (sass, terser, node, cordova, npm, r.js) -> override.
    #[serde(default)]
    pub tools: HashMap<String, ToolEntry>,
    #[serde(default)]
    pub exchange: ExchangeSection,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ToolEntry {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ExchangeSection {
    /// Default username offered at the login prompt.
    #[serde(default)]
    pub username: Option<String>,
    /// Pre-issued Exchange token; allow env:VAR indirection.
    #[serde(default)]
    pub token: Option<String>,
}

impl ToolConfig {
    pub fn tool_path(&self, tool: &str) -> Option<&PathBuf> {
        self.tools.get(tool).and_then(|entry| entry.path.as_ref())
    }

    pub fn exchange_token(&self) -> Result<Option<String>> {
        resolve_token(self.exchange.token.clone())
    }
}

pub fn load() -> Result<ToolConfig> {
    let path_override = std::env::var("OJET_CONFIG").ok();
    load_from(path_override.as_deref())
}

pub fn load_from(path_override: Option<&str>) -> Result<ToolConfig> {
    let Some(path) = config_path_override(path_override) else {
        return Ok(ToolConfig::default());
    };

    if !path.exists() {
        return Ok(ToolConfig::default());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    let config: ToolConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config at {}", path.display()))?;
    Ok(config)
}

fn config_path_override(path_override: Option<&str>) -> Option<PathBuf> {
    if let Some(raw) = path_override {
        return Some(PathBuf::from(raw));
    }
    config_path()
}

pub fn config_path() -> Option<PathBuf> {
    // Prefer XDG-style config path, but fall back to ~/.ojet/config.toml.
    if let Some(mut dir) = dirs::config_dir() {
        dir.push("ojet");
        dir.push("config.toml");
        if dir.exists() {
            return Some(dir);
        }
    }
    dirs::home_dir().map(|mut home| {
        home.push(".ojet");
        home.push("config.toml");
        home
    })
}

fn resolve_token(raw: Option<String>) -> Result<Option<String>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    if let Some(rest) = raw.strip_prefix("env:") {
        let value = std::env::var(rest)
            .with_context(|| format!("failed to resolve env var {rest} for exchange token"))?;
        Ok(Some(value))
    } else {
        Ok(Some(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.toml");
        let config = load_from(path.to_str()).unwrap();
        assert!(config.tools.is_empty());
        assert!(config.exchange.username.is_none());
    }

    #[test]
    fn parses_tools_and_exchange_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[tools.sass]
path = "/opt/sass/bin/sass"

[exchange]
username = "dev"
token = "abc"
"#,
        )
        .unwrap();
        let config = load_from(path.to_str()).unwrap();
        assert_eq!(
            config.tool_path("sass").unwrap(),
            &PathBuf::from("/opt/sass/bin/sass")
        );
        assert!(config.tool_path("terser").is_none());
        assert_eq!(config.exchange.username.as_deref(), Some("dev"));
        assert_eq!(config.exchange_token().unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn blank_token_is_ignored() {
        assert!(resolve_token(Some("  ".into())).unwrap().is_none());
    }
}
