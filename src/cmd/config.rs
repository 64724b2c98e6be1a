use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use ojet_tooling::cli::{ConfigCommand, ConfigSetArgs};
use ojet_tooling::config;
use ojet_tooling::delegate::Tool;
use ojet_tooling::util::fs::ensure_dir;
use toml_edit::{DocumentMut, Item, Table, value};

/// Keys `ojet config set` understands.
#[derive(Debug, PartialEq, Eq)]
enum ConfigKey {
    ToolPath(Tool),
    ExchangeUsername,
    ExchangeToken,
}

impl ConfigKey {
    fn parse(raw: &str) -> Result<Self> {
        if let Some(tool) = raw
            .strip_prefix("tools.")
            .and_then(|rest| rest.strip_suffix(".path"))
        {
            return Tool::from_name(tool).map(ConfigKey::ToolPath).ok_or_else(|| {
                let known: Vec<_> = Tool::ALL.iter().map(|tool| tool.name()).collect();
                anyhow!("unknown tool `{tool}`; expected one of: {}", known.join(", "))
            });
        }
        match raw {
            "exchange.username" => Ok(ConfigKey::ExchangeUsername),
            "exchange.token" => Ok(ConfigKey::ExchangeToken),
            _ => bail!(
                "unsupported config key `{raw}`; use tools.<tool>.path, exchange.username or exchange.token"
            ),
        }
    }

    /// Table path and leaf key inside the TOML document.
    fn location(&self) -> (Vec<&'static str>, &'static str) {
        match self {
            ConfigKey::ToolPath(tool) => (vec!["tools", tool.name()], "path"),
            ConfigKey::ExchangeUsername => (vec!["exchange"], "username"),
            ConfigKey::ExchangeToken => (vec!["exchange"], "token"),
        }
    }
}

pub fn run(command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Set(args) => set_value(&args),
    }
}

fn target_file(args: &ConfigSetArgs) -> Result<PathBuf> {
    if let Some(path) = &args.file {
        return Ok(path.clone());
    }
    if let Some(path) = std::env::var_os("OJET_CONFIG") {
        return Ok(path.into());
    }
    config::config_path()
        .ok_or_else(|| anyhow!("failed to resolve ~/.ojet/config.toml (no home directory found)"))
}

fn read_document(path: &Path) -> Result<DocumentMut> {
    if !path.exists() {
        return Ok(DocumentMut::new());
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    raw.parse::<DocumentMut>()
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn set_value(args: &ConfigSetArgs) -> Result<()> {
    let key = ConfigKey::parse(&args.key)?;
    let path = target_file(args)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }

    let mut doc = read_document(&path)?;
    apply_key(&mut doc, &key, &args.value)?;
    fs::write(&path, doc.to_string())
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Updated {} in {}", args.key, path.display());
    Ok(())
}

fn apply_key(doc: &mut DocumentMut, key: &ConfigKey, raw: &str) -> Result<()> {
    let (tables, leaf) = key.location();
    let mut current = doc.as_table_mut();
    for name in tables {
        current = current
            .entry(name)
            .or_insert(Item::Table(Table::new()))
            .as_table_mut()
            .ok_or_else(|| anyhow!("`{name}` is not a table in the config"))?;
    }
    current.insert(leaf, value(raw.trim()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(key: &str, value: &str, file: PathBuf) -> ConfigSetArgs {
        ConfigSetArgs {
            key: key.into(),
            value: value.into(),
            file: Some(file),
        }
    }

    #[test]
    fn tool_path_is_readable_by_loader() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        set_value(&args("tools.sass.path", "/opt/sass/bin/sass", path.clone())).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("[tools.sass]"));
        let parsed = config::load_from(path.to_str()).unwrap();
        assert_eq!(
            parsed.tool_path("sass").map(|p| p.display().to_string()).as_deref(),
            Some("/opt/sass/bin/sass")
        );
    }

    #[test]
    fn requirejs_table_name_keeps_its_dot() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        set_value(&args("tools.r.js.path", "/opt/rjs/r.js", path.clone())).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("[tools.\"r.js\"]"));
        let parsed = config::load_from(path.to_str()).unwrap();
        assert_eq!(
            parsed.tool_path("r.js").map(|p| p.display().to_string()).as_deref(),
            Some("/opt/rjs/r.js")
        );
    }

    #[test]
    fn keeps_existing_exchange_settings() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[exchange]\nusername = \"dev@example.com\"\n").unwrap();
        set_value(&args("exchange.token", "env:OJET_EXCHANGE_TOKEN", path.clone())).unwrap();
        let written = fs::read_to_string(path).unwrap();
        assert!(written.contains("username = \"dev@example.com\""));
        assert!(written.contains("token = \"env:OJET_EXCHANGE_TOKEN\""));
    }

    #[test]
    fn rejects_unknown_keys_and_scalar_parents() {
        assert!(ConfigKey::parse("tools.gulp.path").is_err());
        assert!(ConfigKey::parse("exchange.url").is_err());
        assert_eq!(
            ConfigKey::parse("tools.cordova.path").unwrap(),
            ConfigKey::ToolPath(Tool::Cordova)
        );

        let mut doc: DocumentMut = "exchange = \"x\"".parse().unwrap();
        let err = apply_key(&mut doc, &ConfigKey::ExchangeToken, "t").unwrap_err();
        assert!(err.to_string().contains("`exchange` is not a table"));
    }
}
