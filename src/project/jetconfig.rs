use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// In-memory form of `oraclejetconfig.json`. Unknown keys are kept in `extra`
/// so a rewrite never drops settings this tool does not understand.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct JetConfig {
    #[serde(default, skip_serializing_if = "PathsConfig::is_empty")]
    pub paths: PathsConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, ComponentEntry>,
    #[serde(
        rename = "exchange-url",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub exchange_url: Option<String>,
    #[serde(
        rename = "defaultBrowser",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub default_browser: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default)]
    pub source: SourcePathsConfig,
    #[serde(default)]
    pub staging: StagingPathsConfig,
}

impl PathsConfig {
    fn is_empty(&self) -> bool {
        self.source == SourcePathsConfig::default() && self.staging == StagingPathsConfig::default()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePathsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub javascript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub themes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hybrid: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingPathsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hybrid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub themes: Option<String>,
}

/// A `components` entry: a plain version, or a pack with its member versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentEntry {
    Version(String),
    Pack(PackEntry),
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub components: BTreeMap<String, String>,
}

impl ComponentEntry {
    pub fn version(&self) -> Option<&str> {
        match self {
            ComponentEntry::Version(version) => Some(version),
            ComponentEntry::Pack(pack) => pack.version.as_deref(),
        }
    }

    pub fn as_pack(&self) -> Option<&PackEntry> {
        match self {
            ComponentEntry::Pack(pack) => Some(pack),
            ComponentEntry::Version(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_unknown_keys_on_roundtrip() {
        let raw = json!({
            "paths": {"source": {"common": "src"}, "staging": {"web": "web"}},
            "generatorVersion": "7.0.0",
            "components": {
                "oj-sample-card": "1.0.2",
                "oj-ext": {"version": "2.0.0", "components": {"input-url": "2.0.0"}}
            }
        });
        let config: JetConfig = serde_json::from_value(raw).unwrap();
        assert_eq!(config.extra["generatorVersion"], "7.0.0");
        assert_eq!(
            config.components["oj-sample-card"],
            ComponentEntry::Version("1.0.2".into())
        );
        let pack = config.components["oj-ext"].as_pack().unwrap();
        assert_eq!(pack.components["input-url"], "2.0.0");

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["generatorVersion"], "7.0.0");
        assert_eq!(back["components"]["oj-ext"]["version"], "2.0.0");
        assert!(back.get("exchange-url").is_none());
    }
}
