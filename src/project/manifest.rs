use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::COMPONENT_JSON;
use crate::util::json;

/// A `component.json` descriptor for a composite, pack or reference component.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jet_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<ReferencePaths>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ReferencePaths {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npm: Option<PathPair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cdn: Option<PathPair>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PathPair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

/// Init file selected for a reference component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceInit {
    pub path: String,
    pub npm: bool,
}

impl ComponentManifest {
    pub fn load(dir: &Path) -> Result<Self> {
        json::read_json(&dir.join(COMPONENT_JSON))
    }

    pub fn load_opt(dir: &Path) -> Result<Option<Self>> {
        json::read_json_opt(&dir.join(COMPONENT_JSON))
    }

    pub fn is_pack(&self) -> bool {
        self.kind.as_deref() == Some("pack")
    }

    pub fn is_reference(&self) -> bool {
        self.kind.as_deref() == Some("reference")
    }

    /// Require path key for a reference component: `paths.name`, else the package.
    pub fn reference_key(&self) -> Option<&str> {
        self.paths
            .as_ref()
            .and_then(|paths| paths.name.as_deref())
            .or(self.package.as_deref())
    }

    /// Picks the init file for a reference component. Debug builds prefer npm
    /// (min, then debug) and fall back to cdn (debug, then min); release
    /// builds prefer cdn (min, then debug) and fall back to npm.
    pub fn reference_init(&self, release: bool) -> Option<ReferenceInit> {
        let paths = self.paths.as_ref()?;
        let npm = |pair: &PathPair| {
            pair.min
                .clone()
                .or_else(|| pair.debug.clone())
                .map(|path| ReferenceInit { path, npm: true })
        };
        if release {
            if let Some(cdn) = &paths.cdn {
                return cdn
                    .min
                    .clone()
                    .or_else(|| cdn.debug.clone())
                    .map(|path| ReferenceInit { path, npm: false });
            }
            paths.npm.as_ref().and_then(npm)
        } else {
            if let Some(pair) = &paths.npm {
                return npm(pair);
            }
            paths.cdn.as_ref().and_then(|cdn| {
                cdn.debug
                    .clone()
                    .or_else(|| cdn.min.clone())
                    .map(|path| ReferenceInit { path, npm: false })
            })
        }
    }

    pub fn has_cdn_paths(&self) -> bool {
        self.paths
            .as_ref()
            .and_then(|paths| paths.cdn.as_ref())
            .is_some_and(|cdn| cdn.min.is_some() || cdn.debug.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reference(paths: Value) -> ComponentManifest {
        serde_json::from_value(json!({
            "name": "oj-ref-showdown",
            "type": "reference",
            "package": "showdown",
            "version": "1.9.0",
            "paths": paths
        }))
        .unwrap()
    }

    #[test]
    fn debug_prefers_npm_min() {
        let manifest = reference(json!({
            "npm": {"min": "dist/showdown.min", "debug": "dist/showdown"},
            "cdn": {"min": "https://cdn/showdown.min"}
        }));
        assert_eq!(
            manifest.reference_init(false),
            Some(ReferenceInit {
                path: "dist/showdown.min".into(),
                npm: true
            })
        );
    }

    #[test]
    fn release_prefers_cdn() {
        let manifest = reference(json!({
            "npm": {"min": "dist/showdown.min"},
            "cdn": {"debug": "https://cdn/showdown"}
        }));
        let init = manifest.reference_init(true).unwrap();
        assert!(!init.npm);
        assert_eq!(init.path, "https://cdn/showdown");
    }

    #[test]
    fn debug_falls_back_to_cdn_debug() {
        let manifest = reference(json!({
            "cdn": {"min": "https://cdn/a.min", "debug": "https://cdn/a"}
        }));
        assert_eq!(manifest.reference_init(false).unwrap().path, "https://cdn/a");
        assert_eq!(manifest.reference_key(), Some("showdown"));
    }

    #[test]
    fn keeps_unknown_fields() {
        let manifest: ComponentManifest = serde_json::from_value(json!({
            "name": "demo-card",
            "version": "1.0.0",
            "properties": {"a": {"type": "string"}}
        }))
        .unwrap();
        let back = serde_json::to_value(&manifest).unwrap();
        assert_eq!(back["properties"]["a"]["type"], "string");
    }
}
