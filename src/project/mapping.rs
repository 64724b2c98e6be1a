//! `path_mapping.json`: where each third-party library lives locally and on a CDN.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PathMapping {
    #[serde(rename = "baseUrl", default)]
    pub base_url: Option<String>,
    #[serde(rename = "use", default)]
    pub use_: Option<String>,
    #[serde(default)]
    pub cdns: BTreeMap<String, CdnEntry>,
    #[serde(default)]
    pub libs: BTreeMap<String, LibEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CdnEntry {
    Prefix(String),
    Bundle {
        prefix: String,
        #[serde(default)]
        config: Option<String>,
    },
}

impl CdnEntry {
    pub fn prefix(&self) -> &str {
        match self {
            CdnEntry::Prefix(prefix) => prefix,
            CdnEntry::Bundle { prefix, .. } => prefix,
        }
    }

    /// Bundle config script name, when this CDN serves a bundles-config.
    pub fn bundle_config(&self) -> Option<&str> {
        match self {
            CdnEntry::Bundle {
                config: Some(config),
                ..
            } if !config.is_empty() => Some(config),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LibEntry {
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub cdn: Option<String>,
    #[serde(default)]
    pub debug: Option<LibBuild>,
    #[serde(default)]
    pub release: Option<LibBuild>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LibBuild {
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub src: Option<OneOrMany>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(rename = "cdnPath", default)]
    pub cdn_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(single) => vec![single.clone()],
            OneOrMany::Many(many) => many.clone(),
        }
    }
}

/// `release` or `debug`: the key used inside each lib entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingFlavor {
    Debug,
    Release,
}

impl LibEntry {
    pub fn build(&self, flavor: MappingFlavor) -> Option<&LibBuild> {
        match flavor {
            MappingFlavor::Debug => self.debug.as_ref(),
            MappingFlavor::Release => self.release.as_ref(),
        }
    }
}

impl PathMapping {
    pub fn uses_cdn(&self) -> bool {
        self.use_.as_deref() == Some("cdn")
    }

    /// True when `lib` should be loaded from its CDN for this flavor.
    pub fn is_cdn_lib(&self, lib: &LibEntry, flavor: MappingFlavor) -> bool {
        self.uses_cdn()
            && lib
                .cdn
                .as_ref()
                .is_some_and(|cdn| self.cdns.contains_key(cdn))
            && lib
                .build(flavor)
                .is_some_and(|build| build.cdn_path.is_some())
    }

    /// True when the lib's CDN is served through a bundles-config script.
    pub fn is_cdn_bundle(&self, lib: &LibEntry) -> bool {
        let Some(cdn) = lib.cdn.as_deref() else {
            return false;
        };
        let name = if cdn == "3rdParty" { "jet" } else { cdn };
        self.cdns
            .get(name)
            .and_then(CdnEntry::bundle_config)
            .is_some()
    }
}
