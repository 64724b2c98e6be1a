//! A JET application on disk: its root, `oraclejetconfig.json` and the
//! manifests and mapping files found under it.

pub mod jetconfig;
pub mod manifest;
pub mod mapping;
pub mod paths;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{
    CONFIG_FILE, EXCHANGE_URL_KEY, NODE_MODULES, ORACLEJET_PACKAGE_JSON, PATH_MAPPING_FILE,
};
use crate::util::json;

pub use jetconfig::{ComponentEntry, JetConfig, PackEntry};
pub use manifest::ComponentManifest;
pub use mapping::PathMapping;
pub use paths::ConfiguredPaths;

static TARBALL_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.*oraclejet-)(.*)\.tgz").expect("valid tarball regex"));

#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: JetConfig,
}

impl Project {
    /// Loads the project rooted at `root`; a missing config file means defaults.
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config = json::read_json_opt(&root.join(CONFIG_FILE))?.unwrap_or_default();
        Ok(Self { root, config })
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn save(&self) -> Result<()> {
        json::write_json_pretty(&self.config_path(), &self.config)
    }

    pub fn paths(&self, platform: &str) -> ConfiguredPaths {
        ConfiguredPaths::resolve(&self.config.paths, platform)
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.root.join(rel)
    }

    pub fn exchange_url(&self) -> Result<&str> {
        self.config
            .exchange_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "Exchange url is not configured. Please see 'ojet help configure' for instructions."
                )
            })
    }

    pub fn set_exchange_url(&mut self, url: &str) -> Result<()> {
        self.config.extra.remove(EXCHANGE_URL_KEY);
        self.config.exchange_url = Some(url.to_string());
        self.save()
    }

    /// Version of the installed `@oracle/oraclejet` package.
    pub fn jet_version(&self) -> Result<Option<String>> {
        let Some(raw) = json::package_version(&self.root.join(ORACLEJET_PACKAGE_JSON))? else {
            return Ok(None);
        };
        Ok(Some(normalize_jet_version(&raw)))
    }

    /// Versions substituted for `#{version}` in path mapping entries.
    pub fn lib_versions(&self) -> Result<BTreeMap<String, String>> {
        let mut versions = BTreeMap::new();
        if let Some(jet) = self.jet_version()? {
            for lib in ["ojs", "ojL10n", "ojtranslations"] {
                versions.insert(lib.to_string(), jet.clone());
            }
        }
        for (lib, package) in [
            ("jquery", "jquery"),
            ("jqueryui-amd", "jquery-ui"),
            ("hammerjs", "hammerjs"),
            ("knockout", "knockout"),
        ] {
            let path = self
                .root
                .join(NODE_MODULES)
                .join(package)
                .join("package.json");
            if let Some(version) = json::package_version(&path)? {
                versions.insert(lib.to_string(), version);
            }
        }
        Ok(versions)
    }

    pub fn path_mapping_file(&self, paths: &ConfiguredPaths) -> PathBuf {
        paths.src_js_dir(&self.root).join(PATH_MAPPING_FILE)
    }

    pub fn path_mapping(&self, paths: &ConfiguredPaths) -> Result<PathMapping> {
        Ok(json::read_json_opt(&self.path_mapping_file(paths))?.unwrap_or_default())
    }

    /// Local composite dirs whose manifest `name` matches the directory name.
    pub fn local_components(&self, paths: &ConfiguredPaths) -> Result<Vec<(String, ComponentManifest)>> {
        let base = paths.src_composites_dir(&self.root);
        let mut found = Vec::new();
        for dir in crate::util::fs::list_dirs(&base)? {
            if let Some(manifest) = ComponentManifest::load_opt(&base.join(&dir))?
                && manifest.name.as_deref() == Some(dir.as_str())
            {
                found.push((dir, manifest));
            }
        }
        Ok(found)
    }

    /// Installed Exchange components under `jet_components`, with their manifests.
    pub fn installed_components(
        &self,
        paths: &ConfiguredPaths,
    ) -> Result<Vec<(String, Option<ComponentManifest>)>> {
        let base = paths.components_dir(&self.root);
        let mut found = Vec::new();
        for dir in crate::util::fs::list_dirs(&base)? {
            let manifest = ComponentManifest::load_opt(&base.join(&dir))?;
            found.push((dir, manifest));
        }
        Ok(found)
    }
}

/// npm may record the JET dependency as a tarball URL; keep only the version.
pub fn normalize_jet_version(raw: &str) -> String {
    if raw.len() > 5
        && let Some(captures) = TARBALL_VERSION.captures(raw)
        && let Some(version) = captures.get(2)
    {
        return version.as_str().to_string();
    }
    raw.to_string()
}
