use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::constants::{JET_COMPONENTS, JET_COMPOSITES};
use crate::project::jetconfig::PathsConfig;
use crate::util::fs::normalize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourcePaths {
    pub common: String,
    pub javascript: String,
    pub styles: String,
    pub themes: String,
    pub tests: String,
    pub web: String,
    pub hybrid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagingPaths {
    pub web: String,
    pub hybrid: String,
    pub themes: String,
}

/// Project-relative directories after defaults and normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfiguredPaths {
    pub src: SourcePaths,
    pub staging: StagingPaths,
    pub components: String,
    pub composites: String,
    /// Staging root for the platform (`web`, or `hybrid/www`).
    pub staging_path: String,
    /// Platform override source dir (`src-web` or `src-hybrid`).
    pub platform_specific: String,
}

impl ConfiguredPaths {
    pub fn resolve(config: &PathsConfig, platform: &str) -> Self {
        let pick = |value: &Option<String>, default: &str| {
            normalize(value.as_deref().unwrap_or(default))
        };
        let src = SourcePaths {
            common: pick(&config.source.common, "src"),
            javascript: pick(&config.source.javascript, "js"),
            styles: pick(&config.source.styles, "css"),
            themes: pick(&config.source.themes, "themes"),
            tests: pick(&config.source.tests, "tests"),
            web: pick(&config.source.web, "src-web"),
            hybrid: pick(&config.source.hybrid, "src-hybrid"),
        };
        let staging = StagingPaths {
            web: pick(&config.staging.web, "web"),
            hybrid: pick(&config.staging.hybrid, "hybrid"),
            themes: pick(&config.staging.themes, "themes"),
        };
        let (staging_path, platform_specific) = if platform == "web" {
            (staging.web.clone(), src.web.clone())
        } else {
            (format!("{}/www", staging.hybrid), src.hybrid.clone())
        };
        Self {
            src,
            staging,
            components: JET_COMPONENTS.to_string(),
            composites: JET_COMPOSITES.to_string(),
            staging_path,
            platform_specific,
        }
    }

    pub fn is_web(&self) -> bool {
        self.staging_path == self.staging.web
    }

    /// `<root>/<stagingPath>`
    pub fn staging_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.staging_path)
    }

    /// `<root>/<src.common>/<src.javascript>`
    pub fn src_js_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.src.common).join(&self.src.javascript)
    }

    /// Local composite components: `<root>/src/js/jet-composites`.
    pub fn src_composites_dir(&self, root: &Path) -> PathBuf {
        self.src_js_dir(root).join(&self.composites)
    }

    /// Source themes: `<root>/src/themes`.
    pub fn src_themes_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.src.common).join(&self.src.themes)
    }

    /// Staged themes root: `<root>/themes`.
    pub fn staging_themes_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.staging.themes)
    }

    pub fn components_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.components)
    }

    /// Built composites for the platform: `<staging>/js/jet-composites`.
    pub fn staging_composites_dir(&self, root: &Path) -> PathBuf {
        self.staging_dir(root).join(&self.src.javascript).join(&self.composites)
    }
}
