//! Typed build and serve options after validation.

use std::path::PathBuf;

use anyhow::{Result, bail};
use serde::Serialize;

use crate::constants::{DEBUG_FLAG, RELEASE_FLAG};
use crate::project::mapping::MappingFlavor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    Dev,
    Release,
}

impl BuildType {
    /// `release` and `dev` are accepted as is; `debug` is an alias for `dev`.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw {
            None | Some("") | Some("undefined") | Some("dev") | Some("debug") => Ok(BuildType::Dev),
            Some("release") => Ok(BuildType::Release),
            Some(other) => bail!("Option buildType {other} is invalid!"),
        }
    }

    pub fn is_release(self) -> bool {
        self == BuildType::Release
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildType::Dev => "dev",
            BuildType::Release => "release",
        }
    }

    pub fn flavor(self) -> MappingFlavor {
        match self {
            BuildType::Dev => MappingFlavor::Debug,
            BuildType::Release => MappingFlavor::Release,
        }
    }

    pub fn cordova_flag(self) -> &'static str {
        match self {
            BuildType::Dev => DEBUG_FLAG,
            BuildType::Release => RELEASE_FLAG,
        }
    }

    pub fn css_ext(self) -> &'static str {
        match self {
            BuildType::Dev => ".css",
            BuildType::Release => ".min.css",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub name: String,
    pub platform: String,
    pub version: String,
    pub compile: bool,
}

impl Theme {
    pub fn key(&self) -> String {
        format!("{}:{}", self.name, self.platform)
    }

    /// `<name>/<version>/<platform>` or `<name>/<platform>` when unversioned.
    pub fn css_rel_dir(&self) -> String {
        if self.version.is_empty() {
            format!("{}/{}", self.name, self.platform)
        } else {
            format!("{}/{}/{}", self.name, self.version, self.platform)
        }
    }
}

/// Raw build flags as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub platform: Option<String>,
    pub build_type: Option<String>,
    pub release: bool,
    pub theme: Option<String>,
    pub themes: Option<String>,
    pub destination: Option<String>,
    pub build_config: Option<String>,
    pub platform_options: Option<String>,
    pub no_sass: bool,
    pub user_options: Option<String>,
}

/// Fully resolved build options.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    pub platform: String,
    pub build_type: BuildType,
    pub theme: Theme,
    pub themes: Vec<Theme>,
    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_config: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_options: Option<String>,
    pub sass_compile: bool,
    pub build_for_serve: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_options: Option<String>,
}

impl BuildOptions {
    pub fn is_web(&self) -> bool {
        self.platform == "web"
    }
}

/// Raw serve flags as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ServeRequest {
    pub build: BuildRequest,
    pub skip_build: bool,
    pub livereload: Option<bool>,
    pub port: Option<String>,
    pub livereload_port: Option<String>,
    pub server_only: bool,
    pub browser: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub build: bool,
    pub livereload: bool,
    pub port: u16,
    pub livereload_port: u16,
    pub destination: String,
    pub destination_target: Option<String>,
    pub build_options: BuildOptions,
}

impl ServeOptions {
    pub fn server_only(&self) -> bool {
        self.destination == "server-only"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_build_types() {
        assert_eq!(BuildType::parse(None).unwrap(), BuildType::Dev);
        assert_eq!(BuildType::parse(Some("debug")).unwrap(), BuildType::Dev);
        assert_eq!(BuildType::parse(Some("release")).unwrap(), BuildType::Release);
        let err = BuildType::parse(Some("prod")).unwrap_err();
        assert_eq!(err.to_string(), "Option buildType prod is invalid!");
    }

    #[test]
    fn css_dir_omits_empty_version() {
        let mut theme = Theme {
            name: "mytheme".into(),
            platform: "web".into(),
            version: String::new(),
            compile: true,
        };
        assert_eq!(theme.css_rel_dir(), "mytheme/web");
        theme.version = "1.0.0".into();
        assert_eq!(theme.css_rel_dir(), "mytheme/1.0.0/web");
        assert_eq!(theme.key(), "mytheme:web");
    }
}
