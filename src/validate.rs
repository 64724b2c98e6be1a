//! Turns raw command line flags into validated options for a project.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::warn;

use crate::constants::{
    BUILD_DESTINATIONS, DEFAULT_BROWSER, DEFAULT_BUILD_DESTINATION, DEFAULT_LIVERELOAD_PORT,
    DEFAULT_PORT, DEFAULT_THEME, RESERVED_ALL, SERVE_HYBRID_DESTINATIONS, SERVE_WEB_DESTINATIONS,
    SUPPORTED_BROWSERS, SUPPORTED_HYBRID_PLATFORMS, SUPPORTED_PLATFORMS,
};
use crate::delegate::{Tool, Toolbox};
use crate::options::{BuildOptions, BuildRequest, BuildType, ServeOptions, ServeRequest, Theme};
use crate::project::{ConfiguredPaths, Project};
use crate::util::fs::{expand_home, list_dirs};
use crate::util::json;

pub fn platform(project: &Project, requested: Option<&str>) -> Result<String> {
    let paths = project.paths("web");
    let has_platform_src =
        project.join(&paths.src.web).exists() || project.join(&paths.src.hybrid).exists();
    let hybrid = project.join(&paths.staging.hybrid).exists();

    let Some(platform) = requested else {
        if hybrid && !has_platform_src {
            bail!(
                "A platform is required for a hybrid app. Please use one of: {}",
                SUPPORTED_HYBRID_PLATFORMS.join(", ")
            );
        }
        return Ok("web".to_string());
    };

    if has_platform_src {
        if SUPPORTED_PLATFORMS.contains(&platform) {
            return Ok(platform.to_string());
        }
        bail!("Platform '{platform}' not supported");
    }
    if hybrid {
        if SUPPORTED_HYBRID_PLATFORMS.contains(&platform) {
            return Ok(platform.to_string());
        }
        bail!("Platform '{platform}' not supported for hybrid app");
    }
    if platform == "web" {
        return Ok(platform.to_string());
    }
    bail!("Platform '{platform}' not supported for web app")
}

pub fn build_type(request: &BuildRequest) -> Result<BuildType> {
    if request.release {
        return Ok(BuildType::Release);
    }
    BuildType::parse(request.build_type.as_deref())
}

pub fn build_destination(raw: Option<&str>) -> Result<String> {
    match raw {
        None => Ok(DEFAULT_BUILD_DESTINATION.to_string()),
        Some(dest) if BUILD_DESTINATIONS.contains(&dest) => Ok(dest.to_string()),
        Some(dest) => bail!("Destination {dest} not supported."),
    }
}

pub fn build_options(project: &Project, request: &BuildRequest) -> Result<BuildOptions> {
    let platform = platform(project, request.platform.as_deref())?;
    let paths = project.paths(&platform);
    let build_type = build_type(request)?;
    let (theme, themes) = themes(
        project,
        &paths,
        &platform,
        request.theme.as_deref(),
        request.themes.as_deref(),
    )?;
    let destination = if platform == "web" {
        DEFAULT_BUILD_DESTINATION.to_string()
    } else {
        build_destination(request.destination.as_deref())?
    };
    let build_config = request
        .build_config
        .as_deref()
        .map(|raw| build_config_path(project, raw));
    Ok(BuildOptions {
        platform,
        build_type,
        theme,
        themes,
        destination,
        destination_target: None,
        build_config,
        platform_options: request.platform_options.clone(),
        sass_compile: !request.no_sass,
        build_for_serve: false,
        user_options: request.user_options.clone(),
    })
}

/// `~` expands to home; relative paths resolve against the project root.
pub fn build_config_path(project: &Project, raw: &str) -> PathBuf {
    let expanded = expand_home(raw);
    if expanded.is_absolute() {
        expanded
    } else {
        project.join(expanded)
    }
}

/// Resolves `--theme` and `--themes` into the default theme and the extra themes.
pub fn themes(
    project: &Project,
    paths: &ConfiguredPaths,
    platform: &str,
    theme: Option<&str>,
    themes: Option<&str>,
) -> Result<(Theme, Vec<Theme>)> {
    let requested: Vec<String> = themes
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let default_str = match (theme, requested.first()) {
        (Some(theme), _) => Some(theme.to_string()),
        (None, Some(first)) => {
            let (name, theme_platform) = split_theme(first, platform);
            let name = if name == RESERVED_ALL { DEFAULT_THEME } else { name };
            let theme_platform = if theme_platform == RESERVED_ALL {
                platform
            } else {
                theme_platform
            };
            Some(format!("{name}:{theme_platform}"))
        }
        (None, None) => None,
    };
    let default = theme_object(project, paths, default_str.as_deref(), platform)?;

    let mut extra = Vec::new();
    if !requested.is_empty() {
        let default_key = default.key();
        for key in expand_themes(project, paths, &requested, platform)? {
            if key == default_key {
                continue;
            }
            extra.push(theme_object(project, paths, Some(&key), platform)?);
        }
    }
    Ok((default, extra))
}

fn split_theme<'a>(raw: &'a str, platform: &'a str) -> (&'a str, &'a str) {
    match raw.split_once(':') {
        Some((name, theme_platform)) => (name, theme_platform),
        None => (raw, platform),
    }
}

pub fn theme_object(
    project: &Project,
    paths: &ConfiguredPaths,
    raw: Option<&str>,
    platform: &str,
) -> Result<Theme> {
    let platform = platform.replace("browser", "web");
    let (name, theme_platform) = match raw {
        Some(raw) => {
            let raw = raw.replace("browser", "web");
            let (name, theme_platform) = split_theme(&raw, &platform);
            (name.to_string(), theme_platform.to_string())
        }
        None => (DEFAULT_THEME.to_string(), platform.clone()),
    };
    let compile = sass_compile(project, paths, &name, &theme_platform)?;
    let version = theme_version(project, paths, &name)?;
    Ok(Theme {
        name,
        platform: theme_platform,
        version,
        compile,
    })
}

fn sass_compile(
    project: &Project,
    paths: &ConfiguredPaths,
    name: &str,
    platform: &str,
) -> Result<bool> {
    if name == DEFAULT_THEME {
        return Ok(false);
    }
    if paths.src_themes_dir(&project.root).join(name).exists() {
        return Ok(true);
    }
    if paths.staging_themes_dir(&project.root).join(name).exists() {
        return Ok(false);
    }
    bail!(
        "Theme '{name}:{platform}' does not exist in {} or {}/{}",
        paths.staging.themes,
        paths.src.common,
        paths.src.themes
    )
}

/// Fails before staging starts when a theme needs compiling but no sass
/// compiler can be resolved.
pub fn sass_install(tools: &Toolbox, options: &BuildOptions) -> Result<()> {
    let needs_sass = options.sass_compile
        && std::iter::once(&options.theme)
            .chain(&options.themes)
            .any(|theme| theme.compile);
    if !needs_sass {
        return Ok(());
    }
    tools
        .get(Tool::Sass)
        .map(|_| ())
        .context("Please run 'ojet add sass' to configure your projects for SASS processing.")
}

fn theme_version(project: &Project, paths: &ConfiguredPaths, name: &str) -> Result<String> {
    if name == DEFAULT_THEME {
        return Ok(project.jet_version()?.unwrap_or_default());
    }
    let theme_json = paths
        .src_themes_dir(&project.root)
        .join(name)
        .join("theme.json");
    let Some(value) = json::read_json_opt::<Value>(&theme_json)? else {
        return Ok(String::new());
    };
    Ok(value
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

/// Custom themes found in the staging or source themes dirs.
pub fn all_themes(project: &Project, paths: &ConfiguredPaths) -> Result<Vec<String>> {
    let mut names = BTreeSet::new();
    for dir in [
        paths.staging_themes_dir(&project.root),
        paths.src_themes_dir(&project.root),
    ] {
        for name in list_dirs(&dir)? {
            if name != DEFAULT_THEME && !name.contains('.') {
                names.insert(name);
            }
        }
    }
    Ok(names.into_iter().collect())
}

fn theme_files_exist(project: &Project, paths: &ConfiguredPaths, name: &str, platform: &str) -> bool {
    paths
        .staging_themes_dir(&project.root)
        .join(name)
        .join(platform)
        .exists()
        || paths
            .src_themes_dir(&project.root)
            .join(name)
            .join(platform)
            .exists()
}

fn expand_themes(
    project: &Project,
    paths: &ConfiguredPaths,
    requested: &[String],
    platform: &str,
) -> Result<Vec<String>> {
    let all_all = format!("{RESERVED_ALL}:{RESERVED_ALL}");
    let first = requested.first().map(String::as_str);
    if first == Some(RESERVED_ALL) {
        return Ok(all_themes(project, paths)?
            .into_iter()
            .map(|name| format!("{name}:{platform}"))
            .collect());
    }
    if first == Some(all_all.as_str()) {
        let mut keys = Vec::new();
        for theme in all_themes(project, paths)? {
            keys.extend(platforms_with_files(project, paths, &theme));
        }
        for candidate in SUPPORTED_PLATFORMS {
            if *candidate == platform
                && theme_files_exist(project, paths, DEFAULT_THEME, candidate)
            {
                continue;
            }
            keys.push(format!("{DEFAULT_THEME}:{candidate}"));
        }
        return Ok(keys);
    }

    let mut keys = Vec::new();
    for raw in requested {
        let (name, theme_platform) = split_theme(raw, platform);
        if theme_platform == RESERVED_ALL {
            keys.extend(platforms_with_files(project, paths, name));
        } else if name == RESERVED_ALL {
            for theme in all_themes(project, paths)? {
                if theme_files_exist(project, paths, &theme, theme_platform) {
                    keys.push(format!("{theme}:{theme_platform}"));
                }
            }
        } else {
            keys.push(format!("{name}:{theme_platform}"));
        }
    }
    Ok(keys)
}

fn platforms_with_files(project: &Project, paths: &ConfiguredPaths, name: &str) -> Vec<String> {
    SUPPORTED_PLATFORMS
        .iter()
        .filter(|candidate| theme_files_exist(project, paths, name, candidate))
        .map(|candidate| format!("{name}:{candidate}"))
        .collect()
}

pub fn serve_options(project: &Project, request: &ServeRequest) -> Result<ServeOptions> {
    let mut build = build_options(project, &request.build)?;
    build.build_for_serve = true;
    let platform = build.platform.clone();

    let raw_destination = if request.server_only {
        Some("server-only".to_string())
    } else if let Some(browser) = &request.browser {
        Some(format!("browser:{browser}"))
    } else {
        request.build.destination.clone()
    };
    let (destination, destination_target) =
        serve_destination(project, &platform, raw_destination.as_deref())?;

    let livereload = livereload(build.build_type, request.livereload, &destination)?;
    let port = port(request.port.as_deref(), "server-port")?.unwrap_or(DEFAULT_PORT);
    let livereload_port = port_arg(request.livereload_port.as_deref())?;

    build.destination = if platform == "web" {
        DEFAULT_BUILD_DESTINATION.to_string()
    } else {
        destination.clone()
    };
    build.destination_target = destination_target.clone();

    Ok(ServeOptions {
        build: !request.skip_build,
        livereload,
        port,
        livereload_port,
        destination,
        destination_target,
        build_options: build,
    })
}

fn port_arg(raw: Option<&str>) -> Result<u16> {
    Ok(port(raw, "livereload-port")?.unwrap_or(DEFAULT_LIVERELOAD_PORT))
}

pub fn port(raw: Option<&str>, label: &str) -> Result<Option<u16>> {
    match raw {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<u16>() {
            Ok(port) => Ok(Some(port)),
            Err(_) => bail!("{label} must be a number, got '{raw}'"),
        },
    }
}

/// Splits `dest[:target]` and checks it against the platform's serve destinations.
pub fn serve_destination(
    project: &Project,
    platform: &str,
    raw: Option<&str>,
) -> Result<(String, Option<String>)> {
    let (dest, target) = match raw {
        Some(raw) => match raw.split_once(':') {
            Some((dest, target)) => (Some(dest), Some(target)),
            None => (Some(raw), None),
        },
        None => (None, None),
    };

    if platform == "web" {
        if let Some(dest) = dest {
            if !SERVE_WEB_DESTINATIONS.contains(&dest) {
                bail!(
                    "Destination '{}' not supported. Please use '--destination=[<{}>]'",
                    raw.unwrap_or_default(),
                    SERVE_WEB_DESTINATIONS.join(",")
                );
            }
            return Ok((dest.to_string(), None));
        }
        return Ok((String::new(), None));
    }

    let Some(dest) = dest else {
        return Ok(("emulator".to_string(), None));
    };
    if !SERVE_HYBRID_DESTINATIONS.contains(&dest) {
        bail!(
            "Destination '{}' not supported. Please use '--destination=[<{}>]'",
            raw.unwrap_or_default(),
            SERVE_HYBRID_DESTINATIONS.join(",")
        );
    }
    let target = match target.filter(|target| !target.is_empty() && *target != "true") {
        Some(target) if dest == "browser" => {
            if !SUPPORTED_BROWSERS.contains(&target) {
                bail!(
                    "Browser '{target}' not supported. Please use '--browser=[<{}>]'",
                    SUPPORTED_BROWSERS.join(",")
                );
            }
            Some(target.to_string())
        }
        Some(target) => Some(target.to_string()),
        None if dest == "browser" => Some(
            project
                .config
                .default_browser
                .clone()
                .unwrap_or_else(|| DEFAULT_BROWSER.to_string()),
        ),
        None => None,
    };
    Ok((dest.to_string(), target))
}

pub fn livereload(build_type: BuildType, requested: Option<bool>, destination: &str) -> Result<bool> {
    let mut enabled = match (build_type, requested) {
        (BuildType::Release, Some(true)) => bail!("Livereload can't be used for release build"),
        (BuildType::Release, _) => {
            warn!("Livereload can't be used for release mode. Turning it off.");
            false
        }
        (BuildType::Dev, Some(value)) => value,
        (BuildType::Dev, None) => true,
    };
    if destination == "device" && enabled {
        warn!("Livereload can't be used on the device. Turning it off.");
        enabled = false;
    }
    Ok(enabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn web_project() -> (TempDir, Project) {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src/js")).unwrap();
        let project = Project::load(temp.path()).unwrap();
        (temp, project)
    }

    fn sass_options(project: &Project, compile: bool) -> BuildOptions {
        let mut options = build_options(project, &BuildRequest::default()).unwrap();
        options.theme.compile = compile;
        options
    }

    fn sass_tools(root: &std::path::Path, sass: &std::path::Path) -> Toolbox {
        let mut config = crate::config::ToolConfig::default();
        config.tools.insert(
            "sass".into(),
            crate::config::ToolEntry {
                path: Some(sass.to_path_buf()),
            },
        );
        Toolbox::new(config, root)
    }

    #[test]
    fn sass_install_required_only_for_compiled_themes() {
        let (temp, project) = web_project();
        let missing = sass_tools(temp.path(), &temp.path().join("no-such-sass"));
        assert!(sass_install(&missing, &sass_options(&project, false)).is_ok());

        let err = sass_install(&missing, &sass_options(&project, true)).unwrap_err();
        assert!(err.to_string().contains("ojet add sass"));

        let mut skipped = sass_options(&project, true);
        skipped.sass_compile = false;
        assert!(sass_install(&missing, &skipped).is_ok());

        let sass = temp.path().join("sass");
        fs::write(&sass, "").unwrap();
        assert!(sass_install(&sass_tools(temp.path(), &sass), &sass_options(&project, true)).is_ok());
    }

    #[test]
    fn web_app_accepts_only_web() {
        let (_temp, project) = web_project();
        assert_eq!(platform(&project, None).unwrap(), "web");
        let err = platform(&project, Some("android")).unwrap_err();
        assert_eq!(err.to_string(), "Platform 'android' not supported for web app");
    }

    #[test]
    fn hybrid_app_requires_hybrid_platform() {
        let (temp, project) = web_project();
        fs::create_dir_all(temp.path().join("hybrid")).unwrap();
        assert_eq!(platform(&project, Some("ios")).unwrap(), "ios");
        assert!(platform(&project, Some("web")).is_err());
        assert!(platform(&project, None).is_err());
    }

    #[test]
    fn platform_sources_allow_any_supported_platform() {
        let (temp, project) = web_project();
        fs::create_dir_all(temp.path().join("src-hybrid")).unwrap();
        assert_eq!(platform(&project, Some("windows")).unwrap(), "windows");
        assert!(platform(&project, Some("blackberry")).is_err());
    }

    #[test]
    fn default_theme_is_alta_with_jet_version() {
        let (temp, project) = web_project();
        fs::create_dir_all(temp.path().join("node_modules/@oracle/oraclejet")).unwrap();
        fs::write(
            temp.path().join("node_modules/@oracle/oraclejet/package.json"),
            r#"{"version":"8.0.0"}"#,
        )
        .unwrap();
        let paths = project.paths("web");
        let (theme, extra) = themes(&project, &paths, "web", None, None).unwrap();
        assert_eq!(theme.name, "alta");
        assert_eq!(theme.platform, "web");
        assert_eq!(theme.version, "8.0.0");
        assert!(!theme.compile);
        assert!(extra.is_empty());
    }

    #[test]
    fn custom_theme_compiles_from_source() {
        let (temp, project) = web_project();
        let theme_dir = temp.path().join("src/themes/mytheme");
        fs::create_dir_all(theme_dir.join("web")).unwrap();
        fs::write(theme_dir.join("theme.json"), r#"{"version":"2.1.0"}"#).unwrap();
        let paths = project.paths("web");
        let theme = theme_object(&project, &paths, Some("mytheme:browser"), "web").unwrap();
        assert_eq!(theme.platform, "web");
        assert!(theme.compile);
        assert_eq!(theme.version, "2.1.0");
    }

    #[test]
    fn unknown_theme_is_rejected() {
        let (_temp, project) = web_project();
        let paths = project.paths("web");
        let err = theme_object(&project, &paths, Some("ghost"), "web").unwrap_err();
        assert!(err.to_string().starts_with("Theme 'ghost:web' does not exist"));
    }

    #[test]
    fn themes_all_expands_and_drops_default() {
        let (temp, project) = web_project();
        for name in ["blue", "red", "alta", "notes.txt"] {
            fs::create_dir_all(temp.path().join("src/themes").join(name).join("web")).unwrap();
        }
        let paths = project.paths("web");
        let (theme, extra) =
            themes(&project, &paths, "web", Some("blue"), Some("all")).unwrap();
        assert_eq!(theme.name, "blue");
        let names: Vec<_> = extra.iter().map(Theme::key).collect();
        assert_eq!(names, vec!["red:web"]);
    }

    #[test]
    fn themes_name_all_uses_platforms_with_files() {
        let (temp, project) = web_project();
        fs::create_dir_all(temp.path().join("src/themes/blue/web")).unwrap();
        fs::create_dir_all(temp.path().join("src/themes/blue/ios")).unwrap();
        let paths = project.paths("web");
        let (theme, extra) = themes(&project, &paths, "web", None, Some("blue:all")).unwrap();
        assert_eq!(theme.key(), "blue:web");
        let keys: Vec<_> = extra.iter().map(Theme::key).collect();
        assert_eq!(keys, vec!["blue:ios"]);
    }

    #[test]
    fn serve_destination_rules() {
        let (_temp, project) = web_project();
        assert_eq!(
            serve_destination(&project, "web", Some("server-only")).unwrap(),
            ("server-only".to_string(), None)
        );
        assert!(serve_destination(&project, "web", Some("device")).is_err());
        assert_eq!(
            serve_destination(&project, "android", None).unwrap(),
            ("emulator".to_string(), None)
        );
        assert_eq!(
            serve_destination(&project, "android", Some("browser")).unwrap(),
            ("browser".to_string(), Some("chrome".to_string()))
        );
        assert!(serve_destination(&project, "android", Some("browser:lynx")).is_err());
        assert_eq!(
            serve_destination(&project, "ios", Some("emulator:iPhone-8")).unwrap(),
            ("emulator".to_string(), Some("iPhone-8".to_string()))
        );
    }

    #[test]
    fn livereload_conditions() {
        assert!(livereload(BuildType::Dev, None, "emulator").unwrap());
        assert!(!livereload(BuildType::Release, None, "").unwrap());
        assert!(livereload(BuildType::Release, Some(true), "").is_err());
        assert!(!livereload(BuildType::Dev, None, "device").unwrap());
        assert!(!livereload(BuildType::Dev, Some(false), "").unwrap());
    }

    #[test]
    fn ports_must_be_numeric() {
        assert_eq!(port(Some("9000"), "server-port").unwrap(), Some(9000));
        assert!(port(Some("abc"), "server-port").is_err());
        assert_eq!(port(None, "server-port").unwrap(), None);
    }
}
