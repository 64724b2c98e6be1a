//! Require.js path mapping for `main.js` and the r.js optimizer config.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::build::BuildContext;
use crate::constants::{
    MAIN_JS, MAIN_TEMP_JS, REQUIRE_PLUGINS, VERSION_TOKEN,
};
use crate::inject;
use crate::project::mapping::{MappingFlavor, PathMapping};
use crate::project::{ComponentEntry, ComponentManifest, ConfiguredPaths, Project};
use crate::util::fs::slash;

const EMPTY: &str = "empty:";

/// Options written to `rjs-build.json` for the optimizer run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RjsConfig {
    pub base_url: String,
    pub name: String,
    pub main_config_file: String,
    pub optimize: String,
    pub out: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub paths: BTreeMap<String, String>,
    pub exclude: Vec<String>,
}

fn version_token(path: &str, lib: &str, versions: &BTreeMap<String, String>) -> String {
    match versions.get(lib) {
        Some(version) => path.replace(VERSION_TOKEN, version),
        None => path.to_string(),
    }
}

/// `^1.2.0` and `~1.2.0` become `1.2.0`.
fn plain_version(version: &str) -> &str {
    match version.chars().next() {
        Some(first) if !first.is_ascii_digit() => &version[first.len_utf8()..],
        _ => version,
    }
}

fn lib_paths(
    mapping: &PathMapping,
    flavor: MappingFlavor,
    versions: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (name, lib) in &mapping.libs {
        let Some(build) = lib.build(flavor) else {
            continue;
        };
        if mapping.is_cdn_lib(lib, flavor) {
            if mapping.is_cdn_bundle(lib) {
                continue;
            }
            let prefix = lib
                .cdn
                .as_deref()
                .and_then(|cdn| mapping.cdns.get(cdn))
                .map(|cdn| cdn.prefix())
                .unwrap_or_default();
            let cdn_path = build.cdn_path.as_deref().unwrap_or_default();
            out.insert(name.clone(), format!("{prefix}/{cdn_path}"));
            continue;
        }
        let Some(path) = build.path.as_deref() else {
            continue;
        };
        let path = version_token(path, name, versions);
        let path = path.strip_suffix(".js").unwrap_or(&path).to_string();
        out.insert(name.clone(), path);
    }
    if flavor == MappingFlavor::Release {
        out.insert("css-builder".into(), "libs/require-css/css-builder".into());
        out.insert("normalize".into(), "libs/require-css/normalize".into());
    }
    out
}

/// Require path for a reference component's init file.
fn reference_path(manifest: &ComponentManifest, release: bool) -> Option<String> {
    let init = manifest.reference_init(release)?;
    if !init.npm {
        return Some(init.path);
    }
    let package = manifest.package.as_deref()?;
    let file = init.path.rsplit('/').next().unwrap_or(&init.path);
    Some(format!("libs/{package}/{}", file.replacen(".js", "", 1)))
}

/// True when a minified build of the component is shipped.
fn is_minified(project: &Project, paths: &ConfiguredPaths, name: &str, version: &str) -> bool {
    paths
        .components_dir(&project.root)
        .join(name)
        .join(version)
        .join("min")
        .exists()
        || paths
            .src_composites_dir(&project.root)
            .join(name)
            .join(version)
            .join("min")
            .exists()
}

fn config_component_paths(
    project: &Project,
    paths: &ConfiguredPaths,
    release: bool,
) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for (name, entry) in &project.config.components {
        let dir = paths.components_dir(&project.root).join(name);
        let Some(manifest) = ComponentManifest::load_opt(&dir)? else {
            warn!("Component '{name}' is listed in the config file but not installed.");
            continue;
        };
        if manifest.is_reference() {
            let key = manifest.reference_key().unwrap_or(name).to_string();
            if let Some(path) = reference_path(&manifest, release) {
                out.insert(key, path);
            }
            continue;
        }
        let version = manifest
            .version
            .as_deref()
            .or_else(|| entry.version())
            .map(plain_version)
            .unwrap_or_default()
            .to_string();
        let mut path = format!("{}/{name}/{version}", paths.composites);
        if release && is_minified(project, paths, name, &version) {
            path.push_str("/min");
        }
        out.insert(name.clone(), path);
    }
    Ok(out)
}

fn reference_component_paths(
    project: &Project,
    paths: &ConfiguredPaths,
    release: bool,
) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for (_, manifest) in project.installed_components(paths)? {
        let Some(manifest) = manifest.filter(ComponentManifest::is_reference) else {
            continue;
        };
        let (Some(key), Some(path)) = (manifest.reference_key(), reference_path(&manifest, release))
        else {
            continue;
        };
        out.insert(key.to_string(), path);
    }
    Ok(out)
}

/// Version of every local composite, keyed by component name.
pub fn local_component_versions(
    project: &Project,
    paths: &ConfiguredPaths,
) -> Result<BTreeMap<String, String>> {
    Ok(project
        .local_components(paths)?
        .into_iter()
        .map(|(name, manifest)| (name, manifest.version.unwrap_or_else(|| "1.0.0".into())))
        .collect())
}

fn local_component_paths(
    project: &Project,
    paths: &ConfiguredPaths,
    release: bool,
) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for (name, manifest) in project.local_components(paths)? {
        let version = manifest.version.as_deref().unwrap_or("1.0.0");
        match manifest.pack.as_deref() {
            None => {
                let mut path = format!("{}/{name}/{version}", paths.composites);
                if release {
                    path.push_str("/min");
                }
                out.insert(name, path);
            }
            Some(pack) => {
                out.entry(pack.to_string())
                    .or_insert_with(|| format!("{}/{pack}/{version}", paths.composites));
            }
        }
    }
    Ok(out)
}

/// Full require.js `paths` for a build. Later sources override earlier ones:
/// libraries, configured components, reference components, local composites.
pub fn path_mapping(ctx: &BuildContext) -> Result<BTreeMap<String, String>> {
    let project = &ctx.project;
    let release = ctx.release();
    let mapping = project.path_mapping(&ctx.paths)?;
    let versions = project.lib_versions()?;
    let mut out = lib_paths(&mapping, ctx.options.build_type.flavor(), &versions);
    out.extend(config_component_paths(project, &ctx.paths, release)?);
    out.extend(reference_component_paths(project, &ctx.paths, release)?);
    out.extend(local_component_paths(project, &ctx.paths, release)?);
    Ok(out)
}

/// Optimizer config; CDN-served modules are marked `empty:` so r.js skips them.
pub fn rjs_config(ctx: &BuildContext) -> Result<RjsConfig> {
    let project = &ctx.project;
    let flavor = ctx.options.build_type.flavor();
    let mapping = project.path_mapping(&ctx.paths)?;
    let js = slash(&ctx.staging_js());
    let mut paths = BTreeMap::new();

    for (name, lib) in &mapping.libs {
        let plugin = flavor == MappingFlavor::Release && REQUIRE_PLUGINS.contains(&name.as_str());
        if !plugin && mapping.is_cdn_lib(lib, flavor) {
            paths.insert(name.clone(), EMPTY.to_string());
        }
    }
    for (dir, manifest) in project.installed_components(&ctx.paths)? {
        let Some(manifest) = manifest.filter(ComponentManifest::is_reference) else {
            continue;
        };
        if mapping.uses_cdn() && manifest.has_cdn_paths() {
            let key = manifest
                .paths
                .as_ref()
                .and_then(|paths| paths.name.clone())
                .unwrap_or(dir);
            paths.insert(key, EMPTY.to_string());
        }
    }
    if ctx.release() {
        for (name, entry) in &project.config.components {
            let version = match entry {
                ComponentEntry::Version(version) => version.as_str(),
                ComponentEntry::Pack(pack) => pack.version.as_deref().unwrap_or_default(),
            };
            if is_minified(project, &ctx.paths, name, version) {
                paths.insert(name.clone(), EMPTY.to_string());
            }
        }
    }

    Ok(RjsConfig {
        base_url: js.clone(),
        name: "main-temp".into(),
        main_config_file: format!("{js}/{MAIN_TEMP_JS}"),
        optimize: "none".into(),
        out: format!("{js}/{MAIN_JS}"),
        paths,
        exclude: vec!["css-builder".into(), "normalize".into()],
    })
}

pub fn inject_paths(ctx: &BuildContext) -> Result<()> {
    info!("Running injection tasks.");
    let mapping = path_mapping(ctx)?;
    let base_url = ctx.project.path_mapping(&ctx.paths)?.base_url;
    let windows = ctx.options.platform == "windows";
    let js = ctx.staging_js();
    let dest = if ctx.release() { MAIN_TEMP_JS } else { MAIN_JS };
    inject::inject_paths(
        &js.join(MAIN_JS),
        &js.join(dest),
        &mapping,
        base_url.as_deref(),
        windows,
    )?;

    let test_main = ctx
        .staging()
        .join(&ctx.paths.src.tests)
        .join(&ctx.paths.src.javascript)
        .join(MAIN_JS);
    inject_test_main(&test_main, &mapping, base_url.as_deref(), windows)?;
    info!("Task main.js paths injection finished.");
    Ok(())
}

fn inject_test_main(
    main: &Path,
    mapping: &BTreeMap<String, String>,
    base_url: Option<&str>,
    windows: bool,
) -> Result<()> {
    if main.is_file() {
        inject::inject_paths(main, main, mapping, base_url, windows)?;
    }
    Ok(())
}
