//! Staging copies: sources, libraries and components.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::build::{BuildContext, minify};
use crate::constants::{
    COMPONENT_JSON, DEFAULT_THEME, MAIN_TEMP_JS, NODE_MODULES, PATH_TO_ORACLEJET,
    SUPPORTED_PLATFORMS, VERSION_TOKEN,
};
use crate::fileset::{self, FileSpec};
use crate::project::ComponentManifest;
use crate::project::mapping::PathMapping;
use crate::util::fs as ufs;

pub fn clean(ctx: &BuildContext) -> Result<()> {
    info!("Cleaning staging path.");
    ufs::empty_dir(&ctx.staging())
}

fn spec(cwd: PathBuf, src: Vec<String>, dest: PathBuf) -> FileSpec {
    FileSpec {
        cwd,
        src,
        dest,
        rename: None,
    }
}

/// Patterns selecting what `src.common` contributes to staging.
pub fn source_patterns(ctx: &BuildContext) -> Vec<String> {
    let js = &ctx.paths.src.javascript;
    let themes = &ctx.paths.staging.themes;
    let composites = &ctx.paths.composites;
    if ctx.release() {
        vec![
            "**".into(),
            format!("!{js}/**/*.js"),
            format!("{js}/main.js"),
            format!("{js}/libs/**"),
            format!("!{js}/libs/**/*debug*"),
            format!("!{js}/libs/**/*debug*/**"),
            format!("!{js}/main-release-paths.json"),
            format!("!{themes}/**"),
            format!("!{js}/{composites}/**"),
            "!cordova.js".into(),
        ]
    } else {
        vec![
            "**".into(),
            format!("!{js}/{composites}/**"),
            format!("!{js}/main-release-paths.json"),
            format!("!{themes}/**"),
        ]
    }
}

pub fn source_specs(ctx: &BuildContext) -> Vec<FileSpec> {
    let root = ctx.root();
    let staging = ctx.staging();
    let mut theme_patterns = vec!["**".to_string(), "!**/*.scss".to_string()];
    if ctx.release() {
        theme_patterns.push("!**/*.map".into());
    }
    vec![
        spec(
            root.join(&ctx.paths.src.common),
            source_patterns(ctx),
            staging.clone(),
        ),
        spec(
            root.join(&ctx.paths.platform_specific),
            vec!["**".into()],
            staging,
        ),
        spec(
            ctx.paths.src_themes_dir(root),
            theme_patterns,
            ctx.paths.staging_themes_dir(root),
        ),
    ]
}

pub fn copy_sources(ctx: &BuildContext) -> Result<()> {
    info!("Copy files to staging directory.");
    let copied = fileset::copy_all(&source_specs(ctx))?;
    debug!("Copied {copied} source files.");
    copy_exchange_components(ctx)?;
    info!("Copy finished.");
    Ok(())
}

/// `jet_components/<name>` to `<staging>/js/jet-composites/<name>/<version>`.
fn copy_exchange_components(ctx: &BuildContext) -> Result<()> {
    let base = ctx.paths.components_dir(ctx.root());
    let dest_base = ctx.paths.staging_composites_dir(ctx.root());
    for name in ufs::list_dirs(&base)? {
        let dir = base.join(&name);
        let Some(manifest) = ComponentManifest::load_opt(&dir)? else {
            warn!("Missing the definition file '{COMPONENT_JSON}' for component / pack '{name}'.");
            continue;
        };
        let Some(version) = manifest.version.as_deref() else {
            bail!("Missing property 'version' in '{name}' component's/pack's definition file.");
        };
        ufs::copy_dir(&dir, &dest_base.join(&name).join(version))?;
    }
    Ok(())
}

fn apply_version_token(raw: &str, lib: &str, versions: &std::collections::BTreeMap<String, String>) -> String {
    match versions.get(lib) {
        Some(version) => raw.replace(VERSION_TOKEN, version),
        None => raw.to_string(),
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

/// Copy specs for every non-CDN library in `path_mapping.json`.
pub fn mapping_lib_specs(
    ctx: &BuildContext,
    mapping: &PathMapping,
    versions: &std::collections::BTreeMap<String, String>,
) -> Vec<FileSpec> {
    let flavor = ctx.options.build_type.flavor();
    let base_url = mapping
        .base_url
        .clone()
        .unwrap_or_else(|| ctx.paths.src.javascript.clone());
    let mut specs = Vec::new();
    for (name, lib) in &mapping.libs {
        if mapping.is_cdn_lib(lib, flavor) {
            continue;
        }
        let Some(build) = lib.build(flavor) else {
            continue;
        };
        let Some(src) = build.src.as_ref().map(|src| src.to_vec()) else {
            continue;
        };
        let Some(path) = build.path.as_deref() else {
            warn!("Library '{name}' has no path in {}, skipping copy.", crate::constants::PATH_MAPPING_FILE);
            continue;
        };
        let mut cwd = ctx.root().join(lib.cwd.as_deref().unwrap_or_default());
        if let Some(extra) = build.cwd.as_deref() {
            cwd = cwd.join(extra);
        }
        let path = apply_version_token(path, name, versions);
        let ext = Path::new(&path).extension().and_then(|ext| ext.to_str());
        let dest_rel = match ext {
            None | Some("min") => PathBuf::from(&path),
            Some(_) => Path::new(&path)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        let path_name = Path::new(&path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        let rename = match (src.as_slice(), path_name) {
            ([single], Some(target)) if !is_glob(single) => {
                let single_name = Path::new(single)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned());
                (single_name.as_deref() != Some(target.as_str())).then_some(target)
            }
            _ => None,
        };
        specs.push(FileSpec {
            cwd,
            src,
            dest: ctx.staging().join(&base_url).join(dest_rel),
            rename,
        });
    }
    specs
}

/// Libraries that are always staged regardless of `path_mapping.json`.
pub fn fixed_lib_specs(ctx: &BuildContext, jet_version: Option<&str>) -> Vec<FileSpec> {
    let root = ctx.root();
    let libs = ctx.staging_js().join("libs");
    let themes = ctx.paths.staging_themes_dir(root);
    let dist = root.join(PATH_TO_ORACLEJET);
    let mut specs = vec![spec(
        root.join(NODE_MODULES).join("requirejs"),
        vec!["*.js".into()],
        libs.join("require"),
    )];
    for (skin, platform) in [
        ("alta", "web"),
        ("alta-windows", "windows"),
        ("alta-android", "android"),
        ("alta-ios", "ios"),
        ("common", "common"),
    ] {
        specs.push(spec(
            dist.join("css").join(skin),
            vec!["**".into()],
            themes.join(DEFAULT_THEME).join(platform),
        ));
    }
    if let Some(jet) = jet_version {
        specs.push(spec(
            dist.join("js/libs/oj/resources/nls"),
            vec!["*.js".into()],
            libs.join(format!("oj/v{jet}/resources/root")),
        ));
    }
    specs
}

fn copy_test_libs(ctx: &BuildContext) -> Result<()> {
    let tests = ctx.root().join(&ctx.paths.src.common).join(&ctx.paths.src.tests);
    if ctx.release() || !tests.exists() {
        return Ok(());
    }
    let modules = ctx.root().join(NODE_MODULES);
    let dest = ctx.staging_js().join("libs");
    for (src, target) in [
        ("qunit-reporter-junit/qunit-reporter-junit.js", "qunit/qunit-reporter-junit.js"),
        ("qunit/qunit/qunit.js", "qunit/qunit.js"),
        ("qunit/qunit/qunit.css", "qunit/qunit.css"),
    ] {
        let from = modules.join(src);
        if from.is_file() {
            ufs::copy_file(&from, &dest.join(target))?;
        }
    }
    Ok(())
}

pub fn copy_libs(ctx: &BuildContext) -> Result<()> {
    info!("Copy library files to staging directory.");
    let mapping = ctx.project.path_mapping(&ctx.paths)?;
    let versions = ctx.project.lib_versions()?;
    let mut specs = fixed_lib_specs(ctx, versions.get("ojs").map(String::as_str));
    specs.extend(mapping_lib_specs(ctx, &mapping, &versions));
    fileset::copy_all(&specs)?;
    copy_test_libs(ctx)?;
    rename_alta_files(&ctx.paths.staging_themes_dir(ctx.root()))?;
    info!("Copy finished.");
    Ok(())
}

/// The JET dist ships `oj-alta*.css`; the injected link expects `alta*.css`.
pub fn rename_alta_files(themes: &Path) -> Result<()> {
    for platform in SUPPORTED_PLATFORMS {
        let dir = themes.join(DEFAULT_THEME).join(platform);
        for (from, to) in [("oj-alta.css", "alta.css"), ("oj-alta-min.css", "alta.min.css")] {
            let src = dir.join(from);
            if src.is_file() {
                fs::rename(&src, dir.join(to))
                    .with_context(|| format!("failed to rename {}", src.display()))?;
            }
        }
    }
    Ok(())
}

pub fn copy_reference_components(ctx: &BuildContext) -> Result<()> {
    info!("Copy reference components to staging directory.");
    let libs = ctx.staging_js().join("libs");
    let modules = ctx.root().join(NODE_MODULES);
    for (name, manifest) in ctx.project.installed_components(&ctx.paths)? {
        let Some(manifest) = manifest.filter(ComponentManifest::is_reference) else {
            continue;
        };
        let Some(init) = manifest.reference_init(ctx.release()) else {
            continue;
        };
        if !init.npm {
            continue;
        }
        let Some(package) = manifest.package.as_deref() else {
            warn!("Reference component '{name}' has no package, skipping.");
            continue;
        };
        let file_name = init.path.rsplit('/').next().unwrap_or(&init.path).to_string();
        let src = modules.join(package).join(&init.path);
        let dest = libs.join(package).join(&file_name);
        if src.is_dir() {
            ufs::copy_dir(&src, &dest)?;
        } else if src.is_file() {
            ufs::copy_file(&src, &dest)?;
        } else {
            let src_js = modules.join(package).join(format!("{}.js", init.path));
            if src_js.is_file() {
                ufs::copy_file(&src_js, &libs.join(package).join(format!("{file_name}.js")))?;
            }
        }
    }
    info!("Copy finished.");
    Ok(())
}

/// Stages one local composite for debug and `min`, then minifies the `min` copy.
pub fn stage_local_component(ctx: &BuildContext, src_dir: &Path, dest_base: &Path) -> Result<PathBuf> {
    let name = src_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let manifest = ComponentManifest::load(src_dir)?;
    let Some(version) = manifest.version.as_deref() else {
        bail!("Missing property 'version' in '{name}' component's/pack's definition file.");
    };
    let dest = dest_base.join(&name).join(version);
    ufs::remove_path(&dest)?;
    ufs::copy_dir(src_dir, &dest)?;
    let min = dest.join("min");
    ufs::copy_dir_filtered(src_dir, &min, |rel| !ufs::slash(rel).contains("min"))?;
    minify::minify_dir(ctx, &min)?;
    Ok(dest)
}

pub fn copy_local_components(ctx: &BuildContext) -> Result<()> {
    let src_base = ctx.paths.src_composites_dir(ctx.root());
    let dest_base = ctx.paths.staging_composites_dir(ctx.root());
    for name in ufs::list_dirs(&src_base)? {
        let dir = src_base.join(&name);
        if !dir.join(COMPONENT_JSON).is_file() {
            continue;
        }
        stage_local_component(ctx, &dir, &dest_base)?;
    }
    Ok(())
}

/// Windows resolves locale bundles through a `locale_` prefix.
pub fn fix_windows_locale(ctx: &BuildContext) -> Result<()> {
    if ctx.options.platform != "windows" {
        return Ok(());
    }
    let jet = ctx.jet_version()?;
    let nls = ctx
        .staging_js()
        .join(format!("libs/oj/v{jet}/resources/nls"));
    if !nls.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(&nls).with_context(|| format!("failed to read {}", nls.display()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".js") || name.contains("locale") {
            continue;
        }
        let dest = nls.join(format!("locale_{name}"));
        ufs::remove_path(&dest)?;
        fs::rename(entry.path(), &dest)
            .with_context(|| format!("failed to rename {}", entry.path().display()))?;
    }
    Ok(())
}

pub fn clean_temp(ctx: &BuildContext) -> Result<()> {
    info!("Cleaning mainTemp.");
    ufs::remove_path(&ctx.staging_js().join(MAIN_TEMP_JS))
}
