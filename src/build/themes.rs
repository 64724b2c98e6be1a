//! Staging of compiled themes into the served css directory.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::build::BuildContext;
use crate::constants::{COMMON_THEME_DIR, DEFAULT_THEME};
use crate::options::Theme;
use crate::util::fs as ufs;

/// `<base>/<css>/<name>/<version>`; the version segment is dropped when empty.
fn css_theme_dir(base: &Path, styles: &str, theme: &Theme) -> PathBuf {
    let dir = base.join(styles).join(&theme.name);
    if theme.version.is_empty() {
        dir
    } else {
        dir.join(&theme.version)
    }
}

/// Root that the running server reads from during livereload.
fn served_root(ctx: &BuildContext) -> PathBuf {
    let staging = ctx.staging();
    if ctx.options.is_web() {
        return staging;
    }
    let hybrid = ctx.root().join(&ctx.paths.staging.hybrid);
    match ctx.serve_destination.as_deref() {
        Some("browser") => hybrid.join("platforms/browser/www"),
        _ => hybrid
            .join("platforms")
            .join(&ctx.options.platform)
            .join("assets/www"),
    }
}

fn copy_if_exists(src: &Path, dest: &Path) -> Result<()> {
    if src.exists() {
        ufs::copy_dir(src, dest)?;
    }
    Ok(())
}

/// Copies non-scss files of `src/themes/<name>/{common,<platform>}` into the
/// staged themes dir.
fn copy_src_resources(ctx: &BuildContext, theme: &Theme) -> Result<()> {
    let root = ctx.root();
    let src = ctx.paths.src_themes_dir(root).join(&theme.name);
    let dest = ctx.paths.staging_themes_dir(root).join(&theme.name);
    for dir in [COMMON_THEME_DIR, theme.platform.as_str()] {
        let from = src.join(dir);
        let to = dest.join(dir);
        ufs::ensure_dir(&to)?;
        if from.is_dir() {
            ufs::copy_dir_filtered(&from, &to, |rel| {
                rel.extension().is_none_or(|ext| ext != "scss")
            })?;
        }
    }
    Ok(())
}

/// Custom themes reference alta's fonts and images by relative path.
fn copy_alta_resources(ctx: &BuildContext, theme: &Theme) -> Result<()> {
    let root = ctx.root();
    let alta = ctx.paths.staging_themes_dir(root).join(DEFAULT_THEME);
    let jet = ctx.jet_version()?;
    let dest = ctx
        .staging()
        .join(&ctx.paths.src.styles)
        .join(DEFAULT_THEME)
        .join(jet);
    copy_if_exists(&alta.join(COMMON_THEME_DIR), &dest.join(COMMON_THEME_DIR))?;
    for dir in ["fonts", "images"] {
        copy_if_exists(
            &alta.join(&theme.platform).join(dir),
            &dest.join(&theme.platform).join(dir),
        )?;
    }
    Ok(())
}

fn stage_theme(ctx: &BuildContext, theme: &Theme, base: &Path) -> Result<()> {
    let themes = ctx.paths.staging_themes_dir(ctx.root()).join(&theme.name);
    let dest = css_theme_dir(base, &ctx.paths.src.styles, theme);
    copy_if_exists(&themes.join(&theme.platform), &dest.join(&theme.platform))?;
    copy_if_exists(&themes.join(COMMON_THEME_DIR), &dest.join(COMMON_THEME_DIR))
}

pub fn copy_themes(ctx: &BuildContext) -> Result<()> {
    info!("Running theme copy task.");
    let theme = ctx.live.theme.as_ref().unwrap_or(&ctx.options.theme);
    let css_only = ctx.live.css_only;

    if theme.name != DEFAULT_THEME && !css_only {
        copy_src_resources(ctx, theme)?;
        copy_alta_resources(ctx, theme)?;
    }
    for extra in &ctx.options.themes {
        copy_src_resources(ctx, extra)?;
    }

    let base = if css_only { served_root(ctx) } else { ctx.staging() };
    stage_theme(ctx, theme, &base)?;
    if !css_only {
        for extra in &ctx.options.themes {
            stage_theme(ctx, extra, &base)?;
        }
    }
    info!("Theme copy task finished.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::tests_support::context;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    #[test]
    fn custom_theme_brings_alta_resources() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "node_modules/@oracle/oraclejet/package.json");
        fs::write(
            root.join("node_modules/@oracle/oraclejet/package.json"),
            r#"{"version":"8.0.0"}"#,
        )
        .unwrap();
        write(root, "src/themes/mytheme/web/mytheme.scss");
        write(root, "src/themes/mytheme/web/images/logo.png");
        write(root, "themes/mytheme/web/mytheme.css");
        write(root, "themes/alta/common/fonts/a.woff");
        write(root, "themes/alta/web/images/b.png");

        let mut ctx = context(root, "web", false);
        ctx.options.theme = Theme {
            name: "mytheme".into(),
            platform: "web".into(),
            version: "1.0.0".into(),
            compile: true,
        };
        copy_themes(&ctx).unwrap();
        assert!(root.join("themes/mytheme/web/images/logo.png").exists());
        assert!(!root.join("themes/mytheme/web/mytheme.scss").exists());
        assert!(root.join("web/css/mytheme/1.0.0/web/mytheme.css").exists());
        assert!(root.join("web/css/mytheme/1.0.0/web/images/logo.png").exists());
        assert!(root.join("web/css/alta/8.0.0/common/fonts/a.woff").exists());
        assert!(root.join("web/css/alta/8.0.0/web/images/b.png").exists());
    }

    #[test]
    fn css_only_targets_platform_www() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "themes/alta/android/alta.css");
        let mut ctx = context(root, "android", false);
        ctx.options.theme.version = "8.0.0".into();
        ctx.live.css_only = true;
        copy_themes(&ctx).unwrap();
        assert!(
            root.join("hybrid/platforms/android/assets/www/css/alta/8.0.0/android/alta.css")
                .exists()
        );
        assert!(!root.join("hybrid/www/css").exists());
    }
}
