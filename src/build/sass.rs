//! Theme and composite sass compilation through the `sass` executable.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::build::BuildContext;
use crate::constants::DEFAULT_PACK_VERSION;
use crate::delegate::Tool;
use crate::fileset::glob_files;
use crate::options::{BuildType, Theme};
use crate::project::ComponentManifest;

const SASS_PATTERNS: &[&str] = &["**/*.scss", "!**/_*.scss"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SassTask {
    pub src: PathBuf,
    pub dest: PathBuf,
    /// Top directory of the composite the file belongs to.
    pub component: Option<String>,
}

fn css_name(rel: &Path, build_type: BuildType) -> PathBuf {
    let stem = rel
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{stem}{}", build_type.css_ext());
    match rel.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

pub fn theme_tasks(ctx: &BuildContext, theme: &Theme) -> Result<Vec<SassTask>> {
    let root = ctx.root();
    let cwd = ctx
        .paths
        .src_themes_dir(root)
        .join(&theme.name)
        .join(&theme.platform);
    let dest = ctx
        .paths
        .staging_themes_dir(root)
        .join(&theme.name)
        .join(&theme.platform);
    Ok(glob_files(&cwd, SASS_PATTERNS)?
        .into_iter()
        .map(|rel| SassTask {
            src: cwd.join(&rel),
            dest: dest.join(css_name(&rel, ctx.options.build_type)),
            component: None,
        })
        .collect())
}

/// Composite sass from local and Exchange components. Output lands under
/// `<staging>/js/jet-composites/<top>/<version>/`, where `version` comes from
/// the top directory's `component.json` (the pack version for packs).
pub fn component_tasks(ctx: &BuildContext) -> Result<Vec<SassTask>> {
    let root = ctx.root();
    let dest_base = ctx.paths.staging_composites_dir(root);
    let mut tasks = Vec::new();
    for base in [
        ctx.paths.src_composites_dir(root),
        ctx.paths.components_dir(root),
    ] {
        for rel in glob_files(&base, SASS_PATTERNS)? {
            let mut parts = rel.components();
            let Some(top) = parts.next() else {
                continue;
            };
            let top = top.as_os_str().to_string_lossy().into_owned();
            let inner = parts.as_path();
            let version = ComponentManifest::load_opt(&base.join(&top))?
                .and_then(|manifest| manifest.version)
                .unwrap_or_else(|| DEFAULT_PACK_VERSION.to_string());
            tasks.push(SassTask {
                src: base.join(&rel),
                dest: dest_base
                    .join(&top)
                    .join(version)
                    .join(css_name(inner, ctx.options.build_type)),
                component: Some(top),
            });
        }
    }
    Ok(tasks)
}

/// Everything a full build compiles, or only what changed under livereload.
pub fn tasks(ctx: &BuildContext) -> Result<Vec<SassTask>> {
    if let Some(theme) = ctx.live.theme.as_ref().filter(|theme| theme.compile) {
        return theme_tasks(ctx, theme);
    }
    if let Some(cca) = ctx.live.cca.as_deref() {
        info!("CCA {cca} Changed...");
        return Ok(component_tasks(ctx)?
            .into_iter()
            .filter(|task| task.component.as_deref() == Some(cca))
            .collect());
    }

    let mut tasks = Vec::new();
    let options = &ctx.options;
    for theme in std::iter::once(&options.theme).chain(options.themes.iter()) {
        if theme.compile {
            tasks.extend(theme_tasks(ctx, theme)?);
        }
    }
    if options.sass_compile {
        tasks.extend(component_tasks(ctx)?);
    }
    Ok(tasks)
}

pub fn compile(ctx: &BuildContext) -> Result<()> {
    info!("Compiling sass.");
    let tasks = tasks(ctx)?;
    if tasks.is_empty() {
        info!("Sass compile skipped.");
        return Ok(());
    }
    let sass = ctx.tools.get(Tool::Sass)?;
    let style: &[&str] = if ctx.release() {
        &["--style=compressed", "--no-source-map"]
    } else {
        &["--style=expanded", "--embed-sources"]
    };
    for task in tasks {
        crate::util::fs::ensure_parent(&task.dest)?;
        let spec = sass
            .command()
            .args(style.iter().copied())
            .arg(&task.src)
            .arg(&task.dest)
            .current_dir(ctx.root());
        sass.run_captured("sass compile", spec)?;
        info!(
            "sass compile\n from {}\n to    {} finished..",
            task.src.display(),
            task.dest.display()
        );
    }
    info!("Sass compile finished.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::tests_support::context;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn theme_tasks_skip_partials() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "src/themes/mytheme/web/mytheme.scss", "");
        write(root, "src/themes/mytheme/web/_variables.scss", "");
        let ctx = context(root, "web", true);
        let theme = Theme {
            name: "mytheme".into(),
            platform: "web".into(),
            version: String::new(),
            compile: true,
        };
        let tasks = theme_tasks(&ctx, &theme).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].dest, root.join("themes/mytheme/web/mytheme.min.css"));
    }

    #[test]
    fn component_sass_goes_under_version_dir() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(
            root,
            "src/js/jet-composites/demo-card/component.json",
            r#"{"name":"demo-card","version":"1.0.2"}"#,
        );
        write(root, "src/js/jet-composites/demo-card/demo-card-styles.scss", "");
        write(
            root,
            "jet_components/oj-ext/component.json",
            r#"{"name":"oj-ext","type":"pack","version":"3.0.0"}"#,
        );
        write(root, "jet_components/oj-ext/input-url/styles.scss", "");
        let ctx = context(root, "web", false);
        let tasks = component_tasks(&ctx).unwrap();
        let dests: Vec<PathBuf> = tasks.iter().map(|task| task.dest.clone()).collect();
        assert_eq!(
            dests,
            vec![
                root.join("web/js/jet-composites/demo-card/1.0.2/demo-card-styles.css"),
                root.join("web/js/jet-composites/oj-ext/3.0.0/input-url/styles.css"),
            ]
        );
    }

    #[test]
    fn livereload_limits_to_changed_component() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "src/js/jet-composites/a/a.scss", "");
        write(root, "src/js/jet-composites/b/b.scss", "");
        let mut ctx = context(root, "web", false);
        ctx.live.cca = Some("b".into());
        let tasks = tasks(&ctx).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].component.as_deref(), Some("b"));
    }

    #[test]
    fn nothing_to_compile_without_sass_or_custom_theme() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "src/js/jet-composites/a/a.scss", "");
        let mut ctx = context(root, "web", false);
        ctx.options.sass_compile = false;
        assert!(tasks(&ctx).unwrap().is_empty());
        compile(&ctx).unwrap();
    }
}
