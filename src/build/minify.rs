//! Terser minification and the r.js optimizer run.

use std::path::Path;

use anyhow::Result;
use tracing::{debug, info};

use crate::build::{BuildContext, paths};
use crate::constants::{MAIN_TEMP_JS, RJS_BUILD_FILE};
use crate::delegate::{Tool, ToolDelegate};
use crate::fileset::{FileSpec, glob_files};
use crate::util::fs as ufs;
use crate::util::json;

fn terser(terser: &ToolDelegate, root: &Path, src: &Path, dest: &Path) -> Result<()> {
    ufs::ensure_parent(dest)?;
    let spec = terser
        .command()
        .arg(src)
        .args(["--compress", "--mangle", "reserved=['require']", "--output"])
        .arg(dest)
        .current_dir(root);
    terser.run_captured("minify", spec)?;
    debug!("Minified {}", dest.display());
    Ok(())
}

/// Minifies every `.js` file under `dir` in place.
pub fn minify_dir(ctx: &BuildContext, dir: &Path) -> Result<()> {
    let files = glob_files(dir, &["**/*.js"])?;
    if files.is_empty() {
        return Ok(());
    }
    let tool = ctx.tools.get(Tool::Terser)?;
    for rel in files {
        let file = dir.join(rel);
        terser(&tool, ctx.root(), &file, &file)?;
    }
    Ok(())
}

pub fn minify_specs(ctx: &BuildContext) -> Vec<FileSpec> {
    let root = ctx.root();
    let js = ctx.staging_js();
    let composites = &ctx.paths.composites;
    let mut specs = vec![
        FileSpec {
            cwd: ctx.paths.src_js_dir(root),
            src: vec![
                "**/*.js".into(),
                "!main.js".into(),
                format!("!{composites}/**/*.js"),
            ],
            dest: js.clone(),
            rename: None,
        },
        FileSpec::new(js.clone(), &[MAIN_TEMP_JS], js.clone()),
    ];
    if ctx.release() {
        let libs = js.join("libs");
        specs.push(FileSpec::new(
            libs.clone(),
            &["jquery/jqueryui-amd*min/**/*.js"],
            libs,
        ));
    }
    specs
}

pub fn minify(ctx: &BuildContext) -> Result<()> {
    info!("Running uglify task.");
    let tool = ctx.tools.get(Tool::Terser)?;
    for spec in minify_specs(ctx) {
        for rel in spec.files()? {
            terser(&tool, ctx.root(), &spec.cwd.join(&rel), &spec.dest.join(&rel))?;
        }
    }
    info!("Task uglify finished.");
    Ok(())
}

/// Runs `node r.js -o <build file>` against the generated optimizer config.
pub fn optimize(ctx: &BuildContext) -> Result<()> {
    info!("Running requirejs task.");
    let config = paths::rjs_config(ctx)?;
    let build_file = ctx.staging_js().join(RJS_BUILD_FILE);
    json::write_json_pretty(&build_file, &config)?;

    let rjs = ctx.tools.get(Tool::RequireJs)?;
    let result = if rjs.program().to_string_lossy().ends_with(".js") {
        let node = ctx.tools.get(Tool::Node)?;
        let spec = node
            .command()
            .arg(rjs.program())
            .arg("-o")
            .arg(&build_file)
            .current_dir(ctx.root());
        node.run_captured("requirejs", spec).map(|_| ())
    } else {
        let spec = rjs.command().arg("-o").arg(&build_file).current_dir(ctx.root());
        rjs.run_captured("requirejs", spec).map(|_| ())
    };
    ufs::remove_path(&build_file)?;
    result?;
    info!("Task requirejs finished.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::tests_support::context;
    use crate::util::fs::slash;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn release_minify_covers_sources_temp_main_and_jqueryui() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        for rel in [
            "src/js/main.js",
            "src/js/appController.js",
            "src/js/viewModels/about.js",
            "src/js/jet-composites/demo-card/loader.js",
            "web/js/main-temp.js",
            "web/js/libs/jquery/jqueryui-amd-1.12.1.min/widgets/draggable.js",
        ] {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
        let ctx = context(root, "web", true);
        let files: Vec<String> = minify_specs(&ctx)
            .iter()
            .flat_map(|spec| {
                spec.files()
                    .unwrap()
                    .into_iter()
                    .map(|rel| slash(&spec.cwd.join(rel).strip_prefix(root).unwrap().to_path_buf()))
                    .collect::<Vec<_>>()
            })
            .collect();
        assert_eq!(
            files,
            vec![
                "src/js/appController.js",
                "src/js/viewModels/about.js",
                "web/js/main-temp.js",
                "web/js/libs/jquery/jqueryui-amd-1.12.1.min/widgets/draggable.js",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn minify_dir_runs_configured_terser() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let bin = root.join("node_modules/.bin");
        fs::create_dir_all(&bin).unwrap();
        let fake = bin.join("terser");
        // Copies the input to the --output target.
        fs::write(&fake, "#!/bin/sh\ncp \"$1\" \"$1.tmp\" && mv \"$1.tmp\" \"$6\"\necho done >> \"$6.log\"\n").unwrap();
        fs::set_permissions(&fake, fs::Permissions::from_mode(0o755)).unwrap();
        let min = root.join("staged/min");
        fs::create_dir_all(&min).unwrap();
        fs::write(min.join("loader.js"), "define([], function () {});").unwrap();

        let ctx = context(root, "web", false);
        minify_dir(&ctx, &min).unwrap();
        assert!(min.join("loader.js.log").exists());
    }
}
