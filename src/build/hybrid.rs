//! Cordova-specific steps for hybrid builds.

use std::path::PathBuf;

use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::build::BuildContext;
use crate::delegate::Tool;
use crate::inject;
use crate::util::process::CommandSpec;

pub fn cordova_dir(ctx: &BuildContext) -> PathBuf {
    ctx.root().join(&ctx.paths.staging.hybrid)
}

/// Scripts added to the hybrid `index.html`, in insertion order.
pub fn script_sources(ctx: &BuildContext) -> Vec<String> {
    let mut srcs = Vec::new();
    if matches!(
        ctx.serve_destination.as_deref(),
        Some("browser") | Some("server-only")
    ) {
        srcs.push(format!("{}/cordovaMocks.js", ctx.paths.src.javascript));
    }
    srcs.push("cordova.js".to_string());
    srcs
}

pub fn inject_script_tags(ctx: &BuildContext) -> Result<()> {
    let index = ctx.index_html();
    if !index.is_file() {
        warn!("{} not found, skipping script injection.", index.display());
        return Ok(());
    }
    let srcs = script_sources(ctx);
    let refs: Vec<&str> = srcs.iter().map(String::as_str).collect();
    inject::inject_script_tags(&index, &refs)?;
    info!("Task index.html cordova.js script tag injection finished.");
    Ok(())
}

fn cordova(ctx: &BuildContext) -> Result<(crate::delegate::ToolDelegate, CommandSpec)> {
    let tool = ctx.tools.get(Tool::Cordova)?;
    let spec = tool.command().current_dir(cordova_dir(ctx));
    Ok((tool, spec))
}

pub fn prepare(ctx: &BuildContext) -> Result<()> {
    info!("Cordova prepare {}.", ctx.options.platform);
    let (tool, spec) = cordova(ctx)?;
    tool.run(
        "prepare",
        spec.arg("prepare").arg(&ctx.options.platform),
    )
}

/// Trailing `-- <platform options>` arguments.
pub fn platform_option_args(raw: Option<&str>) -> Vec<String> {
    match raw.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => std::iter::once("--".to_string())
            .chain(raw.split_whitespace().map(str::to_string))
            .collect(),
        None => Vec::new(),
    }
}

pub fn compile_args(ctx: &BuildContext) -> Result<Vec<String>> {
    let options = &ctx.options;
    let mut args = vec![
        "compile".to_string(),
        options.platform.clone(),
        options.build_type.cordova_flag().to_string(),
        format!("--{}", options.destination),
    ];
    if let Some(config) = &options.build_config {
        if !config.exists() {
            bail!("Build config file {} does not exist.", config.display());
        }
        args.push(format!("--buildConfig={}", config.display()));
    }
    args.extend(platform_option_args(options.platform_options.as_deref()));
    Ok(args)
}

pub fn compile(ctx: &BuildContext) -> Result<()> {
    let args = compile_args(ctx)?;
    info!("Cordova compile {}.", ctx.options.platform);
    let (tool, spec) = cordova(ctx)?;
    tool.run("compile", spec.args(args))
}

/// `cordova clean <platform>`; a failure is logged and the build continues.
pub fn clean(ctx: &BuildContext) -> Result<()> {
    let (tool, spec) = cordova(ctx)?;
    if let Err(err) = tool.run("clean", spec.arg("clean").arg(&ctx.options.platform)) {
        warn!("Cordova clean failed: {err:#}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::tests_support::context;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn compile_args_include_build_config_and_platform_options() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("buildConfig.json");
        fs::write(&config, "{}").unwrap();
        let mut ctx = context(temp.path(), "android", true);
        ctx.options.destination = "device".into();
        ctx.options.build_config = Some(config.clone());
        ctx.options.platform_options = Some("--gradleArg=--no-daemon  --verbose".into());
        let args = compile_args(&ctx).unwrap();
        assert_eq!(
            args,
            vec![
                "compile".to_string(),
                "android".into(),
                "--release".into(),
                "--device".into(),
                format!("--buildConfig={}", config.display()),
                "--".into(),
                "--gradleArg=--no-daemon".into(),
                "--verbose".into(),
            ]
        );
    }

    #[test]
    fn missing_build_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context(temp.path(), "ios", false);
        ctx.options.build_config = Some(temp.path().join("nope.json"));
        let err = compile_args(&ctx).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn browser_serve_adds_cordova_mocks() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("hybrid/www")).unwrap();
        fs::write(
            root.join("hybrid/www/index.html"),
            "<body>\n    <script src=\"js/libs/require/require.js\"></script>\n</body>",
        )
        .unwrap();
        let mut ctx = context(root, "android", false);
        ctx.serve_destination = Some("browser".into());
        inject_script_tags(&ctx).unwrap();
        let html = fs::read_to_string(root.join("hybrid/www/index.html")).unwrap();
        assert!(html.contains("src=\"js/cordovaMocks.js\""));
        assert!(html.contains("src=\"cordova.js\""));
    }
}
