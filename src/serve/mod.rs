//! `ojet serve`: build for serve, then serve the web staging dir or drive
//! `cordova run`, with optional livereload.

pub mod livereload;
pub mod server;
pub mod watch;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::build::{self, BuildContext, hybrid};
use crate::delegate::Tool;
use crate::hooks::HookType;
use crate::inject;
use crate::options::ServeOptions;
use crate::util::process::{self, CommandSpec};

use livereload::ChangeLog;
use server::StaticServer;
use watch::ChangeHandler;

/// Runs the web or hybrid serve flow for already validated options.
pub fn serve(mut ctx: BuildContext, options: &ServeOptions) -> Result<()> {
    ctx.serve_destination = Some(options.destination.clone());
    info!(
        platform = %options.build_options.platform,
        build_type = options.build_options.build_type.as_str(),
        port = options.port,
        livereload = options.livereload,
        livereload_port = options.livereload_port,
        destination = %options.destination,
        "serve options"
    );
    if options.build_options.is_web() {
        serve_web(ctx, options)
    } else {
        serve_hybrid(ctx, options)
    }
}

fn build_for_serve(ctx: &BuildContext, options: &ServeOptions) -> Result<()> {
    if options.build {
        build::build(ctx)
    } else {
        info!("Skipping build...");
        Ok(())
    }
}

/// Starts the notifier and a watcher thread feeding it.
fn start_livereload(ctx: &BuildContext, options: &ServeOptions) -> Result<JoinHandle<()>> {
    let changes = ChangeLog::default();
    livereload::start(options.livereload_port, changes.clone())?;
    let handler = Arc::new(ChangeHandler::new(ctx.clone(), changes)?);
    Ok(thread::spawn(move || {
        if let Err(err) = watch::watch(handler) {
            warn!("Watcher stopped: {err:#}");
        }
    }))
}

fn serve_web(ctx: BuildContext, options: &ServeOptions) -> Result<()> {
    build_for_serve(&ctx, options)?;
    ctx.run_hook(HookType::BeforeServe)?;
    if options.livereload {
        inject::inject_localhost_csp(&ctx.index_html())?;
    }

    let livereload_port = options.livereload.then_some(options.livereload_port);
    let server = StaticServer::new(ctx.staging(), livereload_port).start(options.port)?;
    let url = format!("http://localhost:{}", options.port);
    println!("Server ready: {url}");
    if !options.server_only() {
        open_browser(&url);
    }

    if options.livereload {
        start_livereload(&ctx, options)?;
    }
    ctx.run_hook(HookType::AfterServe)?;
    server
        .join()
        .map_err(|_| anyhow!("static server thread panicked"))
}

/// Best effort; failing to launch a browser is only logged.
fn open_browser(url: &str) {
    let spec = if cfg!(target_os = "macos") {
        CommandSpec::new("open").arg(url)
    } else if cfg!(windows) {
        CommandSpec::new("cmd").args(["/C", "start", "", url])
    } else {
        CommandSpec::new("xdg-open").arg(url)
    };
    if let Err(err) = process::spawn(spec) {
        warn!("Could not open a browser: {err:#}");
    }
}

/// Variables exported to hooks during a hybrid serve.
pub fn hybrid_env(ctx: &BuildContext, options: &ServeOptions) -> Vec<(String, String)> {
    vec![
        ("platform".into(), options.build_options.platform.clone()),
        ("destination".into(), options.destination.clone()),
        ("livereload".into(), options.livereload.to_string()),
        ("livereloadPort".into(), options.livereload_port.to_string()),
        ("port".into(), options.port.to_string()),
        (
            "cordovaDirectory".into(),
            hybrid::cordova_dir(ctx).to_string_lossy().into_owned(),
        ),
    ]
}

/// Arguments for `cordova run` for the serve destination.
pub fn run_args(options: &ServeOptions, cordova_serving: bool) -> Vec<String> {
    let build = &options.build_options;
    if options.destination == "browser" {
        let mut args = vec!["run".to_string(), "browser".to_string(), "--".to_string()];
        if let Some(browser) = &options.destination_target {
            args.push(format!("--target={browser}"));
        }
        if !cordova_serving {
            args.push(format!("--port={}", options.port));
        }
        return args;
    }

    let mut args = vec!["run".to_string(), build.platform.clone()];
    match &options.destination_target {
        Some(target) => {
            args.push(format!("--target=\"{target}\""));
            if options.destination == "emulator" {
                args.push("--emulator".to_string());
            }
        }
        None => args.push(format!("--{}", options.destination)),
    }
    if let Some(config) = &build.build_config {
        args.push(format!("--buildConfig={}", config.display()));
    }
    args.push(build.build_type.cordova_flag().to_string());
    args.extend(hybrid::platform_option_args(build.platform_options.as_deref()));
    args
}

fn serve_hybrid(mut ctx: BuildContext, options: &ServeOptions) -> Result<()> {
    build_for_serve(&ctx, options)?;
    ctx.run_hook(HookType::BeforeServe)?;
    ctx.hooks = ctx.hooks.clone().with_env(hybrid_env(&ctx, options));

    let cordova = ctx.tools.get(Tool::Cordova)?;
    let dir = hybrid::cordova_dir(&ctx);
    let platform = options.build_options.platform.as_str();
    let browser = options.destination == "browser";

    if platform != "windows" && !browser && options.build {
        if let Err(err) = cordova.run(
            "clean",
            cordova.command().current_dir(&dir).arg("clean").arg(platform),
        ) {
            warn!("Cordova clean failed: {err:#}");
        }
    }

    let mut cordova_server = None;
    if options.livereload || options.server_only() {
        let spec = cordova
            .command()
            .current_dir(&dir)
            .arg("serve")
            .arg(options.port.to_string());
        cordova_server = Some(process::spawn(spec)?);
        println!("Server ready: http://localhost:{}", options.port);
    }
    if !options.server_only() {
        let spec = cordova
            .command()
            .current_dir(&dir)
            .args(run_args(options, cordova_server.is_some()));
        cordova.run("run", spec)?;
    }

    if options.livereload {
        let watcher = start_livereload(&ctx, options)?;
        ctx.run_hook(HookType::AfterServe)?;
        return watcher
            .join()
            .map_err(|_| anyhow!("watcher thread panicked"));
    }
    ctx.run_hook(HookType::AfterServe)?;
    if (browser || options.server_only())
        && let Some(mut child) = cordova_server
    {
        child.wait()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::tests_support::context;
    use crate::constants::{DEFAULT_LIVERELOAD_PORT, DEFAULT_PORT};
    use tempfile::TempDir;

    fn options(ctx: &BuildContext, destination: &str, target: Option<&str>) -> ServeOptions {
        ServeOptions {
            build: true,
            livereload: false,
            port: DEFAULT_PORT,
            livereload_port: DEFAULT_LIVERELOAD_PORT,
            destination: destination.into(),
            destination_target: target.map(str::to_string),
            build_options: ctx.options.clone(),
        }
    }

    #[test]
    fn emulator_run_args_name_the_target() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context(temp.path(), "android", false);
        ctx.options.platform_options = Some("--gradleArg=x".into());
        let args = run_args(&options(&ctx, "emulator", Some("Pixel_3")), false);
        assert_eq!(
            args,
            vec![
                "run",
                "android",
                "--target=\"Pixel_3\"",
                "--emulator",
                "--debug",
                "--",
                "--gradleArg=x"
            ]
        );
        ctx.options.platform_options = None;
        let args = run_args(&options(&ctx, "device", None), false);
        assert_eq!(args, vec!["run", "android", "--device", "--debug"]);
    }

    #[test]
    fn browser_run_args_pass_the_browser() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), "android", false);
        let opts = options(&ctx, "browser", Some("firefox"));
        assert_eq!(
            run_args(&opts, false),
            vec!["run", "browser", "--", "--target=firefox", "--port=8000"]
        );
        assert_eq!(run_args(&opts, true), vec!["run", "browser", "--", "--target=firefox"]);
    }

    #[test]
    fn hybrid_env_exports_serve_settings() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), "ios", false);
        let env = hybrid_env(&ctx, &options(&ctx, "emulator", None));
        let get = |key: &str| env.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
        assert_eq!(get("platform").as_deref(), Some("ios"));
        assert_eq!(get("port").as_deref(), Some("8000"));
        assert_eq!(get("livereload").as_deref(), Some("false"));
        assert!(get("cordovaDirectory").unwrap().ends_with("hybrid"));
    }
}
