//! The web and hybrid build pipelines.
//!
//! A build is an ordered list of [`Step`]s run against one [`BuildContext`].
//! Steps run sequentially and the first failure aborts the build.

pub mod component;
pub mod copy;
pub mod hybrid;
pub mod minify;
pub mod paths;
pub mod sass;
pub mod themes;

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::constants::INDEX_HTML;
use crate::delegate::Toolbox;
use crate::hooks::{HookContext, HookRunner, HookType};
use crate::inject;
use crate::options::{BuildOptions, Theme};
use crate::project::{ConfiguredPaths, Project};

/// What changed when a build is re-entered from the livereload watcher.
#[derive(Debug, Clone, Default)]
pub struct LiveChange {
    /// Copy only the served css instead of staging whole themes.
    pub css_only: bool,
    pub theme: Option<Theme>,
    /// Top directory of the composite whose sass changed.
    pub cca: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BuildContext {
    pub project: Project,
    pub tools: Toolbox,
    pub hooks: HookRunner,
    pub options: BuildOptions,
    pub paths: ConfiguredPaths,
    /// Serve destination (`browser`, `server-only`, ...) when building for serve.
    pub serve_destination: Option<String>,
    pub live: LiveChange,
}

impl BuildContext {
    pub fn new(project: Project, tools: Toolbox, hooks: HookRunner, options: BuildOptions) -> Self {
        let paths = project.paths(&options.platform);
        Self {
            project,
            tools,
            hooks,
            options,
            paths,
            serve_destination: None,
            live: LiveChange::default(),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.project.root
    }

    pub fn release(&self) -> bool {
        self.options.build_type.is_release()
    }

    pub fn staging(&self) -> PathBuf {
        self.paths.staging_dir(self.root())
    }

    /// `<stagingPath>/<src.javascript>`
    pub fn staging_js(&self) -> PathBuf {
        self.staging().join(&self.paths.src.javascript)
    }

    pub fn index_html(&self) -> PathBuf {
        self.staging().join(INDEX_HTML)
    }

    pub fn jet_version(&self) -> Result<String> {
        Ok(self.project.jet_version()?.unwrap_or_default())
    }

    pub fn hook_context(&self, component_config: Option<Value>) -> HookContext {
        HookContext {
            platform: self.options.platform.clone(),
            build_type: self.options.build_type.as_str().to_string(),
            theme: Some(self.options.theme.clone()),
            component_config,
            user_options: self.options.user_options.clone(),
            paths: self.paths.clone(),
        }
    }

    pub fn run_hook(&self, hook: HookType) -> Result<()> {
        self.hooks.run(&self.tools, hook, &self.hook_context(None))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Clean,
    Hook(HookType),
    Copy,
    CopyLibs,
    CopyReferenceCca,
    CopyLocalCca,
    Sass,
    InjectCdnBundleScript,
    InjectTheme,
    CopyThemes,
    InjectScriptTags,
    InjectPaths,
    FixWindowsLocale,
    Minify,
    RequireJs,
    CleanTemp,
    CordovaPrepare,
    CordovaCompile,
    ComponentHooks,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Hook(hook) => write!(f, "hook {}", hook.as_str()),
            Step::Clean => f.write_str("clean"),
            Step::Copy => f.write_str("copy"),
            Step::CopyLibs => f.write_str("copy libs"),
            Step::CopyReferenceCca => f.write_str("copy reference components"),
            Step::CopyLocalCca => f.write_str("copy local components"),
            Step::Sass => f.write_str("sass"),
            Step::InjectCdnBundleScript => f.write_str("cdn bundle injection"),
            Step::InjectTheme => f.write_str("theme injection"),
            Step::CopyThemes => f.write_str("theme copy"),
            Step::InjectScriptTags => f.write_str("script tags injection"),
            Step::InjectPaths => f.write_str("main.js paths injection"),
            Step::FixWindowsLocale => f.write_str("windows locale fix"),
            Step::Minify => f.write_str("minify"),
            Step::RequireJs => f.write_str("requirejs"),
            Step::CleanTemp => f.write_str("clean main-temp"),
            Step::CordovaPrepare => f.write_str("cordova prepare"),
            Step::CordovaCompile => f.write_str("cordova compile"),
            Step::ComponentHooks => f.write_str("component hooks"),
        }
    }
}

impl Step {
    pub fn run(self, ctx: &BuildContext) -> Result<()> {
        match self {
            Step::Clean => copy::clean(ctx),
            Step::Hook(hook) => ctx.run_hook(hook),
            Step::Copy => copy::copy_sources(ctx),
            Step::CopyLibs => copy::copy_libs(ctx),
            Step::CopyReferenceCca => copy::copy_reference_components(ctx),
            Step::CopyLocalCca => copy::copy_local_components(ctx),
            Step::Sass => sass::compile(ctx),
            Step::InjectCdnBundleScript => inject_cdn_bundle(ctx),
            Step::InjectTheme => inject_theme(ctx),
            Step::CopyThemes => themes::copy_themes(ctx),
            Step::InjectScriptTags => hybrid::inject_script_tags(ctx),
            Step::InjectPaths => paths::inject_paths(ctx),
            Step::FixWindowsLocale => copy::fix_windows_locale(ctx),
            Step::Minify => minify::minify(ctx),
            Step::RequireJs => minify::optimize(ctx),
            Step::CleanTemp => copy::clean_temp(ctx),
            Step::CordovaPrepare => hybrid::prepare(ctx),
            Step::CordovaCompile => hybrid::compile(ctx),
            Step::ComponentHooks => component::run_component_hooks(ctx),
        }
    }
}

fn inject_theme(ctx: &BuildContext) -> Result<()> {
    inject::inject_theme(
        &ctx.index_html(),
        &ctx.options.theme,
        ctx.options.build_type,
        &ctx.paths.src.styles,
    )
}

fn inject_cdn_bundle(ctx: &BuildContext) -> Result<()> {
    let mapping = ctx.project.path_mapping(&ctx.paths)?;
    if !mapping.uses_cdn() {
        return Ok(());
    }
    let Some(jet) = mapping.cdns.get("jet") else {
        return Ok(());
    };
    let Some(config) = jet.bundle_config() else {
        return Ok(());
    };
    let src = format!("{}/{}", jet.prefix().trim_end_matches('/'), config);
    inject::inject_cdn_bundle_script(&ctx.index_html(), &src)
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn web(release: bool) -> Self {
        let mut steps = vec![
            Step::Clean,
            Step::Hook(HookType::BeforeBuild),
            Step::Copy,
            Step::CopyLibs,
            Step::CopyReferenceCca,
            Step::CopyLocalCca,
            Step::Sass,
            Step::InjectCdnBundleScript,
            Step::InjectTheme,
            Step::CopyThemes,
            Step::InjectPaths,
        ];
        if release {
            steps.extend(release_steps());
        }
        steps.push(Step::ComponentHooks);
        steps.push(Step::Hook(HookType::AfterBuild));
        Self { steps }
    }

    pub fn hybrid(release: bool, build_for_serve: bool) -> Self {
        let mut steps = vec![
            Step::Clean,
            Step::Hook(HookType::BeforeBuild),
            Step::Copy,
            Step::CopyLibs,
            Step::CopyReferenceCca,
            Step::CopyLocalCca,
            Step::Sass,
            Step::InjectCdnBundleScript,
            Step::CopyThemes,
            Step::InjectTheme,
            Step::InjectScriptTags,
            Step::InjectPaths,
            Step::FixWindowsLocale,
        ];
        if release {
            steps.extend(release_steps());
        }
        if !build_for_serve {
            steps.extend([
                Step::Hook(HookType::BeforeHybridBuild),
                Step::CordovaPrepare,
                Step::CordovaCompile,
            ]);
        }
        steps.push(Step::ComponentHooks);
        steps.push(Step::Hook(HookType::AfterBuild));
        Self { steps }
    }

    pub fn for_options(options: &BuildOptions) -> Self {
        let release = options.build_type.is_release();
        if options.is_web() {
            Self::web(release)
        } else {
            Self::hybrid(release, options.build_for_serve)
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn run(&self, ctx: &BuildContext) -> Result<()> {
        for step in &self.steps {
            info!("Running {step} task.");
            step.run(ctx).with_context(|| format!("{step} task failed"))?;
            debug!("Task {step} finished.");
        }
        Ok(())
    }
}

fn release_steps() -> [Step; 4] {
    [
        Step::Hook(HookType::BeforeReleaseBuild),
        Step::Minify,
        Step::RequireJs,
        Step::CleanTemp,
    ]
}

/// Runs the full pipeline for `ctx.options`.
pub fn build(ctx: &BuildContext) -> Result<()> {
    info!(
        "Building {} ({}) into {}",
        ctx.options.platform,
        ctx.options.build_type.as_str(),
        ctx.paths.staging_path
    );
    crate::validate::sass_install(&ctx.tools, &ctx.options)?;
    Pipeline::for_options(&ctx.options).run(ctx)?;
    info!("Build finished.");
    Ok(())
}

/// `ojet clean`: empties the web staging dir, or runs `cordova clean`.
pub fn clean(ctx: &BuildContext) -> Result<()> {
    if ctx.options.is_web() {
        copy::clean(ctx)
    } else {
        hybrid::clean(ctx)
    }
}
