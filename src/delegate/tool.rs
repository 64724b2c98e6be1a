use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use which::which;

use crate::config::ToolConfig;
use crate::util::process::{self, CommandOutput, CommandSpec};

/// External programs the pipelines shell out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Sass,
    Terser,
    Node,
    Cordova,
    Npm,
    RequireJs,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::Sass,
        Tool::Terser,
        Tool::Node,
        Tool::Cordova,
        Tool::Npm,
        Tool::RequireJs,
    ];

    pub fn from_name(name: &str) -> Option<Tool> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Tool::Sass => "sass",
            Tool::Terser => "terser",
            Tool::Node => "node",
            Tool::Cordova => "cordova",
            Tool::Npm => "npm",
            Tool::RequireJs => "r.js",
        }
    }

    fn env_var(self) -> &'static str {
        match self {
            Tool::Sass => "OJET_SASS_PATH",
            Tool::Terser => "OJET_TERSER_PATH",
            Tool::Node => "OJET_NODE_PATH",
            Tool::Cordova => "OJET_CORDOVA_PATH",
            Tool::Npm => "OJET_NPM_PATH",
            Tool::RequireJs => "OJET_RJS_PATH",
        }
    }

    fn install_hint(self) -> &'static str {
        match self {
            Tool::Sass => "Run `ojet add sass` or install dart-sass",
            Tool::Terser => "Run `npm install terser --save-dev`",
            Tool::Node | Tool::Npm => "Install Node.js",
            Tool::Cordova => "Run `npm install -g cordova`",
            Tool::RequireJs => "Run `npm install requirejs --save-dev`",
        }
    }
}

/// A resolved external tool bound to a project directory.
#[derive(Debug, Clone)]
pub struct ToolDelegate {
    tool: Tool,
    program: OsString,
}

impl ToolDelegate {
    pub fn resolve(tool: Tool, config: &ToolConfig, project_root: &Path) -> Result<Self> {
        let program = resolve_program(tool, config, project_root)?;
        Ok(Self { tool, program })
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    pub fn command(&self) -> CommandSpec {
        CommandSpec::new(self.program.clone())
    }

    /// Runs the tool with inherited stdio and fails on a non-zero exit.
    pub fn run(&self, label: &str, spec: CommandSpec) -> Result<()> {
        let output = self.exec(spec)?;
        self.ensure_success(label, &output)
    }

    /// Runs the tool capturing its output; failures include captured stderr.
    pub fn run_captured(&self, label: &str, spec: CommandSpec) -> Result<CommandOutput> {
        let output = self.exec(spec.captured())?;
        if output.status.success() {
            return Ok(output);
        }
        let code = output.status.code().unwrap_or_default();
        let stderr = output
            .stderr
            .as_deref()
            .map(String::from_utf8_lossy)
            .unwrap_or_default();
        bail!(
            "`{}` {label} failed with exit code {code}: {}",
            self.program.to_string_lossy(),
            stderr.trim()
        );
    }

    fn exec(&self, spec: CommandSpec) -> Result<CommandOutput> {
        process::run(spec)
            .with_context(|| format!("failed to spawn `{}`", self.program.to_string_lossy()))
    }

    fn ensure_success(&self, label: &str, output: &CommandOutput) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }
        let code = output.status.code().unwrap_or_default();
        bail!(
            "`{}` {label} failed with exit code {code}",
            self.program.to_string_lossy()
        );
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }
}

/// Resolves tools on demand so a pipeline only requires what it runs.
#[derive(Debug, Default, Clone)]
pub struct Toolbox {
    config: ToolConfig,
    root: PathBuf,
}

impl Toolbox {
    pub fn new(config: ToolConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
        }
    }

    pub fn get(&self, tool: Tool) -> Result<ToolDelegate> {
        ToolDelegate::resolve(tool, &self.config, &self.root)
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }
}

fn resolve_program(tool: Tool, config: &ToolConfig, project_root: &Path) -> Result<OsString> {
    let var = tool.env_var();
    if let Some(env_override) = std::env::var_os(var) {
        let path = PathBuf::from(env_override);
        if !path.exists() {
            bail!("{var} points to `{}` but it does not exist", path.display());
        }
        return Ok(path.into_os_string());
    }

    if let Some(custom) = config.tool_path(tool.name()) {
        if !custom.exists() {
            bail!(
                "configured {} path `{}` does not exist",
                tool.name(),
                custom.display()
            );
        }
        return Ok(custom.as_os_str().to_os_string());
    }

    if let Some(local) = local_bin(tool, project_root) {
        return Ok(local.into_os_string());
    }

    match which(tool.name()) {
        Ok(path) => Ok(path.into_os_string()),
        Err(error) => Err(anyhow!(
            "{} is required but was not found ({error}). {}, set {var}, or set \
             [tools.{}].path in config.",
            tool.name(),
            tool.install_hint(),
            tool.name()
        )),
    }
}

fn local_bin(tool: Tool, project_root: &Path) -> Option<PathBuf> {
    let bin = project_root.join("node_modules").join(".bin");
    let mut candidates = vec![bin.join(tool.name())];
    if cfg!(windows) {
        candidates.push(bin.join(format!("{}.cmd", tool.name())));
    }
    if tool == Tool::RequireJs {
        candidates.push(project_root.join("node_modules/requirejs/bin/r.js"));
    }
    candidates.into_iter().find(|candidate| candidate.is_file())
}
