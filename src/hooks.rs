//! User hook scripts declared in `scripts/hooks/hooks.json`.
//!
//! A `.js` hook is a Node module exporting `function (context)` that may
//! return a promise; it is loaded through a small `node -e` shim. Any other
//! script is executed directly. Both receive the context JSON in
//! `OJET_HOOK_CONTEXT` and the hook name in `OJET_HOOK_TYPE`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::constants::HOOKS_CONFIG;
use crate::delegate::{Tool, Toolbox};
use crate::options::Theme;
use crate::project::ConfiguredPaths;
use crate::util::json;
use crate::util::process::CommandSpec;

const NODE_SHIM: &str = "const hook = require(process.argv[1]);\
Promise.resolve(hook(JSON.parse(process.env.OJET_HOOK_CONTEXT)))\
.catch((err) => { console.error(err); process.exit(1); });";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookType {
    BeforeBuild,
    BeforeReleaseBuild,
    BeforeHybridBuild,
    AfterComponentBuild,
    AfterBuild,
    BeforeServe,
    AfterServe,
}

impl HookType {
    pub fn as_str(self) -> &'static str {
        match self {
            HookType::BeforeBuild => "before_build",
            HookType::BeforeReleaseBuild => "before_release_build",
            HookType::BeforeHybridBuild => "before_hybrid_build",
            HookType::AfterComponentBuild => "after_component_build",
            HookType::AfterBuild => "after_build",
            HookType::BeforeServe => "before_serve",
            HookType::AfterServe => "after_serve",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct HooksFile {
    #[serde(default)]
    hooks: BTreeMap<String, String>,
}

/// JSON handed to every hook script.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookContext {
    pub platform: String,
    pub build_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_config: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_options: Option<String>,
    pub paths: ConfiguredPaths,
}

#[derive(Debug, Clone)]
pub struct HookRunner {
    root: PathBuf,
    hooks: BTreeMap<String, String>,
    env: Vec<(String, String)>,
}

impl HookRunner {
    pub fn load(root: &Path) -> Result<Self> {
        let file: HooksFile = json::read_json_opt(&root.join(HOOKS_CONFIG))?.unwrap_or_default();
        Ok(Self {
            root: root.to_path_buf(),
            hooks: file.hooks,
            env: Vec::new(),
        })
    }

    /// Extra variables exported to every hook (used by hybrid serve).
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn script_for(&self, hook: HookType) -> Option<PathBuf> {
        let raw = self.hooks.get(hook.as_str())?;
        let path = self.root.join(raw);
        path.is_file().then_some(path)
    }

    pub fn run(&self, tools: &Toolbox, hook: HookType, context: &HookContext) -> Result<()> {
        let Some(script) = self.script_for(hook) else {
            debug!("Hook {} not defined..", hook.as_str());
            return Ok(());
        };
        info!("Running {} hook.", hook.as_str());
        let payload = serde_json::to_string(context).context("failed to encode hook context")?;

        let is_node = script.extension().is_some_and(|ext| ext == "js");
        let delegate = if is_node {
            Some(tools.get(Tool::Node)?)
        } else {
            None
        };
        let mut spec = match &delegate {
            Some(node) => node.command().arg("-e").arg(NODE_SHIM).arg(&script),
            None => CommandSpec::new(script.clone()),
        };
        spec = spec
            .current_dir(&self.root)
            .env("OJET_HOOK_TYPE", hook.as_str())
            .env("OJET_HOOK_CONTEXT", payload);
        for (key, value) in &self.env {
            spec = spec.env(key, value);
        }

        let label = format!("hook {}", hook.as_str());
        match delegate {
            Some(node) => node.run(&label, spec),
            None => {
                let output = crate::util::process::run(spec)?;
                if !output.status.success() {
                    anyhow::bail!(
                        "{label} ({}) failed with exit code {}",
                        script.display(),
                        output.status.code().unwrap_or_default()
                    );
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::jetconfig::PathsConfig;
    use std::fs;
    use tempfile::TempDir;

    fn context() -> HookContext {
        HookContext {
            platform: "web".into(),
            build_type: "dev".into(),
            theme: None,
            component_config: None,
            user_options: None,
            paths: ConfiguredPaths::resolve(&PathsConfig::default(), "web"),
        }
    }

    #[test]
    fn missing_hook_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        let runner = HookRunner::load(temp.path()).unwrap();
        let tools = Toolbox::new(Default::default(), temp.path());
        runner.run(&tools, HookType::AfterBuild, &context()).unwrap();
    }

    #[test]
    fn ignores_configured_script_that_does_not_exist() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("scripts/hooks")).unwrap();
        fs::write(
            temp.path().join(HOOKS_CONFIG),
            r#"{"hooks":{"before_build":"scripts/hooks/before_build.js"}}"#,
        )
        .unwrap();
        let runner = HookRunner::load(temp.path()).unwrap();
        assert!(runner.script_for(HookType::BeforeBuild).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn shell_hook_receives_context() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let hooks_dir = temp.path().join("scripts/hooks");
        fs::create_dir_all(&hooks_dir).unwrap();
        let script = hooks_dir.join("after_build.sh");
        fs::write(
            &script,
            "#!/bin/sh\necho \"$OJET_HOOK_TYPE $OJET_HOOK_CONTEXT\" > hook.out\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        fs::write(
            temp.path().join(HOOKS_CONFIG),
            r#"{"hooks":{"after_build":"scripts/hooks/after_build.sh"}}"#,
        )
        .unwrap();

        let runner = HookRunner::load(temp.path()).unwrap();
        let tools = Toolbox::new(Default::default(), temp.path());
        runner.run(&tools, HookType::AfterBuild, &context()).unwrap();
        let out = fs::read_to_string(temp.path().join("hook.out")).unwrap();
        assert!(out.starts_with("after_build {"));
        assert!(out.contains("\"buildType\":\"dev\""));
        assert!(out.contains("\"stagingPath\":\"web\""));
    }
}
