//! `after_component_build` hooks and `ojet build --component`.

use std::path::PathBuf;

use anyhow::{Result, bail};
use serde_json::Value;
use tracing::info;

use crate::build::{BuildContext, copy};
use crate::constants::COMPONENT_JSON;
use crate::fileset::glob_files;
use crate::hooks::HookType;
use crate::util::json;

pub fn run_component_hooks(ctx: &BuildContext) -> Result<()> {
    let base = ctx.paths.src_composites_dir(ctx.root());
    for rel in glob_files(&base, &[format!("**/{COMPONENT_JSON}")])? {
        info!("runAllComponentHooks for component: {}", rel.display());
        let config: Value = json::read_json(&base.join(&rel))?;
        ctx.hooks.run(
            &ctx.tools,
            HookType::AfterComponentBuild,
            &ctx.hook_context(Some(config)),
        )?;
    }
    Ok(())
}

/// Staging root for a single component build: hybrid when the app has one.
fn component_staging(ctx: &BuildContext) -> PathBuf {
    let root = ctx.root();
    let hybrid = root.join(&ctx.paths.staging.hybrid);
    let staging = if hybrid.is_dir() {
        hybrid.join("www")
    } else {
        root.join(&ctx.paths.staging.web)
    };
    staging
        .join(&ctx.paths.src.javascript)
        .join(&ctx.paths.composites)
}

/// Stages and minifies one local composite, then runs its hook.
pub fn build_component(ctx: &BuildContext, name: &str) -> Result<PathBuf> {
    let src = ctx.paths.src_composites_dir(ctx.root()).join(name);
    if !src.join(COMPONENT_JSON).is_file() {
        bail!(
            "The component {name} is not found in {}",
            ctx.paths.src_composites_dir(ctx.root()).display()
        );
    }
    info!("Building component {name}.");
    let dest = copy::stage_local_component(ctx, &src, &component_staging(ctx))?;
    let config: Value = json::read_json(&src.join(COMPONENT_JSON))?;
    ctx.hooks.run(
        &ctx.tools,
        HookType::AfterComponentBuild,
        &ctx.hook_context(Some(config)),
    )?;
    info!("Component {name} built into {}", dest.display());
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::tests_support::context;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn unknown_component_is_rejected() {
        let temp = TempDir::new().unwrap();
        let ctx = context(temp.path(), "web", false);
        let err = build_component(&ctx, "missing-card").unwrap_err();
        assert!(err.to_string().contains("missing-card is not found"));
    }

    #[test]
    fn component_without_version_is_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("src/js/jet-composites/demo-card");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(COMPONENT_JSON), r#"{"name":"demo-card"}"#).unwrap();
        let ctx = context(temp.path(), "web", false);
        let err = build_component(&ctx, "demo-card").unwrap_err();
        assert!(err.to_string().contains("Missing property 'version'"));
    }

    #[test]
    fn stages_into_hybrid_when_present() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("hybrid")).unwrap();
        let ctx = context(temp.path(), "web", false);
        assert_eq!(
            component_staging(&ctx),
            temp.path().join("hybrid/www/js/jet-composites")
        );
    }
}
