//! `ojet add|remove|create pack`.

use anyhow::{Result, bail};
use tracing::error;

use crate::delegate::Toolbox;
use crate::exchange::ExchangeClient;
use crate::project::{ComponentManifest, Project};
use crate::scopes::component;
use crate::util::{fs as ufs, json};

use crate::constants::{COMPONENT_JSON, DEFAULT_PACK_VERSION};

pub fn add(
    project: &mut Project,
    tools: &Toolbox,
    client: &ExchangeClient,
    names: &[String],
) -> Result<()> {
    if names.is_empty() {
        bail!("Please specify pack name(s) to add.");
    }
    for name in names {
        let metadata = client.component_metadata(name)?;
        if !metadata.is_pack() {
            bail!("'{name}' is not a pack.");
        }
        let (plain, _) = crate::exchange::split_name(name)?;
        let mut members = vec![format!(
            "{plain}@{}",
            metadata.version.as_deref().unwrap_or("*")
        )];
        members.extend(
            metadata
                .component
                .dependencies
                .iter()
                .map(|(dep, version)| format!("{dep}@{version}")),
        );
        component::add(project, tools, client, &members, None)?;
    }
    println!("Pack(s) '{}' added.", names.join(","));
    Ok(())
}

/// Installed members of a pack as `<pack>-<name>@<version>`.
pub fn installed_members(project: &Project, pack: &str) -> Result<Option<Vec<String>>> {
    let dir = project.paths("web").components_dir(&project.root).join(pack);
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut members = Vec::new();
    for child in ufs::list_dirs(&dir)? {
        if let Some(manifest) = ComponentManifest::load_opt(&dir.join(&child))? {
            members.push(format!(
                "{}-{}@{}",
                manifest.pack.as_deref().unwrap_or(pack),
                manifest.name.as_deref().unwrap_or(&child),
                manifest.version.as_deref().unwrap_or("*")
            ));
        }
    }
    Ok(Some(members))
}

pub fn remove(
    project: &mut Project,
    tools: &Toolbox,
    client: &ExchangeClient,
    names: &[String],
) -> Result<()> {
    if names.is_empty() {
        bail!("Please specify pack name(s) to remove.");
    }
    for name in names {
        match installed_members(project, name)? {
            Some(members) if !members.is_empty() => {
                component::remove(project, tools, client, &members)?
            }
            Some(_) => {}
            None => error!("Pack '{name}' not found."),
        }
    }
    println!("Pack(s) '{}' removed.", names.join(","));
    Ok(())
}

pub fn create(project: &Project, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Please specify a pack name.");
    }
    let dir = project
        .paths("web")
        .src_composites_dir(&project.root)
        .join(name);
    if dir.exists() {
        bail!("Pack '{name}' already exits.");
    }
    ufs::ensure_dir(&dir)?;
    let jet = project.jet_version()?.unwrap_or_default();
    let manifest = ComponentManifest {
        name: Some(name.to_string()),
        version: Some(DEFAULT_PACK_VERSION.to_string()),
        kind: Some("pack".to_string()),
        jet_version: Some(format!("^{jet}")),
        display_name: Some(name.to_string()),
        description: Some(String::new()),
        dependencies: Some(Default::default()),
        ..Default::default()
    };
    json::write_json_pretty(&dir.join(COMPONENT_JSON), &manifest)?;
    println!("Pack '{name}' successfully created.");
    Ok(())
}
