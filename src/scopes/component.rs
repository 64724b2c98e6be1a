//! `ojet add|remove component`.

use anyhow::{Result, bail};

use crate::delegate::Toolbox;
use crate::exchange::ExchangeClient;
use crate::exchange::model::ChangeKind;
use crate::exchange::solution;
use crate::project::Project;
use crate::util::fs as ufs;

pub fn add(
    project: &mut Project,
    tools: &Toolbox,
    client: &ExchangeClient,
    names: &[String],
    pack_version: Option<&str>,
) -> Result<()> {
    if names.is_empty() {
        bail!("Please specify component name(s) to add.");
    }
    project.exchange_url()?;
    ufs::ensure_dir(&project.paths("web").components_dir(&project.root))?;
    let response = client.resolve(project, ChangeKind::Add, names, pack_version)?;
    solution::execute(client, project, tools, response)?;
    println!("Component(s) '{}' added.", names.join(","));
    Ok(())
}

pub fn remove(
    project: &mut Project,
    tools: &Toolbox,
    client: &ExchangeClient,
    names: &[String],
) -> Result<()> {
    if names.is_empty() {
        bail!("Please specify component name(s) to remove.");
    }
    project.exchange_url()?;
    let response = client.resolve(project, ChangeKind::Remove, names, None)?;
    solution::execute(client, project, tools, response)?;
    println!("Component(s) '{}' removed.", names.join(","));
    Ok(())
}
