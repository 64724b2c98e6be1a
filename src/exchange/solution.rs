//! Applies a resolver solution to `jet_components` and `oraclejetconfig.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use crate::archive;
use crate::delegate::{Tool, Toolbox};
use crate::exchange::ExchangeClient;
use crate::exchange::model::{ChangeSet, ResolveResponse};
use crate::project::{ComponentEntry, ComponentManifest, PackEntry, Project};
use crate::util::fs as ufs;

fn components_dir(project: &Project) -> PathBuf {
    project.paths("web").components_dir(&project.root)
}

/// Installed components as the resolver expects them: packs carry their
/// members, everything else maps to its version.
pub fn environment(project: &Project) -> Result<BTreeMap<String, ComponentEntry>> {
    let base = components_dir(project);
    let mut env = BTreeMap::new();
    for dir in ufs::list_dirs(&base)? {
        let Some(manifest) = ComponentManifest::load_opt(&base.join(&dir))? else {
            continue;
        };
        let version = manifest.version.clone().unwrap_or_default();
        if manifest.is_pack() {
            let mut members = BTreeMap::new();
            for child in ufs::list_dirs(&base.join(&dir))? {
                if let Some(child_manifest) = ComponentManifest::load_opt(&base.join(&dir).join(&child))? {
                    members.insert(
                        child_manifest.name.unwrap_or(child),
                        child_manifest.version.unwrap_or_default(),
                    );
                }
            }
            env.insert(
                dir,
                ComponentEntry::Pack(PackEntry {
                    version: Some(version),
                    components: members,
                }),
            );
        } else {
            env.insert(manifest.name.unwrap_or(dir), ComponentEntry::Version(version));
        }
    }
    Ok(env)
}

pub fn execute(
    client: &ExchangeClient,
    project: &mut Project,
    tools: &Toolbox,
    response: ResolveResponse,
) -> Result<()> {
    let Some(solution) = response.solutions.into_iter().next() else {
        return Err(anyhow!(
            response
                .message
                .unwrap_or_else(|| "Sorry, your request could not be resolved.".to_string())
        ));
    };
    info!("Updating project components.");
    let base = components_dir(project);
    let env = &solution.environment_changes;

    let removed = remove_components(&base, &env.remove)?;
    if !env.remove.is_empty() {
        info!("{removed} component(s) removed from project.");
    }

    for (changes, is_add) in [(&env.add, true), (&env.update, false)] {
        let (queue, counter) = install_queue(&base, changes, is_add)?;
        for name in &queue {
            install(client, project, tools, &base, name)?;
        }
        if !queue.is_empty() {
            info!("{counter} component(s) added to project.");
        }
    }

    apply_config_changes(&mut project.config.components, &solution.config_changes);
    project.save()?;
    info!("Changes to configuration file applied.");
    Ok(())
}

fn remove_components(base: &Path, changes: &BTreeMap<String, ComponentEntry>) -> Result<usize> {
    let mut counter = 0;
    for (name, entry) in changes {
        let dir = base.join(name);
        match entry {
            ComponentEntry::Version(_) => {
                if dir.exists() {
                    ufs::remove_path(&dir)?;
                    counter += 1;
                } else {
                    warn!("Component '{name}' not found. Skipping.");
                }
            }
            ComponentEntry::Pack(pack) => {
                for member in pack.components.keys() {
                    let member_dir = dir.join(member);
                    if member_dir.exists() {
                        ufs::remove_path(&member_dir)?;
                        counter += 1;
                    } else {
                        warn!("Component '{name}/{member}' not found. Skipping.");
                    }
                }
                let has_member = ufs::list_dirs(&dir)?
                    .iter()
                    .any(|child| dir.join(child).join(crate::constants::COMPONENT_JSON).is_file());
                if dir.exists() && !has_member {
                    info!("Pack '{name}' removed as it remained empty.");
                    ufs::remove_path(&dir)?;
                }
            }
        }
    }
    Ok(counter)
}

/// `name@version` installs for one change set, plus the member count logged
/// afterwards.
fn install_queue(
    base: &Path,
    changes: &BTreeMap<String, ComponentEntry>,
    is_add: bool,
) -> Result<(Vec<String>, usize)> {
    let mut queue = Vec::new();
    let mut counter = 0;
    for (name, entry) in changes {
        match entry {
            ComponentEntry::Version(version) => {
                queue.push(format!("{name}@{version}"));
                counter += 1;
            }
            ComponentEntry::Pack(pack) => {
                let version = pack.version.clone().unwrap_or_default();
                let installed = if is_add {
                    ComponentManifest::load_opt(&base.join(name))?.and_then(|m| m.version)
                } else {
                    None
                };
                if installed.as_deref() == Some(version.as_str()) {
                    info!("Pack {name} already installed. Skipping.");
                } else {
                    queue.push(format!("{name}@{version}"));
                }
                for (member, member_version) in &pack.components {
                    queue.push(format!("{name}-{member}@{member_version}"));
                    counter += 1;
                }
            }
        }
    }
    Ok((queue, counter))
}

fn install(
    client: &ExchangeClient,
    project: &Project,
    tools: &Toolbox,
    base: &Path,
    name: &str,
) -> Result<()> {
    let metadata = client.component_metadata(name)?;
    let code_url = metadata
        .code_url
        .as_deref()
        .ok_or_else(|| anyhow!("Exchange returned no code url for '{name}'"))?;
    info!("Fetching '{}' bits from Exchange.", metadata.name);
    let bytes = client.download(code_url)?;

    let target = match &metadata.pack {
        Some(pack) => base.join(pack).join(metadata.dir_name()),
        None => base.join(&metadata.name),
    };
    prepare_target(&target, metadata.is_pack())?;
    info!("Unpacking '{}' archive.", metadata.name);
    archive::unpack(&target, bytes)
        .with_context(|| format!("failed to unpack '{}'", metadata.name))?;
    info!(
        "Component '{}' archive was successfully unpacked and installed.",
        metadata.name
    );

    if metadata.is_reference()
        && let Some(package) = metadata.component.package.as_deref()
    {
        info!(
            "Installing npm package '{package}' referenced by '{}'.",
            metadata.name
        );
        let npm = tools.get(Tool::Npm)?;
        npm.run(
            "install",
            npm.command()
                .current_dir(&project.root)
                .arg("install")
                .arg(package),
        )?;
        info!("Npm package '{package}' was successfully installed.");
    }
    Ok(())
}

/// Clears an existing install before unpacking over it. A pack keeps the
/// member directories that still have a manifest.
fn prepare_target(target: &Path, is_pack: bool) -> Result<()> {
    if !target.exists() {
        return ufs::ensure_dir(target);
    }
    if !is_pack {
        return ufs::empty_dir(target);
    }
    for entry in fs::read_dir(target).with_context(|| format!("failed to read {}", target.display()))? {
        let path = entry?.path();
        if path.is_dir() && path.join(crate::constants::COMPONENT_JSON).is_file() {
            continue;
        }
        ufs::remove_path(&path)?;
    }
    Ok(())
}

pub fn apply_config_changes(components: &mut BTreeMap<String, ComponentEntry>, changes: &ChangeSet) {
    for (name, entry) in &changes.remove {
        match entry {
            ComponentEntry::Version(_) => {
                components.remove(name);
            }
            ComponentEntry::Pack(removed) => {
                let now_empty = match components.get_mut(name) {
                    Some(ComponentEntry::Pack(pack)) => {
                        for member in removed.components.keys() {
                            pack.components.remove(member);
                        }
                        pack.components.is_empty()
                    }
                    _ => false,
                };
                if now_empty {
                    components.remove(name);
                }
            }
        }
    }
    merge_changes(components, &changes.add);
    merge_changes(components, &changes.update);
}

fn merge_changes(
    components: &mut BTreeMap<String, ComponentEntry>,
    changes: &BTreeMap<String, ComponentEntry>,
) {
    for (name, entry) in changes {
        match entry {
            ComponentEntry::Version(_) => {
                components.insert(name.clone(), entry.clone());
            }
            ComponentEntry::Pack(change) => {
                let mut pack = match components.remove(name) {
                    Some(ComponentEntry::Pack(pack)) => pack,
                    _ => PackEntry::default(),
                };
                pack.components
                    .extend(change.components.iter().map(|(k, v)| (k.clone(), v.clone())));
                pack.version = change.version.clone();
                components.insert(name.clone(), ComponentEntry::Pack(pack));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, body: serde_json::Value) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("component.json"), body.to_string()).unwrap();
    }

    fn changes(raw: serde_json::Value) -> ChangeSet {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn environment_lists_packs_with_members() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("jet_components");
        write_manifest(&base.join("oj-card"), json!({"name":"oj-card","version":"1.0.2"}));
        write_manifest(
            &base.join("oj-ext"),
            json!({"name":"oj-ext","version":"2.0.0","type":"pack"}),
        );
        write_manifest(
            &base.join("oj-ext/input-url"),
            json!({"name":"input-url","version":"2.0.1"}),
        );
        fs::create_dir_all(base.join("oj-ext/resources")).unwrap();

        let project = Project::load(temp.path()).unwrap();
        let env = environment(&project).unwrap();
        assert_eq!(env["oj-card"], ComponentEntry::Version("1.0.2".into()));
        let pack = env["oj-ext"].as_pack().unwrap();
        assert_eq!(pack.version.as_deref(), Some("2.0.0"));
        assert_eq!(pack.components.len(), 1);
        assert_eq!(pack.components["input-url"], "2.0.1");
    }

    #[test]
    fn removing_last_member_drops_pack_dir() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        write_manifest(&base.join("oj-ext"), json!({"type":"pack"}));
        write_manifest(&base.join("oj-ext/input-url"), json!({}));
        write_manifest(&base.join("oj-card"), json!({}));
        let set = changes(json!({"remove": {
            "oj-ext": {"components": {"input-url": "2.0.0"}},
            "oj-card": "1.0.0",
            "ghost": "1.0.0"
        }}));
        assert_eq!(remove_components(base, &set.remove).unwrap(), 2);
        assert!(!base.join("oj-ext").exists());
        assert!(!base.join("oj-card").exists());
    }

    #[test]
    fn queue_skips_installed_pack_on_add_only() {
        let temp = TempDir::new().unwrap();
        write_manifest(
            &temp.path().join("oj-ext"),
            json!({"type":"pack","version":"2.0.0"}),
        );
        let set = changes(json!({"add": {
            "oj-ext": {"version": "2.0.0", "components": {"input-url": "2.0.0"}},
            "oj-card": "1.0.2"
        }}));
        let (queue, counter) = install_queue(temp.path(), &set.add, true).unwrap();
        assert_eq!(queue, vec!["oj-card@1.0.2", "oj-ext-input-url@2.0.0"]);
        assert_eq!(counter, 2);

        let (queue, _) = install_queue(temp.path(), &set.add, false).unwrap();
        assert_eq!(
            queue,
            vec!["oj-card@1.0.2", "oj-ext@2.0.0", "oj-ext-input-url@2.0.0"]
        );
    }

    #[test]
    fn pack_target_keeps_members() {
        let temp = TempDir::new().unwrap();
        let pack = temp.path().join("oj-ext");
        write_manifest(&pack, json!({}));
        write_manifest(&pack.join("input-url"), json!({}));
        fs::create_dir_all(pack.join("resources")).unwrap();
        prepare_target(&pack, true).unwrap();
        assert!(pack.join("input-url/component.json").exists());
        assert!(!pack.join("resources").exists());
        assert!(!pack.join("component.json").exists());

        prepare_target(&pack, false).unwrap();
        assert!(!pack.join("input-url").exists());
        assert!(pack.is_dir());
    }

    #[test]
    fn config_changes_merge_and_prune() {
        let mut components: BTreeMap<String, ComponentEntry> = serde_json::from_value(json!({
            "oj-card": "1.0.0",
            "oj-ext": {"version": "2.0.0", "components": {"input-url": "2.0.0", "date": "2.0.0"}},
            "oj-solo": {"version": "1.0.0", "components": {"only": "1.0.0"}}
        }))
        .unwrap();
        let set = changes(json!({
            "remove": {
                "oj-card": "1.0.0",
                "oj-solo": {"components": {"only": "1.0.0"}}
            },
            "add": {"oj-new": "0.1.0"},
            "update": {"oj-ext": {"version": "2.1.0", "components": {"date": "2.1.0"}}}
        }));
        apply_config_changes(&mut components, &set);
        assert!(!components.contains_key("oj-card"));
        assert!(!components.contains_key("oj-solo"));
        assert_eq!(components["oj-new"], ComponentEntry::Version("0.1.0".into()));
        let ext = components["oj-ext"].as_pack().unwrap();
        assert_eq!(ext.version.as_deref(), Some("2.1.0"));
        assert_eq!(ext.components["date"], "2.1.0");
        assert_eq!(ext.components["input-url"], "2.0.0");
    }
}
