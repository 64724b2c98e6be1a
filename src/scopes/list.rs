//! `ojet list component|pack`: config entries against what is installed.

use anyhow::Result;

use crate::constants::{NO_COMPONENTS_FOUND, NOT_IN_CONFIG_NOTE, NOT_INSTALLED_NOTE};
use crate::project::{ComponentEntry, ComponentManifest, Project};
use crate::util::fs as ufs;

const NAME_WIDTH: usize = 30;

/// Pads or truncates `value` to exactly `width` characters.
pub(crate) fn cell(value: &str, width: usize) -> String {
    let truncated: String = value.chars().take(width).collect();
    format!("{truncated:<width$}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    Component,
    Pack,
}

fn in_config(project: &Project, scope: ListScope) -> Vec<String> {
    let mut items = Vec::new();
    for (name, entry) in &project.config.components {
        match (scope, entry) {
            (ListScope::Component, ComponentEntry::Version(_)) => items.push(name.clone()),
            (ListScope::Component, ComponentEntry::Pack(pack)) => items.extend(
                pack.components
                    .keys()
                    .map(|member| format!("{name}-{member}")),
            ),
            (ListScope::Pack, ComponentEntry::Pack(_)) => items.push(name.clone()),
            (ListScope::Pack, ComponentEntry::Version(_)) => {}
        }
    }
    items
}

fn on_disk(project: &Project, scope: ListScope) -> Result<Vec<String>> {
    let base = project.paths("web").components_dir(&project.root);
    let mut items = Vec::new();
    for dir in ufs::list_dirs(&base)? {
        let is_pack = ComponentManifest::load_opt(&base.join(&dir))?
            .is_some_and(|manifest| manifest.is_pack());
        match (scope, is_pack) {
            (ListScope::Component, true) => {
                for child in ufs::list_dirs(&base.join(&dir))? {
                    if ComponentManifest::load_opt(&base.join(&dir).join(&child))?.is_some() {
                        items.push(format!("{dir}-{child}"));
                    }
                }
            }
            (ListScope::Component, false) | (ListScope::Pack, true) => items.push(dir),
            (ListScope::Pack, false) => {}
        }
    }
    Ok(items)
}

/// Table lines for the two item lists.
pub fn render(config: &[String], disk: &[String]) -> Vec<String> {
    if config.is_empty() && disk.is_empty() {
        return vec![NO_COMPONENTS_FOUND.to_string()];
    }
    let mut lines = vec![format!("{} <note>", cell("<name>", NAME_WIDTH))];
    for item in disk {
        let note = if config.contains(item) {
            ""
        } else {
            NOT_IN_CONFIG_NOTE
        };
        lines.push(format!("{} {note}", cell(item, NAME_WIDTH)));
    }
    for item in config.iter().filter(|item| !disk.contains(item)) {
        lines.push(format!("{} {NOT_INSTALLED_NOTE}", cell(item, NAME_WIDTH)));
    }
    lines
}

pub fn list(project: &Project, scope: ListScope) -> Result<()> {
    let config = in_config(project, scope);
    let disk = on_disk(project, scope)?;
    for line in render(&config, &disk) {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn cells_pad_and_truncate() {
        assert_eq!(cell("abc", 5), "abc  ");
        assert_eq!(cell("abcdefgh", 5), "abcde");
    }

    #[test]
    fn renders_notes_for_mismatches() {
        let config = vec!["oj-card".to_string(), "oj-gone".to_string()];
        let disk = vec!["oj-card".to_string(), "oj-local".to_string()];
        let lines = render(&config, &disk);
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("<name>"));
        assert_eq!(lines[1].trim_end(), "oj-card");
        assert!(lines[2].ends_with(NOT_IN_CONFIG_NOTE));
        assert!(lines[3].starts_with("oj-gone"));
        assert!(lines[3].ends_with(NOT_INSTALLED_NOTE));
        assert_eq!(render(&[], &[]), vec![NO_COMPONENTS_FOUND.to_string()]);
    }

    #[test]
    fn collects_pack_members_from_config_and_disk() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(
            root.join("oraclejetconfig.json"),
            r#"{"components":{"oj-card":"1.0.0","oj-ext":{"version":"2.0.0","components":{"input-url":"2.0.0"}}}}"#,
        )
        .unwrap();
        let pack = root.join("jet_components/oj-ext");
        fs::create_dir_all(pack.join("input-url")).unwrap();
        fs::write(pack.join("component.json"), r#"{"type":"pack"}"#).unwrap();
        fs::write(pack.join("input-url/component.json"), "{}").unwrap();

        let project = Project::load(root).unwrap();
        assert_eq!(
            in_config(&project, ListScope::Component),
            vec!["oj-card", "oj-ext-input-url"]
        );
        assert_eq!(on_disk(&project, ListScope::Component).unwrap(), vec!["oj-ext-input-url"]);
        assert_eq!(in_config(&project, ListScope::Pack), vec!["oj-ext"]);
        assert_eq!(on_disk(&project, ListScope::Pack).unwrap(), vec!["oj-ext"]);
    }
}
