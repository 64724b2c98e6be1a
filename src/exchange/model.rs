use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::project::ComponentEntry;

/// `changes` key of a resolver request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Remove,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Remove => "remove",
        }
    }
}

/// Body of `PUT /dependencyResolver`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolveRequest {
    pub config: BTreeMap<String, ComponentEntry>,
    pub environment: BTreeMap<String, ComponentEntry>,
    pub changes: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveResponse {
    #[serde(default)]
    pub solutions: Vec<Solution>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    #[serde(default)]
    pub environment_changes: ChangeSet,
    #[serde(default)]
    pub config_changes: ChangeSet,
}

/// One side of a solution. Values are plain versions, or packs with their
/// member versions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub remove: BTreeMap<String, ComponentEntry>,
    #[serde(default)]
    pub add: BTreeMap<String, ComponentEntry>,
    #[serde(default)]
    pub update: BTreeMap<String, ComponentEntry>,
}

/// `GET /components/<name>[/versions/<v>]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMetadata {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub pack: Option<String>,
    #[serde(default)]
    pub code_url: Option<String>,
    #[serde(default)]
    pub component: ComponentDetails,
}

impl ComponentMetadata {
    pub fn is_pack(&self) -> bool {
        self.kind.as_deref() == Some("pack")
    }

    pub fn is_reference(&self) -> bool {
        self.kind.as_deref() == Some("reference")
    }

    /// Directory name under its pack; registry names of pack members carry a
    /// `<pack>-` prefix.
    pub fn dir_name(&self) -> &str {
        match &self.pack {
            Some(pack) => self
                .name
                .strip_prefix(pack.as_str())
                .and_then(|rest| rest.strip_prefix('-'))
                .filter(|rest| !rest.is_empty())
                .unwrap_or(&self.name),
            None => &self.name,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDetails {
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionList {
    #[serde(default)]
    pub items: Vec<String>,
}

impl VersionList {
    pub fn contains(&self, version: &str) -> bool {
        self.items.iter().any(|item| item == version)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ApiErrorItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
}
