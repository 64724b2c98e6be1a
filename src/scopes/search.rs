//! `ojet search exchange <query>`.

use anyhow::Result;
use serde_json::Value;

use crate::constants::NO_COMPONENTS_FOUND;
use crate::exchange::ExchangeClient;
use crate::scopes::list::cell;

const COLUMN_WIDTH: usize = 40;
const VERSIONS_WIDTH: usize = 80;

fn columns(versions: bool) -> Vec<(&'static str, usize)> {
    if versions {
        vec![
            ("name", COLUMN_WIDTH),
            ("displayName", COLUMN_WIDTH),
            ("versions", VERSIONS_WIDTH),
        ]
    } else {
        vec![
            ("name", COLUMN_WIDTH),
            ("displayName", COLUMN_WIDTH),
            ("tags", COLUMN_WIDTH),
            ("description", COLUMN_WIDTH),
        ]
    }
}

fn text(value: Option<&Value>) -> &str {
    value.and_then(Value::as_str).unwrap_or_default()
}

fn tags(item: &Value) -> Vec<&str> {
    item.get("tags")
        .or_else(|| item.pointer("/component/tags"))
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn value_for(item: &Value, key: &str, query: &str) -> String {
    match key {
        "name" => text(item.get("name")).to_string(),
        "displayName" | "description" => text(item.pointer(&format!("/component/{key}"))).to_string(),
        "tags" => {
            let tags = tags(item);
            let needle = query.to_lowercase();
            tags.iter()
                .find(|tag| tag.to_lowercase().contains(&needle))
                .or_else(|| tags.first())
                .map(|tag| tag.to_string())
                .unwrap_or_default()
        }
        "versions" => item
            .get("versions")
            .and_then(Value::as_array)
            .map(|versions| {
                versions
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default(),
        _ => String::new(),
    }
}

pub fn render(items: &[Value], query: &str, versions: bool) -> Vec<String> {
    if items.is_empty() {
        return vec![NO_COMPONENTS_FOUND.to_string()];
    }
    let columns = columns(versions);
    let row = |cells: Vec<String>| -> String {
        cells
            .iter()
            .zip(&columns)
            .map(|(value, (_, width))| format!("{} ", cell(value, *width)))
            .collect::<String>()
            .trim_end()
            .to_string()
    };
    let mut lines = vec![row(columns.iter().map(|(key, _)| format!("<{key}>")).collect())];
    for item in items {
        lines.push(row(columns
            .iter()
            .map(|(key, _)| value_for(item, key, query))
            .collect()));
    }
    lines
}

pub fn search(client: &ExchangeClient, query: &str, versions: bool) -> Result<()> {
    let results = client.search(query)?;
    for line in render(&results.items, query, versions) {
        println!("{line}");
    }
    Ok(())
}
