//! Exchange-facing verbs and the small project maintenance commands.

pub mod component;
pub mod list;
pub mod pack;
pub mod publish;
pub mod search;

use anyhow::{Result, bail};
use tracing::info;

use crate::delegate::{Tool, Toolbox};
use crate::project::Project;

/// `ojet configure --exchange-url <url>`.
pub fn configure(project: &mut Project, exchange_url: Option<&str>) -> Result<()> {
    let Some(url) = exchange_url.map(str::trim).filter(|url| !url.is_empty()) else {
        bail!("Please specify '--exchange-url' to configure.");
    };
    url::Url::parse(url).map_err(|err| anyhow::anyhow!("Exchange url '{url}' is invalid: {err}"))?;
    project.set_exchange_url(url)?;
    println!("Exchange url set: '{url}'");
    Ok(())
}

/// `ojet add sass`: installs the sass compiler as a dev dependency.
pub fn add_sass(project: &Project, tools: &Toolbox) -> Result<()> {
    info!("Installing sass.");
    let npm = tools.get(Tool::Npm)?;
    npm.run(
        "install sass",
        npm.command()
            .current_dir(&project.root)
            .args(["install", "sass", "--save-dev"]),
    )?;
    println!("Sass installed.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn configure_creates_config_file() {
        let temp = TempDir::new().unwrap();
        let mut project = Project::load(temp.path()).unwrap();
        configure(&mut project, Some("https://exchange.example.com/api/")).unwrap();
        let written = fs::read_to_string(temp.path().join("oraclejetconfig.json")).unwrap();
        assert!(written.contains("\"exchange-url\": \"https://exchange.example.com/api/\""));
        assert_eq!(
            Project::load(temp.path()).unwrap().exchange_url().unwrap(),
            "https://exchange.example.com/api/"
        );
    }

    #[test]
    fn configure_rejects_invalid_urls() {
        let temp = TempDir::new().unwrap();
        let mut project = Project::load(temp.path()).unwrap();
        assert!(configure(&mut project, Some("not a url")).is_err());
        assert!(configure(&mut project, None).is_err());
        assert!(!temp.path().join("oraclejetconfig.json").exists());
    }
}
