//! `ojet publish component|pack`.

use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use crate::archive;
use crate::build::{BuildContext, component as component_build};
use crate::constants::COMPONENT_JSON;
use crate::exchange::ExchangeClient;
use crate::project::{ComponentManifest, ConfiguredPaths, Project};
use crate::util::fs as ufs;

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
    /// Token from the tool config, used when no username/password is given.
    pub token: Option<String>,
    /// Username offered at the interactive prompt.
    pub default_username: Option<String>,
}

pub struct Publisher<'a> {
    project: &'a Project,
    client: &'a ExchangeClient,
    credentials: Credentials,
    /// Set for `--release`: the component is rebuilt before packaging.
    build: Option<&'a BuildContext>,
    token: RefCell<Option<String>>,
    paths: ConfiguredPaths,
}

fn descriptor_version(dir: &Path, label: &str) -> Result<String> {
    let path = dir.join(COMPONENT_JSON);
    let Some(manifest) = ComponentManifest::load_opt(dir)? else {
        bail!("{label} descriptor '{}' does not exist.", path.display());
    };
    let version = manifest
        .version
        .with_context(|| format!("Missing property 'version' in '{}'.", path.display()))?;
    semver::Version::parse(&version)
        .with_context(|| format!("Invalid version '{version}' in '{}'.", path.display()))?;
    Ok(version)
}

fn display_name(name: &str, pack: Option<&str>) -> String {
    match pack {
        Some(pack) => format!("'{name}' of a pack '{pack}'"),
        None => format!("'{name}'"),
    }
}

impl<'a> Publisher<'a> {
    pub fn new(
        project: &'a Project,
        client: &'a ExchangeClient,
        credentials: Credentials,
        build: Option<&'a BuildContext>,
    ) -> Self {
        Self {
            project,
            client,
            credentials,
            build,
            token: RefCell::new(None),
            paths: project.paths("web"),
        }
    }

    fn src_composites(&self) -> PathBuf {
        self.paths.src_composites_dir(&self.project.root)
    }

    /// `web/js/jet-composites` and `hybrid/www/js/jet-composites`.
    fn built_roots(&self) -> (PathBuf, PathBuf) {
        let root = &self.project.root;
        let web = self.paths.staging_composites_dir(root);
        let hybrid = root
            .join(&self.paths.staging.hybrid)
            .join("www")
            .join(&self.paths.src.javascript)
            .join(&self.paths.composites);
        (web, hybrid)
    }

    /// Signs in once; later calls reuse the token.
    pub fn sign_in(&self) -> Result<String> {
        if let Some(token) = self.token.borrow().as_ref() {
            return Ok(token.clone());
        }
        let creds = &self.credentials;
        let token = match (&creds.username, &creds.password, &creds.token) {
            (Some(user), Some(pass), _) => self.client.access_token(user, pass)?,
            (_, _, Some(token)) => token.clone(),
            _ => {
                let (user, pass) = prompt_credentials(creds.default_username.as_deref())?;
                let token = self.client.access_token(&user, &pass)?;
                info!("Access token successfully retrieved.");
                token
            }
        };
        *self.token.borrow_mut() = Some(token.clone());
        Ok(token)
    }

    pub fn publish_component(&self, name: &str, pack: Option<&str>) -> Result<()> {
        let src_root = self.src_composites();
        let (src_dir, rel) = match pack {
            Some(pack) => {
                let pack_version = descriptor_version(&src_root.join(pack), "Pack's")?;
                let dir = src_root.join(pack).join(name);
                descriptor_version(&dir, "Pack component's")?;
                (dir, PathBuf::from(pack).join(pack_version).join(name))
            }
            None => {
                let dir = src_root.join(name);
                let version = descriptor_version(&dir, "Component's")?;
                (dir, PathBuf::from(name).join(version))
            }
        };

        if let Some(ctx) = self.build {
            component_build::build_component(ctx, pack.unwrap_or(name))?;
        }

        let (web, hybrid) = self.built_roots();
        let (web_dir, hybrid_dir) = (web.join(&rel), hybrid.join(&rel));
        let dir = if hybrid_dir.is_dir() {
            hybrid_dir
        } else {
            if !web_dir.is_dir() {
                ufs::copy_dir(&src_dir, &web_dir)?;
            }
            web_dir
        };

        self.upload(name, pack, &dir, None)?;
        println!("Component {} was published.", display_name(name, pack));
        Ok(())
    }

    fn upload(&self, name: &str, pack: Option<&str>, dir: &Path, only: Option<&[String]>) -> Result<()> {
        let token = self.sign_in()?;
        let label = display_name(name, pack);
        let archive_file = tempfile::Builder::new()
            .prefix("component")
            .suffix(".zip")
            .tempfile()
            .context("failed to create archive file")?;
        archive::pack_dir(dir, archive_file.path(), only)?;
        info!("Component {label} was successfully archived.");
        info!("Uploading {label} archive to Exchange.");
        self.client.upload(archive_file.path(), &token)?;
        info!("Component {label} was successfully uploaded to Exchange.");
        Ok(())
    }

    pub fn publish_pack(&self, pack: &str) -> Result<()> {
        let pack_src = self.src_composites().join(pack);
        let pack_version = descriptor_version(&pack_src, "Pack's")?;
        let manifest = ComponentManifest::load(&pack_src)?;

        let mut members = Vec::new();
        let prefix = format!("{pack}-");
        for full in manifest.dependencies.unwrap_or_default().keys() {
            let short = full.strip_prefix(&prefix).unwrap_or(full);
            let dir = pack_src.join(short);
            match ComponentManifest::load_opt(&dir)?.and_then(|m| m.version) {
                Some(version) => members.push((short.to_string(), version)),
                None => info!(
                    "Pack component's descriptor '{}' not found. This component won't be published. Skipping.",
                    dir.join(COMPONENT_JSON).display()
                ),
            }
        }

        let rel = PathBuf::from(pack).join(&pack_version);
        let (web, hybrid) = self.built_roots();
        let (web_dir, hybrid_dir) = (web.join(&rel), hybrid.join(&rel));
        let built = if hybrid_dir.is_dir() {
            hybrid_dir
        } else if web_dir.is_dir() {
            web_dir
        } else {
            bail!(
                "Pack '{pack}' not found in built directories:\n'{}'\n'{}'\nPlease use 'ojet build' to build the project.",
                web_dir.display(),
                hybrid_dir.display()
            );
        };

        if let Some(published) = self.client.versions(pack)?
            && published.contains(&pack_version)
        {
            bail!("Pack '{pack}@{pack_version}' is already published. Please update its version.");
        }

        let mut to_publish = Vec::new();
        for (short, version) in &members {
            let published = self.client.versions(&format!("{pack}-{short}"))?;
            if published.is_some_and(|list| list.contains(version)) {
                info!(
                    "Component '{short}@{version}' of a pack '{pack}' is already published. Skipping."
                );
            } else {
                to_publish.push(short.clone());
            }
        }

        self.sign_in()?;
        for short in &to_publish {
            self.publish_component(short, Some(pack))?;
        }

        let mut contents = Vec::new();
        for entry in std::fs::read_dir(&built)
            .with_context(|| format!("failed to read {}", built.display()))?
        {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let is_member = members.iter().any(|(short, _)| *short == file_name);
            if entry.file_type()?.is_file() || !is_member {
                contents.push(file_name);
            }
        }
        contents.sort();
        self.upload(pack, None, &built, Some(&contents))?;
        println!("Pack '{pack}' was uploaded to Exchange.");
        Ok(())
    }
}

fn prompt_credentials(default_user: Option<&str>) -> Result<(String, String)> {
    let mut stdout = io::stdout();
    match default_user {
        Some(user) => write!(stdout, "Username ({user}): ")?,
        None => write!(stdout, "Username: ")?,
    }
    stdout.flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read username")?;
    let typed = line.trim();
    let user = if typed.is_empty() {
        default_user.unwrap_or_default().to_string()
    } else {
        typed.to_string()
    };
    if user.is_empty() {
        bail!("Exchange username is required.");
    }
    let pass = rpassword::prompt_password("Password: ").context("failed to read password")?;
    Ok((user, pass))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_descriptor_is_reported() {
        let temp = TempDir::new().unwrap();
        let err = descriptor_version(temp.path(), "Component's").unwrap_err();
        assert!(err.to_string().contains("Component's descriptor"));
    }

    #[test]
    fn rejects_non_semver_versions() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(COMPONENT_JSON), r#"{"version":"1.0"}"#).unwrap();
        let err = descriptor_version(temp.path(), "Component's").unwrap_err();
        assert!(err.to_string().contains("Invalid version '1.0'"));
    }

    #[test]
    fn configured_token_skips_sign_in_request() {
        let temp = TempDir::new().unwrap();
        let project = Project::load(temp.path()).unwrap();
        let client = ExchangeClient::new("http://127.0.0.1:9").unwrap();
        let publisher = Publisher::new(
            &project,
            &client,
            Credentials {
                token: Some("Bearer abc".into()),
                ..Default::default()
            },
            None,
        );
        assert_eq!(publisher.sign_in().unwrap(), "Bearer abc");
    }
}
