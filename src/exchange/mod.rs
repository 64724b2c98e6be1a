//! Client for the Exchange component registry REST API.

pub mod model;
pub mod solution;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, info, warn};
use url::Url;

use crate::project::Project;

use model::{
    ApiErrorBody, ChangeKind, ComponentMetadata, ResolveRequest, ResolveResponse, SearchResults,
    VersionList,
};

#[derive(Debug)]
pub enum ExchangeError {
    Http(reqwest::Error),
    Status(StatusCode, Option<String>),
    /// Errors reported by the registry, one formatted line each.
    Api(Vec<String>),
    InvalidResponse(anyhow::Error),
}

impl std::fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeError::Http(err) => write!(f, "http error: {err}"),
            ExchangeError::Status(code, body) => {
                if let Some(body) = body.as_deref().filter(|body| !body.trim().is_empty()) {
                    write!(f, "unexpected status {code}: {body}")
                } else {
                    write!(f, "unexpected status {code}")
                }
            }
            ExchangeError::Api(lines) => write!(f, "{}", lines.join("\n")),
            ExchangeError::InvalidResponse(err) => write!(f, "invalid response: {err}"),
        }
    }
}

impl std::error::Error for ExchangeError {}

impl From<reqwest::Error> for ExchangeError {
    fn from(value: reqwest::Error) -> Self {
        ExchangeError::Http(value)
    }
}

/// Splits a `name@version` argument. A missing version is `None`.
pub fn split_name(raw: &str) -> Result<(&str, Option<&str>)> {
    if raw.matches('@').count() > 1 {
        bail!("Component name '{raw}' is invalid: '@' can be used only once.");
    }
    match raw.split_once('@') {
        Some(("", _)) => bail!("Component name '{raw}' is invalid: missing component name."),
        Some((name, version)) if version.is_empty() => Ok((name, None)),
        Some((name, version)) => Ok((name, Some(version))),
        None => Ok((raw, None)),
    }
}

#[derive(Debug)]
pub struct ExchangeClient {
    base_url: Url,
    http: Client,
    metadata: RefCell<HashMap<String, ComponentMetadata>>,
}

impl ExchangeClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url.trim())
            .with_context(|| format!("invalid Exchange url `{base_url}`"))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url,
            http,
            metadata: RefCell::new(HashMap::new()),
        })
    }

    pub fn for_project(project: &Project) -> Result<Self> {
        Self::new(project.exchange_url()?)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Request URL for `path`, prefixed with the configured url's own path.
    pub fn endpoint(&self, path: &str) -> String {
        let origin = &self.base_url[..url::Position::BeforePath];
        let mut joined = format!("/{}/{}", self.base_url.path(), path);
        while joined.contains("//") {
            joined = joined.replace("//", "/");
        }
        format!("{origin}{joined}")
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response, ExchangeError> {
        let response = builder.send()?;
        debug!(status = %response.status(), url = %response.url(), "exchange response");
        self.check(response)
    }

    fn check(&self, response: Response) -> Result<Response, ExchangeError> {
        let status = response.status();
        if !status.is_client_error() && !status.is_server_error() {
            return Ok(response);
        }
        let body = response.text().ok();
        if let Some(raw) = body.as_deref()
            && let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(raw)
            && !parsed.errors.is_empty()
        {
            let more_info = self.endpoint("");
            let lines = parsed
                .errors
                .iter()
                .map(|err| format!("{}. More info: {more_info}exceptions/{}", err.message, err.id))
                .collect();
            return Err(ExchangeError::Api(lines));
        }
        Err(ExchangeError::Status(status, body))
    }

    fn json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ExchangeError> {
        let text = response.text()?;
        debug!("Response body\n{text}");
        serde_json::from_str(&text).map_err(|err| ExchangeError::InvalidResponse(err.into()))
    }

    /// Builds the resolver request for `names` and sends it.
    pub fn resolve(
        &self,
        project: &Project,
        change: ChangeKind,
        names: &[String],
        pack_version: Option<&str>,
    ) -> Result<ResolveResponse> {
        let mut changes = BTreeMap::new();
        let mut first_pack: Option<String> = None;
        for raw in names {
            let (name, version) = split_name(raw)?;
            changes.insert(name.to_string(), version.unwrap_or("*").to_string());
            if change == ChangeKind::Add
                && let Some(pack_version) = pack_version
            {
                let metadata = self.component_metadata(raw)?;
                if let Some(pack) = metadata.pack {
                    if let Some(first) = &first_pack
                        && *first != pack
                    {
                        bail!("Component {raw} does not belong to a {first} pack.");
                    }
                    first_pack = Some(pack.clone());
                    changes.insert(pack, pack_version.to_string());
                }
            }
        }
        let request = ResolveRequest {
            config: project.config.components.clone(),
            environment: solution::environment(project)?,
            changes: BTreeMap::from([(change.as_str().to_string(), changes)]),
        };
        info!("Resolving dependencies.");
        debug!("Resolver request: {}", serde_json::to_string(&request)?);
        let builder = self
            .http
            .put(self.endpoint("/dependencyResolver"))
            .header(ACCEPT, "application/json")
            .json(&request);
        let response: ResolveResponse = Self::json(self.send(builder)?)?;
        if response.solutions.is_empty() {
            warn!(
                "Requested component(s)/version(s) or their dependencies cannot be found in Exchange or are in conflict with already installed components."
            );
        } else {
            info!("Dependencies resolved.");
        }
        Ok(response)
    }

    pub fn access_token(&self, username: &str, password: &str) -> Result<String, ExchangeError> {
        let builder = self
            .http
            .post(self.endpoint("/auth/token"))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&[("username", username), ("password", password)]);
        let token = self.send(builder)?.text()?;
        debug!("Access token:\n{token}");
        Ok(token)
    }

    /// Metadata for `name[@version]`, cached for the client's lifetime.
    pub fn component_metadata(&self, raw: &str) -> Result<ComponentMetadata> {
        let (name, version) = split_name(raw)?;
        let key = format!("{name}@{}", version.unwrap_or("*"));
        if let Some(hit) = self.metadata.borrow().get(&key) {
            return Ok(hit.clone());
        }
        let path = match version {
            Some(version) => format!("/components/{name}/versions/{version}"),
            None => format!("/components/{name}"),
        };
        info!("Fetching '{raw}' metadata from Exchange.");
        let builder = self
            .http
            .get(self.endpoint(&path))
            .header(ACCEPT, "application/json");
        let metadata: ComponentMetadata = Self::json(self.send(builder)?)?;
        self.metadata.borrow_mut().insert(key, metadata.clone());
        Ok(metadata)
    }

    pub fn download(&self, code_url: &str) -> Result<bytes::Bytes, ExchangeError> {
        let response = self.send(self.http.get(code_url))?;
        response.bytes().map_err(ExchangeError::Http)
    }

    /// Published versions of `name`; `None` when it was never published.
    pub fn versions(&self, name: &str) -> Result<Option<VersionList>, ExchangeError> {
        let response = self
            .http
            .get(self.endpoint(&format!("components/{name}/versions")))
            .header(ACCEPT, "application/json")
            .send()?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = self.check(response)?;
        Self::json(response).map(Some)
    }

    pub fn upload(&self, archive: &Path, token: &str) -> Result<()> {
        let part = Part::file(archive)
            .with_context(|| format!("failed to read {}", archive.display()))?;
        let form = Form::new().part("file", part);
        let builder = self
            .http
            .post(self.endpoint("/components"))
            .query(&[("access", "PUBLIC")])
            .header(AUTHORIZATION, token)
            .multipart(form);
        let response = self.send(builder)?;
        debug!("Upload response: {}", response.text().unwrap_or_default());
        Ok(())
    }

    pub fn search(&self, query: &str) -> Result<SearchResults, ExchangeError> {
        let builder = self
            .http
            .get(self.endpoint("/components/"))
            .query(&[("q", format!("{query}*").as_str()), ("format", "full")])
            .header(ACCEPT, "application/json");
        Self::json(self.send(builder)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_versioned_names() {
        assert_eq!(split_name("oj-card").unwrap(), ("oj-card", None));
        assert_eq!(split_name("oj-card@1.0.2").unwrap(), ("oj-card", Some("1.0.2")));
        assert_eq!(split_name("oj-card@").unwrap(), ("oj-card", None));
        assert!(
            split_name("a@1@2")
                .unwrap_err()
                .to_string()
                .contains("'@' can be used only once")
        );
        assert!(
            split_name("@1.0.0")
                .unwrap_err()
                .to_string()
                .contains("missing component name")
        );
    }

    #[test]
    fn endpoint_keeps_base_path_and_collapses_slashes() {
        let client = ExchangeClient::new("https://exchange.example.com/api/").unwrap();
        assert_eq!(
            client.endpoint("/components/oj-card"),
            "https://exchange.example.com/api/components/oj-card"
        );
        let bare = ExchangeClient::new("http://localhost:8080").unwrap();
        assert_eq!(
            bare.endpoint("components/x/versions"),
            "http://localhost:8080/components/x/versions"
        );
        assert_eq!(bare.endpoint(""), "http://localhost:8080/");
    }

    #[test]
    fn api_errors_render_one_line_each() {
        let err = ExchangeError::Api(vec!["first".into(), "second".into()]);
        assert_eq!(err.to_string(), "first\nsecond");
    }
}
