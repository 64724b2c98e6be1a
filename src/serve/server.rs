//! Static file server for the staging directory.

use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::thread::{self, JoinHandle};

use anyhow::{Result, anyhow};
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, info};

use crate::constants::INDEX_HTML;

pub(crate) fn with_header<R: Read>(response: Response<R>, name: &str, value: &str) -> Response<R> {
    match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

/// Maps a request path onto a file under `root`; `..` segments are refused.
pub fn resolve_path(root: &Path, url: &str) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let decoded = urlencoding::decode(path).ok()?;
    let mut resolved = root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

/// Inserts the livereload client before `</body>`, or appends it.
pub fn inject_livereload(html: &str, host: &str, port: u16) -> String {
    let tag = format!("<script src=\"//{host}:{port}/livereload.js\"></script>");
    match html.rfind("</body>") {
        Some(at) => format!("{}{tag}\n{}", &html[..at], &html[at..]),
        None => format!("{html}{tag}"),
    }
}

fn listing(root: &Path, dir: &Path) -> Result<String> {
    let rel = dir.strip_prefix(root).unwrap_or(dir);
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();
    let items: String = names
        .iter()
        .map(|name| {
            let href = urlencoding::encode(name.trim_end_matches('/'));
            let slash = if name.ends_with('/') { "/" } else { "" };
            format!("<li><a href=\"{href}{slash}\">{name}</a></li>\n")
        })
        .collect();
    Ok(format!(
        "<html><body><h1>Index of /{}</h1>\n<ul>\n{items}</ul>\n</body></html>",
        crate::util::fs::slash(rel)
    ))
}

#[derive(Debug, Clone)]
pub struct StaticServer {
    root: PathBuf,
    livereload_port: Option<u16>,
}

impl StaticServer {
    pub fn new(root: impl Into<PathBuf>, livereload_port: Option<u16>) -> Self {
        Self {
            root: root.into(),
            livereload_port,
        }
    }

    /// Status, content type and body for a GET of `url`.
    pub fn render(&self, url: &str, host: &str) -> (u16, String, Vec<u8>) {
        let not_found = (404, "text/plain".to_string(), b"Not Found".to_vec());
        let Some(mut path) = resolve_path(&self.root, url) else {
            return not_found;
        };
        if path.is_dir() {
            let index = path.join(INDEX_HTML);
            if !index.is_file() {
                return match listing(&self.root, &path) {
                    Ok(body) => (200, "text/html".to_string(), body.into_bytes()),
                    Err(_) => not_found,
                };
            }
            path = index;
        }
        let Ok(body) = fs::read(&path) else {
            return not_found;
        };
        let mime = mime_guess::from_path(&path).first_or_octet_stream();
        let is_html = mime.essence_str() == "text/html";
        match self.livereload_port {
            Some(port) if is_html => {
                let html = inject_livereload(&String::from_utf8_lossy(&body), host, port);
                (200, mime.to_string(), html.into_bytes())
            }
            _ => (200, mime.to_string(), body),
        }
    }

    fn handle(&self, request: Request) {
        let method = request.method().clone();
        if !matches!(method, Method::Get | Method::Head) {
            let _ = request.respond(Response::from_string("Method Not Allowed").with_status_code(405));
            return;
        }
        let host = request
            .headers()
            .iter()
            .find(|header| header.field.equiv("Host"))
            .map(|header| header.value.as_str().to_string())
            .and_then(|value| value.split(':').next().map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string());
        let url = request.url().to_string();
        let (status, content_type, body) = self.render(&url, &host);
        debug!(status, url = %url, "serve");
        let body = if method == Method::Head { Vec::new() } else { body };
        let response = with_header(
            Response::from_data(body).with_status_code(status),
            "Content-Type",
            &content_type,
        );
        if let Err(err) = request.respond(response) {
            debug!("response failed: {err}");
        }
    }

    /// Binds `0.0.0.0:<port>` and serves from a background thread.
    pub fn start(self, port: u16) -> Result<JoinHandle<()>> {
        let server = Server::http(("0.0.0.0", port))
            .map_err(|err| anyhow!("failed to start server on port {port}: {err}"))?;
        info!("Serving {} on port {port}.", self.root.display());
        Ok(thread::spawn(move || {
            for request in server.incoming_requests() {
                self.handle(request);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn refuses_parent_segments() {
        let root = Path::new("/srv/web");
        assert_eq!(
            resolve_path(root, "/js/main.js?x=1"),
            Some(PathBuf::from("/srv/web/js/main.js"))
        );
        assert!(resolve_path(root, "/../etc/passwd").is_none());
        assert!(resolve_path(root, "/%2e%2e/etc/passwd").is_none());
        assert_eq!(
            resolve_path(root, "/css/my%20theme.css"),
            Some(PathBuf::from("/srv/web/css/my theme.css"))
        );
    }

    #[test]
    fn injects_livereload_into_html_only() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.html"), "<html><body>hi</body></html>").unwrap();
        fs::write(temp.path().join("app.js"), "var a;").unwrap();
        let server = StaticServer::new(temp.path(), Some(35729));

        let (status, mime, body) = server.render("/", "localhost");
        assert_eq!(status, 200);
        assert_eq!(mime, "text/html");
        let html = String::from_utf8(body).unwrap();
        assert!(html.contains("<script src=\"//localhost:35729/livereload.js\"></script>\n</body>"));

        let (_, mime, body) = server.render("/app.js", "localhost");
        assert!(mime.contains("javascript"));
        assert_eq!(body, b"var a;");

        let (status, _, _) = server.render("/missing.css", "localhost");
        assert_eq!(status, 404);
    }

    #[test]
    fn lists_directories_without_index() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("css/alta")).unwrap();
        let server = StaticServer::new(temp.path(), None);
        let (status, _, body) = server.render("/css", "localhost");
        assert_eq!(status, 200);
        assert!(String::from_utf8(body).unwrap().contains("alta/"));
    }

    #[test]
    fn decodes_and_encodes_names_with_spaces() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("my theme")).unwrap();
        fs::write(temp.path().join("my theme/a b.css"), "").unwrap();
        assert!(resolve_path(temp.path(), "/my%20theme/a%20b.css").unwrap().is_file());
        assert!(resolve_path(temp.path(), "/%ff").is_none());

        let server = StaticServer::new(temp.path(), None);
        let (_, _, body) = server.render("/", "localhost");
        assert!(String::from_utf8(body).unwrap().contains("href=\"my%20theme/\""));
    }
}
