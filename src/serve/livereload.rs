//! Livereload notifier: a tiny HTTP endpoint the served pages poll for changes.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use anyhow::{Result, anyhow};
use serde::Serialize;
use tiny_http::{Method, Response, Server};
use tracing::{debug, info};

use crate::serve::server::with_header;

const CLIENT_SCRIPT: &str = r#"(function () {
  var script = document.currentScript;
  var base = script ? script.src.replace(/\/livereload\.js.*$/, '') : '';
  var version = -1;
  function swapStyles() {
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    for (var i = 0; i < links.length; i++) {
      var href = links[i].href.replace(/[?&]livereload=\d+/, '');
      links[i].href = href + (href.indexOf('?') === -1 ? '?' : '&') + 'livereload=' + Date.now();
    }
  }
  function poll() {
    fetch(base + '/changes?since=' + Math.max(version, 0))
      .then(function (res) { return res.json(); })
      .then(function (body) {
        if (version >= 0 && body.version > version) {
          var cssOnly = body.files.length > 0 && body.files.every(function (f) { return /\.css$/.test(f); });
          if (!cssOnly) { window.location.reload(); return; }
          swapStyles();
        }
        version = body.version;
      })
      .catch(function () {})
      .then(function () { setTimeout(poll, 1000); });
  }
  poll();
})();
"#;

const MAX_REMEMBERED: usize = 200;

#[derive(Debug, Default)]
struct ChangeState {
    version: u64,
    files: Vec<(u64, String)>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChangeReport {
    pub version: u64,
    pub files: Vec<String>,
}

/// Change counter shared by the watcher and the notifier endpoint.
#[derive(Debug, Clone, Default)]
pub struct ChangeLog {
    inner: Arc<Mutex<ChangeState>>,
}

impl ChangeLog {
    fn state(&self) -> MutexGuard<'_, ChangeState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn notify(&self, files: &[String]) {
        let mut state = self.state();
        state.version += 1;
        let version = state.version;
        state
            .files
            .extend(files.iter().map(|file| (version, file.clone())));
        let excess = state.files.len().saturating_sub(MAX_REMEMBERED);
        state.files.drain(..excess);
        debug!(version, ?files, "livereload notified");
    }

    /// Current version and the files changed after `since`.
    pub fn since(&self, since: u64) -> ChangeReport {
        let state = self.state();
        ChangeReport {
            version: state.version,
            files: state
                .files
                .iter()
                .filter(|(version, _)| *version > since)
                .map(|(_, file)| file.clone())
                .collect(),
        }
    }
}

fn since_param(url: &str) -> u64 {
    let Some((_, query)) = url.split_once('?') else {
        return 0;
    };
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "since")
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(0)
}

fn handle(changes: &ChangeLog, request: tiny_http::Request) {
    let url = request.url().to_string();
    let path = url.split('?').next().unwrap_or_default();
    let method = request.method().clone();
    let result = match (method, path) {
        (Method::Get, "/livereload.js") => request.respond(with_header(
            Response::from_string(CLIENT_SCRIPT),
            "Content-Type",
            "application/javascript",
        )),
        (Method::Get, "/changes") => {
            let body = serde_json::to_string(&changes.since(since_param(&url)))
                .unwrap_or_else(|_| "{}".to_string());
            let response = with_header(Response::from_string(body), "Content-Type", "application/json");
            request.respond(with_header(response, "Access-Control-Allow-Origin", "*"))
        }
        _ => request.respond(Response::from_string("Not Found").with_status_code(404)),
    };
    if let Err(err) = result {
        debug!("livereload response failed: {err}");
    }
}

/// Starts the notifier on `port` in a background thread.
pub fn start(port: u16, changes: ChangeLog) -> Result<JoinHandle<()>> {
    let server = Server::http(("0.0.0.0", port))
        .map_err(|err| anyhow!("failed to start livereload server on port {port}: {err}"))?;
    info!("Livereload server listening on port {port}.");
    Ok(thread::spawn(move || {
        for request in server.incoming_requests() {
            handle(&changes, request);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_files_after_version() {
        let log = ChangeLog::default();
        log.notify(&["web/index.html".into()]);
        log.notify(&["web/css/alta/web/alta.css".into()]);
        let report = log.since(1);
        assert_eq!(report.version, 2);
        assert_eq!(report.files, vec!["web/css/alta/web/alta.css".to_string()]);
        assert_eq!(log.since(0).files.len(), 2);
    }

    #[test]
    fn parses_since_query() {
        assert_eq!(since_param("/changes?since=7"), 7);
        assert_eq!(since_param("/changes?x=1&since=3"), 3);
        assert_eq!(since_param("/changes"), 0);
        assert_eq!(since_param("/changes?since=abc"), 0);
    }
}
