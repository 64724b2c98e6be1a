//! File watcher driving incremental copies and livereload notifications.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{RecvTimeoutError, channel};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::build::{BuildContext, LiveChange, Step, paths as build_paths};
use crate::constants::{INDEX_HTML, MAIN_JS, SUPPORTED_THEME_PLATFORMS, WATCH_DEBOUNCE_MS};
use crate::inject;
use crate::options::Theme;
use crate::serve::livereload::ChangeLog;
use crate::util::fs as ufs;
use crate::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchTarget {
    SourceFiles,
    Sass,
    Themes,
}

fn has_ext(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| exts.contains(&ext))
}

/// True when `rel` lies under `dir` but not inside its top-level `libs`.
fn under_outside_libs(rel: &Path, dir: &Path) -> bool {
    match rel.strip_prefix(dir) {
        Ok(rest) => rest
            .components()
            .next()
            .is_some_and(|first| first.as_os_str() != "libs" || rest.components().count() == 1),
        Err(_) => false,
    }
}

/// Which watch target a project-relative path belongs to.
pub fn classify(ctx: &BuildContext, rel: &Path) -> Option<WatchTarget> {
    let paths = &ctx.paths;
    let common = Path::new(&paths.src.common);
    let js = common.join(&paths.src.javascript);
    let styles = common.join(&paths.src.styles);
    let tests = common.join(&paths.src.tests);

    if rel.starts_with(common.join(&paths.src.themes))
        || (rel.starts_with(&paths.components) && has_ext(rel, &["scss"]))
        || (rel.starts_with(js.join(&paths.composites)) && has_ext(rel, &["scss"]))
    {
        return Some(WatchTarget::Sass);
    }
    if rel.starts_with(&paths.staging.themes) {
        return Some(WatchTarget::Themes);
    }
    let source = (under_outside_libs(rel, &styles) && has_ext(rel, &["css"]))
        || (under_outside_libs(rel, &js) && has_ext(rel, &["js", "json", "css"]))
        || (rel.starts_with(&tests) && has_ext(rel, &["css", "js"]))
        || (rel.starts_with(common) && has_ext(rel, &["html"]))
        || rel.starts_with(&paths.platform_specific);
    source.then_some(WatchTarget::SourceFiles)
}

/// Theme sources, staged themes, any scss, or css outside the source tree.
pub fn is_theme_file(ctx: &BuildContext, rel: &Path) -> bool {
    let paths = &ctx.paths;
    let src_themes = Path::new(&paths.src.common).join(&paths.src.themes);
    rel.starts_with(&src_themes)
        || rel.starts_with(&paths.staging.themes)
        || has_ext(rel, &["scss"])
        || (has_ext(rel, &["css"]) && !rel.starts_with(&paths.src.common))
}

/// Theme a changed file belongs to: the longest custom theme name found in the
/// path, and the last platform named in it.
pub fn changed_theme(ctx: &BuildContext, rel: &Path) -> Result<Theme> {
    let text = ufs::slash(rel);
    let segments: Vec<&str> = text.split('/').collect();
    let name = validate::all_themes(&ctx.project, &ctx.paths)?
        .into_iter()
        .filter(|theme| text.contains(theme.as_str()))
        .max_by_key(|theme| theme.len())
        .unwrap_or_else(|| ctx.options.theme.name.clone());
    let platform = segments
        .iter()
        .rev()
        .find(|segment| SUPPORTED_THEME_PLATFORMS.contains(segment) && **segment != "common")
        .map(|segment| segment.to_string())
        .unwrap_or_else(|| ctx.options.theme.platform.clone());
    validate::theme_object(
        &ctx.project,
        &ctx.paths,
        Some(&format!("{name}:{platform}")),
        &ctx.options.platform,
    )
}

/// Top composite dir for a scss file under the source composites.
pub fn changed_cca(ctx: &BuildContext, rel: &Path) -> Option<String> {
    let base = Path::new(&ctx.paths.src.common)
        .join(&ctx.paths.src.javascript)
        .join(&ctx.paths.composites);
    let rest = rel.strip_prefix(base).ok()?;
    if !has_ext(rel, &["scss"]) {
        return None;
    }
    rest.components()
        .next()
        .map(|first| first.as_os_str().to_string_lossy().into_owned())
}

/// Splits `rel` into the source dir it lives in and the remainder.
pub fn decompose<'a>(ctx: &'a BuildContext, rel: &'a Path) -> Option<(&'a str, &'a Path)> {
    let src = &ctx.paths.src;
    [src.hybrid.as_str(), src.web.as_str(), src.common.as_str()]
        .into_iter()
        .find_map(|dir| rel.strip_prefix(dir).ok().map(|end| (dir, end)))
}

pub struct ChangeHandler {
    ctx: BuildContext,
    changes: ChangeLog,
    cca_versions: BTreeMap<String, String>,
    running: AtomicBool,
}

impl ChangeHandler {
    pub fn new(ctx: BuildContext, changes: ChangeLog) -> Result<Self> {
        let cca_versions = build_paths::local_component_versions(&ctx.project, &ctx.paths)?;
        Ok(Self {
            ctx,
            changes,
            cca_versions,
            running: AtomicBool::new(false),
        })
    }

    fn override_dir(&self) -> &str {
        if self.ctx.options.is_web() {
            &self.ctx.paths.src.web
        } else {
            &self.ctx.paths.src.hybrid
        }
    }

    /// Where a changed source file goes under `staging`, or `None` when a
    /// platform override shadows it.
    pub fn destination(&self, rel: &Path, staging: &Path) -> Option<PathBuf> {
        let root = self.ctx.root();
        let (mid, end) = decompose(&self.ctx, rel)?;
        let override_dir = self.override_dir();
        if mid != override_dir && root.join(override_dir).join(end).exists() {
            info!("Overridden file not changed: {}", rel.display());
            return None;
        }

        let cca_base = Path::new(&self.ctx.paths.src.javascript).join(&self.ctx.paths.composites);
        if let Ok(cca_rel) = end.strip_prefix(&cca_base) {
            let mut parts = cca_rel.components();
            if let Some(first) = parts.next() {
                let name = first.as_os_str().to_string_lossy().into_owned();
                let rest = parts.as_path();
                let text = ufs::slash(cca_rel);
                let hit = self.cca_versions.get_key_value(&name).or_else(|| {
                    self.cca_versions
                        .iter()
                        .find(|(key, _)| text.split('/').any(|segment| segment == key.as_str()))
                });
                if let Some((name, version)) = hit {
                    return Some(staging.join(&cca_base).join(name).join(version).join(rest));
                }
            }
        }
        Some(staging.join(end))
    }

    /// `www` of the installed cordova platform, when it exists.
    fn platform_www(&self) -> Option<PathBuf> {
        let hybrid = self.ctx.root().join(&self.ctx.paths.staging.hybrid);
        let platform = match self.ctx.serve_destination.as_deref() {
            Some("browser") => "browser",
            _ => self.ctx.options.platform.as_str(),
        };
        let candidates = if platform == "android" {
            vec![
                hybrid.join("platforms/android/assets/www"),
                hybrid.join("platforms/android/app/src/main/assets/www"),
            ]
        } else {
            vec![hybrid.join("platforms").join(platform).join("www")]
        };
        candidates.into_iter().find(|dir| dir.is_dir())
    }

    fn run_target(&self, target: WatchTarget, rel: &Path) -> Result<()> {
        let mut ctx = self.ctx.clone();
        ctx.live = LiveChange {
            css_only: true,
            theme: None,
            cca: changed_cca(&self.ctx, rel),
        };
        if ctx.live.cca.is_none() {
            ctx.live.theme = Some(changed_theme(&self.ctx, rel)?);
        }
        if target == WatchTarget::Sass {
            if ctx.options.sass_compile {
                Step::Sass.run(&ctx)?;
            } else {
                debug!("Sass compile disabled, skipping.");
            }
        }
        if matches!(target, WatchTarget::Sass | WatchTarget::Themes) {
            Step::CopyThemes.run(&ctx)?;
        }
        Ok(())
    }

    fn copy_source(&self, path: &Path, rel: &Path) -> Result<()> {
        let root = self.ctx.root();
        if self.ctx.options.is_web() {
            let staging = root.join(&self.ctx.paths.staging.web);
            if let Some(dest) = self.destination(rel, &staging) {
                ufs::copy_file(path, &dest)?;
            }
            if rel.file_name().is_some_and(|name| name == INDEX_HTML) {
                Step::InjectTheme.run(&self.ctx)?;
                inject::inject_localhost_csp(&self.ctx.index_html())?;
            }
        } else {
            let www = self.ctx.staging();
            let Some(dest) = self.destination(rel, &www) else {
                return Ok(());
            };
            ufs::copy_file(path, &dest)?;
            if dest == self.ctx.index_html() {
                Step::InjectScriptTags.run(&self.ctx)?;
            } else if dest == self.ctx.staging_js().join(MAIN_JS) {
                Step::InjectPaths.run(&self.ctx)?;
            }
            // The platform copy is taken from www so it carries the injections.
            if let Some(platform_www) = self.platform_www()
                && let Ok(rest) = dest.strip_prefix(&www)
            {
                ufs::copy_file(&dest, &platform_www.join(rest))?;
            }
        }
        Ok(())
    }

    pub fn handle(&self, path: &Path) -> Result<()> {
        let root = self.ctx.root();
        let Ok(rel) = path.strip_prefix(root) else {
            return Ok(());
        };
        let Some(target) = classify(&self.ctx, rel) else {
            return Ok(());
        };
        info!("File changed: {}", rel.display());
        match target {
            WatchTarget::SourceFiles => self.copy_source(path, rel)?,
            WatchTarget::Sass | WatchTarget::Themes if is_theme_file(&self.ctx, rel) => {
                self.run_target(target, rel)?
            }
            _ => return Ok(()),
        }
        self.changes.notify(&[ufs::slash(rel)]);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn should_process_event(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Watches the project root until the watcher disconnects. Batches are
/// handled on a worker thread; events arriving meanwhile wait for the next
/// debounce tick.
pub fn watch(handler: Arc<ChangeHandler>) -> Result<()> {
    let root = handler.ctx.root().to_path_buf();
    let (tx, rx) = channel::<notify::Result<Event>>();
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = tx.send(res);
        },
        notify::Config::default(),
    )
    .context("Failed to create file watcher")?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch path: {}", root.display()))?;
    info!("Watching {} for changes.", root.display());

    let debounce = Duration::from_millis(WATCH_DEBOUNCE_MS);
    let mut pending: BTreeSet<PathBuf> = BTreeSet::new();
    let mut last_event: Option<Instant> = None;
    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(Ok(event)) if should_process_event(&event) => {
                for path in event.paths {
                    let relevant = path.is_file()
                        && path
                            .strip_prefix(&root)
                            .is_ok_and(|rel| classify(&handler.ctx, rel).is_some());
                    if relevant {
                        pending.insert(path);
                        last_event = Some(Instant::now());
                    }
                }
            }
            Ok(Ok(_)) => {}
            Ok(Err(err)) => warn!("watch error: {err}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        let settled = last_event.is_some_and(|at| at.elapsed() >= debounce);
        if settled && !pending.is_empty() && !handler.running.swap(true, Ordering::SeqCst) {
            let batch: Vec<PathBuf> = std::mem::take(&mut pending).into_iter().collect();
            last_event = None;
            let worker = Arc::clone(&handler);
            thread::spawn(move || {
                for path in &batch {
                    if let Err(err) = worker.handle(path) {
                        warn!("Failed to handle change to {}: {err:#}", path.display());
                    }
                }
                worker.running.store(false, Ordering::SeqCst);
            });
        }
    }
    Ok(())
}
