//! `ojet strip`: removes everything `.gitignore` excludes from the project.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::constants::GITIGNORE;
use crate::util::fs as ufs;

const KEPT_PATTERNS: &[&str] = &["Thumbs.db", ".DS_Store"];

fn load_rules(root: &Path) -> Result<Option<Gitignore>> {
    let path = root.join(GITIGNORE);
    if !path.is_file() {
        return Ok(None);
    }
    let contents = ufs::read_to_string(&path)?;
    let mut builder = GitignoreBuilder::new(root);
    for line in contents.lines() {
        let trimmed = line.trim();
        if KEPT_PATTERNS
            .iter()
            .any(|kept| trimmed.trim_start_matches(['/', '!']).trim_end_matches('/') == *kept)
        {
            continue;
        }
        builder
            .add_line(Some(path.clone()), line)
            .with_context(|| format!("invalid pattern `{line}` in {}", path.display()))?;
    }
    Ok(Some(builder.build().context("failed to build .gitignore rules")?))
}

/// Paths under `root` that the ignore rules select, outermost first.
pub fn ignored_paths(root: &Path, rules: &Gitignore) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        let rel = entry.path().strip_prefix(root)?;
        let is_dir = entry.file_type().is_dir();
        if rel == Path::new(".git") || rel == Path::new(GITIGNORE) {
            if is_dir {
                walker.skip_current_dir();
            }
            continue;
        }
        if rules.matched_path_or_any_parents(rel, is_dir).is_ignore() {
            found.push(entry.path().to_path_buf());
            if is_dir {
                walker.skip_current_dir();
            }
        }
    }
    Ok(found)
}

pub fn strip(root: &Path) -> Result<usize> {
    let Some(rules) = load_rules(root)? else {
        warn!("No .gitignore file found.  No files will be cleaned");
        return Ok(0);
    };
    let paths = ignored_paths(root, &rules)?;
    for path in &paths {
        ufs::remove_path(path)?;
    }
    info!("Project stripped: {} path(s) removed.", paths.len());
    Ok(paths.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn removes_ignored_paths_and_honours_negation() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(
            root.join(GITIGNORE),
            "/node_modules\n/web\n/themes/*\n!/themes/keep\n.DS_Store\n",
        )
        .unwrap();
        touch(root, "node_modules/knockout/package.json");
        touch(root, "web/index.html");
        touch(root, "themes/alta/web/alta.css");
        touch(root, "themes/keep/readme.md");
        touch(root, "src/index.html");
        touch(root, "src/.DS_Store");
        touch(root, ".git/HEAD");

        assert_eq!(strip(root).unwrap(), 3);
        assert!(!root.join("node_modules").exists());
        assert!(!root.join("web").exists());
        assert!(!root.join("themes/alta").exists());
        assert!(root.join("themes/keep/readme.md").exists());
        assert!(root.join("src/index.html").exists());
        assert!(root.join("src/.DS_Store").exists());
        assert!(root.join(".git/HEAD").exists());
        assert!(root.join(GITIGNORE).exists());
    }

    #[test]
    fn missing_gitignore_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "web/index.html");
        assert_eq!(strip(temp.path()).unwrap(), 0);
        assert!(temp.path().join("web/index.html").exists());
    }
}
