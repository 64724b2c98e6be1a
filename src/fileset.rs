//! Glob-driven copy specs. Patterns apply in order: a plain pattern adds the
//! files it matches and a `!pattern` removes them again, so a file is selected
//! when the last pattern matching it is a positive one.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::util::fs::{copy_file, slash};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

#[derive(Debug, Clone)]
struct Rule {
    include: bool,
    pattern: Pattern,
}

#[derive(Debug, Clone)]
pub struct GlobSet {
    rules: Vec<Rule>,
}

impl GlobSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut rules = Vec::with_capacity(patterns.len());
        for raw in patterns {
            let raw = raw.as_ref();
            let (include, body) = match raw.strip_prefix('!') {
                Some(rest) => (false, rest),
                None => (true, raw),
            };
            let pattern =
                Pattern::new(body).with_context(|| format!("invalid glob pattern `{raw}`"))?;
            rules.push(Rule { include, pattern });
        }
        Ok(Self { rules })
    }

    pub fn is_match(&self, rel: &str) -> bool {
        let mut selected = false;
        for rule in &self.rules {
            if rule.pattern.matches_with(rel, MATCH_OPTIONS) {
                selected = rule.include;
            }
        }
        selected
    }
}

/// Files under `cwd` selected by `patterns`, as sorted relative paths.
pub fn glob_files<S: AsRef<str>>(cwd: &Path, patterns: &[S]) -> Result<Vec<PathBuf>> {
    if !cwd.is_dir() {
        return Ok(Vec::new());
    }
    let set = GlobSet::new(patterns)?;
    let mut files = Vec::new();
    for entry in WalkDir::new(cwd).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", cwd.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(cwd)?;
        if set.is_match(&slash(rel)) {
            files.push(rel.to_path_buf());
        }
    }
    Ok(files)
}

#[derive(Debug, Clone)]
pub struct FileSpec {
    pub cwd: PathBuf,
    pub src: Vec<String>,
    pub dest: PathBuf,
    /// Target file name when a single file is copied under a new name.
    pub rename: Option<String>,
}

impl FileSpec {
    pub fn new(cwd: impl Into<PathBuf>, src: &[&str], dest: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            src: src.iter().map(|pattern| pattern.to_string()).collect(),
            dest: dest.into(),
            rename: None,
        }
    }

    pub fn files(&self) -> Result<Vec<PathBuf>> {
        glob_files(&self.cwd, &self.src)
    }

    /// Copies every selected file, returning how many were written.
    pub fn copy(&self) -> Result<usize> {
        let files = self.files()?;
        for rel in &files {
            let target = match &self.rename {
                Some(name) => match rel.parent() {
                    Some(parent) => self.dest.join(parent).join(name),
                    None => self.dest.join(name),
                },
                None => self.dest.join(rel),
            };
            copy_file(&self.cwd.join(rel), &target)?;
        }
        Ok(files.len())
    }
}

pub fn copy_all(specs: &[FileSpec]) -> Result<usize> {
    let mut total = 0;
    for spec in specs {
        total += spec.copy()?;
    }
    Ok(total)
}
