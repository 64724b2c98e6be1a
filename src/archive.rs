//! Zip archives exchanged with the component registry.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use walkdir::WalkDir;
use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::util::fs::slash;

/// Extracts `bytes` into `dest`, refusing entries that would escape it.
pub fn unpack(dest: &Path, bytes: Bytes) -> Result<usize> {
    let cursor = Cursor::new(bytes);
    let mut archive = ZipArchive::new(cursor).context("failed to open component archive")?;
    let mut written = 0;
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .context("failed to read component archive entry")?;
        let name = match file.enclosed_name() {
            Some(path) => path.to_owned(),
            None => bail!(
                "component archive contained a suspicious path `{}`; aborting extract",
                file.name()
            ),
        };
        let out_path = dest.join(name);
        if file.is_dir() {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("failed to create {}", out_path.display()))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .context("failed to read component archive entry")?;
        fs::write(&out_path, &buffer)
            .with_context(|| format!("failed to write {}", out_path.display()))?;
        written += 1;
    }
    Ok(written)
}

/// Zips the tree under `dir` into `out`. With `only`, just the listed
/// top-level entries are included.
pub fn pack_dir(dir: &Path, out: &Path, only: Option<&[String]>) -> Result<usize> {
    let file =
        fs::File::create(out).with_context(|| format!("failed to create {}", out.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    let mut count = 0;
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        let rel = entry.path().strip_prefix(dir)?;
        if let Some(only) = only {
            let top = rel
                .components()
                .next()
                .map(|part| part.as_os_str().to_string_lossy().into_owned())
                .unwrap_or_default();
            if !only.contains(&top) {
                continue;
            }
        }
        let name = slash(rel);
        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), options)
                .with_context(|| format!("failed to add {name} to archive"))?;
        } else if entry.file_type().is_file() {
            zip.start_file(name.clone(), options)
                .with_context(|| format!("failed to add {name} to archive"))?;
            let contents = fs::read(entry.path())
                .with_context(|| format!("failed to read {}", entry.path().display()))?;
            zip.write_all(&contents)
                .with_context(|| format!("failed to write {name} to archive"))?;
            count += 1;
        }
    }
    zip.finish().context("failed to finalize archive")?;
    Ok(count)
}
