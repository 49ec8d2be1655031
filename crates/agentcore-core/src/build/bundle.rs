//! Source archive for remote builds.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::domain::Result;

/// Name of the generated build specification inside the archive.
pub const BUILDSPEC_NAME: &str = "buildspec.yml";

/// A packaged zip archive and its content digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBundle {
    pub path: PathBuf,
    /// Archive entry names, in the order written
    pub entries: Vec<String>,
    /// Hex SHA-256 of the archive bytes
    pub digest: String,
}

impl SourceBundle {
    /// Write `files` (relative to `context`) plus the build spec into a zip at `out`.
    ///
    /// Missing files are skipped with a warning. Directories are added
    /// recursively, skipping hidden entries and `target/`.
    pub fn package(
        context: &Path,
        files: &[PathBuf],
        buildspec: &str,
        out: &Path,
    ) -> Result<SourceBundle> {
        let mut zip = ZipWriter::new(File::create(out)?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut entries = Vec::new();

        for rel in files {
            let full = context.join(rel);
            if !full.exists() {
                warn!(path = %full.display(), "bundle file missing, skipping");
                continue;
            }
            let mut collected = Vec::new();
            collect_files(context, &full, &mut collected)?;
            for (name, path) in collected {
                zip.start_file(name.as_str(), options)?;
                zip.write_all(&std::fs::read(&path)?)?;
                debug!(entry = %name, "added to bundle");
                entries.push(name);
            }
        }

        zip.start_file(BUILDSPEC_NAME, options)?;
        zip.write_all(buildspec.as_bytes())?;
        entries.push(BUILDSPEC_NAME.to_string());
        zip.finish()?;

        let digest = hex::encode(Sha256::digest(std::fs::read(out)?));
        Ok(SourceBundle {
            path: out.to_path_buf(),
            entries,
            digest,
        })
    }
}

fn collect_files(context: &Path, path: &Path, out: &mut Vec<(String, PathBuf)>) -> Result<()> {
    if path.is_dir() {
        let mut children: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| !is_skipped(p))
            .collect();
        children.sort();
        for child in children {
            collect_files(context, &child, out)?;
        }
        return Ok(());
    }
    out.push((entry_name(context, path), path.to_path_buf()));
    Ok(())
}

fn is_skipped(path: &Path) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.starts_with('.') || name == "target",
        None => true,
    }
}

/// Archive names always use `/`, relative to the build context.
fn entry_name(context: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(context).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
