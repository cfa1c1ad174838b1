//! File operations on the managed document root.
//!
//! Thin filesystem layer: adding, listing, and deleting the files the
//! index is built from. None of these touch the vector store; the next
//! index run reconciles.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::config::ScannerConfig;
use crate::scan;

/// A file under the managed root, as shown by `files list`.
#[derive(Debug, Clone)]
pub struct ManagedFile {
    pub doc_id: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

pub fn list_files(root: &Path, scanner: &ScannerConfig) -> Result<Vec<ManagedFile>> {
    let docs = scan::list_documents(root, scanner)?;

    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        let metadata = std::fs::metadata(&doc.path)
            .with_context(|| format!("Failed to stat {}", doc.path.display()))?;
        let modified = metadata
            .modified()
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        out.push(ManagedFile {
            doc_id: doc.doc_id,
            size: metadata.len(),
            modified: DateTime::<Utc>::from(modified),
        });
    }

    Ok(out)
}

/// Copy a file into the managed root. Name collisions resolve to
/// `stem_2.ext`, `stem_3.ext`, and so on, as the original upload flow did.
pub fn add_file(root: &Path, src: &Path) -> Result<PathBuf> {
    if !src.is_file() {
        bail!("Not a file: {}", src.display());
    }

    let name = src
        .file_name()
        .with_context(|| format!("No file name in {}", src.display()))?;

    std::fs::create_dir_all(root)
        .with_context(|| format!("Failed to create document root {}", root.display()))?;

    let dest = unique_destination(root, Path::new(name));
    std::fs::copy(src, &dest)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;

    Ok(dest)
}

/// Delete one file from the managed root. Errors propagate: this is an
/// explicit single-file operation, not a bulk scan.
pub fn delete_file(root: &Path, name: &str) -> Result<PathBuf> {
    let path = root.join(name);
    std::fs::remove_file(&path)
        .with_context(|| format!("Failed to delete {}", path.display()))?;
    Ok(path)
}

fn unique_destination(root: &Path, name: &Path) -> PathBuf {
    let candidate = root.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = name.extension().map(|e| e.to_string_lossy().to_string());

    let mut i = 2;
    loop {
        let file_name = match &ext {
            Some(ext) => format!("{}_{}.{}", stem, i, ext),
            None => format!("{}_{}", stem, i),
        };
        let candidate = root.join(file_name);
        if !candidate.exists() {
            return candidate;
        }
        i += 1;
    }
}
