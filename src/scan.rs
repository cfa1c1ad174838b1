//! Document discovery and content hashing.
//!
//! Walks the managed root, keeps files matching the configured include
//! globs, and assigns each a stable `doc_id`: its `/`-separated path
//! relative to the root. The same file location always produces the same
//! id across runs, which is what lets the synchronizer diff the filesystem
//! against the store.

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ScannerConfig;
use crate::error::{Error, Result};

/// Block size for streaming file hashing.
const HASH_BLOCK_BYTES: usize = 8192;

/// A file discovered under the managed root.
#[derive(Debug, Clone)]
pub struct DocumentRef {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Stable identifier: path relative to the root, `/`-separated.
    pub doc_id: String,
    /// File name component, used for source labels.
    pub file_name: String,
}

pub fn list_documents(root: &Path, scanner: &ScannerConfig) -> Result<Vec<DocumentRef>> {
    if !root.exists() {
        return Err(Error::InvalidParams(format!(
            "document root does not exist: {}",
            root.display()
        )));
    }

    let include_set = build_globset(&scanner.include_globs)?;
    let exclude_set = build_globset(&scanner.exclude_globs)?;

    let mut docs = Vec::new();

    let walker = WalkDir::new(root).follow_links(scanner.follow_symlinks);
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        docs.push(DocumentRef {
            path: path.to_path_buf(),
            doc_id: rel_str,
            file_name,
        });
    }

    // Sort for deterministic ordering
    docs.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));

    Ok(docs)
}

/// Compute the SHA-256 content hash of a file, streaming in fixed-size
/// blocks so large files never need to fit in memory.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_BLOCK_BYTES];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Derive the `doc_id` for a file reference, which may be an absolute
/// path, a path relative to the root, or already a bare doc id.
pub fn doc_id_for(root: &Path, reference: &Path) -> String {
    let rel = reference.strip_prefix(root).unwrap_or(reference);
    rel.to_string_lossy().replace('\\', "/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).map_err(|e| Error::InvalidParams(e.to_string()))?);
    }
    builder
        .build()
        .map_err(|e| Error::InvalidParams(e.to_string()))
}
