//! Incremental index synchronizer.
//!
//! Each run diffs the document root against the stored collection: new
//! files are inserted, changed files are deleted-then-reinserted under
//! their new content hash, unchanged files are skipped without
//! re-chunking. The stored metadata is read once per run, so cost is
//! bounded by collection size, not files × collection size.
//!
//! Build and query are not isolated from each other: a query issued while
//! a build is in progress may observe a partially updated collection.
//! This is an accepted limitation of the single-process design. The one
//! ordering guarantee is delete-before-insert within a single document's
//! update, so a document never has chunks from two hash versions visible
//! at once (though it may briefly have none).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::chunk::split_text;
use crate::config::Config;
use crate::error::{RemovedCount, Result};
use crate::extract;
use crate::scan::{self, DocumentRef};
use crate::store::{ChunkRecord, IndexedDoc, VectorStore};

/// Cooperative cancellation signal for index builds.
///
/// Checked between documents only, never mid-document, so a cancelled run
/// leaves the store with every processed document fully indexed and the
/// rest untouched.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters for one synchronization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub new: u64,
    pub updated: u64,
    pub skipped: u64,
    /// Total chunks written across all inserted documents.
    pub chunks: u64,
}

enum SyncOutcome {
    Unchanged,
    SkippedNoContent,
    New(u64),
    Updated(u64),
}

pub struct IndexManager<'a> {
    config: &'a Config,
    store: &'a VectorStore,
}

impl<'a> IndexManager<'a> {
    pub fn new(config: &'a Config, store: &'a VectorStore) -> Self {
        Self { config, store }
    }

    /// Build or incrementally update the index.
    ///
    /// Document-scoped failures (unreadable, unsupported, or corrupt
    /// files) skip that document and continue; backend failures abort
    /// the run. Returns a status message plus the run counters.
    pub async fn build_or_update(&self, cancel: &CancelFlag) -> Result<(String, IndexReport)> {
        let docs = scan::list_documents(&self.config.paths.docs_dir, &self.config.scanner)?;
        let mut report = IndexReport::default();

        if docs.is_empty() {
            return Ok((
                "No documents found in the document root.".to_string(),
                report,
            ));
        }

        let indexed = self.store.list_indexed_docs().await?;

        let mut examined = 0usize;
        let mut cancelled = false;

        for doc in &docs {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            examined += 1;

            match self.sync_document(doc, indexed.get(&doc.doc_id)).await {
                Ok(SyncOutcome::Unchanged) | Ok(SyncOutcome::SkippedNoContent) => {
                    report.skipped += 1;
                }
                Ok(SyncOutcome::New(n)) => {
                    report.new += 1;
                    report.chunks += n;
                    info!(doc_id = %doc.doc_id, chunks = n, "indexed new document");
                }
                Ok(SyncOutcome::Updated(n)) => {
                    report.updated += 1;
                    report.chunks += n;
                    info!(doc_id = %doc.doc_id, chunks = n, "re-indexed changed document");
                }
                Err(e) if e.is_document_scoped() => {
                    warn!(doc_id = %doc.doc_id, error = %e, "skipping document");
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let message = if cancelled {
            format!(
                "Indexing cancelled; {} of {} documents examined.",
                examined, docs.len()
            )
        } else {
            "Index complete.".to_string()
        };

        Ok((message, report))
    }

    async fn sync_document(
        &self,
        doc: &DocumentRef,
        prev: Option<&IndexedDoc>,
    ) -> Result<SyncOutcome> {
        let content_hash = scan::hash_file(&doc.path)?;

        if let Some(prev) = prev {
            if prev.content_hash == content_hash {
                return Ok(SyncOutcome::Unchanged);
            }
        }

        let had_prev = prev.is_some();

        let chunks = match self.load_chunks(doc, &content_hash) {
            Ok(chunks) => chunks,
            Err(e) if e.is_document_scoped() => {
                // The file changed but is no longer extractable. Its old
                // version must not linger in the store.
                if had_prev {
                    self.store.delete_by_doc_id(&doc.doc_id).await?;
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        // Old before new: the store never holds two hash versions of the
        // same document.
        if had_prev {
            self.store.delete_by_doc_id(&doc.doc_id).await?;
        }

        if chunks.is_empty() {
            return Ok(SyncOutcome::SkippedNoContent);
        }

        let written = chunks.len() as u64;
        self.store.add_chunks(&chunks).await?;

        Ok(if had_prev {
            SyncOutcome::Updated(written)
        } else {
            SyncOutcome::New(written)
        })
    }

    fn load_chunks(&self, doc: &DocumentRef, content_hash: &str) -> Result<Vec<ChunkRecord>> {
        let pages = extract::load_pages(&doc.path)?;

        let mut records = Vec::new();
        let mut ordinal = 0i64;
        for page in &pages {
            for text in split_text(
                &page.text,
                self.config.chunking.chunk_size,
                self.config.chunking.chunk_overlap,
            ) {
                records.push(ChunkRecord {
                    doc_id: doc.doc_id.clone(),
                    file_name: doc.file_name.clone(),
                    content_hash: content_hash.to_string(),
                    page: page.page,
                    ordinal,
                    text,
                });
                ordinal += 1;
            }
        }

        Ok(records)
    }

    /// Remove a single document's chunks from the store. The reference
    /// may be an absolute path, a path relative to the document root, or
    /// a bare doc id.
    pub async fn remove_from_index(&self, reference: &Path) -> Result<RemovedCount> {
        let doc_id = scan::doc_id_for(&self.config.paths.docs_dir, reference);
        self.store.delete_by_doc_id(&doc_id).await
    }

    /// Destroy the persisted collection and reinitialize an empty index
    /// directory. Destructive; errors propagate.
    pub fn reset(&self) -> Result<()> {
        let dir = self.store.index_dir();
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        std::fs::create_dir_all(dir)?;
        Ok(())
    }
}
