//! Text extraction for the supported document types.
//!
//! Plain text and Markdown files load as a single page. PDFs load one
//! entry per page so chunk metadata can carry a page number into source
//! labels. Anything else is unsupported content and the synchronizer
//! skips it.

use std::path::Path;

use crate::error::Error;

/// Extracted text for one page of a document. Non-paginated formats
/// produce a single entry with `page: None`.
#[derive(Debug, Clone)]
pub struct PageText {
    /// 1-based page number, present for PDFs only.
    pub page: Option<u32>,
    pub text: String,
}

pub fn load_pages(path: &Path) -> Result<Vec<PageText>, Error> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("txt") | Some("md") => {
            let text = std::fs::read_to_string(path)?;
            Ok(vec![PageText { page: None, text }])
        }
        Some("pdf") => extract_pdf(path),
        _ => Err(Error::UnsupportedContent(path.to_path_buf())),
    }
}

fn extract_pdf(path: &Path) -> Result<Vec<PageText>, Error> {
    let bytes = std::fs::read(path)?;

    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| {
        Error::Extraction {
            file: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| PageText {
            page: Some(i as u32 + 1),
            text,
        })
        .collect())
}
