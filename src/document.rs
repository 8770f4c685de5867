//! The open document as the explanation engine sees it.
//!
//! The host owns parsing and display. The engine only needs the original
//! bytes (to cut a page out of) and the page count (to bounds-check), plus
//! the page the user is looking at.

use crate::error::ExplainError;
use crate::pipeline::extract::count_pages;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Raw bytes and page count of an open PDF, plus the current page.
///
/// Cloning is cheap: the bytes are shared.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    bytes: Arc<[u8]>,
    page_count: usize,
    /// 1-based.
    current_page: usize,
}

impl DocumentHandle {
    /// Wrap a document the host has already parsed.
    ///
    /// # Errors
    /// `InvalidConfig` when `page_count` is zero; there is nothing to explain.
    pub fn from_parts(bytes: impl Into<Arc<[u8]>>, page_count: usize) -> Result<Self, ExplainError> {
        if page_count == 0 {
            return Err(ExplainError::InvalidConfig(
                "document must have at least one page".into(),
            ));
        }
        Ok(Self {
            bytes: bytes.into(),
            page_count,
            current_page: 1,
        })
    }

    /// Open a PDF held in memory, counting its pages with pdfium.
    ///
    /// Blocking; call from `spawn_blocking` in async contexts.
    pub fn open(bytes: Vec<u8>, pdfium_library: Option<&Path>) -> Result<Self, ExplainError> {
        let page_count = count_pages(&bytes, pdfium_library)?;
        Self::from_parts(bytes, page_count)
    }

    /// Read and open a PDF file.
    pub async fn open_path(
        path: impl AsRef<Path>,
        pdfium_library: Option<&Path>,
    ) -> Result<Self, ExplainError> {
        let path = path.as_ref().to_path_buf();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ExplainError::DocumentLoad {
                path: path.clone(),
                detail: e.to_string(),
            })?;

        let lib = pdfium_library.map(Path::to_path_buf);
        let load_path = path.clone();
        let doc = tokio::task::spawn_blocking(move || Self::open(bytes, lib.as_deref()))
            .await
            .map_err(|e| ExplainError::Internal(format!("Document load task panicked: {e}")))?
            .map_err(|e| match e {
                ExplainError::PageExtraction { detail } => ExplainError::DocumentLoad {
                    path: load_path,
                    detail,
                },
                other => other,
            })?;

        info!("Opened {} ({} pages)", path.display(), doc.page_count);
        Ok(doc)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Current page, 1-based.
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Zero-based index of the current page, as `submit` expects it.
    pub fn current_index(&self) -> usize {
        self.current_page - 1
    }

    /// Jump to a 1-based page, clamped to the document.
    pub fn set_current_page(&mut self, page: usize) {
        self.current_page = page.clamp(1, self.page_count);
    }

    /// Advance one page; returns `false` on the last page.
    pub fn next_page(&mut self) -> bool {
        if self.current_page < self.page_count {
            self.current_page += 1;
            true
        } else {
            false
        }
    }

    /// Go back one page; returns `false` on the first page.
    pub fn prev_page(&mut self) -> bool {
        if self.current_page > 1 {
            self.current_page -= 1;
            true
        } else {
            false
        }
    }
}
