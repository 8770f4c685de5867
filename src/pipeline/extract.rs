//! Page extraction: copy one page of a PDF into a fresh single-page PDF.
//!
//! ## Why a new document instead of sending the whole file?
//!
//! The backend only ever looks at one page, and uploads of 300-page manuals
//! are slow and wasteful. pdfium's page import copies the page object with
//! everything it references (fonts, images, content streams), so the result
//! renders identically and no longer depends on the source.
//!
//! ## Permission flags
//!
//! pdfium opens documents whose owner password restricts copying or
//! printing without complaint; those flags are advisory for viewers. Only a
//! *user* password blocks loading, and such documents never reach this stage
//! because the host could not have displayed them either.
//!
//! All functions here are blocking: pdfium is not async-safe. The
//! orchestrator calls them through `tokio::task::spawn_blocking`.

use crate::error::ExplainError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Produces a single-page document from a multi-page source.
///
/// The orchestrator bounds-checks `page_index` before calling. Implementations
/// report every failure as [`ExplainError::PageExtraction`].
pub trait PageExtractor: Send + Sync {
    /// Return the bytes of a new PDF containing only page `page_index`
    /// (zero-based) of `source`.
    fn extract(&self, source: &[u8], page_index: usize) -> Result<Vec<u8>, ExplainError>;
}

/// [`PageExtractor`] backed by pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    library_path: Option<PathBuf>,
}

impl PdfiumExtractor {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }
}

impl PageExtractor for PdfiumExtractor {
    fn extract(&self, source: &[u8], page_index: usize) -> Result<Vec<u8>, ExplainError> {
        let pdfium = bind_pdfium(self.library_path.as_deref()).map_err(|e| {
            ExplainError::PageExtraction {
                detail: e.to_string(),
            }
        })?;
        extract_with(&pdfium, source, page_index)
    }
}

fn extract_with(pdfium: &Pdfium, source: &[u8], page_index: usize) -> Result<Vec<u8>, ExplainError> {
    let failed = |what: &str, e: PdfiumError| ExplainError::PageExtraction {
        detail: format!("{what}: {e:?}"),
    };

    let source_doc = pdfium
        .load_pdf_from_byte_slice(source, None)
        .map_err(|e| failed("loading source document", e))?;

    let total = source_doc.pages().len() as usize;
    if page_index >= total {
        return Err(ExplainError::PageExtraction {
            detail: format!("page index {page_index} out of range ({total} pages)"),
        });
    }
    let index = PdfPageIndex::try_from(page_index).map_err(|_| ExplainError::PageExtraction {
        detail: format!("page index {page_index} does not fit pdfium's page index"),
    })?;

    let mut single = pdfium
        .create_new_pdf()
        .map_err(|e| failed("creating destination document", e))?;
    single
        .pages_mut()
        .copy_page_from_document(&source_doc, index, 0)
        .map_err(|e| failed("copying page", e))?;

    let bytes = single
        .save_to_bytes()
        .map_err(|e| failed("saving single-page document", e))?;

    debug!(
        "Extracted page {} of {} → {} bytes",
        page_index + 1,
        total,
        bytes.len()
    );
    Ok(bytes)
}

/// Count the pages of a PDF held in memory.
pub fn count_pages(source: &[u8], library_path: Option<&Path>) -> Result<usize, ExplainError> {
    let pdfium = bind_pdfium(library_path)?;
    let document = pdfium
        .load_pdf_from_byte_slice(source, None)
        .map_err(|e| ExplainError::PageExtraction {
            detail: format!("loading document: {e:?}"),
        })?;
    Ok(document.pages().len() as usize)
}

/// Bind to a pdfium library.
///
/// Resolution order: the explicit path, then a library in the working
/// directory, then the system loader.
pub fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, ExplainError> {
    if let Some(path) = library_path {
        let bindings = Pdfium::bind_to_library(path).map_err(|e| {
            ExplainError::PdfiumBindingFailed(format!("{}: {e:?}", path.display()))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| ExplainError::PdfiumBindingFailed(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_input_is_an_extraction_error() {
        // Holds whether or not pdfium is installed: a missing library is
        // reported as an extraction failure too.
        let err = PdfiumExtractor::default()
            .extract(b"definitely not a pdf", 0)
            .unwrap_err();
        assert!(matches!(err, ExplainError::PageExtraction { .. }), "got {err:?}");
    }

    #[test]
    fn missing_library_path_fails_to_bind() {
        let Err(err) = bind_pdfium(Some(Path::new("/nonexistent/libpdfium.so"))) else {
            panic!("binding a nonexistent library must fail");
        };
        assert!(matches!(err, ExplainError::PdfiumBindingFailed(_)));
        assert!(err.to_string().contains("/nonexistent/libpdfium.so"));
    }
}
