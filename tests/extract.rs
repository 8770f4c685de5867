//! Page extraction against a real pdfium library.
//!
//! Skipped (prints `SKIP`) when no pdfium library can be bound. Point
//! `PDFIUM_LIB_PATH` at a libpdfium to run them:
//!
//!   PDFIUM_LIB_PATH=/opt/pdfium/lib/libpdfium.so cargo test --test extract -- --nocapture

use pagelens::pipeline::extract::{bind_pdfium, count_pages};
use pagelens::{DocumentHandle, ExplainError, PageExtractor, PdfiumExtractor};
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Mutex;

/// pdfium is initialised and torn down per binding; keep tests from
/// overlapping.
static PDFIUM: Mutex<()> = Mutex::new(());

fn library_path() -> Option<PathBuf> {
    std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from)
}

/// Skip this test if pdfium cannot be bound. Yields the serialisation guard
/// and the library path.
macro_rules! skip_unless_pdfium {
    () => {{
        let guard = PDFIUM.lock().unwrap_or_else(|e| e.into_inner());
        let lib = library_path();
        if let Err(e) = bind_pdfium(lib.as_deref()) {
            println!("SKIP: pdfium not available: {e}");
            println!("       Set PDFIUM_LIB_PATH to run pdfium tests");
            return;
        }
        (guard, lib)
    }};
}

/// An N-page document of blank A4 pages.
fn blank_document(pages: usize, lib: Option<&std::path::Path>) -> Vec<u8> {
    let pdfium = bind_pdfium(lib).unwrap();
    let mut doc = pdfium.create_new_pdf().unwrap();
    for _ in 0..pages {
        doc.pages_mut()
            .create_page_at_end(PdfPagePaperSize::a4())
            .unwrap();
    }
    doc.save_to_bytes().unwrap()
}

#[test]
fn extracted_page_is_a_single_page_document() {
    let (_guard, lib) = skip_unless_pdfium!();
    let source = blank_document(5, lib.as_deref());
    assert_eq!(count_pages(&source, lib.as_deref()).unwrap(), 5);

    let extractor = PdfiumExtractor::new(lib.clone());
    for k in [0, 2, 4] {
        let page = extractor.extract(&source, k).unwrap();
        assert!(page.starts_with(b"%PDF"), "page {k} is not a PDF");
        assert_eq!(
            count_pages(&page, lib.as_deref()).unwrap(),
            1,
            "page {k} extract should hold exactly one page"
        );
    }

    // The source is untouched.
    assert_eq!(count_pages(&source, lib.as_deref()).unwrap(), 5);
}

#[test]
fn out_of_range_index_is_an_extraction_error() {
    let (_guard, lib) = skip_unless_pdfium!();
    let source = blank_document(2, lib.as_deref());

    let err = PdfiumExtractor::new(lib)
        .extract(&source, 2)
        .unwrap_err();
    assert!(matches!(err, ExplainError::PageExtraction { .. }), "got {err:?}");
}

#[tokio::test]
async fn document_opens_from_disk() {
    let (_guard, lib) = skip_unless_pdfium!();
    let source = blank_document(3, lib.as_deref());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("three.pdf");
    std::fs::write(&path, &source).unwrap();

    let doc = DocumentHandle::open_path(&path, lib.as_deref()).await.unwrap();
    assert_eq!(doc.page_count(), 3);
    assert_eq!(doc.current_page(), 1);
    assert_eq!(doc.bytes(), source.as_slice());
}

#[tokio::test]
async fn corrupt_file_is_a_load_error() {
    let (_guard, lib) = skip_unless_pdfium!();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.pdf");
    std::fs::write(&path, b"%PDF-1.7\nthis is not really a pdf").unwrap();

    let err = DocumentHandle::open_path(&path, lib.as_deref())
        .await
        .unwrap_err();
    assert!(matches!(err, ExplainError::DocumentLoad { .. }), "got {err:?}");
}
