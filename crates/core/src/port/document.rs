// Document Ports (Interfaces)
// Office-to-PDF conversion and page-addressable PDF access

use crate::domain::DocumentFormat;
use crate::error::Result;
use async_trait::async_trait;
use std::ops::Range;

/// Converts non-PDF office documents into PDF
///
/// Implementations:
/// - OfficeConverter: LibreOffice headless subprocess
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn to_pdf(&self, data: &[u8], format: DocumentFormat) -> Result<Vec<u8>>;
}

/// A loaded PDF whose pages can be re-serialized as standalone documents
pub trait PageSource: Send {
    fn page_count(&self) -> usize;

    /// Standalone PDF holding the zero-based, end-exclusive `pages`
    fn extract(&self, pages: Range<usize>) -> Result<Vec<u8>>;
}

/// PDF page operations (CPU bound, call from a blocking context)
///
/// Implementations:
/// - LopdfEngine: lopdf based split/merge
pub trait PdfEngine: Send + Sync {
    fn open(&self, data: &[u8]) -> Result<Box<dyn PageSource>>;

    /// Concatenate whole documents, in the given order
    fn merge(&self, documents: &[Vec<u8>]) -> Result<Vec<u8>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fake PDF: a JSON array of page strings
    ///
    /// Page sizes are simply the page string lengths, so tests can model
    /// arbitrary page weights.
    pub struct FakePdfEngine;

    impl FakePdfEngine {
        pub fn document(pages: &[String]) -> Vec<u8> {
            serde_json::to_vec(pages).unwrap_or_default()
        }

        pub fn pages(data: &[u8]) -> Result<Vec<String>> {
            serde_json::from_slice(data)
                .map_err(|e| AppError::Document(format!("not a fake pdf: {}", e)))
        }
    }

    struct FakePages(Vec<String>);

    impl PageSource for FakePages {
        fn page_count(&self) -> usize {
            self.0.len()
        }

        fn extract(&self, pages: Range<usize>) -> Result<Vec<u8>> {
            let slice = self
                .0
                .get(pages.clone())
                .ok_or_else(|| AppError::Document(format!("page range {:?} out of bounds", pages)))?;
            Ok(FakePdfEngine::document(slice))
        }
    }

    impl PdfEngine for FakePdfEngine {
        fn open(&self, data: &[u8]) -> Result<Box<dyn PageSource>> {
            Ok(Box::new(FakePages(Self::pages(data)?)))
        }

        fn merge(&self, documents: &[Vec<u8>]) -> Result<Vec<u8>> {
            let mut all = Vec::new();
            for doc in documents {
                all.extend(Self::pages(doc)?);
            }
            Ok(Self::document(&all))
        }
    }

    /// Converter that wraps the input as a single fake page
    #[derive(Default)]
    pub struct MockConverter {
        calls: AtomicUsize,
    }

    impl MockConverter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentConverter for MockConverter {
        async fn to_pdf(&self, data: &[u8], _format: DocumentFormat) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(FakePdfEngine::document(&[String::from_utf8_lossy(data).into_owned()]))
        }
    }
}
