use std::path::Path;

use thiserror::Error;

use crate::layout::LayoutObject;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("page {requested} out of range (document has {count} pages)")]
    PageOutOfRange { requested: u32, count: u32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for PDF access backends.
///
/// Implementors turn a PDF file into plain text or into layout trees; the
/// layout reconstruction working on those trees lives in
/// `pdfss_layout::relayout`.
pub trait PdfBackend: Send + Sync {
    /// Extract the full text content of a PDF file.
    fn extract_text(&self, path: &Path) -> Result<String, BackendError>;

    /// Extract the layout tree of each page, as [`LayoutObject::Page`] values.
    ///
    /// If `pages` is given, only those 1-based page numbers are returned, in
    /// document order.
    fn extract_pages(
        &self,
        path: &Path,
        pages: Option<&[u32]>,
    ) -> Result<Vec<LayoutObject>, BackendError>;
}

/// Whether page `number` (1-based) is part of the `pages` selection.
pub fn page_selected(pages: Option<&[u32]>, number: u32) -> bool {
    pages.is_none_or(|p| p.contains(&number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_selected() {
        assert!(page_selected(None, 7));
        assert!(page_selected(Some(&[1, 3]), 3));
        assert!(!page_selected(Some(&[1, 3]), 2));
        assert!(!page_selected(Some(&[]), 1));
    }
}
