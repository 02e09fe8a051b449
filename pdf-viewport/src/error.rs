use thiserror::Error;

/// Errors surfaced by the viewport engine and its backends.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewerError {
    /// The document could not be opened. Fatal for the viewer session.
    #[error("failed to open document: {reason}")]
    DocumentOpen { reason: String },

    /// A single page failed to rasterize. The page stays blank; other pages
    /// are unaffected.
    #[error("failed to render page {index}: {reason}")]
    PageRender { index: usize, reason: String },

    /// A page was requested that does not exist, usually because the
    /// document has not been opened yet.
    #[error("page index {index} out of range (document has {page_count} pages)")]
    InvalidIndex { index: usize, page_count: usize },

    #[error("invalid viewer configuration: {0}")]
    InvalidConfig(String),
}

impl ViewerError {
    pub(crate) fn document_open(err: impl std::fmt::Display) -> Self {
        Self::DocumentOpen {
            reason: format!("{err:#}"),
        }
    }

    pub(crate) fn page_render(index: usize, err: impl std::fmt::Display) -> Self {
        Self::PageRender {
            index,
            reason: format!("{err:#}"),
        }
    }

    /// Whether the error only affects a single page.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::PageRender { .. })
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;
