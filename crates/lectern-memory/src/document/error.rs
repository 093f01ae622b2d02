/// Failure to turn a file into [`Document`](super::Document) pages.
///
/// A file without a text layer is not an error: it loads as zero pages of text.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported file type: {name} (supported: {supported})")]
    UnsupportedFormat { name: String, supported: String },

    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[cfg(feature = "pdf")]
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
}
