use std::path::Path;
use std::pin::Pin;

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader, DocumentMetadata};

/// Loads plain text and markdown. Form feeds (`\x0c`, as emitted by `pdftotext`)
/// separate pages; a file without them is a single document.
pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for TextLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        let max_size = self.max_file_size;
        Box::pin(async move {
            let path = tokio::fs::canonicalize(&path).await?;

            let meta = tokio::fs::metadata(&path).await?;
            if meta.len() > max_size {
                return Err(DocumentError::FileTooLarge {
                    size: meta.len(),
                    limit: max_size,
                });
            }

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            let content_type = match ext {
                "md" | "markdown" => "text/markdown",
                _ => "text/plain",
            };

            let content = tokio::fs::read_to_string(&path).await?;
            let source = path.display().to_string();

            if !content.contains('\x0c') {
                return Ok(vec![Document {
                    content,
                    metadata: DocumentMetadata::new(source, content_type),
                }]);
            }

            Ok(content
                .split('\x0c')
                .enumerate()
                .map(|(page, text)| Document {
                    content: text.to_owned(),
                    metadata: DocumentMetadata::new(source.clone(), content_type).with_page(page),
                })
                .collect())
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "md", "markdown"]
    }
}
