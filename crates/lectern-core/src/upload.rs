//! Extraction of uploaded bytes through a scoped temporary file.

use std::path::{Path, PathBuf};

use lectern_memory::document::{Document, DocumentError, DocumentLoader, TextLoader};

#[cfg(feature = "pdf")]
use lectern_memory::document::PdfLoader;

/// Loaders tried in order; the first that accepts the file extension wins.
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn DocumentLoader>>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        let mut loaders: Vec<Box<dyn DocumentLoader>> = Vec::new();
        #[cfg(feature = "pdf")]
        loaders.push(Box::new(PdfLoader::default()));
        loaders.push(Box::new(TextLoader::default()));
        Self { loaders }
    }
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

impl LoaderRegistry {
    #[must_use]
    pub fn new(loaders: Vec<Box<dyn DocumentLoader>>) -> Self {
        Self { loaders }
    }

    #[must_use]
    pub fn find(&self, path: &Path) -> Option<&dyn DocumentLoader> {
        self.loaders
            .iter()
            .find(|l| l.supports(path))
            .map(AsRef::as_ref)
    }

    #[must_use]
    pub fn extensions(&self) -> Vec<&str> {
        self.loaders
            .iter()
            .flat_map(|l| l.supported_extensions().iter().copied())
            .collect()
    }

    fn unsupported(&self, name: &str) -> DocumentError {
        DocumentError::UnsupportedFormat {
            name: name.to_owned(),
            supported: self.extensions().join(", "),
        }
    }

    /// # Errors
    ///
    /// Returns [`DocumentError::UnsupportedFormat`] when no loader accepts `path`,
    /// or the loader's error.
    pub async fn load(&self, path: &Path) -> Result<Vec<Document>, DocumentError> {
        let loader = self
            .find(path)
            .ok_or_else(|| self.unsupported(&path.display().to_string()))?;
        loader.load(path).await
    }
}

/// Writes uploaded bytes to a temporary file, runs the matching loader and removes
/// the file on every exit path.
#[derive(Debug, Default)]
pub struct UploadHandler {
    registry: LoaderRegistry,
    temp_dir: Option<PathBuf>,
}

impl UploadHandler {
    #[must_use]
    pub fn new(registry: LoaderRegistry) -> Self {
        Self {
            registry,
            temp_dir: None,
        }
    }

    /// Create temporary files under `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn registry(&self) -> &LoaderRegistry {
        &self.registry
    }

    /// Extract `bytes` uploaded as `file_name`. Page provenance records `file_name`
    /// as the source, not the temporary path.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is unsupported, the temporary file cannot
    /// be written, or extraction fails.
    pub async fn extract(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Vec<Document>, DocumentError> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|_| self.registry.find(Path::new(file_name)).is_some())
            .ok_or_else(|| self.registry.unsupported(file_name))?;

        let mut builder = tempfile::Builder::new();
        let suffix = format!(".{ext}");
        builder.prefix("lectern-upload-").suffix(&suffix);
        let tmp = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        tokio::fs::write(tmp.path(), bytes).await?;

        let mut documents = self.registry.load(tmp.path()).await?;
        for doc in &mut documents {
            doc.metadata.source = file_name.to_owned();
        }
        tracing::info!(file = file_name, pages = documents.len(), "extracted upload");
        Ok(documents)
    }
}
