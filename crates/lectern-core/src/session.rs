use lectern_llm::EmbeddingModel;
use lectern_memory::VectorIndex;
use lectern_memory::document::Chunk;
use uuid::Uuid;

/// State of the single open document. Replaced wholesale on every upload.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub document_name: String,
    pub chunks: Vec<Chunk>,
    pub embedder: Option<EmbeddingModel>,
    /// Present only after an explicit build for the current embedder.
    pub index: Option<VectorIndex>,
    pub last_query: Option<String>,
    pub last_answer: Option<String>,
}

impl Session {
    #[must_use]
    pub fn new(document_name: impl Into<String>, chunks: Vec<Chunk>) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_name: document_name.into(),
            chunks,
            embedder: None,
            index: None,
            last_query: None,
            last_answer: None,
        }
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Switch embedder. Any index built with the previous one is dropped.
    pub fn set_embedder(&mut self, model: EmbeddingModel) {
        self.index = None;
        self.embedder = Some(model);
    }

    #[must_use]
    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }
}
