use lectern_memory::{DEFAULT_TOP_K, IndexError, RetrievedChunk, VectorIndex};

/// Retrieved chunks for one question and the text handed to the prompt.
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    /// Chunk contents in rank order, joined with `\n`.
    pub text: String,
    pub chunks: Vec<RetrievedChunk>,
}

#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    k: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self { k: DEFAULT_TOP_K }
    }
}

impl ContextAssembler {
    #[must_use]
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded or searched.
    pub async fn assemble(
        &self,
        index: &VectorIndex,
        query: &str,
    ) -> Result<AssembledContext, IndexError> {
        let chunks = index.query(query, self.k).await?;
        let text = chunks
            .iter()
            .map(|r| r.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        tracing::debug!(
            k = self.k,
            retrieved = chunks.len(),
            chars = text.chars().count(),
            "assembled context"
        );
        Ok(AssembledContext { text, chunks })
    }
}
