//! Session driver: upload, embedder selection, index build, question answering.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lectern_llm::{Embedder, EmbeddingModel, InferenceProvider};
use lectern_memory::document::{Document, SplitterConfig, TextSplitter};
use lectern_memory::{VectorIndex, VectorStore};

use crate::context::ContextAssembler;
use crate::error::{PipelineError, Result};
use crate::prompt::{PromptBuilder, extract_answer};
use crate::session::Session;
use crate::upload::UploadHandler;

/// Creates the embedder for a model. Called at most once per model per orchestrator.
pub type EmbedderFactory = Box<dyn Fn(EmbeddingModel) -> Arc<dyn Embedder> + Send + Sync>;

/// Outcome of a session action, ready to show to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Answer(String),
    Notice(String),
    Failure(String),
}

impl Reply {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Answer(s) | Self::Notice(s) | Self::Failure(s) => s,
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

fn failure(action: &'static str, err: &PipelineError) -> Reply {
    match err {
        PipelineError::Inference(e) => {
            tracing::error!(action, raw_body = e.raw_body().unwrap_or(""), "{err}");
        }
        PipelineError::AnswerNotFound { raw } => {
            tracing::warn!(action, raw = %raw, "{err}");
        }
        _ => tracing::warn!(action, "{err}"),
    }
    Reply::Failure(err.user_message())
}

pub struct Orchestrator<P: InferenceProvider> {
    provider: P,
    store: Arc<dyn VectorStore>,
    embedder_factory: EmbedderFactory,
    embedders: HashMap<EmbeddingModel, Arc<dyn Embedder>>,
    uploads: UploadHandler,
    splitter: TextSplitter,
    assembler: ContextAssembler,
    collection_prefix: String,
    session: Option<Session>,
}

impl<P: InferenceProvider> fmt::Debug for Orchestrator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("cached_embedders", &self.embedders.len())
            .field("splitter", self.splitter.config())
            .field("k", &self.assembler.k())
            .field("collection_prefix", &self.collection_prefix)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl<P: InferenceProvider> Orchestrator<P> {
    #[must_use]
    pub fn new(provider: P, store: Arc<dyn VectorStore>, embedder_factory: EmbedderFactory) -> Self {
        Self {
            provider,
            store,
            embedder_factory,
            embedders: HashMap::new(),
            uploads: UploadHandler::default(),
            splitter: TextSplitter::new(SplitterConfig::default()),
            assembler: ContextAssembler::default(),
            collection_prefix: "lectern".into(),
            session: None,
        }
    }

    #[must_use]
    pub fn with_splitter(mut self, config: SplitterConfig) -> Self {
        self.splitter = TextSplitter::new(config);
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.assembler = ContextAssembler::new(k);
        self
    }

    #[must_use]
    pub fn with_collection_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.collection_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_upload_handler(mut self, uploads: UploadHandler) -> Self {
        self.uploads = uploads;
        self
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Start a new session from uploaded file bytes.
    pub async fn upload(&mut self, file_name: &str, bytes: &[u8]) -> Reply {
        self.session = None;
        match self.uploads.extract(file_name, bytes).await {
            Ok(documents) => self.open_documents(file_name, &documents),
            Err(e) => failure("upload", &PipelineError::from(e)),
        }
    }

    /// Start a new session from already extracted pages.
    pub fn open_documents(&mut self, source: &str, documents: &[Document]) -> Reply {
        let chunks = self.splitter.split_documents(documents);
        let count = chunks.len();
        tracing::info!(source, pages = documents.len(), chunks = count, "document chunked");
        self.session = Some(Session::new(source, chunks));
        Reply::Notice(format!("Loaded {count} chunks."))
    }

    /// Choose the embedding model for the current document. Drops any built index.
    pub fn select_embedder(&mut self, name: &str) -> Reply {
        match self.try_select_embedder(name) {
            Ok(model) => Reply::Notice(format!("Model {model} loaded.")),
            Err(e) => failure("select_embedder", &e),
        }
    }

    /// Embed the current document's chunks with the selected model.
    pub async fn build_index(&mut self) -> Reply {
        match self.try_build_index().await {
            Ok(count) => Reply::Notice(format!("Embeddings defined for {count} chunks.")),
            Err(e) => failure("build_index", &e),
        }
    }

    /// Answer `question` from the indexed document.
    pub async fn ask(&mut self, question: &str) -> Reply {
        match self.try_ask(question).await {
            Ok(answer) => Reply::Answer(answer),
            Err(e) => failure("ask", &e),
        }
    }

    fn try_select_embedder(&mut self, name: &str) -> Result<EmbeddingModel> {
        let model = name
            .parse::<EmbeddingModel>()
            .map_err(|_| PipelineError::UnknownEmbedder(name.to_owned()))?;
        let session = self.session.as_mut().ok_or(PipelineError::NoDocument)?;

        let factory = &self.embedder_factory;
        self.embedders.entry(model).or_insert_with(|| {
            tracing::info!(model = %model, "loading embedding model");
            factory(model)
        });
        session.set_embedder(model);
        Ok(model)
    }

    async fn try_build_index(&mut self) -> Result<usize> {
        let session = self.session.as_mut().ok_or(PipelineError::NoDocument)?;
        let model = session.embedder.ok_or(PipelineError::NoEmbedder)?;
        let embedder = self
            .embedders
            .get(&model)
            .cloned()
            .ok_or(PipelineError::NoEmbedder)?;

        session.index = None;
        let index = VectorIndex::build(
            &session.chunks,
            embedder,
            Arc::clone(&self.store),
            &self.collection_prefix,
        )
        .await?;
        let count = index.len();
        session.index = Some(index);
        Ok(count)
    }

    async fn try_ask(&mut self, question: &str) -> Result<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }
        let session = self.session.as_mut().ok_or(PipelineError::NoDocument)?;
        session.last_query = Some(question.to_owned());
        session.last_answer = None;

        let Some(index) = session.index.as_ref() else {
            return Err(if session.embedder.is_none() {
                PipelineError::NoEmbedder
            } else {
                PipelineError::IndexNotBuilt
            });
        };
        if index.is_empty() {
            return Err(PipelineError::NoContent);
        }

        let context = self.assembler.assemble(index, question).await?;
        let prompt = PromptBuilder::build(&context.text, question);
        tracing::debug!(
            provider = self.provider.name(),
            chunks = context.chunks.len(),
            prompt_chars = prompt.chars().count(),
            "querying model"
        );

        let raw = self.provider.generate(&prompt).await?;
        let answer = extract_answer(&raw)?;
        session.last_answer = Some(answer.clone());
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use lectern_llm::hashing::HashingEmbedder;
    use lectern_llm::mock::MockProvider;
    use lectern_memory::InMemoryVectorStore;
    use lectern_memory::document::DocumentMetadata;

    use super::*;
    use crate::error::LLM_FAILURE_MESSAGE;

    fn hashing_factory() -> EmbedderFactory {
        Box::new(|model: EmbeddingModel| {
            Arc::new(HashingEmbedder::new(model.as_str(), model.dimensions())) as Arc<dyn Embedder>
        })
    }

    fn orchestrator(provider: MockProvider) -> Orchestrator<MockProvider> {
        Orchestrator::new(provider, Arc::new(InMemoryVectorStore::new()), hashing_factory())
    }

    fn pages(texts: &[&str]) -> Vec<Document> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| Document {
                content: (*t).to_owned(),
                metadata: DocumentMetadata::new("paper.pdf", "application/pdf").with_page(i),
            })
            .collect()
    }

    async fn ready(provider: MockProvider) -> Orchestrator<MockProvider> {
        let mut orch = orchestrator(provider);
        orch.open_documents(
            "paper.pdf",
            &pages(&["Sparse retrieval is the main contribution.", "Results follow."]),
        );
        orch.select_embedder("all-MiniLM-L6-v2");
        orch.build_index().await;
        orch
    }

    #[test]
    fn open_documents_reports_chunk_count() {
        let mut orch = orchestrator(MockProvider::default());
        let reply = orch.open_documents("paper.pdf", &pages(&["one", "two", "three"]));
        assert_eq!(reply, Reply::Notice("Loaded 3 chunks.".into()));
        assert_eq!(orch.session().unwrap().chunk_count(), 3);
    }

    #[test]
    fn empty_document_reports_zero_chunks() {
        let mut orch = orchestrator(MockProvider::default());
        let reply = orch.open_documents("scan.pdf", &pages(&["", "  \n "]));
        assert_eq!(reply, Reply::Notice("Loaded 0 chunks.".into()));
    }

    #[test]
    fn select_unknown_embedder_fails() {
        let mut orch = orchestrator(MockProvider::default());
        orch.open_documents("paper.pdf", &pages(&["text"]));
        let reply = orch.select_embedder("word2vec");
        assert_eq!(
            reply,
            Reply::Failure("Unknown embedding model: word2vec.".into())
        );
        assert!(orch.session().unwrap().embedder.is_none());
    }

    #[test]
    fn select_embedder_requires_document() {
        let mut orch = orchestrator(MockProvider::default());
        assert!(orch.select_embedder("all-MiniLM-L6-v2").is_failure());
    }

    #[test]
    fn embedders_are_cached_per_model() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let factory: EmbedderFactory = Box::new(move |model: EmbeddingModel| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Arc::new(HashingEmbedder::new(model.as_str(), 16)) as Arc<dyn Embedder>
        });
        let mut orch = Orchestrator::new(
            MockProvider::default(),
            Arc::new(InMemoryVectorStore::new()),
            factory,
        );
        orch.open_documents("paper.pdf", &pages(&["text"]));
        orch.select_embedder("all-MiniLM-L6-v2");
        orch.select_embedder("BAAI/bge-base-en-v1.5");
        orch.select_embedder("all-minilm-l6-v2");
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_index_until_build() {
        let mut orch = orchestrator(MockProvider::default());
        orch.open_documents("paper.pdf", &pages(&["text"]));
        orch.select_embedder("all-MiniLM-L6-v2");
        assert!(!orch.session().unwrap().is_indexed());

        let reply = orch.ask("What?").await;
        assert_eq!(
            reply,
            Reply::Failure(PipelineError::IndexNotBuilt.user_message())
        );
        assert_eq!(orch.provider().call_count(), 0);

        let reply = orch.build_index().await;
        assert_eq!(reply, Reply::Notice("Embeddings defined for 1 chunks.".into()));
        assert!(orch.session().unwrap().is_indexed());
    }

    #[tokio::test]
    async fn switching_embedder_invalidates_index() {
        let mut orch = ready(MockProvider::default()).await;
        assert!(orch.session().unwrap().is_indexed());
        orch.select_embedder("multi-qa-MiniLM-L6-cos-v1");
        assert!(!orch.session().unwrap().is_indexed());
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
        dot / (norm(a) * norm(b))
    }

    /// Chunk indices ordered by descending similarity to `query` under `embedder`.
    fn expected_ranking(embedder: &HashingEmbedder, words: &[&str], query: &str) -> Vec<usize> {
        let q = embedder.embed_sync(query);
        let mut scored: Vec<(usize, f32)> = words
            .iter()
            .enumerate()
            .map(|(i, w)| (i, cosine(&q, &embedder.embed_sync(w))))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.into_iter().map(|(i, _)| i).collect()
    }

    #[tokio::test]
    async fn rebuild_with_other_embedder_uses_only_its_vectors() {
        const DIMS: usize = 2;
        let words = [
            "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india",
            "juliett", "kilo", "lima",
        ];
        let query = "zulu";
        let first = EmbeddingModel::AllMiniLmL6V2;
        let second = EmbeddingModel::BgeBaseEnV15;

        let factory: EmbedderFactory = Box::new(|model: EmbeddingModel| {
            Arc::new(HashingEmbedder::new(model.as_str(), DIMS)) as Arc<dyn Embedder>
        });
        let mut orch = Orchestrator::new(
            MockProvider::default(),
            Arc::new(InMemoryVectorStore::new()),
            factory,
        );
        orch.open_documents("paper.pdf", &pages(&words));
        orch.select_embedder(first.as_str());
        orch.build_index().await;
        orch.select_embedder(second.as_str());
        let reply = orch.build_index().await;
        assert_eq!(reply, Reply::Notice("Embeddings defined for 12 chunks.".into()));

        let index = orch.session().unwrap().index.as_ref().unwrap();
        assert_eq!(index.model_id(), second.as_str());
        let results = index.query(query, words.len()).await.unwrap();
        assert_eq!(results.len(), words.len());

        let second_embedder = HashingEmbedder::new(second.as_str(), DIMS);
        let q = second_embedder.embed_sync(query);
        for hit in &results {
            let expected = cosine(&q, &second_embedder.embed_sync(&hit.chunk.content));
            assert!(
                (hit.score - expected).abs() < 1e-5,
                "chunk {} scored {} but expected {expected}",
                hit.chunk.chunk_index,
                hit.score
            );
        }

        let ranking: Vec<usize> = results.iter().map(|r| r.chunk.chunk_index).collect();
        assert_eq!(ranking, expected_ranking(&second_embedder, &words, query));
        let first_ranking =
            expected_ranking(&HashingEmbedder::new(first.as_str(), DIMS), &words, query);
        assert_ne!(ranking, first_ranking);
    }

    #[tokio::test]
    async fn ask_without_document() {
        let mut orch = orchestrator(MockProvider::default());
        let reply = orch.ask("What?").await;
        assert_eq!(reply, Reply::Failure(PipelineError::NoDocument.user_message()));
    }

    #[tokio::test]
    async fn ask_without_embedder() {
        let mut orch = orchestrator(MockProvider::default());
        orch.open_documents("paper.pdf", &pages(&["text"]));
        let reply = orch.ask("What?").await;
        assert_eq!(reply, Reply::Failure(PipelineError::NoEmbedder.user_message()));
    }

    #[tokio::test]
    async fn ask_returns_extracted_answer() {
        let mut orch = ready(MockProvider::default()).await;
        let reply = orch.ask("  What is the main contribution?  ").await;
        assert_eq!(reply, Reply::Answer("mock answer".into()));

        let prompts = orch.provider().prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Sparse retrieval is the main contribution."));
        assert!(prompts[0].ends_with("Question: What is the main contribution?\nAnswer:"));

        let session = orch.session().unwrap();
        assert_eq!(session.last_query.as_deref(), Some("What is the main contribution?"));
        assert_eq!(session.last_answer.as_deref(), Some("mock answer"));
    }

    #[tokio::test]
    async fn empty_question_not_sent() {
        let mut orch = ready(MockProvider::default()).await;
        let reply = orch.ask("   ").await;
        assert_eq!(reply, Reply::Failure(PipelineError::EmptyQuestion.user_message()));
        assert_eq!(orch.provider().call_count(), 0);
    }

    #[tokio::test]
    async fn empty_document_is_not_sent_to_model() {
        let mut orch = orchestrator(MockProvider::default());
        orch.open_documents("scan.pdf", &pages(&["", "  \n "]));
        orch.select_embedder("all-MiniLM-L6-v2");
        let reply = orch.build_index().await;
        assert_eq!(reply, Reply::Notice("Embeddings defined for 0 chunks.".into()));

        let reply = orch.ask("What is the main contribution?").await;
        assert_eq!(
            reply,
            Reply::Failure("The document has no extractable text.".into())
        );
        assert_eq!(orch.provider().call_count(), 0);
        assert!(orch.session().unwrap().last_answer.is_none());
    }

    #[tokio::test]
    async fn inference_failure_gives_generic_message() {
        let mut orch = ready(MockProvider::failing()).await;
        let reply = orch.ask("What is the main contribution?").await;
        assert_eq!(reply, Reply::Failure(LLM_FAILURE_MESSAGE.into()));
        let session = orch.session().unwrap();
        assert!(session.last_answer.is_none());
        assert!(session.last_query.is_some());
    }

    #[tokio::test]
    async fn missing_answer_cue_is_distinct_failure() {
        let provider = MockProvider::with_responses(vec!["I cannot say.".into()]);
        let mut orch = ready(provider).await;
        let reply = orch.ask("What?").await;
        assert!(reply.is_failure());
        assert_ne!(reply.text(), LLM_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn new_document_resets_session() {
        let mut orch = ready(MockProvider::default()).await;
        let first_id = orch.session().unwrap().id;
        orch.open_documents("other.pdf", &pages(&["fresh content"]));
        let session = orch.session().unwrap();
        assert_ne!(session.id, first_id);
        assert!(session.embedder.is_none());
        assert!(!session.is_indexed());
    }

    #[tokio::test]
    async fn failed_upload_clears_session() {
        let mut orch = ready(MockProvider::default()).await;
        let reply = orch.upload("slides.pptx", b"...").await;
        assert!(reply.is_failure());
        assert!(orch.session().is_none());
    }

    #[tokio::test]
    async fn upload_text_file() {
        let mut orch = orchestrator(MockProvider::default());
        let reply = orch.upload("notes.txt", b"first page\x0csecond page").await;
        assert_eq!(reply, Reply::Notice("Loaded 2 chunks.".into()));
        let session = orch.session().unwrap();
        assert_eq!(session.document_name, "notes.txt");
        assert_eq!(session.chunks[1].metadata.page, Some(1));
    }

    #[test]
    fn reply_display() {
        assert_eq!(Reply::Answer("42".into()).to_string(), "42");
        assert!(!Reply::Notice("ok".into()).is_failure());
    }
}
