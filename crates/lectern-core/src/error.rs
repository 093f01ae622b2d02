use lectern_llm::LlmError;
use lectern_memory::IndexError;
use lectern_memory::document::DocumentError;

pub const LLM_FAILURE_MESSAGE: &str = "There has been an error while querying the LLM.";

/// Failures of a session action. Each maps to a fixed message safe to show users;
/// the wrapped detail goes to the log only.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no document loaded")]
    NoDocument,

    #[error("no embedding model selected")]
    NoEmbedder,

    #[error("index has not been built")]
    IndexNotBuilt,

    #[error("question is empty")]
    EmptyQuestion,

    #[error("document has no extractable text")]
    NoContent,

    #[error("unknown embedding model: {0}")]
    UnknownEmbedder(String),

    #[error("document extraction failed: {0}")]
    Extraction(#[from] DocumentError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("inference failed: {0}")]
    Inference(#[from] LlmError),

    #[error("model output has no answer cue")]
    AnswerNotFound { raw: String },
}

impl PipelineError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoDocument => "Please upload a PDF document first.".into(),
            Self::NoEmbedder => "Please choose and load an embedding model first.".into(),
            Self::IndexNotBuilt => "Embeddings have not been defined for this document yet.".into(),
            Self::EmptyQuestion => "Please enter a question about the paper.".into(),
            Self::NoContent => "The document has no extractable text.".into(),
            Self::UnknownEmbedder(name) => format!("Unknown embedding model: {name}."),
            Self::Extraction(DocumentError::UnsupportedFormat { supported, .. }) => {
                format!("Unsupported file type. Please upload one of: {supported}.")
            }
            Self::Extraction(DocumentError::FileTooLarge { limit, .. }) => {
                format!("The document is too large (limit {limit} bytes).")
            }
            Self::Extraction(_) => "Could not extract text from the uploaded document.".into(),
            Self::Index(IndexError::Embedding(_)) => {
                "There has been an error while computing embeddings.".into()
            }
            Self::Index(_) => "There has been an error while searching the document index.".into(),
            Self::Inference(_) => LLM_FAILURE_MESSAGE.into(),
            Self::AnswerNotFound { .. } => {
                "The model replied, but its response did not contain an answer.".into()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
