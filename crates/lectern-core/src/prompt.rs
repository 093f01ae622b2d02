//! Prompt template and answer extraction.
//!
//! The template's trailing `Answer:` cue and [`extract_answer`]'s pattern are one
//! contract; bump [`PROMPT_TEMPLATE_VERSION`] when either changes.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::PipelineError;

pub const PROMPT_TEMPLATE_VERSION: u32 = 1;

const ANSWER_CUE: &str = "Answer:";

static ANSWER_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Answer:\s*(.*)").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    #[must_use]
    pub fn build(context: &str, question: &str) -> String {
        format!(
            "Answer the question based on this context:\n\n{context}\n\nQuestion: {question}\n{ANSWER_CUE}"
        )
    }
}

/// Text following the first `Answer:` cue in `raw`, up to the end of that line.
///
/// Hosted models usually echo the prompt, so the first cue is normally the
/// template's own; the answer is what the model appended after it.
///
/// # Errors
///
/// Returns [`PipelineError::AnswerNotFound`] when there is no cue or nothing follows it.
pub fn extract_answer(raw: &str) -> Result<String, PipelineError> {
    let answer = ANSWER_PATTERN
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty());

    match answer {
        Some(answer) => Ok(answer.to_owned()),
        None => {
            tracing::warn!(raw_len = raw.len(), "model output has no usable answer");
            tracing::debug!(raw, "unextractable model output");
            Err(PipelineError::AnswerNotFound {
                raw: raw.to_owned(),
            })
        }
    }
}
