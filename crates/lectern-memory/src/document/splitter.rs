use std::collections::VecDeque;

use super::types::{Chunk, Document};

/// Paragraph, line, sentence, word, character.
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Maximum number of characters carried over from the end of one chunk into the next.
    pub chunk_overlap: usize,
    /// Boundaries tried in order, coarsest first. An empty separator splits into characters.
    pub separators: Vec<String>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

impl SplitterConfig {
    #[must_use]
    pub fn with_sizes(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        }
    }
}

/// Recursive boundary-aware splitter.
///
/// Text is cut on the coarsest separator present; pieces still at or above
/// `chunk_size` are cut again with the next separator, down to single characters.
/// Small pieces are then merged greedily into chunks of at most `chunk_size`
/// characters, each new chunk starting with the trailing pieces (at most
/// `chunk_overlap` characters) of the previous one. Inside a line of prose, a
/// trailing piece too long to carry over is replaced by its last words (or
/// characters) so consecutive chunks still share text. Paragraph and line
/// breaks are never bridged.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(mut config: SplitterConfig) -> Self {
        config.chunk_size = config.chunk_size.max(1);
        if config.chunk_overlap >= config.chunk_size {
            tracing::warn!(
                chunk_size = config.chunk_size,
                chunk_overlap = config.chunk_overlap,
                "chunk overlap must be smaller than chunk size, clamping"
            );
            config.chunk_overlap = config.chunk_size - 1;
        }
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.content)
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk {
                content,
                metadata: document.metadata.clone(),
                chunk_index: i,
            })
            .collect()
    }

    /// Split every document and number the chunks across the whole sequence.
    #[must_use]
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for document in documents {
            for content in self.split_text(&document.content) {
                chunks.push(Chunk {
                    content,
                    metadata: document.metadata.clone(),
                    chunk_index: chunks.len(),
                });
            }
        }
        chunks
    }

    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_recursive(text, &self.config.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, finer) = pick_separator(text, separators);
        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();

        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small, separator, finer));
                small.clear();
            }
            if finer.is_empty() {
                chunks.extend(join_trimmed(&[piece]));
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !small.is_empty() {
            chunks.extend(self.merge(&small, separator, finer));
        }
        chunks
    }

    fn merge<'t>(&self, pieces: &[&'t str], separator: &str, finer: &[String]) -> Vec<String> {
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let bridge_pieces = !separator.contains('\n');

        let mut chunks = Vec::new();
        let mut window: VecDeque<&'t str> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > chunk_size && !window.is_empty() {
                chunks.extend(join_trimmed(window.make_contiguous()));
                let last = window.back().copied();
                // Keep a tail of at most `overlap` characters that still leaves room for `piece`.
                while total > overlap || (total + len > chunk_size && total > 0) {
                    let Some(first) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(first);
                }
                if bridge_pieces
                    && window.is_empty()
                    && let Some(last) = last
                    && let Some(tail) =
                        fine_tail(last, overlap.min(chunk_size.saturating_sub(len)), finer)
                {
                    total = char_len(tail);
                    window.push_back(tail);
                }
            }
            window.push_back(piece);
            total += len;
        }

        chunks.extend(join_trimmed(window.make_contiguous()));
        chunks
    }
}

fn pick_separator<'a>(text: &str, separators: &'a [String]) -> (&'a str, &'a [String]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return ("", &[]);
        }
        if text.contains(sep.as_str()) {
            return (sep, &separators[i + 1..]);
        }
    }
    (separators.last().map_or("", String::as_str), &[])
}

/// Longest suffix of `piece` within `budget` characters that starts on a boundary
/// of the coarsest separator in `separators` yielding non-blank text.
fn fine_tail<'t>(piece: &'t str, budget: usize, separators: &[String]) -> Option<&'t str> {
    if budget == 0 {
        return None;
    }
    for sep in separators {
        let start = if sep.is_empty() {
            piece
                .char_indices()
                .rev()
                .nth(budget - 1)
                .map_or(0, |(i, _)| i)
        } else {
            let mut start = piece.len();
            let mut total = 0;
            for part in split_keep_separator(piece, sep).iter().rev() {
                let n = char_len(part);
                if total + n > budget {
                    break;
                }
                total += n;
                start -= part.len();
            }
            start
        };
        let tail = &piece[start..];
        if !tail.trim().is_empty() {
            return Some(tail);
        }
    }
    None
}

/// Split `text` after every occurrence of `separator`, keeping it attached to the
/// piece it terminates. An empty separator yields single characters.
fn split_keep_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, matched) in text.match_indices(separator) {
        let end = idx + matched.len();
        pieces.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_trimmed(pieces: &[&str]) -> Option<String> {
    let joined = pieces.concat();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
