//! Paragraph-boundary text chunker.
//!
//! Splits each parsed page into [`Chunk`]s that respect a `max_chars`
//! budget (measured in UTF-8 bytes). Splitting occurs on paragraph
//! boundaries (`\n\n`) to preserve semantic coherence; oversized paragraphs
//! are hard-split at the last newline or space before the limit. Chunks
//! never span pages, and consecutive chunks of a page share up to
//! `overlap_chars` of trailing context.
//!
//! Chunk ids are derived from the source, position, and text, so the same
//! input always produces the same chunks.

use sha2::{Digest, Sha256};

use crate::config::ChunkingConfig;
use crate::models::{Chunk, MetadataValue, PageText, SOURCE_KEY};

/// Splits parsed pages into chunks tagged with their `source`.
pub trait Chunker: Send + Sync {
    /// Must be deterministic, and must seed every chunk's metadata with
    /// `source`.
    fn build_chunks(&self, pages: &[PageText], source: &str) -> Vec<Chunk>;
}

#[derive(Debug, Clone, Copy)]
pub struct ParagraphChunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl ParagraphChunker {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Self {
        let max_chars = max_chars.max(1);
        Self {
            max_chars,
            overlap_chars: overlap_chars.min(max_chars - 1),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.max_chars, config.overlap_chars)
    }

    /// Budget for fresh text in a chunk, leaving room for the overlap prefix.
    fn piece_budget(&self) -> usize {
        if self.overlap_chars == 0 {
            self.max_chars
        } else {
            self.max_chars
                .saturating_sub(self.overlap_chars + 1)
                .max(1)
        }
    }
}

impl Chunker for ParagraphChunker {
    fn build_chunks(&self, pages: &[PageText], source: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut chunk_index: i64 = 0;

        for page in pages {
            let pieces = split_text(&page.text, self.piece_budget());
            let mut previous: Option<&str> = None;

            for piece in &pieces {
                let text = match previous.map(|p| overlap_tail(p, self.overlap_chars)) {
                    Some(tail) if !tail.is_empty() => format!("{} {}", tail, piece),
                    _ => piece.clone(),
                };

                let position = format!("{}:{}", page.page, chunk_index);
                let mut chunk = Chunk::new(derive_id(source, &position, &text), text);
                chunk
                    .metadata
                    .insert(SOURCE_KEY.to_string(), MetadataValue::from(source));
                chunk
                    .metadata
                    .insert("page".to_string(), MetadataValue::Int(page.page as i64));
                chunk
                    .metadata
                    .insert("chunk_index".to_string(), MetadataValue::Int(chunk_index));
                chunks.push(chunk);

                chunk_index += 1;
                previous = Some(piece.as_str());
            }
        }

        chunks
    }
}

/// Deterministic chunk id from provenance and content.
pub fn derive_id(source: &str, position: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0u8]);
    hasher.update(position.as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Split text into pieces on paragraph boundaries, each at most `max_chars`.
/// Blank text yields no pieces.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut current_buf = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        // If adding this paragraph would exceed max, flush current buffer
        let would_be = if current_buf.is_empty() {
            trimmed.len()
        } else {
            current_buf.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current_buf.is_empty() {
            pieces.push(std::mem::take(&mut current_buf));
        }

        if trimmed.len() > max_chars {
            let mut remaining = trimmed;
            while !remaining.is_empty() {
                let split_at = floor_char_boundary(remaining, remaining.len().min(max_chars));
                let actual_split = if split_at < remaining.len() {
                    remaining[..split_at]
                        .rfind('\n')
                        .or_else(|| remaining[..split_at].rfind(' '))
                        .map(|pos| pos + 1)
                        .unwrap_or(split_at)
                } else {
                    split_at
                };
                // A single character wider than the budget still has to move forward.
                let actual_split = if actual_split == 0 {
                    remaining
                        .char_indices()
                        .nth(1)
                        .map(|(i, _)| i)
                        .unwrap_or(remaining.len())
                } else {
                    actual_split
                };
                let piece = remaining[..actual_split].trim();
                if !piece.is_empty() {
                    pieces.push(piece.to_string());
                }
                remaining = &remaining[actual_split..];
            }
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(trimmed);
        }
    }

    if !current_buf.is_empty() {
        pieces.push(current_buf);
    }

    pieces
}

/// The last `overlap` bytes of `text`, starting at a word boundary when one
/// exists inside the window.
fn overlap_tail(text: &str, overlap: usize) -> &str {
    if overlap == 0 {
        return "";
    }
    if text.len() <= overlap {
        return text.trim();
    }
    let start = ceil_char_boundary(text, text.len() - overlap);
    let window = &text[start..];
    match window.find(char::is_whitespace) {
        Some(pos) if !window[pos..].trim().is_empty() => window[pos..].trim(),
        _ => window.trim(),
    }
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
