//! Text chunking.

use std::collections::VecDeque;

use crate::core::config::settings::ChunkerSettings;

/// Separators tried in order; the empty separator means "split anywhere".
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
}

pub trait TextSplitter: Send + Sync {
    /// Splits `text` into ordered chunks. `overlap: None` uses the
    /// splitter's default overlap; `Some(0)` yields non-overlapping chunks.
    fn split(&self, text: &str, overlap: Option<usize>) -> Vec<TextChunk>;
}

/// Greedy recursive splitter measured in characters.
///
/// Text is cut on the coarsest separator that brings every piece under
/// `chunk_size`, then pieces are packed into chunks. With overlap, the
/// trailing pieces of a chunk (up to `overlap` characters) are repeated at
/// the start of the next one.
#[derive(Debug, Clone)]
pub struct RecursiveTextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveTextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn from_settings(settings: &ChunkerSettings) -> Self {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    fn atomize<'a>(&self, text: &'a str, level: usize, out: &mut Vec<&'a str>) {
        if char_len(text) <= self.chunk_size {
            out.push(text);
            return;
        }

        let separator = SEPARATORS[level.min(SEPARATORS.len() - 1)];
        if separator.is_empty() {
            hard_split(text, self.chunk_size, out);
            return;
        }
        if !text.contains(separator) {
            self.atomize(text, level + 1, out);
            return;
        }

        for part in text.split_inclusive(separator) {
            self.atomize(part, level + 1, out);
        }
    }

    fn merge(&self, pieces: Vec<&str>, overlap: usize) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut window_len = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if window_len + len > self.chunk_size && !window.is_empty() {
                push_chunk(&window, &mut chunks);
                while window_len > overlap || (window_len > 0 && window_len + len > self.chunk_size)
                {
                    match window.pop_front() {
                        Some((_, dropped)) => window_len -= dropped,
                        None => break,
                    }
                }
            }

            window.push_back((piece, len));
            window_len += len;
        }

        if !window.is_empty() {
            push_chunk(&window, &mut chunks);
        }
        chunks
    }
}

impl TextSplitter for RecursiveTextSplitter {
    fn split(&self, text: &str, overlap: Option<usize>) -> Vec<TextChunk> {
        let overlap = overlap
            .unwrap_or(self.chunk_overlap)
            .min(self.chunk_size - 1);

        let mut pieces = Vec::new();
        self.atomize(text, 0, &mut pieces);
        self.merge(pieces, overlap)
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn hard_split<'a>(text: &'a str, size: usize, out: &mut Vec<&'a str>) {
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == size {
            out.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
}

fn push_chunk(window: &VecDeque<(&str, usize)>, chunks: &mut Vec<TextChunk>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(TextChunk {
            text: trimmed.to_string(),
        });
    }
}
