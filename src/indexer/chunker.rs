use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk size must be greater than zero")]
    ZeroSize,
    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub chunk_index: usize,
    /// Byte offset of the chunk in the trimmed document.
    pub start: usize,
    pub end: usize,
}

/// Splits text into windows of at most `size` characters, each sharing
/// `overlap` characters with its predecessor. The only exception is a
/// whitespace run too long for any chunk to span, which separates two
/// chunks without overlap.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if size == 0 {
            return Err(ChunkError::ZeroSize);
        }
        if overlap >= size {
            return Err(ChunkError::OverlapTooLarge { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text: text.trim(),
            size: self.size,
            overlap: self.overlap,
            start: 0,
            chunk_index: 0,
            done: false,
        }
    }
}

/// Lazy single pass over a document. Created by [`Chunker::chunks`].
#[derive(Debug)]
pub struct Chunks<'a> {
    text: &'a str,
    size: usize,
    overlap: usize,
    start: usize,
    chunk_index: usize,
    done: bool,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = TextChunk;

    fn next(&mut self) -> Option<TextChunk> {
        if self.done || self.start >= self.text.len() {
            return None;
        }
        let text = self.text;

        loop {
            let start = self.start;
            let window_end = advance_chars(text, start, self.size);
            let rest = &text[start..];
            let content = start + (rest.len() - rest.trim_start().len());

            // No chunk can reach past this whitespace run while keeping the
            // overlap, so resume at the next content.
            if content >= window_end {
                self.start = content;
                continue;
            }

            let end = if window_end < text.len() {
                let min_break = advance_chars(text, start, self.overlap + 1)
                    .max(advance_chars(text, content, 1));
                find_break_point(text, min_break, window_end).unwrap_or(window_end)
            } else {
                window_end
            };

            if end >= text.len() {
                self.done = true;
            } else {
                // A break is never accepted before `overlap + 1` characters,
                // so stepping back still moves forward.
                self.start = retreat_chars(text, end, self.overlap);
            }

            let chunk = TextChunk {
                text: text[start..end].to_string(),
                chunk_index: self.chunk_index,
                start,
                end,
            };
            self.chunk_index += 1;
            return Some(chunk);
        }
    }
}

/// Convenience wrapper collecting every chunk of `text`.
pub fn chunk_text(text: &str, chunker: &Chunker) -> Vec<TextChunk> {
    chunker.chunks(text).collect()
}

/// Byte position `n` characters after `from`, clamped to the end of `text`.
fn advance_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map(|(offset, _)| from + offset)
        .unwrap_or(text.len())
}

/// Byte position `n` characters before `to`.
fn retreat_chars(text: &str, to: usize, n: usize) -> usize {
    if n == 0 {
        return to;
    }
    text[..to]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(offset, _)| offset)
        .unwrap_or(0)
}

fn find_break_point(text: &str, min_end: usize, max_end: usize) -> Option<usize> {
    if min_end >= max_end {
        return None;
    }
    let segment = &text[min_end..max_end];

    if let Some(pos) = segment.rfind("\n\n") {
        return Some(min_end + pos + 2);
    }
    if let Some(pos) = segment.rfind('\n') {
        return Some(min_end + pos + 1);
    }
    let sentence_end = ["。", "？", "！", ". ", "? ", "! "]
        .iter()
        .filter_map(|sentinel| segment.rfind(sentinel).map(|pos| pos + sentinel.len()))
        .max();
    if let Some(pos) = sentence_end {
        return Some(min_end + pos);
    }
    segment.rfind(' ').map(|pos| min_end + pos + 1)
}
