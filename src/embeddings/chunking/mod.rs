
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RagError, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Configuration for fixed-size chunking, measured in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum number of characters per chunk
    pub chunk_size: usize,
    /// Number of characters shared by consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    /// Distance in characters between the starts of consecutive chunks
    #[inline]
    pub fn stride(&self) -> Result<usize> {
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::InvalidChunking {
                chunk_size: self.chunk_size,
                chunk_overlap: self.chunk_overlap,
            });
        }
        Ok(self.chunk_size - self.chunk_overlap)
    }

    /// Split `text` using this configuration
    #[inline]
    pub fn split(&self, text: &str) -> Result<Vec<String>> {
        split_text(text, self.chunk_size, self.chunk_overlap)
    }
}

/// Compute the character windows covering a text of `len` characters.
///
/// The first window starts at 0 and each following one starts `chunk_size -
/// chunk_overlap` characters later. Windows are clipped to `len` and the walk
/// stops at the first window that reaches the end, so every index in `0..len`
/// belongs to at least one window.
#[inline]
pub fn chunk_windows(
    len: usize,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Range<usize>>> {
    let stride = ChunkingConfig {
        chunk_size,
        chunk_overlap,
    }
    .stride()?;

    let mut windows = Vec::with_capacity(len.div_ceil(stride));
    let mut start = 0;

    while start < len {
        let end = (start + chunk_size).min(len);
        windows.push(start..end);

        if end >= len {
            break;
        }
        start += stride;
    }

    Ok(windows)
}

/// Split text into overlapping chunks of at most `chunk_size` characters.
///
/// Chunks are trimmed, and windows that are empty after trimming are dropped.
/// Offsets count `char`s, so multi-byte text is never cut inside a code point.
#[inline]
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    // Reject a bad configuration even for empty input
    let stride = ChunkingConfig {
        chunk_size,
        chunk_overlap,
    }
    .stride()?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char boundary, including the end of the text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let chunks: Vec<String> = chunk_windows(char_count, chunk_size, chunk_overlap)?
        .into_iter()
        .filter_map(|window| text.get(boundaries[window.start]..boundaries[window.end]))
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .map(ToString::to_string)
        .collect();

    debug!(
        "Split {} characters into {} chunks (size {}, stride {})",
        char_count,
        chunks.len(),
        chunk_size,
        stride
    );

    Ok(chunks)
}
