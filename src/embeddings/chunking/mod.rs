
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RagError, Result};

/// A window of a document's text, positioned by character offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk text
    pub text: String,
    /// Offset of the first character within the source text
    pub offset: usize,
    /// Length in characters
    pub length: usize,
}

/// Configuration for fixed-window chunking
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive windows
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 512,
            overlap: 210,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidParameter(
                "chunk size must be greater than zero".to_string(),
            ));
        }

        if self.overlap >= self.chunk_size {
            return Err(RagError::InvalidParameter(format!(
                "overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.chunk_size
            )));
        }

        Ok(())
    }

    /// Distance between the start offsets of consecutive chunks
    #[inline]
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Split `text` into overlapping windows of `chunk_size` characters.
///
/// Windows start at offset 0 and advance by `chunk_size - overlap`. The window
/// that reaches the end of the text is the last one, so no chunk is ever fully
/// contained in its predecessor. Boundaries are raw character positions, so a
/// window may cut through a word.
#[inline]
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    chunk_with_config(
        text,
        &ChunkingConfig {
            chunk_size,
            overlap,
        },
    )
}

/// Same as [`chunk_text`], taking the window parameters from a config
#[inline]
pub fn chunk_with_config(text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    let step = config.step();

    let mut chunks = Vec::with_capacity(expected_chunk_count(chars.len(), config));
    let mut offset = 0;

    while offset < chars.len() {
        let end = (offset + config.chunk_size).min(chars.len());
        let window = &chars[offset..end];
        chunks.push(Chunk {
            text: window.iter().collect(),
            offset,
            length: window.len(),
        });
        if end == chars.len() {
            break;
        }
        offset += step;
    }

    debug!(
        "Chunked {} characters into {} chunks (size {}, overlap {})",
        chars.len(),
        chunks.len(),
        config.chunk_size,
        config.overlap
    );

    Ok(chunks)
}

/// Number of chunks [`chunk_with_config`] emits for a text of `len` characters
#[inline]
pub fn expected_chunk_count(len: usize, config: &ChunkingConfig) -> usize {
    if len == 0 {
        return 0;
    }
    if len <= config.chunk_size {
        return 1;
    }
    1 + (len - config.chunk_size).div_ceil(config.step().max(1))
}
