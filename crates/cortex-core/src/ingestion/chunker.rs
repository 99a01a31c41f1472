//! Overlapping text chunking.
//!
//! Long documents are split into character-bounded windows before extraction so
//! each LLM call sees a manageable amount of text. Splits fall on the largest
//! semantic boundary that fits (paragraphs, then lines, sentences and words)
//! and only cut inside a word as a last resort.

use serde::{Deserialize, Serialize};
use text_splitter::{ChunkConfig, Characters, TextSplitter};

use crate::error::{CortexError, CortexResult};

/// Chunking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Texts shorter than this many characters are never split.
    pub threshold: usize,
    /// Maximum characters per chunk.
    pub max_size: usize,
    /// Characters shared between consecutive chunks.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            threshold: 2000,
            max_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_size == 0 {
            return Err("max_size must be at least 1");
        }
        if self.overlap >= self.max_size {
            return Err("overlap must be smaller than max_size");
        }
        Ok(())
    }
}

/// Splits text into overlapping chunks.
pub struct Chunker {
    threshold: usize,
    splitter: TextSplitter<Characters>,
}

impl Chunker {
    /// Build a chunker, rejecting inconsistent settings.
    pub fn new(config: &ChunkingConfig) -> CortexResult<Self> {
        config.validate().map_err(CortexError::validation)?;

        let chunk_config = ChunkConfig::new(config.max_size)
            .with_overlap(config.overlap)
            .map_err(|e| CortexError::Configuration(format!("invalid chunk overlap: {e}")))?;

        Ok(Self {
            threshold: config.threshold,
            splitter: TextSplitter::new(chunk_config),
        })
    }

    /// Split `text` into chunks.
    ///
    /// Always returns at least one chunk. Text below the threshold comes back
    /// whole.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.chars().count() < self.threshold {
            return vec![text.to_string()];
        }

        let chunks: Vec<String> = self.splitter.chunks(text).map(str::to_owned).collect();
        if chunks.is_empty() {
            return vec![text.to_string()];
        }

        tracing::debug!("Split {} characters into {} chunks", text.len(), chunks.len());
        chunks
    }
}
