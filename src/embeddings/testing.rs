//! Deterministic in-process embedding functions for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::EmbeddingFunction;
use crate::{RagError, Result};

pub(crate) const TEST_DIMENSION: usize = 32;

/// Bag-of-words embedder: each lowercase word is hashed into a bucket and
/// the counts are L2-normalised, so texts sharing words end up close.
#[derive(Debug, Default)]
pub(crate) struct HashEmbedder {
    pub document_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
}

impl HashEmbedder {
    pub(crate) fn embed(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; TEST_DIMENSION];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
                    (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
                });
            vector[(hash % TEST_DIMENSION as u64) as usize] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        } else {
            vector[0] = 1.0;
        }
        vector
    }
}

impl EmbeddingFunction for HashEmbedder {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|text| Self::embed(text)).collect())
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::embed(text))
    }
}

/// Embedder whose every call fails
#[derive(Debug, Default)]
pub(crate) struct FailingEmbedder;

impl EmbeddingFunction for FailingEmbedder {
    fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::Embedding("embedding service unavailable".to_string()))
    }

    fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::Embedding("embedding service unavailable".to_string()))
    }
}
