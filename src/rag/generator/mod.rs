
use std::sync::Arc;

use tracing::{debug, error, warn};

use super::RetrievedChunk;
use crate::Result;
use crate::generation::TextGenerator;

pub const DEFAULT_MAX_CONTEXT_LENGTH: usize = 4000;

pub const NO_CONTEXT_ANSWER: &str =
    "I don't have enough information to answer your question based on the available documents.";

/// Turns retrieved chunks into a grounded answer from the generative model
pub struct AnswerGenerator {
    model: Arc<dyn TextGenerator>,
    max_context_length: usize,
}

impl AnswerGenerator {
    #[inline]
    pub fn new(model: Arc<dyn TextGenerator>, max_context_length: usize) -> Self {
        Self {
            model,
            max_context_length,
        }
    }

    #[inline]
    pub fn max_context_length(&self) -> usize {
        self.max_context_length
    }

    /// Answer `query` from `chunks`, turning a model failure into a message
    /// for the user
    #[inline]
    pub fn generate_answer(&self, query: &str, chunks: &[RetrievedChunk]) -> String {
        match self.try_generate_answer(query, chunks) {
            Ok(answer) => answer,
            Err(e) => {
                error!("Answer generation failed: {}", e);
                format!("Sorry, I encountered an error while generating the answer: {e}")
            }
        }
    }

    /// Answer `query` from `chunks`.
    ///
    /// Returns [`NO_CONTEXT_ANSWER`] without calling the model when no chunk
    /// fits in the context budget.
    #[inline]
    pub fn try_generate_answer(&self, query: &str, chunks: &[RetrievedChunk]) -> Result<String> {
        let context = build_context(chunks, self.max_context_length);
        if context.is_empty() {
            warn!("No context available for query");
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let prompt = build_prompt(query, &context);
        debug!(
            "Sending prompt of {} characters to the model",
            prompt.chars().count()
        );

        self.model.generate(&prompt)
    }
}

/// Concatenate chunks in rank order until the next one would exceed
/// `max_length` characters.
///
/// The fill is a prefix: a chunk that does not fit ends the context even if
/// a later, shorter one would.
#[inline]
pub fn build_context(chunks: &[RetrievedChunk], max_length: usize) -> String {
    let mut context = String::new();
    let mut length = 0;

    for chunk in chunks {
        let piece = format!("Source: {}\n{}\n\n", chunk.metadata.source, chunk.content);
        let piece_length = piece.chars().count();

        if length + piece_length > max_length {
            debug!(
                "Context limit of {} characters reached after {} characters",
                max_length, length
            );
            break;
        }

        context.push_str(&piece);
        length += piece_length;
    }

    context
}

#[inline]
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "Based on the following context information, please answer the user's question. \
If the answer is not found in the context, please say so clearly.

Context:
{context}

Question: {query}

Please provide a comprehensive and accurate answer based only on the information provided in the context. \
If you need to make any inferences, please make it clear that you are doing so."
    )
}
