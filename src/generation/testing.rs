//! In-process text generators for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::TextGenerator;
use crate::{RagError, Result};

/// Returns a fixed reply and remembers every prompt it was given
#[derive(Debug)]
pub(crate) struct RecordingGenerator {
    reply: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub(crate) fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_prompt(&self) -> Option<String> {
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .last()
            .cloned()
    }
}

impl TextGenerator for RecordingGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("prompt log poisoned")
            .push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// Generator whose every call fails
#[derive(Debug, Default)]
pub(crate) struct FailingGenerator;

impl TextGenerator for FailingGenerator {
    fn generate(&self, _prompt: &str) -> Result<String> {
        Err(RagError::Generation("quota exceeded".to_string()))
    }
}
