// Generation module
// Seam between the answer generator and the generative model API

#[cfg(test)]
pub(crate) mod testing;

use crate::Result;

/// A generative language model that answers a single prompt
pub trait TextGenerator: Send + Sync {
    /// Send `prompt` to the model and return its text response
    fn generate(&self, prompt: &str) -> Result<String>;
}
