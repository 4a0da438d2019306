//! External text generation for the coach fallback.
//!
//! Supports:
//! - **Vertex AI**: Gemini `generateContent` over REST with GCP credentials
//!
//! Anything implementing [`TextGenerator`] can back the coach; tests plug in
//! scripted generators.

pub mod vertex;

pub use vertex::VertexGenerator;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::VertexConfig;
use crate::error::LlmError;

/// A single-prompt text generator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Create the Vertex AI generator from configuration.
pub fn create_generator(config: &VertexConfig) -> Result<Arc<dyn TextGenerator>, LlmError> {
    let generator = VertexGenerator::new(config.clone())?;
    tracing::info!(
        project = %config.project_id,
        location = %config.location,
        "Using Vertex AI (model: {})",
        config.model
    );
    Ok(Arc::new(generator))
}
