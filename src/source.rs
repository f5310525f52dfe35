//! The question source seam: anything that can produce exam questions.

use async_trait::async_trait;

use crate::domain::{Difficulty, Question};
use crate::error::GenerationError;

#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Generate `count` new questions for one chapter.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` when the provider is unreachable or the
    /// response does not describe valid four-choice questions.
    async fn generate(
        &self,
        chapter: u32,
        topic_description: &str,
        count: usize,
        difficulty: Difficulty,
    ) -> Result<Vec<Question>, GenerationError>;

    /// Generate one question on the same topic as `original`, phrased differently.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`QuestionSource::generate`].
    async fn generate_similar(
        &self,
        original: &Question,
        topic_description: &str,
        difficulty: Difficulty,
    ) -> Result<Question, GenerationError>;
}

/// Used when no API key is configured: every request fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSource;

#[async_trait]
impl QuestionSource for DisabledSource {
    async fn generate(
        &self,
        _chapter: u32,
        _topic_description: &str,
        _count: usize,
        _difficulty: Difficulty,
    ) -> Result<Vec<Question>, GenerationError> {
        Err(GenerationError::Disabled)
    }

    async fn generate_similar(
        &self,
        _original: &Question,
        _topic_description: &str,
        _difficulty: Difficulty,
    ) -> Result<Question, GenerationError> {
        Err(GenerationError::Disabled)
    }
}
