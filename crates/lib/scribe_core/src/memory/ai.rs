use async_trait::async_trait;

use crate::ai::{AiError, ContentGenerator, MAX_CONTENT_LEN, MAX_TOPIC_LEN, validate_input};

/// Deterministic generator that echoes its input back.
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedGenerator;

#[async_trait]
impl ContentGenerator for CannedGenerator {
    fn model(&self) -> &str {
        "canned"
    }

    async fn generate_post(&self, topic: &str) -> Result<String, AiError> {
        let topic = validate_input("topic", topic, MAX_TOPIC_LEN)?;
        Ok(format!("## {topic}\n\nA post about {topic}."))
    }

    async fn suggest_improvements(&self, content: &str) -> Result<String, AiError> {
        let content = validate_input("content", content, MAX_CONTENT_LEN)?;
        Ok(format!("- Tighten the opening of: {content}"))
    }
}
