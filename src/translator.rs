use crate::events::{ModelKind, Turn};
use crate::llm::{ChatBackend, LlmError};
use crate::prompts::translation_message;
use crate::streaming::split;
use std::sync::Arc;
use std::time::Instant;

/// Why a translation produced no result
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("没有提供要翻译的文本")]
    MissingText,
    #[error("{0}")]
    Upstream(#[from] LlmError),
}

/// A finished translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub content: String,
    /// Present only for the reasoner model
    pub reasoning: Option<String>,
    pub model: ModelKind,
}

/// Single-shot translation over a chat backend.
///
/// Every call builds its own one-turn history, so concurrent requests share
/// nothing but the backend handle.
#[derive(Clone)]
pub struct Translator {
    backend: Arc<dyn ChatBackend>,
}

impl Translator {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub async fn translate(
        &self,
        text: &str,
        custom_prompt: Option<&str>,
        model: ModelKind,
    ) -> Result<Translation, TranslateError> {
        if text.is_empty() {
            return Err(TranslateError::MissingText);
        }

        let turns = [Turn::user(translation_message(text, custom_prompt))];
        let started = Instant::now();

        let translation = match model {
            ModelKind::Reasoner => {
                let stream = self.backend.stream_chat(&turns, model).await?;
                let result = split(stream).await;
                if let Some(error) = result.error {
                    return Err(error.into());
                }
                Translation {
                    content: result.final_text,
                    reasoning: Some(result.reasoning_text),
                    model,
                }
            }
            ModelKind::Chat => Translation {
                content: self.backend.complete(&turns, model).await?,
                reasoning: None,
                model,
            },
        };

        tracing::info!(
            model = model.api_id(),
            chars = translation.content.chars().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "translation finished"
        );
        Ok(translation)
    }
}
