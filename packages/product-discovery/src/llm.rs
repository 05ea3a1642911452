//! Language-model seam for the fallback extractor.

use async_trait::async_trait;

use crate::error::ExtractionResult;

/// One request/response exchange with a remote language model.
///
/// Returns free text; callers locate and validate any JSON inside it.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> ExtractionResult<String>;
}

#[cfg(feature = "deepseek")]
pub use deepseek::DeepSeekModel;

#[cfg(feature = "deepseek")]
mod deepseek {
    use async_trait::async_trait;
    use llm_client::{ChatRequest, LlmClient, Message};
    use tracing::warn;

    use super::LanguageModel;
    use crate::error::{ExtractionError, ExtractionResult};
    use crate::types::ExtractionConfig;

    /// DeepSeek chat model via the OpenAI-compatible API.
    pub struct DeepSeekModel {
        client: LlmClient,
        model: String,
        max_tokens: u32,
        temperature: f32,
    }

    impl DeepSeekModel {
        pub fn new(client: LlmClient, config: &ExtractionConfig) -> Self {
            Self {
                client,
                model: config.model.clone(),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            }
        }
    }

    #[async_trait]
    impl LanguageModel for DeepSeekModel {
        async fn complete(&self, system: &str, user: &str) -> ExtractionResult<String> {
            let request = ChatRequest::new(self.model.clone())
                .message(Message::system(system))
                .message(Message::user(user))
                .max_tokens(self.max_tokens)
                .temperature(self.temperature);

            let response = self.client.chat_completion(request).await.map_err(|e| {
                if e.is_timeout() {
                    warn!(model = %self.model, "Language model request timed out");
                }
                ExtractionError::Model(Box::new(e))
            })?;

            Ok(response.content)
        }
    }
}
