use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;

use crate::error::AppError;

/// Structured output contract passed through to the model when supported.
#[derive(Debug, Clone)]
pub struct ResponseSchema {
    pub name: String,
    pub description: String,
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_message: String,
    pub response_schema: Option<ResponseSchema>,
}

impl GenerationRequest {
    pub fn new(
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        user_message: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            user_message: user_message.into(),
            response_schema: None,
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// Text-generation capability. The returned text is not guaranteed to honour the
/// requested schema; callers parse defensively.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, AppError>;
}

pub struct OpenAiTextGenerator {
    client: Arc<Client<OpenAIConfig>>,
}

impl OpenAiTextGenerator {
    pub fn new(client: Arc<Client<OpenAIConfig>>) -> Self {
        Self { client }
    }

    fn build_request(request: GenerationRequest) -> Result<CreateChatCompletionRequest, AppError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(request.model).messages([
            ChatCompletionRequestSystemMessage::from(request.system_prompt).into(),
            ChatCompletionRequestUserMessage::from(request.user_message).into(),
        ]);

        if let Some(schema) = request.response_schema {
            args.response_format(ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: Some(schema.description),
                    name: schema.name,
                    schema: Some(schema.schema),
                    strict: Some(true),
                },
            });
        }

        Ok(args.build()?)
    }
}

#[async_trait]
impl TextGenerator for OpenAiTextGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, AppError> {
        let request = Self::build_request(request)?;
        let response = self.client.chat().create(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::LLMParsing("No content found in LLM response".into()))
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use std::collections::VecDeque;

    use tokio::sync::Mutex;

    use super::{async_trait, AppError, GenerationRequest, TextGenerator};

    /// Replays queued replies in order, then repeats the fallback reply.
    /// Every request is recorded for assertions.
    pub struct ScriptedTextGenerator {
        queued: Mutex<VecDeque<Result<String, String>>>,
        fallback: Result<String, String>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedTextGenerator {
        pub fn replying(reply: impl Into<String>) -> Self {
            Self {
                queued: Mutex::new(VecDeque::new()),
                fallback: Ok(reply.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: impl Into<String>) -> Self {
            Self {
                queued: Mutex::new(VecDeque::new()),
                fallback: Err(message.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub async fn push_reply(&self, reply: impl Into<String>) {
            self.queued.lock().await.push_back(Ok(reply.into()));
        }

        pub async fn push_failure(&self, message: impl Into<String>) {
            self.queued.lock().await.push_back(Err(message.into()));
        }

        pub async fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().await.clone()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedTextGenerator {
        async fn generate(&self, request: GenerationRequest) -> Result<String, AppError> {
            self.requests.lock().await.push(request);
            let next = self
                .queued
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());
            next.map_err(AppError::InternalError)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_request_carries_schema() {
        let request = GenerationRequest::new("gpt-4o-mini", "system", "user").with_schema(
            ResponseSchema {
                name: "artifact_annotation".into(),
                description: "annotation".into(),
                schema: json!({"type": "object"}),
            },
        );

        let built = OpenAiTextGenerator::build_request(request).expect("request builds");
        assert_eq!(built.model, "gpt-4o-mini");
        assert_eq!(built.messages.len(), 2);
        assert!(matches!(
            built.response_format,
            Some(ResponseFormat::JsonSchema { .. })
        ));
    }

    #[test]
    fn test_build_request_without_schema_is_free_text() {
        let request = GenerationRequest::new("gpt-4o-mini", "system", "user");
        let built = OpenAiTextGenerator::build_request(request).expect("request builds");
        assert!(built.response_format.is_none());
    }

    #[tokio::test]
    async fn test_scripted_generator_replays_queue_then_fallback() {
        let generator = testing::ScriptedTextGenerator::replying("fallback");
        generator.push_reply("first").await;
        generator.push_failure("boom").await;

        let req = || GenerationRequest::new("m", "s", "u");
        assert_eq!(generator.generate(req()).await.expect("first"), "first");
        assert!(generator.generate(req()).await.is_err());
        assert_eq!(generator.generate(req()).await.expect("fallback"), "fallback");
        assert_eq!(generator.requests().await.len(), 3);
    }
}
