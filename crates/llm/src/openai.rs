use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use sqlpilot_runtime::{
    ChatCompletionProvider, ChatMessage, CompletionError, CompletionResponse, FunctionSpec,
};

use crate::translate;

/// Chat-completions provider for the OpenAI API and compatible backends.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url,
        }
    }
}

#[async_trait]
impl ChatCompletionProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        functions: &[FunctionSpec],
    ) -> Result<CompletionResponse, CompletionError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": self.model,
            "messages": translate::wire_messages(messages),
        });
        if !functions.is_empty() {
            body["tools"] = Value::Array(translate::wire_tools(functions));
            body["tool_choice"] = json!("auto");
        }

        debug!(model = %self.model, messages = messages.len(), "requesting chat completion");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::NetworkError(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 401 {
            return Err(CompletionError::AuthError);
        }
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::ApiError {
                status,
                message: body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| CompletionError::NetworkError(e.to_string()))?;
        translate::parse_completion(&body)
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
