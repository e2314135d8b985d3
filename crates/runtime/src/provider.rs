use async_trait::async_trait;

use crate::conversation::{ChatMessage, ToolCallRequest};
use crate::registry::FunctionSpec;

/// Trait for chat-completion backends with function calling.
///
/// This trait lives here (not in crates/llm) because it's defined by the
/// consumer (the conversation loop), not the provider. Implementations
/// live in crates/llm.
#[async_trait]
pub trait ChatCompletionProvider: Send + Sync {
    /// Request one completion for the conversation so far, with the given
    /// tools offered for function calling.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        functions: &[FunctionSpec],
    ) -> Result<CompletionResponse, CompletionError>;

    /// Provider name for logging/debugging (e.g. "openai", "mock").
    fn provider_name(&self) -> &str;
}

/// One model response: text, tool-call requests, or both.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("authentication failed")]
    AuthError,
}

/// Mock provider for testing the conversation loop without real API calls.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A scripted provider. Responses are served in queue order; once the
    /// queue runs dry it answers with an empty completion. Every request's
    /// messages are recorded for assertions.
    pub struct MockProvider {
        responses: Mutex<VecDeque<Result<CompletionResponse, CompletionError>>>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Queue a full response.
        pub fn queue_response(&self, response: CompletionResponse) {
            self.responses.lock().unwrap().push_back(Ok(response));
        }

        /// Queue a plain text answer.
        pub fn queue_text(&self, text: &str) {
            self.queue_response(CompletionResponse {
                content: Some(text.to_string()),
                tool_calls: Vec::new(),
            });
        }

        /// Queue an assistant turn that requests these tool calls.
        pub fn queue_tool_calls(&self, calls: Vec<ToolCallRequest>) {
            self.queue_response(CompletionResponse {
                content: None,
                tool_calls: calls,
            });
        }

        /// Queue a failure.
        pub fn queue_error(&self, error: CompletionError) {
            self.responses.lock().unwrap().push_back(Err(error));
        }

        /// The messages of every request received so far.
        pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Default for MockProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ChatCompletionProvider for MockProvider {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _functions: &[FunctionSpec],
        ) -> Result<CompletionResponse, CompletionError> {
            self.requests.lock().unwrap().push(messages.to_vec());
            match self.responses.lock().unwrap().pop_front() {
                Some(response) => response,
                None => Ok(CompletionResponse::default()),
            }
        }

        fn provider_name(&self) -> &str {
            "mock"
        }
    }
}
