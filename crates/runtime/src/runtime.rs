use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use sqlpilot_mcp::{normalize, ToolGateway};

use crate::conversation::{Conversation, ToolCallRequest};
use crate::provider::{ChatCompletionProvider, CompletionError};
use crate::registry::FunctionSpec;

/// Payload of a completed tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    /// Normalized tool output.
    Success(Value),
    /// Diagnostic reported back to the model.
    Error(String),
}

/// Outcome of one tool call. Created by dispatching the model's request
/// through the gateway (or synthesized locally when that fails), consumed
/// exactly once when appended to the conversation as a tool message.
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// Echoes the id of the request this result answers.
    pub id: String,
    pub name: String,
    /// The raw argument string the model sent, kept for trace rendering.
    pub arguments: String,
    pub payload: ToolPayload,
}

impl ToolResult {
    /// Serialize the payload the way the model sees it. Error payloads
    /// become an `{"error": ...}` object so the model can react to them.
    pub fn payload_json(&self) -> String {
        match &self.payload {
            ToolPayload::Success(value) => value.to_string(),
            ToolPayload::Error(message) => json!({"error": message}).to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, ToolPayload::Error(_))
    }
}

/// What happened during one user turn.
#[derive(Debug)]
pub struct TurnOutcome {
    /// The model's final plain-text answer.
    pub reply: String,
    /// Every tool call executed during the turn, in execution order.
    pub trace: Vec<ToolResult>,
}

/// The agentic loop that orchestrates LLM ↔ tool execution.
///
/// Flow: user input → completion → tool calls → gateway → normalized
/// results → completion → ... → final text. One [`run_turn`] call drives
/// one user turn to its final answer; the loop is strictly sequential and
/// the gateway is borrowed mutably for the duration of the turn.
///
/// [`run_turn`]: ChatLoop::run_turn
pub struct ChatLoop {
    provider: Arc<dyn ChatCompletionProvider>,
    functions: Vec<FunctionSpec>,
    max_rounds: usize,
}

impl ChatLoop {
    pub fn new(provider: Arc<dyn ChatCompletionProvider>, functions: Vec<FunctionSpec>) -> Self {
        Self {
            provider,
            functions,
            max_rounds: 10,
        }
    }

    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    /// Run a single user turn through the loop.
    ///
    /// Appends the user message, then alternates completion rounds and tool
    /// execution until the model answers in plain text or the round bound
    /// is hit. Every tool call the model issues gets exactly one tool
    /// message appended, in request order, error or not; a failed call
    /// never aborts the batch.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        gateway: &mut ToolGateway,
        user_message: String,
    ) -> Result<TurnOutcome, ChatError> {
        conversation.add_user(user_message);
        let mut trace = Vec::new();

        for round in 0..self.max_rounds {
            conversation.maybe_trim();
            debug!(
                round,
                messages = conversation.messages().len(),
                "requesting completion"
            );

            let response = self
                .provider
                .complete(conversation.messages(), &self.functions)
                .await?;

            if response.tool_calls.is_empty() {
                let reply = response.content.unwrap_or_default();
                conversation.add_assistant(Some(reply.clone()), Vec::new());
                info!(round, tool_calls = trace.len(), "turn complete");
                return Ok(TurnOutcome { reply, trace });
            }

            conversation.add_assistant(response.content.clone(), response.tool_calls.clone());

            info!(count = response.tool_calls.len(), "executing tool calls");
            for call in &response.tool_calls {
                let result = execute_call(gateway, call).await;
                conversation.add_tool_result(&result.id, &result.name, result.payload_json());
                trace.push(result);
            }
        }

        Err(ChatError::RoundLimit(self.max_rounds))
    }
}

/// Execute one tool call, always producing a result.
///
/// Argument decoding happens here so a malformed payload from the model
/// fails before the gateway is touched; gateway failures are captured as
/// error payloads rather than propagated.
async fn execute_call(gateway: &mut ToolGateway, call: &ToolCallRequest) -> ToolResult {
    let payload = match call.decode_arguments() {
        Err(e) => {
            warn!(tool = %call.name, error = %e, "argument decode failed");
            ToolPayload::Error(e.to_string())
        }
        Ok(arguments) => match gateway.invoke(&call.name, Value::Object(arguments)).await {
            Ok(raw) => ToolPayload::Success(normalize(raw)),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool call failed");
                ToolPayload::Error(e.to_string())
            }
        },
    };
    ToolResult {
        id: call.id.clone(),
        name: call.name.clone(),
        arguments: call.arguments.clone(),
        payload,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),
    #[error("no final answer after {0} rounds")]
    RoundLimit(usize),
}
