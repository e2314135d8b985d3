//! Translation between the domain conversation types and the
//! OpenAI-compatible chat completions wire format.

use serde_json::{json, Value};

use sqlpilot_runtime::{
    ChatMessage, CompletionError, CompletionResponse, FunctionSpec, Role, ToolCallRequest,
};

/// Render conversation messages in the wire shape.
///
/// Tool-call arguments are emitted as the raw JSON string the model sent;
/// tool replies carry `tool_call_id` plus the serialized payload.
pub fn wire_messages(messages: &[ChatMessage]) -> Vec<Value> {
    messages.iter().map(wire_message).collect()
}

fn wire_message(message: &ChatMessage) -> Value {
    match message.role {
        Role::System | Role::User => json!({
            "role": message.role.as_str(),
            "content": message.content.as_deref().unwrap_or(""),
        }),
        Role::Assistant => {
            let mut wire = json!({
                "role": "assistant",
                "content": message.content,
            });
            if !message.tool_calls.is_empty() {
                wire["tool_calls"] = Value::Array(
                    message.tool_calls.iter().map(wire_tool_call).collect(),
                );
            }
            wire
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.as_deref().unwrap_or(""),
            "content": message.content.as_deref().unwrap_or(""),
        }),
    }
}

fn wire_tool_call(call: &ToolCallRequest) -> Value {
    json!({
        "id": call.id,
        "type": "function",
        "function": {
            "name": call.name,
            "arguments": call.arguments,
        },
    })
}

/// Render function specs as `tools` entries.
pub fn wire_tools(functions: &[FunctionSpec]) -> Vec<Value> {
    functions
        .iter()
        .map(|spec| {
            json!({
                "type": "function",
                "function": spec,
            })
        })
        .collect()
}

/// Extract the assistant message from a chat completions response body.
pub fn parse_completion(body: &Value) -> Result<CompletionResponse, CompletionError> {
    let message = &body["choices"][0]["message"];
    if message.is_null() {
        return Err(CompletionError::InvalidResponse(
            "missing choices[0].message".to_string(),
        ));
    }

    let content = message["content"].as_str().map(String::from);

    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let id = call["id"].as_str().ok_or_else(|| {
                CompletionError::InvalidResponse("tool call missing id".to_string())
            })?;
            let name = call["function"]["name"].as_str().ok_or_else(|| {
                CompletionError::InvalidResponse("tool call missing function name".to_string())
            })?;
            // Arguments stay a raw string; decoding happens at dispatch.
            let arguments = call["function"]["arguments"].as_str().unwrap_or("{}");
            tool_calls.push(ToolCallRequest::new(id, name, arguments));
        }
    }

    Ok(CompletionResponse {
        content,
        tool_calls,
    })
}
