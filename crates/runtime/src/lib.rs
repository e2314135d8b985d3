pub mod conversation;
pub mod provider;
pub mod registry;
pub mod runtime;

pub use conversation::{ArgumentError, ChatMessage, Conversation, Role, ToolCallRequest};
pub use provider::{ChatCompletionProvider, CompletionError, CompletionResponse};
pub use registry::{to_function_specs, FunctionSpec};
pub use runtime::{ChatError, ChatLoop, ToolPayload, ToolResult, TurnOutcome};
