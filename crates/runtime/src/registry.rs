//! Adapts discovered tool descriptors to the LLM function-calling schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlpilot_mcp::ToolDescriptor;

/// A tool in the shape the chat completion API expects inside a
/// `{"type": "function", "function": ...}` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolDescriptor> for FunctionSpec {
    fn from(descriptor: &ToolDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            parameters: descriptor.input_schema.clone(),
        }
    }
}

/// Map a registry snapshot to function specs, preserving order.
///
/// Pure and stateless; recomputed whenever the snapshot changes, which is
/// once per connection.
pub fn to_function_specs(descriptors: &[ToolDescriptor]) -> Vec<FunctionSpec> {
    descriptors.iter().map(FunctionSpec::from).collect()
}
