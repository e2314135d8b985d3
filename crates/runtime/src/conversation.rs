use serde_json::{Map, Value};
use tracing::debug;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A single tool invocation requested by the model.
///
/// `arguments` is kept as the raw JSON string from the wire; it is decoded
/// just before dispatch so a malformed payload fails that one call instead
/// of the whole turn.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Decode the argument string into a JSON object.
    pub fn decode_arguments(&self) -> Result<Map<String, Value>, ArgumentError> {
        let value: Value = serde_json::from_str(&self.arguments)?;
        match value {
            Value::Object(map) => Ok(map),
            other => Err(ArgumentError::NotAnObject(json_type_name(&other))),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Why a tool call's arguments could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ArgumentError {
    #[error("arguments are not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("arguments must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// One entry in the conversation history.
///
/// Assistant messages may carry tool-call requests instead of (or alongside)
/// text; tool messages echo the id and name of the request they answer.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
    pub tool_call_id: Option<String>,
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn tool(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(payload.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
        }
    }
}

/// Conversation history with a bounded message count.
///
/// The system prompt occupies index 0 and survives every trim. Trimming
/// keeps at most `max_messages` entries and never strands a tool reply
/// whose assistant request was evicted.
pub struct Conversation {
    messages: Vec<ChatMessage>,
    max_messages: usize,
}

impl Conversation {
    /// Start a conversation anchored on a system prompt. `max_messages`
    /// has a floor of 2 (the system prompt plus the current message).
    pub fn new(system_prompt: impl Into<String>, max_messages: usize) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
            max_messages: max_messages.max(2),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn add_user(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage::user(text));
    }

    pub fn add_assistant(&mut self, content: Option<String>, tool_calls: Vec<ToolCallRequest>) {
        self.messages.push(ChatMessage::assistant(content, tool_calls));
    }

    pub fn add_tool_result(
        &mut self,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        payload: impl Into<String>,
    ) {
        self.messages.push(ChatMessage::tool(tool_call_id, name, payload));
    }

    /// Trim to the message bound if exceeded.
    ///
    /// Keeps the system message plus at most the `max_messages - 1` most
    /// recent entries, then advances past any tool replies at the head of
    /// the kept tail; their assistant request was just evicted and a tool
    /// message with no matching request is rejected by completion APIs.
    /// May keep fewer than the bound, never more.
    pub fn maybe_trim(&mut self) {
        if self.messages.len() <= self.max_messages {
            return;
        }
        let mut keep_from = self.messages.len() - (self.max_messages - 1);
        while self
            .messages
            .get(keep_from)
            .map_or(false, |m| m.role == Role::Tool)
        {
            keep_from += 1;
        }
        let dropped = keep_from - 1;
        self.messages.drain(1..keep_from);
        debug!(dropped, retained = self.messages.len(), "trimmed conversation history");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str, name: &str) -> ToolCallRequest {
        ToolCallRequest::new(id, name, "{}")
    }

    #[test]
    fn test_system_prompt_occupies_index_zero() {
        let conv = Conversation::new("You are a SQL assistant.", 50);
        assert_eq!(conv.messages().len(), 1);
        assert_eq!(conv.messages()[0].role, Role::System);
        assert_eq!(
            conv.messages()[0].content.as_deref(),
            Some("You are a SQL assistant.")
        );
    }

    #[test]
    fn test_turn_appends_in_order() {
        let mut conv = Conversation::new("system", 50);
        conv.add_user("show me the tables");
        conv.add_assistant(None, vec![call("call_1", "list_tables")]);
        conv.add_tool_result("call_1", "list_tables", r#"[{"table":"Customers"}]"#);
        conv.add_assistant(Some("There is one table.".to_string()), Vec::new());

        let roles: Vec<Role> = conv.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        let tool = &conv.messages()[3];
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool.name.as_deref(), Some("list_tables"));
    }

    #[test]
    fn test_decode_arguments_object() {
        let call = ToolCallRequest::new("c1", "execute_sql", r#"{"query": "SELECT 1"}"#);
        let args = call.decode_arguments().unwrap();
        assert_eq!(args["query"], "SELECT 1");
    }

    #[test]
    fn test_decode_arguments_rejects_malformed_json() {
        let call = ToolCallRequest::new("c1", "execute_sql", "{not json");
        assert!(matches!(
            call.decode_arguments(),
            Err(ArgumentError::Parse(_))
        ));
    }

    #[test]
    fn test_decode_arguments_rejects_non_objects() {
        let call = ToolCallRequest::new("c1", "execute_sql", "[1, 2, 3]");
        match call.decode_arguments() {
            Err(ArgumentError::NotAnObject(kind)) => assert_eq!(kind, "array"),
            other => panic!("expected NotAnObject, got {other:?}"),
        }
    }

    #[test]
    fn test_trim_is_noop_under_the_bound() {
        let mut conv = Conversation::new("system", 10);
        conv.add_user("one");
        conv.add_assistant(Some("reply".to_string()), Vec::new());
        conv.maybe_trim();
        assert_eq!(conv.messages().len(), 3);
    }

    #[test]
    fn test_trim_keeps_system_plus_most_recent() {
        let mut conv = Conversation::new("system", 5);
        for i in 0..10 {
            conv.add_user(format!("question {i}"));
            conv.add_assistant(Some(format!("answer {i}")), Vec::new());
        }
        conv.maybe_trim();

        assert_eq!(conv.messages().len(), 5);
        assert_eq!(conv.messages()[0].role, Role::System);
        assert_eq!(conv.messages()[1].content.as_deref(), Some("question 8"));
        assert_eq!(conv.messages()[4].content.as_deref(), Some("answer 9"));
    }

    #[test]
    fn test_trim_drops_orphaned_tool_replies() {
        let mut conv = Conversation::new("system", 5);
        conv.add_user("first question");
        conv.add_assistant(None, vec![call("c1", "list_tables"), call("c2", "describe_table")]);
        conv.add_tool_result("c1", "list_tables", "[]");
        conv.add_tool_result("c2", "describe_table", "{}");
        conv.add_user("second question");
        conv.add_assistant(Some("done".to_string()), Vec::new());
        // 7 messages; the count cut alone would land on an orphaned tool reply.
        conv.maybe_trim();

        let roles: Vec<Role> = conv.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert!(conv.messages().len() <= 5);
        assert_eq!(conv.messages()[1].content.as_deref(), Some("second question"));
    }

    #[test]
    fn test_trim_keeps_answered_tool_turn_intact() {
        let mut conv = Conversation::new("system", 6);
        conv.add_user("old question");
        conv.add_assistant(Some("old answer".to_string()), Vec::new());
        conv.add_user("current question");
        conv.add_assistant(None, vec![call("c1", "execute_sql")]);
        conv.add_tool_result("c1", "execute_sql", r#"{"row_count": 1}"#);
        conv.add_assistant(Some("one row".to_string()), Vec::new());
        // 7 messages, bound 6: only the oldest user message goes.
        conv.maybe_trim();

        let roles: Vec<Role> = conv.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Assistant
            ]
        );
    }

    #[test]
    fn test_system_survives_tiny_bound() {
        let mut conv = Conversation::new("system", 2);
        for i in 0..5 {
            conv.add_user(format!("message {i}"));
        }
        conv.maybe_trim();
        assert_eq!(conv.messages().len(), 2);
        assert_eq!(conv.messages()[0].role, Role::System);
        assert_eq!(conv.messages()[1].content.as_deref(), Some("message 4"));
    }
}
