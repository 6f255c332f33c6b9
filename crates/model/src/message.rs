use std::borrow::Cow;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model.
    System,
    /// An input from the user, or a task handed out by the supervisor.
    User,
    /// An output of the model.
    Assistant,
    /// A tool call result.
    Tool,
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// Describes a tool call request from the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The arguments to pass to the tool, usually a JSON object.
    pub arguments: Value,
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The result of the tool call.
    pub content: String,
}

/// The payload of a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// A structured value, e.g. the deliverable of an agent.
    Structured(Value),
    /// Tool calls requested by the model on behalf of `agent`.
    ToolCalls {
        /// The agent whose registry the calls must be resolved against.
        agent: String,
        /// The requested calls, in the order the model produced them.
        calls: Vec<ToolCallRequest>,
    },
    /// The result of a tool call.
    ToolResult(ToolCallResult),
}

impl MessageContent {
    /// Returns a textual rendering of the content.
    ///
    /// Structured values and tool calls are rendered as compact JSON.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            MessageContent::Text(text) => Cow::Borrowed(text),
            MessageContent::Structured(value) => Cow::Owned(value.to_string()),
            MessageContent::ToolCalls { calls, .. } => Cow::Owned(
                serde_json::to_string(calls).unwrap_or_default(),
            ),
            MessageContent::ToolResult(result) => {
                Cow::Borrowed(&result.content)
            }
        }
    }
}

impl Display for MessageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// A complete message.
///
/// Messages are immutable once created. The constructors guarantee that
/// tool calls are only carried by assistant messages, and tool results
/// only by tool messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMessage {
    role: Role,
    content: MessageContent,
}

impl ModelMessage {
    /// Creates a system message.
    #[inline]
    pub fn system<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Creates an assistant text message.
    #[inline]
    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Creates an assistant message carrying a structured value.
    #[inline]
    pub fn assistant_value(value: Value) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Structured(value),
        }
    }

    /// Creates an assistant message that records tool calls requested
    /// on behalf of `agent`.
    #[inline]
    pub fn tool_calls<S: Into<String>>(
        agent: S,
        calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::ToolCalls {
                agent: agent.into(),
                calls,
            },
        }
    }

    /// Creates a tool result message.
    #[inline]
    pub fn tool_result<S1: Into<String>, S2: Into<String>>(
        id: S1,
        content: S2,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResult(ToolCallResult {
                id: id.into(),
                content: content.into(),
            }),
        }
    }

    /// Returns the author of this message.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the payload of this message.
    #[inline]
    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    /// Consumes the message and returns its payload.
    #[inline]
    pub fn into_content(self) -> MessageContent {
        self.content
    }
}
