//! Agent protocol types
//!
//! Every agent in a relay deployment speaks the same small task protocol:
//! a caller POSTs a [`Task`] to `/tasks/send` and receives a [`TaskResponse`].
//! Agents also publish a static [`AgentCard`] at `/.well-known/agent.json`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Free-form string metadata attached to a task
pub type Metadata = BTreeMap<String, String>;

/// Path every agent serves tasks on
pub const TASKS_SEND_PATH: &str = "/tasks/send";

/// Path every agent publishes its card on
pub const AGENT_CARD_PATH: &str = "/.well-known/agent.json";

/// Minimal content unit of a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Part {
    /// Text content (absent on the wire means empty)
    #[serde(default)]
    pub text: String,
}

impl Part {
    /// Create a new text part
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message written by the caller
    User,

    /// Message written by an agent
    Agent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Agent => write!(f, "agent"),
        }
    }
}

/// Ordered sequence of parts sent by one role
///
/// Part order is significant: the message text is the in-order
/// concatenation of its parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Message {
    /// Create a user message from parts
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    /// Create an agent message holding a single text part
    pub fn agent_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenate the text of all parts, in order
    pub fn text(&self) -> String {
        concat_parts(&self.parts)
    }
}

/// Concatenate part texts in order
pub fn concat_parts(parts: &[Part]) -> String {
    parts.iter().map(|p| p.text.as_str()).collect()
}

/// Task envelope sent to an agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    /// Caller-supplied or generated id, unique per request
    pub id: String,

    /// The message to process
    pub message: Message,

    /// Optional metadata forwarded to the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Task {
    /// Create a user task
    pub fn new(id: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            id: id.into(),
            message: Message::user(parts),
            metadata: None,
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Terminal state of a task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Completed,
    Error,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Completed => write!(f, "completed"),
            TaskState::Error => write!(f, "error"),
        }
    }
}

/// Status object carried by a response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskStatus {
    pub state: TaskState,

    /// Short human-readable explanation, only set for errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskStatus {
    pub fn completed() -> Self {
        Self {
            state: TaskState::Completed,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            state: TaskState::Error,
            message: Some(message.into()),
        }
    }
}

/// Response returned by `/tasks/send`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskResponse {
    /// Echoes the task id
    pub id: String,

    pub status: TaskStatus,

    /// Ordered conversation: inbound message first, agent reply second
    pub messages: Vec<Message>,
}

impl TaskResponse {
    /// Build a completed response
    pub fn completed(id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::completed(),
            messages,
        }
    }

    /// Build an error response with a single agent message
    pub fn error(id: impl Into<String>, reason: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::error(reason),
            messages: vec![Message::agent_text(text)],
        }
    }

    /// Text of the last message, if any
    pub fn final_text(&self) -> Option<String> {
        self.messages.last().map(Message::text)
    }
}

/// Reply decoded from a downstream agent
///
/// Decoding is lenient: agents in the wild omit `id` or `status`, and
/// only the message list matters to the caller.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AgentReply {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub messages: Vec<Message>,
}

impl AgentReply {
    /// Parts of the last message, if any message is present
    pub fn last_parts(&self) -> Option<&[Part]> {
        self.messages.last().map(|m| m.parts.as_slice())
    }
}

/// Optional agent capabilities advertised in the card
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    #[serde(default)]
    pub streaming: bool,

    #[serde(default)]
    pub push_notifications: bool,
}

/// Static descriptor published by every agent
///
/// Used for discovery and debugging only, never required for a task
/// to succeed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    #[serde(default)]
    pub capabilities: AgentCapabilities,
}

impl AgentCard {
    /// Create a card with default capabilities
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            url: url.into(),
            version: version.into(),
            capabilities: AgentCapabilities::default(),
        }
    }
}
