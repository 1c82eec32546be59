//! Wire codec for the agent protocol
//!
//! Encodes outbound task envelopes and decodes the two kinds of inbound
//! payloads a relay component sees: replies from downstream agents and
//! tasks submitted by callers. Replies are decoded leniently; inbound tasks
//! are decoded into an intermediate shape and then validated so that a
//! structural problem can be reported with the caller's task id.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{AgentCallError, ValidationError};
use crate::types::{AgentCard, AgentReply, Message, Metadata, Part, Role, Task};

/// Encode a task envelope as JSON bytes
pub fn encode_task(task: &Task) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(task)
}

/// Decode the body of a downstream agent reply
///
/// Anything that is not a JSON object with an optional `messages` array of
/// messages is reported as [`AgentCallError::MalformedBody`].
pub fn decode_reply(body: &[u8]) -> Result<AgentReply, AgentCallError> {
    serde_json::from_slice(body).map_err(|e| AgentCallError::MalformedBody(e.to_string()))
}

/// Decode an agent card
pub fn decode_card(body: &[u8]) -> Result<AgentCard, AgentCallError> {
    serde_json::from_slice(body).map_err(|e| AgentCallError::MalformedBody(e.to_string()))
}

/// Task as submitted by a caller, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundTask {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub message: Option<InboundMessage>,

    /// Values that are not strings are kept in their JSON rendering
    #[serde(default)]
    pub metadata: Option<serde_json::Map<String, Value>>,
}

/// Message as submitted by a caller, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub role: Option<Role>,

    #[serde(default)]
    pub parts: Option<Vec<Part>>,
}

/// A task that failed structural validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    /// The caller's id, or the fallback id when none was supplied
    pub id: String,
    pub error: ValidationError,
}

/// Decode a caller-submitted task body
pub fn decode_inbound(body: &[u8]) -> Result<InboundTask, ValidationError> {
    serde_json::from_slice(body).map_err(|e| ValidationError::InvalidJson(e.to_string()))
}

impl InboundTask {
    /// Validate into a [`Task`]
    ///
    /// `fallback_id` is only invoked when the caller did not supply an id.
    pub fn into_task(self, fallback_id: impl FnOnce() -> String) -> Result<Task, Rejected> {
        let id = match self.id {
            Some(id) if !id.is_empty() => id,
            _ => fallback_id(),
        };

        let Some(message) = self.message else {
            return Err(Rejected {
                id,
                error: ValidationError::MissingMessage,
            });
        };

        let parts = match message.parts {
            None => {
                return Err(Rejected {
                    id,
                    error: ValidationError::MissingParts,
                })
            }
            Some(parts) if parts.is_empty() => {
                return Err(Rejected {
                    id,
                    error: ValidationError::EmptyParts,
                })
            }
            Some(parts) => parts,
        };

        let metadata = self.metadata.map(|map| {
            map.into_iter()
                .map(|(k, v)| match v {
                    Value::String(s) => (k, s),
                    other => (k, other.to_string()),
                })
                .collect::<Metadata>()
        });

        Ok(Task {
            id,
            message: Message {
                role: message.role.unwrap_or(Role::User),
                parts,
            },
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn fixed_id() -> String {
        "generated".to_string()
    }

    #[test]
    fn test_decode_reply_lenient() {
        let reply = decode_reply(br#"{"messages": [{"role": "agent", "parts": [{"text": "hi"}]}]}"#)
            .unwrap();
        assert_eq!(reply.id, None);
        assert_eq!(reply.last_parts().unwrap()[0].text, "hi");
    }

    #[test]
    fn test_decode_reply_ignores_status_shape() {
        let body = br#"{"id": "x", "status": "whatever", "messages": []}"#;
        let reply = decode_reply(body).unwrap();
        assert!(reply.messages.is_empty());
    }

    #[test]
    fn test_decode_reply_malformed() {
        let err = decode_reply(b"<html>oops</html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedBody);

        let err = decode_reply(br#"{"messages": "nope"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedBody);
    }

    #[test]
    fn test_inbound_valid_task() {
        let inbound = decode_inbound(
            br#"{"id": "t-1", "message": {"role": "user", "parts": [{"text": "Hello"}]}}"#,
        )
        .unwrap();
        let task = inbound.into_task(fixed_id).unwrap();
        assert_eq!(task.id, "t-1");
        assert_eq!(task.message.text(), "Hello");
        assert!(task.metadata.is_none());
    }

    #[test]
    fn test_inbound_generates_missing_id() {
        let inbound = decode_inbound(br#"{"message": {"parts": [{"text": "Hi"}]}}"#).unwrap();
        let task = inbound.into_task(fixed_id).unwrap();
        assert_eq!(task.id, "generated");
        assert_eq!(task.message.role, Role::User);
    }

    #[test]
    fn test_inbound_missing_message() {
        let inbound = decode_inbound(br#"{"id": "t-2"}"#).unwrap();
        let rejected = inbound.into_task(fixed_id).unwrap_err();
        assert_eq!(rejected.id, "t-2");
        assert_eq!(rejected.error, ValidationError::MissingMessage);
    }

    #[test]
    fn test_inbound_missing_and_empty_parts() {
        let inbound = decode_inbound(br#"{"id": "t-3", "message": {"role": "user"}}"#).unwrap();
        assert_eq!(
            inbound.into_task(fixed_id).unwrap_err().error,
            ValidationError::MissingParts
        );

        let inbound =
            decode_inbound(br#"{"id": "t-4", "message": {"role": "user", "parts": []}}"#).unwrap();
        assert_eq!(
            inbound.into_task(fixed_id).unwrap_err().error,
            ValidationError::EmptyParts
        );
    }

    #[test]
    fn test_inbound_metadata_coercion() {
        let inbound = decode_inbound(
            br#"{"message": {"parts": [{"text": "q"}]}, "metadata": {"user": "ana", "turn": 3}}"#,
        )
        .unwrap();
        let task = inbound.into_task(fixed_id).unwrap();
        let metadata = task.metadata.unwrap();
        assert_eq!(metadata["user"], "ana");
        assert_eq!(metadata["turn"], "3");
    }

    #[test]
    fn test_inbound_invalid_json() {
        let err = decode_inbound(b"not json").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidJson(_)));
    }

    #[test]
    fn test_encode_task_shape() {
        let task = Task::new("abc", vec![Part::text("one"), Part::text("two")]);
        let bytes = encode_task(&task).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["id"], "abc");
        assert_eq!(value["message"]["parts"][1]["text"], "two");
    }
}
