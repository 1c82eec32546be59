//! Relay SDK
//!
//! Shared library providing the agent protocol types, wire codec and error
//! taxonomy. This crate is used by the engine and by any agent written
//! against the relay task protocol.

/// Wire codec
pub mod codec;

/// Error types and handling
pub mod errors;

/// Protocol message types
pub mod types;

// Re-export commonly used types
pub use codec::{decode_inbound, decode_reply, encode_task, InboundTask, Rejected};
pub use errors::{AgentCallError, ErrorClass, ErrorKind, RelayErrorExt, ValidationError};
pub use types::{
    concat_parts, AgentCapabilities, AgentCard, AgentReply, Message, Metadata, Part, Role, Task,
    TaskResponse, TaskState, TaskStatus,
};
