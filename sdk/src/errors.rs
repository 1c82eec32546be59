//! Error types and handling
//!
//! This module provides the error taxonomy shared by every relay component.
//! Errors fall into four classes:
//!
//! - **Transport**: the agent could not be reached in time
//! - **Protocol**: the agent answered, but not with a usable reply
//! - **Validation**: an inbound task is structurally invalid
//! - **Semantic**: a reply decoded fine but its content is an error string
//!
//! Only validation errors ever reach a caller as a non-success response.
//! Everything else is absorbed by the pipeline and kept for operators.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Trait for relay error extensions
///
/// Provides operator-facing hints and recoverability information without
/// exposing raw error details to end users.
pub trait RelayErrorExt {
    /// Returns a short hint that is safe to show to an operator
    fn user_hint(&self) -> &str;

    /// Returns whether retrying the same request later could succeed
    fn is_recoverable(&self) -> bool;
}

/// Error class used for grouping error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transport,
    Protocol,
    Validation,
    Semantic,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Transport => write!(f, "transport"),
            ErrorClass::Protocol => write!(f, "protocol"),
            ErrorClass::Validation => write!(f, "validation"),
            ErrorClass::Semantic => write!(f, "semantic"),
        }
    }
}

/// Classification of a failed (or unusable) agent call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    ConnectionFailed,
    NonSuccessStatus(u16),
    MalformedBody,
    EmptyMessages,
    /// Reply carried messages, but their text was blank
    BlankContent,
    ErrorPrefixedContent,
}

impl ErrorKind {
    /// The class this kind belongs to
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Timeout | Self::ConnectionFailed => ErrorClass::Transport,
            Self::NonSuccessStatus(_) | Self::MalformedBody | Self::EmptyMessages => {
                ErrorClass::Protocol
            }
            Self::BlankContent | Self::ErrorPrefixedContent => ErrorClass::Semantic,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::NonSuccessStatus(code) => write!(f, "non_success_status({})", code),
            Self::MalformedBody => write!(f, "malformed_body"),
            Self::EmptyMessages => write!(f, "empty_messages"),
            Self::BlankContent => write!(f, "blank_content"),
            Self::ErrorPrefixedContent => write!(f, "error_prefixed_content"),
        }
    }
}

/// Error returned by a single call to a downstream agent
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentCallError {
    #[error("Agent call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Agent returned status {0}")]
    NonSuccessStatus(u16),

    #[error("Malformed agent reply: {0}")]
    MalformedBody(String),

    #[error("Agent reply contained no messages")]
    EmptyMessages,
}

impl AgentCallError {
    /// Classification used when recording the failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::ConnectionFailed(_) => ErrorKind::ConnectionFailed,
            Self::NonSuccessStatus(code) => ErrorKind::NonSuccessStatus(*code),
            Self::MalformedBody(_) => ErrorKind::MalformedBody,
            Self::EmptyMessages => ErrorKind::EmptyMessages,
        }
    }
}

impl RelayErrorExt for AgentCallError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Timeout(_) => "Agent took too long to respond. Check its load or raise timeout_secs",
            Self::ConnectionFailed(_) => "Agent is unreachable. Check that it is running and the URL is correct",
            Self::NonSuccessStatus(_) => "Agent reported an internal fault. Check the agent's logs",
            Self::MalformedBody(_) => "Agent reply is not a valid task response",
            Self::EmptyMessages => "Agent replied without any message",
        }
    }

    fn is_recoverable(&self) -> bool {
        // A malformed body indicates a protocol mismatch, not a transient fault
        !matches!(self, Self::MalformedBody(_))
    }
}

/// Structural problem with an inbound task
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Request body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Task has no message")]
    MissingMessage,

    #[error("Task message has no parts")]
    MissingParts,

    #[error("Task message parts list is empty")]
    EmptyParts,
}

impl RelayErrorExt for ValidationError {
    fn user_hint(&self) -> &str {
        match self {
            Self::InvalidJson(_) => "Send a JSON task envelope",
            Self::MissingMessage => "Include a 'message' object in the task",
            Self::MissingParts => "Include 'message.parts' in the task",
            Self::EmptyParts => "Include at least one part in 'message.parts'",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}
