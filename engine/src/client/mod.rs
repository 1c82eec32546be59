//! Agent Client
//!
//! Generic request/response transport to a named agent endpoint. Every
//! outcome of a call is normalized into `Result<Vec<Part>, AgentCallError>`:
//!
//! - transport failures become `Timeout` or `ConnectionFailed`
//! - a non-2xx status becomes `NonSuccessStatus(code)` and is never retried
//! - an undecodable body becomes `MalformedBody`
//! - a reply without messages becomes `EmptyMessages`
//!
//! On success the parts of the reply's last message are returned.
//!
//! The underlying `reqwest::Client` pools connections and is safe to share
//! between concurrently running pipelines.

use async_trait::async_trait;
use reqwest::Client;
use sdk::codec::{decode_card, decode_reply, encode_task};
use sdk::types::{AGENT_CARD_PATH, TASKS_SEND_PATH};
use sdk::{AgentCallError, AgentCard, Metadata, Part, Task};
use std::time::{Duration, Instant};

use crate::telemetry::preview;

/// Transport used by the pipeline to reach agents
///
/// Implemented by [`AgentClient`] for HTTP; tests may supply scripted
/// transports.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Send `parts` as a user message to `endpoint` and return the parts of
    /// the last message in the reply
    async fn call(
        &self,
        endpoint: &str,
        parts: Vec<Part>,
        task_id: &str,
        metadata: Option<Metadata>,
    ) -> Result<Vec<Part>, AgentCallError>;
}

/// HTTP agent client with a fixed per-call timeout
#[derive(Debug, Clone)]
pub struct AgentClient {
    /// HTTP client for agent requests
    client: Client,

    /// Timeout applied to every call
    timeout: Duration,
}

impl AgentClient {
    /// Create a new agent client
    ///
    /// # Arguments
    /// * `timeout` - Upper bound for one round trip, body included
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
            timeout,
        }
    }

    /// The timeout applied to every call
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch the agent card published next to a `/tasks/send` endpoint
    pub async fn fetch_card(&self, endpoint: &str) -> Result<AgentCard, AgentCallError> {
        let url = card_url(endpoint);
        tracing::debug!("Fetching agent card from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentCallError::NonSuccessStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        decode_card(&body)
    }

    /// Map a reqwest error onto the call error taxonomy
    fn classify(&self, e: reqwest::Error) -> AgentCallError {
        if e.is_timeout() {
            AgentCallError::Timeout(self.timeout)
        } else if e.is_decode() {
            AgentCallError::MalformedBody(e.to_string())
        } else {
            AgentCallError::ConnectionFailed(e.to_string())
        }
    }
}

#[async_trait]
impl AgentTransport for AgentClient {
    async fn call(
        &self,
        endpoint: &str,
        parts: Vec<Part>,
        task_id: &str,
        metadata: Option<Metadata>,
    ) -> Result<Vec<Part>, AgentCallError> {
        let mut task = Task::new(task_id, parts);
        task.metadata = metadata;

        let body = encode_task(&task).map_err(|e| AgentCallError::MalformedBody(e.to_string()))?;

        tracing::info!("Calling agent at {}", endpoint);
        tracing::debug!(
            "Payload: {}",
            preview(&String::from_utf8_lossy(&body), 200)
        );

        let start = Instant::now();
        let response = self
            .client
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        tracing::info!(
            "Response from {}: status {} in {:.2}s",
            endpoint,
            status.as_u16(),
            start.elapsed().as_secs_f64()
        );

        if !status.is_success() {
            return Err(AgentCallError::NonSuccessStatus(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;
        let reply = decode_reply(&bytes)?;

        match reply.last_parts() {
            Some(parts) => Ok(parts.to_vec()),
            None => Err(AgentCallError::EmptyMessages),
        }
    }
}

/// Derive the agent card URL from a `/tasks/send` endpoint
///
/// Endpoints that do not end in `/tasks/send` are treated as base URLs.
pub fn card_url(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    let base = trimmed.strip_suffix(TASKS_SEND_PATH).unwrap_or(trimmed);
    format!("{}{}", base, AGENT_CARD_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_url_from_tasks_endpoint() {
        assert_eq!(
            card_url("http://localhost:5001/tasks/send"),
            "http://localhost:5001/.well-known/agent.json"
        );
    }

    #[test]
    fn test_card_url_from_base_url() {
        assert_eq!(
            card_url("http://localhost:5001/"),
            "http://localhost:5001/.well-known/agent.json"
        );
    }

    #[test]
    fn test_client_keeps_timeout() {
        let client = AgentClient::new(Duration::from_secs(30));
        assert_eq!(client.timeout(), Duration::from_secs(30));
    }
}
