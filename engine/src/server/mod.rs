//! Router agent HTTP service
//!
//! Exposes the pipeline as an agent speaking the same task protocol as the
//! agents it calls.
//!
//! # Endpoints
//!
//! - GET /.well-known/agent.json - The router's agent card
//! - POST /tasks/send - Run one task through the pipeline

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sdk::types::{AGENT_CARD_PATH, TASKS_SEND_PATH};
use sdk::AgentCard;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::pipeline::{Handled, Orchestrator};

/// Name the router advertises and tags its context requests with
pub const ROUTER_NAME: &str = "RouterAgent";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Failed to get local address: {0}")]
    LocalAddr(std::io::Error),

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}

/// State shared across handlers
#[derive(Clone)]
pub struct ServerState {
    orchestrator: Orchestrator,
    card: Arc<AgentCard>,
}

impl ServerState {
    pub fn new(orchestrator: Orchestrator, card: AgentCard) -> Self {
        Self {
            orchestrator,
            card: Arc::new(card),
        }
    }
}

/// The router's own agent card
pub fn router_card(config: &Config) -> AgentCard {
    AgentCard::new(
        ROUTER_NAME,
        "Routes queries through translation, memory, search and synthesis agents",
        config.server.advertised_url(),
        env!("CARGO_PKG_VERSION"),
    )
}

/// Build the axum router
pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route(AGENT_CARD_PATH, get(agent_card_handler))
        .route(TASKS_SEND_PATH, post(send_task_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn agent_card_handler(State(state): State<ServerState>) -> Json<AgentCard> {
    Json(state.card.as_ref().clone())
}

/// Body is taken raw so that malformed JSON is answered with the protocol's
/// own error response instead of axum's rejection
async fn send_task_handler(State(state): State<ServerState>, body: Bytes) -> Response {
    let handled = state.orchestrator.handle_bytes(&body).await;
    tracing::debug!("Task ended in phase {}", handled.final_phase());

    match handled {
        Handled::Completed(outcome) => (StatusCode::OK, Json(outcome.response)).into_response(),
        Handled::Rejected(response) => (StatusCode::BAD_REQUEST, Json(response)).into_response(),
    }
}

/// A server running on a background task
pub struct RunningServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl RunningServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL of the running server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for in-flight requests
    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown_tx.take() {
            tx.send(()).ok();
        }
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(ServerError::Serve(std::io::Error::other(e))),
        }
    }
}

/// Bind `addr` and serve in the background until shut down
pub async fn spawn(addr: &str, state: ServerState) -> Result<RunningServer, ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app = build_router(state);

    let handle = tokio::spawn(async move {
        tracing::info!("Router agent listening on http://{}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_rx.await.ok();
                tracing::info!("Router agent shutting down gracefully");
            })
            .await
            .map_err(ServerError::Serve)
    });

    Ok(RunningServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        handle,
    })
}

/// Serve the router agent until Ctrl-C
pub async fn serve(config: &Config) -> Result<(), ServerError> {
    let state = ServerState::new(Orchestrator::from_config(config), router_card(config));
    let server = spawn(&config.server.bind_addr(), state).await?;

    tracing::info!("Translator agent: {}", config.agents.translator);
    tracing::info!("Memory agent: {}", config.agents.memory);
    tracing::info!("Search agent: {}", config.agents.search);
    tracing::info!("Synthesis agent: {}", config.agents.synthesis);

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
    }
    tracing::info!("Received Ctrl-C");
    server.shutdown().await
}
