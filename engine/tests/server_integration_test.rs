//! Integration tests for the router agent HTTP service
//!
//! The router is bound to an ephemeral port and driven over real HTTP.

use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use relay_engine::client::AgentClient;
use relay_engine::config::Config;
use relay_engine::language::{DetectedLanguage, FixedDetector};
use relay_engine::pipeline::Orchestrator;
use relay_engine::server::{router_card, spawn, RunningServer, ServerState, ROUTER_NAME};

fn reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "downstream",
        "status": {"state": "completed"},
        "messages": [{"role": "agent", "parts": [{"text": text}]}]
    }))
}

async fn start_router(agents: &MockServer) -> RunningServer {
    let mut config = Config::default();
    let endpoint = format!("{}/tasks/send", agents.uri());
    config.agents.translator = endpoint.clone();
    config.agents.memory = endpoint.clone();
    config.agents.search = endpoint.clone();
    config.agents.synthesis = endpoint;

    let orchestrator = Orchestrator::new(
        Arc::new(AgentClient::new(config.agents.timeout())),
        Arc::new(FixedDetector(DetectedLanguage::Code("eng".into()))),
        &config,
    );
    let state = ServerState::new(orchestrator, router_card(&config));
    spawn("127.0.0.1:0", state)
        .await
        .expect("router should bind an ephemeral port")
}

#[tokio::test]
async fn test_tasks_send_completes() {
    let agents = MockServer::start().await;
    // One mock answers every stage
    Mock::given(method("POST"))
        .and(path("/tasks/send"))
        .respond_with(reply("Sunny in Paris."))
        .mount(&agents)
        .await;

    let router = start_router(&agents).await;
    let response = reqwest::Client::new()
        .post(format!("{}/tasks/send", router.url()))
        .json(&json!({
            "id": "task-123",
            "message": {"role": "user", "parts": [{"text": "What is the weather in Paris?"}]}
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], "task-123");
    assert_eq!(body["status"]["state"], "completed");
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(
        body["messages"][0]["parts"][0]["text"],
        "What is the weather in Paris?"
    );
    assert_eq!(body["messages"][1]["role"], "agent");
    assert_eq!(body["messages"][1]["parts"][0]["text"], "Sunny in Paris.");

    router.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_parts_is_bad_request() {
    let agents = MockServer::start().await;
    let router = start_router(&agents).await;

    let response = reqwest::Client::new()
        .post(format!("{}/tasks/send", router.url()))
        .json(&json!({"id": "task-9", "message": {"role": "user"}}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], "task-9");
    assert_eq!(body["status"]["state"], "error");
    assert_eq!(body["messages"].as_array().map(Vec::len), Some(1));
    assert_eq!(
        body["messages"][0]["parts"][0]["text"],
        "Error: Invalid request format"
    );

    router.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_id_is_generated() {
    let agents = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tasks/send"))
        .respond_with(reply("ok"))
        .mount(&agents)
        .await;

    let router = start_router(&agents).await;
    let body: Value = reqwest::Client::new()
        .post(format!("{}/tasks/send", router.url()))
        .json(&json!({"message": {"role": "user", "parts": [{"text": "hi"}]}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let id = body["id"].as_str().unwrap_or_default();
    assert!(uuid::Uuid::parse_str(id).is_ok());

    router.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_agent_card_is_served() {
    let agents = MockServer::start().await;
    let router = start_router(&agents).await;

    let card: Value = reqwest::get(format!("{}/.well-known/agent.json", router.url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(card["name"], ROUTER_NAME);
    assert_eq!(card["capabilities"]["streaming"], false);
    assert_eq!(card["capabilities"]["pushNotifications"], false);

    router.shutdown().await.unwrap();
}
