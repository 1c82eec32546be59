//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - serve: Run the router agent until Ctrl-C
//! - ask: Run one query in-process
//! - agents: Check downstream agent cards
//! - config show / config path: Inspect configuration

use anyhow::{Context, Result};
use futures::future::join_all;
use sdk::{Part, RelayErrorExt, Task};
use serde_json::json;
use std::path::Path;
use uuid::Uuid;

use crate::client::AgentClient;
use crate::config::Config;
use crate::pipeline::{Orchestrator, PipelineReport};
use crate::server;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Run the router agent service
pub async fn handle_serve(config: &Config) -> Result<()> {
    server::serve(config)
        .await
        .context("Router agent stopped with an error")
}

/// Run a single query through the pipeline
pub async fn handle_ask(
    query: String,
    trace: bool,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config);
    let task = Task::new(Uuid::new_v4().to_string(), vec![Part::text(query)]);
    let outcome = orchestrator.run(task).await;

    let answer = outcome.response.final_text().unwrap_or_default();
    let report = &outcome.report;

    match format {
        OutputFormat::Text => {
            if trace {
                print_trace(report);
                println!();
                println!("Final Response:");
            }
            println!("{}", answer);
        }
        OutputFormat::Json => {
            let mut output = json!({
                "task_id": outcome.response.id,
                "answer": answer,
            });
            if trace {
                output["trace"] = trace_json(report);
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn print_trace(report: &PipelineReport) {
    let state = &report.state;
    println!("Relay Pipeline Trace");
    println!("====================");
    println!();
    println!("  {:<20} {}", "Original query:", state.original_query());
    println!("  {:<20} {}", "Detected language:", state.detected_language());
    println!("  {:<20} {}", "Working query:", state.working_query());
    println!(
        "  {:<20} {}",
        "Context:",
        state.context_fragment().unwrap_or("No relevant context found")
    );
    println!(
        "  {:<20} {}",
        "Search results:",
        state.search_fragment().unwrap_or("No search results")
    );
    println!();

    println!("Stages:");
    for timing in &report.timings {
        println!(
            "  {:<12} {:<10} {}ms",
            timing.stage.name(),
            format!("{:?}", timing.status).to_lowercase(),
            timing.elapsed_ms
        );
    }

    if !state.stage_errors().is_empty() {
        println!();
        println!("Degraded stages:");
        for (i, error) in state.stage_errors().iter().enumerate() {
            println!("  {}. {}", i + 1, error);
        }
    }
}

fn trace_json(report: &PipelineReport) -> serde_json::Value {
    let state = &report.state;
    json!({
        "started_at": report.started_at.to_rfc3339(),
        "elapsed_ms": report.elapsed_ms,
        "original_query": state.original_query(),
        "detected_language": state.detected_language().to_string(),
        "working_query": state.working_query(),
        "context": state.context_fragment(),
        "search": state.search_fragment(),
        "phases": report.phases.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
        "stages": report.timings.iter().map(|t| {
            json!({
                "stage": t.stage.name(),
                "status": format!("{:?}", t.status).to_lowercase(),
                "elapsed_ms": t.elapsed_ms,
            })
        }).collect::<Vec<_>>(),
        "errors": state.stage_errors().iter().map(|e| {
            json!({
                "stage": e.stage.name(),
                "kind": e.kind.to_string(),
                "class": e.kind.class().to_string(),
                "detail": e.detail,
            })
        }).collect::<Vec<_>>(),
    })
}

/// Fetch every downstream agent card
///
/// An unreachable agent is reported, never treated as a command failure.
pub async fn handle_agents(config: &Config, format: OutputFormat) -> Result<()> {
    let client = AgentClient::new(config.agents.timeout());
    let agents = [
        ("translator", config.agents.translator.as_str()),
        ("memory", config.agents.memory.as_str()),
        ("search", config.agents.search.as_str()),
        ("synthesis", config.agents.synthesis.as_str()),
    ];

    let results = join_all(agents.iter().map(|(_, endpoint)| client.fetch_card(endpoint))).await;

    match format {
        OutputFormat::Text => {
            println!("Relay Downstream Agents");
            println!("=======================");
            println!();
            for ((role, endpoint), result) in agents.iter().zip(&results) {
                match result {
                    Ok(card) => println!(
                        "  {:<12} {:<40} reachable ({} v{})",
                        format!("{}:", role),
                        endpoint,
                        card.name,
                        card.version
                    ),
                    Err(e) => {
                        println!(
                            "  {:<12} {:<40} unreachable ({})",
                            format!("{}:", role),
                            endpoint,
                            e
                        );
                        println!("  {:<12} {}", "", e.user_hint());
                    }
                }
            }
            println!();

            let reachable = results.iter().filter(|r| r.is_ok()).count();
            if reachable == agents.len() {
                println!("✓ All agents reachable");
            } else {
                println!(
                    "⚠ {} of {} agents unreachable; the pipeline will degrade",
                    agents.len() - reachable,
                    agents.len()
                );
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "agents": agents.iter().zip(&results).map(|((role, endpoint), result)| {
                    match result {
                        Ok(card) => json!({
                            "role": role,
                            "endpoint": endpoint,
                            "reachable": true,
                            "name": card.name,
                            "version": card.version,
                        }),
                        Err(e) => json!({
                            "role": role,
                            "endpoint": endpoint,
                            "reachable": false,
                            "error": e.to_string(),
                            "hint": e.user_hint(),
                        }),
                    }
                }).collect::<Vec<_>>(),
                "healthy": results.iter().all(|r| r.is_ok()),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Print the effective configuration
pub fn handle_config_show(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let rendered =
                toml::to_string_pretty(config).context("Failed to serialize configuration")?;
            print!("{}", rendered);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
    }
    Ok(())
}

/// Print where configuration is read from
pub fn handle_config_path(path: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", path.display()),
        OutputFormat::Json => println!("{}", json!({ "path": path.display().to_string() })),
    }
    Ok(())
}
