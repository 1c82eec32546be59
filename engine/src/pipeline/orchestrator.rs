//! Pipeline Orchestrator
//!
//! Drives one inbound task through Detect/Translate, Context, Search and
//! Synthesis. Every stage failure is absorbed by the stage fallback, so a
//! structurally valid task always ends in `Completed`. Only a structurally
//! invalid task ends in `Rejected`.

use chrono::{DateTime, Utc};
use sdk::codec::{decode_inbound, InboundTask};
use sdk::{Rejected, Task, TaskResponse};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use super::aggregator::ResponseAggregator;
use super::stages::{dispatch, execute, StagePolicies, StageStatus};
use super::state::{PipelinePhase, PipelineState, Stage, StageError};
use crate::client::{AgentClient, AgentTransport};
use crate::config::Config;
use crate::language::{DetectedLanguage, LanguageDetector, WhatlangDetector};
use crate::telemetry::preview;

/// Timing of one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTiming {
    pub stage: Stage,
    pub status: StageStatus,
    pub elapsed_ms: u64,
}

/// Operator-facing record of one pipeline run
///
/// Never part of the response sent to the caller.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub state: PipelineState,
    pub phases: Vec<PipelinePhase>,
    pub timings: Vec<StageTiming>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl PipelineReport {
    fn start(state: PipelineState) -> Self {
        Self {
            state,
            phases: vec![PipelinePhase::Received],
            timings: Vec::new(),
            started_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    pub fn detected_language(&self) -> &DetectedLanguage {
        self.state.detected_language()
    }

    pub fn stage_errors(&self) -> &[StageError] {
        self.state.stage_errors()
    }

    /// Last phase reached
    pub fn final_phase(&self) -> PipelinePhase {
        self.phases.last().copied().unwrap_or(PipelinePhase::Received)
    }

    fn enter(&mut self, phase: PipelinePhase) {
        tracing::info!("Pipeline phase: {}", phase);
        self.phases.push(phase);
    }

    fn time(&mut self, stage: Stage, status: StageStatus, started: Instant) {
        self.timings.push(StageTiming {
            stage,
            status,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
    }
}

/// Result of running a valid task
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub response: TaskResponse,
    pub report: PipelineReport,
}

/// Result of handling a raw inbound task
#[derive(Debug, Clone)]
pub enum Handled {
    Completed(Box<PipelineOutcome>),
    Rejected(TaskResponse),
}

impl Handled {
    pub fn response(&self) -> &TaskResponse {
        match self {
            Handled::Completed(outcome) => &outcome.response,
            Handled::Rejected(response) => response,
        }
    }

    /// Terminal phase the task ended in
    pub fn final_phase(&self) -> PipelinePhase {
        match self {
            Handled::Completed(outcome) => outcome.report.final_phase(),
            Handled::Rejected(_) => PipelinePhase::Rejected,
        }
    }
}

/// Stateless pipeline driver, cheap to clone and safe to share
///
/// Holds no per-task state: every call to [`Orchestrator::run`] owns its own
/// [`PipelineState`].
#[derive(Clone)]
pub struct Orchestrator {
    transport: Arc<dyn AgentTransport>,
    detector: Arc<dyn LanguageDetector>,
    policies: StagePolicies,
    parallel_retrieval: bool,
}

impl Orchestrator {
    pub fn new(
        transport: Arc<dyn AgentTransport>,
        detector: Arc<dyn LanguageDetector>,
        config: &Config,
    ) -> Self {
        Self {
            transport,
            detector,
            policies: StagePolicies::new(&config.agents, &config.pipeline),
            parallel_retrieval: config.pipeline.parallel_retrieval,
        }
    }

    /// Orchestrator backed by the HTTP agent client and whatlang detection
    pub fn from_config(config: &Config) -> Self {
        let client = AgentClient::new(config.agents.timeout());
        Self::new(Arc::new(client), Arc::new(WhatlangDetector), config)
    }

    pub fn policies(&self) -> &StagePolicies {
        &self.policies
    }

    /// Decode and validate a raw request body, then run it
    pub async fn handle_bytes(&self, body: &[u8]) -> Handled {
        match decode_inbound(body) {
            Ok(inbound) => self.handle(inbound).await,
            Err(error) => {
                let rejected = Rejected {
                    id: Uuid::new_v4().to_string(),
                    error,
                };
                Self::reject(&rejected)
            }
        }
    }

    /// Validate an inbound task, then run it
    pub async fn handle(&self, inbound: InboundTask) -> Handled {
        match inbound.into_task(|| Uuid::new_v4().to_string()) {
            Ok(task) => Handled::Completed(Box::new(self.run(task).await)),
            Err(rejected) => Self::reject(&rejected),
        }
    }

    fn reject(rejected: &Rejected) -> Handled {
        tracing::warn!("Rejected task {}: {}", rejected.id, rejected.error);
        tracing::info!("Pipeline phase: {}", PipelinePhase::Rejected);
        Handled::Rejected(ResponseAggregator::reject(rejected))
    }

    /// Run a structurally valid task through every stage
    pub async fn run(&self, task: Task) -> PipelineOutcome {
        let span = tracing::info_span!("pipeline", task_id = %task.id);
        self.run_inner(task).instrument(span).await
    }

    async fn run_inner(&self, task: Task) -> PipelineOutcome {
        let query = task.message.text();
        tracing::info!("Received query: {}", preview(&query, 100));

        let started = Instant::now();
        let state = PipelineState::new(task.id.clone(), query, task.metadata.clone());
        let mut report = PipelineReport::start(state);

        self.run_stage(Stage::DetectAndTranslate, &mut report).await;

        if self.parallel_retrieval {
            self.run_retrieval_parallel(&mut report).await;
        } else {
            self.run_stage(Stage::ContextRetrieval, &mut report).await;
            self.run_stage(Stage::SearchRetrieval, &mut report).await;
        }

        self.run_stage(Stage::Synthesis, &mut report).await;

        let final_text = report
            .state
            .final_text()
            .unwrap_or(self.policies.apology())
            .to_string();
        let response = ResponseAggregator::assemble(&task, &final_text);

        report.enter(PipelinePhase::Completed);
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            "Pipeline completed in {}ms with {} degraded stage(s)",
            report.elapsed_ms,
            report.stage_errors().len()
        );

        PipelineOutcome { response, report }
    }

    async fn run_stage(&self, stage: Stage, report: &mut PipelineReport) {
        report.enter(stage.phase());
        let started = Instant::now();
        let status = execute(
            &self.policies,
            stage,
            &mut report.state,
            self.transport.as_ref(),
            self.detector.as_ref(),
        )
        .await;
        report.time(stage, status, started);
    }

    /// Context and Search concurrently; results are folded in pipeline order
    async fn run_retrieval_parallel(&self, report: &mut PipelineReport) {
        let detector = self.detector.as_ref();
        report.enter(PipelinePhase::ContextFetching);
        report.enter(PipelinePhase::SearchFetching);

        let context_req = self
            .policies
            .build_request(Stage::ContextRetrieval, &mut report.state, detector);
        let search_req = self
            .policies
            .build_request(Stage::SearchRetrieval, &mut report.state, detector);

        let started = Instant::now();
        let transport = self.transport.as_ref();
        let (context, search) = tokio::join!(
            async {
                match context_req {
                    Some(req) => Some((dispatch(transport, req).await, Instant::now())),
                    None => None,
                }
            },
            async {
                match search_req {
                    Some(req) => Some((dispatch(transport, req).await, Instant::now())),
                    None => None,
                }
            }
        );

        for (stage, result) in [
            (Stage::ContextRetrieval, context),
            (Stage::SearchRetrieval, search),
        ] {
            let (status, finished) = match result {
                Some((outcome, finished)) => {
                    (self.policies.fold(stage, &mut report.state, outcome), finished)
                }
                None => (StageStatus::Skipped, started),
            };
            report.timings.push(StageTiming {
                stage,
                status,
                elapsed_ms: finished.duration_since(started).as_millis() as u64,
            });
        }
    }
}
