//! Pipeline state types
//!
//! A [`PipelineState`] is created when a task enters the orchestrator and
//! dropped when the response leaves it. It is owned by exactly one pipeline
//! run and never shared.

use sdk::{ErrorKind, Metadata};
use std::fmt;

use crate::language::DetectedLanguage;

/// One step of the fixed pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    DetectAndTranslate,
    ContextRetrieval,
    SearchRetrieval,
    Synthesis,
}

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Stage; 4] = [
        Stage::DetectAndTranslate,
        Stage::ContextRetrieval,
        Stage::SearchRetrieval,
        Stage::Synthesis,
    ];

    /// Short stable name used in logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            Stage::DetectAndTranslate => "translate",
            Stage::ContextRetrieval => "context",
            Stage::SearchRetrieval => "search",
            Stage::Synthesis => "synthesis",
        }
    }

    /// Phase the orchestrator is in while running this stage
    pub fn phase(&self) -> PipelinePhase {
        match self {
            Stage::DetectAndTranslate => PipelinePhase::Detecting,
            Stage::ContextRetrieval => PipelinePhase::ContextFetching,
            Stage::SearchRetrieval => PipelinePhase::SearchFetching,
            Stage::Synthesis => PipelinePhase::Synthesizing,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Orchestrator state machine
///
/// `Received -> Detecting -> ContextFetching -> SearchFetching ->
/// Synthesizing -> Completed`, or `Received -> Rejected` for a
/// structurally invalid task. No transition goes backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelinePhase {
    Received,
    Detecting,
    ContextFetching,
    SearchFetching,
    Synthesizing,
    Completed,
    Rejected,
}

impl PipelinePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelinePhase::Completed | PipelinePhase::Rejected)
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelinePhase::Received => "received",
            PipelinePhase::Detecting => "detecting",
            PipelinePhase::ContextFetching => "context_fetching",
            PipelinePhase::SearchFetching => "search_fetching",
            PipelinePhase::Synthesizing => "synthesizing",
            PipelinePhase::Completed => "completed",
            PipelinePhase::Rejected => "rejected",
        };
        write!(f, "{}", name)
    }
}

/// A stage failure absorbed by the pipeline
///
/// Kept for operators; never shown verbatim to the end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub detail: String,
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.kind, self.detail)
    }
}

/// State threaded through the stages of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineState {
    task_id: String,
    metadata: Option<Metadata>,
    original_query: String,
    working_query: String,
    detected_language: DetectedLanguage,
    context_fragment: Option<String>,
    search_fragment: Option<String>,
    final_text: Option<String>,
    stage_errors: Vec<StageError>,
}

impl PipelineState {
    /// Start a run for the given query
    pub fn new(task_id: impl Into<String>, query: impl Into<String>, metadata: Option<Metadata>) -> Self {
        let query = query.into();
        Self {
            task_id: task_id.into(),
            metadata,
            working_query: query.clone(),
            original_query: query,
            detected_language: DetectedLanguage::Unknown,
            context_fragment: None,
            search_fragment: None,
            final_text: None,
            stage_errors: Vec::new(),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn original_query(&self) -> &str {
        &self.original_query
    }

    pub fn working_query(&self) -> &str {
        &self.working_query
    }

    pub fn detected_language(&self) -> &DetectedLanguage {
        &self.detected_language
    }

    pub fn context_fragment(&self) -> Option<&str> {
        self.context_fragment.as_deref()
    }

    pub fn search_fragment(&self) -> Option<&str> {
        self.search_fragment.as_deref()
    }

    pub fn final_text(&self) -> Option<&str> {
        self.final_text.as_deref()
    }

    pub fn stage_errors(&self) -> &[StageError] {
        &self.stage_errors
    }

    /// Whether the given stage recorded a failure
    pub fn stage_failed(&self, stage: Stage) -> bool {
        self.stage_errors.iter().any(|e| e.stage == stage)
    }

    pub(crate) fn set_detected_language(&mut self, language: DetectedLanguage) {
        self.detected_language = language;
    }

    /// Replace the working query with a successful translation
    pub(crate) fn set_translation(&mut self, translated: String) {
        self.working_query = translated;
    }

    /// Populate the context fragment; a populated fragment is never replaced
    pub(crate) fn set_context_fragment(&mut self, fragment: String) {
        self.context_fragment.get_or_insert(fragment);
    }

    /// Populate the search fragment; a populated fragment is never replaced
    pub(crate) fn set_search_fragment(&mut self, fragment: String) {
        self.search_fragment.get_or_insert(fragment);
    }

    pub(crate) fn set_final_text(&mut self, text: String) {
        self.final_text = Some(text);
    }

    pub(crate) fn record_error(&mut self, stage: Stage, kind: ErrorKind, detail: impl Into<String>) {
        let error = StageError {
            stage,
            kind,
            detail: detail.into(),
        };
        tracing::warn!("Stage degraded {}", error);
        self.stage_errors.push(error);
    }
}
