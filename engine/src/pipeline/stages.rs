//! Stage policies
//!
//! Each [`Stage`] is described by two functions: one that builds the
//! downstream request from the current [`PipelineState`], and one that folds
//! the call outcome back into the state. The orchestrator drives every stage
//! through the same [`execute`] routine.
//!
//! | Stage              | Skip condition       | Fallback                  |
//! |--------------------|----------------------|---------------------------|
//! | DetectAndTranslate | language is English  | keep the original query   |
//! | ContextRetrieval   | never                | context absent            |
//! | SearchRetrieval    | never                | search absent             |
//! | Synthesis          | never                | fixed apology text        |

use sdk::{concat_parts, AgentCallError, ErrorKind, Metadata, Part};
use uuid::Uuid;

use super::aggregator::ResponseAggregator;
use super::state::{PipelineState, Stage};
use crate::client::AgentTransport;
use crate::config::{AgentsConfig, PipelineConfig};
use crate::language::LanguageDetector;
use crate::telemetry::preview;

/// Metadata key naming the agent that issued a context request
pub const CALLED_BY_KEY: &str = "called_by";

/// Metadata key carrying the inbound task id on a context request
pub const PARENT_TASK_KEY: &str = "parent_task_id";

/// A fully built downstream request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRequest {
    pub stage: Stage,
    pub endpoint: String,
    pub task_id: String,
    pub parts: Vec<Part>,
    pub metadata: Option<Metadata>,
}

/// How a stage ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// The stage had nothing to do
    Skipped,

    /// The agent answered with usable content
    Succeeded,

    /// The fallback was applied
    Degraded,
}

/// Static per-stage settings shared by every pipeline run
#[derive(Debug, Clone)]
pub struct StagePolicies {
    agents: AgentsConfig,
    error_prefixes: Vec<String>,
    apology: String,
    called_by: String,
}

impl StagePolicies {
    pub fn new(agents: &AgentsConfig, pipeline: &PipelineConfig) -> Self {
        Self {
            agents: agents.clone(),
            error_prefixes: pipeline.error_prefixes.clone(),
            apology: pipeline.apology.clone(),
            called_by: pipeline.called_by.clone(),
        }
    }

    pub fn apology(&self) -> &str {
        &self.apology
    }

    /// Endpoint of the agent behind a stage
    pub fn endpoint(&self, stage: Stage) -> &str {
        match stage {
            Stage::DetectAndTranslate => &self.agents.translator,
            Stage::ContextRetrieval => &self.agents.memory,
            Stage::SearchRetrieval => &self.agents.search,
            Stage::Synthesis => &self.agents.synthesis,
        }
    }

    /// Whether reply text is an error string in disguise
    ///
    /// Leading whitespace is ignored.
    pub fn is_error_text(&self, text: &str) -> bool {
        let trimmed = text.trim_start();
        self.error_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && trimmed.starts_with(prefix.as_str()))
    }

    /// Build the downstream request for a stage, or `None` when it is skipped
    ///
    /// Detection runs here: the detected language is recorded on the state
    /// before the skip decision is made.
    pub fn build_request(
        &self,
        stage: Stage,
        state: &mut PipelineState,
        detector: &dyn LanguageDetector,
    ) -> Option<StageRequest> {
        let (parts, metadata) = match stage {
            Stage::DetectAndTranslate => {
                let language = detector.detect(state.original_query());
                tracing::info!("Detected language: {}", language);
                let needs_translation = language.needs_translation();
                state.set_detected_language(language);
                if !needs_translation {
                    return None;
                }
                (vec![Part::text(state.original_query())], None)
            }
            Stage::ContextRetrieval => {
                let mut metadata = state.metadata().cloned().unwrap_or_default();
                metadata.insert(CALLED_BY_KEY.to_string(), self.called_by.clone());
                metadata.insert(PARENT_TASK_KEY.to_string(), state.task_id().to_string());
                (vec![Part::text(state.working_query())], Some(metadata))
            }
            Stage::SearchRetrieval => (vec![Part::text(state.working_query())], None),
            Stage::Synthesis => (
                ResponseAggregator::synthesis_parts(
                    state.working_query(),
                    state.context_fragment(),
                    state.search_fragment(),
                ),
                None,
            ),
        };

        Some(StageRequest {
            stage,
            endpoint: self.endpoint(stage).to_string(),
            task_id: Uuid::new_v4().to_string(),
            parts,
            metadata,
        })
    }

    /// Fold a call outcome into the state, applying the stage fallback on
    /// any failure
    pub fn fold(
        &self,
        stage: Stage,
        state: &mut PipelineState,
        outcome: Result<Vec<Part>, AgentCallError>,
    ) -> StageStatus {
        let text = match outcome {
            Ok(parts) => concat_parts(&parts),
            Err(e) => {
                state.record_error(stage, e.kind(), e.to_string());
                self.apply_fallback(stage, state);
                return StageStatus::Degraded;
            }
        };

        if self.is_error_text(&text) {
            state.record_error(stage, ErrorKind::ErrorPrefixedContent, preview(text.trim(), 100));
            self.apply_fallback(stage, state);
            return StageStatus::Degraded;
        }

        match stage {
            Stage::DetectAndTranslate => {
                let translated = text.trim();
                if translated.is_empty() {
                    state.record_error(stage, ErrorKind::BlankContent, "empty translation");
                    return StageStatus::Degraded;
                }
                tracing::info!("Translated query: {}", preview(translated, 100));
                state.set_translation(translated.to_string());
            }
            Stage::ContextRetrieval => {
                // An empty memory answer just means there is no history yet
                if !text.trim().is_empty() {
                    state.set_context_fragment(text);
                }
            }
            Stage::SearchRetrieval => {
                if !text.trim().is_empty() {
                    state.set_search_fragment(text);
                }
            }
            Stage::Synthesis => {
                if text.trim().is_empty() {
                    state.record_error(stage, ErrorKind::BlankContent, "empty synthesis reply");
                    self.apply_fallback(stage, state);
                    return StageStatus::Degraded;
                }
                state.set_final_text(text);
            }
        }
        StageStatus::Succeeded
    }

    fn apply_fallback(&self, stage: Stage, state: &mut PipelineState) {
        match stage {
            // Working query stays as-is; fragments stay absent
            Stage::DetectAndTranslate | Stage::ContextRetrieval | Stage::SearchRetrieval => {}
            Stage::Synthesis => state.set_final_text(self.apology.clone()),
        }
    }
}

/// Send a built request through the transport
pub async fn dispatch(
    transport: &dyn AgentTransport,
    request: StageRequest,
) -> Result<Vec<Part>, AgentCallError> {
    tracing::debug!(
        "Stage {} -> {} (task {})",
        request.stage,
        request.endpoint,
        request.task_id
    );
    transport
        .call(&request.endpoint, request.parts, &request.task_id, request.metadata)
        .await
}

/// Run one stage end to end: build, call, fold
pub async fn execute(
    policies: &StagePolicies,
    stage: Stage,
    state: &mut PipelineState,
    transport: &dyn AgentTransport,
    detector: &dyn LanguageDetector,
) -> StageStatus {
    match policies.build_request(stage, state, detector) {
        Some(request) => {
            let outcome = dispatch(transport, request).await;
            policies.fold(stage, state, outcome)
        }
        None => {
            tracing::debug!("Stage {} skipped", stage);
            StageStatus::Skipped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::language::{DetectedLanguage, FixedDetector};
    use std::time::Duration;

    fn policies() -> StagePolicies {
        let config = Config::default();
        StagePolicies::new(&config.agents, &config.pipeline)
    }

    fn english() -> FixedDetector {
        FixedDetector(DetectedLanguage::Code("eng".into()))
    }

    #[test]
    fn test_error_prefix_ignores_leading_whitespace() {
        let policies = policies();
        assert!(policies.is_error_text("Error: agent down"));
        assert!(policies.is_error_text("  \nError occurred"));
        assert!(!policies.is_error_text("No errors here"));
        assert!(!policies.is_error_text(""));
    }

    #[test]
    fn test_translation_skipped_for_english() {
        let policies = policies();
        let mut state = PipelineState::new("t1", "What is the weather?", None);
        let request = policies.build_request(Stage::DetectAndTranslate, &mut state, &english());
        assert!(request.is_none());
        assert_eq!(state.detected_language(), &DetectedLanguage::Code("eng".into()));
    }

    #[test]
    fn test_translation_skipped_for_unknown() {
        let policies = policies();
        let mut state = PipelineState::new("t1", "???", None);
        let detector = FixedDetector(DetectedLanguage::Unknown);
        assert!(policies
            .build_request(Stage::DetectAndTranslate, &mut state, &detector)
            .is_none());
    }

    #[test]
    fn test_context_request_carries_caller_metadata() {
        let policies = policies();
        let mut inbound = Metadata::new();
        inbound.insert("session".into(), "abc".into());
        let mut state = PipelineState::new("inbound-1", "q", Some(inbound));

        let request = policies
            .build_request(Stage::ContextRetrieval, &mut state, &english())
            .expect("context is never skipped");
        let metadata = request.metadata.expect("context sends metadata");

        assert_eq!(metadata.get("session").map(String::as_str), Some("abc"));
        assert_eq!(metadata.get(CALLED_BY_KEY).map(String::as_str), Some("RouterAgent"));
        assert_eq!(metadata.get(PARENT_TASK_KEY).map(String::as_str), Some("inbound-1"));
        assert_ne!(request.task_id, "inbound-1");
    }

    #[test]
    fn test_search_request_has_no_metadata() {
        let policies = policies();
        let mut state = PipelineState::new("t", "q", None);
        let request = policies
            .build_request(Stage::SearchRetrieval, &mut state, &english())
            .expect("search is never skipped");
        assert!(request.metadata.is_none());
        assert_eq!(request.parts, vec![Part::text("q")]);
    }

    #[test]
    fn test_failed_translation_keeps_original_query() {
        let policies = policies();
        let mut state = PipelineState::new("t", "Bonjour", None);
        let status = policies.fold(
            Stage::DetectAndTranslate,
            &mut state,
            Err(AgentCallError::ConnectionFailed("refused".into())),
        );
        assert_eq!(status, StageStatus::Degraded);
        assert_eq!(state.working_query(), "Bonjour");
        assert_eq!(state.stage_errors()[0].kind, ErrorKind::ConnectionFailed);
    }

    #[test]
    fn test_error_prefixed_translation_keeps_original_query() {
        let policies = policies();
        let mut state = PipelineState::new("t", "Bonjour", None);
        policies.fold(
            Stage::DetectAndTranslate,
            &mut state,
            Ok(vec![Part::text("Error: model unavailable")]),
        );
        assert_eq!(state.working_query(), "Bonjour");
        assert_eq!(state.stage_errors()[0].kind, ErrorKind::ErrorPrefixedContent);
    }

    #[test]
    fn test_successful_translation_replaces_working_query() {
        let policies = policies();
        let mut state = PipelineState::new("t", "Bonjour", None);
        let status = policies.fold(
            Stage::DetectAndTranslate,
            &mut state,
            Ok(vec![Part::text(" Hello \n")]),
        );
        assert_eq!(status, StageStatus::Succeeded);
        assert_eq!(state.working_query(), "Hello");
        assert_eq!(state.original_query(), "Bonjour");
    }

    #[test]
    fn test_error_prefixed_context_is_absent() {
        let policies = policies();
        let mut state = PipelineState::new("t", "q", None);
        policies.fold(
            Stage::ContextRetrieval,
            &mut state,
            Ok(vec![Part::text("Error retrieving context")]),
        );
        assert!(state.context_fragment().is_none());
        assert!(state.stage_failed(Stage::ContextRetrieval));
    }

    #[test]
    fn test_empty_messages_and_timeout_leave_same_fragments() {
        let policies = policies();
        let mut empty = PipelineState::new("t", "q", None);
        let mut timed_out = PipelineState::new("t", "q", None);

        policies.fold(Stage::SearchRetrieval, &mut empty, Err(AgentCallError::EmptyMessages));
        policies.fold(
            Stage::SearchRetrieval,
            &mut timed_out,
            Err(AgentCallError::Timeout(Duration::from_secs(30))),
        );

        assert_eq!(empty.search_fragment(), timed_out.search_fragment());
        assert_eq!(empty.working_query(), timed_out.working_query());
        assert_eq!(empty.stage_errors()[0].kind, ErrorKind::EmptyMessages);
        assert_eq!(timed_out.stage_errors()[0].kind, ErrorKind::Timeout);
    }

    #[test]
    fn test_blank_translation_is_not_empty_messages() {
        let policies = policies();
        let mut state = PipelineState::new("t", "Bonjour", None);
        let status = policies.fold(
            Stage::DetectAndTranslate,
            &mut state,
            Ok(vec![Part::text("  \n")]),
        );
        assert_eq!(status, StageStatus::Degraded);
        assert_eq!(state.working_query(), "Bonjour");
        assert_eq!(state.stage_errors()[0].kind, ErrorKind::BlankContent);
    }

    #[test]
    fn test_blank_synthesis_yields_apology() {
        let policies = policies();
        let mut blank = PipelineState::new("t", "q", None);
        let mut no_messages = PipelineState::new("t", "q", None);

        policies.fold(Stage::Synthesis, &mut blank, Ok(vec![Part::text(" ")]));
        policies.fold(Stage::Synthesis, &mut no_messages, Err(AgentCallError::EmptyMessages));

        assert_eq!(blank.final_text(), Some(policies.apology()));
        assert_eq!(no_messages.final_text(), Some(policies.apology()));
        assert_eq!(blank.stage_errors()[0].kind, ErrorKind::BlankContent);
        assert_eq!(no_messages.stage_errors()[0].kind, ErrorKind::EmptyMessages);
    }

    #[test]
    fn test_synthesis_failure_yields_apology() {
        let policies = policies();
        let mut state = PipelineState::new("t", "q", None);
        policies.fold(
            Stage::Synthesis,
            &mut state,
            Err(AgentCallError::NonSuccessStatus(500)),
        );
        assert_eq!(state.final_text(), Some(policies.apology()));
    }

    #[test]
    fn test_multi_part_reply_is_concatenated() {
        let policies = policies();
        let mut state = PipelineState::new("t", "q", None);
        policies.fold(
            Stage::Synthesis,
            &mut state,
            Ok(vec![Part::text("Sunny, "), Part::text("22C")]),
        );
        assert_eq!(state.final_text(), Some("Sunny, 22C"));
    }
}
