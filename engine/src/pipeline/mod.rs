//! Query pipeline
//!
//! Detect/Translate -> Context -> Search -> Synthesis, with a fallback for
//! every stage. See [`Orchestrator`] for the entry point.

pub mod aggregator;
pub mod orchestrator;
pub mod stages;
pub mod state;

pub use aggregator::{FragmentKind, ResponseAggregator, INVALID_REQUEST_TEXT};
pub use orchestrator::{Handled, Orchestrator, PipelineOutcome, PipelineReport, StageTiming};
pub use stages::{StagePolicies, StageRequest, StageStatus};
pub use state::{PipelinePhase, PipelineState, Stage, StageError};
