//! Stage orchestration.
//!
//! Provides:
//! - Stage specifications with criticality and role tags
//! - A validating builder for orchestrators
//! - The sequential orchestrator with its criticality policy and source quorum
//! - The validation-retry and selection-with-fallback sub-protocols

mod builder;
mod failure;
mod orchestrator;
mod quorum;
mod selection;
mod spec;
mod validation;

pub use builder::OrchestratorBuilder;
pub use failure::{FailureCollector, FailureRecord};
pub use orchestrator::{ArtifactAssembler, StageOrchestrator};
pub use quorum::SourceQuorum;
pub use selection::{parse_verdict_index, select_with_fallback, Selection};
pub use spec::StageSpec;
pub use validation::{is_positive_verdict, validate_with_retry, Validated};
