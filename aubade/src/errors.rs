//! Error types for aubade.
//!
//! Generation, delivery, scheduling and playback each have a dedicated error
//! type; [`AubadeError`] wraps all of them for callers that do not care which
//! half of the system failed.

use crate::core::Criticality;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience result alias.
pub type Result<T, E = AubadeError> = std::result::Result<T, E>;

/// The main error type for aubade operations.
#[derive(Debug, Error)]
pub enum AubadeError {
    /// A generation stage failed.
    #[error("{0}")]
    Stage(#[from] StageFailure),

    /// The generation pipeline aborted.
    #[error("{0}")]
    Aborted(#[from] PipelineAborted),

    /// A pipeline definition was rejected.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A stage read an output it did not declare.
    #[error("{0}")]
    UndeclaredDependency(#[from] UndeclaredDependencyError),

    /// A free-form judgment could not be parsed.
    #[error("{0}")]
    Parse(#[from] ParseFailure),

    /// The artifact could not be delivered.
    #[error("{0}")]
    Delivery(#[from] DeliveryFailed),

    /// The persisted schedule is unreadable.
    #[error("{0}")]
    ScheduleCorrupt(#[from] ScheduleCorrupt),

    /// The playback device failed.
    #[error("{0}")]
    Playback(#[from] PlaybackFailure),

    /// A delivery was rejected before anything was stored.
    #[error("Invalid delivery: {0}")]
    InvalidDelivery(String),

    /// Sunrise could not be computed.
    #[error("Sunrise calculation failed: {0}")]
    Sunrise(String),

    /// An external collaborator returned something unusable.
    #[error("{service} error: {message}")]
    Collaborator {
        /// The collaborator that failed (e.g. "ollama").
        service: String,
        /// What went wrong.
        message: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AubadeError {
    /// Creates a collaborator error.
    #[must_use]
    pub fn collaborator(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Collaborator { .. } | Self::Io(_) => true,
            _ => false,
        }
    }
}

/// A failed generation stage.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("Stage '{stage}' ({criticality}) failed: {message}")]
pub struct StageFailure {
    /// The stage that failed.
    pub stage: String,
    /// Criticality of the stage.
    pub criticality: Criticality,
    /// The error message.
    pub message: String,
    /// Whether the failure was marked retryable.
    pub retryable: bool,
}

impl StageFailure {
    /// Creates a new stage failure.
    #[must_use]
    pub fn new(stage: impl Into<String>, criticality: Criticality, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            criticality,
            message: message.into(),
            retryable: false,
        }
    }

    /// Marks the failure as retryable.
    #[must_use]
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

/// Why a pipeline run was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// A critical stage failed or produced nothing.
    CriticalStageFailed,
    /// Too few sources produced data.
    InsufficientSources {
        /// Sources that produced data.
        present: usize,
        /// Sources required.
        required: usize,
    },
    /// No non-optional source produced data.
    NoRequiredSource,
    /// The final artifact could not be assembled.
    Assembly,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CriticalStageFailed => write!(f, "critical stage failed"),
            Self::InsufficientSources { present, required } => {
                write!(f, "{present} of {required} required sources present")
            }
            Self::NoRequiredSource => write!(f, "no non-optional source produced data"),
            Self::Assembly => write!(f, "artifact assembly failed"),
        }
    }
}

/// Error returned when a pipeline run produces no artifact.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub struct PipelineAborted {
    /// The stage that caused the abort, if any.
    pub stage: Option<String>,
    /// Why the run aborted.
    pub reason: AbortReason,
    /// The underlying cause.
    pub cause: String,
}

impl fmt::Display for PipelineAborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stage {
            Some(stage) => write!(f, "Pipeline aborted at '{stage}' ({}): {}", self.reason, self.cause),
            None => write!(f, "Pipeline aborted ({}): {}", self.reason, self.cause),
        }
    }
}

impl PipelineAborted {
    /// Abort caused by a critical stage.
    #[must_use]
    pub fn critical(stage: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            stage: Some(stage.into()),
            reason: AbortReason::CriticalStageFailed,
            cause: cause.into(),
        }
    }

    /// Abort caused by the source quorum.
    #[must_use]
    pub fn quorum(reason: AbortReason, before_stage: Option<String>) -> Self {
        Self {
            cause: format!("source quorum not met: {reason}"),
            stage: before_stage,
            reason,
        }
    }

    /// Abort caused by artifact assembly.
    #[must_use]
    pub fn assembly(cause: impl Into<String>) -> Self {
        Self {
            stage: None,
            reason: AbortReason::Assembly,
            cause: cause.into(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("stage".to_string(), serde_json::json!(self.stage));
        map.insert(
            "reason".to_string(),
            serde_json::to_value(&self.reason).unwrap_or(serde_json::Value::Null),
        );
        map.insert("cause".to_string(), serde_json::Value::String(self.cause.clone()));
        map
    }
}

/// Error raised when a pipeline definition is invalid.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// Short machine-readable code (e.g. "MISSING_DEP").
    pub code: &'static str,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }
}

/// Error raised when a stage accesses an undeclared dependency.
#[derive(Debug, Clone, Error)]
#[error("Stage '{stage}' attempted to access undeclared dependency '{key}'")]
pub struct UndeclaredDependencyError {
    /// The stage attempting access.
    pub stage: String,
    /// The undeclared key.
    pub key: String,
}

impl UndeclaredDependencyError {
    /// Creates a new undeclared dependency error.
    #[must_use]
    pub fn new(stage: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            key: key.into(),
        }
    }
}

/// A judgment whose verdict could not be read. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not parse verdict: {message}")]
pub struct ParseFailure {
    /// What went wrong.
    pub message: String,
}

impl ParseFailure {
    /// Creates a new parse failure.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Whether a failed delivery might have succeeded with more attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryFailureKind {
    /// Every attempt hit a retryable error.
    Exhausted,
    /// The endpoint rejected the request; it was not retried.
    Rejected,
}

/// Terminal delivery failure.
#[derive(Debug, Clone, Error)]
#[error("Delivery failed after {attempts} attempt(s) ({kind:?}): {last_error}")]
pub struct DeliveryFailed {
    /// Attempts made.
    pub attempts: usize,
    /// The last error observed.
    pub last_error: String,
    /// Retryable-and-exhausted or rejected outright.
    pub kind: DeliveryFailureKind,
}

impl DeliveryFailed {
    /// Returns true if the failure was a rejection that was never retried.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.kind == DeliveryFailureKind::Rejected
    }
}

/// The persisted schedule exists but cannot be read as an instant.
#[derive(Debug, Clone, Error)]
#[error("Schedule record at {} is corrupt: {reason}", path.display())]
pub struct ScheduleCorrupt {
    /// Location of the record.
    pub path: PathBuf,
    /// Why it could not be parsed.
    pub reason: String,
}

/// The playback device could not play something.
#[derive(Debug, Clone, Error)]
#[error("Playback of {target} failed: {message}")]
pub struct PlaybackFailure {
    /// What was being played or controlled.
    pub target: String,
    /// What went wrong.
    pub message: String,
}

impl PlaybackFailure {
    /// Creates a new playback failure.
    #[must_use]
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
        }
    }
}
