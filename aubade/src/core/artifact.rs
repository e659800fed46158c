//! The finished output of one pipeline run.

use crate::pipeline::FailureRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Text, audio and references produced by an assembler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactBody {
    /// The composed greeting text.
    pub text: String,
    /// Rendered audio (WAV).
    pub audio: Vec<u8>,
    /// Auxiliary playlist references (stream URLs).
    pub references: Vec<String>,
}

/// The final artifact of a successful run.
///
/// Owned by the orchestrator until returned; delivery only borrows it.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    /// Identifier of the run that produced it.
    pub run_id: Uuid,
    /// When the run finished.
    pub created_at: DateTime<Utc>,
    /// The composed greeting text.
    pub text: String,
    /// Rendered audio (WAV).
    #[serde(skip)]
    pub audio: Vec<u8>,
    /// Auxiliary playlist references.
    pub references: Vec<String>,
    /// Stages that produced nothing.
    pub absent_sources: Vec<String>,
    /// Failures absorbed during the run.
    pub failures: Vec<FailureRecord>,
}

impl Artifact {
    /// Returns true if the named stage produced nothing.
    #[must_use]
    pub fn is_absent(&self, stage: &str) -> bool {
        self.absent_sources.iter().any(|s| s == stage)
    }

    /// Returns true if every stage produced data.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.absent_sources.is_empty()
    }
}
