//! Trace entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What a trace entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    /// A run began.
    RunStarted,
    /// A stage attempt began.
    StageStarted,
    /// A stage produced data.
    StageOk,
    /// A stage produced nothing acceptable.
    StageAbsent,
    /// A stage failed.
    StageFailed,
    /// A stage failed and will be attempted again.
    StageRetry,
    /// A prompt and its response.
    Exchange,
    /// A run produced an artifact.
    RunCompleted,
    /// A run aborted.
    RunAborted,
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RunStarted => "run.started",
            Self::StageStarted => "stage.started",
            Self::StageOk => "stage.ok",
            Self::StageAbsent => "stage.absent",
            Self::StageFailed => "stage.failed",
            Self::StageRetry => "stage.retry",
            Self::Exchange => "exchange",
            Self::RunCompleted => "run.completed",
            Self::RunAborted => "run.aborted",
        };
        f.write_str(s)
    }
}

/// One line of the trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// The run the entry belongs to.
    pub run_id: Uuid,
    /// The stage involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// What happened.
    pub kind: TraceKind,
    /// Details.
    #[serde(default)]
    pub body: serde_json::Value,
}

impl TraceEntry {
    /// Creates a run-level entry.
    #[must_use]
    pub fn run(run_id: Uuid, kind: TraceKind, body: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            run_id,
            stage: None,
            kind,
            body,
        }
    }

    /// Creates a stage-level entry.
    #[must_use]
    pub fn stage(
        run_id: Uuid,
        stage: impl Into<String>,
        kind: TraceKind,
        body: serde_json::Value,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            run_id,
            stage: Some(stage.into()),
            kind,
            body,
        }
    }
}
