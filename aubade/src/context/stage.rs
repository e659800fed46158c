//! Context handed to a stage for one attempt.

use super::StageInputs;
use crate::trace::{TraceEntry, TraceKind, TraceSink};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Execution context for a single stage attempt.
#[derive(Clone)]
pub struct StageContext {
    run_id: Uuid,
    stage_name: String,
    attempt: usize,
    inputs: StageInputs,
    trace: Arc<dyn TraceSink>,
}

impl fmt::Debug for StageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageContext")
            .field("run_id", &self.run_id)
            .field("stage_name", &self.stage_name)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(
        run_id: Uuid,
        stage_name: impl Into<String>,
        attempt: usize,
        inputs: StageInputs,
        trace: Arc<dyn TraceSink>,
    ) -> Self {
        Self {
            run_id,
            stage_name: stage_name.into(),
            attempt,
            inputs,
            trace,
        }
    }

    /// Returns the run identifier.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Returns the 1-based attempt number.
    #[must_use]
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Returns the inputs from earlier stages.
    #[must_use]
    pub fn inputs(&self) -> &StageInputs {
        &self.inputs
    }

    /// Records a prompt/response pair to the run trace.
    pub fn record_exchange(&self, label: &str, prompt: &str, response: &str) {
        self.trace.record(&TraceEntry::stage(
            self.run_id,
            &self.stage_name,
            TraceKind::Exchange,
            json!({
                "label": label,
                "attempt": self.attempt,
                "prompt": prompt,
                "response": response,
            }),
        ));
    }

    /// Records arbitrary stage input/output details to the run trace.
    pub fn record_data(&self, label: &str, data: serde_json::Value) {
        self.trace.record(&TraceEntry::stage(
            self.run_id,
            &self.stage_name,
            TraceKind::Exchange,
            json!({
                "label": label,
                "attempt": self.attempt,
                "data": data,
            }),
        ));
    }
}
