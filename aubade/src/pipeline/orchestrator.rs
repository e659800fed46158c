//! Sequential stage orchestrator.

use super::{FailureCollector, FailureRecord, SourceQuorum, StageSpec};
use crate::context::{StageContext, StageInputs};
use crate::core::{Artifact, ArtifactBody, Criticality, StageData, StageOutput, StageRole, StageStatus};
use crate::errors::PipelineAborted;
use crate::observability::SpanTimer;
use crate::trace::{TraceEntry, TraceKind, TraceSink};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Builds the final artifact from the outputs of the stages that produced data.
pub trait ArtifactAssembler: Send + Sync {
    /// Assembles the artifact body.
    ///
    /// Stages that produced nothing are missing from `outputs`.
    fn assemble(&self, outputs: &HashMap<String, StageData>) -> Result<ArtifactBody, String>;
}

/// Runs stages strictly in order and applies the criticality policy.
///
/// - A critical stage that fails or reports absence aborts the run.
/// - A semi-critical stage that fails is logged as an error and treated as absent.
/// - An optional stage that fails is logged at info level and treated as absent.
/// - Retryable failures are re-run up to the stage's attempt bound.
///
/// Before the first transform stage (or at the end, if there is none) the
/// source quorum decides whether enough material exists to continue.
pub struct StageOrchestrator {
    name: String,
    stages: Vec<StageSpec>,
    quorum: SourceQuorum,
    trace: Arc<dyn TraceSink>,
    assembler: Arc<dyn ArtifactAssembler>,
}

impl fmt::Debug for StageOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageOrchestrator")
            .field("name", &self.name)
            .field("stages", &self.stages.iter().map(|s| &s.name).collect::<Vec<_>>())
            .field("quorum", &self.quorum)
            .finish_non_exhaustive()
    }
}

/// Per-run bookkeeping.
struct RunState {
    run_id: Uuid,
    outputs: HashMap<String, StageData>,
    present_sources: Vec<Criticality>,
    failures: FailureCollector,
    quorum_checked: bool,
}

impl StageOrchestrator {
    pub(crate) fn new(
        name: String,
        stages: Vec<StageSpec>,
        quorum: SourceQuorum,
        trace: Arc<dyn TraceSink>,
        assembler: Arc<dyn ArtifactAssembler>,
    ) -> Self {
        Self {
            name,
            stages,
            quorum,
            trace,
            assembler,
        }
    }

    /// Returns the orchestrator name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs every stage and assembles the artifact.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineAborted`] when a critical stage produces nothing, the
    /// source quorum is not met, or assembly fails. No artifact exists then.
    pub async fn run(&self) -> Result<Artifact, PipelineAborted> {
        let mut state = RunState {
            run_id: Uuid::new_v4(),
            outputs: HashMap::new(),
            present_sources: Vec::new(),
            failures: FailureCollector::new(),
            quorum_checked: false,
        };

        info!(pipeline = %self.name, run_id = %state.run_id, stages = self.stages.len(), "Pipeline started");
        self.trace.record(&TraceEntry::run(
            state.run_id,
            TraceKind::RunStarted,
            json!({
                "pipeline": self.name,
                "stages": self.stages.iter().map(|s| &s.name).collect::<Vec<_>>(),
            }),
        ));

        match self.run_stages(&mut state).await {
            Ok(artifact) => {
                info!(
                    pipeline = %self.name,
                    run_id = %state.run_id,
                    absent = ?artifact.absent_sources,
                    "Pipeline completed"
                );
                self.trace.record(&TraceEntry::run(
                    state.run_id,
                    TraceKind::RunCompleted,
                    json!({
                        "absent_sources": artifact.absent_sources,
                        "references": artifact.references.len(),
                        "audio_bytes": artifact.audio.len(),
                    }),
                ));
                Ok(artifact)
            }
            Err(aborted) => {
                error!(pipeline = %self.name, run_id = %state.run_id, error = %aborted, "Pipeline aborted");
                self.trace.record(&TraceEntry::run(
                    state.run_id,
                    TraceKind::RunAborted,
                    json!(aborted.to_dict()),
                ));
                Err(aborted)
            }
        }
    }

    async fn run_stages(&self, state: &mut RunState) -> Result<Artifact, PipelineAborted> {
        for spec in &self.stages {
            if spec.role == StageRole::Transform && !state.quorum_checked {
                self.check_quorum(state, Some(&spec.name))?;
            }

            let (output, attempts) = self.execute_stage(state, spec).await;

            if output.is_ok() {
                if spec.role == StageRole::Source {
                    state.present_sources.push(spec.criticality);
                }
                state
                    .outputs
                    .insert(spec.name.clone(), output.data.unwrap_or_default());
                continue;
            }

            let cause = output.cause().unwrap_or("no output").to_string();
            if spec.criticality.aborts_on_failure() {
                return Err(PipelineAborted::critical(&spec.name, cause));
            }

            self.absorb(state, spec, &output, cause, attempts);
        }

        if !state.quorum_checked {
            self.check_quorum(state, None)?;
        }

        let body = self
            .assembler
            .assemble(&state.outputs)
            .map_err(PipelineAborted::assembly)?;

        let failures = std::mem::take(&mut state.failures);
        Ok(Artifact {
            run_id: state.run_id,
            created_at: Utc::now(),
            text: body.text,
            audio: body.audio,
            references: body.references,
            absent_sources: failures.absent_stages(),
            failures: failures.into_records(),
        })
    }

    /// Runs one stage, repeating retryable failures up to its attempt bound.
    async fn execute_stage(&self, state: &RunState, spec: &StageSpec) -> (StageOutput, usize) {
        let inputs = StageInputs::new(
            state.outputs.clone(),
            spec.dependencies.clone(),
            &spec.name,
            true,
        );

        let mut attempt = 1;
        loop {
            self.trace.record(&TraceEntry::stage(
                state.run_id,
                &spec.name,
                TraceKind::StageStarted,
                json!({"attempt": attempt, "criticality": spec.criticality, "role": spec.role}),
            ));

            let ctx = StageContext::new(
                state.run_id,
                &spec.name,
                attempt,
                inputs.clone(),
                Arc::clone(&self.trace),
            );
            let timer = SpanTimer::start(&spec.name);
            let output = spec.runner.execute(&ctx).await;
            let duration_ms = timer.finish();

            if output.is_fail() && output.retryable && attempt < spec.max_attempts {
                debug!(
                    stage = %spec.name,
                    attempt,
                    max_attempts = spec.max_attempts,
                    error = output.cause().unwrap_or_default(),
                    "Retrying stage after retryable failure"
                );
                self.trace.record(&TraceEntry::stage(
                    state.run_id,
                    &spec.name,
                    TraceKind::StageRetry,
                    json!({"attempt": attempt, "error": output.error, "duration_ms": duration_ms}),
                ));
                attempt += 1;
                continue;
            }

            let kind = match output.status {
                StageStatus::Ok => TraceKind::StageOk,
                StageStatus::Absent => TraceKind::StageAbsent,
                StageStatus::Fail => TraceKind::StageFailed,
            };
            self.trace.record(&TraceEntry::stage(
                state.run_id,
                &spec.name,
                kind,
                json!({"attempt": attempt, "duration_ms": duration_ms, "output": output}),
            ));
            debug!(stage = %spec.name, status = %output.status, attempt, duration_ms, "Stage finished");

            return (output, attempt);
        }
    }

    /// Records a non-critical stage that produced nothing.
    fn absorb(
        &self,
        state: &mut RunState,
        spec: &StageSpec,
        output: &StageOutput,
        cause: String,
        attempts: usize,
    ) {
        let failed = output.is_fail();
        match (spec.criticality, failed) {
            (Criticality::SemiCritical, true) => {
                error!(stage = %spec.name, attempts, error = %cause, "Semi-critical stage failed, continuing without it");
            }
            (Criticality::SemiCritical, false) => {
                warn!(stage = %spec.name, attempts, reason = %cause, "Semi-critical stage produced nothing, continuing without it");
            }
            _ => {
                info!(stage = %spec.name, attempts, reason = %cause, "Optional stage unavailable, continuing without it");
            }
        }

        let mut record = FailureRecord::new(&spec.name, spec.criticality, cause).with_attempts(attempts);
        if !failed {
            record = record.absent();
        }
        state.failures.record(record);
    }

    fn check_quorum(&self, state: &mut RunState, before: Option<&str>) -> Result<(), PipelineAborted> {
        state.quorum_checked = true;
        self.quorum.check(&state.present_sources).map_err(|reason| {
            warn!(
                present = state.present_sources.len(),
                min_sources = self.quorum.min_sources,
                "Source quorum not met"
            );
            PipelineAborted::quorum(reason, before.map(str::to_string))
        })
    }
}
