//! Orchestrator builder with validation.

use super::{ArtifactAssembler, SourceQuorum, StageOrchestrator, StageSpec};
use crate::errors::PipelineValidationError;
use crate::trace::{NoOpTraceSink, TraceSink};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Builder for creating validated orchestrators.
///
/// Stages run in the order they are added, so every dependency must name a
/// stage that was added earlier. This rules out cycles by construction.
pub struct OrchestratorBuilder {
    name: String,
    stages: Vec<StageSpec>,
    quorum: SourceQuorum,
    trace: Arc<dyn TraceSink>,
    assembler: Option<Arc<dyn ArtifactAssembler>>,
}

impl fmt::Debug for OrchestratorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorBuilder")
            .field("name", &self.name)
            .field("stages", &self.stage_names())
            .field("quorum", &self.quorum)
            .finish_non_exhaustive()
    }
}

impl OrchestratorBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            quorum: SourceQuorum::default(),
            trace: Arc::new(NoOpTraceSink),
            assembler: None,
        }
    }

    /// Appends a stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec is invalid, the name is taken, or a
    /// dependency does not name an earlier stage.
    pub fn stage(mut self, spec: StageSpec) -> Result<Self, PipelineValidationError> {
        self.add_stage(spec)?;
        Ok(self)
    }

    /// Appends a stage in place.
    pub fn add_stage(&mut self, spec: StageSpec) -> Result<(), PipelineValidationError> {
        spec.validate()?;

        if self.stages.iter().any(|s| s.name == spec.name) {
            return Err(PipelineValidationError::new(
                "DUPLICATE",
                format!("Stage '{}' is already defined", spec.name),
            )
            .with_stages(vec![spec.name.clone()]));
        }

        let known: HashSet<&str> = self.stages.iter().map(|s| s.name.as_str()).collect();
        let mut missing: Vec<&String> = spec
            .dependencies
            .iter()
            .filter(|dep| !known.contains(dep.as_str()))
            .collect();
        missing.sort();
        if let Some(dep) = missing.first() {
            return Err(PipelineValidationError::new(
                "MISSING_DEP",
                format!(
                    "Stage '{}' depends on '{}', which is not an earlier stage",
                    spec.name, dep
                ),
            )
            .with_stages(vec![spec.name.clone(), (*dep).clone()]));
        }

        self.stages.push(spec);
        Ok(())
    }

    /// Sets the source quorum.
    #[must_use]
    pub fn with_quorum(mut self, quorum: SourceQuorum) -> Self {
        self.quorum = quorum;
        self
    }

    /// Sets the trace sink.
    #[must_use]
    pub fn with_trace_sink(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    /// Sets the artifact assembler.
    #[must_use]
    pub fn with_assembler(mut self, assembler: Arc<dyn ArtifactAssembler>) -> Self {
        self.assembler = Some(assembler);
        self
    }

    /// Returns the stage names in run order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Builds the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no stages or no assembler.
    pub fn build(self) -> Result<StageOrchestrator, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new(
                "EMPTY",
                "Cannot build an orchestrator with no stages",
            ));
        }
        let Some(assembler) = self.assembler else {
            return Err(PipelineValidationError::new(
                "NO_ASSEMBLER",
                format!("Orchestrator '{}' has no artifact assembler", self.name),
            ));
        };

        Ok(StageOrchestrator::new(
            self.name,
            self.stages,
            self.quorum,
            self.trace,
            assembler,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ArtifactBody, Criticality, StageData, StageOutput};
    use crate::stages::{FnStage, GenerationStage};
    use std::collections::HashMap;

    struct EmptyAssembler;

    impl ArtifactAssembler for EmptyAssembler {
        fn assemble(&self, _outputs: &HashMap<String, StageData>) -> Result<ArtifactBody, String> {
            Ok(ArtifactBody::default())
        }
    }

    fn noop() -> Arc<dyn GenerationStage> {
        Arc::new(FnStage::new("noop", |_| StageOutput::absent("noop")))
    }

    #[test]
    fn test_builder_keeps_order() {
        let builder = OrchestratorBuilder::new("daily")
            .stage(StageSpec::source("weather", noop(), Criticality::SemiCritical))
            .unwrap()
            .stage(StageSpec::new("synthesis", noop()).with_dependency("weather"))
            .unwrap();

        assert_eq!(builder.stage_names(), vec!["weather", "synthesis"]);
    }

    #[test]
    fn test_missing_dependency() {
        let err = OrchestratorBuilder::new("daily")
            .stage(StageSpec::new("synthesis", noop()).with_dependency("weather"))
            .unwrap_err();

        assert_eq!(err.code, "MISSING_DEP");
        assert_eq!(err.stages, vec!["synthesis", "weather"]);
    }

    #[test]
    fn test_later_dependency_rejected() {
        // weather is added after synthesis, so synthesis cannot read it
        let result = OrchestratorBuilder::new("daily")
            .stage(StageSpec::new("synthesis", noop()).with_dependency("weather"))
            .and_then(|b| b.stage(StageSpec::source("weather", noop(), Criticality::SemiCritical)));

        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_stage() {
        let err = OrchestratorBuilder::new("daily")
            .stage(StageSpec::new("render", noop()))
            .unwrap()
            .stage(StageSpec::new("render", noop()))
            .unwrap_err();

        assert_eq!(err.code, "DUPLICATE");
    }

    #[test]
    fn test_empty_pipeline() {
        let err = OrchestratorBuilder::new("daily")
            .with_assembler(Arc::new(EmptyAssembler))
            .build()
            .unwrap_err();
        assert_eq!(err.code, "EMPTY");
    }

    #[test]
    fn test_missing_assembler() {
        let err = OrchestratorBuilder::new("daily")
            .stage(StageSpec::new("render", noop()))
            .unwrap()
            .build()
            .unwrap_err();
        assert_eq!(err.code, "NO_ASSEMBLER");
    }
}
