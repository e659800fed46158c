//! Stage specifications.

use crate::core::{Criticality, StageRole};
use crate::errors::PipelineValidationError;
use crate::stages::GenerationStage;
use std::collections::HashSet;
use std::sync::Arc;

/// Specification for a single stage in a pipeline.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: String,
    /// The stage implementation.
    pub runner: Arc<dyn GenerationStage>,
    /// Names of earlier stages this stage reads.
    pub dependencies: HashSet<String>,
    /// What happens when the stage produces nothing.
    pub criticality: Criticality,
    /// Whether the stage is an independent source or a transform.
    pub role: StageRole,
    /// Attempts allowed for retryable failures (including the first).
    pub max_attempts: usize,
}

impl StageSpec {
    /// Creates a new critical transform stage specification.
    #[must_use]
    pub fn new(name: impl Into<String>, runner: Arc<dyn GenerationStage>) -> Self {
        Self {
            name: name.into(),
            runner,
            dependencies: HashSet::new(),
            criticality: Criticality::Critical,
            role: StageRole::Transform,
            max_attempts: 1,
        }
    }

    /// Creates a source stage specification.
    #[must_use]
    pub fn source(
        name: impl Into<String>,
        runner: Arc<dyn GenerationStage>,
        criticality: Criticality,
    ) -> Self {
        Self::new(name, runner)
            .with_role(StageRole::Source)
            .with_criticality(criticality)
    }

    /// Creates a transform stage specification.
    #[must_use]
    pub fn transform(
        name: impl Into<String>,
        runner: Arc<dyn GenerationStage>,
        criticality: Criticality,
    ) -> Self {
        Self::new(name, runner)
            .with_role(StageRole::Transform)
            .with_criticality(criticality)
    }

    /// Sets the dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        self.dependencies.insert(dep.into());
        self
    }

    /// Sets the criticality.
    #[must_use]
    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = criticality;
        self
    }

    /// Sets the role.
    #[must_use]
    pub fn with_role(mut self, role: StageRole) -> Self {
        self.role = role;
        self
    }

    /// Sets the attempt bound for retryable failures.
    #[must_use]
    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Validates the stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank, the stage depends on itself, or
    /// the attempt bound is zero.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new(
                "EMPTY_NAME",
                "Stage name cannot be empty or whitespace-only",
            ));
        }
        if self.dependencies.contains(&self.name) {
            return Err(PipelineValidationError::new(
                "SELF_DEP",
                format!("Stage '{}' cannot depend on itself", self.name),
            )
            .with_stages(vec![self.name.clone()]));
        }
        if self.max_attempts == 0 {
            return Err(PipelineValidationError::new(
                "ZERO_ATTEMPTS",
                format!("Stage '{}' must allow at least one attempt", self.name),
            )
            .with_stages(vec![self.name.clone()]));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageOutput;
    use crate::stages::FnStage;

    fn noop() -> Arc<dyn GenerationStage> {
        Arc::new(FnStage::new("noop", |_| StageOutput::absent("noop")))
    }

    #[test]
    fn test_stage_spec_defaults() {
        let spec = StageSpec::new("render", noop());
        assert_eq!(spec.criticality, Criticality::Critical);
        assert_eq!(spec.role, StageRole::Transform);
        assert_eq!(spec.max_attempts, 1);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_source_constructor() {
        let spec = StageSpec::source("literature", noop(), Criticality::Optional).with_attempts(5);
        assert_eq!(spec.role, StageRole::Source);
        assert_eq!(spec.criticality, Criticality::Optional);
        assert_eq!(spec.max_attempts, 5);
    }

    #[test]
    fn test_self_dependency_rejected() {
        let spec = StageSpec::new("synthesis", noop()).with_dependency("synthesis");
        let err = spec.validate().unwrap_err();
        assert_eq!(err.code, "SELF_DEP");
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let spec = StageSpec::new("weather", noop()).with_attempts(0);
        assert_eq!(spec.validate().unwrap_err().code, "ZERO_ATTEMPTS");
    }
}
