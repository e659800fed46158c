//! Generation stage trait and function-backed implementations.
//!
//! Every pipeline step (weather lookup, literature validation, album
//! selection, art analysis, synthesis, rendering) implements
//! [`GenerationStage`]; the orchestrator treats them all alike.

use crate::context::StageContext;
use crate::core::StageOutput;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for generation stages.
#[async_trait]
pub trait GenerationStage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes one attempt of the stage.
    ///
    /// Stages report problems through the returned [`StageOutput`] rather than
    /// panicking or returning an error type.
    async fn execute(&self, ctx: &StageContext) -> StageOutput;
}

/// A stage backed by a synchronous closure.
///
/// Used for small glue steps and in orchestrator tests.
pub struct FnStage<F> {
    label: String,
    run: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageContext) -> StageOutput + Send + Sync,
{
    /// Wraps `run` under the stage name `label`.
    pub fn new(label: impl Into<String>, run: F) -> Self {
        Self { label: label.into(), run }
    }
}

impl<F> Debug for FnStage<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FnStage({})", self.label)
    }
}

#[async_trait]
impl<F> GenerationStage for FnStage<F>
where
    F: Fn(&StageContext) -> StageOutput + Send + Sync,
{
    fn name(&self) -> &str {
        &self.label
    }

    async fn execute(&self, ctx: &StageContext) -> StageOutput {
        (self.run)(ctx)
    }
}
