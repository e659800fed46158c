//! Per-stage execution context.

mod inputs;
mod stage;

pub use inputs::StageInputs;
pub use stage::StageContext;
