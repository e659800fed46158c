//! Append-only structured trace of a pipeline run.
//!
//! The trace is a replayable record of every stage transition and every
//! prompt/response exchange. It is written to its own destination and is
//! never mixed with the operational `tracing` log.

mod entry;
mod sink;

pub use entry::{TraceEntry, TraceKind};
pub use sink::{CollectingTraceSink, JsonlTraceSink, NoOpTraceSink, TraceSink};
