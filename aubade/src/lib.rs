//! # Aubade
//!
//! Generates one spoken greeting per day and plays it back at sunrise.
//!
//! The crate has two halves that run on different machines:
//!
//! - **Generation**: a sequential stage pipeline gathers weather, a literature
//!   excerpt and an album, composes a greeting with a language model, renders
//!   it to audio and delivers it over HTTP.
//! - **Playback**: a receiver stores the delivered audio and arms a schedule
//!   relative to sunrise; a scheduler invoked on a fixed cadence plays it once.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use aubade::prelude::*;
//!
//! let orchestrator = OrchestratorBuilder::new("daily-greeting")
//!     .stage(StageSpec::source("weather", weather, Criticality::SemiCritical))?
//!     .stage(StageSpec::transform("synthesis", synthesis, Criticality::Critical)
//!         .with_dependency("weather"))?
//!     .with_assembler(assembler)
//!     .build()?;
//!
//! let artifact = orchestrator.run().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod core;
pub mod delivery;
pub mod errors;
pub mod greeting;
pub mod observability;
pub mod pipeline;
pub mod playback;
pub mod providers;
pub mod receiver;
pub mod schedule;
pub mod stages;
pub mod testing;
pub mod trace;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::AubadeConfig;
    pub use crate::context::{StageContext, StageInputs};
    pub use crate::core::{Artifact, Criticality, StageOutput, StageRole, StageStatus};
    pub use crate::delivery::{DeliveryClient, DeliveryReceipt};
    pub use crate::errors::{
        AbortReason, AubadeError, DeliveryFailed, PipelineAborted, PipelineValidationError,
        PlaybackFailure, ScheduleCorrupt, StageFailure,
    };
    pub use crate::pipeline::{
        ArtifactAssembler, OrchestratorBuilder, SourceQuorum, StageOrchestrator, StageSpec,
    };
    pub use crate::playback::{PlaybackDevice, PlaybackScheduler, TickOutcome};
    pub use crate::receiver::ScheduleReceiver;
    pub use crate::schedule::{
        Clock, FileScheduleStore, ScheduleRecord, ScheduleStore, SunriseSource, SystemClock,
    };
    pub use crate::stages::GenerationStage;
    pub use crate::trace::{JsonlTraceSink, NoOpTraceSink, TraceEntry, TraceKind, TraceSink};
}
