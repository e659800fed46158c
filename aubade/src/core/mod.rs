//! Core types shared by the pipeline and its stages.

mod artifact;
mod output;
mod status;

pub use artifact::{Artifact, ArtifactBody};
pub use output::{StageData, StageOutput};
pub use status::{Criticality, StageRole, StageStatus};
