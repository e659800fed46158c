//! Stage criticality, role and status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the orchestrator reacts when a stage produces nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    /// Failure aborts the run.
    Critical,
    /// Failure is recorded as an error; the run continues without the output.
    SemiCritical,
    /// Failure is expected from time to time; the run continues without the output.
    Optional,
}

impl Default for Criticality {
    fn default() -> Self {
        Self::Critical
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::SemiCritical => write!(f, "semi_critical"),
            Self::Optional => write!(f, "optional"),
        }
    }
}

impl Criticality {
    /// Returns true if a failure of this stage aborts the run.
    #[must_use]
    pub fn aborts_on_failure(&self) -> bool {
        matches!(self, Self::Critical)
    }

    /// Returns true if the stage counts toward the non-optional source requirement.
    #[must_use]
    pub fn is_required(&self) -> bool {
        !matches!(self, Self::Optional)
    }
}

/// What a stage contributes to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageRole {
    /// Fetches independent source material (weather, literature, album).
    Source,
    /// Consumes earlier outputs (analysis, synthesis, rendering).
    Transform,
}

impl Default for StageRole {
    fn default() -> Self {
        Self::Transform
    }
}

impl fmt::Display for StageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Transform => write!(f, "transform"),
        }
    }
}

/// The execution status of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage produced data.
    Ok,
    /// Stage ran but had nothing acceptable to offer.
    Absent,
    /// Stage failed.
    Fail,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Absent => write!(f, "absent"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

impl StageStatus {
    /// Returns true if the stage produced data.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_criticality_display() {
        assert_eq!(Criticality::Critical.to_string(), "critical");
        assert_eq!(Criticality::SemiCritical.to_string(), "semi_critical");
        assert_eq!(Criticality::Optional.to_string(), "optional");
    }

    #[test]
    fn test_criticality_policy() {
        assert!(Criticality::Critical.aborts_on_failure());
        assert!(!Criticality::SemiCritical.aborts_on_failure());
        assert!(Criticality::SemiCritical.is_required());
        assert!(!Criticality::Optional.is_required());
    }

    #[test]
    fn test_criticality_serialize() {
        let json = serde_json::to_string(&Criticality::SemiCritical).unwrap();
        assert_eq!(json, r#""semi_critical""#);

        let parsed: Criticality = serde_json::from_str(r#""optional""#).unwrap();
        assert_eq!(parsed, Criticality::Optional);
    }

    #[test]
    fn test_stage_status() {
        assert_eq!(StageStatus::Absent.to_string(), "absent");
        assert!(StageStatus::Ok.is_success());
        assert!(!StageStatus::Fail.is_success());
        assert_eq!(StageRole::Source.to_string(), "source");
    }
}
