//! Minimum source requirement checked before the first transform stage.

use crate::core::Criticality;
use crate::errors::AbortReason;
use serde::{Deserialize, Serialize};

/// How many source stages must produce data for a run to continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceQuorum {
    /// Minimum number of source stages that must produce data.
    pub min_sources: usize,
    /// Whether at least one of them must be non-optional.
    pub require_non_optional: bool,
}

impl Default for SourceQuorum {
    fn default() -> Self {
        Self {
            min_sources: 1,
            require_non_optional: true,
        }
    }
}

impl SourceQuorum {
    /// Creates a quorum.
    #[must_use]
    pub fn new(min_sources: usize, require_non_optional: bool) -> Self {
        Self {
            min_sources,
            require_non_optional,
        }
    }

    /// Checks the criticalities of the source stages that produced data.
    pub fn check(&self, present: &[Criticality]) -> Result<(), AbortReason> {
        if present.len() < self.min_sources {
            return Err(AbortReason::InsufficientSources {
                present: present.len(),
                required: self.min_sources,
            });
        }
        if self.require_non_optional && !present.iter().any(Criticality::is_required) {
            return Err(AbortReason::NoRequiredSource);
        }
        Ok(())
    }
}
