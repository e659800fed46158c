//! Validation-retry: fetch a candidate, ask a judge, repeat a bounded number of times.

use crate::errors::Result;
use regex::Regex;
use std::future::Future;
use tracing::{debug, info, warn};

/// A candidate the judge accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated<C> {
    /// The accepted candidate.
    pub candidate: C,
    /// The attempt on which it was accepted (1-based).
    pub attempt: usize,
}

const POSITIVE_VERDICT: &str = r"(?i)VERDICT:\s*YES\b";

/// Returns true if a judgment contains a positive `VERDICT: YES`.
#[must_use]
pub fn is_positive_verdict(judgment: &str) -> bool {
    Regex::new(POSITIVE_VERDICT).is_ok_and(|pattern| pattern.is_match(judgment))
}

/// Fetches candidates and asks `judge` about each, up to `max_attempts` times.
///
/// - A fetch error consumes an attempt and the loop moves on.
/// - A judge error ends the protocol with that error.
/// - `Ok(None)` means every attempt was used without an accepted candidate;
///   callers must treat this as an ordinary outcome.
///
/// `fetch` is never called more than `max_attempts` times.
pub async fn validate_with_retry<C, F, FFut, J, JFut>(
    max_attempts: usize,
    mut fetch: F,
    mut judge: J,
) -> Result<Option<Validated<C>>>
where
    F: FnMut(usize) -> FFut,
    FFut: Future<Output = Result<C>>,
    J: FnMut(&C) -> JFut,
    JFut: Future<Output = Result<bool>>,
{
    for attempt in 1..=max_attempts {
        debug!(attempt, max_attempts, "Fetching candidate");
        let candidate = match fetch(attempt).await {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(attempt, max_attempts, error = %e, "Candidate fetch failed");
                continue;
            }
        };

        if judge(&candidate).await? {
            info!(attempt, "Candidate accepted");
            return Ok(Some(Validated { candidate, attempt }));
        }
        debug!(attempt, "Candidate rejected");
    }

    info!(max_attempts, "No acceptable candidate found");
    Ok(None)
}
