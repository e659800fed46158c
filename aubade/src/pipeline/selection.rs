//! Selection-with-fallback: read a 1-based choice from a judgment, or pick at random.

use crate::errors::ParseFailure;
use rand::Rng;
use regex::Regex;
use tracing::{info, warn};

const VERDICT_PATTERN: &str = r"(?i)VERDICT:\s*\[?\s*(\d+)";

/// The outcome of a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Zero-based index of the chosen option.
    pub index: usize,
    /// Why the judgment was not used, if the choice was random.
    pub fallback: Option<ParseFailure>,
}

impl Selection {
    /// Returns true if the choice came from the judgment.
    #[must_use]
    pub fn is_judged(&self) -> bool {
        self.fallback.is_none()
    }
}

/// Parses `VERDICT: <n>` (1-based) into a zero-based index below `options`.
pub fn parse_verdict_index(judgment: &str, options: usize) -> Result<usize, ParseFailure> {
    let pattern =
        Regex::new(VERDICT_PATTERN).map_err(|e| ParseFailure::new(format!("bad pattern: {e}")))?;

    let captures = pattern
        .captures(judgment)
        .ok_or_else(|| ParseFailure::new("no VERDICT line"))?;
    let number: usize = captures[1]
        .parse()
        .map_err(|_| ParseFailure::new(format!("'{}' is not a number", &captures[1])))?;

    if number == 0 || number > options {
        return Err(ParseFailure::new(format!(
            "choice {number} is outside 1..={options}"
        )));
    }
    Ok(number - 1)
}

/// Chooses among `options` using the judgment, falling back to a uniform
/// random choice when the verdict is missing or out of range.
///
/// Returns `None` only when there is nothing to choose from.
pub fn select_with_fallback<R: Rng + ?Sized>(
    judgment: &str,
    options: usize,
    rng: &mut R,
) -> Option<Selection> {
    if options == 0 {
        return None;
    }

    match parse_verdict_index(judgment, options) {
        Ok(index) => {
            info!(choice = index + 1, options, "Selection parsed from judgment");
            Some(Selection {
                index,
                fallback: None,
            })
        }
        Err(failure) => {
            let index = rng.gen_range(0..options);
            warn!(error = %failure, choice = index + 1, options, "Using random selection");
            Some(Selection {
                index,
                fallback: Some(failure),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_parse_verdict() {
        assert_eq!(parse_verdict_index("REASONING: jazz fits.\nVERDICT: 3", 5), Ok(2));
        assert_eq!(parse_verdict_index("verdict:1", 5), Ok(0));
        assert_eq!(parse_verdict_index("VERDICT: [4]", 5), Ok(3));
    }

    #[test]
    fn test_parse_verdict_rejects_bad_input() {
        assert!(parse_verdict_index("I like the second one", 5).is_err());
        assert!(parse_verdict_index("VERDICT: 0", 5).is_err());
        assert!(parse_verdict_index("VERDICT: 6", 5).is_err());
        assert!(parse_verdict_index("VERDICT: 99999999999999999999999", 5).is_err());
    }

    #[test]
    fn test_judged_selection() {
        let mut rng = StdRng::seed_from_u64(7);
        let selection = select_with_fallback("VERDICT: 2", 5, &mut rng).unwrap();
        assert_eq!(selection.index, 1);
        assert!(selection.is_judged());
    }

    #[test]
    fn test_no_options() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(select_with_fallback("VERDICT: 1", 0, &mut rng).is_none());
    }

    #[test]
    fn test_out_of_range_falls_back() {
        let mut rng = StdRng::seed_from_u64(7);
        let selection = select_with_fallback("VERDICT: 9", 5, &mut rng).unwrap();
        assert!(selection.index < 5);
        assert!(!selection.is_judged());
    }

    #[test]
    fn test_fallback_is_uniform() {
        const OPTIONS: usize = 5;
        const TRIALS: usize = 10_000;

        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut counts = [0usize; OPTIONS];
        for _ in 0..TRIALS {
            let selection = select_with_fallback("no verdict here", OPTIONS, &mut rng).unwrap();
            assert!(selection.fallback.is_some());
            counts[selection.index] += 1;
        }

        // expected 2000 per bucket; 5 sigma is roughly 200
        let expected = TRIALS / OPTIONS;
        for (index, count) in counts.iter().enumerate() {
            assert!(
                count.abs_diff(expected) < 200,
                "bucket {index} has {count}, expected about {expected}"
            );
        }

        // chi-squared with 4 degrees of freedom, p = 0.001 critical value
        let chi_squared: f64 = counts
            .iter()
            .map(|&c| {
                let diff = c as f64 - expected as f64;
                diff * diff / expected as f64
            })
            .sum();
        assert!(chi_squared < 18.47, "chi-squared {chi_squared}");
    }
}
