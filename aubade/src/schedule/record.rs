//! The single persisted schedule value.

use chrono::{DateTime, Utc};
use std::fmt;

/// Seconds in one schedule day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Next instant (UTC epoch seconds) at or after which playback should occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduleRecord {
    /// Due instant in epoch seconds.
    pub due: i64,
}

impl ScheduleRecord {
    /// Creates a record due at `due` epoch seconds.
    #[must_use]
    pub fn new(due: i64) -> Self {
        Self { due }
    }

    /// Creates a record due at `instant`.
    #[must_use]
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self::new(instant.timestamp())
    }

    /// Parses the persisted form: one integer line.
    ///
    /// # Errors
    ///
    /// Returns a reason when the line is empty, not an integer, or outside
    /// the range of representable UTC instants.
    pub fn parse(content: &str) -> Result<Self, String> {
        let line = content.trim();
        if line.is_empty() {
            return Err("record is empty".to_string());
        }
        let due = line
            .parse::<i64>()
            .map_err(|e| format!("'{line}' is not an epoch timestamp: {e}"))?;
        if DateTime::from_timestamp(due, 0).is_none() {
            return Err(format!("{due} is outside the representable time range"));
        }
        Ok(Self::new(due))
    }

    /// Renders the persisted form.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{}\n", self.due)
    }

    /// Returns true if playback is due at `now` (epoch seconds).
    #[must_use]
    pub fn is_due(&self, now: i64) -> bool {
        now >= self.due
    }

    /// Moves the record forward by whole days until it is after `now`.
    ///
    /// A tick within a day of the due instant advances by exactly one day.
    /// Returns `None` if the advanced instant is not representable.
    #[must_use]
    pub fn advance(&self, now: i64) -> Option<Self> {
        let late = now.checked_sub(self.due)?;
        let days = (late.div_euclid(SECONDS_PER_DAY) + 1).max(1);
        let due = days
            .checked_mul(SECONDS_PER_DAY)
            .and_then(|shift| self.due.checked_add(shift))?;
        DateTime::from_timestamp(due, 0).map(|_| Self::new(due))
    }

    /// The due instant as a UTC timestamp, if representable.
    #[must_use]
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.due, 0)
    }
}

impl fmt::Display for ScheduleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.due_at() {
            Some(at) => write!(f, "{} ({})", self.due, at.to_rfc3339()),
            None => write!(f, "{}", self.due),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_760_000_000;

    #[test]
    fn test_parse_and_render() {
        let record = ScheduleRecord::parse("1760000000\n").unwrap();
        assert_eq!(record, ScheduleRecord::new(T));
        assert_eq!(record.render(), "1760000000\n");
        assert_eq!(ScheduleRecord::parse("  42  ").unwrap().due, 42);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ScheduleRecord::parse("").is_err());
        assert!(ScheduleRecord::parse("\n").is_err());
        assert!(ScheduleRecord::parse("tomorrow").is_err());
        assert!(ScheduleRecord::parse("1760000000.5").is_err());
    }

    #[test]
    fn test_parse_rejects_unrepresentable_instants() {
        assert!(ScheduleRecord::parse("-9223372036854775808").is_err());
        assert!(ScheduleRecord::parse("9223372036854775807").is_err());
        assert!(ScheduleRecord::parse("-1").is_ok());
    }

    #[test]
    fn test_advance_overflow_is_none() {
        assert_eq!(ScheduleRecord::new(i64::MIN).advance(T), None);
        assert_eq!(ScheduleRecord::new(T).advance(i64::MAX), None);
    }

    #[test]
    fn test_is_due() {
        let record = ScheduleRecord::new(T);
        assert!(!record.is_due(T - 1));
        assert!(record.is_due(T));
        assert!(record.is_due(T + 1));
    }

    #[test]
    fn test_advance_one_day_within_a_day() {
        let record = ScheduleRecord::new(T);
        assert_eq!(record.advance(T).unwrap().due, T + SECONDS_PER_DAY);
        assert_eq!(record.advance(T + 300).unwrap().due, T + SECONDS_PER_DAY);
        assert_eq!(record.advance(T + SECONDS_PER_DAY - 1).unwrap().due, T + SECONDS_PER_DAY);
    }

    #[test]
    fn test_advance_catches_up_whole_days() {
        let record = ScheduleRecord::new(T);
        let now = T + 3 * SECONDS_PER_DAY + 60;
        let advanced = record.advance(now).unwrap();
        assert_eq!(advanced.due, T + 4 * SECONDS_PER_DAY);
        assert!(advanced.due > now);
        assert_eq!((advanced.due - T) % SECONDS_PER_DAY, 0);
    }

    #[test]
    fn test_advance_exactly_one_day_late() {
        let record = ScheduleRecord::new(T);
        assert_eq!(record.advance(T + SECONDS_PER_DAY).unwrap().due, T + 2 * SECONDS_PER_DAY);
    }

    #[test]
    fn test_due_at() {
        let record = ScheduleRecord::new(0);
        assert_eq!(record.due_at().unwrap().to_rfc3339(), "1970-01-01T00:00:00+00:00");
    }
}
