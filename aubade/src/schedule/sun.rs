//! Sunrise computation and the next playback instant.

use crate::errors::{AubadeError, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Provides sunrise instants for calendar dates.
pub trait SunriseSource: Send + Sync {
    /// Sunrise on `date` at the observer's location.
    fn sunrise_on(&self, date: NaiveDate) -> Result<DateTime<Utc>>;

    /// The observer's calendar date at `now`.
    fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.date_naive()
    }
}

/// A point on the globe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObserverLocation {
    /// Degrees north.
    pub latitude: f64,
    /// Degrees east.
    pub longitude: f64,
}

impl ObserverLocation {
    /// Creates a location.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl SunriseSource for ObserverLocation {
    fn sunrise_on(&self, date: NaiveDate) -> Result<DateTime<Utc>> {
        #[allow(deprecated)]
        let (sunrise, _sunset) = sunrise::sunrise_sunset(
            self.latitude,
            self.longitude,
            date.year(),
            date.month(),
            date.day(),
        );

        let instant = DateTime::from_timestamp(sunrise, 0).ok_or_else(|| {
            AubadeError::Sunrise(format!(
                "no sunrise on {date} at ({}, {})",
                self.latitude, self.longitude
            ))
        })?;

        // polar day and night produce instants far from the requested date
        if (instant.date_naive() - date).num_days().abs() > 1 {
            return Err(AubadeError::Sunrise(format!(
                "no sunrise on {date} at ({}, {})",
                self.latitude, self.longitude
            )));
        }
        Ok(instant)
    }

    /// Mean solar date at the observer's longitude.
    fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        #[allow(clippy::cast_possible_truncation)]
        let offset = Duration::seconds((self.longitude / 15.0 * 3600.0) as i64);
        (now + offset).date_naive()
    }
}

const SEARCH_DAYS: i64 = 3;

/// The first instant at or after `now` that is a sunrise plus `offset_minutes`.
///
/// Starts from the observer's current date and moves to following days while
/// the candidate is still in the past.
pub fn next_playback_instant(
    now: DateTime<Utc>,
    sun: &dyn SunriseSource,
    offset_minutes: i64,
) -> Result<DateTime<Utc>> {
    let today = sun.local_date(now);
    let offset = Duration::minutes(offset_minutes);

    for day in 0..SEARCH_DAYS {
        let date = today + Duration::days(day);
        let candidate = sun.sunrise_on(date)? + offset;
        if candidate >= now {
            return Ok(candidate);
        }
    }

    Err(AubadeError::Sunrise(format!(
        "no sunrise with offset {offset_minutes} min within {SEARCH_DAYS} days of {now}"
    )))
}
