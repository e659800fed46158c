//! Playback-node side of delivery: store the greeting and arm the schedule.

mod http;

pub use http::{router, serve};

use crate::config::AubadeConfig;
use crate::errors::{AubadeError, Result};
use crate::schedule::{
    next_playback_instant, Clock, FileScheduleStore, ScheduleRecord, ScheduleStore, SunriseSource,
    SystemClock,
};
use crate::utils::{remove_if_exists, write_atomic};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Accepts delivered greetings.
///
/// Each accepted delivery replaces the greeting, replaces or removes the
/// references list and re-arms the schedule. The newest delivery always wins.
pub struct ScheduleReceiver {
    greeting_path: PathBuf,
    references_path: PathBuf,
    store: Arc<dyn ScheduleStore>,
    sun: Arc<dyn SunriseSource>,
    clock: Arc<dyn Clock>,
    offset_minutes: i64,
}

impl fmt::Debug for ScheduleReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleReceiver")
            .field("greeting_path", &self.greeting_path)
            .field("references_path", &self.references_path)
            .field("offset_minutes", &self.offset_minutes)
            .finish_non_exhaustive()
    }
}

impl ScheduleReceiver {
    /// Creates a receiver using the system clock and no offset.
    #[must_use]
    pub fn new(
        greeting_path: impl Into<PathBuf>,
        references_path: impl Into<PathBuf>,
        store: Arc<dyn ScheduleStore>,
        sun: Arc<dyn SunriseSource>,
    ) -> Self {
        Self {
            greeting_path: greeting_path.into(),
            references_path: references_path.into(),
            store,
            sun,
            clock: Arc::new(SystemClock),
            offset_minutes: 0,
        }
    }

    /// Creates a receiver from configuration.
    #[must_use]
    pub fn from_config(config: &AubadeConfig) -> Self {
        Self::new(
            config.paths.greeting_path(),
            config.paths.references_path(),
            Arc::new(FileScheduleStore::new(config.paths.schedule_path())),
            Arc::new(config.observer()),
        )
        .with_offset_minutes(config.location.offset_minutes)
    }

    /// Sets the minutes added to sunrise.
    #[must_use]
    pub fn with_offset_minutes(mut self, offset_minutes: i64) -> Self {
        self.offset_minutes = offset_minutes;
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Where the greeting audio is stored.
    #[must_use]
    pub fn greeting_path(&self) -> &Path {
        &self.greeting_path
    }

    /// Where the references list is stored.
    #[must_use]
    pub fn references_path(&self) -> &Path {
        &self.references_path
    }

    /// Stores a delivery and arms the schedule.
    ///
    /// # Errors
    ///
    /// [`AubadeError::InvalidDelivery`] for empty audio (nothing is touched);
    /// IO and sunrise errors otherwise.
    pub fn accept(&self, audio: &[u8], references: &[String]) -> Result<ScheduleRecord> {
        if audio.is_empty() {
            return Err(AubadeError::InvalidDelivery("No audio data received".to_string()));
        }

        write_atomic(&self.greeting_path, audio)?;
        #[allow(clippy::cast_precision_loss)]
        let size_kb = audio.len() as f64 / 1024.0;
        info!(path = %self.greeting_path.display(), size_kb, "Greeting stored");

        let references: Vec<&str> = references
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .collect();
        if references.is_empty() {
            remove_if_exists(&self.references_path)?;
            debug!("No references delivered");
        } else {
            let mut content = references.join("\n");
            content.push('\n');
            write_atomic(&self.references_path, content.as_bytes())?;
            debug!(count = references.len(), "References stored");
        }

        let now = self.clock.now();
        let instant = next_playback_instant(now, self.sun.as_ref(), self.offset_minutes)?;
        let record = ScheduleRecord::at(instant);
        self.store.store(&record)?;

        info!(due = record.due, due_at = %instant.to_rfc3339(), "Playback scheduled");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ManualClock;
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

    struct SixAm;

    impl SunriseSource for SixAm {
        fn sunrise_on(&self, date: NaiveDate) -> Result<DateTime<Utc>> {
            Ok(Utc.from_utc_datetime(&date.and_hms_opt(6, 0, 0).unwrap()))
        }
    }

    fn receiver(dir: &Path, now: DateTime<Utc>) -> (ScheduleReceiver, Arc<FileScheduleStore>) {
        let store = Arc::new(FileScheduleStore::new(dir.join(".playback_schedule")));
        let receiver = ScheduleReceiver::new(
            dir.join("greeting.wav"),
            dir.join("references.txt"),
            store.clone(),
            Arc::new(SixAm),
        )
        .with_clock(Arc::new(ManualClock::new(now)));
        (receiver, store)
    }

    #[test]
    fn test_accept_stores_and_arms() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 2, 0, 0).unwrap();
        let (receiver, store) = receiver(dir.path(), now);

        let record = receiver
            .accept(b"RIFF", &["stream?id=1".to_string(), "stream?id=2".to_string()])
            .unwrap();

        let six = Utc.with_ymd_and_hms(2026, 6, 1, 6, 0, 0).unwrap();
        assert_eq!(record, ScheduleRecord::at(six));
        assert_eq!(store.load().unwrap(), Some(record));
        assert_eq!(std::fs::read(receiver.greeting_path()).unwrap(), b"RIFF");
        assert_eq!(
            std::fs::read_to_string(receiver.references_path()).unwrap(),
            "stream?id=1\nstream?id=2\n"
        );
    }

    #[test]
    fn test_after_sunrise_arms_tomorrow() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
        let (receiver, _) = receiver(dir.path(), now);

        let record = receiver.accept(b"RIFF", &[]).unwrap();
        let tomorrow = Utc.with_ymd_and_hms(2026, 6, 1, 6, 0, 0).unwrap() + Duration::days(1);
        assert_eq!(record.due, tomorrow.timestamp());
        assert!(record.due > now.timestamp());
    }

    #[test]
    fn test_offset_minutes() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 2, 0, 0).unwrap();
        let (receiver, _) = receiver(dir.path(), now);
        let receiver = receiver.with_offset_minutes(20);

        let record = receiver.accept(b"RIFF", &[]).unwrap();
        assert_eq!(record.due, Utc.with_ymd_and_hms(2026, 6, 1, 6, 20, 0).unwrap().timestamp());
    }

    #[test]
    fn test_empty_audio_rejected_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 2, 0, 0).unwrap();
        let (receiver, store) = receiver(dir.path(), now);

        let err = receiver.accept(b"", &[]).unwrap_err();
        assert!(matches!(err, AubadeError::InvalidDelivery(_)));
        assert!(!receiver.greeting_path().exists());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_newest_delivery_wins() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 2, 0, 0).unwrap();
        let (receiver, _) = receiver(dir.path(), now);

        receiver.accept(b"first", &["a".to_string()]).unwrap();
        receiver.accept(b"second", &[]).unwrap();

        assert_eq!(std::fs::read(receiver.greeting_path()).unwrap(), b"second");
        assert!(!receiver.references_path().exists());
    }
}
