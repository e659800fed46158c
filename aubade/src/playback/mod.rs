//! Sunrise playback scheduler.
//!
//! Invoked on an external cadence (cron, systemd timer). Each tick reads the
//! schedule record, plays the greeting when it is due and advances the record
//! by whole days, so a second tick at the same instant plays nothing.

mod device;

pub use device::{pick_cue, CommandDevice, PlaybackDevice};

use crate::config::AubadeConfig;
use crate::errors::{AubadeError, PlaybackFailure, Result};
use crate::schedule::{FileScheduleStore, ScheduleStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TickOutcome {
    /// No usable schedule record.
    Unarmed,
    /// The record is not due yet.
    NotYet {
        /// Due instant in epoch seconds.
        due: i64,
    },
    /// The greeting played and the record moved forward.
    Played {
        /// The instant that was due.
        previous: i64,
        /// The next due instant.
        next: i64,
    },
}

/// Decides whether to play and drives the device.
pub struct PlaybackScheduler {
    store: Arc<dyn ScheduleStore>,
    device: Arc<dyn PlaybackDevice>,
    greeting_path: PathBuf,
    references_path: PathBuf,
    cue_dir: Option<PathBuf>,
    volume: u8,
}

impl fmt::Debug for PlaybackScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackScheduler")
            .field("greeting_path", &self.greeting_path)
            .field("references_path", &self.references_path)
            .field("cue_dir", &self.cue_dir)
            .field("volume", &self.volume)
            .finish_non_exhaustive()
    }
}

impl PlaybackScheduler {
    /// Creates a scheduler with no cues and volume 70.
    #[must_use]
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        device: Arc<dyn PlaybackDevice>,
        greeting_path: impl Into<PathBuf>,
        references_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            device,
            greeting_path: greeting_path.into(),
            references_path: references_path.into(),
            cue_dir: None,
            volume: 70,
        }
    }

    /// Creates a scheduler from configuration with the command-driven device.
    #[must_use]
    pub fn from_config(config: &AubadeConfig) -> Self {
        let scheduler = Self::new(
            Arc::new(FileScheduleStore::new(config.paths.schedule_path())),
            Arc::new(CommandDevice::from_config(&config.playback)),
            config.paths.greeting_path(),
            config.paths.references_path(),
        )
        .with_volume(config.playback.volume);

        match &config.playback.cue_dir {
            Some(dir) => scheduler.with_cue_dir(dir.clone()),
            None => scheduler,
        }
    }

    /// Sets the directory notification cues are drawn from.
    #[must_use]
    pub fn with_cue_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cue_dir = Some(dir.into());
        self
    }

    /// Sets the output volume.
    #[must_use]
    pub fn with_volume(mut self, volume: u8) -> Self {
        self.volume = volume;
        self
    }

    /// Runs one scheduler invocation at `now`.
    ///
    /// # Errors
    ///
    /// [`AubadeError::Playback`] when the greeting itself could not be played;
    /// the record is left untouched so the next tick retries. A record that was
    /// re-armed while the greeting played is kept rather than advanced.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let record = match self.store.load() {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("No playback scheduled");
                return Ok(TickOutcome::Unarmed);
            }
            Err(AubadeError::ScheduleCorrupt(e)) => {
                warn!(error = %e, "Ignoring corrupt schedule record");
                return Ok(TickOutcome::Unarmed);
            }
            Err(e) => return Err(e),
        };

        let now_epoch = now.timestamp();
        if !record.is_due(now_epoch) {
            debug!(due = record.due, now = now_epoch, "Not yet time for playback");
            return Ok(TickOutcome::NotYet { due: record.due });
        }

        let Some(next) = record.advance(now_epoch) else {
            warn!(due = record.due, now = now_epoch, "Schedule record cannot be advanced, ignoring it");
            return Ok(TickOutcome::Unarmed);
        };

        info!(due = record.due, now = now_epoch, "Playback due");
        self.play_sequence().await?;

        let next = match self.store.replace_if(&record, &next)? {
            Some(stored) if stored == next => {
                info!(previous = record.due, next = next.due, "Playback schedule advanced");
                next
            }
            Some(stored) => {
                info!(played = record.due, next = stored.due, "Schedule re-armed during playback, keeping the new record");
                stored
            }
            None => {
                warn!(played = record.due, "Schedule record disappeared during playback");
                next
            }
        };

        Ok(TickOutcome::Played {
            previous: record.due,
            next: next.due,
        })
    }

    async fn play_sequence(&self) -> Result<(), PlaybackFailure> {
        if let Err(e) = self.device.stop_all().await {
            warn!(error = %e, "Could not stop current media");
        }
        if let Err(e) = self.device.set_volume(self.volume).await {
            warn!(error = %e, volume = self.volume, "Could not set volume");
        }

        self.play_cue().await;
        if let Err(e) = self.device.play_file(&self.greeting_path).await {
            error!(error = %e, path = %self.greeting_path.display(), "Greeting playback failed, will retry on next tick");
            return Err(e);
        }
        info!(path = %self.greeting_path.display(), "Greeting played");
        self.play_cue().await;

        let references = read_references(&self.references_path);
        if !references.is_empty() {
            match self.device.queue_references(&references).await {
                Ok(()) => info!(count = references.len(), "References queued"),
                Err(e) => warn!(error = %e, "Could not queue references"),
            }
        }
        Ok(())
    }

    async fn play_cue(&self) {
        let Some(dir) = &self.cue_dir else {
            return;
        };
        let cue = pick_cue(dir, &mut rand::thread_rng());
        match cue {
            Some(cue) => {
                if let Err(e) = self.device.play_cue(&cue).await {
                    warn!(error = %e, "Notification cue failed");
                }
            }
            None => warn!(dir = %dir.display(), "No notification cues found"),
        }
    }
}

fn read_references(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Could not read references");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::ScheduleReceiver;
    use crate::schedule::{ManualClock, ScheduleRecord, SECONDS_PER_DAY};
    use crate::testing::{DeviceCall, FixedSunrise, RecordingDevice};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const T: i64 = 1_780_000_000;

    fn at(epoch: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(epoch, 0).unwrap()
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<FileScheduleStore>,
        device: Arc<RecordingDevice>,
        scheduler: PlaybackScheduler,
    }

    fn fixture(references: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let greeting = dir.path().join("greeting.wav");
        let refs = dir.path().join("references.txt");
        std::fs::write(&greeting, b"RIFF").unwrap();
        if let Some(references) = references {
            std::fs::write(&refs, references).unwrap();
        }

        let store = Arc::new(FileScheduleStore::new(dir.path().join(".playback_schedule")));
        let device = Arc::new(RecordingDevice::new());
        let scheduler = PlaybackScheduler::new(store.clone(), device.clone(), greeting, refs);
        Fixture {
            _dir: dir,
            store,
            device,
            scheduler,
        }
    }

    #[tokio::test]
    async fn test_unarmed_without_record() {
        let f = fixture(None);
        assert_eq!(f.scheduler.tick(at(T)).await.unwrap(), TickOutcome::Unarmed);
        assert!(f.device.calls().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_unarmed() {
        let f = fixture(None);
        std::fs::write(f.store.path(), "garbage").unwrap();

        assert_eq!(f.scheduler.tick(at(T)).await.unwrap(), TickOutcome::Unarmed);
        assert!(f.device.calls().is_empty());
    }

    #[tokio::test]
    async fn test_idempotent_playback() {
        let f = fixture(None);
        f.store.store(&ScheduleRecord::new(T)).unwrap();

        let first = f.scheduler.tick(at(T)).await.unwrap();
        assert_eq!(
            first,
            TickOutcome::Played {
                previous: T,
                next: T + SECONDS_PER_DAY
            }
        );
        assert_eq!(f.store.load().unwrap(), Some(ScheduleRecord::new(T + SECONDS_PER_DAY)));

        let second = f.scheduler.tick(at(T)).await.unwrap();
        assert_eq!(second, TickOutcome::NotYet { due: T + SECONDS_PER_DAY });
        assert_eq!(f.device.greetings_played(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_day() {
        let f = fixture(None);
        f.store.store(&ScheduleRecord::new(T)).unwrap();

        assert_eq!(f.scheduler.tick(at(T - 1)).await.unwrap(), TickOutcome::NotYet { due: T });
        assert_eq!(f.device.greetings_played(), 0);

        assert!(matches!(f.scheduler.tick(at(T)).await.unwrap(), TickOutcome::Played { .. }));
        assert_eq!(f.device.greetings_played(), 1);
        assert_eq!(f.store.load().unwrap().unwrap().due, T + SECONDS_PER_DAY);

        let outcome = f.scheduler.tick(at(T + SECONDS_PER_DAY - 1)).await.unwrap();
        assert_eq!(outcome, TickOutcome::NotYet { due: T + SECONDS_PER_DAY });
        assert_eq!(f.device.greetings_played(), 1);
    }

    #[tokio::test]
    async fn test_play_sequence_order() {
        let f = fixture(Some("stream?id=1\n\nstream?id=2\n"));
        f.store.store(&ScheduleRecord::new(T)).unwrap();

        f.scheduler.tick(at(T + 60)).await.unwrap();

        assert_eq!(
            f.device.calls(),
            vec![
                DeviceCall::StopAll,
                DeviceCall::SetVolume(70),
                DeviceCall::PlayFile(f.scheduler.greeting_path.clone()),
                DeviceCall::QueueReferences(vec![
                    "stream?id=1".to_string(),
                    "stream?id=2".to_string()
                ]),
            ]
        );
    }

    #[tokio::test]
    async fn test_cues_surround_greeting() {
        let f = fixture(None);
        let cues = tempfile::tempdir().unwrap();
        let chime = cues.path().join("chime.wav");
        std::fs::write(&chime, b"RIFF").unwrap();
        let scheduler = PlaybackScheduler::new(
            f.store.clone(),
            f.device.clone(),
            f.scheduler.greeting_path.clone(),
            f.scheduler.references_path.clone(),
        )
        .with_cue_dir(cues.path())
        .with_volume(40);
        f.store.store(&ScheduleRecord::new(T)).unwrap();

        scheduler.tick(at(T)).await.unwrap();

        assert_eq!(
            f.device.calls(),
            vec![
                DeviceCall::StopAll,
                DeviceCall::SetVolume(40),
                DeviceCall::PlayCue(chime.clone()),
                DeviceCall::PlayFile(f.scheduler.greeting_path.clone()),
                DeviceCall::PlayCue(chime),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_greeting_does_not_advance() {
        let f = fixture(Some("stream?id=1"));
        f.store.store(&ScheduleRecord::new(T)).unwrap();
        f.device.fail_playback(true);

        let err = f.scheduler.tick(at(T)).await.unwrap_err();
        assert!(matches!(err, AubadeError::Playback(_)));
        assert_eq!(f.store.load().unwrap(), Some(ScheduleRecord::new(T)));
        assert!(!f
            .device
            .calls()
            .iter()
            .any(|c| matches!(c, DeviceCall::QueueReferences(_))));

        f.device.fail_playback(false);
        let retried = f.scheduler.tick(at(T + 300)).await.unwrap();
        assert_eq!(
            retried,
            TickOutcome::Played {
                previous: T,
                next: T + SECONDS_PER_DAY
            }
        );
    }

    #[tokio::test]
    async fn test_auxiliary_failures_do_not_block() {
        let f = fixture(Some("stream?id=1"));
        f.store.store(&ScheduleRecord::new(T)).unwrap();
        f.device.fail_auxiliary(true);

        let outcome = f.scheduler.tick(at(T)).await.unwrap();
        assert!(matches!(outcome, TickOutcome::Played { .. }));
        assert_eq!(f.device.greetings_played(), 1);
    }

    #[tokio::test]
    async fn test_long_outage_catches_up() {
        let f = fixture(None);
        f.store.store(&ScheduleRecord::new(T)).unwrap();

        let now = T + 2 * SECONDS_PER_DAY + 10;
        let outcome = f.scheduler.tick(at(now)).await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Played {
                previous: T,
                next: T + 3 * SECONDS_PER_DAY
            }
        );
        assert_eq!(f.device.greetings_played(), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_record_is_unarmed() {
        let f = fixture(None);
        std::fs::write(f.store.path(), "-9223372036854775808\n").unwrap();

        assert_eq!(f.scheduler.tick(at(T)).await.unwrap(), TickOutcome::Unarmed);
        assert_eq!(f.scheduler.tick(at(T)).await.unwrap(), TickOutcome::Unarmed);
        assert!(f.device.calls().is_empty());
    }

    /// Accepts a new delivery while the greeting is playing.
    struct DeliveringDuringPlayback {
        receiver: ScheduleReceiver,
        delivered: parking_lot::Mutex<Option<ScheduleRecord>>,
    }

    #[async_trait]
    impl PlaybackDevice for DeliveringDuringPlayback {
        async fn stop_all(&self) -> Result<(), PlaybackFailure> {
            Ok(())
        }

        async fn set_volume(&self, _volume: u8) -> Result<(), PlaybackFailure> {
            Ok(())
        }

        async fn play_file(&self, _path: &Path) -> Result<(), PlaybackFailure> {
            let record = self
                .receiver
                .accept(b"NEW", &[])
                .map_err(|e| PlaybackFailure::new("greeting", e.to_string()))?;
            *self.delivered.lock() = Some(record);
            Ok(())
        }

        async fn queue_references(&self, _references: &[String]) -> Result<(), PlaybackFailure> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_delivery_during_playback_keeps_new_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let greeting = dir.path().join("greeting.wav");
        let references = dir.path().join("references.txt");
        std::fs::write(&greeting, b"OLD").unwrap();
        let store = Arc::new(FileScheduleStore::new(dir.path().join(".playback_schedule")));

        let six = Utc.with_ymd_and_hms(2026, 6, 2, 6, 0, 0).unwrap();
        let seven = Utc.with_ymd_and_hms(2026, 6, 2, 7, 0, 0).unwrap();
        let eight = Utc.with_ymd_and_hms(2026, 6, 2, 8, 0, 0).unwrap();
        store.store(&ScheduleRecord::at(six)).unwrap();

        let receiver = ScheduleReceiver::new(&greeting, &references, store.clone(), Arc::new(FixedSunrise::at(6, 0)))
            .with_clock(Arc::new(ManualClock::new(seven)))
            .with_offset_minutes(120);
        let device = Arc::new(DeliveringDuringPlayback {
            receiver,
            delivered: parking_lot::Mutex::new(None),
        });
        let scheduler = PlaybackScheduler::new(store.clone(), device.clone(), &greeting, &references);

        let outcome = scheduler.tick(seven).await.unwrap();

        let delivered = (*device.delivered.lock()).unwrap();
        assert_eq!(delivered, ScheduleRecord::at(eight));
        assert_eq!(
            outcome,
            TickOutcome::Played {
                previous: six.timestamp(),
                next: eight.timestamp()
            }
        );
        assert_eq!(store.load().unwrap(), Some(delivered));
        assert_eq!(std::fs::read(&greeting).unwrap(), b"NEW");
        assert_eq!(
            scheduler.tick(eight - chrono::Duration::minutes(1)).await.unwrap(),
            TickOutcome::NotYet { due: eight.timestamp() }
        );
    }
}
