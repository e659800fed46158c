//! Durable single-value storage for the schedule record.

use super::ScheduleRecord;
use crate::errors::{Result, ScheduleCorrupt};
use crate::utils::write_atomic;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Holds at most one [`ScheduleRecord`].
pub trait ScheduleStore: Send + Sync {
    /// Loads the record.
    ///
    /// Returns `Ok(None)` when no record exists and
    /// [`crate::errors::AubadeError::ScheduleCorrupt`] when one exists but
    /// cannot be parsed.
    fn load(&self) -> Result<Option<ScheduleRecord>>;

    /// Replaces the record. Readers see either the old or the new value.
    fn store(&self, record: &ScheduleRecord) -> Result<()>;

    /// Stores `next` only while the stored record still equals `expected`.
    ///
    /// Returns the record held afterwards. When another writer re-armed the
    /// schedule in the meantime its record is kept and returned unchanged.
    fn replace_if(&self, expected: &ScheduleRecord, next: &ScheduleRecord) -> Result<Option<ScheduleRecord>> {
        let current = self.load()?;
        if current.as_ref() != Some(expected) {
            debug!(?current, expected = expected.due, "Schedule changed underneath, keeping it");
            return Ok(current);
        }
        self.store(next)?;
        Ok(Some(*next))
    }
}

/// A schedule record kept in one text file, replaced by atomic rename.
#[derive(Debug, Clone)]
pub struct FileScheduleStore {
    path: PathBuf,
}

impl FileScheduleStore {
    /// Creates a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScheduleStore for FileScheduleStore {
    fn load(&self) -> Result<Option<ScheduleRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(ScheduleCorrupt {
                    path: self.path.clone(),
                    reason: e.to_string(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };

        let record = ScheduleRecord::parse(&content).map_err(|reason| ScheduleCorrupt {
            path: self.path.clone(),
            reason,
        })?;
        Ok(Some(record))
    }

    fn store(&self, record: &ScheduleRecord) -> Result<()> {
        write_atomic(&self.path, record.render().as_bytes())?;
        debug!(path = %self.path.display(), due = record.due, "Schedule record stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AubadeError;

    #[test]
    fn test_missing_file_is_unarmed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScheduleStore::new(dir.path().join(".playback_schedule"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScheduleStore::new(dir.path().join(".playback_schedule"));

        store.store(&ScheduleRecord::new(1_760_000_000)).unwrap();
        assert_eq!(store.load().unwrap(), Some(ScheduleRecord::new(1_760_000_000)));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "1760000000\n");

        store.store(&ScheduleRecord::new(1_760_086_400)).unwrap();
        assert_eq!(store.load().unwrap(), Some(ScheduleRecord::new(1_760_086_400)));
    }

    #[test]
    fn test_replace_if_swaps_matching_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScheduleStore::new(dir.path().join(".playback_schedule"));
        store.store(&ScheduleRecord::new(100)).unwrap();

        let kept = store
            .replace_if(&ScheduleRecord::new(100), &ScheduleRecord::new(86_500))
            .unwrap();
        assert_eq!(kept, Some(ScheduleRecord::new(86_500)));
        assert_eq!(store.load().unwrap(), Some(ScheduleRecord::new(86_500)));
    }

    #[test]
    fn test_replace_if_keeps_newer_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScheduleStore::new(dir.path().join(".playback_schedule"));
        store.store(&ScheduleRecord::new(500)).unwrap();

        let kept = store
            .replace_if(&ScheduleRecord::new(100), &ScheduleRecord::new(86_500))
            .unwrap();
        assert_eq!(kept, Some(ScheduleRecord::new(500)));
        assert_eq!(store.load().unwrap(), Some(ScheduleRecord::new(500)));
    }

    #[test]
    fn test_out_of_range_record_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".playback_schedule");
        fs::write(&path, "-9223372036854775808\n").unwrap();

        let err = FileScheduleStore::new(&path).load().unwrap_err();
        assert!(matches!(err, AubadeError::ScheduleCorrupt(_)));
    }

    #[test]
    fn test_corrupt_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".playback_schedule");
        fs::write(&path, "not a number\n").unwrap();

        let err = FileScheduleStore::new(&path).load().unwrap_err();
        assert!(matches!(err, AubadeError::ScheduleCorrupt(_)));
    }

    #[test]
    fn test_non_utf8_record_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".playback_schedule");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let err = FileScheduleStore::new(&path).load().unwrap_err();
        assert!(matches!(err, AubadeError::ScheduleCorrupt(_)));
    }
}
