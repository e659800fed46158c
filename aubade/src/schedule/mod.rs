//! Persisted playback schedule.
//!
//! A single [`ScheduleRecord`] holds the next instant at or after which the
//! greeting should play. The receiver overwrites it on every delivery and the
//! scheduler advances it by whole days after each successful play; there is
//! no other "already played" state.

mod clock;
mod record;
mod store;
mod sun;

pub use clock::{Clock, ManualClock, SystemClock};
pub use record::{ScheduleRecord, SECONDS_PER_DAY};
pub use store::{FileScheduleStore, ScheduleStore};
pub use sun::{next_playback_instant, ObserverLocation, SunriseSource};
