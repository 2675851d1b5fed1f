use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use tokio::time::Instant;

/// Wall-clock source for drop-time arithmetic.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The machine's local time, which is what a drop time refers to.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Wall clock that advances with the tokio clock from a fixed starting point.
///
/// Under a paused runtime it moves only when virtual time does.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    wall: NaiveDateTime,
    origin: Instant,
}

impl VirtualClock {
    pub fn starting_at(wall: NaiveDateTime) -> Self {
        Self {
            wall,
            origin: Instant::now(),
        }
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = self.origin.elapsed().as_millis() as i64;
        self.wall + ChronoDuration::milliseconds(elapsed)
    }
}
