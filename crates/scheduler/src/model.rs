use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime};
use dropclick_config_center::{AgentConfig, CadencePolicy};

use crate::cadence::{band, next_delay, Band};
use crate::error::DropTimeError;

/// Time of day at which the product becomes purchasable, in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropTime(NaiveTime);

impl DropTime {
    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for DropTime {
    type Err = DropTimeError;

    /// `HH:MM` or `HH:MM:SS`; seconds default to zero.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DropTimeError::Empty);
        }
        let parts: Vec<&str> = raw.split(':').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(DropTimeError::Malformed(raw.to_string()));
        }
        let mut fields = [0u32; 3];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            if part.is_empty() || part.len() > 2 || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(DropTimeError::Malformed(raw.to_string()));
            }
            *slot = part
                .parse()
                .map_err(|_| DropTimeError::Malformed(raw.to_string()))?;
        }
        NaiveTime::from_hms_opt(fields[0], fields[1], fields[2])
            .map(DropTime)
            .ok_or_else(|| DropTimeError::OutOfRange(raw.to_string()))
    }
}

/// Milliseconds from `now` until the drop moment of the same calendar day.
/// Negative once the moment has passed.
pub fn time_diff_ms(drop: DropTime, now: NaiveDateTime) -> i64 {
    (now.date().and_time(drop.time()) - now).num_milliseconds()
}

/// Why the scheduling loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    AutoRefreshOff,
    NoDropTime,
    InvalidDropTime(DropTimeError),
    /// More than the grace window past the drop without multi-order mode.
    MissedWindow { late_ms: i64 },
    Cancelled,
}

/// Next step of the scheduling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Stop(StopReason),
    Wait {
        delay: Duration,
        band: Band,
        time_diff_ms: i64,
    },
}

pub fn plan(config: &AgentConfig, now: NaiveDateTime, policy: &CadencePolicy) -> Plan {
    if !config.auto_refresh {
        return Plan::Stop(StopReason::AutoRefreshOff);
    }
    let drop = match config.drop_time.parse::<DropTime>() {
        Ok(drop) => drop,
        Err(DropTimeError::Empty) => return Plan::Stop(StopReason::NoDropTime),
        Err(err) => return Plan::Stop(StopReason::InvalidDropTime(err)),
    };
    let diff = time_diff_ms(drop, now);
    if diff < -(policy.grace_window_ms as i64) && !config.multi_order {
        return Plan::Stop(StopReason::MissedWindow { late_ms: -diff });
    }
    Plan::Wait {
        delay: next_delay(diff, policy),
        band: band(diff, policy),
        time_diff_ms: diff,
    }
}
