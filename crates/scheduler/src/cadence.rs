//! Reload cadence bands

use std::time::Duration;

use dropclick_config_center::CadencePolicy;

/// Distance-to-drop band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Band {
    Far,
    Prep,
    Hot,
    Turbo,
}

impl Band {
    pub fn name(&self) -> &'static str {
        match self {
            Band::Far => "far",
            Band::Prep => "prep",
            Band::Hot => "hot",
            Band::Turbo => "turbo",
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub fn band(time_diff_ms: i64, policy: &CadencePolicy) -> Band {
    if time_diff_ms > policy.prep_threshold_ms as i64 {
        Band::Far
    } else if time_diff_ms > policy.hot_threshold_ms as i64 {
        Band::Prep
    } else if time_diff_ms > 0 {
        Band::Hot
    } else {
        Band::Turbo
    }
}

/// Delay before the next reload. Non-increasing as `time_diff_ms` decreases
/// for any policy that passes validation.
pub fn next_delay(time_diff_ms: i64, policy: &CadencePolicy) -> Duration {
    let millis = match band(time_diff_ms, policy) {
        Band::Far => policy.far_delay_ms,
        Band::Prep => policy.prep_delay_ms,
        Band::Hot => {
            let lead = time_diff_ms.saturating_sub(policy.hot_lead_ms as i64);
            lead.clamp(
                policy.hot_min_delay_ms as i64,
                policy.hot_max_delay_ms as i64,
            ) as u64
        }
        Band::Turbo => policy.turbo_delay_ms,
    };
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn band_edges_follow_the_thresholds() {
        let policy = CadencePolicy::default();
        assert_eq!(next_delay(60_000, &policy), ms(10_000));
        assert_eq!(next_delay(30_001, &policy), ms(10_000));
        assert_eq!(next_delay(30_000, &policy), ms(3_500));
        assert_eq!(next_delay(10_001, &policy), ms(3_500));
        assert_eq!(next_delay(10_000, &policy), ms(1_200));
        assert_eq!(next_delay(1_300, &policy), ms(1_150));
        assert_eq!(next_delay(1, &policy), ms(1_000));
        assert_eq!(next_delay(0, &policy), ms(1_000));
        assert_eq!(next_delay(-86_400_000, &policy), ms(1_000));
    }

    #[test]
    fn delay_never_grows_as_the_drop_approaches() {
        let policy = CadencePolicy::default();
        let mut previous = next_delay(i64::from(u32::MAX), &policy);
        let mut previous_band = band(i64::from(u32::MAX), &policy);
        for diff in (-40_000..=45_000).rev().step_by(7) {
            let delay = next_delay(diff, &policy);
            assert!(delay <= previous, "delay grew at time_diff={diff}");
            let current = band(diff, &policy);
            assert!(current >= previous_band);
            previous = delay;
            previous_band = current;
        }
    }

    #[test]
    fn custom_valid_policies_stay_monotone() {
        let policy = CadencePolicy {
            far_delay_ms: 5_000,
            prep_threshold_ms: 20_000,
            prep_delay_ms: 2_000,
            hot_threshold_ms: 5_000,
            hot_lead_ms: 0,
            hot_min_delay_ms: 300,
            hot_max_delay_ms: 2_000,
            turbo_delay_ms: 250,
            ..CadencePolicy::default()
        };
        policy.validate().unwrap();
        let delays: Vec<Duration> = (-2_000..=25_000)
            .rev()
            .map(|diff| next_delay(diff, &policy))
            .collect();
        assert!(delays.windows(2).all(|pair| pair[1] <= pair[0]));
    }
}
