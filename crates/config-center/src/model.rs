use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Persisted agent settings, keyed the way the settings panel stores them.
///
/// Every field is optional on the wire; a missing key falls back to the
/// default below rather than failing the read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Master switch for automated clicking.
    #[serde(rename = "autoClickerEnabled")]
    pub enabled: bool,

    /// Pause before the first click, in milliseconds.
    #[serde(rename = "clickDelay")]
    pub click_delay_ms: u64,

    /// Whether the drop scheduler is active.
    #[serde(rename = "autoRefreshEnabled")]
    pub auto_refresh: bool,

    /// Target time of day, `HH:MM[:SS]`, or empty.
    #[serde(rename = "dropTime")]
    pub drop_time: String,

    /// Restart the hunt after each confirmed order.
    #[serde(rename = "multiOrderEnabled")]
    pub multi_order: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            click_delay_ms: 50,
            auto_refresh: false,
            drop_time: String::new(),
            multi_order: false,
        }
    }
}

impl AgentConfig {
    pub fn click_delay(&self) -> Duration {
        Duration::from_millis(self.click_delay_ms)
    }

    /// Merge a partial record into this one. Returns `true` when anything changed.
    pub fn apply(&mut self, patch: &ConfigPatch) -> bool {
        let before = self.clone();
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(delay) = patch.click_delay_ms {
            self.click_delay_ms = delay;
        }
        if let Some(auto_refresh) = patch.auto_refresh {
            self.auto_refresh = auto_refresh;
        }
        if let Some(drop_time) = &patch.drop_time {
            self.drop_time = drop_time.trim().to_string();
        }
        if let Some(multi_order) = patch.multi_order {
            self.multi_order = multi_order;
        }
        before != *self
    }

    /// Project the requested keys into a partial record.
    pub fn project(&self, keys: &[ConfigKey]) -> ConfigPatch {
        let mut patch = ConfigPatch::default();
        for key in keys {
            match key {
                ConfigKey::Enabled => patch.enabled = Some(self.enabled),
                ConfigKey::ClickDelay => patch.click_delay_ms = Some(self.click_delay_ms),
                ConfigKey::AutoRefresh => patch.auto_refresh = Some(self.auto_refresh),
                ConfigKey::DropTime => patch.drop_time = Some(self.drop_time.clone()),
                ConfigKey::MultiOrder => patch.multi_order = Some(self.multi_order),
            }
        }
        patch
    }
}

/// Partial [`AgentConfig`]: the unit of `get` results and `set` requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(rename = "autoClickerEnabled", skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(rename = "clickDelay", skip_serializing_if = "Option::is_none")]
    pub click_delay_ms: Option<u64>,
    #[serde(rename = "autoRefreshEnabled", skip_serializing_if = "Option::is_none")]
    pub auto_refresh: Option<bool>,
    #[serde(rename = "dropTime", skip_serializing_if = "Option::is_none")]
    pub drop_time: Option<String>,
    #[serde(rename = "multiOrderEnabled", skip_serializing_if = "Option::is_none")]
    pub multi_order: Option<bool>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        *self == ConfigPatch::default()
    }

    pub fn auto_refresh(value: bool) -> Self {
        Self {
            auto_refresh: Some(value),
            ..Self::default()
        }
    }
}

impl From<AgentConfig> for ConfigPatch {
    fn from(config: AgentConfig) -> Self {
        config.project(ConfigKey::ALL)
    }
}

/// Addressable fields of [`AgentConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigKey {
    Enabled,
    ClickDelay,
    AutoRefresh,
    DropTime,
    MultiOrder,
}

impl ConfigKey {
    pub const ALL: &'static [ConfigKey] = &[
        ConfigKey::Enabled,
        ConfigKey::ClickDelay,
        ConfigKey::AutoRefresh,
        ConfigKey::DropTime,
        ConfigKey::MultiOrder,
    ];

    /// Key name used in the persisted record.
    pub fn storage_key(&self) -> &'static str {
        match self {
            ConfigKey::Enabled => "autoClickerEnabled",
            ConfigKey::ClickDelay => "clickDelay",
            ConfigKey::AutoRefresh => "autoRefreshEnabled",
            ConfigKey::DropTime => "dropTime",
            ConfigKey::MultiOrder => "multiOrderEnabled",
        }
    }
}

impl std::str::FromStr for ConfigKey {
    type Err = ConfigError;

    /// Accepts the storage key or its snake_case field name.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key = raw.trim();
        ConfigKey::ALL
            .iter()
            .copied()
            .find(|candidate| {
                candidate.storage_key().eq_ignore_ascii_case(key) || candidate.field_name() == key
            })
            .ok_or_else(|| ConfigError::InvalidValue {
                path: key.to_string(),
                reason: "unknown config key".into(),
            })
    }
}

impl ConfigKey {
    pub fn field_name(&self) -> &'static str {
        match self {
            ConfigKey::Enabled => "enabled",
            ConfigKey::ClickDelay => "click_delay",
            ConfigKey::AutoRefresh => "auto_refresh",
            ConfigKey::DropTime => "drop_time",
            ConfigKey::MultiOrder => "multi_order",
        }
    }

    /// Parse `raw` as this key's value into a single-field patch.
    pub fn patch(&self, raw: &str) -> Result<ConfigPatch, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            path: self.storage_key().to_string(),
            reason,
        };
        let flag = |raw: &str| match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" | "1" => Ok(true),
            "false" | "off" | "no" | "0" => Ok(false),
            other => Err(invalid(format!("expected a boolean, got '{}'", other))),
        };
        let mut patch = ConfigPatch::default();
        match self {
            ConfigKey::Enabled => patch.enabled = Some(flag(raw)?),
            ConfigKey::ClickDelay => {
                let delay = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|err| invalid(err.to_string()))?;
                patch.click_delay_ms = Some(delay);
            }
            ConfigKey::AutoRefresh => patch.auto_refresh = Some(flag(raw)?),
            ConfigKey::DropTime => patch.drop_time = Some(raw.trim().to_string()),
            ConfigKey::MultiOrder => patch.multi_order = Some(flag(raw)?),
        }
        Ok(patch)
    }
}

/// Tuned constants of the agent. None of these generalize beyond the page they
/// were measured against, so all of them are overridable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPolicy {
    pub executor: ExecutorPolicy,
    pub success: SuccessPolicy,
    pub cadence: CadencePolicy,
    pub controller: ControllerPolicy,
    pub locator: LocatorPolicy,
    pub host: HostPolicy,
}

impl Default for AgentPolicy {
    fn default() -> Self {
        crate::defaults::default_policy()
    }
}

impl AgentPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.executor.validate()?;
        self.cadence.validate()?;
        if self.controller.backstop_poll_ms == 0 {
            return Err(invalid("controller.backstop_poll_ms", "must be positive"));
        }
        if self.host.mutation_poll_ms == 0 {
            return Err(invalid("host.mutation_poll_ms", "must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorPolicy {
    /// Interval between checkout lookups after the add-to-cart click.
    pub checkout_poll_ms: u64,
    /// Lookups before the cycle gives up with a click timeout.
    pub checkout_max_attempts: u32,
    /// Delay before the defensive second add-to-cart click.
    pub reclick_guard_ms: u64,
    /// Delay between the checkout click and the success check.
    pub success_check_delay_ms: u64,
}

impl Default for ExecutorPolicy {
    fn default() -> Self {
        crate::defaults::default_policy().executor
    }
}

impl ExecutorPolicy {
    pub fn checkout_poll(&self) -> Duration {
        Duration::from_millis(self.checkout_poll_ms)
    }

    pub fn reclick_guard(&self) -> Duration {
        Duration::from_millis(self.reclick_guard_ms)
    }

    pub fn success_check_delay(&self) -> Duration {
        Duration::from_millis(self.success_check_delay_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.checkout_poll_ms == 0 {
            return Err(invalid("executor.checkout_poll_ms", "must be positive"));
        }
        if self.checkout_max_attempts == 0 {
            return Err(invalid("executor.checkout_max_attempts", "must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuccessPolicy {
    /// Wait between detecting a confirmation and navigating back.
    pub settle_ms: u64,
    /// Wait between the back navigation and the forced reload.
    pub reload_after_back_ms: u64,
    /// Lowercase phrases that mark a confirmation page.
    pub phrases: Vec<String>,
    /// Lowercase URL fragments that mark a confirmation destination.
    pub url_signals: Vec<String>,
    /// Selector of a dedicated confirmation marker element.
    pub marker_selector: String,
}

impl Default for SuccessPolicy {
    fn default() -> Self {
        crate::defaults::default_policy().success
    }
}

/// Reload cadence bands of the drop scheduler.
///
/// `time_diff` is the drop moment minus now:
/// - above `prep_threshold_ms`: `far_delay_ms`
/// - above `hot_threshold_ms`: `prep_delay_ms`
/// - above zero: `time_diff - hot_lead_ms`, clamped to `[hot_min_delay_ms, hot_max_delay_ms]`
/// - at or past zero: `turbo_delay_ms`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadencePolicy {
    /// How long past the drop a single-order hunt keeps going.
    pub grace_window_ms: u64,
    pub far_delay_ms: u64,
    pub prep_threshold_ms: u64,
    pub prep_delay_ms: u64,
    pub hot_threshold_ms: u64,
    pub hot_lead_ms: u64,
    pub hot_min_delay_ms: u64,
    pub hot_max_delay_ms: u64,
    pub turbo_delay_ms: u64,
}

impl Default for CadencePolicy {
    fn default() -> Self {
        crate::defaults::default_policy().cadence
    }
}

impl CadencePolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prep_threshold_ms < self.hot_threshold_ms {
            return Err(invalid(
                "cadence.prep_threshold_ms",
                "must not be below cadence.hot_threshold_ms",
            ));
        }
        if self.hot_min_delay_ms > self.hot_max_delay_ms {
            return Err(invalid(
                "cadence.hot_min_delay_ms",
                "must not exceed cadence.hot_max_delay_ms",
            ));
        }
        let chain = [
            ("cadence.far_delay_ms", self.far_delay_ms),
            ("cadence.prep_delay_ms", self.prep_delay_ms),
            ("cadence.hot_max_delay_ms", self.hot_max_delay_ms),
            ("cadence.hot_min_delay_ms", self.hot_min_delay_ms),
            ("cadence.turbo_delay_ms", self.turbo_delay_ms),
        ];
        for pair in chain.windows(2) {
            if pair[1].1 > pair[0].1 {
                return Err(invalid(
                    pair[1].0,
                    &format!("must not exceed {} (bands tighten toward the drop)", pair[0].0),
                ));
            }
        }
        if self.turbo_delay_ms == 0 {
            return Err(invalid("cadence.turbo_delay_ms", "must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerPolicy {
    /// Backstop trigger and config re-read interval.
    pub backstop_poll_ms: u64,
}

impl Default for ControllerPolicy {
    fn default() -> Self {
        crate::defaults::default_policy().controller
    }
}

impl ControllerPolicy {
    pub fn backstop_poll(&self) -> Duration {
        Duration::from_millis(self.backstop_poll_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorPolicy {
    /// Structural selectors for the add-to-cart control, most specific first.
    pub add_to_cart_selectors: Vec<String>,
    pub add_to_cart_keywords: Vec<String>,
    pub checkout_selectors: Vec<String>,
    pub checkout_keywords: Vec<String>,
    /// Selector covering every element that can act as a button.
    pub clickable_selector: String,
}

impl Default for LocatorPolicy {
    fn default() -> Self {
        crate::defaults::default_policy().locator
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostPolicy {
    /// How often a browser host samples its injected mutation counter.
    pub mutation_poll_ms: u64,
}

impl Default for HostPolicy {
    fn default() -> Self {
        crate::defaults::default_policy().host
    }
}

fn invalid(path: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}
