use serde::Serialize;

/// Observable state of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Agent disabled.
    Idle,
    /// Enabled, waiting for the target control.
    Hunting,
    /// A cycle is in flight.
    Cycling,
    /// Checkout clicked in multi-order mode, waiting for the confirmation.
    AwaitingSuccess,
    /// Single-order hunt finished with a checkout click.
    Done,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AgentState::Idle => "idle",
            AgentState::Hunting => "hunting",
            AgentState::Cycling => "cycling",
            AgentState::AwaitingSuccess => "awaiting_success",
            AgentState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Where a cycle request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Mutation,
    Navigation,
    Scheduler,
    Backstop,
    /// The agent was switched on.
    Enabled,
}

impl TriggerSource {
    pub fn name(&self) -> &'static str {
        match self {
            TriggerSource::Mutation => "mutation",
            TriggerSource::Navigation => "navigation",
            TriggerSource::Scheduler => "scheduler",
            TriggerSource::Backstop => "backstop",
            TriggerSource::Enabled => "enabled",
        }
    }
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Snapshot of the controller, for status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentStatus {
    pub state: AgentState,
    pub cycles_started: u64,
    pub checkouts: u64,
    pub cycles_aborted: u64,
    pub successes: u64,
    pub reloads: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switching_on_is_its_own_trigger_source() {
        let sources = [
            TriggerSource::Mutation,
            TriggerSource::Navigation,
            TriggerSource::Scheduler,
            TriggerSource::Backstop,
            TriggerSource::Enabled,
        ];
        let mut names: Vec<_> = sources.iter().map(TriggerSource::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), sources.len());
        assert_eq!(TriggerSource::Enabled.to_string(), "enabled");
    }
}
