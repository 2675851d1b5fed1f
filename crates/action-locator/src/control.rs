use std::sync::Arc;

use cdp_adapter::{ElementSnapshot, HostDocument, HostError};
use dropclick_core_types::ElementId;

use crate::interactivity::is_interactive;
use crate::types::Target;

/// Handle to a located control: what it looked like when found, plus the
/// document it lives in.
#[derive(Clone)]
pub struct Control {
    target: Target,
    strategy: &'static str,
    snapshot: ElementSnapshot,
    host: Arc<dyn HostDocument>,
}

impl Control {
    pub fn new(
        target: Target,
        strategy: &'static str,
        snapshot: ElementSnapshot,
        host: Arc<dyn HostDocument>,
    ) -> Self {
        Self {
            target,
            strategy,
            snapshot,
            host,
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Name of the strategy that produced this control.
    pub fn strategy(&self) -> &'static str {
        self.strategy
    }

    pub fn id(&self) -> &ElementId {
        &self.snapshot.id
    }

    pub fn text(&self) -> &str {
        self.snapshot.text.trim()
    }

    pub fn snapshot(&self) -> &ElementSnapshot {
        &self.snapshot
    }

    /// Interactivity as of the moment the control was located.
    pub fn is_interactive(&self) -> bool {
        is_interactive(&self.snapshot)
    }

    /// Re-reads the live element. `false` once it is detached or inert.
    pub async fn is_still_interactive(&self) -> Result<bool, HostError> {
        Ok(self
            .host
            .inspect(self.id())
            .await?
            .map_or(false, |live| is_interactive(&live)))
    }

    pub async fn click(&self) -> Result<(), HostError> {
        self.host.click(self.id()).await
    }
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Control")
            .field("target", &self.target)
            .field("strategy", &self.strategy)
            .field("id", &self.snapshot.id)
            .field("text", &self.text())
            .finish()
    }
}
