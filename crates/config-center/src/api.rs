use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::errors::ConfigError;
use crate::model::{AgentConfig, ConfigKey, ConfigPatch};

/// Key/value store holding the [`AgentConfig`] record.
///
/// `subscribe` is the change notification: every `set` that alters the record
/// publishes the new value to all receivers.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, keys: &[ConfigKey]) -> ConfigPatch;
    async fn snapshot(&self) -> Arc<AgentConfig>;
    async fn set(&self, patch: ConfigPatch) -> Result<(), ConfigError>;
    fn subscribe(&self) -> watch::Receiver<Arc<AgentConfig>>;

    /// Pick up edits made outside this process, publishing them like a `set`.
    ///
    /// Returns whether the record changed. Stores without an external backing
    /// never change here.
    async fn refresh(&self) -> Result<bool, ConfigError> {
        Ok(false)
    }
}

pub struct InMemoryConfigStore {
    // serializes read-modify-write sequences
    write_lock: Mutex<()>,
    watch_tx: watch::Sender<Arc<AgentConfig>>,
}

impl InMemoryConfigStore {
    pub fn new(config: AgentConfig) -> Self {
        let (watch_tx, _watch_rx) = watch::channel(Arc::new(config));
        Self {
            write_lock: Mutex::new(()),
            watch_tx,
        }
    }

    pub fn shared(config: AgentConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new(AgentConfig::default())
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get(&self, keys: &[ConfigKey]) -> ConfigPatch {
        self.watch_tx.borrow().project(keys)
    }

    async fn snapshot(&self) -> Arc<AgentConfig> {
        Arc::clone(&self.watch_tx.borrow())
    }

    async fn set(&self, patch: ConfigPatch) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().await;
        let mut next = (**self.watch_tx.borrow()).clone();
        if next.apply(&patch) {
            debug!(?patch, "agent config updated");
            self.watch_tx.send_replace(Arc::new(next));
        }
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Arc<AgentConfig>> {
        self.watch_tx.subscribe()
    }
}
