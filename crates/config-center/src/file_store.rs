use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::api::ConfigStore;
use crate::errors::ConfigError;
use crate::model::{AgentConfig, ConfigKey, ConfigPatch};

const APP_DIR: &str = "dropclick";
const FILE_NAME: &str = "agent.json";

/// [`ConfigStore`] persisted as a JSON document, written through on every change.
///
/// Other processes may edit the same file. Every `set` starts from the file's
/// current contents, and [`ConfigStore::refresh`] publishes outside edits.
pub struct FileConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    watch_tx: watch::Sender<Arc<AgentConfig>>,
}

impl FileConfigStore {
    /// Default location under the user's configuration directory.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| ConfigError::Io("no configuration directory on this platform".into()))?;
        path.push(APP_DIR);
        path.push(FILE_NAME);
        Ok(path)
    }

    /// Open the store at `path`. A missing file yields the default record.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = read_config(&path)?;
        info!(path = %path.display(), "agent config loaded");
        let (watch_tx, _watch_rx) = watch::channel(Arc::new(config));
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
            watch_tx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, config: &AgentConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| ConfigError::Io(format!("{}: {}", parent.display(), err)))?;
        }
        let body = serde_json::to_vec_pretty(config)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        // readers in other processes must never see a half-written record
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, body)
            .await
            .map_err(|err| ConfigError::Io(format!("{}: {}", staging.display(), err)))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|err| ConfigError::Io(format!("{}: {}", self.path.display(), err)))
    }

    /// Current file contents; `None` while the file does not exist.
    async fn read_disk(&self) -> Result<Option<AgentConfig>, ConfigError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ConfigError::Io(format!("{}: {}", self.path.display(), err))),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| ConfigError::Invalid(format!("{}: {}", self.path.display(), err)))
    }

    /// Publish `config` if it differs from what subscribers last saw.
    fn publish(&self, config: AgentConfig) -> bool {
        self.watch_tx.send_if_modified(|current| {
            if **current == config {
                return false;
            }
            *current = Arc::new(config);
            true
        })
    }
}

fn read_config(path: &Path) -> Result<AgentConfig, ConfigError> {
    if !path.exists() {
        return Ok(AgentConfig::default());
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|err| ConfigError::Io(format!("{}: {}", path.display(), err)))?;
    if raw.trim().is_empty() {
        return Ok(AgentConfig::default());
    }
    serde_json::from_str(&raw).map_err(|err| ConfigError::Invalid(format!("{}: {}", path.display(), err)))
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn get(&self, keys: &[ConfigKey]) -> ConfigPatch {
        self.watch_tx.borrow().project(keys)
    }

    async fn snapshot(&self) -> Arc<AgentConfig> {
        Arc::clone(&self.watch_tx.borrow())
    }

    async fn set(&self, patch: ConfigPatch) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().await;
        let mut next = match self.read_disk().await? {
            Some(on_disk) => on_disk,
            None => (**self.watch_tx.borrow()).clone(),
        };
        if next.apply(&patch) {
            self.persist(&next).await?;
            debug!(?patch, path = %self.path.display(), "agent config persisted");
        }
        self.publish(next);
        Ok(())
    }

    async fn refresh(&self) -> Result<bool, ConfigError> {
        let _guard = self.write_lock.lock().await;
        let Some(on_disk) = self.read_disk().await? else {
            return Ok(false);
        };
        let changed = self.publish(on_disk);
        if changed {
            info!(path = %self.path.display(), "agent config changed on disk");
        }
        Ok(changed)
    }

    fn subscribe(&self) -> watch::Receiver<Arc<AgentConfig>> {
        self.watch_tx.subscribe()
    }
}
