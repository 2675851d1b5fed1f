use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use dropclick_config_center::{load_policy, AgentPolicy, FileConfigStore};
use tracing::info;

use crate::cli::output::OutputFormat;

const APP_DIR: &str = "dropclick";
const POLICY_FILE: &str = "policy.yaml";

/// Global flags shared by every command.
#[derive(Debug, Clone)]
pub struct CliContext {
    policy_path: Option<PathBuf>,
    store_path: Option<PathBuf>,
    output: OutputFormat,
}

impl CliContext {
    pub fn new(
        policy_path: Option<PathBuf>,
        store_path: Option<PathBuf>,
        output: OutputFormat,
    ) -> Self {
        Self {
            policy_path,
            store_path,
            output,
        }
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    /// Defaults, the policy file and `DROPCLICK_POLICY__*` overrides.
    ///
    /// An explicit `--config` must exist; the default location is optional.
    pub fn load_policy(&self) -> Result<AgentPolicy> {
        let path = match &self.policy_path {
            Some(path) => {
                if !path.exists() {
                    bail!("policy file not found: {}", path.display());
                }
                Some(path.clone())
            }
            None => default_policy_path(),
        };
        let policy = load_policy(path.as_deref()).context("Failed to load agent policy")?;
        if let Some(path) = path.as_deref().filter(|path| path.exists()) {
            info!("Loaded policy from: {}", path.display());
        }
        Ok(policy)
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => FileConfigStore::default_path().context("Failed to resolve settings path"),
        }
    }

    pub fn open_store(&self) -> Result<Arc<FileConfigStore>> {
        let path = self.store_path()?;
        let store = FileConfigStore::open(&path)
            .with_context(|| format!("Failed to open settings at {}", path.display()))?;
        Ok(Arc::new(store))
    }
}

fn default_policy_path() -> Option<PathBuf> {
    let mut path = dirs::config_dir()?;
    path.push(APP_DIR);
    path.push(POLICY_FILE);
    Some(path)
}
