use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use dropclick_config_center::{AgentConfig, ConfigKey, ConfigPatch, ConfigStore};
use serde_json::Value as JsonValue;
use tracing::info;

use crate::cli::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the current settings
    Show,

    /// Print one setting
    Get {
        /// Setting name (`clickDelay` or `click_delay`)
        key: String,
    },

    /// Change one setting
    Set {
        /// Setting name (`autoClickerEnabled` or `enabled`)
        key: String,

        /// New value
        value: String,
    },

    /// Restore every setting to its default
    Reset,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    let store = ctx.open_store()?;
    match args.action {
        ConfigAction::Show => {
            let config = store.snapshot().await;
            print_config(ctx, &config)?;
        }
        ConfigAction::Get { key } => {
            let key: ConfigKey = key.parse()?;
            let patch = store.get(&[key]).await;
            let json = serde_json::to_value(&patch)?;
            let value = json.get(key.storage_key()).cloned().unwrap_or(JsonValue::Null);
            let rendered = ctx.output().render(&value, |value| match value {
                JsonValue::String(text) => text.clone(),
                other => other.to_string(),
            })?;
            println!("{}", rendered.trim_end());
        }
        ConfigAction::Set { key, value } => {
            let key: ConfigKey = key.parse()?;
            let patch = key.patch(&value)?;
            store
                .set(patch)
                .await
                .with_context(|| format!("Failed to save {}", key.storage_key()))?;
            info!("Updated setting {}", key.storage_key());
            print_config(ctx, &*store.snapshot().await)?;
        }
        ConfigAction::Reset => {
            store
                .set(ConfigPatch::from(AgentConfig::default()))
                .await
                .context("Failed to reset settings")?;
            print_config(ctx, &*store.snapshot().await)?;
        }
    }
    Ok(())
}

fn print_config(ctx: &CliContext, config: &AgentConfig) -> Result<()> {
    let rendered = ctx.output().render(config, human_config)?;
    println!("{}", rendered.trim_end());
    Ok(())
}

fn human_config(config: &AgentConfig) -> String {
    let drop_time = if config.drop_time.is_empty() {
        "-"
    } else {
        config.drop_time.as_str()
    };
    [
        (ConfigKey::Enabled, config.enabled.to_string()),
        (ConfigKey::ClickDelay, format!("{} ms", config.click_delay_ms)),
        (ConfigKey::AutoRefresh, config.auto_refresh.to_string()),
        (ConfigKey::DropTime, drop_time.to_string()),
        (ConfigKey::MultiOrder, config.multi_order.to_string()),
    ]
    .iter()
    .map(|(key, value)| format!("{:<20} {}", key.storage_key(), value))
    .collect::<Vec<_>>()
    .join("\n")
}
