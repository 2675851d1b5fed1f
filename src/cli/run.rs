use std::sync::Arc;
use std::time::Duration;

use agent_core::{AgentController, AgentStatus};
use anyhow::{Context, Result};
use cdp_adapter::{ChromiumDocument, ChromiumOptions, HostDocument};
use clap::Args;
use dropclick_config_center::{ConfigPatch, ConfigStore};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::context::CliContext;

/// Settings applied to the store before the agent starts.
#[derive(Args, Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Turn the agent on or off
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub enabled: Option<bool>,

    /// Pause before the first click, in milliseconds
    #[arg(long, value_name = "MS")]
    pub click_delay: Option<u64>,

    /// Reload the page on a tightening cadence until the drop
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub auto_refresh: Option<bool>,

    /// Drop moment, HH:MM[:SS] local time
    #[arg(long, value_name = "TIME")]
    pub drop_time: Option<String>,

    /// Keep buying after each confirmed order
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub multi_order: Option<bool>,
}

impl ConfigOverrides {
    pub fn to_patch(&self) -> ConfigPatch {
        ConfigPatch {
            enabled: self.enabled,
            click_delay_ms: self.click_delay,
            auto_refresh: self.auto_refresh,
            drop_time: self.drop_time.clone(),
            multi_order: self.multi_order,
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Product page to hunt on
    pub url: String,

    /// Attach to a running browser over its DevTools websocket
    #[arg(long, value_name = "WS_URL")]
    pub connect: Option<String>,

    /// Launch Chromium without a window
    #[arg(long)]
    pub headless: bool,

    /// Stop after this long (e.g. `90s`, `15m`); runs until Ctrl-C otherwise
    #[arg(long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<()> {
    let policy = ctx.load_policy()?;
    let store = ctx.open_store()?;
    apply_overrides(store.as_ref(), &args.overrides).await?;

    let mut options = ChromiumOptions::new(args.url.clone());
    options.connect = args.connect.clone();
    options.headless = args.headless;
    options.mutation_poll = Duration::from_millis(policy.host.mutation_poll_ms);
    let host: Arc<dyn HostDocument> = ChromiumDocument::open(options)
        .await
        .with_context(|| format!("Failed to open {}", args.url))?;

    let controller = AgentController::new(host, store, policy).context("Failed to build agent")?;
    let status = supervise(Arc::new(controller), args.duration).await;
    print_status(ctx, &status)
}

pub(crate) async fn apply_overrides(store: &dyn ConfigStore, overrides: &ConfigOverrides) -> Result<()> {
    let patch = overrides.to_patch();
    if !patch.is_empty() {
        store
            .set(patch)
            .await
            .context("Failed to apply setting overrides")?;
    }
    Ok(())
}

/// Run the controller until Ctrl-C, the optional deadline, or `until` resolves.
pub(crate) async fn supervise_until<F>(
    controller: Arc<AgentController>,
    duration: Option<Duration>,
    until: F,
) -> AgentStatus
where
    F: std::future::Future<Output = ()>,
{
    let shutdown = CancellationToken::new();
    let mut agent = tokio::spawn(Arc::clone(&controller).run(shutdown.clone()));
    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        status = &mut agent => {
            return status.unwrap_or_else(|err| {
                warn!(%err, "agent task failed");
                controller.status()
            });
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(%err, "failed to listen for Ctrl-C");
            }
            info!("interrupted, stopping agent");
        }
        _ = deadline => info!("time limit reached, stopping agent"),
        _ = until => {}
    }

    shutdown.cancel();
    match agent.await {
        Ok(status) => status,
        Err(err) => {
            warn!(%err, "agent task failed");
            controller.status()
        }
    }
}

pub(crate) async fn supervise(controller: Arc<AgentController>, duration: Option<Duration>) -> AgentStatus {
    supervise_until(controller, duration, std::future::pending()).await
}

pub(crate) fn print_status(ctx: &CliContext, status: &AgentStatus) -> Result<()> {
    let rendered = ctx.output().render(status, |status| {
        format!(
            "state: {}\ncycles: {} started, {} checked out, {} aborted\norders confirmed: {}\nreloads: {}",
            status.state,
            status.cycles_started,
            status.checkouts,
            status.cycles_aborted,
            status.successes,
            status.reloads
        )
    })?;
    println!("{}", rendered.trim_end());
    Ok(())
}
