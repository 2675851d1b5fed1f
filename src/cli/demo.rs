use std::sync::Arc;
use std::time::Duration;

use agent_core::{AgentController, AgentState, AgentStatus};
use anyhow::{Context, Result};
use cdp_adapter::MemoryDocument;
use chrono::{NaiveDateTime, Timelike};
use clap::Args;
use dropclick_config_center::{AgentConfig, ConfigStore, InMemoryConfigStore};
use dropclick_scheduler::{Clock, LocalClock};
use serde::Serialize;
use tokio::time::Instant;
use tracing::info;

use crate::cli::context::CliContext;
use crate::cli::run::{apply_overrides, supervise_until, ConfigOverrides};
use crate::cli::storefront::Storefront;

#[derive(Args, Clone, Debug)]
pub struct DemoArgs {
    /// Time from now until the drop opens
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub lead: Duration,

    /// Delay between the add-to-cart click and the checkout link showing up
    #[arg(long, default_value = "400ms", value_parser = humantime::parse_duration)]
    pub checkout_lag: Duration,

    /// The page unlocks itself at the drop instead of waiting for a reload
    #[arg(long)]
    pub live: bool,

    /// Give up after this long
    #[arg(long, default_value = "60s", value_parser = humantime::parse_duration)]
    pub duration: Duration,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Serialize)]
struct DemoReport {
    drop_time: String,
    status: AgentStatus,
    reloads: usize,
    clicks: Vec<ClickLine>,
}

#[derive(Debug, Serialize)]
struct ClickLine {
    target: String,
    text: String,
    /// Milliseconds after the drop opened; negative means before.
    offset_ms: i64,
}

pub async fn cmd_demo(args: DemoArgs, ctx: &CliContext) -> Result<()> {
    let policy = ctx.load_policy()?;
    let clock: Arc<dyn Clock> = Arc::new(LocalClock);

    let drop_at = drop_moment(clock.now(), args.lead)?;
    let drop_time = drop_at.format("%H:%M:%S").to_string();
    let started = Instant::now();
    let drop_instant = started
        + (drop_at - clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);

    let shop = Storefront {
        drop_at,
        checkout_lag: args.checkout_lag,
        live_open: args.live,
    };
    let doc = shop.open(Arc::clone(&clock));

    let store = InMemoryConfigStore::shared(AgentConfig {
        enabled: true,
        auto_refresh: !args.live,
        drop_time: drop_time.clone(),
        ..AgentConfig::default()
    });
    apply_overrides(store.as_ref(), &args.overrides).await?;
    let multi_order = store.subscribe().borrow().multi_order;
    info!(%drop_time, live = args.live, multi_order, "demo storefront ready");

    let controller = Arc::new(
        AgentController::new(doc.clone(), store, policy)
            .context("Failed to build agent")?
            .with_clock(clock),
    );
    let mut states = controller.state();
    let finished = async move {
        if multi_order {
            std::future::pending::<()>().await;
        }
        let _ = states.wait_for(|state| *state == AgentState::Done).await;
    };
    let status = supervise_until(controller, Some(args.duration), finished).await;

    let report = DemoReport {
        drop_time,
        status,
        reloads: doc.reload_count(),
        clicks: click_lines(&doc, drop_instant),
    };
    let rendered = ctx.output().render(&report, human_report)?;
    println!("{}", rendered.trim_end());
    Ok(())
}

/// Whole second at least `lead` from `now`, since drop times carry no fraction.
fn drop_moment(now: NaiveDateTime, lead: Duration) -> Result<NaiveDateTime> {
    let lead = chrono::Duration::from_std(lead).context("lead is too long")?;
    let target = now + lead + chrono::Duration::seconds(1);
    Ok(target.with_nanosecond(0).unwrap_or(target))
}

fn click_lines(doc: &MemoryDocument, drop_instant: Instant) -> Vec<ClickLine> {
    doc.clicks()
        .into_iter()
        .map(|click| {
            let offset_ms = if click.at >= drop_instant {
                (click.at - drop_instant).as_millis() as i64
            } else {
                -((drop_instant - click.at).as_millis() as i64)
            };
            ClickLine {
                target: click.key.unwrap_or_else(|| click.id.to_string()),
                text: click.text,
                offset_ms,
            }
        })
        .collect()
}

fn human_report(report: &DemoReport) -> String {
    let mut lines = vec![
        format!("drop time: {}", report.drop_time),
        format!("final state: {}", report.status.state),
        format!(
            "cycles: {} started, {} checked out, {} aborted, {} orders confirmed",
            report.status.cycles_started,
            report.status.checkouts,
            report.status.cycles_aborted,
            report.status.successes
        ),
        format!("reloads: {}", report.reloads),
    ];
    for click in &report.clicks {
        lines.push(format!(
            "  {:+6} ms  {:<10} {}",
            click.offset_ms, click.target, click.text
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn drop_moment_rounds_to_a_whole_second_past_the_lead() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|date| date.and_hms_milli_opt(11, 59, 54, 250))
            .unwrap();
        let drop_at = drop_moment(now, Duration::from_secs(5)).unwrap();
        assert_eq!(drop_at.format("%H:%M:%S%.3f").to_string(), "12:00:00.000");
        assert!(drop_at - now >= chrono::Duration::seconds(5));
    }
}
