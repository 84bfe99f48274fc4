// Background scheduler: periodic resource analysis of every active account.
// Ticks on a cron expression (local time) or a fixed interval. A failed tick never stops the loop.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::account_repo::AccountRepo;
use crate::config::ScheduleConfig;
use crate::coordinator::RunCoordinator;
use crate::models::RunStatus;

/// Outcome counts for one pass over the active accounts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub accounts: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Spawns the scheduler. Returns a join handle.
pub fn spawn(
    accounts: Arc<AccountRepo>,
    coordinator: Arc<RunCoordinator>,
    config: ScheduleConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(accounts, coordinator, config).await;
    })
}

#[instrument(skip_all, fields(cron = ?config.cron, interval_secs = config.interval_secs))]
async fn run(accounts: Arc<AccountRepo>, coordinator: Arc<RunCoordinator>, config: ScheduleConfig) {
    let (tick_tx, mut tick_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(ticker(config, tick_tx));

    while tick_rx.recv().await.is_some() {
        match run_one_tick(&accounts, &coordinator).await {
            Ok(summary) => info!(
                accounts = summary.accounts,
                completed = summary.completed,
                failed = summary.failed,
                "scheduled analysis complete"
            ),
            Err(e) => warn!(error = %e, "scheduled analysis tick failed"),
        }
    }
}

/// Sends a message on `tx` at each tick time (cron or fixed interval). Uses local time for cron.
async fn ticker(config: ScheduleConfig, tx: tokio::sync::mpsc::Sender<()>) {
    if let Some(ref cron_str) = config.cron {
        let Ok(schedule) = cron::Schedule::from_str(cron_str) else {
            warn!(cron = %cron_str, "invalid schedule.cron; scheduled analysis will not run");
            return;
        };
        loop {
            let now = chrono::Local::now();
            let next = schedule.after(&now).next();
            if let Some(next) = next {
                let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
                tokio::time::sleep(delay).await;
                if tx.send(()).await.is_err() {
                    break;
                }
            } else {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    } else {
        let interval = Duration::from_secs(config.interval_secs.max(1));
        loop {
            tokio::time::sleep(interval).await;
            if tx.send(()).await.is_err() {
                break;
            }
        }
    }
}

/// Analyze every active account once, in id order. Listing failure fails the tick; a failed
/// run only counts against its own account.
pub async fn run_one_tick(
    accounts: &AccountRepo,
    coordinator: &RunCoordinator,
) -> anyhow::Result<TickSummary> {
    let active = accounts.list_active().await?;
    let mut summary = TickSummary {
        accounts: active.len(),
        ..Default::default()
    };

    for record in &active {
        let run = coordinator
            .track_resource_analysis(&record.to_account(), Utc::now())
            .await;
        if run.status() == RunStatus::Completed {
            summary.completed += 1;
        } else {
            summary.failed += 1;
        }
        if let Err(e) = accounts.mark_analyzed(record.id, Utc::now()).await {
            warn!(error = %e, account = record.id, "failed to record analysis time");
        }
    }
    Ok(summary)
}
