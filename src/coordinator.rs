// Run coordinator: owns one AnalysisRun from PENDING to a terminal state and persists it.
// This is the outermost catch boundary; nothing below it can make a run call panic or error out.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::cost_analyzer::CostAnalyzer;
use crate::models::{Account, AnalysisRun, Finding, RunKind};
use crate::orchestrator::Orchestrator;
use crate::rules::compute;
use crate::run_repo::RunRepo;

pub struct RunCoordinator {
    orchestrator: Arc<Orchestrator>,
    cost: CostAnalyzer,
    runs: Arc<RunRepo>,
}

impl RunCoordinator {
    pub fn new(orchestrator: Arc<Orchestrator>, cost: CostAnalyzer, runs: Arc<RunRepo>) -> Self {
        Self {
            orchestrator,
            cost,
            runs,
        }
    }

    /// Cost-aggregation path over `[start, end)`. Always returns a terminal run.
    pub async fn run_analysis(
        &self,
        account: &Account,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AnalysisRun {
        let run = AnalysisRun::new(
            account.account_id.clone(),
            RunKind::CostAggregation,
            start.and_time(NaiveTime::MIN).and_utc(),
            end.and_time(NaiveTime::MIN).and_utc(),
        );
        self.drive(run, async {
            anyhow::ensure!(
                start < end,
                "start date {} must be before end date {}",
                start,
                end
            );
            Ok::<_, anyhow::Error>(self.cost.analyze(account, start, end).await?)
        })
        .await
    }

    /// Resource-rule path. Family and rule failures are already contained below, so this
    /// only ever yields fewer findings, never an error.
    pub async fn run_resource_analysis(&self, account: &Account) -> Vec<Finding> {
        self.orchestrator.analyze(account).await
    }

    /// Resource-rule path recorded as a run over the compute lookback window ending `now`.
    pub async fn track_resource_analysis(
        &self,
        account: &Account,
        now: DateTime<Utc>,
    ) -> AnalysisRun {
        let run = AnalysisRun::new(
            account.account_id.clone(),
            RunKind::ResourceRules,
            now - Duration::days(i64::from(compute::LOOKBACK_DAYS)),
            now,
        );
        self.drive(run, async {
            Ok::<_, anyhow::Error>(self.orchestrator.analyze_at(account, now).await)
        })
        .await
    }

    async fn drive(
        &self,
        mut run: AnalysisRun,
        work: impl Future<Output = anyhow::Result<Vec<Finding>>>,
    ) -> AnalysisRun {
        if let Err(e) = run.start() {
            error!(error = %e, "run could not be started");
            return run;
        }

        match self.runs.insert_run(&run).await {
            Ok(id) => run.assign_id(id),
            Err(e) => {
                error!(error = %e, account_id = %run.account_id(), "failed to persist run start");
                if let Err(e) = run.fail(format!("failed to persist run: {}", e), Vec::new()) {
                    error!(error = %e, "run could not be failed");
                }
                return run;
            }
        }
        let run_id = run.id();

        let outcome = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(anyhow::anyhow!("analysis panicked: {}", panic_message(&*panic))),
        };

        let transition = match outcome {
            Ok(findings) => {
                info!(
                    run_id = ?run_id,
                    kind = run.kind().as_str(),
                    findings = findings.len(),
                    "run completed"
                );
                run.complete(findings)
            }
            Err(e) => {
                error!(run_id = ?run_id, kind = run.kind().as_str(), error = %e, "run failed");
                run.fail(e.to_string(), Vec::new())
            }
        };
        if let Err(e) = transition {
            error!(run_id = ?run_id, error = %e, "illegal run transition");
        }

        if let Err(e) = self.runs.finalize_run(&run).await {
            warn!(run_id = ?run_id, error = %e, "failed to persist run result");
        }
        run
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
