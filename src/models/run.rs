// AnalysisRun: one engine invocation and its lifecycle (PENDING -> RUNNING -> COMPLETED | FAILED).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::finding::Finding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(RunStatus::Pending),
            "RUNNING" => Some(RunStatus::Running),
            "COMPLETED" => Some(RunStatus::Completed),
            "FAILED" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which engine path produced the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    CostAggregation,
    ResourceRules,
}

impl RunKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RunKind::CostAggregation => "cost_aggregation",
            RunKind::ResourceRules => "resource_rules",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cost_aggregation" => Some(RunKind::CostAggregation),
            "resource_rules" => Some(RunKind::ResourceRules),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RunError {
    #[error("illegal run transition {from} -> {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },
}

/// Totals are only present once the run is COMPLETED and are never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRun {
    pub(crate) id: Option<i64>,
    pub(crate) account_id: String,
    pub(crate) kind: RunKind,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) end_time: DateTime<Utc>,
    pub(crate) status: RunStatus,
    pub(crate) total_cost: Option<f64>,
    pub(crate) total_savings: Option<f64>,
    pub(crate) error_message: Option<String>,
    pub(crate) findings: Vec<Finding>,
}

impl AnalysisRun {
    pub fn new(
        account_id: impl Into<String>,
        kind: RunKind,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            account_id: account_id.into(),
            kind,
            start_time,
            end_time,
            status: RunStatus::Pending,
            total_cost: None,
            total_savings: None,
            error_message: None,
            findings: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn kind(&self) -> RunKind {
        self.kind
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn total_cost(&self) -> Option<f64> {
        self.total_cost
    }

    pub fn total_savings(&self) -> Option<f64> {
        self.total_savings
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub(crate) fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    /// PENDING -> RUNNING.
    pub fn start(&mut self) -> Result<(), RunError> {
        self.transition(RunStatus::Running)
    }

    /// RUNNING -> COMPLETED. Totals are summed over the findings here, once.
    pub fn complete(&mut self, findings: Vec<Finding>) -> Result<(), RunError> {
        self.transition(RunStatus::Completed)?;
        self.total_cost = Some(findings.iter().map(|f| f.current_cost).sum());
        self.total_savings = Some(findings.iter().map(|f| f.potential_savings).sum());
        self.findings = findings;
        Ok(())
    }

    /// RUNNING -> FAILED, keeping whatever findings were produced before the error.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        partial: Vec<Finding>,
    ) -> Result<(), RunError> {
        self.transition(RunStatus::Failed)?;
        self.error_message = Some(message.into());
        self.findings = partial;
        Ok(())
    }

    fn transition(&mut self, to: RunStatus) -> Result<(), RunError> {
        let allowed = matches!(
            (self.status, to),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
        );
        if !allowed {
            return Err(RunError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceFamily, Severity};

    fn run() -> AnalysisRun {
        let now = Utc::now();
        AnalysisRun::new("123456789012", RunKind::ResourceRules, now, now)
    }

    fn finding(cost: f64, savings: f64) -> Finding {
        Finding::builder(ResourceFamily::Compute, "i-1", Severity::High)
            .costs(cost, savings)
            .build()
    }

    #[test]
    fn complete_sums_totals() {
        let mut r = run();
        r.start().unwrap();
        r.complete(vec![finding(100.0, 20.0), finding(50.5, 10.1)])
            .unwrap();
        assert_eq!(r.status(), RunStatus::Completed);
        assert_eq!(r.total_cost(), Some(150.5));
        assert!((r.total_savings().unwrap() - 30.1).abs() < 1e-9);
    }

    #[test]
    fn totals_undefined_until_completed() {
        let mut r = run();
        assert_eq!(r.total_cost(), None);
        r.start().unwrap();
        r.fail("boom", vec![finding(1.0, 1.0)]).unwrap();
        assert_eq!(r.status(), RunStatus::Failed);
        assert_eq!(r.total_cost(), None);
        assert_eq!(r.error_message(), Some("boom"));
        assert_eq!(r.findings().len(), 1);
    }

    #[test]
    fn rejects_skipping_running() {
        let mut r = run();
        let err = r.complete(vec![]).unwrap_err();
        assert_eq!(
            err,
            RunError::InvalidTransition {
                from: RunStatus::Pending,
                to: RunStatus::Completed
            }
        );
    }

    #[test]
    fn terminal_states_are_final() {
        let mut r = run();
        r.start().unwrap();
        r.complete(vec![]).unwrap();
        assert!(r.fail("late", vec![]).is_err());
        assert!(r.start().is_err());
        assert_eq!(r.total_cost(), Some(0.0));
    }
}
