// Cost aggregation: daily spend per billed service, flagged above a fixed threshold.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::gateway::{CostGateway, GatewayError};
use crate::models::{Account, CostEntry, Finding, Granularity, ResourceType, Severity};

/// Entries strictly above this amount are flagged.
pub const HIGH_COST_THRESHOLD: f64 = 1000.0;
pub const SAVINGS_RATIO: f64 = 0.2;

pub struct CostAnalyzer {
    gateway: Arc<dyn CostGateway>,
}

impl CostAnalyzer {
    pub fn new(gateway: Arc<dyn CostGateway>) -> Self {
        Self { gateway }
    }

    /// One HIGH finding per (day, service) entry above the threshold, in gateway order.
    /// Gateway errors propagate: this path has no partial result to fall back on.
    #[instrument(skip(self, account), fields(account_id = %account.account_id))]
    pub async fn analyze(
        &self,
        account: &Account,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Finding>, GatewayError> {
        let entries = self
            .gateway
            .query_cost_by_service(account, start, end, Granularity::Daily)
            .await?;
        let findings: Vec<Finding> = entries.iter().filter_map(high_cost_finding).collect();
        info!(
            entries = entries.len(),
            findings = findings.len(),
            "cost aggregation finished"
        );
        Ok(findings)
    }
}

pub fn high_cost_finding(entry: &CostEntry) -> Option<Finding> {
    if entry.amount <= HIGH_COST_THRESHOLD {
        return None;
    }
    Some(
        Finding::builder(
            ResourceType::BilledService(entry.service.clone()),
            entry.service.clone(),
            Severity::High,
        )
        .state("High cost detected")
        .action("Review usage patterns, consider reserved capacity")
        .costs(entry.amount, entry.amount * SAVINGS_RATIO)
        .details(format!("{} on {}", entry.service, entry.date))
        .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(amount: f64) -> CostEntry {
        CostEntry {
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            service: "Amazon Relational Database Service".into(),
            amount,
        }
    }

    #[test]
    fn threshold_is_strict() {
        assert!(high_cost_finding(&entry(1000.0)).is_none());
        assert!(high_cost_finding(&entry(999.99)).is_none());
        assert!(high_cost_finding(&entry(1000.01)).is_some());
    }

    #[test]
    fn savings_are_twenty_percent() {
        let f = high_cost_finding(&entry(2500.0)).unwrap();
        assert_eq!(f.severity, Severity::High);
        assert_eq!(f.current_cost, 2500.0);
        assert!((f.potential_savings - 500.0).abs() < 1e-9);
        assert_eq!(
            f.resource_type,
            ResourceType::BilledService("Amazon Relational Database Service".into())
        );
    }
}
