// Cache cluster heuristics: topology and snapshot retention.

use async_trait::async_trait;

use super::{EvalContext, Rule, RuleSet, finding_for};
use crate::gateway::{GatewayError, Inventory};
use crate::models::{CacheCluster, Finding, Severity};

pub const MIN_SNAPSHOT_RETENTION_DAYS: u32 = 7;

pub fn rules<G: Inventory<CacheCluster>>() -> RuleSet<CacheCluster, G> {
    vec![Box::new(SingleNode), Box::new(LowSnapshotRetention)]
}

pub struct SingleNode;

#[async_trait]
impl<G: Inventory<CacheCluster>> Rule<CacheCluster, G> for SingleNode {
    fn name(&self) -> &'static str {
        "cache.single_node"
    }

    async fn evaluate(
        &self,
        item: &CacheCluster,
        _ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        if !item.engine.eq_ignore_ascii_case("redis") || item.cluster_mode {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::High)
                .state("Single-node Redis deployment")
                .action("Consider using Redis cluster mode for high availability")
                .details(format!("engine {} {}", item.engine, item.engine_version))
                .build(),
        ))
    }
}

pub struct LowSnapshotRetention;

#[async_trait]
impl<G: Inventory<CacheCluster>> Rule<CacheCluster, G> for LowSnapshotRetention {
    fn name(&self) -> &'static str {
        "cache.low_snapshot_retention"
    }

    async fn evaluate(
        &self,
        item: &CacheCluster,
        _ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        if item.snapshot_retention_days >= MIN_SNAPSHOT_RETENTION_DAYS {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::Medium)
                .state("Low backup retention")
                .action("Increase snapshot retention period")
                .details(format!(
                    "retention {} days, minimum {}",
                    item.snapshot_retention_days, MIN_SNAPSHOT_RETENTION_DAYS
                ))
                .build(),
        ))
    }
}
