// Managed database heuristics: availability and maintenance posture.

use async_trait::async_trait;

use super::{EvalContext, Rule, RuleSet, finding_for};
use crate::gateway::{GatewayError, Inventory};
use crate::models::{DatabaseInstance, Finding, Severity};

pub fn rules<G: Inventory<DatabaseInstance>>() -> RuleSet<DatabaseInstance, G> {
    vec![Box::new(SingleAz), Box::new(MinorUpgradeDisabled)]
}

pub struct SingleAz;

#[async_trait]
impl<G: Inventory<DatabaseInstance>> Rule<DatabaseInstance, G> for SingleAz {
    fn name(&self) -> &'static str {
        "database.single_az"
    }

    async fn evaluate(
        &self,
        item: &DatabaseInstance,
        _ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        if item.multi_az {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::High)
                .state("Single-AZ deployment")
                .action("Consider enabling Multi-AZ for high availability")
                .build(),
        ))
    }
}

pub struct MinorUpgradeDisabled;

#[async_trait]
impl<G: Inventory<DatabaseInstance>> Rule<DatabaseInstance, G> for MinorUpgradeDisabled {
    fn name(&self) -> &'static str {
        "database.minor_upgrade_disabled"
    }

    async fn evaluate(
        &self,
        item: &DatabaseInstance,
        _ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        if item.auto_minor_version_upgrade {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::Medium)
                .state("Auto minor version upgrade disabled")
                .action("Enable auto minor version upgrade for better maintenance")
                .build(),
        ))
    }
}
