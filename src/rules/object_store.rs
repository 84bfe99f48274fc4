// Object store heuristics. Versioning and lifecycle configuration are fetched per bucket.

use async_trait::async_trait;

use super::{EvalContext, Rule, RuleSet, finding_for};
use crate::gateway::{GatewayError, ObjectStoreGateway};
use crate::models::{Bucket, Finding, Severity, VersioningStatus};

pub fn rules<G: ObjectStoreGateway>() -> RuleSet<Bucket, G> {
    vec![Box::new(VersioningDisabled), Box::new(NoLifecycleRules)]
}

pub struct VersioningDisabled;

#[async_trait]
impl<G: ObjectStoreGateway> Rule<Bucket, G> for VersioningDisabled {
    fn name(&self) -> &'static str {
        "object_store.versioning_disabled"
    }

    async fn evaluate(
        &self,
        item: &Bucket,
        ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        let status = ctx
            .limited(ctx.gateway.versioning_status(&item.name))
            .await?;
        if status == VersioningStatus::Enabled {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::High)
                .state("Versioning disabled")
                .action("Enable versioning for data protection")
                .build(),
        ))
    }
}

pub struct NoLifecycleRules;

#[async_trait]
impl<G: ObjectStoreGateway> Rule<Bucket, G> for NoLifecycleRules {
    fn name(&self) -> &'static str {
        "object_store.no_lifecycle_rules"
    }

    async fn evaluate(
        &self,
        item: &Bucket,
        ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        let count = ctx
            .limited(ctx.gateway.lifecycle_rule_count(&item.name))
            .await?;
        if count > 0 {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::Medium)
                .state("No lifecycle policies")
                .action("Configure lifecycle policies to optimize storage costs")
                .build(),
        ))
    }
}
