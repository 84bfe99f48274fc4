// Load balancer heuristics for active internet-facing balancers.

use async_trait::async_trait;

use super::{EvalContext, Rule, RuleSet, finding_for};
use crate::gateway::{GatewayError, LoadBalancerGateway};
use crate::models::{Finding, LoadBalancer, LoadBalancerState, Severity};

pub fn rules<G: LoadBalancerGateway>() -> RuleSet<LoadBalancer, G> {
    vec![Box::new(NoDeletionProtection), Box::new(NoHealthyTargets)]
}

fn in_scope(lb: &LoadBalancer) -> bool {
    lb.state == LoadBalancerState::Active && lb.is_internet_facing()
}

pub struct NoDeletionProtection;

#[async_trait]
impl<G: LoadBalancerGateway> Rule<LoadBalancer, G> for NoDeletionProtection {
    fn name(&self) -> &'static str {
        "load_balancer.no_deletion_protection"
    }

    async fn evaluate(
        &self,
        item: &LoadBalancer,
        _ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        if !in_scope(item) || item.deletion_protection {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::High)
                .state("Public load balancer without deletion protection")
                .action("Enable deletion protection for public load balancers")
                .build(),
        ))
    }
}

pub struct NoHealthyTargets;

#[async_trait]
impl<G: LoadBalancerGateway> Rule<LoadBalancer, G> for NoHealthyTargets {
    fn name(&self) -> &'static str {
        "load_balancer.no_healthy_targets"
    }

    async fn evaluate(
        &self,
        item: &LoadBalancer,
        ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        if !in_scope(item) {
            return Ok(None);
        }
        let healthy = ctx
            .limited(ctx.gateway.healthy_target_count(&item.arn))
            .await?;
        if healthy > 0 {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::Medium)
                .state("No healthy targets")
                .action("Consider removing idle load balancer if no longer needed")
                .details(format!("load balancer {}", item.name))
                .build(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lb(scheme: &str, state: LoadBalancerState) -> LoadBalancer {
        LoadBalancer {
            arn: "arn:lb/1".into(),
            name: "web".into(),
            scheme: scheme.into(),
            state,
            deletion_protection: false,
        }
    }

    #[test]
    fn only_active_public_balancers_are_in_scope() {
        assert!(in_scope(&lb("internet-facing", LoadBalancerState::Active)));
        assert!(!in_scope(&lb("internal", LoadBalancerState::Active)));
        assert!(!in_scope(&lb("internet-facing", LoadBalancerState::Provisioning)));
    }
}
