// Compute instance heuristics: utilization, generation, purchasing model, attachments, tagging.

use async_trait::async_trait;

use super::{EvalContext, Rule, RuleSet, finding_for};
use crate::gateway::{ComputeGateway, GatewayError};
use crate::models::{ComputeInstance, Finding, InstanceState, Severity, Statistic};

/// Compute metrics are sampled over the trailing 30 days.
pub const LOOKBACK_DAYS: u32 = 30;

pub const IDLE_CPU_PERCENT: f64 = 10.0;
/// Average hourly NetworkIn below this counts as "low network I/O".
pub const IDLE_NETWORK_IN: f64 = 1_000_000.0;
pub const OVERPROVISIONED_PERCENT: f64 = 40.0;
/// Summed NetworkOut over the lookback above this is flagged.
pub const HIGH_NETWORK_OUT: f64 = 1_000_000_000.0;
pub const HOURS_PER_MONTH: f64 = 730.0;

/// Old instance family -> current replacement.
pub const LEGACY_FAMILIES: &[(&str, &str)] = &[("t2", "t3"), ("m3", "m6i"), ("c4", "c7g")];

pub const ENVIRONMENT_TAG: &str = "Environment";
/// Presence of this tag means start/stop automation is configured.
pub const SCHEDULE_TAG: &str = "Schedule";
const NON_PRODUCTION: &[&str] = &["dev", "test", "staging"];

const EC2_NAMESPACE: &str = "AWS/EC2";
const AGENT_NAMESPACE: &str = "System/Linux";

/// Compute rules in evaluation order.
pub fn rules<G: ComputeGateway>() -> RuleSet<ComputeInstance, G> {
    vec![
        Box::new(IdleInstance),
        Box::new(Overprovisioned),
        Box::new(LegacyGeneration),
        Box::new(AlwaysOnDemand),
        Box::new(RegionalPricing),
        Box::new(StoppedWithStorage),
        Box::new(StoppedWithAddress),
        Box::new(NoAutoscaling),
        Box::new(SpotOpportunity),
        Box::new(AvailableReservations),
        Box::new(NonProductionWithoutSchedule),
        Box::new(HighNetworkOut),
    ]
}

pub fn legacy_replacement(family: &str) -> Option<&'static str> {
    LEGACY_FAMILIES
        .iter()
        .find(|(old, _)| *old == family)
        .map(|(_, new)| *new)
}

pub struct IdleInstance;

#[async_trait]
impl<G: ComputeGateway> Rule<ComputeInstance, G> for IdleInstance {
    fn name(&self) -> &'static str {
        "compute.idle"
    }

    async fn evaluate(
        &self,
        item: &ComputeInstance,
        ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        let id = &item.instance_id;
        let (cpu, network_in) = tokio::try_join!(
            ctx.metric(EC2_NAMESPACE, "CPUUtilization", id, Statistic::Average),
            ctx.metric(EC2_NAMESPACE, "NetworkIn", id, Statistic::Sum),
        )?;
        let (Some(avg_cpu), Some(avg_network_in)) = (cpu.average(), network_in.average()) else {
            return Ok(None);
        };
        if avg_cpu >= IDLE_CPU_PERCENT || avg_network_in >= IDLE_NETWORK_IN {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::High)
                .state("Idle instance (CPU < 10%, low network I/O)")
                .action("Consider stopping or terminating the instance")
                .details(format!(
                    "average CPU {:.2}%, average hourly NetworkIn {:.0} over {} days",
                    avg_cpu, avg_network_in, LOOKBACK_DAYS
                ))
                .build(),
        ))
    }
}

pub struct Overprovisioned;

#[async_trait]
impl<G: ComputeGateway> Rule<ComputeInstance, G> for Overprovisioned {
    fn name(&self) -> &'static str {
        "compute.overprovisioned"
    }

    async fn evaluate(
        &self,
        item: &ComputeInstance,
        ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        let id = &item.instance_id;
        let (cpu, memory) = tokio::try_join!(
            ctx.metric(EC2_NAMESPACE, "CPUUtilization", id, Statistic::Maximum),
            ctx.metric(AGENT_NAMESPACE, "MemoryUtilization", id, Statistic::Maximum),
        )?;
        let (Some(max_cpu), Some(max_memory)) = (cpu.max(), memory.max()) else {
            return Ok(None);
        };
        if max_cpu >= OVERPROVISIONED_PERCENT || max_memory >= OVERPROVISIONED_PERCENT {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::Medium)
                .state("Overprovisioned instance (low resource utilization)")
                .action("Consider downsizing to a smaller instance type")
                .details(format!(
                    "peak CPU {:.2}%, peak memory {:.2}%",
                    max_cpu, max_memory
                ))
                .build(),
        ))
    }
}

pub struct LegacyGeneration;

#[async_trait]
impl<G: ComputeGateway> Rule<ComputeInstance, G> for LegacyGeneration {
    fn name(&self) -> &'static str {
        "compute.legacy_generation"
    }

    async fn evaluate(
        &self,
        item: &ComputeInstance,
        _ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        let family = item.instance_family();
        let Some(replacement) = legacy_replacement(family) else {
            return Ok(None);
        };
        Ok(Some(
            finding_for(item, Severity::Medium)
                .state(format!(
                    "Using older generation instance family {} ({})",
                    family, item.instance_type
                ))
                .action(format!("Consider migrating to {} family", replacement))
                .build(),
        ))
    }
}

pub struct AlwaysOnDemand;

#[async_trait]
impl<G: ComputeGateway> Rule<ComputeInstance, G> for AlwaysOnDemand {
    fn name(&self) -> &'static str {
        "compute.always_on_demand"
    }

    async fn evaluate(
        &self,
        item: &ComputeInstance,
        ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        if !item.is_on_demand() {
            return Ok(None);
        }
        let cpu = ctx
            .metric(
                EC2_NAMESPACE,
                "CPUUtilization",
                &item.instance_id,
                Statistic::Average,
            )
            .await?;
        match cpu.average() {
            Some(avg) if avg > 0.0 => Ok(Some(
                finding_for(item, Severity::High)
                    .state("On-Demand instance running 24/7")
                    .action("Consider using Reserved Instances or Savings Plans")
                    .build(),
            )),
            _ => Ok(None),
        }
    }
}

pub struct RegionalPricing;

#[async_trait]
impl<G: ComputeGateway> Rule<ComputeInstance, G> for RegionalPricing {
    fn name(&self) -> &'static str {
        "compute.regional_pricing"
    }

    async fn evaluate(
        &self,
        item: &ComputeInstance,
        ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        let prices = ctx.pricing(&item.instance_type).await?;
        let region = &ctx.account.region;
        let (Some(current), Some(cheapest)) = (prices.price_in(region), prices.cheapest()) else {
            return Ok(None);
        };
        if cheapest.hourly_price >= current {
            return Ok(None);
        }
        let monthly = current * HOURS_PER_MONTH;
        let savings = (current - cheapest.hourly_price) * HOURS_PER_MONTH;
        Ok(Some(
            finding_for(item, Severity::Medium)
                .state(format!("Instance running in {}", region))
                .action(format!(
                    "Consider moving to a lower-cost region ({})",
                    cheapest.region
                ))
                .costs(monthly, savings)
                .details(format!(
                    "{} on-demand: {:.4}/h in {}, {:.4}/h in {}",
                    item.instance_type, current, region, cheapest.hourly_price, cheapest.region
                ))
                .build(),
        ))
    }
}

pub struct StoppedWithStorage;

#[async_trait]
impl<G: ComputeGateway> Rule<ComputeInstance, G> for StoppedWithStorage {
    fn name(&self) -> &'static str {
        "compute.stopped_with_storage"
    }

    async fn evaluate(
        &self,
        item: &ComputeInstance,
        ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        if item.state != InstanceState::Stopped {
            return Ok(None);
        }
        let volumes = ctx
            .limited(ctx.gateway.attached_volumes(&item.instance_id))
            .await?;
        if volumes.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::Medium)
                .state("Stopped instance with attached EBS volumes")
                .action("Consider creating snapshots and removing unused volumes")
                .details(format!("volumes: {}", volumes.join(", ")))
                .build(),
        ))
    }
}

pub struct StoppedWithAddress;

#[async_trait]
impl<G: ComputeGateway> Rule<ComputeInstance, G> for StoppedWithAddress {
    fn name(&self) -> &'static str {
        "compute.stopped_with_address"
    }

    async fn evaluate(
        &self,
        item: &ComputeInstance,
        ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        if item.state != InstanceState::Stopped {
            return Ok(None);
        }
        let addresses = ctx
            .limited(ctx.gateway.attached_addresses(&item.instance_id))
            .await?;
        if addresses.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::Medium)
                .state("Stopped instance with associated Elastic IP")
                .action("Consider releasing the Elastic IP")
                .details(format!("addresses: {}", addresses.join(", ")))
                .build(),
        ))
    }
}

pub struct NoAutoscaling;

#[async_trait]
impl<G: ComputeGateway> Rule<ComputeInstance, G> for NoAutoscaling {
    fn name(&self) -> &'static str {
        "compute.no_autoscaling"
    }

    async fn evaluate(
        &self,
        item: &ComputeInstance,
        ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        let group = ctx
            .limited(ctx.gateway.autoscaling_group(&item.instance_id))
            .await?;
        if group.is_some() {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::Medium)
                .state("Instance not part of an Auto Scaling Group")
                .action("Consider adding to an Auto Scaling Group for better scalability")
                .build(),
        ))
    }
}

pub struct SpotOpportunity;

#[async_trait]
impl<G: ComputeGateway> Rule<ComputeInstance, G> for SpotOpportunity {
    fn name(&self) -> &'static str {
        "compute.spot_opportunity"
    }

    async fn evaluate(
        &self,
        item: &ComputeInstance,
        _ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        if !item.is_on_demand() {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::Medium)
                .state("Using On-Demand instance")
                .action("Consider using Spot Instances for non-critical workloads")
                .build(),
        ))
    }
}

pub struct AvailableReservations;

#[async_trait]
impl<G: ComputeGateway> Rule<ComputeInstance, G> for AvailableReservations {
    fn name(&self) -> &'static str {
        "compute.available_reservations"
    }

    async fn evaluate(
        &self,
        item: &ComputeInstance,
        ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        let coverage = ctx.reservation_coverage(&item.instance_type).await?;
        if coverage.available_reservations == 0 {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::Medium)
                .state("Instance type has available Reserved Instance capacity")
                .action("Consider purchasing Reserved Instances for long-term cost savings")
                .details(format!(
                    "{} reservations available for {}",
                    coverage.available_reservations, item.instance_type
                ))
                .build(),
        ))
    }
}

pub struct NonProductionWithoutSchedule;

#[async_trait]
impl<G: ComputeGateway> Rule<ComputeInstance, G> for NonProductionWithoutSchedule {
    fn name(&self) -> &'static str {
        "compute.non_production_lifecycle"
    }

    async fn evaluate(
        &self,
        item: &ComputeInstance,
        _ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        let Some(env) = item.tag(ENVIRONMENT_TAG) else {
            return Ok(None);
        };
        let non_prod = NON_PRODUCTION.iter().any(|n| env.eq_ignore_ascii_case(n));
        if !non_prod || item.tag(SCHEDULE_TAG).is_some() {
            return Ok(None);
        }
        Ok(Some(
            finding_for(item, Severity::Medium)
                .state("Non-production instance without lifecycle policies")
                .action("Implement automated shutdown/start schedules")
                .details(format!("{}={}", ENVIRONMENT_TAG, env))
                .build(),
        ))
    }
}

pub struct HighNetworkOut;

#[async_trait]
impl<G: ComputeGateway> Rule<ComputeInstance, G> for HighNetworkOut {
    fn name(&self) -> &'static str {
        "compute.high_network_out"
    }

    async fn evaluate(
        &self,
        item: &ComputeInstance,
        ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError> {
        let out = ctx
            .metric(
                EC2_NAMESPACE,
                "NetworkOut",
                &item.instance_id,
                Statistic::Sum,
            )
            .await?;
        match out.sum() {
            Some(total) if total > HIGH_NETWORK_OUT => Ok(Some(
                finding_for(item, Severity::Medium)
                    .state("High network transfer costs")
                    .action("Consider using S3 Transfer Acceleration or CDN")
                    .details(format!(
                        "NetworkOut {:.0} over {} days",
                        total, LOOKBACK_DAYS
                    ))
                    .build(),
            )),
            _ => Ok(None),
        }
    }
}
