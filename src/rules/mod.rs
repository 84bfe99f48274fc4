// Rule evaluators: one optimization heuristic each, grouped by resource family.
// Rules are pure with respect to shared state; every gateway call they make goes
// through the run's query limiter.

pub mod cache;
pub mod compute;
pub mod database;
pub mod function;
pub mod load_balancer;
pub mod object_store;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::gateway::{GatewayError, MetricsGateway, PricingGateway};
use crate::models::{
    Account, Bucket, CacheCluster, ComputeInstance, DatabaseInstance, Finding, FindingBuilder,
    FunctionConfig, LoadBalancer, MetricQuery, MetricSeries, PriceInfo, ReservationCoverage,
    ResourceFamily, Severity, Statistic,
};

/// Metric period requested from the telemetry gateway.
pub const METRIC_PERIOD_SECS: u32 = 3600;

/// An inventoried item a rule can evaluate.
pub trait Resource: Send + Sync + 'static {
    const FAMILY: ResourceFamily;

    fn resource_id(&self) -> &str;
}

impl Resource for ComputeInstance {
    const FAMILY: ResourceFamily = ResourceFamily::Compute;

    fn resource_id(&self) -> &str {
        &self.instance_id
    }
}

impl Resource for DatabaseInstance {
    const FAMILY: ResourceFamily = ResourceFamily::ManagedDatabase;

    fn resource_id(&self) -> &str {
        &self.identifier
    }
}

impl Resource for Bucket {
    const FAMILY: ResourceFamily = ResourceFamily::ObjectStore;

    fn resource_id(&self) -> &str {
        &self.name
    }
}

impl Resource for CacheCluster {
    const FAMILY: ResourceFamily = ResourceFamily::Cache;

    fn resource_id(&self) -> &str {
        &self.cluster_id
    }
}

impl Resource for LoadBalancer {
    const FAMILY: ResourceFamily = ResourceFamily::LoadBalancer;

    fn resource_id(&self) -> &str {
        &self.arn
    }
}

impl Resource for FunctionConfig {
    const FAMILY: ResourceFamily = ResourceFamily::Function;

    fn resource_id(&self) -> &str {
        &self.function_name
    }
}

/// Start a finding about `item` with its family and id filled in.
pub fn finding_for<T: Resource>(item: &T, severity: Severity) -> FindingBuilder {
    Finding::builder(T::FAMILY, item.resource_id(), severity)
}

/// Trailing window metrics are sampled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LookbackWindow {
    pub fn trailing_days(end: DateTime<Utc>, days: u32) -> Self {
        Self {
            start: end - Duration::days(i64::from(days)),
            end,
        }
    }
}

/// Everything a rule may consult for one family during one run.
pub struct EvalContext<G> {
    pub account: Account,
    pub gateway: Arc<G>,
    pub window: LookbackWindow,
    metrics: Arc<dyn MetricsGateway>,
    pricing: Arc<dyn PricingGateway>,
    limiter: Arc<Semaphore>,
}

impl<G: Send + Sync + 'static> EvalContext<G> {
    pub fn new(
        account: Account,
        gateway: Arc<G>,
        window: LookbackWindow,
        metrics: Arc<dyn MetricsGateway>,
        pricing: Arc<dyn PricingGateway>,
        limiter: Arc<Semaphore>,
    ) -> Self {
        Self {
            account,
            gateway,
            window,
            metrics,
            pricing,
            limiter,
        }
    }

    /// Run one gateway call under the run-wide concurrency limit.
    pub async fn limited<T>(
        &self,
        call: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, GatewayError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| GatewayError::Transport("query limiter closed".into()))?;
        call.await
    }

    /// Hourly samples of `metric_name` for `resource_id` over the lookback window.
    pub async fn metric(
        &self,
        namespace: &'static str,
        metric_name: &'static str,
        resource_id: &str,
        statistic: Statistic,
    ) -> Result<MetricSeries, GatewayError> {
        let query = MetricQuery {
            namespace,
            metric_name,
            resource_id: resource_id.to_string(),
            statistic,
            start: self.window.start,
            end: self.window.end,
            period_seconds: METRIC_PERIOD_SECS,
        };
        self.limited(self.metrics.query_metric(&query)).await
    }

    /// Regional on-demand prices for a resource type, scoped to the account's region.
    pub async fn pricing(&self, resource_type: &str) -> Result<PriceInfo, GatewayError> {
        self.limited(
            self.pricing
                .query_pricing(resource_type, &self.account.region),
        )
        .await
    }

    pub async fn reservation_coverage(
        &self,
        resource_type: &str,
    ) -> Result<ReservationCoverage, GatewayError> {
        self.limited(self.pricing.query_reservation_coverage(resource_type))
            .await
    }
}

/// One heuristic over one resource family. Returns `Ok(None)` when it does not
/// apply or when there is not enough evidence.
#[async_trait]
pub trait Rule<T: Resource, G: Send + Sync + 'static>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn evaluate(
        &self,
        item: &T,
        ctx: &EvalContext<G>,
    ) -> Result<Option<Finding>, GatewayError>;
}

pub type RuleSet<T, G> = Vec<Box<dyn Rule<T, G>>>;

/// Evaluator-level containment: a failed gateway call yields no finding for this
/// rule only.
pub async fn evaluate_fail_open<T: Resource, G: Send + Sync + 'static>(
    rule: &dyn Rule<T, G>,
    item: &T,
    ctx: &EvalContext<G>,
) -> Option<Finding> {
    match rule.evaluate(item, ctx).await {
        Ok(finding) => finding,
        Err(e) => {
            warn!(
                error = %e,
                family = %T::FAMILY,
                rule = rule.name(),
                resource_id = item.resource_id(),
                "rule evaluation failed, no finding"
            );
            None
        }
    }
}
