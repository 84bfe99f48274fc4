// Data gateway contracts: inventory, telemetry, pricing and billing capabilities the engine consumes.
// Timeouts and retries are the implementation's business; the engine only needs a result or an error.

mod fixture;

pub use fixture::{
    Fixture, FixtureBucket, FixtureGateway, FixtureInstance, FixtureLoadBalancer, FixtureMetric,
};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{
    Account, Bucket, CacheCluster, ComputeInstance, CostEntry, DatabaseInstance, FunctionConfig,
    Granularity, LoadBalancer, MetricQuery, MetricSeries, PriceInfo, ReservationCoverage,
    VersioningStatus,
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Inventory listing for one resource family. One gateway type may serve several families.
#[async_trait]
pub trait Inventory<T: Send + Sync + 'static>: Send + Sync + 'static {
    async fn list_inventory(&self, account: &Account) -> Result<Vec<T>, GatewayError>;
}

/// Compute instances plus the per-instance lookups the compute rules fetch lazily.
#[async_trait]
pub trait ComputeGateway: Inventory<ComputeInstance> {
    /// Ids of durable volumes attached to the instance.
    async fn attached_volumes(&self, instance_id: &str) -> Result<Vec<String>, GatewayError>;

    /// Reserved public addresses associated with the instance.
    async fn attached_addresses(&self, instance_id: &str) -> Result<Vec<String>, GatewayError>;

    /// Name of the autoscaling group the instance belongs to, if any.
    async fn autoscaling_group(&self, instance_id: &str) -> Result<Option<String>, GatewayError>;
}

#[async_trait]
pub trait ObjectStoreGateway: Inventory<Bucket> {
    async fn versioning_status(&self, bucket: &str) -> Result<VersioningStatus, GatewayError>;

    async fn lifecycle_rule_count(&self, bucket: &str) -> Result<usize, GatewayError>;
}

#[async_trait]
pub trait LoadBalancerGateway: Inventory<LoadBalancer> {
    /// Healthy targets across every target group registered with the balancer.
    async fn healthy_target_count(&self, arn: &str) -> Result<usize, GatewayError>;
}

#[async_trait]
pub trait MetricsGateway: Send + Sync {
    async fn query_metric(&self, query: &MetricQuery) -> Result<MetricSeries, GatewayError>;
}

#[async_trait]
pub trait PricingGateway: Send + Sync {
    async fn query_pricing(
        &self,
        resource_type: &str,
        region: &str,
    ) -> Result<PriceInfo, GatewayError>;

    async fn query_reservation_coverage(
        &self,
        resource_type: &str,
    ) -> Result<ReservationCoverage, GatewayError>;
}

#[async_trait]
pub trait CostGateway: Send + Sync {
    async fn query_cost_by_service(
        &self,
        account: &Account,
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
    ) -> Result<Vec<CostEntry>, GatewayError>;
}

/// Every capability the built-in family analyzers consume, served by one implementation.
pub trait ResourceGateway:
    ComputeGateway
    + ObjectStoreGateway
    + LoadBalancerGateway
    + Inventory<DatabaseInstance>
    + Inventory<CacheCluster>
    + Inventory<FunctionConfig>
    + MetricsGateway
    + PricingGateway
{
}

impl<T> ResourceGateway for T where
    T: ComputeGateway
        + ObjectStoreGateway
        + LoadBalancerGateway
        + Inventory<DatabaseInstance>
        + Inventory<CacheCluster>
        + Inventory<FunctionConfig>
        + MetricsGateway
        + PricingGateway
{
}
