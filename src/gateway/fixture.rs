// Offline gateway: serves inventory, telemetry, pricing and billing from a JSON dataset.

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::instrument;

use super::{
    ComputeGateway, CostGateway, GatewayError, Inventory, LoadBalancerGateway, MetricsGateway,
    ObjectStoreGateway, PricingGateway,
};
use crate::models::{
    Account, Bucket, CacheCluster, ComputeInstance, CostEntry, DatabaseInstance, Datapoint,
    FunctionConfig, Granularity, LoadBalancer, MetricQuery, MetricSeries, PriceInfo,
    RegionalPrice, ReservationCoverage, ResourceFamily, Statistic, VersioningStatus,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureInstance {
    #[serde(flatten)]
    pub instance: ComputeInstance,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub autoscaling_group: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureBucket {
    pub name: String,
    pub versioning: VersioningStatus,
    #[serde(default)]
    pub lifecycle_rules: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureLoadBalancer {
    #[serde(flatten)]
    pub load_balancer: LoadBalancer,
    #[serde(default)]
    pub healthy_targets: usize,
}

/// Samples for one (resource, metric, statistic), oldest first, one per query period.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureMetric {
    pub resource_id: String,
    pub metric_name: String,
    pub statistic: Statistic,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fixture {
    pub compute: Vec<FixtureInstance>,
    pub databases: Vec<DatabaseInstance>,
    pub buckets: Vec<FixtureBucket>,
    pub caches: Vec<CacheCluster>,
    pub load_balancers: Vec<FixtureLoadBalancer>,
    pub functions: Vec<FunctionConfig>,
    pub metrics: Vec<FixtureMetric>,
    /// Instance type -> on-demand offers per region.
    pub prices: BTreeMap<String, Vec<RegionalPrice>>,
    /// Instance type -> reservations available for it.
    pub reservations: BTreeMap<String, u32>,
    pub costs: Vec<CostEntry>,
    /// Families whose inventory listing fails (outage drills).
    pub unavailable: Vec<ResourceFamily>,
}

pub struct FixtureGateway {
    fixture: Fixture,
}

impl FixtureGateway {
    pub fn new(fixture: Fixture) -> Self {
        Self { fixture }
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path.as_ref())?;
        Self::load_from_str(&s)
    }

    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let fixture: Fixture = serde_json::from_str(s)?;
        Ok(Self::new(fixture))
    }

    fn check_available(&self, family: ResourceFamily) -> Result<(), GatewayError> {
        if self.fixture.unavailable.contains(&family) {
            return Err(GatewayError::Transport(format!(
                "{} inventory endpoint unavailable",
                family
            )));
        }
        Ok(())
    }

    fn instance(&self, instance_id: &str) -> Result<&FixtureInstance, GatewayError> {
        self.fixture
            .compute
            .iter()
            .find(|i| i.instance.instance_id == instance_id)
            .ok_or_else(|| GatewayError::NotFound(format!("instance {}", instance_id)))
    }

    fn bucket(&self, name: &str) -> Result<&FixtureBucket, GatewayError> {
        self.fixture
            .buckets
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| GatewayError::NotFound(format!("bucket {}", name)))
    }
}

#[async_trait]
impl Inventory<ComputeInstance> for FixtureGateway {
    #[instrument(skip(self, _account), fields(repo = "fixture", operation = "list_instances"))]
    async fn list_inventory(&self, _account: &Account) -> Result<Vec<ComputeInstance>, GatewayError> {
        self.check_available(ResourceFamily::Compute)?;
        Ok(self
            .fixture
            .compute
            .iter()
            .map(|i| i.instance.clone())
            .collect())
    }
}

#[async_trait]
impl ComputeGateway for FixtureGateway {
    async fn attached_volumes(&self, instance_id: &str) -> Result<Vec<String>, GatewayError> {
        Ok(self.instance(instance_id)?.volumes.clone())
    }

    async fn attached_addresses(&self, instance_id: &str) -> Result<Vec<String>, GatewayError> {
        Ok(self.instance(instance_id)?.addresses.clone())
    }

    async fn autoscaling_group(&self, instance_id: &str) -> Result<Option<String>, GatewayError> {
        Ok(self.instance(instance_id)?.autoscaling_group.clone())
    }
}

#[async_trait]
impl Inventory<DatabaseInstance> for FixtureGateway {
    async fn list_inventory(&self, _account: &Account) -> Result<Vec<DatabaseInstance>, GatewayError> {
        self.check_available(ResourceFamily::ManagedDatabase)?;
        Ok(self.fixture.databases.clone())
    }
}

#[async_trait]
impl Inventory<Bucket> for FixtureGateway {
    async fn list_inventory(&self, _account: &Account) -> Result<Vec<Bucket>, GatewayError> {
        self.check_available(ResourceFamily::ObjectStore)?;
        Ok(self
            .fixture
            .buckets
            .iter()
            .map(|b| Bucket {
                name: b.name.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl ObjectStoreGateway for FixtureGateway {
    async fn versioning_status(&self, bucket: &str) -> Result<VersioningStatus, GatewayError> {
        Ok(self.bucket(bucket)?.versioning)
    }

    async fn lifecycle_rule_count(&self, bucket: &str) -> Result<usize, GatewayError> {
        Ok(self.bucket(bucket)?.lifecycle_rules)
    }
}

#[async_trait]
impl Inventory<CacheCluster> for FixtureGateway {
    async fn list_inventory(&self, _account: &Account) -> Result<Vec<CacheCluster>, GatewayError> {
        self.check_available(ResourceFamily::Cache)?;
        Ok(self.fixture.caches.clone())
    }
}

#[async_trait]
impl Inventory<LoadBalancer> for FixtureGateway {
    async fn list_inventory(&self, _account: &Account) -> Result<Vec<LoadBalancer>, GatewayError> {
        self.check_available(ResourceFamily::LoadBalancer)?;
        Ok(self
            .fixture
            .load_balancers
            .iter()
            .map(|lb| lb.load_balancer.clone())
            .collect())
    }
}

#[async_trait]
impl LoadBalancerGateway for FixtureGateway {
    async fn healthy_target_count(&self, arn: &str) -> Result<usize, GatewayError> {
        self.fixture
            .load_balancers
            .iter()
            .find(|lb| lb.load_balancer.arn == arn)
            .map(|lb| lb.healthy_targets)
            .ok_or_else(|| GatewayError::NotFound(format!("load balancer {}", arn)))
    }
}

#[async_trait]
impl Inventory<FunctionConfig> for FixtureGateway {
    async fn list_inventory(&self, _account: &Account) -> Result<Vec<FunctionConfig>, GatewayError> {
        self.check_available(ResourceFamily::Function)?;
        Ok(self.fixture.functions.clone())
    }
}

#[async_trait]
impl MetricsGateway for FixtureGateway {
    /// Lays the stored samples out one period apart ending at `query.end` and drops
    /// anything that would fall before `query.start`.
    async fn query_metric(&self, query: &MetricQuery) -> Result<MetricSeries, GatewayError> {
        let Some(metric) = self.fixture.metrics.iter().find(|m| {
            m.resource_id == query.resource_id
                && m.metric_name == query.metric_name
                && m.statistic == query.statistic
        }) else {
            return Ok(MetricSeries::default());
        };

        let period = Duration::seconds(i64::from(query.period_seconds.max(1)));
        let capacity = ((query.end - query.start).num_seconds() / period.num_seconds()).max(0);
        let kept = metric.values.len().min(capacity as usize);
        let recent = &metric.values[metric.values.len() - kept..];

        let datapoints = recent
            .iter()
            .enumerate()
            .map(|(i, value)| Datapoint {
                timestamp: query.end - period * (kept - i) as i32,
                value: *value,
            })
            .collect();
        Ok(MetricSeries { datapoints })
    }
}

#[async_trait]
impl PricingGateway for FixtureGateway {
    async fn query_pricing(
        &self,
        resource_type: &str,
        _region: &str,
    ) -> Result<PriceInfo, GatewayError> {
        Ok(PriceInfo {
            offers: self
                .fixture
                .prices
                .get(resource_type)
                .cloned()
                .unwrap_or_default(),
        })
    }

    async fn query_reservation_coverage(
        &self,
        resource_type: &str,
    ) -> Result<ReservationCoverage, GatewayError> {
        Ok(ReservationCoverage {
            available_reservations: self
                .fixture
                .reservations
                .get(resource_type)
                .copied()
                .unwrap_or(0),
        })
    }
}

#[async_trait]
impl CostGateway for FixtureGateway {
    /// Entries in `[start, end)`; monthly granularity sums per (month, service).
    #[instrument(skip(self, _account), fields(repo = "fixture", operation = "query_cost_by_service"))]
    async fn query_cost_by_service(
        &self,
        _account: &Account,
        start: NaiveDate,
        end: NaiveDate,
        granularity: Granularity,
    ) -> Result<Vec<CostEntry>, GatewayError> {
        let in_range = self
            .fixture
            .costs
            .iter()
            .filter(|c| c.date >= start && c.date < end);

        match granularity {
            Granularity::Daily => Ok(in_range.cloned().collect()),
            Granularity::Monthly => {
                let mut by_month: BTreeMap<(NaiveDate, String), f64> = BTreeMap::new();
                for c in in_range {
                    let month = c.date.with_day(1).unwrap_or(c.date);
                    *by_month.entry((month, c.service.clone())).or_default() += c.amount;
                }
                Ok(by_month
                    .into_iter()
                    .map(|((date, service), amount)| CostEntry {
                        date,
                        service,
                        amount,
                    })
                    .collect())
            }
        }
    }
}
