// Domain models: findings, runs, accounts, inventory snapshots, telemetry

mod account;
mod finding;
mod metrics;
mod resources;
mod run;

pub use account::{Account, AccountRecord, CredentialRef, Credentials, NewAccount};
pub use finding::{
    Finding, FindingBuilder, ResourceFamily, ResourceType, Severity, rank_findings,
};
pub use metrics::{
    CostEntry, Datapoint, Granularity, MetricQuery, MetricSeries, PriceInfo, RegionalPrice,
    ReservationCoverage, Statistic,
};
pub use resources::{
    Bucket, CacheCluster, ComputeInstance, DatabaseInstance, FunctionConfig, InstanceState,
    LoadBalancer, LoadBalancerState, VersioningStatus,
};
pub use run::{AnalysisRun, RunError, RunKind, RunStatus};
