// Resource-optimization orchestrator: runs every registered family analyzer for one account
// and merges their findings in registration order.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument};

use crate::analyzer::{FamilyAnalyzer, ResourceAnalyzer};
use crate::config::AnalysisConfig;
use crate::gateway::{MetricsGateway, PricingGateway, ResourceGateway};
use crate::models::{Account, Finding, ResourceFamily};
use crate::rules::{cache, compute, database, function, load_balancer, object_store};

pub struct Orchestrator {
    analyzers: Vec<Arc<dyn ResourceAnalyzer>>,
    max_concurrent_queries: usize,
}

impl Orchestrator {
    /// Empty registry; see [`Orchestrator::with_default_families`] for the built-in set.
    pub fn new(max_concurrent_queries: usize) -> Self {
        Self {
            analyzers: Vec::new(),
            max_concurrent_queries: max_concurrent_queries.max(1),
        }
    }

    /// The six built-in families, all served by one gateway, in their fixed order.
    pub fn with_default_families<G: ResourceGateway>(gateway: Arc<G>, cfg: &AnalysisConfig) -> Self {
        let metrics: Arc<dyn MetricsGateway> = gateway.clone();
        let pricing: Arc<dyn PricingGateway> = gateway.clone();
        let n = cfg.item_concurrency;

        Self::new(cfg.max_concurrent_queries)
            .register(
                FamilyAnalyzer::new(
                    gateway.clone(),
                    metrics.clone(),
                    pricing.clone(),
                    compute::rules(),
                )
                .with_lookback_days(compute::LOOKBACK_DAYS)
                .with_item_concurrency(n),
            )
            .register(
                FamilyAnalyzer::new(
                    gateway.clone(),
                    metrics.clone(),
                    pricing.clone(),
                    database::rules(),
                )
                .with_item_concurrency(n),
            )
            .register(
                FamilyAnalyzer::new(
                    gateway.clone(),
                    metrics.clone(),
                    pricing.clone(),
                    object_store::rules(),
                )
                .with_item_concurrency(n),
            )
            .register(
                FamilyAnalyzer::new(
                    gateway.clone(),
                    metrics.clone(),
                    pricing.clone(),
                    cache::rules(),
                )
                .with_item_concurrency(n),
            )
            .register(
                FamilyAnalyzer::new(
                    gateway.clone(),
                    metrics.clone(),
                    pricing.clone(),
                    load_balancer::rules(),
                )
                .with_item_concurrency(n),
            )
            .register(
                FamilyAnalyzer::new(gateway, metrics, pricing, function::rules())
                    .with_item_concurrency(n),
            )
    }

    /// Append an analyzer; its findings come after every earlier registration's.
    pub fn register(mut self, analyzer: impl ResourceAnalyzer + 'static) -> Self {
        self.analyzers.push(Arc::new(analyzer));
        self
    }

    pub fn families(&self) -> Vec<ResourceFamily> {
        self.analyzers.iter().map(|a| a.family()).collect()
    }

    pub async fn analyze(&self, account: &Account) -> Vec<Finding> {
        self.analyze_at(account, Utc::now()).await
    }

    /// Analyzers run concurrently; output is grouped by family in registration order.
    /// A panicking analyzer contributes nothing and does not affect the others.
    #[instrument(skip_all, fields(account_id = %account.account_id, families = self.analyzers.len()))]
    pub async fn analyze_at(&self, account: &Account, now: DateTime<Utc>) -> Vec<Finding> {
        let limiter = Arc::new(Semaphore::new(self.max_concurrent_queries));

        let handles: Vec<_> = self
            .analyzers
            .iter()
            .map(|analyzer| {
                let analyzer = analyzer.clone();
                let account = account.clone();
                let limiter = limiter.clone();
                let family = analyzer.family();
                let handle =
                    tokio::spawn(async move { analyzer.analyze(&account, now, limiter).await });
                (family, handle)
            })
            .collect();

        let mut findings = Vec::new();
        for (family, handle) in handles {
            match handle.await {
                Ok(mut family_findings) => findings.append(&mut family_findings),
                Err(e) => {
                    error!(error = %e, family = %family, "analyzer task failed, no findings for family");
                }
            }
        }
        info!(findings = findings.len(), "resource analysis finished");
        findings
    }
}
