// Resource-type analyzers: list one family's inventory, then run its rule set over every item.
// An inventory failure is contained here and yields no findings for the family.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::gateway::{Inventory, MetricsGateway, PricingGateway};
use crate::models::{Account, Finding, ResourceFamily};
use crate::rules::{EvalContext, LookbackWindow, Resource, RuleSet, evaluate_fail_open};

/// Lookback for families whose rules have no family-specific window.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;
pub const DEFAULT_ITEM_CONCURRENCY: usize = 4;

type ItemFuture<'a> = Pin<Box<dyn Future<Output = Vec<Finding>> + Send + 'a>>;

/// Type-erased analyzer for one resource family.
#[async_trait]
pub trait ResourceAnalyzer: Send + Sync {
    fn family(&self) -> ResourceFamily;

    /// Never fails: gateway errors are logged and yield fewer (or no) findings.
    async fn analyze(
        &self,
        account: &Account,
        now: DateTime<Utc>,
        limiter: Arc<Semaphore>,
    ) -> Vec<Finding>;
}

pub struct FamilyAnalyzer<T, G> {
    gateway: Arc<G>,
    metrics: Arc<dyn MetricsGateway>,
    pricing: Arc<dyn PricingGateway>,
    rules: RuleSet<T, G>,
    lookback_days: u32,
    item_concurrency: usize,
    _item: PhantomData<fn() -> T>,
}

impl<T: Resource, G: Inventory<T>> FamilyAnalyzer<T, G> {
    pub fn new(
        gateway: Arc<G>,
        metrics: Arc<dyn MetricsGateway>,
        pricing: Arc<dyn PricingGateway>,
        rules: RuleSet<T, G>,
    ) -> Self {
        Self {
            gateway,
            metrics,
            pricing,
            rules,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            item_concurrency: DEFAULT_ITEM_CONCURRENCY,
            _item: PhantomData,
        }
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn with_item_concurrency(mut self, n: usize) -> Self {
        self.item_concurrency = n.max(1);
        self
    }

    /// All rules against one item, concurrently; output keeps rule order.
    async fn evaluate_item(&self, item: &T, ctx: &EvalContext<G>) -> Vec<Finding> {
        join_all(
            self.rules
                .iter()
                .map(|rule| evaluate_fail_open(rule.as_ref(), item, ctx)),
        )
        .await
        .into_iter()
        .flatten()
        .collect()
    }
}

#[async_trait]
impl<T: Resource, G: Inventory<T>> ResourceAnalyzer for FamilyAnalyzer<T, G> {
    fn family(&self) -> ResourceFamily {
        T::FAMILY
    }

    #[instrument(skip_all, fields(family = %T::FAMILY, account_id = %account.account_id))]
    async fn analyze(
        &self,
        account: &Account,
        now: DateTime<Utc>,
        limiter: Arc<Semaphore>,
    ) -> Vec<Finding> {
        let ctx = EvalContext::new(
            account.clone(),
            self.gateway.clone(),
            LookbackWindow::trailing_days(now, self.lookback_days),
            self.metrics.clone(),
            self.pricing.clone(),
            limiter,
        );

        let items = match ctx.limited(self.gateway.list_inventory(account)).await {
            Ok(items) => items,
            Err(e) => {
                warn!(
                    error = %e,
                    family = %T::FAMILY,
                    operation = "list_inventory",
                    "inventory listing failed, skipping family"
                );
                return Vec::new();
            }
        };
        debug!(items = items.len(), "inventory listed");

        // Futures are built up front so the stream holds no borrowing closure.
        let pending: Vec<ItemFuture<'_>> = items
            .iter()
            .map(|item| Box::pin(self.evaluate_item(item, &ctx)) as ItemFuture<'_>)
            .collect();
        // `buffered` keeps inventory order regardless of completion order.
        let per_item: Vec<Vec<Finding>> = stream::iter(pending)
            .buffered(self.item_concurrency)
            .collect()
            .await;

        let findings: Vec<Finding> = per_item.into_iter().flatten().collect();
        debug!(findings = findings.len(), "family analyzed");
        findings
    }
}
