// Shared test helpers

#![allow(dead_code)]

use costwise::account_repo::AccountRepo;
use costwise::config::AnalysisConfig;
use costwise::coordinator::RunCoordinator;
use costwise::cost_analyzer::CostAnalyzer;
use costwise::credentials::CredentialCipher;
use costwise::gateway::{
    Fixture, FixtureBucket, FixtureGateway, FixtureInstance, FixtureLoadBalancer, FixtureMetric,
};
use costwise::models::*;
use costwise::orchestrator::Orchestrator;
use costwise::run_repo::RunRepo;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

pub fn account() -> Account {
    Account::new("123456789012", "us-east-1", CredentialRef::new("account:1"))
}

pub fn instance(id: &str, instance_type: &str, state: InstanceState) -> FixtureInstance {
    FixtureInstance {
        instance: ComputeInstance {
            instance_id: id.into(),
            instance_type: instance_type.into(),
            state,
            lifecycle: None,
            tags: BTreeMap::new(),
        },
        volumes: vec![],
        addresses: vec![],
        autoscaling_group: None,
    }
}

pub fn metric(resource_id: &str, name: &str, statistic: Statistic, values: Vec<f64>) -> FixtureMetric {
    FixtureMetric {
        resource_id: resource_id.into(),
        metric_name: name.into(),
        statistic,
        values,
    }
}

pub fn database(id: &str, multi_az: bool, auto_minor_version_upgrade: bool) -> DatabaseInstance {
    DatabaseInstance {
        identifier: id.into(),
        engine: "postgres".into(),
        instance_class: "db.m5.large".into(),
        multi_az,
        auto_minor_version_upgrade,
    }
}

/// One item per family, each tripping at least one rule.
pub fn every_family_fixture() -> Fixture {
    let mut web = instance("i-web", "t2.micro", InstanceState::Running);
    web.instance
        .tags
        .insert("Environment".into(), "Dev".into());

    Fixture {
        compute: vec![web],
        databases: vec![database("orders-db", false, true)],
        buckets: vec![FixtureBucket {
            name: "logs".into(),
            versioning: VersioningStatus::Suspended,
            lifecycle_rules: 0,
        }],
        caches: vec![CacheCluster {
            cluster_id: "sessions".into(),
            engine: "redis".into(),
            engine_version: "7.1".into(),
            cluster_mode: false,
            snapshot_retention_days: 1,
        }],
        load_balancers: vec![FixtureLoadBalancer {
            load_balancer: LoadBalancer {
                arn: "arn:aws:elasticloadbalancing:lb/web".into(),
                name: "web".into(),
                scheme: "internet-facing".into(),
                state: LoadBalancerState::Active,
                deletion_protection: false,
            },
            healthy_targets: 0,
        }],
        functions: vec![FunctionConfig {
            function_name: "resize-images".into(),
            memory_mb: 128,
            timeout_secs: 60,
            runtime: "python3.12".into(),
        }],
        metrics: vec![metric(
            "i-web",
            "CPUUtilization",
            Statistic::Average,
            vec![55.0; 48],
        )],
        ..Default::default()
    }
}

pub fn gateway(fixture: Fixture) -> Arc<FixtureGateway> {
    Arc::new(FixtureGateway::new(fixture))
}

pub fn orchestrator(gateway: Arc<FixtureGateway>) -> Orchestrator {
    Orchestrator::with_default_families(gateway, &AnalysisConfig::default())
}

pub fn cipher() -> Arc<CredentialCipher> {
    Arc::new(CredentialCipher::new("test-password", "test-salt"))
}

/// Fresh SQLite file under `dir` with both repositories initialised.
pub async fn repos(dir: &TempDir) -> (Arc<AccountRepo>, Arc<RunRepo>) {
    let path = dir.path().join("costwise.db");
    let pool = costwise::db::connect(path.to_str().unwrap(), 2)
        .await
        .unwrap();
    let accounts = AccountRepo::new(pool.clone(), cipher());
    accounts.init().await.unwrap();
    let runs = RunRepo::new(pool);
    runs.init().await.unwrap();
    (Arc::new(accounts), Arc::new(runs))
}

pub fn coordinator(gateway: Arc<FixtureGateway>, runs: Arc<RunRepo>) -> RunCoordinator {
    RunCoordinator::new(
        Arc::new(orchestrator(gateway.clone())),
        CostAnalyzer::new(gateway),
        runs,
    )
}

pub fn new_account() -> NewAccount {
    NewAccount {
        account_name: "production".into(),
        account_id: "123456789012".into(),
        region: "us-east-1".into(),
        access_key: "AKIAEXAMPLEKEY".into(),
        secret_key: "wJalrXUtnFEMI/EXAMPLE".into(),
    }
}

pub fn cost(date: &str, service: &str, amount: f64) -> CostEntry {
    CostEntry {
        date: date.parse().unwrap(),
        service: service.into(),
        amount,
    }
}
