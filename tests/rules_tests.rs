// Rule evaluation tests: per-family heuristics through a family analyzer

mod common;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use costwise::analyzer::{FamilyAnalyzer, ResourceAnalyzer};
use costwise::gateway::{
    Fixture, FixtureBucket, FixtureGateway, FixtureLoadBalancer, GatewayError, MetricsGateway,
    PricingGateway,
};
use costwise::models::*;
use costwise::rules::{cache, compute, database, function, load_balancer, object_store};
use std::sync::Arc;
use tokio::sync::Semaphore;

fn limiter() -> Arc<Semaphore> {
    Arc::new(Semaphore::new(4))
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

async fn compute_findings(fixture: Fixture) -> Vec<Finding> {
    let g = Arc::new(FixtureGateway::new(fixture));
    FamilyAnalyzer::new(g.clone(), g.clone(), g, compute::rules())
        .with_lookback_days(compute::LOOKBACK_DAYS)
        .analyze(&common::account(), now(), limiter())
        .await
}

fn states(findings: &[Finding]) -> Vec<&str> {
    findings.iter().map(|f| f.current_state.as_str()).collect()
}

/// Reserved, in an autoscaling group, current generation: only metric-driven rules can fire.
fn quiet_instance(id: &str) -> costwise::gateway::FixtureInstance {
    let mut i = common::instance(id, "m5.large", InstanceState::Running);
    i.instance.lifecycle = Some("scheduled".into());
    i.autoscaling_group = Some("web-asg".into());
    i
}

#[tokio::test]
async fn idle_instance_yields_single_high_finding() {
    let findings = compute_findings(Fixture {
        compute: vec![quiet_instance("i-idle")],
        metrics: vec![
            common::metric("i-idle", "CPUUtilization", Statistic::Average, vec![5.0; 720]),
            common::metric("i-idle", "NetworkIn", Statistic::Sum, vec![10.0; 720]),
        ],
        ..Default::default()
    })
    .await;

    assert_eq!(findings.len(), 1, "got {:?}", states(&findings));
    let f = &findings[0];
    assert_eq!(f.severity, Severity::High);
    assert_eq!(f.resource_id, "i-idle");
    assert_eq!(f.resource_type, ResourceType::Family(ResourceFamily::Compute));
    assert_eq!(f.current_state, "Idle instance (CPU < 10%, low network I/O)");
}

#[tokio::test]
async fn busy_network_is_not_idle() {
    let findings = compute_findings(Fixture {
        compute: vec![quiet_instance("i-1")],
        metrics: vec![
            common::metric("i-1", "CPUUtilization", Statistic::Average, vec![5.0; 24]),
            common::metric("i-1", "NetworkIn", Statistic::Sum, vec![2_000_000.0; 24]),
        ],
        ..Default::default()
    })
    .await;
    assert!(findings.is_empty(), "got {:?}", states(&findings));
}

#[tokio::test]
async fn missing_metrics_produce_no_metric_findings() {
    let findings = compute_findings(Fixture {
        compute: vec![quiet_instance("i-1")],
        ..Default::default()
    })
    .await;
    assert!(findings.is_empty(), "got {:?}", states(&findings));
}

#[tokio::test]
async fn overprovisioned_needs_both_peaks_below_forty() {
    let peaks = |cpu: f64, mem: f64| Fixture {
        compute: vec![quiet_instance("i-1")],
        metrics: vec![
            common::metric("i-1", "CPUUtilization", Statistic::Maximum, vec![cpu; 10]),
            common::metric("i-1", "MemoryUtilization", Statistic::Maximum, vec![mem; 10]),
        ],
        ..Default::default()
    };

    let findings = compute_findings(peaks(35.0, 20.0)).await;
    assert_eq!(
        states(&findings),
        ["Overprovisioned instance (low resource utilization)"]
    );
    assert_eq!(findings[0].severity, Severity::Medium);

    assert!(compute_findings(peaks(35.0, 40.0)).await.is_empty());
}

#[tokio::test]
async fn legacy_generation_names_both_families() {
    let mut i = quiet_instance("i-old");
    i.instance.instance_type = "m3.xlarge".into();
    let findings = compute_findings(Fixture {
        compute: vec![i],
        ..Default::default()
    })
    .await;
    assert_eq!(findings.len(), 1);
    assert!(findings[0].current_state.contains("m3"));
    assert!(findings[0].suggested_action.contains("m6i"));
}

#[tokio::test]
async fn stopped_instance_with_volume_and_address() {
    let mut i = quiet_instance("i-stopped");
    i.instance.state = InstanceState::Stopped;
    i.volumes = vec!["vol-1".into()];
    i.addresses = vec!["203.0.113.7".into()];
    let findings = compute_findings(Fixture {
        compute: vec![i],
        ..Default::default()
    })
    .await;
    assert_eq!(
        states(&findings),
        [
            "Stopped instance with attached EBS volumes",
            "Stopped instance with associated Elastic IP",
        ]
    );
}

#[tokio::test]
async fn on_demand_instance_rules_fire_in_rule_order() {
    let mut i = common::instance("i-od", "m5.large", InstanceState::Running);
    i.instance.tags.insert("Environment".into(), "STAGING".into());
    let findings = compute_findings(Fixture {
        compute: vec![i],
        metrics: vec![
            common::metric("i-od", "CPUUtilization", Statistic::Average, vec![60.0; 24]),
            common::metric("i-od", "NetworkOut", Statistic::Sum, vec![5e8; 3]),
        ],
        reservations: [("m5.large".to_string(), 2)].into_iter().collect(),
        ..Default::default()
    })
    .await;

    assert_eq!(
        states(&findings),
        [
            "On-Demand instance running 24/7",
            "Instance not part of an Auto Scaling Group",
            "Using On-Demand instance",
            "Instance type has available Reserved Instance capacity",
            "Non-production instance without lifecycle policies",
            "High network transfer costs",
        ]
    );
    assert_eq!(findings[0].severity, Severity::High);
}

#[tokio::test]
async fn schedule_tag_silences_non_production_rule() {
    let mut i = quiet_instance("i-dev");
    i.instance.tags.insert("Environment".into(), "dev".into());
    i.instance.tags.insert("Schedule".into(), "office-hours".into());
    assert!(
        compute_findings(Fixture {
            compute: vec![i],
            ..Default::default()
        })
        .await
        .is_empty()
    );
}

#[tokio::test]
async fn cheaper_region_estimates_monthly_savings() {
    let findings = compute_findings(Fixture {
        compute: vec![quiet_instance("i-1")],
        prices: [(
            "m5.large".to_string(),
            vec![
                RegionalPrice {
                    region: "us-east-1".into(),
                    hourly_price: 0.10,
                },
                RegionalPrice {
                    region: "us-east-2".into(),
                    hourly_price: 0.08,
                },
            ],
        )]
        .into_iter()
        .collect(),
        ..Default::default()
    })
    .await;
    assert_eq!(findings.len(), 1);
    let f = &findings[0];
    assert_eq!(f.severity, Severity::Medium);
    assert!((f.current_cost - 73.0).abs() < 1e-9);
    assert!((f.potential_savings - 14.6).abs() < 1e-9);
    assert!(f.suggested_action.contains("us-east-2"));
}

#[tokio::test]
async fn unknown_current_region_price_is_not_a_finding() {
    let findings = compute_findings(Fixture {
        compute: vec![quiet_instance("i-1")],
        prices: [(
            "m5.large".to_string(),
            vec![RegionalPrice {
                region: "eu-west-1".into(),
                hourly_price: 0.01,
            }],
        )]
        .into_iter()
        .collect(),
        ..Default::default()
    })
    .await;
    assert!(findings.is_empty());
}

struct ThrottledMetrics;

#[async_trait]
impl MetricsGateway for ThrottledMetrics {
    async fn query_metric(&self, _query: &MetricQuery) -> Result<MetricSeries, GatewayError> {
        Err(GatewayError::Throttled("rate exceeded".into()))
    }
}

#[tokio::test]
async fn metric_failure_only_silences_the_failing_rules() {
    let mut i = common::instance("i-1", "m5.large", InstanceState::Running);
    i.instance.lifecycle = Some("spot".into());
    let g = Arc::new(FixtureGateway::new(Fixture {
        compute: vec![i],
        ..Default::default()
    }));
    let pricing: Arc<dyn PricingGateway> = g.clone();
    let findings = FamilyAnalyzer::new(g, Arc::new(ThrottledMetrics), pricing, compute::rules())
        .analyze(&common::account(), now(), limiter())
        .await;

    // Every metric-backed rule fails open; the autoscaling lookup still reports.
    assert_eq!(
        states(&findings),
        ["Instance not part of an Auto Scaling Group"]
    );
}

#[tokio::test]
async fn database_single_az_and_no_minor_upgrades() {
    let g = Arc::new(FixtureGateway::new(Fixture {
        databases: vec![common::database("db-1", false, false)],
        ..Default::default()
    }));
    let findings = FamilyAnalyzer::new(g.clone(), g.clone(), g, database::rules())
        .analyze(&common::account(), now(), limiter())
        .await;

    assert_eq!(findings.len(), 2);
    assert_eq!(findings[0].severity, Severity::High);
    assert_eq!(findings[0].current_state, "Single-AZ deployment");
    assert_eq!(findings[1].severity, Severity::Medium);
    assert_eq!(findings[1].current_state, "Auto minor version upgrade disabled");
}

#[tokio::test]
async fn healthy_database_has_no_findings() {
    let g = Arc::new(FixtureGateway::new(Fixture {
        databases: vec![common::database("db-1", true, true)],
        ..Default::default()
    }));
    let findings = FamilyAnalyzer::new(g.clone(), g.clone(), g, database::rules())
        .analyze(&common::account(), now(), limiter())
        .await;
    assert!(findings.is_empty());
}

#[tokio::test]
async fn buckets_check_versioning_and_lifecycle() {
    let g = Arc::new(FixtureGateway::new(Fixture {
        buckets: vec![
            FixtureBucket {
                name: "assets".into(),
                versioning: VersioningStatus::Enabled,
                lifecycle_rules: 0,
            },
            FixtureBucket {
                name: "backups".into(),
                versioning: VersioningStatus::Disabled,
                lifecycle_rules: 2,
            },
        ],
        ..Default::default()
    }));
    let findings = FamilyAnalyzer::new(g.clone(), g.clone(), g, object_store::rules())
        .analyze(&common::account(), now(), limiter())
        .await;

    let got: Vec<(&str, Severity)> = findings
        .iter()
        .map(|f| (f.resource_id.as_str(), f.severity))
        .collect();
    assert_eq!(
        got,
        [("assets", Severity::Medium), ("backups", Severity::High)]
    );
}

#[tokio::test]
async fn cache_topology_and_retention() {
    let cluster = |id: &str, engine: &str, cluster_mode: bool, retention: u32| CacheCluster {
        cluster_id: id.into(),
        engine: engine.into(),
        engine_version: String::new(),
        cluster_mode,
        snapshot_retention_days: retention,
    };
    let g = Arc::new(FixtureGateway::new(Fixture {
        caches: vec![
            cluster("single", "Redis", false, 7),
            cluster("clustered", "redis", true, 3),
            cluster("memcached", "memcached", false, 14),
        ],
        ..Default::default()
    }));
    let findings = FamilyAnalyzer::new(g.clone(), g.clone(), g, cache::rules())
        .analyze(&common::account(), now(), limiter())
        .await;

    let got: Vec<(&str, &str)> = findings
        .iter()
        .map(|f| (f.resource_id.as_str(), f.current_state.as_str()))
        .collect();
    assert_eq!(
        got,
        [
            ("single", "Single-node Redis deployment"),
            ("clustered", "Low backup retention"),
        ]
    );
}

#[tokio::test]
async fn internal_load_balancers_are_ignored() {
    let lb = |arn: &str, scheme: &str, protected: bool, healthy: usize| FixtureLoadBalancer {
        load_balancer: LoadBalancer {
            arn: arn.into(),
            name: arn.into(),
            scheme: scheme.into(),
            state: LoadBalancerState::Active,
            deletion_protection: protected,
        },
        healthy_targets: healthy,
    };
    let g = Arc::new(FixtureGateway::new(Fixture {
        load_balancers: vec![
            lb("lb-internal", "internal", false, 0),
            lb("lb-public", "internet-facing", true, 0),
            lb("lb-open", "internet-facing", false, 3),
        ],
        ..Default::default()
    }));
    let findings = FamilyAnalyzer::new(g.clone(), g.clone(), g, load_balancer::rules())
        .analyze(&common::account(), now(), limiter())
        .await;

    let got: Vec<(&str, Severity)> = findings
        .iter()
        .map(|f| (f.resource_id.as_str(), f.severity))
        .collect();
    assert_eq!(
        got,
        [("lb-public", Severity::Medium), ("lb-open", Severity::High)]
    );
}

#[tokio::test]
async fn function_needs_low_memory_and_long_timeout() {
    let func = |name: &str, memory_mb: u32, timeout_secs: u32| FunctionConfig {
        function_name: name.into(),
        memory_mb,
        timeout_secs,
        runtime: "nodejs20.x".into(),
    };
    let g = Arc::new(FixtureGateway::new(Fixture {
        functions: vec![
            func("slow-small", 128, 60),
            func("fast-small", 128, 30),
            func("slow-big", 256, 60),
        ],
        ..Default::default()
    }));
    let findings = FamilyAnalyzer::new(g.clone(), g.clone(), g, function::rules())
        .analyze(&common::account(), now(), limiter())
        .await;
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].resource_id, "slow-small");
}

fn idle_metrics(id: &str, cpu: f64, network_in: f64) -> Vec<costwise::gateway::FixtureMetric> {
    vec![
        common::metric(id, "CPUUtilization", Statistic::Average, vec![cpu; 24]),
        common::metric(id, "NetworkIn", Statistic::Sum, vec![network_in; 24]),
    ]
}

#[tokio::test]
async fn idle_cpu_threshold_is_strict() {
    let at_threshold = compute_findings(Fixture {
        compute: vec![quiet_instance("i-1")],
        metrics: idle_metrics("i-1", compute::IDLE_CPU_PERCENT, 10.0),
        ..Default::default()
    })
    .await;
    assert!(at_threshold.is_empty(), "got {:?}", states(&at_threshold));

    let below = compute_findings(Fixture {
        compute: vec![quiet_instance("i-1")],
        metrics: idle_metrics("i-1", 9.99, 10.0),
        ..Default::default()
    })
    .await;
    assert_eq!(states(&below), ["Idle instance (CPU < 10%, low network I/O)"]);
}

#[tokio::test]
async fn idle_network_in_threshold_is_strict() {
    let at_threshold = compute_findings(Fixture {
        compute: vec![quiet_instance("i-1")],
        metrics: idle_metrics("i-1", 5.0, compute::IDLE_NETWORK_IN),
        ..Default::default()
    })
    .await;
    assert!(at_threshold.is_empty(), "got {:?}", states(&at_threshold));

    let below = compute_findings(Fixture {
        compute: vec![quiet_instance("i-1")],
        metrics: idle_metrics("i-1", 5.0, 999_999.0),
        ..Default::default()
    })
    .await;
    assert_eq!(below.len(), 1);
    assert_eq!(below[0].severity, Severity::High);
}

#[tokio::test]
async fn network_out_threshold_is_strict() {
    let at_threshold = compute_findings(Fixture {
        compute: vec![quiet_instance("i-1")],
        metrics: vec![common::metric("i-1", "NetworkOut", Statistic::Sum, vec![5e8, 5e8])],
        ..Default::default()
    })
    .await;
    assert!(at_threshold.is_empty(), "got {:?}", states(&at_threshold));

    let above = compute_findings(Fixture {
        compute: vec![quiet_instance("i-1")],
        metrics: vec![common::metric(
            "i-1",
            "NetworkOut",
            Statistic::Sum,
            vec![5e8, 5e8, 1.0],
        )],
        ..Default::default()
    })
    .await;
    assert_eq!(states(&above), ["High network transfer costs"]);
    assert_eq!(above[0].severity, Severity::Medium);
}

#[tokio::test]
async fn snapshot_retention_threshold_is_strict() {
    let clustered = |id: &str, retention: u32| CacheCluster {
        cluster_id: id.into(),
        engine: "redis".into(),
        engine_version: String::new(),
        cluster_mode: true,
        snapshot_retention_days: retention,
    };
    let g = Arc::new(FixtureGateway::new(Fixture {
        caches: vec![
            clustered("week", cache::MIN_SNAPSHOT_RETENTION_DAYS),
            clustered("six-days", cache::MIN_SNAPSHOT_RETENTION_DAYS - 1),
        ],
        ..Default::default()
    }));
    let findings = FamilyAnalyzer::new(g.clone(), g.clone(), g, cache::rules())
        .analyze(&common::account(), now(), limiter())
        .await;

    let got: Vec<(&str, &str)> = findings
        .iter()
        .map(|f| (f.resource_id.as_str(), f.current_state.as_str()))
        .collect();
    assert_eq!(got, [("six-days", "Low backup retention")]);
}
