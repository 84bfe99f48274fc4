// Repository tests: run persistence and the encrypted account registry

mod common;

use chrono::{TimeZone, Utc};
use costwise::account_repo::AccountRepo;
use costwise::credentials::CredentialCipher;
use costwise::models::*;
use sqlx::Row;
use std::sync::Arc;
use tempfile::TempDir;

fn finished_run(findings: Vec<Finding>) -> AnalysisRun {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
    let mut run = AnalysisRun::new("123456789012", RunKind::CostAggregation, start, end);
    run.start().unwrap();
    run.complete(findings).unwrap();
    run
}

#[tokio::test]
async fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let (accounts, runs) = common::repos(&dir).await;
    accounts.init().await.unwrap();
    runs.init().await.unwrap();
}

#[tokio::test]
async fn running_run_is_visible_before_finalize() {
    let dir = TempDir::new().unwrap();
    let (_, runs) = common::repos(&dir).await;
    let mut run = AnalysisRun::new("1", RunKind::ResourceRules, Utc::now(), Utc::now());
    run.start().unwrap();

    let id = runs.insert_run(&run).await.unwrap();
    let stored = runs.get_run(id).await.unwrap().unwrap();
    assert_eq!(stored.status(), RunStatus::Running);
    assert_eq!(stored.total_cost(), None);
    assert!(stored.findings().is_empty());
}

#[tokio::test]
async fn finalize_refuses_non_terminal_runs() {
    let dir = TempDir::new().unwrap();
    let (_, runs) = common::repos(&dir).await;
    let mut run = AnalysisRun::new("1", RunKind::ResourceRules, Utc::now(), Utc::now());
    run.start().unwrap();
    assert!(runs.finalize_run(&run).await.is_err(), "never inserted");

    let id = runs.insert_run(&run).await.unwrap();
    let stored = runs.get_run(id).await.unwrap().unwrap();
    let err = runs.finalize_run(&stored).await.unwrap_err();
    assert!(err.to_string().contains("RUNNING"));
}

#[tokio::test]
async fn get_run_unknown_id_is_none() {
    let dir = TempDir::new().unwrap();
    let (_, runs) = common::repos(&dir).await;
    assert!(runs.get_run(42).await.unwrap().is_none());
}

#[tokio::test]
async fn list_runs_is_newest_first() {
    let dir = TempDir::new().unwrap();
    let (_, runs) = common::repos(&dir).await;
    let first = runs.insert_run(&finished_run(vec![])).await.unwrap();
    let second = runs.insert_run(&finished_run(vec![])).await.unwrap();

    let listed = runs.list_runs("123456789012", 10).await.unwrap();
    let ids: Vec<Option<i64>> = listed.iter().map(|r| r.id()).collect();
    assert_eq!(ids, [Some(second), Some(first)]);
    assert!(runs.list_runs("other", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn account_round_trip_keeps_secrets_encrypted() {
    let dir = TempDir::new().unwrap();
    let (accounts, _) = common::repos(&dir).await;

    let record = accounts.create(&common::new_account()).await.unwrap();
    assert_eq!(record.account_id, "123456789012");
    assert!(record.active);
    assert!(record.last_analysis_run.is_none());

    let creds = accounts.load_credentials(record.id).await.unwrap();
    assert_eq!(creds.access_key, "AKIAEXAMPLEKEY");
    assert_eq!(creds.secret_key, "wJalrXUtnFEMI/EXAMPLE");

    // Raw column values are ciphertext.
    let pool = costwise::db::connect(dir.path().join("costwise.db").to_str().unwrap(), 1)
        .await
        .unwrap();
    let row = sqlx::query("SELECT access_key, secret_key FROM accounts WHERE id = $1")
        .bind(record.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    let stored_access: String = row.try_get("access_key").unwrap();
    let stored_secret: String = row.try_get("secret_key").unwrap();
    assert_ne!(stored_access, "AKIAEXAMPLEKEY");
    assert!(!stored_secret.contains("EXAMPLE"));
}

#[tokio::test]
async fn credentials_need_the_same_key_material() {
    let dir = TempDir::new().unwrap();
    let (accounts, _) = common::repos(&dir).await;
    let record = accounts.create(&common::new_account()).await.unwrap();

    let pool = costwise::db::connect(dir.path().join("costwise.db").to_str().unwrap(), 1)
        .await
        .unwrap();
    let other = AccountRepo::new(pool, Arc::new(CredentialCipher::new("other", "test-salt")));
    assert!(other.load_credentials(record.id).await.is_err());
}

#[tokio::test]
async fn list_active_and_mark_analyzed() {
    let dir = TempDir::new().unwrap();
    let (accounts, _) = common::repos(&dir).await;
    let a = accounts.create(&common::new_account()).await.unwrap();
    let b = accounts.create(&common::new_account()).await.unwrap();
    accounts.set_active(b.id, false).await.unwrap();

    let active = accounts.list_active().await.unwrap();
    assert_eq!(active.iter().map(|r| r.id).collect::<Vec<_>>(), [a.id]);

    let at = Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap();
    accounts.mark_analyzed(a.id, at).await.unwrap();
    let reloaded = accounts.get(a.id).await.unwrap().unwrap();
    assert_eq!(reloaded.last_analysis_run, Some(at));

    assert!(accounts.mark_analyzed(999, at).await.is_err());
    assert!(accounts.get(999).await.unwrap().is_none());
}

#[test]
fn record_converts_to_opaque_account() {
    let record = AccountRecord {
        id: 7,
        account_name: "prod".into(),
        account_id: "123456789012".into(),
        region: "eu-central-1".into(),
        active: true,
        created_at: Utc::now(),
        last_analysis_run: None,
    };
    let account = record.to_account();
    assert_eq!(account.account_id, "123456789012");
    assert_eq!(account.region, "eu-central-1");
    assert!(!format!("{:?}", account).contains("account:7"));
}
