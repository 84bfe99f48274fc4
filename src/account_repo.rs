// Account registry. Access and secret keys are stored encrypted and only decrypted on explicit load.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteRow;
use std::sync::Arc;
use tracing::instrument;

use crate::credentials::CredentialCipher;
use crate::db::{from_millis, to_millis};
use crate::models::{AccountRecord, Credentials, NewAccount};

const RECORD_COLUMNS: &str =
    "id, account_name, account_id, region, active, created_at, last_analysis_run";

pub struct AccountRepo {
    pool: SqlitePool,
    cipher: Arc<CredentialCipher>,
}

impl AccountRepo {
    pub fn new(pool: SqlitePool, cipher: Arc<CredentialCipher>) -> Self {
        Self { pool, cipher }
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_name TEXT NOT NULL,
                account_id TEXT NOT NULL,
                region TEXT NOT NULL,
                access_key TEXT NOT NULL,
                secret_key TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                last_analysis_run INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, new), fields(repo = "accounts", operation = "create", account_id = %new.account_id))]
    pub async fn create(&self, new: &NewAccount) -> anyhow::Result<AccountRecord> {
        let access_key = self
            .cipher
            .encrypt(&new.access_key)
            .map_err(|e| anyhow::anyhow!("encrypt access key: {}", e))?;
        let secret_key = self
            .cipher
            .encrypt(&new.secret_key)
            .map_err(|e| anyhow::anyhow!("encrypt secret key: {}", e))?;
        let created_at = Utc::now();

        let result = sqlx::query(
            "INSERT INTO accounts (account_name, account_id, region, access_key, secret_key, active, created_at)
             VALUES ($1, $2, $3, $4, $5, 1, $6)",
        )
        .bind(&new.account_name)
        .bind(&new.account_id)
        .bind(&new.region)
        .bind(&access_key)
        .bind(&secret_key)
        .bind(to_millis(created_at))
        .execute(&self.pool)
        .await?;
        let id = result.last_insert_rowid();

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("account {} missing after insert", id))
    }

    #[instrument(skip(self), fields(repo = "accounts", operation = "get"))]
    pub async fn get(&self, id: i64) -> anyhow::Result<Option<AccountRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            RECORD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::parse_record_row).transpose()
    }

    #[instrument(skip(self), fields(repo = "accounts", operation = "list_active"))]
    pub async fn list_active(&self) -> anyhow::Result<Vec<AccountRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE active = 1 ORDER BY id ASC",
            RECORD_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::parse_record_row).collect()
    }

    /// Decrypt the stored key pair. Never log the result.
    #[instrument(skip(self), fields(repo = "accounts", operation = "load_credentials"))]
    pub async fn load_credentials(&self, id: i64) -> anyhow::Result<Credentials> {
        let row = sqlx::query("SELECT access_key, secret_key FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| anyhow::anyhow!("account {} not found", id))?;
        let access_key: String = row.try_get("access_key")?;
        let secret_key: String = row.try_get("secret_key")?;
        Ok(Credentials {
            access_key: self
                .cipher
                .decrypt(&access_key)
                .map_err(|e| anyhow::anyhow!("decrypt access key: {}", e))?,
            secret_key: self
                .cipher
                .decrypt(&secret_key)
                .map_err(|e| anyhow::anyhow!("decrypt secret key: {}", e))?,
        })
    }

    #[instrument(skip(self), fields(repo = "accounts", operation = "mark_analyzed"))]
    pub async fn mark_analyzed(&self, id: i64, at: DateTime<Utc>) -> anyhow::Result<()> {
        let updated = sqlx::query("UPDATE accounts SET last_analysis_run = $1 WHERE id = $2")
            .bind(to_millis(at))
            .bind(id)
            .execute(&self.pool)
            .await?;
        anyhow::ensure!(updated.rows_affected() == 1, "account {} not found", id);
        Ok(())
    }

    #[instrument(skip(self), fields(repo = "accounts", operation = "set_active"))]
    pub async fn set_active(&self, id: i64, active: bool) -> anyhow::Result<()> {
        let updated = sqlx::query("UPDATE accounts SET active = $1 WHERE id = $2")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;
        anyhow::ensure!(updated.rows_affected() == 1, "account {} not found", id);
        Ok(())
    }

    fn parse_record_row(row: &SqliteRow) -> anyhow::Result<AccountRecord> {
        let last: Option<i64> = row.try_get("last_analysis_run")?;
        Ok(AccountRecord {
            id: row.try_get("id")?,
            account_name: row.try_get("account_name")?,
            account_id: row.try_get("account_id")?,
            region: row.try_get("region")?,
            active: row.try_get("active")?,
            created_at: from_millis(row.try_get("created_at")?)?,
            last_analysis_run: last.map(from_millis).transpose()?,
        })
    }
}
