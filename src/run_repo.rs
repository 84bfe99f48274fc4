// Persistence of analysis runs and their findings.
// A run row is written when the run starts and finalized, findings included, in one transaction.

use sqlx::Row;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteRow;
use tracing::instrument;

use crate::db::{from_millis, to_millis};
use crate::models::{AnalysisRun, Finding, ResourceType, RunKind, RunStatus, Severity};

pub struct RunRepo {
    pool: SqlitePool,
}

impl RunRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analysis_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                start_time INTEGER NOT NULL,
                end_time INTEGER NOT NULL,
                status TEXT NOT NULL,
                total_cost REAL,
                total_savings REAL,
                error_message TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS findings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id INTEGER NOT NULL REFERENCES analysis_runs(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                resource_type TEXT NOT NULL,
                billed_service INTEGER NOT NULL DEFAULT 0,
                resource_id TEXT NOT NULL,
                current_state TEXT NOT NULL,
                suggested_action TEXT NOT NULL,
                current_cost REAL NOT NULL,
                potential_savings REAL NOT NULL,
                severity TEXT NOT NULL,
                additional_details TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_findings_run_id ON findings(run_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_runs_account_id ON analysis_runs(account_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert the run row in its current state and return the new id.
    #[instrument(skip(self, run), fields(repo = "runs", operation = "insert_run", account_id = %run.account_id()))]
    pub async fn insert_run(&self, run: &AnalysisRun) -> anyhow::Result<i64> {
        let result = sqlx::query(
            "INSERT INTO analysis_runs (account_id, kind, start_time, end_time, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(run.account_id())
        .bind(run.kind().as_str())
        .bind(to_millis(run.start_time()))
        .bind(to_millis(run.end_time()))
        .bind(run.status().as_str())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Write the terminal state: status, totals, error message and the full finding set.
    #[instrument(skip(self, run), fields(repo = "runs", operation = "finalize_run", run_id = ?run.id()))]
    pub async fn finalize_run(&self, run: &AnalysisRun) -> anyhow::Result<()> {
        let id = run
            .id()
            .ok_or_else(|| anyhow::anyhow!("cannot finalize a run that was never inserted"))?;
        anyhow::ensure!(
            run.status().is_terminal(),
            "cannot finalize run {} in status {}",
            id,
            run.status()
        );

        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE analysis_runs SET status = $1, total_cost = $2, total_savings = $3, error_message = $4
             WHERE id = $5",
        )
        .bind(run.status().as_str())
        .bind(run.total_cost())
        .bind(run.total_savings())
        .bind(run.error_message())
        .bind(id)
        .execute(&mut *tx)
        .await?;
        anyhow::ensure!(updated.rows_affected() == 1, "run {} not found", id);

        sqlx::query("DELETE FROM findings WHERE run_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for (position, f) in run.findings().iter().enumerate() {
            sqlx::query(
                "INSERT INTO findings (run_id, position, resource_type, billed_service, resource_id, current_state, suggested_action, current_cost, potential_savings, severity, additional_details)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(id)
            .bind(position as i64)
            .bind(f.resource_type.as_str())
            .bind(matches!(f.resource_type, ResourceType::BilledService(_)))
            .bind(&f.resource_id)
            .bind(&f.current_state)
            .bind(&f.suggested_action)
            .bind(f.current_cost)
            .bind(f.potential_savings)
            .bind(f.severity.as_str())
            .bind(f.additional_details.as_deref())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Run with its findings in the order they were produced.
    #[instrument(skip(self), fields(repo = "runs", operation = "get_run"))]
    pub async fn get_run(&self, id: i64) -> anyhow::Result<Option<AnalysisRun>> {
        let row = sqlx::query(
            "SELECT id, account_id, kind, start_time, end_time, status, total_cost, total_savings, error_message
             FROM analysis_runs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let finding_rows = sqlx::query(
            "SELECT resource_type, billed_service, resource_id, current_state, suggested_action, current_cost, potential_savings, severity, additional_details
             FROM findings WHERE run_id = $1 ORDER BY position ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        let mut findings = Vec::with_capacity(finding_rows.len());
        for r in &finding_rows {
            findings.push(Self::parse_finding_row(r)?);
        }

        Ok(Some(Self::parse_run_row(&row, findings)?))
    }

    /// Most recent runs for an account, newest first, without findings.
    #[instrument(skip(self), fields(repo = "runs", operation = "list_runs"))]
    pub async fn list_runs(&self, account_id: &str, limit: u32) -> anyhow::Result<Vec<AnalysisRun>> {
        let rows = sqlx::query(
            "SELECT id, account_id, kind, start_time, end_time, status, total_cost, total_savings, error_message
             FROM analysis_runs WHERE account_id = $1 ORDER BY id DESC LIMIT $2",
        )
        .bind(account_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| Self::parse_run_row(r, Vec::new()))
            .collect()
    }

    fn parse_run_row(row: &SqliteRow, findings: Vec<Finding>) -> anyhow::Result<AnalysisRun> {
        let kind: String = row.try_get("kind")?;
        let status: String = row.try_get("status")?;
        Ok(AnalysisRun {
            id: Some(row.try_get("id")?),
            account_id: row.try_get("account_id")?,
            kind: RunKind::parse(&kind)
                .ok_or_else(|| anyhow::anyhow!("unknown run kind {:?}", kind))?,
            start_time: from_millis(row.try_get("start_time")?)?,
            end_time: from_millis(row.try_get("end_time")?)?,
            status: RunStatus::parse(&status)
                .ok_or_else(|| anyhow::anyhow!("unknown run status {:?}", status))?,
            total_cost: row.try_get("total_cost")?,
            total_savings: row.try_get("total_savings")?,
            error_message: row.try_get("error_message")?,
            findings,
        })
    }

    fn parse_finding_row(row: &SqliteRow) -> anyhow::Result<Finding> {
        let label: String = row.try_get("resource_type")?;
        let billed: bool = row.try_get("billed_service")?;
        let severity: String = row.try_get("severity")?;
        Ok(Finding {
            resource_type: if billed {
                ResourceType::BilledService(label)
            } else {
                ResourceType::from_label(&label)
            },
            resource_id: row.try_get("resource_id")?,
            current_state: row.try_get("current_state")?,
            suggested_action: row.try_get("suggested_action")?,
            current_cost: row.try_get("current_cost")?,
            potential_savings: row.try_get("potential_savings")?,
            severity: Severity::parse(&severity)
                .ok_or_else(|| anyhow::anyhow!("unknown severity {:?}", severity))?,
            additional_details: row.try_get("additional_details")?,
        })
    }
}
