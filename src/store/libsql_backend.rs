//! libSQL backend — async `OnboardingStore` implementation.
//!
//! Supports local file and in-memory databases. Scalar client fields map to
//! columns; nested records (provider refs, step sequences) are stored as
//! JSON text.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database, Row, params};
use tracing::info;
use uuid::Uuid;

use crate::client::{Client, ClientStatus, ProjectType, ProviderRefs};
use crate::error::StoreError;
use crate::workflow::{OnboardingProgress, OnboardingStep};

use super::migrations;
use super::traits::{ClientPage, OnboardingStore};

/// libSQL store backend.
///
/// Holds a single connection reused for all operations;
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open libSQL database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::Serialization(format!("Invalid UUID {s}: {e}")))
}

fn get_text(row: &Row, idx: i32) -> Result<String, StoreError> {
    row.get::<String>(idx)
        .map_err(|e| StoreError::Query(format!("Failed to read column {idx}: {e}")))
}

fn get_opt_text(row: &Row, idx: i32) -> Result<Option<String>, StoreError> {
    row.get::<Option<String>>(idx)
        .map_err(|e| StoreError::Query(format!("Failed to read column {idx}: {e}")))
}

fn client_from_row(row: &Row) -> Result<Client, StoreError> {
    let provider_refs: ProviderRefs = serde_json::from_str(&get_text(row, 13)?)
        .map_err(|e| StoreError::Serialization(format!("Bad provider_refs JSON: {e}")))?;
    Ok(Client {
        id: parse_uuid(&get_text(row, 0)?)?,
        name: get_text(row, 1)?,
        email: get_text(row, 2)?,
        company: get_opt_text(row, 3)?,
        phone: get_opt_text(row, 4)?,
        project_type: ProjectType::from_str(&get_text(row, 5)?)
            .map_err(StoreError::Serialization)?,
        project_scope: get_text(row, 6)?,
        budget_range: get_opt_text(row, 7)?,
        timeline: get_opt_text(row, 8)?,
        additional_notes: get_opt_text(row, 9)?,
        status: ClientStatus::from_str(&get_text(row, 10)?).map_err(StoreError::Serialization)?,
        created_at: parse_datetime(&get_text(row, 11)?),
        updated_at: parse_datetime(&get_text(row, 12)?),
        provider_refs,
    })
}

const CLIENT_COLUMNS: &str = "id, name, email, company, phone, project_type, project_scope, \
     budget_range, timeline, additional_notes, status, created_at, updated_at, provider_refs";

#[async_trait]
impl OnboardingStore for LibSqlStore {
    async fn upsert_client(&self, client: &Client) -> Result<(), StoreError> {
        let provider_refs = serde_json::to_string(&client.provider_refs)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO clients (id, name, email, company, phone, project_type, \
                 project_scope, budget_range, timeline, additional_notes, status, \
                 created_at, updated_at, provider_refs) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14) \
                 ON CONFLICT(id) DO UPDATE SET \
                   name = excluded.name, email = excluded.email, \
                   company = excluded.company, phone = excluded.phone, \
                   project_type = excluded.project_type, \
                   project_scope = excluded.project_scope, \
                   budget_range = excluded.budget_range, timeline = excluded.timeline, \
                   additional_notes = excluded.additional_notes, status = excluded.status, \
                   updated_at = excluded.updated_at, \
                   provider_refs = excluded.provider_refs",
                params![
                    client.id.to_string(),
                    client.name.clone(),
                    client.email.clone(),
                    client.company.clone(),
                    client.phone.clone(),
                    client.project_type.to_string(),
                    client.project_scope.clone(),
                    client.budget_range.clone(),
                    client.timeline.clone(),
                    client.additional_notes.clone(),
                    client.status.to_string(),
                    client.created_at.to_rfc3339(),
                    client.updated_at.to_rfc3339(),
                    provider_refs,
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to upsert client: {e}")))?;
        Ok(())
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, StoreError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to query client: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read client row: {e}")))?
        {
            Some(row) => Ok(Some(client_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_clients(
        &self,
        status: Option<ClientStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<ClientPage, StoreError> {
        let (count_sql, page_sql) = match status {
            Some(_) => (
                "SELECT COUNT(*) FROM clients WHERE status = ?1".to_string(),
                format!(
                    "SELECT {CLIENT_COLUMNS} FROM clients WHERE status = ?1 \
                     ORDER BY created_at DESC LIMIT ?2 OFFSET ?3"
                ),
            ),
            None => (
                "SELECT COUNT(*) FROM clients".to_string(),
                format!(
                    "SELECT {CLIENT_COLUMNS} FROM clients \
                     ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"
                ),
            ),
        };

        let mut count_rows = match status {
            Some(s) => self.conn.query(&count_sql, params![s.to_string()]).await,
            None => self.conn.query(&count_sql, ()).await,
        }
        .map_err(|e| StoreError::Query(format!("Failed to count clients: {e}")))?;

        let total = match count_rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read count: {e}")))?
        {
            Some(row) => row
                .get::<i64>(0)
                .map_err(|e| StoreError::Query(format!("Failed to parse count: {e}")))?
                as usize,
            None => 0,
        };

        let mut rows = match status {
            Some(s) => {
                self.conn
                    .query(
                        &page_sql,
                        params![s.to_string(), limit as i64, offset as i64],
                    )
                    .await
            }
            None => {
                self.conn
                    .query(&page_sql, params![limit as i64, offset as i64])
                    .await
            }
        }
        .map_err(|e| StoreError::Query(format!("Failed to list clients: {e}")))?;

        let mut clients = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read client row: {e}")))?
        {
            clients.push(client_from_row(&row)?);
        }

        Ok(ClientPage { clients, total })
    }

    async fn delete_client(&self, id: Uuid) -> Result<bool, StoreError> {
        self.conn
            .execute(
                "DELETE FROM progress WHERE client_id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to delete progress: {e}")))?;
        let affected = self
            .conn
            .execute("DELETE FROM clients WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(|e| StoreError::Query(format!("Failed to delete client: {e}")))?;
        Ok(affected > 0)
    }

    async fn upsert_progress(&self, progress: &OnboardingProgress) -> Result<(), StoreError> {
        let steps = serde_json::to_string(&progress.steps)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.conn
            .execute(
                "INSERT INTO progress (client_id, steps, current_step, overall_status, \
                 started_at, completed_at, progress_percentage) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                 ON CONFLICT(client_id) DO UPDATE SET \
                   steps = excluded.steps, current_step = excluded.current_step, \
                   overall_status = excluded.overall_status, \
                   started_at = excluded.started_at, completed_at = excluded.completed_at, \
                   progress_percentage = excluded.progress_percentage",
                params![
                    progress.client_id.to_string(),
                    steps,
                    progress.current_step as i64,
                    progress.overall_status.to_string(),
                    progress.started_at.map(|t| t.to_rfc3339()),
                    progress.completed_at.map(|t| t.to_rfc3339()),
                    progress.progress_percentage as i64,
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to upsert progress: {e}")))?;
        Ok(())
    }

    async fn get_progress(
        &self,
        client_id: Uuid,
    ) -> Result<Option<OnboardingProgress>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT client_id, steps, current_step, overall_status, started_at, \
                 completed_at, progress_percentage FROM progress WHERE client_id = ?1",
                params![client_id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to query progress: {e}")))?;

        let row = match rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to read progress row: {e}")))?
        {
            Some(row) => row,
            None => return Ok(None),
        };

        let steps: Vec<OnboardingStep> = serde_json::from_str(&get_text(&row, 1)?)
            .map_err(|e| StoreError::Serialization(format!("Bad steps JSON: {e}")))?;
        let current_step = row
            .get::<i64>(2)
            .map_err(|e| StoreError::Query(format!("Failed to read current_step: {e}")))?
            as usize;
        let progress_percentage = row
            .get::<i64>(6)
            .map_err(|e| StoreError::Query(format!("Failed to read percentage: {e}")))?
            as u8;

        Ok(Some(OnboardingProgress {
            client_id: parse_uuid(&get_text(&row, 0)?)?,
            steps,
            current_step,
            overall_status: ClientStatus::from_str(&get_text(&row, 3)?)
                .map_err(StoreError::Serialization)?,
            started_at: get_opt_text(&row, 4)?.map(|s| parse_datetime(&s)),
            completed_at: get_opt_text(&row, 5)?.map(|s| parse_datetime(&s)),
            progress_percentage,
        }))
    }
}
