use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    LedgerError, OutboxRecord, RecordId, RecordStatus, Result,
    store::{Ledger, RecordStream},
};

/// PostgreSQL-backed ledger implementation.
///
/// The CAS transition is a single conditional `UPDATE`; the database's
/// row-level locking makes it atomic across processes, so no advisory locks
/// or transactions are needed around it.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Inserts a new `Pending` record. This is the producer-side write; the
    /// relay itself never creates records.
    pub async fn insert_pending(&self, payload: &[u8]) -> Result<RecordId> {
        let id = RecordId::new();
        sqlx::query(
            r#"
            INSERT INTO outbox_messages (id, payload, status, updated_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(id.as_uuid())
        .bind(payload)
        .bind(RecordStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    fn row_to_record(row: PgRow) -> Result<OutboxRecord> {
        let status_str: String = row.try_get("status")?;
        let status = RecordStatus::parse(&status_str)
            .ok_or_else(|| LedgerError::InvalidStatus(status_str))?;

        Ok(OutboxRecord {
            id: RecordId::from_uuid(row.try_get::<Uuid, _>("id")?),
            payload: row.try_get("payload")?,
            status,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl Ledger for PostgresLedger {
    async fn try_transition(
        &self,
        id: RecordId,
        expected: RecordStatus,
        new: RecordStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_messages
            SET status = $1, updated_at = NOW()
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(new.as_str())
        .bind(id.as_uuid())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        let applied = result.rows_affected() == 1;
        tracing::debug!(record_id = %id, from_status = %expected, to_status = %new, applied, "cas transition");
        Ok(applied)
    }

    async fn scan_by_status(&self, status: RecordStatus) -> Result<RecordStream> {
        use futures_util::stream;

        let rows = sqlx::query(
            r#"
            SELECT id, payload, status, updated_at
            FROM outbox_messages
            WHERE status = $1
            ORDER BY updated_at ASC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        let records: Vec<Result<OutboxRecord>> =
            rows.into_iter().map(Self::row_to_record).collect();

        Ok(Box::pin(stream::iter(records)))
    }

    async fn get(&self, id: RecordId) -> Result<Option<OutboxRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, payload, status, updated_at
            FROM outbox_messages
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }
}
