use async_trait::async_trait;
use jiff::Timestamp;
use reserva_core::error::{Result, StorageError};
use reserva_core::{ReservationKey, ReservationStore};
use sqlx::mysql::MySqlDatabaseError;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Schema for the `reserved_values` table.
pub const SCHEMA: &str = include_str!("../ddl/mysql/reserved_values.sql");

/// Attempts per value when InnoDB picks the insert as a deadlock victim or
/// times out waiting for a lock.
const LOCK_ATTEMPTS: usize = 3;

/// A row that still blocks its value: reserved and unexpired, or consumed.
const TAKEN: &str = " AND (used_at IS NOT NULL OR expires_at > ";

/// MySQL implementation of the reservation store.
///
/// The unique index on `(owner_kind, owner_id, reservation_key, value)` is the
/// arbiter between concurrent callers. Expired rows keep their slot in that
/// index until they are purged, so inserts clear expired rows in the way
/// before claiming their values. Every statement runs in autocommit, so
/// concurrent callers never hold locks across statements.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Creates a store from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a store by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the `reserved_values` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Inserts one value. Returns `false` when another caller holds it.
    ///
    /// A deadlock or lock wait timeout is retried; if it persists, the value
    /// is given up like a lost race and the caller draws another one.
    async fn insert_one(
        &self,
        key: &ReservationKey,
        value: &str,
        expires_at: Timestamp,
        now: i64,
    ) -> Result<bool> {
        for attempt in 1..=LOCK_ATTEMPTS {
            let result = sqlx::query(
                r#"
                INSERT INTO reserved_values
                    (owner_kind, owner_id, reservation_key, value, expires_at, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&key.owner.kind)
            .bind(&key.owner.id)
            .bind(&key.signature)
            .bind(value)
            .bind(expires_at.as_second())
            .bind(now)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => return Ok(true),
                Err(err) if is_unique_violation(&err) => {
                    debug!(key = %key, value, "value already taken");
                    return Ok(false);
                }
                Err(err) if is_lock_conflict(&err) => {
                    debug!(key = %key, value, attempt, error = %err, "insert hit a lock conflict");
                }
                Err(err) => return Err(map_sqlx_error(err)),
            }
        }

        warn!(key = %key, value, "giving up value after repeated lock conflicts");
        Ok(false)
    }
}

fn now_unix_seconds() -> i64 {
    Timestamp::now().as_second()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn is_lock_conflict(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.try_downcast_ref::<MySqlDatabaseError>())
        .is_some_and(|e| matches!(e.number(), 1205 | 1213))
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

/// Starts a query filtered to the rows of one reservation key.
fn scoped<'args>(prefix: &str, key: &'args ReservationKey) -> QueryBuilder<'args, MySql> {
    let mut query = QueryBuilder::new(prefix);
    query.push(" WHERE owner_kind = ");
    query.push_bind(key.owner.kind.as_str());
    query.push(" AND owner_id = ");
    query.push_bind(key.owner.id.as_str());
    query.push(" AND reservation_key = ");
    query.push_bind(key.signature.as_str());
    query
}

fn push_value_list<'args>(query: &mut QueryBuilder<'args, MySql>, values: &'args [String]) {
    query.push(" AND value IN (");
    let mut separated = query.separated(", ");
    for value in values {
        separated.push_bind(value.as_str());
    }
    separated.push_unseparated(")");
}

#[async_trait]
impl ReservationStore for MySqlStore {
    async fn count_used(&self, key: &ReservationKey) -> Result<u64> {
        let mut query = scoped("SELECT COUNT(*) AS used FROM reserved_values", key);
        query.push(TAKEN);
        query.push_bind(now_unix_seconds());
        query.push(")");

        let row = query
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let used: i64 = row.try_get("used").map_err(map_sqlx_error)?;

        u64::try_from(used)
            .map_err(|e| StorageError::InvalidData(format!("invalid reservation count {used}: {e}")))
    }

    async fn sample_available(
        &self,
        key: &ReservationKey,
        candidates: &[String],
        limit: usize,
    ) -> Result<HashSet<String>> {
        if candidates.is_empty() || limit == 0 {
            return Ok(HashSet::new());
        }

        let mut query = scoped("SELECT value FROM reserved_values", key);
        query.push(TAKEN);
        query.push_bind(now_unix_seconds());
        query.push(")");
        push_value_list(&mut query, candidates);

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let taken = rows
            .iter()
            .map(|row| row.try_get::<String, _>("value"))
            .collect::<std::result::Result<HashSet<_>, _>>()
            .map_err(map_sqlx_error)?;

        Ok(candidates
            .iter()
            .filter(|candidate| !taken.contains(*candidate))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn bulk_reserve(
        &self,
        key: &ReservationKey,
        values: &[String],
        expires_at: Timestamp,
    ) -> Result<Vec<String>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }

        let now = now_unix_seconds();

        let mut clear = scoped("DELETE FROM reserved_values", key);
        clear.push(" AND used_at IS NULL AND expires_at <= ");
        clear.push_bind(now);
        push_value_list(&mut clear, values);
        match clear.build().execute(&self.pool).await {
            Ok(_) => {}
            // Rows left in the way only make their values lose the insert.
            Err(err) if is_lock_conflict(&err) => {
                debug!(key = %key, error = %err, "skipped clearing expired rows");
            }
            Err(err) => return Err(map_sqlx_error(err)),
        }

        // Inserting in index order keeps concurrent batches from crossing.
        let mut ordered: Vec<&String> = values.iter().collect();
        ordered.sort();
        ordered.dedup();

        let mut inserted = HashSet::with_capacity(ordered.len());
        for value in ordered {
            if self.insert_one(key, value, expires_at, now).await? {
                inserted.insert(value.as_str());
            }
        }

        let mut accepted = Vec::with_capacity(inserted.len());
        for value in values {
            if inserted.remove(value.as_str()) {
                accepted.push(value.clone());
            }
        }
        Ok(accepted)
    }

    async fn is_reserved(&self, key: &ReservationKey, value: &str) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS reserved FROM reserved_values
            WHERE owner_kind = ?
              AND owner_id = ?
              AND reservation_key = ?
              AND value = ?
              AND used_at IS NULL
              AND expires_at > ?
            "#,
        )
        .bind(&key.owner.kind)
        .bind(&key.owner.id)
        .bind(&key.signature)
        .bind(value)
        .bind(now_unix_seconds())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let reserved: i64 = row.try_get("reserved").map_err(map_sqlx_error)?;
        Ok(reserved > 0)
    }

    async fn consume(&self, key: &ReservationKey, value: &str) -> Result<bool> {
        let now = now_unix_seconds();
        let result = sqlx::query(
            r#"
            UPDATE reserved_values
            SET used_at = ?
            WHERE owner_kind = ?
              AND owner_id = ?
              AND reservation_key = ?
              AND value = ?
              AND used_at IS NULL
              AND expires_at > ?
            "#,
        )
        .bind(now)
        .bind(&key.owner.kind)
        .bind(&key.owner.id)
        .bind(&key.signature)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM reserved_values
            WHERE used_at IS NULL
              AND expires_at <= ?
            "#,
        )
        .bind(now_unix_seconds())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
