//! Observation stores.
//!
//! The [`ObservationSink`] accumulates observations for the current audit and
//! answers the aggregate queries the decision engine needs. Each call is one
//! logical operation; consistency under concurrent use is the store's job.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::observation::{ClauseCounts, Observation};

#[cfg(feature = "postgres")]
use sqlx::{postgres::PgRow, FromRow, PgPool, Row as _};

#[cfg(feature = "postgres")]
use crate::ddl::quote_identifier;

#[cfg(feature = "postgres")]
use crate::observation::ClauseKind;

#[async_trait]
pub trait ObservationSink: Send + Sync {
    /// Persist one observation
    async fn append(&self, observation: &Observation) -> Result<()>;

    /// Per-clause reference counts for every `(table, column)` pair.
    ///
    /// Clause-less observations are excluded.
    async fn grouped_totals(&self) -> Result<Vec<ClauseCounts>>;

    /// Number of observations of any clause kind recorded for `table_name`
    async fn table_total(&self, table_name: &str) -> Result<i64>;

    /// Remove every observation
    async fn clear_all(&self) -> Result<()>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// Observation store held in process memory
#[derive(Debug, Default)]
pub struct MemoryObservationStore {
    observations: Mutex<Vec<Observation>>,
}

impl MemoryObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Observation>> {
        self.observations.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ObservationSink for MemoryObservationStore {
    async fn append(&self, observation: &Observation) -> Result<()> {
        self.lock().push(observation.clone());
        Ok(())
    }

    async fn grouped_totals(&self) -> Result<Vec<ClauseCounts>> {
        let mut groups: BTreeMap<(String, String), ClauseCounts> = BTreeMap::new();

        for obs in self.lock().iter().filter(|o| o.has_column()) {
            groups
                .entry((obs.table_name.clone(), obs.column_name.clone()))
                .or_insert_with(|| ClauseCounts::new(&obs.table_name, &obs.column_name))
                .add(obs.clause_kind);
        }

        Ok(groups.into_values().collect())
    }

    async fn table_total(&self, table_name: &str) -> Result<i64> {
        let total = self.lock().iter().filter(|o| o.table_name == table_name).count();
        Ok(total as i64)
    }

    async fn clear_all(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }
}

// ============================================================================
// PostgreSQL store
// ============================================================================

#[cfg(feature = "postgres")]
impl<'r> FromRow<'r, PgRow> for ClauseCounts {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            table_name: row.try_get("table_name")?,
            column_name: row.try_get("clause_name")?,
            where_count: row.try_get("where_count")?,
            group_by_count: row.try_get("group_by_count")?,
            order_by_count: row.try_get("order_by_count")?,
        })
    }
}

/// Observation log kept in a PostgreSQL table with the columns
/// `(query_type, table_name, clause_type, clause_name, log_time)`
#[cfg(feature = "postgres")]
pub struct PgObservationStore {
    pool: PgPool,
    table_name: String,
}

#[cfg(feature = "postgres")]
impl PgObservationStore {
    pub fn new(pool: PgPool, table_name: impl Into<String>) -> Self {
        Self {
            pool,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Create the log table if it doesn't exist
    pub async fn initialize(&self) -> Result<()> {
        let create_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                query_type TEXT NOT NULL,
                table_name TEXT NOT NULL,
                clause_type TEXT NOT NULL,
                clause_name TEXT NOT NULL,
                log_time TIMESTAMPTZ NOT NULL
            )
            "#,
            quote_identifier(&self.table_name)
        );

        sqlx::query(&create_sql).execute(&self.pool).await?;

        Ok(())
    }
}

#[cfg(feature = "postgres")]
#[async_trait]
impl ObservationSink for PgObservationStore {
    async fn append(&self, observation: &Observation) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (query_type, table_name, clause_type, clause_name, log_time)
             VALUES ($1, $2, $3, $4, $5)",
            quote_identifier(&self.table_name)
        );

        sqlx::query(&sql)
            .bind(observation.query_type.as_str())
            .bind(&observation.table_name)
            .bind(observation.clause_kind.as_str())
            .bind(&observation.column_name)
            .bind(observation.timestamp)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn grouped_totals(&self) -> Result<Vec<ClauseCounts>> {
        let sql = format!(
            r#"
            SELECT
                table_name,
                clause_name,
                COUNT(*) FILTER (WHERE clause_type = $1) AS where_count,
                COUNT(*) FILTER (WHERE clause_type = $2) AS group_by_count,
                COUNT(*) FILTER (WHERE clause_type = $3) AS order_by_count
            FROM {}
            WHERE clause_type <> $4
            GROUP BY table_name, clause_name
            ORDER BY table_name, clause_name
            "#,
            quote_identifier(&self.table_name)
        );

        let groups = sqlx::query_as::<_, ClauseCounts>(&sql)
            .bind(ClauseKind::Where.as_str())
            .bind(ClauseKind::GroupBy.as_str())
            .bind(ClauseKind::OrderBy.as_str())
            .bind(ClauseKind::None.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(groups)
    }

    async fn table_total(&self, table_name: &str) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE table_name = $1",
            quote_identifier(&self.table_name)
        );

        let total = sqlx::query_scalar::<_, i64>(&sql)
            .bind(table_name)
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }

    async fn clear_all(&self) -> Result<()> {
        let sql = format!("DELETE FROM {}", quote_identifier(&self.table_name));
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }
}
