//! Live index usage statistics

use async_trait::async_trait;

use crate::error::Result;

#[cfg(feature = "postgres")]
use sqlx::{postgres::PgRow, FromRow, PgPool, Row as _};

/// Scan counters for one live index, read at decision time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexUsageStat {
    pub schema: String,
    pub table: String,
    pub index_name: String,
    pub is_unique: bool,
    pub index_scans: i64,
    /// Sequential scans of the owning table
    pub sequential_scans: i64,
}

impl IndexUsageStat {
    /// Fraction of the table's scans served by this index.
    ///
    /// `None` when the table has not been scanned at all.
    pub fn usage_ratio(&self) -> Option<f64> {
        let total = self.index_scans + self.sequential_scans;
        if total <= 0 {
            None
        } else {
            Some(self.index_scans as f64 / total as f64)
        }
    }
}

#[async_trait]
pub trait IndexStatsSource: Send + Sync {
    async fn index_usage(&self) -> Result<Vec<IndexUsageStat>>;
}

/// Fixed set of statistics, for hosts that collect counters themselves
#[derive(Debug, Clone, Default)]
pub struct StaticIndexStats {
    stats: Vec<IndexUsageStat>,
}

impl StaticIndexStats {
    pub fn new(stats: Vec<IndexUsageStat>) -> Self {
        Self { stats }
    }
}

#[async_trait]
impl IndexStatsSource for StaticIndexStats {
    async fn index_usage(&self) -> Result<Vec<IndexUsageStat>> {
        Ok(self.stats.clone())
    }
}

#[cfg(feature = "postgres")]
impl<'r> FromRow<'r, PgRow> for IndexUsageStat {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            schema: row.try_get("schema_name")?,
            table: row.try_get("table_name")?,
            index_name: row.try_get("index_name")?,
            is_unique: row.try_get("is_unique")?,
            index_scans: row.try_get("index_scans")?,
            sequential_scans: row.try_get("sequential_scans")?,
        })
    }
}

/// Reads `pg_stat_user_indexes` for one schema
#[cfg(feature = "postgres")]
pub struct PgIndexStats {
    pool: PgPool,
    schema: String,
}

#[cfg(feature = "postgres")]
impl PgIndexStats {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }
}

#[cfg(feature = "postgres")]
#[async_trait]
impl IndexStatsSource for PgIndexStats {
    async fn index_usage(&self) -> Result<Vec<IndexUsageStat>> {
        let query = r#"
            SELECT
                s.schemaname::text AS schema_name,
                s.relname::text AS table_name,
                s.indexrelname::text AS index_name,
                i.indisunique AS is_unique,
                COALESCE(s.idx_scan, 0) AS index_scans,
                COALESCE(t.seq_scan, 0) AS sequential_scans
            FROM pg_stat_user_indexes s
            JOIN pg_stat_user_tables t ON t.relid = s.relid
            JOIN pg_index i ON i.indexrelid = s.indexrelid
            WHERE s.schemaname = $1
            ORDER BY s.relname, s.indexrelname
        "#;

        let stats = sqlx::query_as::<_, IndexUsageStat>(query)
            .bind(&self.schema)
            .fetch_all(&self.pool)
            .await?;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(index_scans: i64, sequential_scans: i64) -> IndexUsageStat {
        IndexUsageStat {
            schema: "public".to_string(),
            table: "orders".to_string(),
            index_name: "idx_orders_status".to_string(),
            is_unique: false,
            index_scans,
            sequential_scans,
        }
    }

    #[test]
    fn test_usage_ratio() {
        assert_eq!(stat(1, 99).usage_ratio(), Some(0.01));
        assert_eq!(stat(5, 5).usage_ratio(), Some(0.5));
        assert_eq!(stat(0, 10).usage_ratio(), Some(0.0));
    }

    #[test]
    fn test_usage_ratio_undefined_without_scans() {
        assert_eq!(stat(0, 0).usage_ratio(), None);
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticIndexStats::new(vec![stat(3, 4)]);
        let stats = source.index_usage().await.unwrap();
        assert_eq!(stats, vec![stat(3, 4)]);
    }
}
