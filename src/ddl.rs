//! Index DDL generation and execution

use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::error::{AutoIndexError, Result};

#[cfg(feature = "postgres")]
use sqlx::PgPool;

/// Quote an identifier for PostgreSQL (double quotes, embedded quotes doubled)
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified name part by part
pub fn quote_qualified(name: &str) -> String {
    name.split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

/// Longest identifier PostgreSQL keeps without truncating (NAMEDATALEN - 1)
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Name given to an index created for `(table, column)`.
///
/// Names longer than [`MAX_IDENTIFIER_LEN`] bytes are cut and suffixed with a
/// CRC32 of the full name, so distinct pairs keep distinct names.
pub fn generate_index_name(table: &str, column: &str) -> String {
    let name = format!("idx_{}_{}", table.replace('.', "_"), column);
    if name.len() <= MAX_IDENTIFIER_LEN {
        return name;
    }

    let checksum = crc32fast::hash(name.as_bytes());
    let mut cut = MAX_IDENTIFIER_LEN - 9;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}_{:08x}", &name[..cut], checksum)
}

/// One index action issued by the decision engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlStatement {
    DropIndex { schema: String, index_name: String },
    CreateIndex { table: String, column: String },
}

impl DdlStatement {
    pub fn to_sql(&self) -> String {
        match self {
            DdlStatement::DropIndex { schema, index_name } => format!(
                "DROP INDEX IF EXISTS {}.{}",
                quote_identifier(schema),
                quote_identifier(index_name)
            ),
            DdlStatement::CreateIndex { table, column } => format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                quote_identifier(&generate_index_name(table, column)),
                quote_qualified(table),
                quote_identifier(column)
            ),
        }
    }

    /// Index name for drops, `table.column` for creates
    pub fn target(&self) -> String {
        match self {
            DdlStatement::DropIndex { index_name, .. } => index_name.clone(),
            DdlStatement::CreateIndex { table, column } => format!("{}.{}", table, column),
        }
    }
}

impl fmt::Display for DdlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Applies index actions. Each call stands alone; nothing is retried.
#[async_trait]
pub trait DdlExecutor: Send + Sync {
    async fn drop_index(&self, schema: &str, index_name: &str) -> Result<()>;
    async fn create_index(&self, table: &str, column: &str) -> Result<()>;
}

// ============================================================================
// Recording executor
// ============================================================================

/// Records the DDL it is asked to run without touching a database.
///
/// Used for dry runs and tests; targets registered with
/// [`fail_on`](Self::fail_on) report an execution error.
#[derive(Debug, Default)]
pub struct RecordingDdlExecutor {
    statements: Mutex<Vec<DdlStatement>>,
    failing: HashSet<String>,
}

impl RecordingDdlExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail statements whose target is `target` (an index name, or `table.column`)
    pub fn fail_on(mut self, target: impl Into<String>) -> Self {
        self.failing.insert(target.into());
        self
    }

    /// Successfully applied statements, in order
    pub fn statements(&self) -> Vec<DdlStatement> {
        self.statements.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn apply(&self, statement: DdlStatement) -> Result<()> {
        if self.failing.contains(&statement.target()) {
            return Err(AutoIndexError::SqlExecutionError(
                statement.to_sql(),
                "rejected by recording executor".to_string(),
            ));
        }

        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(statement);
        Ok(())
    }
}

#[async_trait]
impl DdlExecutor for RecordingDdlExecutor {
    async fn drop_index(&self, schema: &str, index_name: &str) -> Result<()> {
        self.apply(DdlStatement::DropIndex {
            schema: schema.to_string(),
            index_name: index_name.to_string(),
        })
    }

    async fn create_index(&self, table: &str, column: &str) -> Result<()> {
        self.apply(DdlStatement::CreateIndex {
            table: table.to_string(),
            column: column.to_string(),
        })
    }
}

// ============================================================================
// PostgreSQL executor
// ============================================================================

/// Runs index DDL against a PostgreSQL pool
#[cfg(feature = "postgres")]
pub struct PgDdlExecutor {
    pool: PgPool,
}

#[cfg(feature = "postgres")]
impl PgDdlExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn execute(&self, statement: DdlStatement) -> Result<()> {
        let sql = statement.to_sql();
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| AutoIndexError::SqlExecutionError(sql.clone(), e.to_string()))?;
        Ok(())
    }
}

#[cfg(feature = "postgres")]
#[async_trait]
impl DdlExecutor for PgDdlExecutor {
    async fn drop_index(&self, schema: &str, index_name: &str) -> Result<()> {
        self.execute(DdlStatement::DropIndex {
            schema: schema.to_string(),
            index_name: index_name.to_string(),
        })
        .await
    }

    async fn create_index(&self, table: &str, column: &str) -> Result<()> {
        self.execute(DdlStatement::CreateIndex {
            table: table.to_string(),
            column: column.to_string(),
        })
        .await
    }
}
