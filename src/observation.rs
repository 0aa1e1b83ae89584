//! Observation data model.
//!
//! An [`Observation`] is one `(table, clause kind, column)` fact derived from an
//! executed statement. The string spellings returned by `as_str` are the values
//! stored in the observation log table and must not change.

use chrono::{DateTime, Utc};
use std::fmt;

/// Column value recorded for statements without a recognized clause
pub const NO_COLUMN: &str = "NONE";

/// Command kind reported by the host for a statement about to execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Utility statements, DDL and anything else the host runs
    Other,
}

/// Statement kinds that produce observations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
}

impl QueryType {
    /// Map a host command kind onto an observed query type
    pub fn from_command(kind: CommandKind) -> Option<Self> {
        match kind {
            CommandKind::Select => Some(QueryType::Select),
            CommandKind::Insert => Some(QueryType::Insert),
            CommandKind::Update => Some(QueryType::Update),
            CommandKind::Delete => Some(QueryType::Delete),
            CommandKind::Other => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Select => "SELECT",
            QueryType::Insert => "INSERT",
            QueryType::Update => "UPDATE",
            QueryType::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SELECT" => Some(QueryType::Select),
            "INSERT" => Some(QueryType::Insert),
            "UPDATE" => Some(QueryType::Update),
            "DELETE" => Some(QueryType::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Part of a statement a column reference came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    /// Statement touched the table without a WHERE, GROUP BY or ORDER BY clause
    None,
    Where,
    GroupBy,
    OrderBy,
}

impl ClauseKind {
    /// Keyword that introduces the clause in statement text
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            ClauseKind::None => None,
            ClauseKind::Where => Some("WHERE"),
            ClauseKind::GroupBy => Some("GROUP BY"),
            ClauseKind::OrderBy => Some("ORDER BY"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClauseKind::None => "NONE",
            ClauseKind::Where => "WHERE",
            ClauseKind::GroupBy => "GROUP BY",
            ClauseKind::OrderBy => "ORDER BY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NONE" => Some(ClauseKind::None),
            "WHERE" => Some(ClauseKind::Where),
            "GROUP BY" => Some(ClauseKind::GroupBy),
            "ORDER BY" => Some(ClauseKind::OrderBy),
            _ => None,
        }
    }
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded fact about an executed statement
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub query_type: QueryType,
    pub table_name: String,
    pub clause_kind: ClauseKind,
    pub column_name: String,
    pub timestamp: DateTime<Utc>,
}

impl Observation {
    /// Create an observation stamped with the current time
    pub fn new(
        query_type: QueryType,
        table_name: impl Into<String>,
        clause_kind: ClauseKind,
        column_name: impl Into<String>,
    ) -> Self {
        Self {
            query_type,
            table_name: table_name.into(),
            clause_kind,
            column_name: column_name.into(),
            timestamp: Utc::now(),
        }
    }

    /// Observation recording that a statement touched `table_name` without clauses
    pub fn table_touch(query_type: QueryType, table_name: impl Into<String>) -> Self {
        Self::new(query_type, table_name, ClauseKind::None, NO_COLUMN)
    }

    /// Whether this observation carries a column reference
    pub fn has_column(&self) -> bool {
        self.clause_kind != ClauseKind::None
    }
}

/// Per-clause reference counts for one `(table, column)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClauseCounts {
    pub table_name: String,
    pub column_name: String,
    pub where_count: i64,
    pub group_by_count: i64,
    pub order_by_count: i64,
}

impl ClauseCounts {
    pub fn new(table_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            where_count: 0,
            group_by_count: 0,
            order_by_count: 0,
        }
    }

    /// Count one more reference from `clause`; clause-less rows are ignored
    pub fn add(&mut self, clause: ClauseKind) {
        match clause {
            ClauseKind::Where => self.where_count += 1,
            ClauseKind::GroupBy => self.group_by_count += 1,
            ClauseKind::OrderBy => self.order_by_count += 1,
            ClauseKind::None => {}
        }
    }

    /// Total number of references across all clauses
    pub fn frequency(&self) -> i64 {
        self.where_count + self.group_by_count + self.order_by_count
    }
}
