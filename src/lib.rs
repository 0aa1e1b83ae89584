//! Automatic index maintenance for PostgreSQL.
//!
//! While an audit is running, every statement the host executes is scanned for
//! the table it touches and the columns referenced in its `WHERE`, `GROUP BY`
//! and `ORDER BY` clauses. When the audit ends, rarely used non-unique indexes
//! are dropped and indexes are created for frequently referenced columns.
//!
//! # Example
//!
//! ```ignore
//! use sqlx_auto_index::{AutoIndexConfig, AutoIndexer, CommandKind, NoopHook, StatementHook};
//!
//! let indexer = AutoIndexer::connect_postgres(pool, AutoIndexConfig::from_env()?).await?;
//! let hook = indexer.hook(NoopHook);
//!
//! indexer.report_ready();
//! indexer.begin_audit(3600);
//!
//! // For every statement, before it runs
//! hook.before_execute("SELECT * FROM orders WHERE status = 'open'", CommandKind::Select).await;
//!
//! let report = indexer.end_audit().await;
//! println!("{}", report.summary());
//! ```

pub mod classifier;
pub mod config;
pub mod ddl;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod hook;
pub mod indexer;
pub mod observation;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod store;
pub mod tokenizer;

pub use classifier::{classify, clean_table_name, Classification};
pub use config::{AutoIndexConfig, ClauseWeights};
pub use ddl::{DdlExecutor, DdlStatement, RecordingDdlExecutor};
pub use engine::{DecisionReport, IndexDecisionEngine, ScoredCandidate};
pub use error::{AutoIndexError, Result};
pub use extractor::{extract_features, StatementFeatureExtractor};
pub use hook::{AuditHook, NoopHook, StatementHook};
pub use indexer::{AuditEnd, AutoIndexer};
pub use observation::{ClauseCounts, ClauseKind, CommandKind, Observation, QueryType};
pub use scheduler::{ScheduleId, Scheduler, TokioScheduler};
pub use session::{AuditSession, AuditState};
pub use stats::{IndexStatsSource, IndexUsageStat, StaticIndexStats};
pub use store::{MemoryObservationStore, ObservationSink};
pub use tokenizer::{tokenize, ClauseTokens};

#[cfg(feature = "postgres")]
pub use ddl::PgDdlExecutor;

#[cfg(feature = "postgres")]
pub use stats::PgIndexStats;

#[cfg(feature = "postgres")]
pub use store::PgObservationStore;
