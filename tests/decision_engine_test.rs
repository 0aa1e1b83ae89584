//! Decision engine behavior against in-memory collaborators

use async_trait::async_trait;
use std::sync::Arc;

use sqlx_auto_index::ddl::DdlStatement;
use sqlx_auto_index::*;

fn stat(index_name: &str, is_unique: bool, index_scans: i64, sequential_scans: i64) -> IndexUsageStat {
    IndexUsageStat {
        schema: "public".to_string(),
        table: "orders".to_string(),
        index_name: index_name.to_string(),
        is_unique,
        index_scans,
        sequential_scans,
    }
}

async fn append_many(store: &MemoryObservationStore, table: &str, clause: ClauseKind, column: &str, n: usize) {
    for _ in 0..n {
        let obs = if clause == ClauseKind::None {
            Observation::table_touch(QueryType::Select, table)
        } else {
            Observation::new(QueryType::Select, table, clause, column)
        };
        store.append(&obs).await.unwrap();
    }
}

fn engine(
    store: &Arc<MemoryObservationStore>,
    stats: Vec<IndexUsageStat>,
    ddl: &Arc<RecordingDdlExecutor>,
) -> IndexDecisionEngine {
    IndexDecisionEngine::new(
        store.clone(),
        Arc::new(StaticIndexStats::new(stats)),
        ddl.clone(),
        AutoIndexConfig::default(),
    )
}

#[tokio::test]
async fn test_frequent_column_gets_an_index() {
    let store = Arc::new(MemoryObservationStore::new());
    append_many(&store, "orders", ClauseKind::Where, "status", 5).await;
    append_many(&store, "orders", ClauseKind::None, "", 5).await;

    let ddl = Arc::new(RecordingDdlExecutor::new());
    let report = engine(&store, vec![], &ddl).run().await;

    assert_eq!(report.created.len(), 1);
    let candidate = &report.created[0];
    assert_eq!(candidate.weighted_score, 2.5);
    assert_eq!(candidate.table_total_observations, 10);
    assert_eq!(candidate.final_score, 25.0);
    assert_eq!(candidate.frequency_count, 5);

    assert_eq!(
        ddl.statements(),
        vec![DdlStatement::CreateIndex {
            table: "orders".to_string(),
            column: "status".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_rare_column_is_skipped() {
    let store = Arc::new(MemoryObservationStore::new());
    append_many(&store, "orders", ClauseKind::Where, "status", 1).await;
    append_many(&store, "orders", ClauseKind::None, "", 9).await;

    let ddl = Arc::new(RecordingDdlExecutor::new());
    let report = engine(&store, vec![], &ddl).run().await;

    assert!(report.created.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].weighted_score, 0.5);
    assert!((report.skipped[0].final_score - 5.0).abs() < 1e-9);
    assert!(ddl.statements().is_empty());
}

#[tokio::test]
async fn test_candidates_are_visited_by_weighted_score() {
    let store = Arc::new(MemoryObservationStore::new());
    append_many(&store, "orders", ClauseKind::OrderBy, "created_at", 2).await;
    append_many(&store, "orders", ClauseKind::Where, "status", 3).await;
    append_many(&store, "orders", ClauseKind::GroupBy, "region", 2).await;

    let ddl = Arc::new(RecordingDdlExecutor::new());
    let engine = IndexDecisionEngine::new(
        store.clone(),
        Arc::new(StaticIndexStats::default()),
        ddl.clone(),
        AutoIndexConfig::default().with_create_threshold(0.0),
    );
    let report = engine.run().await;

    let order: Vec<&str> = report.created.iter().map(|c| c.column_name.as_str()).collect();
    assert_eq!(order, vec!["status", "region", "created_at"]);
}

#[tokio::test]
async fn test_prune_drops_only_rarely_used_non_unique_indexes() {
    let store = Arc::new(MemoryObservationStore::new());
    let ddl = Arc::new(RecordingDdlExecutor::new());
    let stats = vec![
        stat("idx_orders_note", false, 1, 99),
        stat("orders_pkey", true, 0, 500),
        stat("idx_orders_status", false, 40, 60),
        stat("idx_orders_new", false, 0, 0),
    ];

    let report = engine(&store, stats, &ddl).run().await;

    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].index_name, "idx_orders_note");
    assert_eq!(
        ddl.statements(),
        vec![DdlStatement::DropIndex {
            schema: "public".to_string(),
            index_name: "idx_orders_note".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_failures_do_not_abort_remaining_actions() {
    let store = Arc::new(MemoryObservationStore::new());
    append_many(&store, "orders", ClauseKind::Where, "status", 4).await;
    append_many(&store, "orders", ClauseKind::Where, "region", 2).await;

    let ddl = Arc::new(
        RecordingDdlExecutor::new()
            .fail_on("idx_orders_a")
            .fail_on("orders.status"),
    );
    let stats = vec![stat("idx_orders_a", false, 0, 10), stat("idx_orders_b", false, 0, 10)];

    let report = engine(&store, stats, &ddl).run().await;

    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].index_name, "idx_orders_b");
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].column_name, "region");
    assert!(report.observations_cleared);
    assert!(store.is_empty());
}

struct FailingStats;

#[async_trait]
impl IndexStatsSource for FailingStats {
    async fn index_usage(&self) -> Result<Vec<IndexUsageStat>> {
        Err(AutoIndexError::DatabaseError("statistics unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_prune_failure_does_not_prevent_create_phase() {
    let store = Arc::new(MemoryObservationStore::new());
    append_many(&store, "orders", ClauseKind::Where, "status", 3).await;

    let ddl = Arc::new(RecordingDdlExecutor::new());
    let engine = IndexDecisionEngine::new(
        store.clone(),
        Arc::new(FailingStats),
        ddl.clone(),
        AutoIndexConfig::default(),
    );

    let report = engine.run().await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.created.len(), 1);
}

/// Store whose per-table counts come back as zero
struct ZeroTotalStore {
    inner: MemoryObservationStore,
}

#[async_trait]
impl ObservationSink for ZeroTotalStore {
    async fn append(&self, observation: &Observation) -> Result<()> {
        self.inner.append(observation).await
    }

    async fn grouped_totals(&self) -> Result<Vec<ClauseCounts>> {
        self.inner.grouped_totals().await
    }

    async fn table_total(&self, _table_name: &str) -> Result<i64> {
        Ok(0)
    }

    async fn clear_all(&self) -> Result<()> {
        self.inner.clear_all().await
    }
}

#[tokio::test]
async fn test_zero_table_total_scores_zero() {
    let store = Arc::new(ZeroTotalStore {
        inner: MemoryObservationStore::new(),
    });
    store
        .append(&Observation::new(QueryType::Select, "orders", ClauseKind::Where, "status"))
        .await
        .unwrap();

    let ddl = Arc::new(RecordingDdlExecutor::new());
    let engine = IndexDecisionEngine::new(
        store.clone(),
        Arc::new(StaticIndexStats::default()),
        ddl.clone(),
        AutoIndexConfig::default(),
    );

    let report = engine.run().await;

    assert!(report.failures.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].final_score, 0.0);
    assert!(ddl.statements().is_empty());
}

#[tokio::test]
async fn test_second_run_creates_nothing() {
    let store = Arc::new(MemoryObservationStore::new());
    append_many(&store, "orders", ClauseKind::Where, "status", 5).await;

    let ddl = Arc::new(RecordingDdlExecutor::new());
    let stats = vec![stat("idx_orders_note", false, 1, 99)];
    let engine = engine(&store, stats, &ddl);

    let first = engine.run().await;
    assert_eq!(first.created.len(), 1);
    assert_eq!(first.dropped.len(), 1);

    // Drops depend only on the live statistics and may repeat
    let second = engine.run().await;
    assert!(second.created.is_empty());
    assert!(second.skipped.is_empty());
    assert_eq!(second.dropped.len(), 1);
}

#[tokio::test]
async fn test_custom_threshold() {
    let store = Arc::new(MemoryObservationStore::new());
    append_many(&store, "orders", ClauseKind::Where, "status", 1).await;
    append_many(&store, "orders", ClauseKind::None, "", 9).await;

    let ddl = Arc::new(RecordingDdlExecutor::new());
    let engine = IndexDecisionEngine::new(
        store.clone(),
        Arc::new(StaticIndexStats::default()),
        ddl.clone(),
        AutoIndexConfig::default().with_create_threshold(4.0),
    );

    let report = engine.run().await;
    assert_eq!(report.created.len(), 1);
}

/// Store that fails the per-table count for one table and, optionally, the clear
struct FlakyStore {
    inner: MemoryObservationStore,
    broken_table: &'static str,
    fail_clear: bool,
}

#[async_trait]
impl ObservationSink for FlakyStore {
    async fn append(&self, observation: &Observation) -> Result<()> {
        self.inner.append(observation).await
    }

    async fn grouped_totals(&self) -> Result<Vec<ClauseCounts>> {
        self.inner.grouped_totals().await
    }

    async fn table_total(&self, table_name: &str) -> Result<i64> {
        if table_name == self.broken_table {
            return Err(AutoIndexError::DatabaseError("statement timeout".to_string()));
        }
        self.inner.table_total(table_name).await
    }

    async fn clear_all(&self) -> Result<()> {
        if self.fail_clear {
            return Err(AutoIndexError::DatabaseError("permission denied".to_string()));
        }
        self.inner.clear_all().await
    }
}

fn flaky_engine(store: &Arc<FlakyStore>, ddl: &Arc<RecordingDdlExecutor>) -> IndexDecisionEngine {
    IndexDecisionEngine::new(
        store.clone(),
        Arc::new(StaticIndexStats::default()),
        ddl.clone(),
        AutoIndexConfig::default(),
    )
}

#[tokio::test]
async fn test_table_total_failure_skips_only_that_group() {
    let store = Arc::new(FlakyStore {
        inner: MemoryObservationStore::new(),
        broken_table: "audit",
        fail_clear: false,
    });
    // audit.actor outranks orders.status, so it is visited first
    append_many(&store.inner, "audit", ClauseKind::Where, "actor", 6).await;
    append_many(&store.inner, "orders", ClauseKind::Where, "status", 3).await;

    let ddl = Arc::new(RecordingDdlExecutor::new());
    let report = flaky_engine(&store, &ddl).run().await;

    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].action.contains("audit"));
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].table_name, "orders");
    assert_eq!(
        ddl.statements(),
        vec![DdlStatement::CreateIndex {
            table: "orders".to_string(),
            column: "status".to_string(),
        }]
    );
    assert!(report.observations_cleared);
}

#[tokio::test]
async fn test_failed_clear_is_reported() {
    let store = Arc::new(FlakyStore {
        inner: MemoryObservationStore::new(),
        broken_table: "",
        fail_clear: true,
    });
    append_many(&store.inner, "orders", ClauseKind::Where, "status", 3).await;

    let ddl = Arc::new(RecordingDdlExecutor::new());
    let report = flaky_engine(&store, &ddl).run().await;

    assert_eq!(report.created.len(), 1);
    assert!(!report.observations_cleared);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].action, "clear observations");
    assert_eq!(store.inner.len(), 3);
}
