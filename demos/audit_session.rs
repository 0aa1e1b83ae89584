//! Run an audit over a small workload without a database.
//!
//! cargo run --example audit_session
//! RUST_LOG=sqlx_auto_index=debug cargo run --example audit_session

use std::sync::Arc;

use sqlx_auto_index::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let stats = vec![IndexUsageStat {
        schema: "public".to_string(),
        table: "orders".to_string(),
        index_name: "idx_orders_legacy_flag".to_string(),
        is_unique: false,
        index_scans: 3,
        sequential_scans: 480,
    }];

    let ddl = Arc::new(RecordingDdlExecutor::new());
    let indexer = AutoIndexer::new(
        AutoIndexConfig::from_env()?,
        Arc::new(MemoryObservationStore::new()),
        Arc::new(StaticIndexStats::new(stats)),
        ddl.clone(),
        Arc::new(TokioScheduler::new()),
    )?;
    let hook = indexer.hook(NoopHook);

    indexer.report_ready();
    indexer.begin_audit(60);

    let workload = [
        ("SELECT * FROM orders WHERE customer_id = 42 AND status = 'open'", CommandKind::Select),
        ("SELECT * FROM orders WHERE customer_id = 7 ORDER BY created_at DESC", CommandKind::Select),
        ("SELECT status, COUNT(*) FROM orders GROUP BY status", CommandKind::Select),
        ("UPDATE orders SET status = 'shipped' WHERE customer_id = 42", CommandKind::Update),
        ("INSERT INTO orders (customer_id, status) VALUES (9, 'open')", CommandKind::Insert),
        ("DELETE FROM carts", CommandKind::Delete),
    ];
    for (statement, kind) in workload {
        hook.before_execute(statement, kind).await;
    }

    let report = indexer.end_audit().await;
    println!("{}", report.summary());

    println!("Dry-run DDL:");
    for statement in ddl.statements() {
        println!("  {};", statement);
    }

    Ok(())
}
