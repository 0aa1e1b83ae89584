//! Audit statements against a live PostgreSQL database.
//!
//! DATABASE_URL=postgres://postgres:@127.0.0.1/test-auto-index \
//!     cargo run --example postgres_audit

use sqlx::postgres::PgPoolOptions;
use sqlx_auto_index::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let url = std::env::var("DATABASE_URL")
        .map_err(|_| AutoIndexError::InvalidConfig("DATABASE_URL is not set".to_string()))?;
    let pool = PgPoolOptions::new().max_connections(5).connect(&url).await?;

    let indexer = AutoIndexer::connect_postgres(pool.clone(), AutoIndexConfig::from_env()?).await?;
    let hook = indexer.hook(NoopHook);

    indexer.report_ready();
    indexer.begin_audit(30);

    sqlx::query("CREATE TABLE IF NOT EXISTS demo_orders (id SERIAL PRIMARY KEY, status TEXT)")
        .execute(&pool)
        .await?;

    let statements = [
        "SELECT * FROM demo_orders WHERE status = 'open'",
        "SELECT * FROM demo_orders WHERE status = 'open' ORDER BY id",
    ];
    for statement in statements {
        hook.before_execute(statement, CommandKind::Select).await;
        sqlx::query(statement).execute(&pool).await?;
    }

    let report = indexer.end_audit().await;
    println!("{}", report.summary());

    Ok(())
}
