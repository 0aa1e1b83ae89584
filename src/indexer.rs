//! Auto indexer - the command surface
//!
//! Wires the session, the extractor, the stores and the decision engine
//! together and exposes the three host commands: report ready, begin an audit
//! for N seconds, and end the audit now.

use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::AutoIndexConfig;
use crate::ddl::DdlExecutor;
use crate::engine::{DecisionReport, IndexDecisionEngine};
use crate::error::Result;
use crate::extractor::StatementFeatureExtractor;
use crate::hook::{AuditHook, StatementHook};
use crate::scheduler::Scheduler;
use crate::session::AuditSession;
use crate::stats::IndexStatsSource;
use crate::store::ObservationSink;

#[cfg(feature = "postgres")]
use sqlx::PgPool;

/// How an audit came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEnd {
    Explicit,
    Scheduled,
}

struct Inner {
    config: AutoIndexConfig,
    session: AuditSession,
    sink: Arc<dyn ObservationSink>,
    engine: IndexDecisionEngine,
    scheduler: Arc<dyn Scheduler>,
}

/// Cheap cloneable handle to one auto indexing setup
#[derive(Clone)]
pub struct AutoIndexer {
    inner: Arc<Inner>,
}

impl AutoIndexer {
    pub fn new(
        config: AutoIndexConfig,
        sink: Arc<dyn ObservationSink>,
        stats: Arc<dyn IndexStatsSource>,
        ddl: Arc<dyn DdlExecutor>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self> {
        config.validate()?;

        let engine = IndexDecisionEngine::new(sink.clone(), stats, ddl, config.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                session: AuditSession::new(),
                sink,
                engine,
                scheduler,
            }),
        })
    }

    /// Build an indexer backed by PostgreSQL, creating the log table if needed
    #[cfg(feature = "postgres")]
    pub async fn connect_postgres(pool: PgPool, config: AutoIndexConfig) -> Result<Self> {
        use crate::ddl::PgDdlExecutor;
        use crate::scheduler::TokioScheduler;
        use crate::stats::PgIndexStats;
        use crate::store::PgObservationStore;

        config.validate()?;

        let store = PgObservationStore::new(pool.clone(), config.log_table.clone());
        store.initialize().await?;

        let stats = PgIndexStats::new(pool.clone(), config.schema.clone());
        Self::new(
            config,
            Arc::new(store),
            Arc::new(stats),
            Arc::new(PgDdlExecutor::new(pool)),
            Arc::new(TokioScheduler::new()),
        )
    }

    pub fn config(&self) -> &AutoIndexConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &AuditSession {
        &self.inner.session
    }

    pub fn is_recording(&self) -> bool {
        self.inner.session.is_recording()
    }

    pub fn extractor(&self) -> StatementFeatureExtractor {
        StatementFeatureExtractor::new(self.inner.session.clone())
    }

    /// Statement hook that records observations and then calls `next`
    pub fn hook<H: StatementHook>(&self, next: H) -> AuditHook<H> {
        AuditHook::new(
            self.extractor(),
            self.inner.sink.clone(),
            self.inner.config.log_table.clone(),
            next,
        )
    }

    pub fn report_ready(&self) {
        info!(log_table = %self.inner.config.log_table, "auto indexing is ready to be used");
    }

    /// Start recording and schedule the audit end after `seconds`.
    ///
    /// Zero uses the configured default duration. Calling this while an audit
    /// is running re-arms the end trigger. If the end trigger cannot be
    /// scheduled the session is left unchanged and a warning is logged.
    pub fn begin_audit(&self, seconds: u64) {
        let duration = if seconds == 0 {
            self.inner.config.default_audit_duration
        } else {
            Duration::from_secs(seconds)
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let scheduled = self.inner.scheduler.schedule_once(
            duration,
            Box::pin(async move {
                if let Some(inner) = weak.upgrade() {
                    AutoIndexer { inner }.finish_audit(AuditEnd::Scheduled).await;
                }
            }),
        );

        let trigger = match scheduled {
            Ok(trigger) => trigger,
            Err(e) => {
                warn!(error = %e, "failed to schedule audit end, audit not started");
                return;
            }
        };

        if let Some(previous) = self.inner.session.start(Some(trigger)) {
            self.inner.scheduler.cancel(previous);
        }

        info!(seconds = duration.as_secs(), "audit started");
    }

    /// Stop recording now and run the index decisions
    pub async fn end_audit(&self) -> DecisionReport {
        self.finish_audit(AuditEnd::Explicit).await
    }

    async fn finish_audit(&self, reason: AuditEnd) -> DecisionReport {
        let was_recording = self.inner.session.is_recording();

        // Cancel before the phases run so the trigger cannot start a second run
        if let Some(trigger) = self.inner.session.stop() {
            self.inner.scheduler.cancel(trigger);
        }

        if !was_recording {
            info!(?reason, "no audit was running, deciding on stored observations");
        }

        let report = self.inner.engine.run().await;

        info!(
            ?reason,
            dropped = report.dropped.len(),
            created = report.created.len(),
            skipped = report.skipped.len(),
            failures = report.failures.len(),
            "audit ended"
        );

        report
    }
}
