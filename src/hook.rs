//! Statement execution hooks.
//!
//! The host calls a [`StatementHook`] before every statement runs. Hooks are
//! composed by wrapping: [`AuditHook`] records observations and then calls the
//! hook it wraps, so a host can chain it in front of its existing handler.

use async_trait::async_trait;
use std::sync::Arc;

use crate::extractor::StatementFeatureExtractor;
use crate::observation::CommandKind;
use crate::store::ObservationSink;

#[async_trait]
pub trait StatementHook: Send + Sync {
    async fn before_execute(&self, statement: &str, kind: CommandKind);
}

/// End of a hook chain
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHook;

#[async_trait]
impl StatementHook for NoopHook {
    async fn before_execute(&self, _statement: &str, _kind: CommandKind) {}
}

/// Records observations for each statement, then calls the wrapped hook.
///
/// Statements that mention the observation log table are not observed, so the
/// store's own writes never feed back into the audit.
pub struct AuditHook<H> {
    extractor: StatementFeatureExtractor,
    sink: Arc<dyn ObservationSink>,
    log_table: String,
    next: H,
}

impl<H: StatementHook> AuditHook<H> {
    pub fn new(
        extractor: StatementFeatureExtractor,
        sink: Arc<dyn ObservationSink>,
        log_table: impl Into<String>,
        next: H,
    ) -> Self {
        Self {
            extractor,
            sink,
            log_table: log_table.into(),
            next,
        }
    }

    /// Whether `statement` targets the observation log itself
    pub fn is_own_write(&self, statement: &str) -> bool {
        statement.contains(&self.log_table)
    }
}

#[async_trait]
impl<H: StatementHook> StatementHook for AuditHook<H> {
    async fn before_execute(&self, statement: &str, kind: CommandKind) {
        if !self.is_own_write(statement) {
            self.extractor.record(statement, kind, self.sink.as_ref()).await;
        }

        self.next.before_execute(statement, kind).await;
    }
}
