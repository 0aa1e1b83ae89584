//! Statement feature extraction
//!
//! Turns one statement into the ordered list of observations it contributes to
//! the current audit.

use tracing::{debug, warn};

use crate::classifier::classify;
use crate::observation::{ClauseKind, CommandKind, Observation};
use crate::session::AuditSession;
use crate::store::ObservationSink;
use crate::tokenizer::tokenize;

/// Clause keywords scanned for, in emission order
const SCANNED_CLAUSES: [ClauseKind; 3] = [ClauseKind::Where, ClauseKind::OrderBy, ClauseKind::GroupBy];

/// Extract observations from `statement` regardless of audit state.
///
/// Only the first occurrence of each clause keyword is used. A recognized
/// statement without any clause yields one table-touch observation.
pub fn extract_features(statement: &str, kind: CommandKind) -> Vec<Observation> {
    let classification = match classify(statement, kind) {
        Some(c) => c,
        None => return Vec::new(),
    };

    let query_type = classification.query_type;
    let table_name = classification.table_name;
    let mut observations = Vec::new();
    let mut clause_found = false;

    for clause in SCANNED_CLAUSES {
        let keyword = match clause.keyword() {
            Some(k) => k,
            None => continue,
        };

        if let Some(pos) = statement.find(keyword) {
            clause_found = true;
            let fragment = &statement[pos + keyword.len()..];
            for column in tokenize(fragment, clause) {
                observations.push(Observation::new(query_type, table_name, clause, column));
            }
        }
    }

    if !clause_found {
        observations.push(Observation::table_touch(query_type, table_name));
    }

    observations
}

/// Extractor gated by an [`AuditSession`]
#[derive(Debug, Clone)]
pub struct StatementFeatureExtractor {
    session: AuditSession,
}

impl StatementFeatureExtractor {
    pub fn new(session: AuditSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &AuditSession {
        &self.session
    }

    /// Observations for `statement`, empty while the session is idle
    pub fn extract(&self, statement: &str, kind: CommandKind) -> Vec<Observation> {
        if !self.session.is_recording() {
            return Vec::new();
        }

        extract_features(statement, kind)
    }

    /// Extract and append each observation to `sink`, one write per observation.
    ///
    /// Failed appends are logged and skipped. Returns the number stored.
    pub async fn record(&self, statement: &str, kind: CommandKind, sink: &dyn ObservationSink) -> usize {
        let observations = self.extract(statement, kind);
        if observations.is_empty() {
            debug!(?kind, "statement produced no observations");
            return 0;
        }

        let mut stored = 0;
        for observation in &observations {
            match sink.append(observation).await {
                Ok(()) => stored += 1,
                Err(e) => warn!(
                    table = %observation.table_name,
                    column = %observation.column_name,
                    error = %e,
                    "failed to store observation"
                ),
            }
        }

        stored
    }
}
