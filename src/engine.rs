//! Index decision engine
//!
//! Runs at the end of an audit in two independent phases:
//!
//! 1. **Prune** - drop every non-unique index whose usage ratio
//!    `index_scans / (index_scans + sequential_scans)` is below the prune
//!    threshold. Indexes on tables that were never scanned are kept.
//! 2. **Create** - score each observed `(table, column)` pair as
//!    `weighted / table_total * 100` and create an index when the score reaches
//!    the create threshold. Pairs are visited by weighted score, highest first.
//!
//! Every action stands alone: a failed drop or create is logged and recorded in
//! the [`DecisionReport`], and the run moves on. Afterwards all observations are
//! cleared.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AutoIndexConfig;
use crate::ddl::{DdlExecutor, DdlStatement};
use crate::observation::ClauseCounts;
use crate::stats::{IndexStatsSource, IndexUsageStat};
use crate::store::ObservationSink;

/// Create-phase score of one `(table, column)` pair
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub table_name: String,
    pub column_name: String,
    pub frequency_count: i64,
    pub weighted_score: f64,
    pub table_total_observations: i64,
    pub final_score: f64,
}

/// Weighted score normalized by the table's observation count, in percent.
///
/// A table without observations scores 0.
pub fn final_score(weighted_score: f64, table_total_observations: i64) -> f64 {
    if table_total_observations <= 0 {
        0.0
    } else {
        weighted_score / table_total_observations as f64 * 100.0
    }
}

/// Whether `stat` should be dropped under `prune_threshold`
pub fn should_drop(stat: &IndexUsageStat, prune_threshold: f64) -> bool {
    if stat.is_unique {
        return false;
    }
    matches!(stat.usage_ratio(), Some(ratio) if ratio < prune_threshold)
}

/// An action or read that failed during a run
#[derive(Debug, Clone, PartialEq)]
pub struct ActionFailure {
    /// What was attempted, e.g. the DDL or the store read
    pub action: String,
    pub error: String,
}

/// Outcome of one decision run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionReport {
    pub dropped: Vec<IndexUsageStat>,
    pub created: Vec<ScoredCandidate>,
    /// Candidates scored below the create threshold
    pub skipped: Vec<ScoredCandidate>,
    pub failures: Vec<ActionFailure>,
    pub observations_cleared: bool,
}

impl DecisionReport {
    pub fn has_changes(&self) -> bool {
        !self.dropped.is_empty() || !self.created.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str("Index Decisions:\n");

        if !self.dropped.is_empty() {
            summary.push_str(&format!("  - Indexes dropped: {}\n", self.dropped.len()));
            for stat in &self.dropped {
                summary.push_str(&format!("    • {}.{} on {}\n", stat.schema, stat.index_name, stat.table));
            }
        }

        if !self.created.is_empty() {
            summary.push_str(&format!("  - Indexes created: {}\n", self.created.len()));
            for c in &self.created {
                summary.push_str(&format!(
                    "    • {} ({}) score {:.2}\n",
                    c.table_name, c.column_name, c.final_score
                ));
            }
        }

        if !self.skipped.is_empty() {
            summary.push_str(&format!("  - Candidates below threshold: {}\n", self.skipped.len()));
        }

        if !self.failures.is_empty() {
            summary.push_str(&format!("  - Failures: {}\n", self.failures.len()));
            for f in &self.failures {
                summary.push_str(&format!("    • {}: {}\n", f.action, f.error));
            }
        }

        summary
    }

    fn fail(&mut self, action: impl Into<String>, error: impl ToString) {
        self.failures.push(ActionFailure {
            action: action.into(),
            error: error.to_string(),
        });
    }
}

pub struct IndexDecisionEngine {
    sink: Arc<dyn ObservationSink>,
    stats: Arc<dyn IndexStatsSource>,
    ddl: Arc<dyn DdlExecutor>,
    config: AutoIndexConfig,
}

impl IndexDecisionEngine {
    pub fn new(
        sink: Arc<dyn ObservationSink>,
        stats: Arc<dyn IndexStatsSource>,
        ddl: Arc<dyn DdlExecutor>,
        config: AutoIndexConfig,
    ) -> Self {
        Self {
            sink,
            stats,
            ddl,
            config,
        }
    }

    /// Prune, create, then clear every observation
    pub async fn run(&self) -> DecisionReport {
        let mut report = DecisionReport::default();

        self.prune(&mut report).await;
        self.create(&mut report).await;

        match self.sink.clear_all().await {
            Ok(()) => report.observations_cleared = true,
            Err(e) => {
                warn!(error = %e, "failed to clear observations");
                report.fail("clear observations", e);
            }
        }

        report
    }

    /// Phase 1: drop rarely used non-unique indexes
    pub async fn prune(&self, report: &mut DecisionReport) {
        let stats = match self.stats.index_usage().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "failed to read index usage statistics");
                report.fail("read index usage", e);
                return;
            }
        };

        for stat in stats {
            if !should_drop(&stat, self.config.prune_threshold) {
                continue;
            }

            match self.ddl.drop_index(&stat.schema, &stat.index_name).await {
                Ok(()) => {
                    info!(
                        index = %stat.index_name,
                        table = %stat.table,
                        index_scans = stat.index_scans,
                        sequential_scans = stat.sequential_scans,
                        "dropped rarely used index"
                    );
                    report.dropped.push(stat);
                }
                Err(e) => {
                    warn!(index = %stat.index_name, error = %e, "failed to drop index");
                    let statement = DdlStatement::DropIndex {
                        schema: stat.schema.clone(),
                        index_name: stat.index_name.clone(),
                    };
                    report.fail(statement.to_sql(), e);
                }
            }
        }
    }

    /// Phase 2: create indexes for frequently referenced columns
    pub async fn create(&self, report: &mut DecisionReport) {
        let mut groups = match self.sink.grouped_totals().await {
            Ok(groups) => groups,
            Err(e) => {
                warn!(error = %e, "failed to read observation totals");
                report.fail("read observation totals", e);
                return;
            }
        };

        let weights = self.config.weights;
        groups.sort_by(|a, b| weights.weighted_score(b).total_cmp(&weights.weighted_score(a)));

        for group in groups {
            let candidate = match self.score(&group).await {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(table = %group.table_name, error = %e, "failed to read table total");
                    report.fail(format!("count observations of {}", group.table_name), e);
                    continue;
                }
            };

            if candidate.final_score < self.config.create_threshold {
                debug!(
                    table = %candidate.table_name,
                    column = %candidate.column_name,
                    score = candidate.final_score,
                    "score below threshold, index not created"
                );
                report.skipped.push(candidate);
                continue;
            }

            match self.ddl.create_index(&candidate.table_name, &candidate.column_name).await {
                Ok(()) => {
                    info!(
                        table = %candidate.table_name,
                        column = %candidate.column_name,
                        score = candidate.final_score,
                        "created index"
                    );
                    report.created.push(candidate);
                }
                Err(e) => {
                    warn!(
                        table = %candidate.table_name,
                        column = %candidate.column_name,
                        error = %e,
                        "failed to create index"
                    );
                    let statement = DdlStatement::CreateIndex {
                        table: candidate.table_name.clone(),
                        column: candidate.column_name.clone(),
                    };
                    report.fail(statement.to_sql(), e);
                }
            }
        }
    }

    /// Score one group, reading its table total from the store
    async fn score(&self, group: &ClauseCounts) -> crate::error::Result<ScoredCandidate> {
        let weighted_score = self.config.weights.weighted_score(group);
        let table_total_observations = self.sink.table_total(&group.table_name).await?;

        if table_total_observations <= 0 {
            warn!(table = %group.table_name, "no observations for table, scoring as 0");
        }

        Ok(ScoredCandidate {
            table_name: group.table_name.clone(),
            column_name: group.column_name.clone(),
            frequency_count: group.frequency(),
            weighted_score,
            table_total_observations,
            final_score: final_score(weighted_score, table_total_observations),
        })
    }
}
