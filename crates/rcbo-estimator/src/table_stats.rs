//! Base-table statistics
//!
//! Scans are the leaves of estimation: everything above them is derived,
//! but their statistics have to come from outside. `TableStatsProvider`
//! is that seam; the in-memory implementation backs tests and embedded
//! use.

use crate::node_stats::PlanNodeStatsEstimate;
use std::collections::HashMap;

pub trait TableStatsProvider: Send + Sync {
    /// Statistics for a base table. A table that has never been analyzed
    /// reports the unknown estimate, not an error.
    fn table_stats(&self, table_name: &str) -> PlanNodeStatsEstimate;
}

#[derive(Debug, Default)]
pub struct InMemoryTableStatsProvider {
    tables: HashMap<String, PlanNodeStatsEstimate>,
}

impl InMemoryTableStatsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(
        mut self,
        table_name: impl Into<String>,
        stats: PlanNodeStatsEstimate,
    ) -> Self {
        self.tables.insert(table_name.into(), stats);
        self
    }

    pub fn set_table_stats(&mut self, table_name: impl Into<String>, stats: PlanNodeStatsEstimate) {
        self.tables.insert(table_name.into(), stats);
    }
}

impl TableStatsProvider for InMemoryTableStatsProvider {
    fn table_stats(&self, table_name: &str) -> PlanNodeStatsEstimate {
        self.tables
            .get(table_name)
            .cloned()
            .unwrap_or_else(PlanNodeStatsEstimate::unknown)
    }
}
