//! Per-node statistics dispatch
//!
//! Routes each operator to its estimation rule and normalizes every
//! result against the node's output schema, so downstream consumers only
//! ever see canonical snapshots.

use crate::filter::FilterStatsCalculator;
use crate::join::JoinStatsCalculator;
use crate::node_stats::PlanNodeStatsEstimate;
use crate::normalizer::normalize;
use crate::rules::{aggregate_stats, limit_stats, project_stats, union_stats};
use crate::table_stats::TableStatsProvider;
use rcbo_common::{CostEstimatorConfig, RcboError, Result};
use rcbo_plan::{PlanNode, TypeMap};
use std::sync::Arc;

pub struct StatsCalculator {
    table_stats: Arc<dyn TableStatsProvider>,
    config: CostEstimatorConfig,
}

impl StatsCalculator {
    pub fn new(table_stats: Arc<dyn TableStatsProvider>, config: CostEstimatorConfig) -> Self {
        Self {
            table_stats,
            config,
        }
    }

    pub fn config(&self) -> &CostEstimatorConfig {
        &self.config
    }

    /// Output statistics of `node`, given its children's statistics in
    /// `children()` order.
    pub fn compute(
        &self,
        node: &PlanNode,
        source_stats: &[PlanNodeStatsEstimate],
        types: &TypeMap,
    ) -> Result<PlanNodeStatsEstimate> {
        let raw = match node {
            PlanNode::TableScan { table_name, .. } => self.table_stats.table_stats(table_name),
            PlanNode::Filter { predicate, .. } => {
                FilterStatsCalculator::new(&self.config, types)
                    .filter_stats(source(node, source_stats, 0)?, predicate)
            }
            PlanNode::Project { assignments, .. } => {
                project_stats(source(node, source_stats, 0)?, assignments)
            }
            PlanNode::Join {
                join_type,
                criteria,
                filter,
                ..
            } => JoinStatsCalculator::new(&self.config, types).join_stats(
                *join_type,
                criteria,
                filter.as_ref(),
                source(node, source_stats, 0)?,
                source(node, source_stats, 1)?,
            ),
            PlanNode::SemiJoin {
                source_join_symbol,
                filtering_source_join_symbol,
                negated,
                ..
            } => JoinStatsCalculator::new(&self.config, types).semi_join_stats(
                source(node, source_stats, 0)?,
                source(node, source_stats, 1)?,
                source_join_symbol,
                filtering_source_join_symbol,
                *negated,
            ),
            PlanNode::Aggregate { group_by, .. } => {
                aggregate_stats(source(node, source_stats, 0)?, group_by)
            }
            PlanNode::Union { outputs, .. } => union_stats(source_stats, outputs),
            PlanNode::Limit { count, .. } | PlanNode::TopN { count, .. } => {
                limit_stats(source(node, source_stats, 0)?, *count)
            }
            // Row order and placement change, the data does not.
            PlanNode::Sort { .. } | PlanNode::Exchange { .. } => {
                source(node, source_stats, 0)?.clone()
            }
        };
        Ok(normalize(raw, &node.output_symbols(), types))
    }
}

fn source<'s>(
    node: &PlanNode,
    source_stats: &'s [PlanNodeStatsEstimate],
    index: usize,
) -> Result<&'s PlanNodeStatsEstimate> {
    source_stats.get(index).ok_or_else(|| {
        RcboError::Internal(format!(
            "missing source statistics {} for plan node {}",
            index,
            node.id()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::Estimate;
    use crate::symbol_stats::SymbolStatsEstimate;
    use crate::table_stats::InMemoryTableStatsProvider;
    use rcbo_common::{PlanNodeId, Symbol};
    use rcbo_plan::{BinaryOperator, Expr, Literal};

    fn table_stats() -> PlanNodeStatsEstimate {
        let mut stats = PlanNodeStatsEstimate::with_row_count(Estimate::Known(1000.0));
        stats.set_symbol_stats(
            Symbol::new("a"),
            SymbolStatsEstimate {
                low_value: Estimate::Known(0.0),
                high_value: Estimate::Known(100.0),
                distinct_values_count: Estimate::Known(100.0),
                nulls_fraction: Estimate::zero(),
                average_row_size: Estimate::Known(8.0),
            },
        );
        stats
    }

    fn calculator() -> StatsCalculator {
        let provider = InMemoryTableStatsProvider::new().with_table("t", table_stats());
        StatsCalculator::new(Arc::new(provider), CostEstimatorConfig::default())
    }

    fn scan(id: u32) -> PlanNode {
        PlanNode::TableScan {
            id: PlanNodeId::new(id),
            table_name: "t".to_string(),
            output: vec![Symbol::new("a")],
        }
    }

    #[test]
    fn test_table_scan_uses_the_provider() {
        let stats = calculator()
            .compute(&scan(1), &[], &TypeMap::new())
            .unwrap();
        assert_eq!(stats.output_row_count, Estimate::Known(1000.0));
    }

    #[test]
    fn test_unknown_table_scan_is_unknown() {
        let node = PlanNode::TableScan {
            id: PlanNodeId::new(1),
            table_name: "missing".to_string(),
            output: vec![Symbol::new("a")],
        };
        let stats = calculator().compute(&node, &[], &TypeMap::new()).unwrap();
        assert!(stats.is_row_count_unknown());
    }

    #[test]
    fn test_filter_scales_rows() {
        let node = PlanNode::Filter {
            id: PlanNodeId::new(2),
            input: Box::new(scan(1)),
            predicate: Expr::BinaryOp {
                left: Box::new(Expr::column("a")),
                op: BinaryOperator::Lt,
                right: Box::new(Expr::Literal(Literal::Int(50))),
            },
        };
        let stats = calculator()
            .compute(&node, &[table_stats()], &TypeMap::new())
            .unwrap();
        assert_eq!(stats.output_row_count, Estimate::Known(500.0));
    }

    #[test]
    fn test_exchange_passes_stats_through() {
        let node = PlanNode::Exchange {
            id: PlanNodeId::new(2),
            input: Box::new(scan(1)),
            scope: rcbo_plan::ExchangeScope::Remote,
            kind: rcbo_plan::ExchangeKind::Repartition,
        };
        let stats = calculator()
            .compute(&node, &[table_stats()], &TypeMap::new())
            .unwrap();
        assert_eq!(stats, table_stats());
    }

    #[test]
    fn test_missing_source_stats_is_an_internal_error() {
        let node = PlanNode::Filter {
            id: PlanNodeId::new(2),
            input: Box::new(scan(1)),
            predicate: Expr::Literal(Literal::Boolean(true)),
        };
        let err = calculator().compute(&node, &[], &TypeMap::new()).unwrap_err();
        assert!(matches!(err, RcboError::Internal(_)));
    }
}
