//! Logical Query Plan representation
//!
//! The estimator consumes this tree read-only. Operators are a closed
//! tagged union so the stats and cost calculators can dispatch by
//! exhaustive pattern match; an unhandled operator is a compile error
//! rather than a runtime fallback.

use crate::expr::Expr;
use rcbo_common::{PlanNodeId, Symbol};
use serde::{Deserialize, Serialize};

/// Logical Query Plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlanNode {
    /// Scan a base table
    TableScan {
        id: PlanNodeId,
        table_name: String,
        output: Vec<Symbol>,
    },

    /// Filter rows
    Filter {
        id: PlanNodeId,
        input: Box<PlanNode>,
        predicate: Expr,
    },

    /// Compute output columns from scalar expressions
    Project {
        id: PlanNodeId,
        input: Box<PlanNode>,
        assignments: Vec<(Symbol, Expr)>,
    },

    /// Join two relations on equi clauses plus an optional residual filter
    Join {
        id: PlanNodeId,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        join_type: JoinType,
        criteria: Vec<EquiJoinClause>,
        filter: Option<Expr>,
        distribution: JoinDistribution,
    },

    /// EXISTS-shaped filtering join; `negated` makes it an anti-join
    SemiJoin {
        id: PlanNodeId,
        source: Box<PlanNode>,
        filtering_source: Box<PlanNode>,
        source_join_symbol: Symbol,
        filtering_source_join_symbol: Symbol,
        negated: bool,
    },

    /// Group-by aggregation; empty `group_by` is a global aggregation
    Aggregate {
        id: PlanNodeId,
        input: Box<PlanNode>,
        group_by: Vec<Symbol>,
        aggregate_outputs: Vec<Symbol>,
    },

    /// Union all of the inputs
    Union {
        id: PlanNodeId,
        inputs: Vec<PlanNode>,
        /// Per output symbol, the corresponding symbol in each branch,
        /// in branch order.
        outputs: Vec<UnionMapping>,
    },

    /// Limit rows
    Limit {
        id: PlanNodeId,
        input: Box<PlanNode>,
        count: u64,
    },

    /// Ordered limit
    TopN {
        id: PlanNodeId,
        input: Box<PlanNode>,
        count: u64,
    },

    /// Sort rows
    Sort {
        id: PlanNodeId,
        input: Box<PlanNode>,
    },

    /// Data redistribution boundary
    Exchange {
        id: PlanNodeId,
        input: Box<PlanNode>,
        scope: ExchangeScope,
        kind: ExchangeKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

/// One `left = right` equi-join clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquiJoinClause {
    pub left: Symbol,
    pub right: Symbol,
}

impl EquiJoinClause {
    pub fn new(left: impl Into<Symbol>, right: impl Into<Symbol>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

/// How a distributed join moves its inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinDistribution {
    /// Both sides hash-partitioned on the join keys
    Partitioned,
    /// Build side replicated to every node
    Replicated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeScope {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeKind {
    Gather,
    Repartition,
    Replicate,
}

/// Output symbol of a union and the branch symbols feeding it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionMapping {
    pub output: Symbol,
    pub inputs: Vec<Symbol>,
}

impl UnionMapping {
    pub fn new(output: impl Into<Symbol>, inputs: Vec<Symbol>) -> Self {
        Self {
            output: output.into(),
            inputs,
        }
    }
}

impl PlanNode {
    pub fn id(&self) -> PlanNodeId {
        match self {
            PlanNode::TableScan { id, .. }
            | PlanNode::Filter { id, .. }
            | PlanNode::Project { id, .. }
            | PlanNode::Join { id, .. }
            | PlanNode::SemiJoin { id, .. }
            | PlanNode::Aggregate { id, .. }
            | PlanNode::Union { id, .. }
            | PlanNode::Limit { id, .. }
            | PlanNode::TopN { id, .. }
            | PlanNode::Sort { id, .. }
            | PlanNode::Exchange { id, .. } => *id,
        }
    }

    /// Child nodes in execution order. For joins this is `[probe, build]`.
    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::TableScan { .. } => vec![],
            PlanNode::Filter { input, .. }
            | PlanNode::Project { input, .. }
            | PlanNode::Aggregate { input, .. }
            | PlanNode::Limit { input, .. }
            | PlanNode::TopN { input, .. }
            | PlanNode::Sort { input, .. }
            | PlanNode::Exchange { input, .. } => vec![input],
            PlanNode::Join { left, right, .. } => vec![left, right],
            PlanNode::SemiJoin {
                source,
                filtering_source,
                ..
            } => vec![source, filtering_source],
            PlanNode::Union { inputs, .. } => inputs.iter().collect(),
        }
    }

    /// Output columns of this node
    pub fn output_symbols(&self) -> Vec<Symbol> {
        match self {
            PlanNode::TableScan { output, .. } => output.clone(),
            PlanNode::Filter { input, .. }
            | PlanNode::Limit { input, .. }
            | PlanNode::TopN { input, .. }
            | PlanNode::Sort { input, .. }
            | PlanNode::Exchange { input, .. } => input.output_symbols(),
            PlanNode::Project { assignments, .. } => {
                assignments.iter().map(|(s, _)| s.clone()).collect()
            }
            PlanNode::Join { left, right, .. } => {
                let mut symbols = left.output_symbols();
                symbols.extend(right.output_symbols());
                symbols
            }
            PlanNode::SemiJoin { source, .. } => source.output_symbols(),
            PlanNode::Aggregate {
                group_by,
                aggregate_outputs,
                ..
            } => {
                let mut symbols = group_by.clone();
                symbols.extend(aggregate_outputs.iter().cloned());
                symbols
            }
            PlanNode::Union { outputs, .. } => {
                outputs.iter().map(|m| m.output.clone()).collect()
            }
        }
    }
}
