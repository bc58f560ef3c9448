//! RCBO Plan - Logical plan tree and scalar expressions
//!
//! The plan is a read-only input to the estimator: operator-tagged nodes
//! with stable ids, children, output symbols, and operator-specific
//! parameters. Column types are carried separately as a symbol-to-type
//! mapping.

pub mod expr;
pub mod plan;

pub use expr::{BinaryOperator, Expr, Literal, UnaryOperator};
pub use plan::{
    EquiJoinClause, ExchangeKind, ExchangeScope, JoinDistribution, JoinType, PlanNode,
    UnionMapping,
};

use arrow_schema::DataType;
use rcbo_common::Symbol;
use std::collections::HashMap;

/// Symbol-to-type mapping for one plan tree
pub type TypeMap = HashMap<Symbol, DataType>;
