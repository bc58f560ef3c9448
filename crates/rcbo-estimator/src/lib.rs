//! RCBO Estimator - Statistics derivation and cost model
//!
//! Derives per-node output statistics (row counts plus per-column
//! distributions) bottom-up over a logical plan, and prices subplans
//! with a three-dimensional CPU/memory/network cost model. All results
//! are estimates: a statistic the engine cannot derive is explicitly
//! unknown, never a guess and never a NaN.

pub mod cache;
pub mod comparison;
pub mod cost;
pub mod estimate;
pub mod filter;
pub mod join;
pub mod node_stats;
pub mod normalizer;
pub mod rules;
pub mod scalar;
pub mod stats_calculator;
pub mod stats_math;
pub mod symbol_stats;
pub mod table_stats;

pub use cache::{CachingCostProvider, CachingStatsProvider};
pub use cost::{
    CostCalculator, CostCalculatorUsingExchanges, CostCalculatorWithEstimatedExchanges,
    LocalCostEstimate, PlanCostEstimate,
};
pub use estimate::Estimate;
pub use filter::FilterStatsCalculator;
pub use join::JoinStatsCalculator;
pub use node_stats::PlanNodeStatsEstimate;
pub use stats_calculator::StatsCalculator;
pub use symbol_stats::{StatisticRange, SymbolStatsEstimate};
pub use table_stats::{InMemoryTableStatsProvider, TableStatsProvider};
