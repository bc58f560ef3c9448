//! Per-operator propagation rules
//!
//! The operators whose estimation is a direct transformation of their
//! input estimates: projections, aggregations, limits and unions. Scans,
//! filters and joins live in their own modules.

use crate::estimate::Estimate;
use crate::node_stats::PlanNodeStatsEstimate;
use crate::scalar::scalar_stats;
use crate::stats_math::{add_stats, RangeAddition};
use rcbo_common::Symbol;
use rcbo_plan::{Expr, UnionMapping};

/// Projections keep the row count; each assignment's column statistics
/// come from the scalar calculator.
pub fn project_stats(
    input: &PlanNodeStatsEstimate,
    assignments: &[(Symbol, Expr)],
) -> PlanNodeStatsEstimate {
    let mut result = PlanNodeStatsEstimate::with_row_count(input.output_row_count);
    for (symbol, expr) in assignments {
        result.set_symbol_stats(symbol.clone(), scalar_stats(expr, input));
    }
    result
}

/// Group count is the product of the grouping columns' distinct counts
/// (plus one per nullable column for the null group), capped by the
/// input row count. A global aggregation emits exactly one row.
pub fn aggregate_stats(
    input: &PlanNodeStatsEstimate,
    group_by: &[Symbol],
) -> PlanNodeStatsEstimate {
    if group_by.is_empty() {
        return PlanNodeStatsEstimate::with_row_count(Estimate::Known(1.0));
    }

    let mut groups = Estimate::Known(1.0);
    for symbol in group_by {
        let stats = input.symbol_stats(symbol);
        let null_group = match stats.nulls_fraction.value() {
            Some(nulls) if nulls > 0.0 => Estimate::Known(1.0),
            Some(_) => Estimate::zero(),
            None => Estimate::Unknown,
        };
        groups = groups * (stats.distinct_values_count + null_group);
    }
    // There cannot be more groups than input rows; an unknown input row
    // count leaves the product as the estimate.
    let rows = match input.output_row_count {
        Estimate::Known(_) => groups.min(input.output_row_count),
        Estimate::Unknown => groups,
    };

    let mut result = PlanNodeStatsEstimate::with_row_count(rows);
    for symbol in group_by {
        result.set_symbol_stats(symbol.clone(), input.symbol_stats(symbol));
    }
    result
}

/// LIMIT and TopN: never more rows than the limit. An unknown input
/// still bounds the output, so the result is the limit itself.
pub fn limit_stats(input: &PlanNodeStatsEstimate, count: u64) -> PlanNodeStatsEstimate {
    let limit = Estimate::Known(count as f64);
    let rows = match input.output_row_count {
        Estimate::Known(rows) => Estimate::Known(rows.min(count as f64)),
        Estimate::Unknown => limit,
    };
    input.clone().map_row_count(|_| rows)
}

/// UNION ALL: branch estimates summed per output symbol, with the
/// branch columns remapped onto the union's output names.
pub fn union_stats(
    branches: &[PlanNodeStatsEstimate],
    outputs: &[UnionMapping],
) -> PlanNodeStatsEstimate {
    let mut combined: Option<PlanNodeStatsEstimate> = None;
    for (index, branch) in branches.iter().enumerate() {
        let mut mapped = PlanNodeStatsEstimate::with_row_count(branch.output_row_count);
        for mapping in outputs {
            if let Some(input_symbol) = mapping.inputs.get(index) {
                mapped.set_symbol_stats(mapping.output.clone(), branch.symbol_stats(input_symbol));
            }
        }
        combined = Some(match combined {
            None => mapped,
            Some(acc) => add_stats(&acc, &mapped, RangeAddition::SumDistinct),
        });
    }
    combined.unwrap_or_else(PlanNodeStatsEstimate::unknown)
}
