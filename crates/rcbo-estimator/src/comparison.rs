//! Comparison predicate estimation
//!
//! Row-count selectivity and column-stats refinement for `left op right`
//! where `op` is a comparison. Sides that are bare columns get their
//! statistics narrowed in the output; other scalar shapes contribute an
//! estimate through the scalar calculator but no writeback.

use crate::estimate::Estimate;
use crate::node_stats::PlanNodeStatsEstimate;
use crate::scalar::scalar_stats;
use crate::symbol_stats::{StatisticRange, SymbolStatsEstimate};
use rcbo_common::Symbol;
use rcbo_plan::{BinaryOperator, Expr, Literal};

/// Damping applied to `a < b` when the two domains overlap and the order
/// of values within the overlap is unknown.
pub(crate) const OVERLAP_COEFFICIENT: f64 = 0.5;

pub fn estimate_comparison(
    input: &PlanNodeStatsEstimate,
    left: &Expr,
    op: BinaryOperator,
    right: &Expr,
) -> PlanNodeStatsEstimate {
    debug_assert!(op.is_comparison());

    // Canonicalize `literal op column` to `column op' literal`.
    if matches!(left, Expr::Literal(_)) && !matches!(right, Expr::Literal(_)) {
        return estimate_comparison(input, right, op.flip(), left);
    }

    match right {
        Expr::Literal(literal) => {
            estimate_to_literal(input, left, op, literal.as_f64())
        }
        _ => estimate_to_expression(input, left, op, right),
    }
}

fn symbol_of(expr: &Expr) -> Option<&Symbol> {
    match expr {
        Expr::Column(symbol) => Some(symbol),
        _ => None,
    }
}

/// Scale the input row count, keeping every column's stats for the
/// normalizer to reconcile.
fn scaled(input: &PlanNodeStatsEstimate, selectivity: Estimate) -> PlanNodeStatsEstimate {
    input.clone().map_row_count(|rows| rows * selectivity)
}

/// Shape we cannot estimate: the row count becomes unknown but the
/// input columns' statistics still hold for sibling predicates.
pub(crate) fn unknown_rows(input: &PlanNodeStatsEstimate) -> PlanNodeStatsEstimate {
    input.clone().map_row_count(|_| Estimate::Unknown)
}

fn estimate_to_literal(
    input: &PlanNodeStatsEstimate,
    left: &Expr,
    op: BinaryOperator,
    value: Option<f64>,
) -> PlanNodeStatsEstimate {
    let stats = scalar_stats(left, input);
    match op {
        BinaryOperator::Eq => estimate_equals_literal(input, left, &stats, value),
        BinaryOperator::Neq => estimate_not_equals_literal(input, left, &stats, value),
        BinaryOperator::Lt | BinaryOperator::Lte => {
            let region = match value {
                Some(v) => StatisticRange::new(f64::NEG_INFINITY, v, Estimate::Unknown),
                None => return unknown_rows(input),
            };
            estimate_range_filter(input, left, &stats, &region)
        }
        BinaryOperator::Gt | BinaryOperator::Gte => {
            let region = match value {
                Some(v) => StatisticRange::new(v, f64::INFINITY, Estimate::Unknown),
                None => return unknown_rows(input),
            };
            estimate_range_filter(input, left, &stats, &region)
        }
        _ => unknown_rows(input),
    }
}

/// Selectivity of `expr = literal` assuming a uniform distribution over
/// the distinct values: `values_fraction / ndv`.
fn equals_literal_selectivity(stats: &SymbolStatsEstimate, value: Option<f64>) -> Estimate {
    if literal_outside_range(stats, value) {
        return Estimate::zero();
    }
    let ndv = stats.distinct_values_count;
    if ndv.is_exactly(0.0) {
        return Estimate::zero();
    }
    stats.values_fraction() / ndv
}

fn literal_outside_range(stats: &SymbolStatsEstimate, value: Option<f64>) -> bool {
    let value = match value {
        Some(v) => v,
        None => return false,
    };
    let below = matches!(stats.low_value.value(), Some(low) if value < low);
    let above = matches!(stats.high_value.value(), Some(high) if value > high);
    below || above
}

fn estimate_equals_literal(
    input: &PlanNodeStatsEstimate,
    left: &Expr,
    stats: &SymbolStatsEstimate,
    value: Option<f64>,
) -> PlanNodeStatsEstimate {
    let selectivity = equals_literal_selectivity(stats, value);
    let mut result = scaled(input, selectivity);
    if let Some(symbol) = symbol_of(left) {
        let matched = if selectivity.is_exactly(0.0) {
            SymbolStatsEstimate::zero()
        } else {
            let point = match value {
                Some(v) => Estimate::Known(v),
                None => Estimate::Unknown,
            };
            SymbolStatsEstimate {
                low_value: point,
                high_value: point,
                distinct_values_count: Estimate::Known(1.0),
                nulls_fraction: Estimate::zero(),
                average_row_size: stats.average_row_size,
            }
        };
        result.set_symbol_stats(symbol.clone(), matched);
    }
    result
}

fn estimate_not_equals_literal(
    input: &PlanNodeStatsEstimate,
    left: &Expr,
    stats: &SymbolStatsEstimate,
    value: Option<f64>,
) -> PlanNodeStatsEstimate {
    // All non-null rows except the ones equal to the literal.
    let selectivity =
        (stats.values_fraction() - equals_literal_selectivity(stats, value)).non_negative();
    let mut result = scaled(input, selectivity);
    if let Some(symbol) = symbol_of(left) {
        let excluded = if literal_outside_range(stats, value) {
            Estimate::zero()
        } else {
            Estimate::Known(1.0)
        };
        result.set_symbol_stats(
            symbol.clone(),
            SymbolStatsEstimate {
                distinct_values_count: (stats.distinct_values_count - excluded).non_negative(),
                nulls_fraction: Estimate::zero(),
                ..stats.clone()
            },
        );
    }
    result
}

/// `expr` restricted to `region` (a half-line for `<`, `<=`, `>`, `>=`).
fn estimate_range_filter(
    input: &PlanNodeStatsEstimate,
    left: &Expr,
    stats: &SymbolStatsEstimate,
    region: &StatisticRange,
) -> PlanNodeStatsEstimate {
    let range = StatisticRange::from_symbol_stats(stats);
    let overlap = range.overlap_percent_with(region);
    let selectivity = stats.values_fraction() * overlap;
    let mut result = scaled(input, selectivity);
    if let Some(symbol) = symbol_of(left) {
        let narrowed = stats.apply_range(&range.intersect(region));
        result.set_symbol_stats(
            symbol.clone(),
            SymbolStatsEstimate {
                nulls_fraction: Estimate::zero(),
                ..narrowed
            },
        );
    }
    result
}

fn estimate_to_expression(
    input: &PlanNodeStatsEstimate,
    left: &Expr,
    op: BinaryOperator,
    right: &Expr,
) -> PlanNodeStatsEstimate {
    let left_stats = scalar_stats(left, input);
    let right_stats = scalar_stats(right, input);
    match op {
        BinaryOperator::Eq => {
            estimate_equals_expression(input, left, &left_stats, right, &right_stats)
        }
        BinaryOperator::Neq => {
            // Complement of equality over non-null pairs.
            let equals =
                estimate_equals_expression(input, left, &left_stats, right, &right_stats);
            let non_null = left_stats.values_fraction() * right_stats.values_fraction();
            let selectivity = (input.output_row_count * non_null - equals.output_row_count)
                .non_negative()
                / input.output_row_count;
            scaled(input, selectivity)
        }
        BinaryOperator::Lt | BinaryOperator::Lte => {
            estimate_less_than(input, left, &left_stats, right, &right_stats)
        }
        BinaryOperator::Gt | BinaryOperator::Gte => {
            estimate_less_than(input, right, &right_stats, left, &left_stats)
        }
        _ => unknown_rows(input),
    }
}

fn estimate_equals_expression(
    input: &PlanNodeStatsEstimate,
    left: &Expr,
    left_stats: &SymbolStatsEstimate,
    right: &Expr,
    right_stats: &SymbolStatsEstimate,
) -> PlanNodeStatsEstimate {
    let left_range = StatisticRange::from_symbol_stats(left_stats);
    let right_range = StatisticRange::from_symbol_stats(right_stats);
    let intersection = left_range.intersect(&right_range);

    // Uniform distributions: a random non-null pair matches with
    // probability `intersect_ndv / (ndv_left * ndv_right)`. With one
    // domain containing the other this collapses to `1 / max(ndv)`.
    let ndv_product =
        left_stats.distinct_values_count * right_stats.distinct_values_count;
    let selectivity = if matches!(intersection, StatisticRange::Empty)
        || ndv_product.is_exactly(0.0)
    {
        Estimate::zero()
    } else {
        left_stats.values_fraction() * right_stats.values_fraction() * intersection.ndv()
            / ndv_product
    };

    let mut result = scaled(input, selectivity);
    // Both sides converge on the intersection domain.
    for (expr, stats) in [(left, left_stats), (right, right_stats)] {
        if let Some(symbol) = symbol_of(expr) {
            result.set_symbol_stats(
                symbol.clone(),
                SymbolStatsEstimate {
                    nulls_fraction: Estimate::zero(),
                    ..stats.apply_range(&intersection)
                },
            );
        }
    }
    result
}

/// `lesser < greater` over two estimated domains.
fn estimate_less_than(
    input: &PlanNodeStatsEstimate,
    lesser: &Expr,
    lesser_stats: &SymbolStatsEstimate,
    greater: &Expr,
    greater_stats: &SymbolStatsEstimate,
) -> PlanNodeStatsEstimate {
    let non_null = lesser_stats.values_fraction() * greater_stats.values_fraction();

    let lesser_high = lesser_stats.high_value.value();
    let lesser_low = lesser_stats.low_value.value();
    let greater_high = greater_stats.high_value.value();
    let greater_low = greater_stats.low_value.value();

    // Domains strictly ordered: the comparison is decided by the ranges.
    if let (Some(lh), Some(gl)) = (lesser_high, greater_low) {
        if lh <= gl {
            return scaled(input, non_null);
        }
    }
    if let (Some(ll), Some(gh)) = (lesser_low, greater_high) {
        if ll > gh {
            return scaled(input, Estimate::zero());
        }
    }

    let selectivity = non_null * Estimate::Known(OVERLAP_COEFFICIENT);
    let mut result = scaled(input, selectivity);
    // The lesser side cannot exceed the greater side's maximum, and
    // symmetrically for the lower bound.
    if let Some(symbol) = symbol_of(lesser) {
        let clamped_high = lesser_stats.high_value.min_known(greater_stats.high_value);
        result.set_symbol_stats(
            symbol.clone(),
            SymbolStatsEstimate {
                high_value: clamped_high,
                nulls_fraction: Estimate::zero(),
                ..lesser_stats.clone()
            },
        );
    }
    if let Some(symbol) = symbol_of(greater) {
        let clamped_low = greater_stats.low_value.max_known(lesser_stats.low_value);
        result.set_symbol_stats(
            symbol.clone(),
            SymbolStatsEstimate {
                low_value: clamped_low,
                nulls_fraction: Estimate::zero(),
                ..greater_stats.clone()
            },
        );
    }
    result
}

/// IN-list estimation: each in-range literal behaves like one equality.
pub fn estimate_in_list(
    input: &PlanNodeStatsEstimate,
    expr: &Expr,
    list: &[Literal],
) -> PlanNodeStatsEstimate {
    let stats = scalar_stats(expr, input);
    let ndv = match stats.distinct_values_count.value() {
        Some(ndv) => ndv,
        None => return unknown_rows(input),
    };
    if ndv == 0.0 {
        return scaled(input, Estimate::zero());
    }

    // Distinct literal values that survive the column's range.
    let mut in_range: Vec<f64> = Vec::new();
    for literal in list {
        match literal.as_f64() {
            Some(value) => {
                if !literal_outside_range(&stats, Some(value))
                    && !in_range.iter().any(|v| v == &value)
                {
                    in_range.push(value);
                }
            }
            // A value we cannot order (string, NULL) defeats range
            // pruning; count it conservatively unless it is NULL.
            None => {
                if !matches!(literal, Literal::Null) {
                    in_range.push(f64::NAN);
                }
            }
        }
    }

    let matched = (in_range.len() as f64).min(ndv);
    let selectivity = stats.values_fraction() * Estimate::Known(matched / ndv);
    let mut result = scaled(input, selectivity);

    if let Some(symbol) = symbol_of(expr) {
        let finite: Vec<f64> = in_range.iter().copied().filter(|v| v.is_finite()).collect();
        // In-range literals already respect the column's bounds, so the
        // literal extremes are the result's range.
        let (low, high) = if !finite.is_empty() && finite.len() == in_range.len() {
            let low = finite.iter().cloned().fold(f64::INFINITY, f64::min);
            let high = finite.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            (Estimate::Known(low), Estimate::Known(high))
        } else {
            (stats.low_value, stats.high_value)
        };
        result.set_symbol_stats(
            symbol.clone(),
            SymbolStatsEstimate {
                low_value: low,
                high_value: high,
                distinct_values_count: Estimate::Known(matched),
                nulls_fraction: Estimate::zero(),
                average_row_size: stats.average_row_size,
            },
        );
    }
    result
}
