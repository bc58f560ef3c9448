//! Arithmetic over whole node estimates
//!
//! Row-count-weighted merges and complements used by UNION, OR and NOT.

use crate::estimate::Estimate;
use crate::node_stats::PlanNodeStatsEstimate;
use crate::symbol_stats::{StatisticRange, SymbolStatsEstimate};
use rcbo_common::Symbol;
use std::collections::HashSet;

/// How distinct values combine when two estimates are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeAddition {
    /// Branches contribute independent distinct values (UNION).
    SumDistinct,
    /// Overlapping ranges deduplicate, disjoint ranges sum (OR over the
    /// same column).
    CollapseDistinct,
}

/// Row-count-weighted union of two node estimates.
///
/// Row count is the sum. Per column: nulls fraction is the weighted
/// average of the branch fractions; range and NDV merge per `mode`, and
/// degrade to unknown when a branch knows nothing about the column.
pub fn add_stats(
    left: &PlanNodeStatsEstimate,
    right: &PlanNodeStatsEstimate,
    mode: RangeAddition,
) -> PlanNodeStatsEstimate {
    let left_rows = left.output_row_count;
    let right_rows = right.output_row_count;
    let total_rows = left_rows + right_rows;
    let mut result = PlanNodeStatsEstimate::with_row_count(total_rows);

    let symbols: HashSet<&Symbol> = left.symbols().chain(right.symbols()).collect();
    for symbol in symbols {
        let left_stats = left.symbol_stats(symbol);
        let right_stats = right.symbol_stats(symbol);
        result.set_symbol_stats(
            symbol.clone(),
            merge_symbol_stats(&left_stats, left_rows, &right_stats, right_rows, mode),
        );
    }
    result
}

fn merge_symbol_stats(
    left: &SymbolStatsEstimate,
    left_rows: Estimate,
    right: &SymbolStatsEstimate,
    right_rows: Estimate,
    mode: RangeAddition,
) -> SymbolStatsEstimate {
    let nulls_fraction = weighted_average(
        left.nulls_fraction,
        left_rows,
        right.nulls_fraction,
        right_rows,
    );
    let average_row_size = weighted_average(
        left.average_row_size,
        left_rows,
        right.average_row_size,
        right_rows,
    );

    // A branch with no range/NDV knowledge poisons the merged range.
    let range_known = |stats: &SymbolStatsEstimate| {
        stats.distinct_values_count.is_exactly(0.0)
            || (!stats.distinct_values_count.is_unknown()
                && !stats.low_value.is_unknown()
                && !stats.high_value.is_unknown())
    };
    let mut merged = SymbolStatsEstimate {
        nulls_fraction,
        average_row_size,
        ..SymbolStatsEstimate::unknown()
    };
    if range_known(left) && range_known(right) {
        let left_range = StatisticRange::from_symbol_stats(left);
        let right_range = StatisticRange::from_symbol_stats(right);
        let combined = match mode {
            RangeAddition::SumDistinct => left_range.add_and_sum_distinct_values(&right_range),
            RangeAddition::CollapseDistinct => {
                left_range.add_and_collapse_distinct_values(&right_range)
            }
        };
        merged = merged.apply_range(&combined);
    }
    merged
}

fn weighted_average(
    left: Estimate,
    left_weight: Estimate,
    right: Estimate,
    right_weight: Estimate,
) -> Estimate {
    (left * left_weight + right * right_weight) / (left_weight + right_weight)
}

/// Statistical complement: the rows of `superset` not in `subset`.
///
/// Note on nulls: the complement restores a nulls fraction even when the
/// subset's predicate excluded nulls entirely, because the true split is
/// not derivable from the two estimates alone. This is the documented
/// behavior of NOT estimation, kept as-is.
pub fn subtract_subset_stats(
    superset: &PlanNodeStatsEstimate,
    subset: &PlanNodeStatsEstimate,
) -> PlanNodeStatsEstimate {
    let superset_rows = superset.output_row_count;
    let subset_rows = subset.output_row_count;
    let rows = (superset_rows - subset_rows).non_negative();
    let mut result = PlanNodeStatsEstimate::with_row_count(rows);

    for (symbol, superset_stats) in superset.symbol_statistics() {
        let subset_stats = subset.symbol_stats(symbol);
        let ndv = (superset_stats.distinct_values_count - subset_stats.distinct_values_count)
            .non_negative();
        let null_rows = (superset_rows * superset_stats.nulls_fraction
            - subset_rows * subset_stats.nulls_fraction)
            .non_negative();
        let nulls_fraction = (null_rows / rows).map(|f| f.clamp(0.0, 1.0));
        result.set_symbol_stats(
            symbol.clone(),
            SymbolStatsEstimate {
                // The complement cannot narrow the original range.
                low_value: superset_stats.low_value,
                high_value: superset_stats.high_value,
                distinct_values_count: ndv,
                nulls_fraction,
                average_row_size: superset_stats.average_row_size,
            },
        );
    }
    result
}

/// Cap the row count at `max_rows`; column stats are left for the
/// normalizer to reconcile.
pub fn cap_row_count(
    stats: PlanNodeStatsEstimate,
    max_rows: Estimate,
) -> PlanNodeStatsEstimate {
    stats.map_row_count(|rows| rows.min(max_rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(rows: f64, low: f64, high: f64, ndv: f64, nulls: f64) -> PlanNodeStatsEstimate {
        let mut stats = PlanNodeStatsEstimate::with_row_count(Estimate::Known(rows));
        stats.set_symbol_stats(
            Symbol::new("x"),
            SymbolStatsEstimate {
                low_value: Estimate::Known(low),
                high_value: Estimate::Known(high),
                distinct_values_count: Estimate::Known(ndv),
                nulls_fraction: Estimate::Known(nulls),
                average_row_size: Estimate::Known(8.0),
            },
        );
        stats
    }

    #[test]
    fn test_add_stats_sums_rows_and_spans_ranges() {
        let a = branch(10.0, 0.0, 5.0, 5.0, 0.1);
        let b = branch(20.0, 10.0, 20.0, 10.0, 0.4);
        let merged = add_stats(&a, &b, RangeAddition::SumDistinct);
        assert_eq!(merged.output_row_count, Estimate::Known(30.0));
        let x = merged.symbol_stats(&Symbol::new("x"));
        assert_eq!(x.low_value, Estimate::Known(0.0));
        assert_eq!(x.high_value, Estimate::Known(20.0));
        assert_eq!(x.distinct_values_count, Estimate::Known(15.0));
        // (10*0.1 + 20*0.4) / 30 = 0.3
        assert_eq!(x.nulls_fraction, Estimate::Known(0.3));
    }

    #[test]
    fn test_add_stats_unknown_branch_degrades_range_not_nulls() {
        let a = branch(10.0, 0.0, 5.0, 5.0, 0.0);
        let mut b = PlanNodeStatsEstimate::with_row_count(Estimate::Known(20.0));
        b.set_symbol_stats(
            Symbol::new("x"),
            SymbolStatsEstimate {
                nulls_fraction: Estimate::Known(0.3),
                ..SymbolStatsEstimate::unknown()
            },
        );
        let merged = add_stats(&a, &b, RangeAddition::SumDistinct);
        let x = merged.symbol_stats(&Symbol::new("x"));
        assert!(x.distinct_values_count.is_unknown());
        assert!(x.low_value.is_unknown());
        assert_eq!(x.nulls_fraction, Estimate::Known(0.2));
    }

    #[test]
    fn test_subtract_subset() {
        let superset = branch(100.0, 0.0, 10.0, 20.0, 0.2);
        let subset = branch(40.0, 0.0, 4.0, 8.0, 0.0);
        let complement = subtract_subset_stats(&superset, &subset);
        assert_eq!(complement.output_row_count, Estimate::Known(60.0));
        let x = complement.symbol_stats(&Symbol::new("x"));
        assert_eq!(x.distinct_values_count, Estimate::Known(12.0));
        // all 20 null rows land in the complement: 20/60
        assert_eq!(x.nulls_fraction, Estimate::Known(20.0 / 60.0));
        assert_eq!(x.high_value, Estimate::Known(10.0));
    }

    #[test]
    fn test_cap_row_count() {
        let stats = branch(100.0, 0.0, 1.0, 1.0, 0.0);
        let capped = cap_row_count(stats, Estimate::Known(30.0));
        assert_eq!(capped.output_row_count, Estimate::Known(30.0));
    }
}
