//! Stats normalization
//!
//! The single place where cross-field invariants are enforced. Every rule
//! passes its raw result through `normalize` before returning or caching
//! it. The function is idempotent: normalizing an already-normalized
//! snapshot is a no-op.

use crate::estimate::Estimate;
use crate::node_stats::PlanNodeStatsEstimate;
use crate::symbol_stats::SymbolStatsEstimate;
use rcbo_common::Symbol;
use rcbo_plan::TypeMap;
use std::collections::HashSet;
use tracing::debug;

pub fn normalize(
    stats: PlanNodeStatsEstimate,
    output_symbols: &[Symbol],
    _types: &TypeMap,
) -> PlanNodeStatsEstimate {
    let row_count = stats.output_row_count;
    let mut result = PlanNodeStatsEstimate::with_row_count(row_count);

    let output_set: HashSet<&Symbol> = output_symbols.iter().collect();
    for (symbol, symbol_stats) in stats.symbol_statistics() {
        if !output_set.contains(symbol) {
            continue;
        }
        let normalized = if row_count.is_exactly(0.0) {
            SymbolStatsEstimate::zero()
        } else {
            relax_ndv_cap(symbol, symbol_stats.clone(), row_count)
        };
        result.set_symbol_stats(symbol.clone(), normalized);
    }
    result
}

/// Enforce `ndv <= row_count * (1 - nulls_fraction)`.
///
/// A violation is relaxed by halving the contradiction instead of hard
/// clamping: `ndv' = (min(ndv, rows) + cap) / 2` and `nulls' = nulls / 2`.
/// Hard clamping creates discontinuities that make repeated optimizer
/// passes oscillate.
fn relax_ndv_cap(
    symbol: &Symbol,
    mut stats: SymbolStatsEstimate,
    row_count: Estimate,
) -> SymbolStatsEstimate {
    let (ndv, rows, nulls) = match (
        stats.distinct_values_count.value(),
        row_count.value(),
        stats.nulls_fraction.value(),
    ) {
        (Some(ndv), Some(rows), Some(nulls)) => (ndv, rows, nulls),
        _ => return stats,
    };

    let cap = rows * (1.0 - nulls);
    if ndv > cap {
        let relaxed_ndv = (ndv.min(rows) + cap) / 2.0;
        let relaxed_nulls = nulls / 2.0;
        debug!(
            symbol = %symbol,
            ndv,
            cap,
            relaxed_ndv,
            "relaxing distinct values count above the row cap"
        );
        stats.distinct_values_count = Estimate::of(relaxed_ndv);
        stats.nulls_fraction = Estimate::of(relaxed_nulls);
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::Estimate;

    fn symbol() -> Symbol {
        Symbol::new("x")
    }

    fn stats_with(rows: f64, ndv: Estimate, nulls: Estimate) -> PlanNodeStatsEstimate {
        let mut stats = PlanNodeStatsEstimate::with_row_count(Estimate::Known(rows));
        stats.set_symbol_stats(
            symbol(),
            SymbolStatsEstimate {
                low_value: Estimate::Known(0.0),
                high_value: Estimate::Known(100.0),
                distinct_values_count: ndv,
                nulls_fraction: nulls,
                average_row_size: Estimate::Known(8.0),
            },
        );
        stats
    }

    #[test]
    fn test_drops_symbols_outside_output() {
        let stats = stats_with(10.0, Estimate::Known(5.0), Estimate::zero());
        let normalized = normalize(stats, &[], &TypeMap::new());
        assert!(normalized.symbol_stats(&symbol()).is_unknown());
    }

    #[test]
    fn test_zero_rows_canonicalize_columns() {
        let stats = stats_with(0.0, Estimate::Known(5.0), Estimate::zero());
        let normalized = normalize(stats, &[symbol()], &TypeMap::new());
        assert_eq!(normalized.symbol_stats(&symbol()), SymbolStatsEstimate::zero());
    }

    #[test]
    fn test_ndv_cap_relaxation() {
        let stats = stats_with(100.0, Estimate::Known(400.0), Estimate::Known(0.5));
        let normalized = normalize(stats, &[symbol()], &TypeMap::new());
        let x = normalized.symbol_stats(&symbol());
        // cap = 100 * 0.5 = 50; ndv' = (min(400, 100) + 50) / 2 = 75; nulls' = 0.25
        assert_eq!(x.distinct_values_count, Estimate::Known(75.0));
        assert_eq!(x.nulls_fraction, Estimate::Known(0.25));
    }

    #[test]
    fn test_invariant_holds_after_one_pass() {
        let stats = stats_with(100.0, Estimate::Known(400.0), Estimate::Known(0.5));
        let normalized = normalize(stats, &[symbol()], &TypeMap::new());
        let x = normalized.symbol_stats(&symbol());
        let ndv = x.distinct_values_count.value().unwrap();
        let cap = 100.0 * (1.0 - x.nulls_fraction.value().unwrap());
        assert!(ndv <= cap);
    }

    #[test]
    fn test_idempotence() {
        let cases = vec![
            stats_with(100.0, Estimate::Known(400.0), Estimate::Known(0.5)),
            stats_with(100.0, Estimate::Known(20.0), Estimate::Known(0.1)),
            stats_with(0.0, Estimate::Known(5.0), Estimate::Unknown),
            stats_with(50.0, Estimate::Unknown, Estimate::Unknown),
        ];
        for stats in cases {
            let once = normalize(stats, &[symbol()], &TypeMap::new());
            let twice = normalize(once.clone(), &[symbol()], &TypeMap::new());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_unknown_fields_left_untouched() {
        let stats = stats_with(50.0, Estimate::Unknown, Estimate::Unknown);
        let normalized = normalize(stats, &[symbol()], &TypeMap::new());
        let x = normalized.symbol_stats(&symbol());
        assert!(x.distinct_values_count.is_unknown());
        assert!(x.nulls_fraction.is_unknown());
        assert_eq!(x.low_value, Estimate::Known(0.0));
    }
}
