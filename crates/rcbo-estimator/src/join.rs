//! Join output estimation
//!
//! Inner joins start from the cross product and apply each equi clause as
//! an equality predicate, combined with the multi-clause independence
//! damping. Outer joins add the complement of the preserved side with the
//! far side's columns all-null. Semi and anti joins filter the source by
//! the key-domain overlap with the filtering source.

use crate::comparison::estimate_comparison;
use crate::estimate::Estimate;
use crate::filter::{combine_conjunct_selectivities, FilterStatsCalculator};
use crate::node_stats::PlanNodeStatsEstimate;
use crate::symbol_stats::{StatisticRange, SymbolStatsEstimate};
use rcbo_common::{CostEstimatorConfig, Symbol};
use rcbo_plan::{BinaryOperator, EquiJoinClause, Expr, JoinType, TypeMap};

/// Smallest fraction of the source's distinct keys an anti join is
/// assumed to retain.
const ANTI_JOIN_MIN_RETAINED_NDV_FACTOR: f64 = 0.5;

pub struct JoinStatsCalculator<'a> {
    config: &'a CostEstimatorConfig,
    types: &'a TypeMap,
}

impl<'a> JoinStatsCalculator<'a> {
    pub fn new(config: &'a CostEstimatorConfig, types: &'a TypeMap) -> Self {
        Self { config, types }
    }

    pub fn join_stats(
        &self,
        join_type: JoinType,
        criteria: &[EquiJoinClause],
        filter: Option<&Expr>,
        left: &PlanNodeStatsEstimate,
        right: &PlanNodeStatsEstimate,
    ) -> PlanNodeStatsEstimate {
        if left.is_row_count_unknown() || right.is_row_count_unknown() {
            return PlanNodeStatsEstimate::unknown();
        }

        let cross = cross_join(left, right);
        let (mut inner, clause_selectivities) = self.apply_equi_clauses(&cross, criteria);
        if let Some(predicate) = filter {
            inner = FilterStatsCalculator::new(self.config, self.types)
                .filter_stats(&inner, predicate);
        }

        match join_type {
            JoinType::Inner => inner,
            JoinType::Left => {
                let complement =
                    self.join_complement(left, right, criteria, &clause_selectivities, false);
                add_outer_rows(&inner, &complement, right)
            }
            JoinType::Right => {
                let complement =
                    self.join_complement(right, left, criteria, &clause_selectivities, true);
                add_outer_rows(&inner, &complement, left)
            }
            JoinType::Full => {
                let left_complement =
                    self.join_complement(left, right, criteria, &clause_selectivities, false);
                let right_complement =
                    self.join_complement(right, left, criteria, &clause_selectivities, true);
                let with_left = add_outer_rows(&inner, &left_complement, right);
                add_outer_rows(&with_left, &right_complement, left)
            }
        }
    }

    /// Chain the clauses as equality predicates over the cross product,
    /// then discount the row count with the multi-clause independence
    /// factor. Returns the estimate and the per-clause step
    /// selectivities in clause order.
    fn apply_equi_clauses(
        &self,
        cross: &PlanNodeStatsEstimate,
        criteria: &[EquiJoinClause],
    ) -> (PlanNodeStatsEstimate, Vec<Estimate>) {
        if criteria.is_empty() {
            return (cross.clone(), Vec::new());
        }

        let mut current = cross.clone();
        let mut selectivities = Vec::with_capacity(criteria.len());
        for clause in criteria {
            let next = estimate_comparison(
                &current,
                &Expr::Column(clause.left.clone()),
                BinaryOperator::Eq,
                &Expr::Column(clause.right.clone()),
            );
            let selectivity = if current.output_row_count.is_exactly(0.0) {
                Estimate::Known(1.0)
            } else {
                (next.output_row_count / current.output_row_count).map(|s| s.clamp(0.0, 1.0))
            };
            selectivities.push(selectivity);
            current = next;
        }

        let combined = combine_conjunct_selectivities(
            &selectivities,
            self.config.join_multi_clause_independence_factor,
        );
        let cross_rows = cross.output_row_count;
        (
            current.map_row_count(|_| cross_rows * combined),
            selectivities,
        )
    }

    /// Rows of `outer` with no match in `other`: the null keys plus the
    /// non-null rows whose key value does not occur on the far side. The
    /// most selective clause drives the estimate.
    fn join_complement(
        &self,
        outer: &PlanNodeStatsEstimate,
        other: &PlanNodeStatsEstimate,
        criteria: &[EquiJoinClause],
        clause_selectivities: &[Estimate],
        swapped: bool,
    ) -> PlanNodeStatsEstimate {
        let outer_rows = outer.output_row_count;
        if criteria.is_empty() {
            // A cross join leaves nothing unmatched unless the far side
            // is empty.
            let rows = match other.output_row_count.value() {
                Some(far) if far == 0.0 => outer_rows,
                Some(_) => Estimate::zero(),
                None => Estimate::Unknown,
            };
            return outer.clone().map_row_count(|_| rows);
        }

        let driving = most_selective_clause(criteria, clause_selectivities);
        let clause = match driving {
            Some(clause) => clause,
            None => return outer.clone().map_row_count(|_| Estimate::Unknown),
        };
        let (outer_key, other_key) = if swapped {
            (&clause.right, &clause.left)
        } else {
            (&clause.left, &clause.right)
        };

        let outer_key_stats = outer.symbol_stats(outer_key);
        let other_key_stats = other.symbol_stats(other_key);
        let outer_range = StatisticRange::from_symbol_stats(&outer_key_stats);
        let other_range = StatisticRange::from_symbol_stats(&other_key_stats);
        let matched_ndv = outer_range.intersect(&other_range).ndv();
        let outer_ndv = outer_key_stats.distinct_values_count;

        let unmatched_ndv = (outer_ndv - matched_ndv).non_negative();
        let unmatched_fraction = if outer_ndv.is_exactly(0.0) {
            Estimate::zero()
        } else {
            unmatched_ndv / outer_ndv
        };
        let rows = outer_rows * outer_key_stats.nulls_fraction
            + outer_rows * outer_key_stats.values_fraction() * unmatched_fraction;

        let mut result = outer.clone().map_row_count(|_| rows);
        result.set_symbol_stats(
            outer_key.clone(),
            SymbolStatsEstimate {
                distinct_values_count: unmatched_ndv,
                ..outer_key_stats
            },
        );
        result
    }

    pub fn semi_join_stats(
        &self,
        source: &PlanNodeStatsEstimate,
        filtering_source: &PlanNodeStatsEstimate,
        source_key: &Symbol,
        filtering_key: &Symbol,
        negated: bool,
    ) -> PlanNodeStatsEstimate {
        if source.is_row_count_unknown() || filtering_source.is_row_count_unknown() {
            return PlanNodeStatsEstimate::unknown();
        }

        let source_stats = source.symbol_stats(source_key);
        let filtering_stats = filtering_source.symbol_stats(filtering_key);
        let source_range = StatisticRange::from_symbol_stats(&source_stats);
        let filtering_range = StatisticRange::from_symbol_stats(&filtering_stats);
        let intersection = source_range.intersect(&filtering_range);

        let source_ndv = source_stats.distinct_values_count;
        if source_ndv.is_exactly(0.0) {
            return source.clone().map_row_count(|_| Estimate::zero());
        }

        let (retained_ndv, key_stats) = if negated {
            let retained = (source_ndv - intersection.ndv())
                .non_negative()
                .max(source_ndv * ANTI_JOIN_MIN_RETAINED_NDV_FACTOR);
            let key_stats = SymbolStatsEstimate {
                distinct_values_count: retained,
                nulls_fraction: Estimate::zero(),
                ..source_stats.clone()
            };
            (retained, key_stats)
        } else {
            let key_stats = SymbolStatsEstimate {
                nulls_fraction: Estimate::zero(),
                ..source_stats.apply_range(&intersection)
            };
            (intersection.ndv(), key_stats)
        };

        let selectivity = source_stats.values_fraction() * (retained_ndv / source_ndv);
        let mut result = source.clone().map_row_count(|rows| rows * selectivity);
        result.set_symbol_stats(source_key.clone(), key_stats);
        result
    }
}

/// Cartesian product: row counts multiply, both sides' column statistics
/// carry over untouched.
fn cross_join(
    left: &PlanNodeStatsEstimate,
    right: &PlanNodeStatsEstimate,
) -> PlanNodeStatsEstimate {
    let mut result =
        PlanNodeStatsEstimate::with_row_count(left.output_row_count * right.output_row_count);
    for (symbol, stats) in left.symbol_statistics() {
        result.set_symbol_stats(symbol.clone(), stats.clone());
    }
    for (symbol, stats) in right.symbol_statistics() {
        result.set_symbol_stats(symbol.clone(), stats.clone());
    }
    result
}

fn most_selective_clause<'c>(
    criteria: &'c [EquiJoinClause],
    selectivities: &[Estimate],
) -> Option<&'c EquiJoinClause> {
    let mut best: Option<(&EquiJoinClause, f64)> = None;
    for (clause, selectivity) in criteria.iter().zip(selectivities) {
        if let Some(s) = selectivity.value() {
            if best.map_or(true, |(_, current)| s < current) {
                best = Some((clause, s));
            }
        }
    }
    best.map(|(clause, _)| clause)
}

/// Blend the matched rows with an unmatched complement whose far-side
/// columns are all null.
fn add_outer_rows(
    inner: &PlanNodeStatsEstimate,
    complement: &PlanNodeStatsEstimate,
    far_side: &PlanNodeStatsEstimate,
) -> PlanNodeStatsEstimate {
    let mut padded = complement.clone();
    for symbol in far_side.symbols() {
        padded.set_symbol_stats(symbol.clone(), SymbolStatsEstimate::zero());
    }
    crate::stats_math::add_stats(inner, &padded, crate::stats_math::RangeAddition::CollapseDistinct)
}
