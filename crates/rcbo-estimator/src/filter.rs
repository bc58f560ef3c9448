//! Filter predicate estimation
//!
//! Derives the statistics of a filter's output from its input estimate
//! and the predicate expression. Conjunctions are combined with a
//! configurable independence damping so that stacked correlated
//! predicates do not drive the row count to zero; everything else
//! decomposes into the comparison and scalar calculators.

use crate::comparison::{estimate_comparison, estimate_in_list, unknown_rows};
use crate::estimate::Estimate;
use crate::node_stats::PlanNodeStatsEstimate;
use crate::normalizer::normalize;
use crate::scalar::scalar_stats;
use crate::stats_math::{add_stats, cap_row_count, subtract_subset_stats, RangeAddition};
use crate::symbol_stats::SymbolStatsEstimate;
use rcbo_common::{CostEstimatorConfig, Symbol};
use rcbo_plan::{BinaryOperator, Expr, Literal, TypeMap, UnaryOperator};

pub struct FilterStatsCalculator<'a> {
    config: &'a CostEstimatorConfig,
    types: &'a TypeMap,
}

impl<'a> FilterStatsCalculator<'a> {
    pub fn new(config: &'a CostEstimatorConfig, types: &'a TypeMap) -> Self {
        Self { config, types }
    }

    pub fn filter_stats(
        &self,
        input: &PlanNodeStatsEstimate,
        predicate: &Expr,
    ) -> PlanNodeStatsEstimate {
        let result = self.estimate(input, predicate);
        let symbols: Vec<Symbol> = result.symbols().cloned().collect();
        normalize(result, &symbols, self.types)
    }

    fn estimate(&self, input: &PlanNodeStatsEstimate, predicate: &Expr) -> PlanNodeStatsEstimate {
        match predicate {
            Expr::Literal(Literal::Boolean(true)) => input.clone(),
            // A constant-false or constant-null predicate keeps nothing.
            Expr::Literal(Literal::Boolean(false)) | Expr::Literal(Literal::Null) => {
                input.clone().map_row_count(|_| Estimate::zero())
            }
            Expr::Column(_) => estimate_comparison(
                input,
                predicate,
                BinaryOperator::Eq,
                &Expr::Literal(Literal::Boolean(true)),
            ),
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And,
                right,
            } => {
                let mut conjuncts = Vec::new();
                flatten_conjuncts(left, &mut conjuncts);
                flatten_conjuncts(right, &mut conjuncts);
                self.estimate_and(input, &conjuncts)
            }
            Expr::BinaryOp {
                left,
                op: BinaryOperator::Or,
                right,
            } => self.estimate_or(input, left, right),
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => self.estimate_not(input, expr),
            Expr::IsNull(expr) => self.estimate_is_null(input, expr),
            Expr::IsNotNull(expr) => self.estimate_is_not_null(input, expr),
            Expr::Between { expr, low, high } => {
                let rewritten = Expr::BinaryOp {
                    left: Box::new(Expr::BinaryOp {
                        left: expr.clone(),
                        op: BinaryOperator::Gte,
                        right: low.clone(),
                    }),
                    op: BinaryOperator::And,
                    right: Box::new(Expr::BinaryOp {
                        left: expr.clone(),
                        op: BinaryOperator::Lte,
                        right: high.clone(),
                    }),
                };
                self.estimate(input, &rewritten)
            }
            Expr::InList { expr, list } => estimate_in_list(input, expr, list),
            Expr::BinaryOp { left, op, right } if op.is_comparison() => {
                estimate_comparison(input, left, *op, right)
            }
            _ => unknown_rows(input),
        }
    }

    /// Conjunction with damped independence.
    ///
    /// Column stats come from applying the conjuncts in sequence. The row
    /// count discounts repeated filtering: with per-conjunct
    /// selectivities sorted most selective first, the i-th one
    /// contributes `s_i ^ (factor ^ i)`. Factor 1 is full independence,
    /// factor 0 counts only the most selective conjunct.
    fn estimate_and(
        &self,
        input: &PlanNodeStatsEstimate,
        conjuncts: &[&Expr],
    ) -> PlanNodeStatsEstimate {
        let mut current = input.clone();
        let mut selectivities: Vec<Estimate> = Vec::with_capacity(conjuncts.len());
        for conjunct in conjuncts {
            let next = self.estimate(&current, conjunct);
            let selectivity = if current.output_row_count.is_exactly(0.0) {
                // An already-empty stream stays empty regardless of the
                // remaining conjuncts.
                Estimate::Known(1.0)
            } else if next.output_row_count.is_exactly(0.0) {
                // A step that keeps nothing is a zero even when the
                // running row count is unknown.
                Estimate::zero()
            } else {
                (next.output_row_count / current.output_row_count)
                    .map(|s| s.clamp(0.0, 1.0))
            };
            selectivities.push(selectivity);
            current = next;
        }

        let combined = combine_conjunct_selectivities(
            &selectivities,
            self.config.filter_conjunction_independence_factor,
        );
        if combined.is_exactly(0.0) {
            return current.map_row_count(|_| Estimate::zero());
        }
        let input_rows = input.output_row_count;
        current.map_row_count(|_| input_rows * combined)
    }

    fn estimate_or(
        &self,
        input: &PlanNodeStatsEstimate,
        left: &Expr,
        right: &Expr,
    ) -> PlanNodeStatsEstimate {
        let left_estimate = self.estimate(input, left);
        let right_estimate = self.estimate(input, right);
        if left_estimate.is_row_count_unknown() || right_estimate.is_row_count_unknown() {
            return unknown_rows(input);
        }
        // Branches may overlap: sum the estimates, dedupe per-column
        // ranges, and never exceed the input.
        let combined = add_stats(&left_estimate, &right_estimate, RangeAddition::CollapseDistinct);
        cap_row_count(combined, input.output_row_count)
    }

    fn estimate_not(&self, input: &PlanNodeStatsEstimate, inner: &Expr) -> PlanNodeStatsEstimate {
        match inner {
            // Exact rewrites, cheaper and tighter than the complement.
            Expr::IsNull(expr) => self.estimate_is_not_null(input, expr),
            Expr::IsNotNull(expr) => self.estimate_is_null(input, expr),
            Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr,
            } => self.estimate(input, expr),
            _ => {
                let inner_estimate = self.estimate(input, inner);
                if inner_estimate.is_row_count_unknown() {
                    return unknown_rows(input);
                }
                subtract_subset_stats(input, &inner_estimate)
            }
        }
    }

    fn estimate_is_null(&self, input: &PlanNodeStatsEstimate, expr: &Expr) -> PlanNodeStatsEstimate {
        let stats = scalar_stats(expr, input);
        let mut result = input
            .clone()
            .map_row_count(|rows| rows * stats.nulls_fraction);
        if let Expr::Column(symbol) = expr {
            result.set_symbol_stats(symbol.clone(), SymbolStatsEstimate::zero());
        }
        result
    }

    fn estimate_is_not_null(
        &self,
        input: &PlanNodeStatsEstimate,
        expr: &Expr,
    ) -> PlanNodeStatsEstimate {
        let stats = scalar_stats(expr, input);
        let mut result = input
            .clone()
            .map_row_count(|rows| rows * stats.values_fraction());
        if let Expr::Column(symbol) = expr {
            result.set_symbol_stats(
                symbol.clone(),
                SymbolStatsEstimate {
                    nulls_fraction: Estimate::zero(),
                    ..stats
                },
            );
        }
        result
    }
}

fn flatten_conjuncts<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            flatten_conjuncts(left, out);
            flatten_conjuncts(right, out);
        }
        other => out.push(other),
    }
}

pub(crate) fn combine_conjunct_selectivities(
    selectivities: &[Estimate],
    factor: f64,
) -> Estimate {
    // A conjunct that keeps nothing empties the whole conjunction, even
    // when sibling conjuncts are unestimable.
    if selectivities.iter().any(|s| s.is_exactly(0.0)) {
        return Estimate::zero();
    }
    let mut known = Vec::with_capacity(selectivities.len());
    for selectivity in selectivities {
        match selectivity.value() {
            Some(s) => known.push(s),
            None => return Estimate::Unknown,
        }
    }
    known.sort_by(|a, b| a.total_cmp(b));

    let mut combined = 1.0;
    let mut exponent = 1.0;
    for (i, s) in known.iter().enumerate() {
        if i == 0 {
            combined *= s;
        } else {
            exponent *= factor;
            combined *= s.powf(exponent);
        }
    }
    Estimate::of(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(low: f64, high: f64, ndv: f64, nulls: f64) -> SymbolStatsEstimate {
        SymbolStatsEstimate {
            low_value: Estimate::Known(low),
            high_value: Estimate::Known(high),
            distinct_values_count: Estimate::Known(ndv),
            nulls_fraction: Estimate::Known(nulls),
            average_row_size: Estimate::Known(8.0),
        }
    }

    fn input() -> PlanNodeStatsEstimate {
        let mut stats = PlanNodeStatsEstimate::with_row_count(Estimate::Known(1000.0));
        stats.set_symbol_stats(Symbol::new("x"), column(0.0, 100.0, 100.0, 0.0));
        stats.set_symbol_stats(Symbol::new("y"), column(0.0, 10.0, 10.0, 0.5));
        stats
    }

    fn config_with_factor(factor: f64) -> CostEstimatorConfig {
        CostEstimatorConfig {
            filter_conjunction_independence_factor: factor,
            ..CostEstimatorConfig::default()
        }
    }

    fn estimate_with_factor(predicate: &Expr, factor: f64) -> PlanNodeStatsEstimate {
        let config = config_with_factor(factor);
        let types = TypeMap::new();
        FilterStatsCalculator::new(&config, &types).filter_stats(&input(), predicate)
    }

    fn rows(stats: &PlanNodeStatsEstimate) -> f64 {
        stats.output_row_count.value().unwrap()
    }

    fn less_than(column: &str, value: i64) -> Expr {
        Expr::BinaryOp {
            left: Box::new(Expr::column(column)),
            op: BinaryOperator::Lt,
            right: Box::new(Expr::Literal(Literal::Int(value))),
        }
    }

    fn and(left: Expr, right: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(left),
            op: BinaryOperator::And,
            right: Box::new(right),
        }
    }

    #[test]
    fn test_constant_predicates() {
        assert_eq!(
            rows(&estimate_with_factor(&Expr::Literal(Literal::Boolean(true)), 0.75)),
            1000.0
        );
        assert_eq!(
            rows(&estimate_with_factor(&Expr::Literal(Literal::Boolean(false)), 0.75)),
            0.0
        );
        assert_eq!(rows(&estimate_with_factor(&Expr::Literal(Literal::Null), 0.75)), 0.0);
    }

    #[test]
    fn test_constant_false_zeroes_columns() {
        let result = estimate_with_factor(&Expr::Literal(Literal::Boolean(false)), 0.75);
        assert!(result.symbol_stats(&Symbol::new("x")).is_all_null());
    }

    #[test]
    fn test_and_factor_zero_keeps_most_selective_conjunct() {
        // x < 10 selects 0.1, x < 50 selects 0.5
        let predicate = and(less_than("x", 50), less_than("x", 10));
        let result = estimate_with_factor(&predicate, 0.0);
        // chained: second conjunct applies to the narrowed [0, 50) domain,
        // so its step selectivity is 10/50 = 0.2; most selective wins
        assert!((rows(&result) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_and_factor_one_is_full_independence() {
        let predicate = and(less_than("x", 50), less_than("x", 10));
        let result = estimate_with_factor(&predicate, 1.0);
        // 1000 * 0.5 * 0.2
        assert!((rows(&result) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_and_intermediate_factor_is_between_the_extremes() {
        let predicate = and(less_than("x", 50), less_than("y", 5));
        let independent = rows(&estimate_with_factor(&predicate, 1.0));
        let damped = rows(&estimate_with_factor(&predicate, 0.75));
        let most_selective_only = rows(&estimate_with_factor(&predicate, 0.0));
        assert!(independent < damped);
        assert!(damped < most_selective_only);
    }

    #[test]
    fn test_and_with_unknown_conjunct_is_unknown() {
        let opaque = Expr::Function {
            name: "f".into(),
            args: vec![Expr::column("x")],
        };
        let predicate = and(less_than("x", 50), opaque);
        assert!(estimate_with_factor(&predicate, 0.75).is_row_count_unknown());
    }

    #[test]
    fn test_and_with_false_conjunct_is_empty_in_any_order() {
        let opaque = Expr::Function {
            name: "f".into(),
            args: vec![Expr::column("x")],
        };
        let false_first = and(Expr::Literal(Literal::Boolean(false)), opaque.clone());
        let false_last = and(opaque, Expr::Literal(Literal::Boolean(false)));
        assert!(estimate_with_factor(&false_first, 0.75)
            .output_row_count
            .is_exactly(0.0));
        assert!(estimate_with_factor(&false_last, 0.75)
            .output_row_count
            .is_exactly(0.0));
    }

    #[test]
    fn test_or_of_disjoint_ranges_sums() {
        let low = and(less_than("x", 10), Expr::Literal(Literal::Boolean(true)));
        let predicate = Expr::BinaryOp {
            left: Box::new(low),
            op: BinaryOperator::Or,
            right: Box::new(Expr::BinaryOp {
                left: Box::new(Expr::column("x")),
                op: BinaryOperator::Gt,
                right: Box::new(Expr::Literal(Literal::Int(90))),
            }),
        };
        let result = estimate_with_factor(&predicate, 0.75);
        // 100 + 100
        assert!((rows(&result) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_or_never_exceeds_input() {
        let predicate = Expr::BinaryOp {
            left: Box::new(less_than("x", 99)),
            op: BinaryOperator::Or,
            right: Box::new(less_than("x", 95)),
        };
        assert!(rows(&estimate_with_factor(&predicate, 0.75)) <= 1000.0);
    }

    #[test]
    fn test_is_null_and_is_not_null() {
        let is_null = Expr::IsNull(Box::new(Expr::column("y")));
        let result = estimate_with_factor(&is_null, 0.75);
        assert_eq!(rows(&result), 500.0);
        assert!(result.symbol_stats(&Symbol::new("y")).is_all_null());

        let is_not_null = Expr::IsNotNull(Box::new(Expr::column("y")));
        let result = estimate_with_factor(&is_not_null, 0.75);
        assert_eq!(rows(&result), 500.0);
        assert_eq!(
            result.symbol_stats(&Symbol::new("y")).nulls_fraction,
            Estimate::zero()
        );
    }

    #[test]
    fn test_not_is_null_rewrites_to_is_not_null() {
        let negated = Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr: Box::new(Expr::IsNull(Box::new(Expr::column("y")))),
        };
        let direct = Expr::IsNotNull(Box::new(Expr::column("y")));
        assert_eq!(
            estimate_with_factor(&negated, 0.75),
            estimate_with_factor(&direct, 0.75)
        );
    }

    #[test]
    fn test_not_comparison_is_the_complement() {
        let negated = Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr: Box::new(less_than("x", 25)),
        };
        let result = estimate_with_factor(&negated, 0.75);
        // complement of 250 selected rows
        assert!((rows(&result) - 750.0).abs() < 1e-9);
    }

    #[test]
    fn test_between_narrows_both_bounds() {
        let predicate = Expr::Between {
            expr: Box::new(Expr::column("x")),
            low: Box::new(Expr::Literal(Literal::Int(20))),
            high: Box::new(Expr::Literal(Literal::Int(40))),
        };
        let result = estimate_with_factor(&predicate, 1.0);
        let x = result.symbol_stats(&Symbol::new("x"));
        assert_eq!(x.low_value, Estimate::Known(20.0));
        assert_eq!(x.high_value, Estimate::Known(40.0));
        // 0.8 of the range survives the first bound, 0.25 of that the second
        assert!((rows(&result) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_unsupported_predicate_keeps_column_stats() {
        let opaque = Expr::Function {
            name: "f".into(),
            args: vec![Expr::column("x")],
        };
        let result = estimate_with_factor(&opaque, 0.75);
        assert!(result.is_row_count_unknown());
        assert_eq!(result.symbol_stats(&Symbol::new("x")), column(0.0, 100.0, 100.0, 0.0));
    }
}
