//! Scalar expression statistics
//!
//! Estimates a `SymbolStatsEstimate` for a scalar expression evaluated
//! over a row source. Used by projection and by the filter calculator
//! when a comparison side is not a bare column. Unsupported shapes
//! resolve to the unknown estimate, never an error.

use crate::estimate::Estimate;
use crate::node_stats::PlanNodeStatsEstimate;
use crate::symbol_stats::{StatisticRange, SymbolStatsEstimate};
use arrow_schema::DataType;
use rcbo_plan::{BinaryOperator, Expr, Literal, UnaryOperator};

/// Statistics of `expr` evaluated against rows described by `input`.
pub fn scalar_stats(expr: &Expr, input: &PlanNodeStatsEstimate) -> SymbolStatsEstimate {
    match expr {
        Expr::Column(symbol) => input.symbol_stats(symbol),
        Expr::Literal(literal) => literal_stats(literal),
        Expr::Cast { expr, data_type } => {
            let source = scalar_stats(expr, input);
            cast_stats(source, data_type)
        }
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => negate_stats(scalar_stats(expr, input)),
        Expr::UnaryOp {
            op: UnaryOperator::Plus,
            expr,
        } => scalar_stats(expr, input),
        Expr::BinaryOp { left, op, right } if op.is_arithmetic() => {
            let left_stats = scalar_stats(left, input);
            let right_stats = scalar_stats(right, input);
            arithmetic_stats(&left_stats, *op, &right_stats, input.output_row_count)
        }
        Expr::Coalesce(args) => {
            let mut stats: Option<SymbolStatsEstimate> = None;
            for arg in args {
                let arg_stats = scalar_stats(arg, input);
                stats = Some(match stats {
                    None => arg_stats,
                    Some(acc) => coalesce_stats(&acc, &arg_stats, input.output_row_count),
                });
            }
            stats.unwrap_or_else(SymbolStatsEstimate::unknown)
        }
        // Boolean connectives, comparisons, opaque calls: no scalar
        // estimate.
        _ => SymbolStatsEstimate::unknown(),
    }
}

fn literal_stats(literal: &Literal) -> SymbolStatsEstimate {
    match literal {
        Literal::Null => SymbolStatsEstimate::zero(),
        Literal::String(s) => SymbolStatsEstimate {
            low_value: Estimate::Unknown,
            high_value: Estimate::Unknown,
            distinct_values_count: Estimate::Known(1.0),
            nulls_fraction: Estimate::zero(),
            average_row_size: Estimate::Known(s.len() as f64),
        },
        other => match other.as_f64() {
            Some(value) => SymbolStatsEstimate {
                low_value: Estimate::Known(value),
                high_value: Estimate::Known(value),
                distinct_values_count: Estimate::Known(1.0),
                nulls_fraction: Estimate::zero(),
                average_row_size: Estimate::Unknown,
            },
            None => SymbolStatsEstimate::unknown(),
        },
    }
}

fn negate_stats(stats: SymbolStatsEstimate) -> SymbolStatsEstimate {
    SymbolStatsEstimate {
        low_value: -stats.high_value,
        high_value: -stats.low_value,
        ..stats
    }
}

/// Representable range of an integer target type.
fn integer_type_range(data_type: &DataType) -> Option<(f64, f64)> {
    match data_type {
        DataType::Int8 => Some((i8::MIN as f64, i8::MAX as f64)),
        DataType::Int16 => Some((i16::MIN as f64, i16::MAX as f64)),
        DataType::Int32 => Some((i32::MIN as f64, i32::MAX as f64)),
        DataType::Int64 => Some((i64::MIN as f64, i64::MAX as f64)),
        DataType::UInt8 => Some((0.0, u8::MAX as f64)),
        DataType::UInt16 => Some((0.0, u16::MAX as f64)),
        DataType::UInt32 => Some((0.0, u32::MAX as f64)),
        DataType::UInt64 => Some((0.0, u64::MAX as f64)),
        _ => None,
    }
}

fn is_numeric(data_type: &DataType) -> bool {
    data_type.is_numeric()
}

fn cast_stats(source: SymbolStatsEstimate, target: &DataType) -> SymbolStatsEstimate {
    if let Some((type_low, type_high)) = integer_type_range(target) {
        let low = source.low_value.map(|v| v.max(type_low).ceil());
        let high = source.high_value.map(|v| v.min(type_high).floor());
        let mut ndv = source.distinct_values_count;
        // Discretize: the intersection holds at most one distinct value
        // per representable integer.
        if let (Some(low), Some(high)) = (low.value(), high.value()) {
            if low > high {
                return SymbolStatsEstimate {
                    low_value: Estimate::Unknown,
                    high_value: Estimate::Unknown,
                    distinct_values_count: Estimate::zero(),
                    ..source
                };
            }
            if low.is_finite() && high.is_finite() {
                let representable = high - low + 1.0;
                ndv = ndv.min(Estimate::Known(representable));
            }
        }
        return SymbolStatsEstimate {
            low_value: low,
            high_value: high,
            distinct_values_count: ndv,
            ..source
        };
    }
    if is_numeric(target) {
        return source;
    }
    // Non-orderable target: the range loses meaning, NDV and nulls carry
    // over.
    SymbolStatsEstimate {
        low_value: Estimate::Unknown,
        high_value: Estimate::Unknown,
        ..source
    }
}

fn arithmetic_stats(
    left: &SymbolStatsEstimate,
    op: BinaryOperator,
    right: &SymbolStatsEstimate,
    row_count: Estimate,
) -> SymbolStatsEstimate {
    if left.is_all_null() || right.is_all_null() {
        return SymbolStatsEstimate::zero();
    }

    let nulls_fraction =
        (Estimate::Known(1.0) - left.values_fraction() * right.values_fraction())
            .map(|f| f.clamp(0.0, 1.0));

    let mut ndv = left.distinct_values_count * right.distinct_values_count;
    if !row_count.is_unknown() {
        ndv = ndv.min(row_count);
    }

    let (low, high) = arithmetic_range(left, op, right);

    SymbolStatsEstimate {
        low_value: low,
        high_value: high,
        distinct_values_count: ndv,
        nulls_fraction,
        average_row_size: left.average_row_size.max(right.average_row_size),
    }
}

fn arithmetic_range(
    left: &SymbolStatsEstimate,
    op: BinaryOperator,
    right: &SymbolStatsEstimate,
) -> (Estimate, Estimate) {
    let (ll, lh) = (left.low_value, left.high_value);
    let (rl, rh) = (right.low_value, right.high_value);

    match op {
        BinaryOperator::Plus => (ll + rl, lh + rh),
        BinaryOperator::Minus => (ll - rh, lh - rl),
        BinaryOperator::Multiply => endpoint_combinations(&[ll * rl, ll * rh, lh * rl, lh * rh]),
        BinaryOperator::Divide => {
            // A divisor range spanning zero makes the quotient unbounded.
            if let (Some(low), Some(high)) = (rl.value(), rh.value()) {
                if low <= 0.0 && high >= 0.0 {
                    return (
                        Estimate::Known(f64::NEG_INFINITY),
                        Estimate::Known(f64::INFINITY),
                    );
                }
            }
            endpoint_combinations(&[ll / rl, ll / rh, lh / rl, lh / rh])
        }
        BinaryOperator::Modulo => {
            let magnitude = rl.map(f64::abs).max(rh.map(f64::abs));
            let low = ll.max(-magnitude);
            let high = lh.min(magnitude);
            match (low.value(), high.value()) {
                (Some(l), Some(h)) if l <= h => (low, high),
                _ => (Estimate::Unknown, Estimate::Unknown),
            }
        }
        _ => (Estimate::Unknown, Estimate::Unknown),
    }
}

fn endpoint_combinations(candidates: &[Estimate]) -> (Estimate, Estimate) {
    let mut low = candidates[0];
    let mut high = candidates[0];
    for candidate in &candidates[1..] {
        low = low.min(*candidate);
        high = high.max(*candidate);
    }
    (low, high)
}

fn coalesce_stats(
    left: &SymbolStatsEstimate,
    right: &SymbolStatsEstimate,
    row_count: Estimate,
) -> SymbolStatsEstimate {
    let left_range = StatisticRange::from_symbol_stats(left);
    let right_range = StatisticRange::from_symbol_stats(right);
    let combined = left_range.add_and_sum_distinct_values(&right_range);

    let mut ndv = combined.ndv();
    if !row_count.is_unknown() {
        ndv = ndv.min(row_count);
    }

    let range_known = !left.is_range_empty() && !right.is_range_empty();
    let (low, high) = if range_known {
        match combined.bounds() {
            Some((low, high)) => (Estimate::Known(low), Estimate::Known(high)),
            None => (Estimate::Unknown, Estimate::Unknown),
        }
    } else {
        (Estimate::Unknown, Estimate::Unknown)
    };

    SymbolStatsEstimate {
        low_value: low,
        high_value: high,
        distinct_values_count: ndv,
        nulls_fraction: left.nulls_fraction * right.nulls_fraction,
        average_row_size: left.average_row_size.max(right.average_row_size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcbo_common::Symbol;

    fn input_with(symbol: &str, stats: SymbolStatsEstimate) -> PlanNodeStatsEstimate {
        let mut input = PlanNodeStatsEstimate::with_row_count(Estimate::Known(1000.0));
        input.set_symbol_stats(Symbol::new(symbol), stats);
        input
    }

    fn column_stats(low: f64, high: f64, ndv: f64, nulls: f64) -> SymbolStatsEstimate {
        SymbolStatsEstimate {
            low_value: Estimate::Known(low),
            high_value: Estimate::Known(high),
            distinct_values_count: Estimate::Known(ndv),
            nulls_fraction: Estimate::Known(nulls),
            average_row_size: Estimate::Known(8.0),
        }
    }

    #[test]
    fn test_numeric_literal() {
        let input = PlanNodeStatsEstimate::unknown();
        let stats = scalar_stats(&Expr::Literal(Literal::Int(42)), &input);
        assert_eq!(stats.low_value, Estimate::Known(42.0));
        assert_eq!(stats.high_value, Estimate::Known(42.0));
        assert_eq!(stats.distinct_values_count, Estimate::Known(1.0));
        assert_eq!(stats.nulls_fraction, Estimate::zero());
    }

    #[test]
    fn test_string_literal_has_ndv_but_no_range() {
        let input = PlanNodeStatsEstimate::unknown();
        let stats = scalar_stats(&Expr::Literal(Literal::String("abc".into())), &input);
        assert_eq!(stats.distinct_values_count, Estimate::Known(1.0));
        assert!(stats.is_range_empty());
        assert_eq!(stats.average_row_size, Estimate::Known(3.0));
    }

    #[test]
    fn test_null_literal_is_all_null() {
        let stats =
            scalar_stats(&Expr::Literal(Literal::Null), &PlanNodeStatsEstimate::unknown());
        assert!(stats.is_all_null());
    }

    #[test]
    fn test_column_lookup_is_verbatim() {
        let stats = column_stats(0.0, 10.0, 5.0, 0.1);
        let input = input_with("a", stats.clone());
        assert_eq!(scalar_stats(&Expr::column("a"), &input), stats);
        assert!(scalar_stats(&Expr::column("missing"), &input).is_unknown());
    }

    #[test]
    fn test_addition_interval() {
        let mut input = input_with("a", column_stats(0.0, 10.0, 10.0, 0.0));
        input.set_symbol_stats(Symbol::new("b"), column_stats(-5.0, 5.0, 4.0, 0.5));
        let expr = Expr::BinaryOp {
            left: Box::new(Expr::column("a")),
            op: BinaryOperator::Plus,
            right: Box::new(Expr::column("b")),
        };
        let stats = scalar_stats(&expr, &input);
        assert_eq!(stats.low_value, Estimate::Known(-5.0));
        assert_eq!(stats.high_value, Estimate::Known(15.0));
        assert_eq!(stats.distinct_values_count, Estimate::Known(40.0));
        assert_eq!(stats.nulls_fraction, Estimate::Known(0.5));
    }

    #[test]
    fn test_division_by_range_spanning_zero_is_unbounded() {
        let mut input = input_with("a", column_stats(1.0, 10.0, 10.0, 0.0));
        input.set_symbol_stats(Symbol::new("b"), column_stats(-1.0, 1.0, 3.0, 0.0));
        let expr = Expr::BinaryOp {
            left: Box::new(Expr::column("a")),
            op: BinaryOperator::Divide,
            right: Box::new(Expr::column("b")),
        };
        let stats = scalar_stats(&expr, &input);
        assert_eq!(stats.low_value, Estimate::Known(f64::NEG_INFINITY));
        assert_eq!(stats.high_value, Estimate::Known(f64::INFINITY));
    }

    #[test]
    fn test_all_null_operand_forces_all_null_result() {
        let mut input = input_with("a", column_stats(0.0, 10.0, 10.0, 0.0));
        input.set_symbol_stats(Symbol::new("b"), SymbolStatsEstimate::zero());
        let expr = Expr::BinaryOp {
            left: Box::new(Expr::column("a")),
            op: BinaryOperator::Multiply,
            right: Box::new(Expr::column("b")),
        };
        assert!(scalar_stats(&expr, &input).is_all_null());
    }

    #[test]
    fn test_narrowing_cast_clamps_and_discretizes() {
        let input = input_with("a", column_stats(-1000.0, 1000.0, 500.0, 0.0));
        let expr = Expr::Cast {
            expr: Box::new(Expr::column("a")),
            data_type: DataType::Int8,
        };
        let stats = scalar_stats(&expr, &input);
        assert_eq!(stats.low_value, Estimate::Known(-128.0));
        assert_eq!(stats.high_value, Estimate::Known(127.0));
        assert_eq!(stats.distinct_values_count, Estimate::Known(256.0));
    }

    #[test]
    fn test_coalesce() {
        let mut input = input_with("a", column_stats(0.0, 10.0, 5.0, 0.5));
        input.set_symbol_stats(Symbol::new("b"), column_stats(20.0, 30.0, 7.0, 0.2));
        let expr = Expr::Coalesce(vec![Expr::column("a"), Expr::column("b")]);
        let stats = scalar_stats(&expr, &input);
        assert_eq!(stats.low_value, Estimate::Known(0.0));
        assert_eq!(stats.high_value, Estimate::Known(30.0));
        assert_eq!(stats.distinct_values_count, Estimate::Known(12.0));
        assert_eq!(stats.nulls_fraction, Estimate::Known(0.1));
    }

    #[test]
    fn test_opaque_function_is_unknown() {
        let expr = Expr::Function {
            name: "custom_udf".into(),
            args: vec![Expr::column("a")],
        };
        assert!(scalar_stats(&expr, &PlanNodeStatsEstimate::unknown()).is_unknown());
    }
}
