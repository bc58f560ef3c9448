//! Per-node statistics
//!
//! A `PlanNodeStatsEstimate` is an immutable snapshot: estimated output
//! row count plus per-column statistics. Columns absent from the map are
//! implicitly unknown.

use crate::estimate::Estimate;
use crate::symbol_stats::SymbolStatsEstimate;
use arrow_schema::DataType;
use rcbo_common::Symbol;
use rcbo_plan::TypeMap;
use std::collections::HashMap;

/// One bookkeeping byte per value for the null flag.
pub const IS_NULL_OVERHEAD_BYTES: f64 = 1.0;

/// Statistics for a plan node
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanNodeStatsEstimate {
    /// `Known(0)` is a fully-known empty result, distinct from `Unknown`.
    pub output_row_count: Estimate,
    symbol_statistics: HashMap<Symbol, SymbolStatsEstimate>,
}

impl PlanNodeStatsEstimate {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn with_row_count(row_count: Estimate) -> Self {
        Self {
            output_row_count: row_count,
            symbol_statistics: HashMap::new(),
        }
    }

    /// Column estimate, `unknown()` when absent.
    pub fn symbol_stats(&self, symbol: &Symbol) -> SymbolStatsEstimate {
        self.symbol_statistics
            .get(symbol)
            .cloned()
            .unwrap_or_else(SymbolStatsEstimate::unknown)
    }

    pub fn set_symbol_stats(&mut self, symbol: Symbol, stats: SymbolStatsEstimate) {
        self.symbol_statistics.insert(symbol, stats);
    }

    pub fn add_symbol_stats(mut self, symbol: Symbol, stats: SymbolStatsEstimate) -> Self {
        self.symbol_statistics.insert(symbol, stats);
        self
    }

    pub fn remove_symbol_stats(&mut self, symbol: &Symbol) {
        self.symbol_statistics.remove(symbol);
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbol_statistics.keys()
    }

    pub fn symbol_statistics(&self) -> &HashMap<Symbol, SymbolStatsEstimate> {
        &self.symbol_statistics
    }

    pub fn map_row_count(mut self, f: impl FnOnce(Estimate) -> Estimate) -> Self {
        self.output_row_count = f(self.output_row_count);
        self
    }

    pub fn is_row_count_unknown(&self) -> bool {
        self.output_row_count.is_unknown()
    }

    /// Estimated width of one output row over `symbols`, in bytes.
    ///
    /// Uses the column's `average_row_size` when known, otherwise the
    /// type's fixed width, plus one null-flag byte per column. A column
    /// with neither a size estimate nor a type makes the width unknown.
    pub fn output_row_size(&self, symbols: &[Symbol], types: &TypeMap) -> Estimate {
        let mut width = Estimate::zero();
        for symbol in symbols {
            let stats = self.symbol_stats(symbol);
            let data_size = match stats.average_row_size {
                Estimate::Known(size) => Estimate::Known(size),
                Estimate::Unknown => match types.get(symbol) {
                    Some(data_type) => Estimate::Known(default_data_size(data_type)),
                    None => Estimate::Unknown,
                },
            };
            width = width + data_size + Estimate::Known(IS_NULL_OVERHEAD_BYTES);
        }
        width
    }

    /// Total output size over `symbols`: rows times row width.
    pub fn output_size_in_bytes(&self, symbols: &[Symbol], types: &TypeMap) -> Estimate {
        self.output_row_count * self.output_row_size(symbols, types)
    }
}

/// Assumed width in bytes for a value of the given type when no measured
/// average size is available.
pub fn default_data_size(data_type: &DataType) -> f64 {
    match data_type {
        DataType::Boolean | DataType::Int8 | DataType::UInt8 => 1.0,
        DataType::Int16 | DataType::UInt16 => 2.0,
        DataType::Int32 | DataType::UInt32 | DataType::Float32 | DataType::Date32 => 4.0,
        DataType::Int64
        | DataType::UInt64
        | DataType::Float64
        | DataType::Date64
        | DataType::Timestamp(_, _)
        | DataType::Time64(_)
        | DataType::Duration(_) => 8.0,
        DataType::Decimal128(_, _) => 16.0,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Binary | DataType::LargeBinary => 16.0,
        _ => 8.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_symbol_is_unknown() {
        let stats = PlanNodeStatsEstimate::with_row_count(Estimate::Known(10.0));
        assert!(stats.symbol_stats(&Symbol::new("missing")).is_unknown());
    }

    #[test]
    fn test_output_size_uses_average_row_size() {
        let symbol = Symbol::new("x");
        let mut stats = PlanNodeStatsEstimate::with_row_count(Estimate::Known(100.0));
        stats.set_symbol_stats(
            symbol.clone(),
            SymbolStatsEstimate {
                average_row_size: Estimate::Known(7.0),
                ..SymbolStatsEstimate::unknown()
            },
        );
        let size = stats.output_size_in_bytes(&[symbol], &TypeMap::new());
        assert_eq!(size, Estimate::Known(100.0 * (7.0 + IS_NULL_OVERHEAD_BYTES)));
    }

    #[test]
    fn test_output_size_falls_back_to_type_width() {
        let symbol = Symbol::new("x");
        let stats = PlanNodeStatsEstimate::with_row_count(Estimate::Known(10.0));
        let mut types = TypeMap::new();
        types.insert(symbol.clone(), DataType::Int64);
        let size = stats.output_size_in_bytes(&[symbol], &types);
        assert_eq!(size, Estimate::Known(10.0 * (8.0 + IS_NULL_OVERHEAD_BYTES)));
    }

    #[test]
    fn test_output_size_unknown_without_size_or_type() {
        let symbol = Symbol::new("x");
        let stats = PlanNodeStatsEstimate::with_row_count(Estimate::Known(10.0));
        assert!(stats
            .output_size_in_bytes(&[symbol], &TypeMap::new())
            .is_unknown());
    }
}
