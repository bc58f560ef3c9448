//! Per-column statistics
//!
//! `SymbolStatsEstimate` is the distributional estimate for one output
//! column of a plan node. `StatisticRange` is the working form used by the
//! comparison and join calculus: a possibly-unbounded interval carrying a
//! distinct-values estimate, with an `Empty` case for domains known to
//! hold no values.

use crate::estimate::Estimate;

/// Statistics for a single column
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SymbolStatsEstimate {
    /// Lower bound of the domain; `Known(-inf)` is open-ended,
    /// `Unknown` means no range information.
    pub low_value: Estimate,
    /// Upper bound of the domain.
    pub high_value: Estimate,
    /// Estimated number of distinct non-null values.
    pub distinct_values_count: Estimate,
    /// Fraction of rows that are null, in `[0, 1]`.
    pub nulls_fraction: Estimate,
    /// Average size of one value in bytes.
    pub average_row_size: Estimate,
}

impl SymbolStatsEstimate {
    /// The identity estimate: nothing is known about the column.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// The canonical all-null / empty-input estimate.
    pub fn zero() -> Self {
        Self {
            low_value: Estimate::Unknown,
            high_value: Estimate::Unknown,
            distinct_values_count: Estimate::zero(),
            nulls_fraction: Estimate::Known(1.0),
            average_row_size: Estimate::Unknown,
        }
    }

    /// Estimate with a known closed range. Bounds must be ordered; an
    /// inverted range is a programmer error, not a statistic.
    pub fn with_range(low: f64, high: f64) -> Self {
        assert!(low <= high, "inverted range: [{}, {}]", low, high);
        Self {
            low_value: Estimate::Known(low),
            high_value: Estimate::Known(high),
            ..Self::default()
        }
    }

    pub fn values_fraction(&self) -> Estimate {
        (Estimate::Known(1.0) - self.nulls_fraction).non_negative()
    }

    pub fn is_range_empty(&self) -> bool {
        self.low_value.is_unknown() && self.high_value.is_unknown()
    }

    pub fn is_unknown(&self) -> bool {
        self == &Self::unknown()
    }

    /// Whether the column is the canonical all-null estimate.
    pub fn is_all_null(&self) -> bool {
        self.distinct_values_count.is_exactly(0.0) && self.nulls_fraction.is_exactly(1.0)
    }

    /// True when the domain is a single known value.
    pub fn is_single_value(&self) -> bool {
        match (self.low_value.value(), self.high_value.value()) {
            (Some(low), Some(high)) => low == high && low.is_finite(),
            _ => false,
        }
    }

    /// Replace range and NDV from a computed `StatisticRange`.
    pub fn apply_range(&self, range: &StatisticRange) -> Self {
        let mut result = self.clone();
        match range {
            StatisticRange::Empty => {
                result.low_value = Estimate::Unknown;
                result.high_value = Estimate::Unknown;
                result.distinct_values_count = Estimate::zero();
            }
            StatisticRange::Bounded { low, high, ndv } => {
                result.low_value = Estimate::Known(*low);
                result.high_value = Estimate::Known(*high);
                result.distinct_values_count = *ndv;
            }
        }
        result
    }
}

/// Overlap fraction used when one side of a comparison is unbounded and
/// the intersection is still unbounded.
pub(crate) const UNBOUNDED_OVERLAP_FACTOR: f64 = 0.5;
/// Overlap fraction when an unbounded domain is cut down to a finite
/// intersection.
pub(crate) const UNBOUNDED_TO_FINITE_OVERLAP_FACTOR: f64 = 0.25;

/// An interval of the value domain with a distinct-values estimate
#[derive(Debug, Clone, PartialEq)]
pub enum StatisticRange {
    /// Known to contain no values
    Empty,
    /// `low <= high`; either bound may be infinite
    Bounded { low: f64, high: f64, ndv: Estimate },
}

impl StatisticRange {
    pub fn new(low: f64, high: f64, ndv: Estimate) -> Self {
        assert!(
            !low.is_nan() && !high.is_nan() && low <= high,
            "inverted range: [{}, {}]",
            low,
            high
        );
        StatisticRange::Bounded { low, high, ndv }
    }

    pub fn point(value: f64) -> Self {
        Self::new(value, value, Estimate::Known(1.0))
    }

    pub fn unbounded(ndv: Estimate) -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY, ndv)
    }

    pub fn from_symbol_stats(stats: &SymbolStatsEstimate) -> Self {
        if stats.distinct_values_count.is_exactly(0.0) {
            return StatisticRange::Empty;
        }
        StatisticRange::Bounded {
            low: stats.low_value.value_or(f64::NEG_INFINITY),
            high: stats.high_value.value_or(f64::INFINITY),
            ndv: stats.distinct_values_count,
        }
    }

    pub fn ndv(&self) -> Estimate {
        match self {
            StatisticRange::Empty => Estimate::zero(),
            StatisticRange::Bounded { ndv, .. } => *ndv,
        }
    }

    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            StatisticRange::Empty => None,
            StatisticRange::Bounded { low, high, .. } => Some((*low, *high)),
        }
    }

    /// Fraction of this range's values expected to fall within `other`.
    ///
    /// Disjoint ranges give 0, full containment gives 1, finite partial
    /// overlap is the length ratio, and unbounded cases fall back to the
    /// fixed heuristic factors.
    pub fn overlap_percent_with(&self, other: &StatisticRange) -> Estimate {
        let ((self_low, self_high), (other_low, other_high)) =
            match (self.bounds(), other.bounds()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Estimate::zero(),
            };

        if other_low <= self_low && self_high <= other_high {
            return Estimate::Known(1.0);
        }

        let low = self_low.max(other_low);
        let high = self_high.min(other_high);
        if low > high {
            return Estimate::zero();
        }

        let self_length = self_high - self_low;
        let overlap_length = high - low;
        if self_length.is_infinite() {
            if overlap_length.is_infinite() {
                return Estimate::Known(UNBOUNDED_OVERLAP_FACTOR);
            }
            return Estimate::Known(UNBOUNDED_TO_FINITE_OVERLAP_FACTOR);
        }
        // Both finite; 0/0 (touching point ranges) resolves to Unknown.
        Estimate::of(overlap_length / self_length)
    }

    /// Intersection, with the NDV scaled down by each side's overlap.
    pub fn intersect(&self, other: &StatisticRange) -> StatisticRange {
        let ((self_low, self_high), (other_low, other_high)) =
            match (self.bounds(), other.bounds()) {
                (Some(a), Some(b)) => (a, b),
                _ => return StatisticRange::Empty,
            };

        let low = self_low.max(other_low);
        let high = self_high.min(other_high);
        if low > high {
            return StatisticRange::Empty;
        }

        let result = StatisticRange::Bounded {
            low,
            high,
            ndv: Estimate::Unknown,
        };
        let ndv = Estimate::min_known(
            self.ndv() * self.overlap_percent_with(&result),
            other.ndv() * other.overlap_percent_with(&result),
        );
        StatisticRange::Bounded { low, high, ndv }
    }

    fn spanned_bounds(&self, other: &StatisticRange) -> Option<(f64, f64)> {
        match (self.bounds(), other.bounds()) {
            (Some((al, ah)), Some((bl, bh))) => Some((al.min(bl), ah.max(bh))),
            (Some(b), None) | (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    fn add_with_ndv(&self, other: &StatisticRange, ndv: Estimate) -> StatisticRange {
        match self.spanned_bounds(other) {
            None => StatisticRange::Empty,
            Some((low, high)) => StatisticRange::Bounded { low, high, ndv },
        }
    }

    /// Union assuming the two ranges contribute disjoint sets of values.
    pub fn add_and_sum_distinct_values(&self, other: &StatisticRange) -> StatisticRange {
        self.add_with_ndv(other, self.ndv() + other.ndv())
    }

    /// Union assuming one range's values contain the other's.
    pub fn add_and_max_distinct_values(&self, other: &StatisticRange) -> StatisticRange {
        self.add_with_ndv(other, self.ndv().max(other.ndv()))
    }

    /// Union that deduplicates when the ranges overlap: overlapping ranges
    /// keep the larger NDV, disjoint ranges sum.
    pub fn add_and_collapse_distinct_values(&self, other: &StatisticRange) -> StatisticRange {
        let overlaps = !matches!(self.intersect(other), StatisticRange::Empty);
        if overlaps {
            self.add_and_max_distinct_values(other)
        } else {
            self.add_and_sum_distinct_values(other)
        }
    }
}
