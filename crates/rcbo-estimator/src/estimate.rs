//! Known/unknown numeric estimates
//!
//! Every statistic in the engine is either a known finite-or-infinite
//! number or explicitly unknown. Arithmetic propagates `Unknown` and maps
//! any degenerate result (NaN from `inf - inf`, `0/0`, ...) back to
//! `Unknown`, so no estimate computation can fail and no NaN can leak into
//! a comparison.

use std::ops::{Add, Div, Mul, Neg, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Estimate {
    Known(f64),
    #[default]
    Unknown,
}

impl Estimate {
    /// Wrap a raw value, absorbing NaN into `Unknown`.
    pub fn of(value: f64) -> Estimate {
        if value.is_nan() {
            Estimate::Unknown
        } else {
            Estimate::Known(value)
        }
    }

    pub fn zero() -> Estimate {
        Estimate::Known(0.0)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Estimate::Unknown)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Estimate::Known(v) => Some(*v),
            Estimate::Unknown => None,
        }
    }

    pub fn value_or(&self, default: f64) -> f64 {
        self.value().unwrap_or(default)
    }

    /// True when known and equal to `other` (unknowns never compare equal
    /// to a number).
    pub fn is_exactly(&self, other: f64) -> bool {
        matches!(self, Estimate::Known(v) if *v == other)
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Estimate {
        match self {
            Estimate::Known(v) => Estimate::of(f(v)),
            Estimate::Unknown => Estimate::Unknown,
        }
    }

    pub fn zip_with(self, other: Estimate, f: impl FnOnce(f64, f64) -> f64) -> Estimate {
        match (self, other) {
            (Estimate::Known(a), Estimate::Known(b)) => Estimate::of(f(a, b)),
            _ => Estimate::Unknown,
        }
    }

    pub fn min(self, other: Estimate) -> Estimate {
        self.zip_with(other, f64::min)
    }

    pub fn max(self, other: Estimate) -> Estimate {
        self.zip_with(other, f64::max)
    }

    /// Smaller of the known operands; an unknown side defers to the
    /// other instead of poisoning the result.
    pub fn min_known(self, other: Estimate) -> Estimate {
        match (self, other) {
            (Estimate::Known(a), Estimate::Known(b)) => Estimate::Known(a.min(b)),
            (Estimate::Known(a), Estimate::Unknown) => Estimate::Known(a),
            (Estimate::Unknown, other) => other,
        }
    }

    /// Larger of the known operands; an unknown side defers to the
    /// other.
    pub fn max_known(self, other: Estimate) -> Estimate {
        match (self, other) {
            (Estimate::Known(a), Estimate::Known(b)) => Estimate::Known(a.max(b)),
            (Estimate::Known(a), Estimate::Unknown) => Estimate::Known(a),
            (Estimate::Unknown, other) => other,
        }
    }

    /// Known values below zero are clamped; unknown stays unknown.
    pub fn non_negative(self) -> Estimate {
        self.map(|v| v.max(0.0))
    }
}

impl Add for Estimate {
    type Output = Estimate;

    fn add(self, rhs: Estimate) -> Estimate {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Sub for Estimate {
    type Output = Estimate;

    fn sub(self, rhs: Estimate) -> Estimate {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl Mul for Estimate {
    type Output = Estimate;

    fn mul(self, rhs: Estimate) -> Estimate {
        self.zip_with(rhs, |a, b| a * b)
    }
}

impl Mul<f64> for Estimate {
    type Output = Estimate;

    fn mul(self, rhs: f64) -> Estimate {
        self.map(|a| a * rhs)
    }
}

impl Div for Estimate {
    type Output = Estimate;

    fn div(self, rhs: Estimate) -> Estimate {
        self.zip_with(rhs, |a, b| a / b)
    }
}

impl Neg for Estimate {
    type Output = Estimate;

    fn neg(self) -> Estimate {
        self.map(|v| -v)
    }
}

impl std::fmt::Display for Estimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Estimate::Known(v) => write!(f, "{}", v),
            Estimate::Unknown => write!(f, "?"),
        }
    }
}
