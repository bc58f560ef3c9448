//! Scalar expressions interpreted by the estimator

use arrow_schema::DataType;
use rcbo_common::Symbol;
use serde::{Deserialize, Serialize};

/// Expression node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Expr {
    /// Column reference
    Column(Symbol),

    /// Literal value
    Literal(Literal),

    /// Binary operation
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Unary operation
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },

    /// IS NULL test
    IsNull(Box<Expr>),

    /// IS NOT NULL test
    IsNotNull(Box<Expr>),

    /// BETWEEN low AND high (inclusive on both ends)
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },

    /// IN (v1, ..., vn)
    InList {
        expr: Box<Expr>,
        list: Vec<Literal>,
    },

    /// COALESCE(a, b, ...)
    Coalesce(Vec<Expr>),

    /// Cast
    Cast { expr: Box<Expr>, data_type: DataType },

    /// Function call (opaque to the estimator)
    Function { name: String, args: Vec<Expr> },
}

/// Literal value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Literal {
    /// Numeric interpretation for range math; `None` for values without a
    /// usable total order (strings, NULL).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Null => None,
            Literal::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Literal::Int(i) => Some(*i as f64),
            Literal::Float(f) => {
                if f.is_nan() {
                    None
                } else {
                    Some(*f)
                }
            }
            Literal::String(_) => None,
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
}

impl BinaryOperator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::Neq
                | BinaryOperator::Lt
                | BinaryOperator::Lte
                | BinaryOperator::Gt
                | BinaryOperator::Gte
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Plus
                | BinaryOperator::Minus
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Modulo
        )
    }

    /// Mirror image of a comparison, for `a op b` rewritten as `b op' a`.
    pub fn flip(&self) -> BinaryOperator {
        match self {
            BinaryOperator::Lt => BinaryOperator::Gt,
            BinaryOperator::Lte => BinaryOperator::Gte,
            BinaryOperator::Gt => BinaryOperator::Lt,
            BinaryOperator::Gte => BinaryOperator::Lte,
            other => *other,
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
}

impl Expr {
    /// Get all column references in this expression
    pub fn get_columns(&self) -> Vec<Symbol> {
        match self {
            Expr::Column(symbol) => vec![symbol.clone()],
            Expr::Literal(_) => vec![],
            Expr::BinaryOp { left, right, .. } => {
                let mut cols = left.get_columns();
                cols.extend(right.get_columns());
                cols
            }
            Expr::UnaryOp { expr, .. } => expr.get_columns(),
            Expr::IsNull(expr) | Expr::IsNotNull(expr) => expr.get_columns(),
            Expr::Between { expr, low, high } => {
                let mut cols = expr.get_columns();
                cols.extend(low.get_columns());
                cols.extend(high.get_columns());
                cols
            }
            Expr::InList { expr, .. } => expr.get_columns(),
            Expr::Coalesce(args) => args.iter().flat_map(|a| a.get_columns()).collect(),
            Expr::Cast { expr, .. } => expr.get_columns(),
            Expr::Function { args, .. } => args.iter().flat_map(|a| a.get_columns()).collect(),
        }
    }

    pub fn column(name: impl Into<Symbol>) -> Expr {
        Expr::Column(name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_columns_walks_all_shapes() {
        let expr = Expr::Between {
            expr: Box::new(Expr::column("a")),
            low: Box::new(Expr::Literal(Literal::Int(1))),
            high: Box::new(Expr::column("b")),
        };
        let cols = expr.get_columns();
        assert_eq!(cols, vec![Symbol::new("a"), Symbol::new("b")]);
    }

    #[test]
    fn test_literal_as_f64() {
        assert_eq!(Literal::Int(7).as_f64(), Some(7.0));
        assert_eq!(Literal::Boolean(true).as_f64(), Some(1.0));
        assert_eq!(Literal::Null.as_f64(), None);
        assert_eq!(Literal::String("x".into()).as_f64(), None);
        assert_eq!(Literal::Float(f64::NAN).as_f64(), None);
    }

    #[test]
    fn test_comparison_flip() {
        assert_eq!(BinaryOperator::Lt.flip(), BinaryOperator::Gt);
        assert_eq!(BinaryOperator::Gte.flip(), BinaryOperator::Lte);
        assert_eq!(BinaryOperator::Eq.flip(), BinaryOperator::Eq);
    }
}
