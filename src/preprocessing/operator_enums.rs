//! Contains enum structures for the operators and quantifiers of HNL formulas.

use crate::preprocessing::trace_expr::FunctionTerm;

use std::fmt;

/// Enum for the unary operators of a quantifier-free HNL body.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum UnaryOp {
    Not, // '¬'
}

/// Enum for the binary operators of a quantifier-free HNL body.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum BinaryOp {
    And, // '∧'
    Or,  // '∨'
}

/// Enum for the quantifiers a prenex prefix is built from. A `ForAllFromFun`
/// quantifier ranges over the traces produced by a function of previously
/// bound trace variables instead of over the monitored input.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum QuantifierKind {
    ForAll,
    Exists,
    ForAllFromFun(FunctionTerm),
}

impl QuantifierKind {
    /// Whether two kinds belong to the same quantifier group for the purposes
    /// of the alternation splitter. All function-sourced quantifiers form one
    /// group regardless of the function.
    pub fn same_group(&self, other: &QuantifierKind) -> bool {
        matches!(
            (self, other),
            (QuantifierKind::ForAll, QuantifierKind::ForAll)
                | (QuantifierKind::Exists, QuantifierKind::Exists)
                | (
                    QuantifierKind::ForAllFromFun(_),
                    QuantifierKind::ForAllFromFun(_)
                )
        )
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnaryOp::Not => write!(f, "¬"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BinaryOp::And => write!(f, "∧"),
            BinaryOp::Or => write!(f, "∨"),
        }
    }
}

impl fmt::Display for QuantifierKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QuantifierKind::ForAll => write!(f, "∀"),
            QuantifierKind::Exists => write!(f, "∃"),
            QuantifierKind::ForAllFromFun(fun) => write!(f, "∀{fun}∋"),
        }
    }
}
