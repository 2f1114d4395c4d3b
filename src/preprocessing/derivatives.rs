//! Brzozowski-style derivatives of trace expressions, the engine behind the
//! expression-to-automaton construction.

use crate::preprocessing::trace_expr::{Constant, LookaheadGuard, TraceExpr};

use std::collections::BTreeSet;
use std::fmt;

/// An ordered set of derivative expressions. Every member is kept in simplified
/// form, so that membership coincides with structural equality after
/// `simplify()` and iteration order is stable across runs (the automaton
/// construction relies on this for deterministic state numbering).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DerivativesSet {
    exprs: BTreeSet<TraceExpr>,
}

impl DerivativesSet {
    pub fn new() -> DerivativesSet {
        DerivativesSet::default()
    }

    pub fn singleton(expr: TraceExpr) -> DerivativesSet {
        let mut set = DerivativesSet::new();
        set.insert(expr);
        set
    }

    /// Insert an expression, simplifying it first.
    pub fn insert(&mut self, expr: TraceExpr) {
        self.exprs.insert(expr.simplify());
    }

    pub fn extend(&mut self, other: DerivativesSet) {
        self.exprs.extend(other.exprs);
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn contains(&self, expr: &TraceExpr) -> bool {
        self.exprs.contains(expr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TraceExpr> {
        self.exprs.iter()
    }
}

impl FromIterator<TraceExpr> for DerivativesSet {
    fn from_iter<I: IntoIterator<Item = TraceExpr>>(iter: I) -> DerivativesSet {
        let mut set = DerivativesSet::new();
        for expr in iter {
            set.insert(expr);
        }
        set
    }
}

impl IntoIterator for DerivativesSet {
    type Item = TraceExpr;
    type IntoIter = std::collections::btree_set::IntoIter<TraceExpr>;

    fn into_iter(self) -> Self::IntoIter {
        self.exprs.into_iter()
    }
}

impl fmt::Display for DerivativesSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, expr) in self.exprs.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{expr}")?;
        }
        write!(f, "}}")
    }
}

/// The derivative of `expr` w.r.t. the (possibly marked) letter `wrt`: a set of
/// expressions that together accept exactly the words `w` such that `a·w` is
/// accepted by `expr`, where for a `rep`-marked letter `a` stands for the
/// maximal repetition of the letter.
pub fn derivative(expr: &TraceExpr, wrt: &Constant) -> DerivativesSet {
    match expr {
        TraceExpr::Epsilon => DerivativesSet::new(),
        TraceExpr::Constant(c) => {
            if wrt.is_rep() {
                return DerivativesSet::new();
            }
            if c == wrt {
                DerivativesSet::singleton(TraceExpr::Epsilon)
            } else {
                DerivativesSet::new()
            }
        }
        // a program variable consumes any single letter read from its trace
        TraceExpr::Var(_) => {
            if wrt.is_rep() || !wrt.is_x() {
                return DerivativesSet::new();
            }
            DerivativesSet::singleton(expr.clone())
        }
        TraceExpr::Concat(l, r) => {
            let mut result = DerivativesSet::new();
            for d in derivative(l, wrt) {
                // a lookahead produced inside the head is lifted out of the concat
                match d {
                    TraceExpr::Lookahead(inner, guard) => result.insert(TraceExpr::mk_lookahead(
                        TraceExpr::mk_concat(*inner, r.as_ref().clone()),
                        guard,
                    )),
                    other => result.insert(TraceExpr::mk_concat(other, r.as_ref().clone())),
                }
            }
            if l.nullable() {
                result.extend(derivative(r, wrt));
            }
            result
        }
        TraceExpr::Plus(l, r) => {
            let mut result = derivative(l, wrt);
            result.extend(derivative(r, wrt));
            result
        }
        TraceExpr::Iter(c) => derivative(c, wrt)
            .into_iter()
            .map(|d| TraceExpr::mk_concat(d, expr.clone()))
            .collect(),
        TraceExpr::StutterReduce(c) => stutter_derivative(c, wrt),
        TraceExpr::Lookahead(c, guard) => {
            if !guard.matches(wrt) {
                return DerivativesSet::new();
            }
            derivative(c, wrt)
        }
    }
}

/// The derivative of a stutter-reduced expression. Only `rep`-marked letters
/// make progress: the derivative collects everything reachable by repeatedly
/// cutting the letter off the stutter-free body, and wraps each result in a
/// lookahead that forbids the letter. The lookahead encodes that the
/// repetition consumed was maximal.
fn stutter_derivative(child: &TraceExpr, wrt: &Constant) -> DerivativesSet {
    if !wrt.is_rep() {
        return DerivativesSet::new();
    }

    let no_rep = wrt.remove_rep();
    let unmarked = wrt.remove_marks();
    let stutter_free = child.remove_stutter_reductions();

    let mut reachable = DerivativesSet::new();
    if wrt.is_x() {
        for d in derivatives_fixpoint(&stutter_free, &unmarked) {
            reachable.extend(derivatives_fixpoint(&d, &no_rep));
        }
    }
    reachable.extend(derivatives_fixpoint(&stutter_free, &no_rep));

    let unmarked_singleton = BTreeSet::from([TraceExpr::Constant(unmarked)]);
    reachable
        .into_iter()
        .filter(|d| d.first() != unmarked_singleton)
        .map(|d| {
            TraceExpr::mk_lookahead(
                TraceExpr::mk_stutter_reduce(d),
                LookaheadGuard::IsNot(unmarked),
            )
        })
        .collect()
}

/// The set of all expressions reachable from `expr` by one or more derivative
/// steps w.r.t. `wrt`, computed as a fixed point.
pub fn derivatives_fixpoint(expr: &TraceExpr, wrt: &Constant) -> DerivativesSet {
    let mut result = derivative(expr, wrt);
    loop {
        let mut next = result.clone();
        for d in result.iter() {
            next.extend(derivative(d, wrt));
        }
        if next == result {
            return result;
        }
        result = next;
    }
}
