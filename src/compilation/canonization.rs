//! Canonization of prefix atoms: renaming program and trace variables to
//! canonical names, so that atoms that are isomorphic modulo renaming share
//! one compiled automaton.

use crate::preprocessing::hnl_formula::IsPrefix;
use crate::preprocessing::trace_expr::{ProgramVariable, TraceExpr, TraceTerm, TraceVariable};

/// Return one side of an atom with its (at most one) program variable renamed
/// to the canonical projection `v(t)`. Which field the variable projects and
/// which trace it reads are monitor-local concerns: the automaton only
/// compares projected values against its edge labels, so it can be shared by
/// any atom with the same expression structure.
pub fn canonize_side(expr: &TraceExpr) -> TraceExpr {
    expr.map_program_variables(&|_: &ProgramVariable| ProgramVariable {
        name: "v".to_string(),
        trace: TraceTerm::Variable(TraceVariable::new("t")),
    })
}

/// The canonical form of an atom: both sides canonized. Two atoms with equal
/// canonical forms share one automaton; their BDD variables stay distinct.
pub fn canonize_atom(atom: &IsPrefix) -> IsPrefix {
    IsPrefix::new(canonize_side(&atom.lhs), canonize_side(&atom.rhs))
}
