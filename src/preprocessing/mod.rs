//! Structures for the specifications the monitors are compiled from: trace
//! expressions and their derivatives, prenex HNL formulas, and hypernode
//! automata. The concrete-syntax parser is an external collaborator; this
//! crate consumes already-built structures.

pub mod derivatives;
pub mod hna_automaton;
pub mod hnl_formula;
pub mod operator_enums;
pub mod trace_expr;
