//! The compilation pipeline: from trace expressions to automata, from bodies
//! to BDD evaluation plans, and from prenex formulas and hypernode automata to
//! the programs the runtime monitors execute.

pub mod automaton;
pub mod bdd_plan;
pub mod canonization;
pub mod composition;
pub mod construction;
pub mod priority;
pub mod program;
pub mod splitter;
