//! Hypernode automata: deterministic automata whose states carry HNL formulas
//! and whose edges are labelled by named actions.

use crate::preprocessing::hnl_formula::PrenexFormula;

use std::fmt;

/// A node of a hypernode automaton, labelled by the HNL formula that every
/// trace slice assigned to the node must satisfy.
#[derive(Clone, Debug)]
pub struct HypernodeState {
    pub name: String,
    pub formula: PrenexFormula,
}

impl HypernodeState {
    pub fn new(name: &str, formula: PrenexFormula) -> HypernodeState {
        HypernodeState {
            name: name.to_string(),
            formula,
        }
    }
}

impl fmt::Display for HypernodeState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} | {}", self.name, self.formula)
    }
}

/// A hypernode automaton under construction. States and actions get dense
/// integer ids in insertion order; transitions reference ids, not state
/// objects. Determinism is enforced when the automaton is compiled.
#[derive(Clone, Debug, Default)]
pub struct HypernodeAutomaton {
    states: Vec<HypernodeState>,
    actions: Vec<String>,
    transitions: Vec<(usize, usize, usize)>,
    initial: Option<usize>,
}

impl HypernodeAutomaton {
    pub fn new() -> HypernodeAutomaton {
        HypernodeAutomaton::default()
    }

    /// Add a state and return its id. The first added state becomes initial
    /// unless [Self::set_initial] overrides the choice.
    pub fn add_state(&mut self, state: HypernodeState) -> usize {
        let id = self.states.len();
        self.states.push(state);
        if self.initial.is_none() {
            self.initial = Some(id);
        }
        id
    }

    pub fn set_initial(&mut self, state: usize) {
        assert!(state < self.states.len(), "Unknown state id {state}");
        self.initial = Some(state);
    }

    /// Register an action name and return its id; an already known name keeps
    /// its previous id.
    pub fn add_action(&mut self, name: &str) -> usize {
        if let Some(id) = self.action_id(name) {
            return id;
        }
        self.actions.push(name.to_string());
        self.actions.len() - 1
    }

    pub fn action_id(&self, name: &str) -> Option<usize> {
        self.actions.iter().position(|a| a == name)
    }

    /// Add a transition `source -[action]-> target`. The action name is
    /// registered on the fly.
    pub fn add_transition(&mut self, source: usize, action: &str, target: usize) {
        assert!(source < self.states.len(), "Unknown state id {source}");
        assert!(target < self.states.len(), "Unknown state id {target}");
        let action = self.add_action(action);
        self.transitions.push((source, action, target));
    }

    pub fn states(&self) -> &[HypernodeState] {
        &self.states
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn transitions(&self) -> &[(usize, usize, usize)] {
        &self.transitions
    }

    pub fn initial(&self) -> Option<usize> {
        self.initial
    }

    /// The successor of `state` under `action`, or `None` when the automaton
    /// has no such edge (the trace is then not covered by the automaton).
    pub fn next(&self, state: usize, action: usize) -> Option<usize> {
        self.transitions
            .iter()
            .find(|(s, a, _)| *s == state && *a == action)
            .map(|(_, _, t)| *t)
    }

    /// Check that no state has two transitions on the same action. Returns the
    /// offending `(state, action)` pair of the first violation found.
    pub fn nondeterminism(&self) -> Option<(usize, usize)> {
        for (i, (s, a, _)) in self.transitions.iter().enumerate() {
            if self.transitions[..i].iter().any(|(s2, a2, _)| s2 == s && a2 == a) {
                return Some((*s, *a));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::preprocessing::hna_automaton::{HypernodeAutomaton, HypernodeState};
    use crate::preprocessing::hnl_formula::{BodyNode, IsPrefix, PrenexFormula, Quantifier};
    use crate::preprocessing::trace_expr::{TraceExpr, TraceVariable};

    fn trivial_formula() -> PrenexFormula {
        PrenexFormula::new(
            vec![
                Quantifier::mk_forall(TraceVariable::new("t1")),
                Quantifier::mk_forall(TraceVariable::new("t2")),
            ],
            BodyNode::mk_atom(IsPrefix::new(
                TraceExpr::mk_var("in", TraceVariable::new("t1")),
                TraceExpr::mk_var("in", TraceVariable::new("t2")),
            )),
        )
    }

    #[test]
    /// Test state/action bookkeeping and the transition function.
    fn automaton_construction() {
        let mut hna = HypernodeAutomaton::new();
        let clear = hna.add_state(HypernodeState::new("Clear", trivial_formula()));
        let share = hna.add_state(HypernodeState::new("ShareLoc", trivial_formula()));
        hna.add_transition(clear, "share", share);
        hna.add_transition(share, "erase", clear);

        assert_eq!(hna.initial(), Some(clear));
        let share_action = hna.action_id("share").unwrap();
        let erase_action = hna.action_id("erase").unwrap();
        assert_eq!(hna.next(clear, share_action), Some(share));
        assert_eq!(hna.next(share, erase_action), Some(clear));
        assert_eq!(hna.next(clear, erase_action), None);
        assert!(hna.nondeterminism().is_none());
    }

    #[test]
    /// Test that duplicate edges on one action are detected.
    fn nondeterminism_detection() {
        let mut hna = HypernodeAutomaton::new();
        let a = hna.add_state(HypernodeState::new("A", trivial_formula()));
        let b = hna.add_state(HypernodeState::new("B", trivial_formula()));
        hna.add_transition(a, "act", b);
        hna.add_transition(a, "act", a);
        assert_eq!(hna.nondeterminism(), Some((a, hna.action_id("act").unwrap())));
    }
}
