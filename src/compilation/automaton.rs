//! A generic automaton table used by the intermediate stages of the pipeline.
//! States are labelled values with dense integer ids; transitions reference
//! ids, so the structures stay acyclic regardless of the automaton's shape.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

pub type StateId = usize;

/// One transition of an [Automaton]. The priority is only meaningful for
/// priority automata; all other stages leave it at zero.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Transition<L> {
    pub label: L,
    pub target: StateId,
    pub priority: u32,
}

/// An automaton over state labels `S` and transition labels `L`.
#[derive(Clone, Debug)]
pub struct Automaton<S, L> {
    states: Vec<S>,
    ids: HashMap<S, StateId>,
    transitions: Vec<Vec<Transition<L>>>,
    initial: Vec<StateId>,
    accepting: HashSet<StateId>,
}

impl<S: Clone + Eq + Hash, L: Clone + PartialEq> Automaton<S, L> {
    pub fn new() -> Automaton<S, L> {
        Automaton {
            states: Vec::new(),
            ids: HashMap::new(),
            transitions: Vec::new(),
            initial: Vec::new(),
            accepting: HashSet::new(),
        }
    }

    /// Add a state with the given label, or return the id it already has.
    pub fn add_state(&mut self, label: S) -> StateId {
        if let Some(id) = self.ids.get(&label) {
            return *id;
        }
        let id = self.states.len();
        self.states.push(label.clone());
        self.ids.insert(label, id);
        self.transitions.push(Vec::new());
        id
    }

    pub fn get(&self, label: &S) -> Option<StateId> {
        self.ids.get(label).copied()
    }

    pub fn state(&self, id: StateId) -> &S {
        &self.states[id]
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn state_ids(&self) -> impl Iterator<Item = StateId> {
        0..self.states.len()
    }

    pub fn add_transition(&mut self, source: StateId, label: L, target: StateId, priority: u32) {
        assert!(source < self.states.len(), "Unknown source state {source}");
        assert!(target < self.states.len(), "Unknown target state {target}");
        self.transitions[source].push(Transition {
            label,
            target,
            priority,
        });
    }

    pub fn transitions(&self, source: StateId) -> &[Transition<L>] {
        &self.transitions[source]
    }

    /// All transitions of `source` with the given label.
    pub fn transitions_with<'a>(
        &'a self,
        source: StateId,
        label: &'a L,
    ) -> impl Iterator<Item = &'a Transition<L>> {
        self.transitions[source].iter().filter(move |t| t.label == *label)
    }

    pub fn add_init(&mut self, state: StateId) {
        if !self.initial.contains(&state) {
            self.initial.push(state);
        }
    }

    pub fn initial_states(&self) -> &[StateId] {
        &self.initial
    }

    pub fn add_accepting(&mut self, state: StateId) {
        self.accepting.insert(state);
    }

    pub fn is_accepting(&self, state: StateId) -> bool {
        self.accepting.contains(&state)
    }

    pub fn num_transitions(&self) -> usize {
        self.transitions.iter().map(|t| t.len()).sum()
    }
}

impl<S: Clone + Eq + Hash, L: Clone + PartialEq> Default for Automaton<S, L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::compilation::automaton::Automaton;

    #[test]
    /// Test state de-duplication and transition lookups.
    fn state_table() {
        let mut automaton: Automaton<&str, char> = Automaton::new();
        let a = automaton.add_state("a");
        let b = automaton.add_state("b");
        assert_eq!(automaton.add_state("a"), a);
        assert_eq!(automaton.num_states(), 2);

        automaton.add_transition(a, 'x', b, 0);
        automaton.add_transition(a, 'y', a, 1);
        automaton.add_init(a);
        automaton.add_accepting(b);

        assert_eq!(automaton.transitions(a).len(), 2);
        assert_eq!(automaton.transitions_with(a, &'x').count(), 1);
        assert_eq!(automaton.transitions(b).len(), 0);
        assert!(automaton.is_accepting(b));
        assert!(!automaton.is_accepting(a));
        assert_eq!(automaton.initial_states(), &[a]);
    }
}
