//! Translation of a composed prefix-product automaton into a priority
//! automaton that realises longest-match semantics for `rep`-marked letters.

use crate::compilation::automaton::{Automaton, StateId};
use crate::compilation::composition::{PairLabel, ProductState};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// One transition of a [PriorityAutomaton]. `None` on a side is an `ε`: the
/// transition does not consume an event of that trace; `Some(v)` consumes one
/// event whose projected field equals `v`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PrioTransition {
    pub left: Option<i64>,
    pub right: Option<i64>,
    pub target: StateId,
}

/// The transitions of one state that share a priority.
#[derive(Clone, Debug)]
pub struct PriorityGroup {
    pub priority: u32,
    pub transitions: Vec<PrioTransition>,
}

/// The runtime form of an atom automaton: dense state ids, per-state
/// transition groups sorted by decreasing priority. Multiple atom monitors
/// share one `PriorityAutomaton`; each monitor only keeps its own evaluation
/// states.
#[derive(Clone, Debug)]
pub struct PriorityAutomaton {
    initial: Option<StateId>,
    accepting: Vec<bool>,
    states: Vec<Vec<PriorityGroup>>,
}

impl PriorityAutomaton {
    pub fn initial(&self) -> Option<StateId> {
        self.initial
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    pub fn is_accepting(&self, state: StateId) -> bool {
        self.accepting[state]
    }

    /// The transition groups of `state`, highest priority first.
    pub fn groups(&self, state: StateId) -> &[PriorityGroup] {
        &self.states[state]
    }

    fn flat_transitions(&self, state: StateId) -> impl Iterator<Item = &PrioTransition> {
        self.states[state].iter().flat_map(|g| g.transitions.iter())
    }

    /// Generate a random path from the initial state, for tests. The path may
    /// be shorter than requested when it runs into a state without
    /// transitions.
    pub fn random_path(&self, seed: u64, length: usize) -> Vec<(StateId, PrioTransition)> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut path = Vec::new();
        let Some(mut state) = self.initial else {
            return path;
        };
        for _ in 0..length {
            let transitions: Vec<&PrioTransition> = self.flat_transitions(state).collect();
            if transitions.is_empty() {
                break;
            }
            let t = transitions[rng.gen_range(0..transitions.len())];
            path.push((state, *t));
            state = t.target;
        }
        path
    }

    /// Whether a path ends accepting: its last state must be accepting, or an
    /// accepting state must be reachable from it via `(ε, ε)` steps taken,
    /// per state, from the highest-priority group that offers any.
    pub fn path_is_accepting(&self, path: &[(StateId, PrioTransition)]) -> bool {
        let last = match path.last() {
            Some((_, t)) => t.target,
            None => match self.initial {
                Some(init) => init,
                None => return false,
            },
        };

        let mut visited = vec![last];
        let mut worklist = vec![last];
        while let Some(state) = worklist.pop() {
            if self.accepting[state] {
                return true;
            }
            for group in &self.states[state] {
                let epsilon: Vec<&PrioTransition> = group
                    .transitions
                    .iter()
                    .filter(|t| t.left.is_none() && t.right.is_none())
                    .collect();
                if epsilon.is_empty() {
                    continue;
                }
                for t in epsilon {
                    if !visited.contains(&t.target) {
                        visited.push(t.target);
                        worklist.push(t.target);
                    }
                }
                break;
            }
        }
        false
    }
}

/// The label of one side of a composed transition, after the non-`x` letters
/// are replaced by `ε`: the consumed value, and whether the consumption is a
/// maximal repetition.
type SideLabel = Option<(i64, bool)>;

fn side_label(letter: &crate::preprocessing::trace_expr::Constant) -> SideLabel {
    if letter.is_x() {
        Some((letter.value, letter.is_rep()))
    } else {
        None
    }
}

/// Convert a composed automaton into a [PriorityAutomaton].
///
/// Plain transitions are carried over at priority 0. A transition consuming a
/// maximal repetition on one or both sides is replaced by a gadget with a
/// middle state: self-loops consume further repetitions of the letter (the
/// both-sides loop shadows the one-sided ones, which shadow the exit), and the
/// `(ε, ε)` exit fires once no repetition can be consumed any more.
pub fn to_priority_automaton(composed: &Automaton<ProductState, PairLabel>) -> PriorityAutomaton {
    let num_base = composed.num_states();
    let mut accepting: Vec<bool> = (0..num_base).map(|s| composed.is_accepting(s)).collect();
    let mut transitions: Vec<Vec<(u32, PrioTransition)>> = vec![Vec::new(); num_base];

    // gadget middle states are keyed by the source state and the (still
    // rep-marked) side labels of the composed transition
    let mut gadgets: HashMap<(StateId, SideLabel, SideLabel), StateId> = HashMap::new();

    for source in composed.state_ids() {
        for t in composed.transitions(source) {
            let l0 = side_label(&t.label.0);
            let l1 = side_label(&t.label.1);
            let left_rep = matches!(l0, Some((_, true)));
            let right_rep = matches!(l1, Some((_, true)));
            let lv = l0.map(|(v, _)| v);
            let rv = l1.map(|(v, _)| v);

            if !left_rep && !right_rep {
                transitions[source].push((
                    0,
                    PrioTransition {
                        left: lv,
                        right: rv,
                        target: t.target,
                    },
                ));
                continue;
            }

            let middle = *gadgets.entry((source, l0, l1)).or_insert_with(|| {
                accepting.push(false);
                transitions.push(Vec::new());
                transitions.len() - 1
            });

            let push = |transitions: &mut Vec<Vec<(u32, PrioTransition)>>,
                        state: StateId,
                        priority: u32,
                        left: Option<i64>,
                        right: Option<i64>,
                        target: StateId| {
                let t = PrioTransition {
                    left,
                    right,
                    target,
                };
                if !transitions[state].iter().any(|(p, o)| *p == priority && *o == t) {
                    transitions[state].push((priority, t));
                }
            };

            // entry, self-loops in decreasing strength, and the exit
            push(&mut transitions, source, 0, lv, rv, middle);
            if left_rep && right_rep {
                push(&mut transitions, middle, 2, lv, rv, middle);
                push(&mut transitions, middle, 1, lv, None, middle);
                push(&mut transitions, middle, 1, None, rv, middle);
            } else if left_rep {
                push(&mut transitions, middle, 1, lv, None, middle);
            } else {
                push(&mut transitions, middle, 1, None, rv, middle);
            }
            push(&mut transitions, middle, 0, None, None, t.target);
        }
    }

    // group per state by priority, highest first
    let states: Vec<Vec<PriorityGroup>> = transitions
        .into_iter()
        .map(|mut state_transitions| {
            state_transitions.sort_by(|(p1, _), (p2, _)| p2.cmp(p1));
            let mut groups: Vec<PriorityGroup> = Vec::new();
            for (priority, transition) in state_transitions {
                match groups.last_mut() {
                    Some(group) if group.priority == priority => {
                        group.transitions.push(transition);
                    }
                    _ => groups.push(PriorityGroup {
                        priority,
                        transitions: vec![transition],
                    }),
                }
            }
            groups
        })
        .collect();

    let initial = composed.initial_states().first().copied();
    let automaton = PriorityAutomaton {
        initial,
        accepting,
        states,
    };
    debug!(
        "Priority automaton: {} states ({} from the product)",
        automaton.num_states(),
        num_base,
    );
    automaton
}

#[cfg(test)]
mod tests {
    use crate::compilation::composition::compose_automata;
    use crate::compilation::construction::expr_to_automaton;
    use crate::compilation::priority::to_priority_automaton;
    use crate::preprocessing::trace_expr::{TraceExpr, TraceVariable};

    fn variable_product_priority(
        stutter: bool,
        alphabet: &[i64],
    ) -> crate::compilation::priority::PriorityAutomaton {
        let wrap = |e: TraceExpr| {
            if stutter {
                TraceExpr::mk_stutter_reduce(e)
            } else {
                e
            }
        };
        let lhs = expr_to_automaton(&wrap(TraceExpr::mk_var("x", TraceVariable::new("t"))), alphabet);
        let rhs = expr_to_automaton(&wrap(TraceExpr::mk_var("y", TraceVariable::new("s"))), alphabet);
        to_priority_automaton(&compose_automata(&lhs, &rhs, alphabet))
    }

    #[test]
    /// Test that plain (non-rep) products translate into priority-0 letter
    /// transitions with no gadget states.
    fn plain_translation() {
        let automaton = variable_product_priority(false, &[0, 1]);

        assert_eq!(automaton.num_states(), 1);
        let init = automaton.initial().unwrap();
        assert!(automaton.is_accepting(init));

        let groups = automaton.groups(init);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].priority, 0);
        assert_eq!(groups[0].transitions.len(), 2);
        for t in &groups[0].transitions {
            assert_eq!(t.left, t.right);
            assert!(t.left.is_some());
        }
    }

    #[test]
    /// Test the shape of the both-sides repetition gadget.
    fn rep_gadget_shape() {
        let automaton = variable_product_priority(true, &[0]);

        // the product state plus its guarded successor and one gadget state
        let init = automaton.initial().unwrap();
        assert!(automaton.is_accepting(init));

        // the entry edge leads to a non-accepting middle state
        let entry = &automaton.groups(init);
        let middle = entry
            .iter()
            .flat_map(|g| g.transitions.iter())
            .find(|t| t.left == Some(0) && t.right == Some(0))
            .expect("Gadget entry edge exists")
            .target;
        assert!(!automaton.is_accepting(middle));

        // the middle state has groups of priorities 2, 1, 0
        let groups = automaton.groups(middle);
        let priorities: Vec<u32> = groups.iter().map(|g| g.priority).collect();
        assert_eq!(priorities, vec![2, 1, 0]);

        // priority 2: both-sides self-loop
        assert_eq!(groups[0].transitions.len(), 1);
        let both = &groups[0].transitions[0];
        assert_eq!((both.left, both.right), (Some(0), Some(0)));
        assert_eq!(both.target, middle);

        // priority 1: the two one-sided self-loops
        assert_eq!(groups[1].transitions.len(), 2);
        for t in &groups[1].transitions {
            assert_eq!(t.target, middle);
            assert!(t.left.is_none() || t.right.is_none());
        }

        // priority 0: the (ε, ε) exit into an accepting state
        let exit = groups[2]
            .transitions
            .iter()
            .find(|t| t.left.is_none() && t.right.is_none())
            .expect("Gadget exit edge exists");
        assert_ne!(exit.target, middle);
        assert!(automaton.is_accepting(exit.target));
    }

    #[test]
    /// Test that random paths stay within the automaton and that accepting
    /// states are recognized through epsilon closures.
    fn random_paths() {
        let automaton = variable_product_priority(true, &[0, 1]);
        for seed in 0..16 {
            let path = automaton.random_path(seed, 12);
            for (source, t) in &path {
                assert!(*source < automaton.num_states());
                assert!(t.target < automaton.num_states());
            }
            // a path ending in an accepting state is accepting by definition
            if let Some((_, last)) = path.last() {
                if automaton.is_accepting(last.target) {
                    assert!(automaton.path_is_accepting(&path));
                }
            }
        }
        // the empty path starts in the accepting initial state
        assert!(automaton.path_is_accepting(&[]));
    }
}
