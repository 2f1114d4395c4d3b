//! Construction of a finite automaton from a trace expression by derivative
//! exploration.

use crate::compilation::automaton::Automaton;
use crate::preprocessing::derivatives::derivative;
use crate::preprocessing::trace_expr::{Constant, TraceExpr};

use log::debug;

/// Build the automaton of `expr` over the given alphabet of constant values.
///
/// States are simplified expressions; for every state and every letter of the
/// alphabet, with each of the four mark combinations, there is one transition
/// per derivative. A state is accepting iff its expression is nullable; the
/// initial state is the (simplified) input expression.
pub fn expr_to_automaton(expr: &TraceExpr, alphabet: &[i64]) -> Automaton<TraceExpr, Constant> {
    let mut automaton: Automaton<TraceExpr, Constant> = Automaton::new();

    let init = expr.simplify();
    let init_id = automaton.add_state(init.clone());
    if init.nullable() {
        automaton.add_accepting(init_id);
    }
    automaton.add_init(init_id);

    let mut worklist = vec![init];
    while let Some(state) = worklist.pop() {
        let source = automaton.get(&state).expect("Worklist states are registered");

        for value in alphabet {
            for marks in Constant::marks_combinations() {
                let letter = Constant::new(*value).with_marks(marks);
                for next in derivative(&state, &letter) {
                    let known = automaton.get(&next).is_some();
                    let target = automaton.add_state(next.clone());
                    if !known {
                        if next.nullable() {
                            automaton.add_accepting(target);
                        }
                        worklist.push(next);
                    }
                    automaton.add_transition(source, letter, target, 0);
                }
            }
        }
    }

    debug!(
        "Automaton for '{expr}': {} states, {} transitions",
        automaton.num_states(),
        automaton.num_transitions(),
    );
    automaton
}

#[cfg(test)]
mod tests {
    use crate::compilation::construction::expr_to_automaton;
    use crate::preprocessing::trace_expr::{Constant, TraceExpr, TraceVariable};

    #[test]
    /// Test the automaton of a single program variable: one state, accepting,
    /// with one self-loop per trace-read letter.
    fn program_variable_automaton() {
        let expr = TraceExpr::mk_var("x", TraceVariable::new("t"));
        let automaton = expr_to_automaton(&expr, &[0, 1]);

        assert_eq!(automaton.num_states(), 1);
        let init = automaton.initial_states()[0];
        assert!(automaton.is_accepting(init));

        // self loops on 0ₓ and 1ₓ, nothing else
        let transitions = automaton.transitions(init);
        assert_eq!(transitions.len(), 2);
        for t in transitions {
            assert!(t.label.is_x() && !t.label.is_rep());
            assert_eq!(t.target, init);
        }
    }

    #[test]
    /// Test the automaton of a concatenation of constants.
    fn constant_word_automaton() {
        // 0·1 has states {0·1, 1, ε}; only ε accepts
        let expr = TraceExpr::mk_concat(TraceExpr::mk_constant(0), TraceExpr::mk_constant(1));
        let automaton = expr_to_automaton(&expr, &[0, 1]);

        assert_eq!(automaton.num_states(), 3);
        let init = automaton.initial_states()[0];
        assert!(!automaton.is_accepting(init));

        let first = automaton.transitions(init);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].label, Constant::new(0));

        let mid = first[0].target;
        let second = automaton.transitions(mid);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].label, Constant::new(1));
        assert!(automaton.is_accepting(second[0].target));
    }

    #[test]
    /// Test that a stutter-reduced program variable explores guarded states.
    fn stutter_reduced_automaton() {
        let expr = TraceExpr::mk_stutter_reduce(TraceExpr::mk_var("x", TraceVariable::new("t")));
        let automaton = expr_to_automaton(&expr, &[0, 1]);

        // ⌊x⌋ plus one guarded state per letter of the alphabet
        assert_eq!(automaton.num_states(), 3);
        for id in automaton.state_ids() {
            assert!(automaton.is_accepting(id));
        }

        // every edge consumes a maximal repetition of a trace-read letter
        for id in automaton.state_ids() {
            for t in automaton.transitions(id) {
                assert!(t.label.is_rep() && t.label.is_x());
                assert_ne!(t.target, id);
            }
        }
        let init = automaton.initial_states()[0];
        assert_eq!(automaton.transitions(init).len(), 2);
    }
}
