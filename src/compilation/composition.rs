//! The prefix product: a synchronous composition of two expression automata
//! that recognizes when the left input is a prefix of the right one.

use crate::compilation::automaton::Automaton;
use crate::preprocessing::trace_expr::{Constant, TraceExpr};

use log::debug;

/// A state of the composed automaton: the residual expressions of both sides.
pub type ProductState = (TraceExpr, TraceExpr);

/// A label of the composed automaton: a pair of marked letters carrying the
/// same value.
pub type PairLabel = (Constant, Constant);

/// Generate every pair of marked variants of each alphabet letter. Both
/// components of a pair carry the same value; only the marks differ.
fn letter_pairs(alphabet: &[i64]) -> Vec<PairLabel> {
    let mut pairs = Vec::new();
    for value in alphabet {
        for marks1 in Constant::marks_combinations() {
            for marks2 in Constant::marks_combinations() {
                pairs.push((
                    Constant::new(*value).with_marks(marks1),
                    Constant::new(*value).with_marks(marks2),
                ));
            }
        }
    }
    pairs
}

/// A product state can never witness a prefix when the right side is already
/// exhausted while the left side cannot end.
fn prunable(state: &ProductState) -> bool {
    state.1 == TraceExpr::Epsilon && !state.0.nullable()
}

/// Compose the automata of the two sides of a prefix atom. The product is
/// accepting wherever the left component is nullable, where the left word may
/// end and witness the prefix relation. Surely non-accepting states are
/// pruned away.
pub fn compose_automata(
    left: &Automaton<TraceExpr, Constant>,
    right: &Automaton<TraceExpr, Constant>,
    alphabet: &[i64],
) -> Automaton<ProductState, PairLabel> {
    let mut product: Automaton<ProductState, PairLabel> = Automaton::new();
    let pairs = letter_pairs(alphabet);

    let mut worklist: Vec<ProductState> = Vec::new();
    for l in left.initial_states() {
        for r in right.initial_states() {
            let state = (left.state(*l).clone(), right.state(*r).clone());
            if prunable(&state) {
                continue;
            }
            let id = product.add_state(state.clone());
            product.add_init(id);
            if state.0.nullable() {
                product.add_accepting(id);
            }
            worklist.push(state);
        }
    }

    while let Some(state) = worklist.pop() {
        let source = product.get(&state).expect("Worklist states are registered");
        let l = left.get(&state.0).expect("Left component is a left-automaton state");
        let r = right.get(&state.1).expect("Right component is a right-automaton state");

        for (a1, a2) in &pairs {
            for t1 in left.transitions_with(l, a1) {
                for t2 in right.transitions_with(r, a2) {
                    let next = (
                        left.state(t1.target).clone(),
                        right.state(t2.target).clone(),
                    );
                    if prunable(&next) {
                        continue;
                    }
                    let known = product.get(&next).is_some();
                    let target = product.add_state(next.clone());
                    if !known {
                        if next.0.nullable() {
                            product.add_accepting(target);
                        }
                        worklist.push(next);
                    }
                    product.add_transition(source, (*a1, *a2), target, 0);
                }
            }
        }
    }

    debug!(
        "Prefix product: {} states, {} transitions",
        product.num_states(),
        product.num_transitions(),
    );
    product
}

#[cfg(test)]
mod tests {
    use crate::compilation::composition::compose_automata;
    use crate::compilation::construction::expr_to_automaton;
    use crate::preprocessing::trace_expr::{TraceExpr, TraceVariable};

    #[test]
    /// Test the product of two plain program-variable automata: a single
    /// accepting state with one self-loop per letter pair on equal values.
    fn variable_product() {
        let lhs = expr_to_automaton(&TraceExpr::mk_var("x", TraceVariable::new("t")), &[0, 1]);
        let rhs = expr_to_automaton(&TraceExpr::mk_var("y", TraceVariable::new("s")), &[0, 1]);
        let product = compose_automata(&lhs, &rhs, &[0, 1]);

        assert_eq!(product.num_states(), 1);
        let init = product.initial_states()[0];
        assert!(product.is_accepting(init));

        // one (aₓ, aₓ) self-loop per alphabet letter
        let transitions = product.transitions(init);
        assert_eq!(transitions.len(), 2);
        for t in transitions {
            assert_eq!(t.label.0.value, t.label.1.value);
            assert!(t.label.0.is_x() && t.label.1.is_x());
        }
    }

    #[test]
    /// Test that states whose right side is exhausted before the left side
    /// can end are pruned.
    fn product_pruning() {
        // lhs = 0·x(t), rhs = 0: every surviving state with an exhausted right
        // side must have a nullable left side
        let lhs = expr_to_automaton(
            &TraceExpr::mk_concat(
                TraceExpr::mk_constant(0),
                TraceExpr::mk_var("x", TraceVariable::new("t")),
            ),
            &[0],
        );
        let rhs = expr_to_automaton(&TraceExpr::mk_constant(0), &[0]);
        let product = compose_automata(&lhs, &rhs, &[0]);

        for id in product.state_ids() {
            let (l, r) = product.state(id);
            assert!(*r != TraceExpr::Epsilon || l.nullable());
        }

        // lhs = 0·0, rhs = 0: the only successor of the initial state would be
        // (0, ε), which can never accept and is pruned away entirely
        let lhs = expr_to_automaton(
            &TraceExpr::mk_concat(TraceExpr::mk_constant(0), TraceExpr::mk_constant(0)),
            &[0],
        );
        let rhs = expr_to_automaton(&TraceExpr::mk_constant(0), &[0]);
        let product = compose_automata(&lhs, &rhs, &[0]);
        assert_eq!(product.num_states(), 1);
        assert_eq!(product.num_transitions(), 0);
    }

    #[test]
    /// Test that the product of a constant word with a variable pairs the
    /// constants of the left side with trace-read letters of the right side.
    fn constant_against_variable() {
        // lhs = 0·1 (two fixed letters), rhs = y(s) (any trace)
        let lhs = expr_to_automaton(
            &TraceExpr::mk_concat(TraceExpr::mk_constant(0), TraceExpr::mk_constant(1)),
            &[0, 1],
        );
        let rhs = expr_to_automaton(&TraceExpr::mk_var("y", TraceVariable::new("s")), &[0, 1]);
        let product = compose_automata(&lhs, &rhs, &[0, 1]);

        let init = product.initial_states()[0];
        // the only move from the initial state consumes 0 on both components
        let transitions = product.transitions(init);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].label.0.value, 0);
        assert!(!transitions[0].label.0.is_x());
        assert!(transitions[0].label.1.is_x());
    }
}
