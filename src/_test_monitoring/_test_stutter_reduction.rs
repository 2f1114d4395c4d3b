use crate::_test_monitoring::_test_util::*;
use crate::compilation::program::{compile_formula, CompileOptions, Reduction};
use crate::evaluation::function::FunctionRegistry;
use crate::evaluation::hnl_monitor::HnlMonitor;
use crate::evaluation::trace_set::{TraceIdAllocator, TraceSet};
use crate::evaluation::Verdict;
use crate::preprocessing::hnl_formula::{BodyNode, IsPrefix};
use crate::preprocessing::trace_expr::{TraceExpr, TraceVariable};

use std::rc::Rc;

/// `⌊in(t1)⌋ ≤ ⌊in(t2)⌋`.
fn stuttered_body() -> BodyNode {
    BodyNode::mk_atom(IsPrefix::new(
        TraceExpr::mk_stutter_reduce(TraceExpr::mk_var("in", TraceVariable::new("t1"))),
        TraceExpr::mk_stutter_reduce(TraceExpr::mk_var("in", TraceVariable::new("t2"))),
    ))
}

fn run_over(traces: &[&[(i64, i64)]]) -> Verdict {
    let opts = CompileOptions::new(schema_in_out())
        .with_alphabet(vec![0, 1, 2, 3])
        .with_reduction(Reduction {
            reflexive: false,
            symmetric: true,
        });
    let program = compile_formula(&forall2(stuttered_body()), &opts).unwrap();

    let input = TraceSet::new(TraceIdAllocator::new());
    let schema = schema_in_out();
    for events in traces {
        add_trace(&input, &schema, events);
    }
    input.close();

    let mut monitor =
        HnlMonitor::new(&program, input, Rc::new(FunctionRegistry::new())).unwrap();
    run_to_verdict(&mut monitor)
}

#[test]
/// Both inputs stutter-reduce to `0·1`, so the relation holds.
fn equal_after_reduction() {
    let verdict = run_over(&[
        &[(0, 0), (0, 0), (0, 0), (1, 0), (1, 0)],
        &[(0, 0), (1, 0), (1, 0)],
    ]);
    assert_eq!(verdict, Verdict::True);
}

#[test]
/// `⌊0·0·1⌋ = 0·1` is a proper prefix of `⌊0·1·1·2⌋ = 0·1·2`.
fn proper_prefix_after_reduction() {
    let verdict = run_over(&[&[(0, 0), (0, 0), (1, 0)], &[(0, 0), (1, 0), (1, 0), (2, 0)]]);
    assert_eq!(verdict, Verdict::True);
}

#[test]
/// The reduced words diverge: `⌊0·0·2⌋ = 0·2` is not a prefix of `0·1`.
fn violated_after_reduction() {
    let verdict = run_over(&[&[(0, 0), (0, 0), (2, 0)], &[(0, 0), (1, 0), (1, 0)]]);
    assert_eq!(verdict, Verdict::False);
}

#[test]
/// Stuttering alone never breaks the relation between equal-content traces.
fn identical_modulo_stutter() {
    let verdict = run_over(&[
        &[(2, 0), (2, 0), (3, 0)],
        &[(2, 0), (3, 0), (3, 0), (3, 0)],
    ]);
    assert_eq!(verdict, Verdict::True);
}
