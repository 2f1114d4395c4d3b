use crate::_test_monitoring::_test_util::*;
use crate::compilation::program::{compile_formula, CompileOptions, Reduction};
use crate::evaluation::function::FunctionRegistry;
use crate::evaluation::hnl_monitor::HnlMonitor;
use crate::evaluation::trace_set::{TraceIdAllocator, TraceSet};
use crate::evaluation::Verdict;
use crate::preprocessing::hnl_formula::BodyNode;

use std::rc::Rc;

fn options() -> CompileOptions {
    CompileOptions::new(schema_in_out())
        .with_alphabet(vec![0, 1, 2, 3])
        .with_reduction(Reduction {
            reflexive: false,
            symmetric: true,
        })
}

fn monitor_over(body: BodyNode, traces: &[&[(i64, i64)]]) -> HnlMonitor {
    let program = compile_formula(&forall2(body), &options()).unwrap();
    let input = TraceSet::new(TraceIdAllocator::new());
    let schema = schema_in_out();
    for events in traces {
        add_trace(&input, &schema, events);
    }
    input.close();
    HnlMonitor::new(&program, input, Rc::new(FunctionRegistry::new())).unwrap()
}

#[test]
/// The input projection of the first trace is a prefix of the second one.
fn trivial_prefix() {
    let body = projection_prefix("in", "t1", "t2");
    let mut monitor = monitor_over(body, &[&[(0, 0)], &[(0, 0), (1, 0)]]);
    assert_eq!(run_to_verdict(&mut monitor), Verdict::True);
}

#[test]
/// The input projections diverge, so the prefix relation is violated.
fn violated_prefix() {
    let body = projection_prefix("in", "t1", "t2");
    let mut monitor = monitor_over(body, &[&[(0, 0), (1, 0)], &[(0, 0), (2, 0)]]);
    assert_eq!(run_to_verdict(&mut monitor), Verdict::False);
}

#[test]
/// Output determinism: equal inputs imply prefix-related outputs. Here the
/// outputs agree, so the property holds.
fn output_determinism_holds() {
    let body = BodyNode::mk_or(
        BodyNode::mk_not(projection_prefix("in", "t1", "t2")),
        projection_prefix("out", "t1", "t2"),
    );
    let mut monitor = monitor_over(body, &[&[(0, 2), (1, 3)], &[(0, 2), (1, 3), (2, 3)]]);
    assert_eq!(run_to_verdict(&mut monitor), Verdict::True);
}

#[test]
/// Output determinism violated: equal inputs, diverging outputs.
fn output_determinism_violated() {
    let body = BodyNode::mk_or(
        BodyNode::mk_not(projection_prefix("in", "t1", "t2")),
        projection_prefix("out", "t1", "t2"),
    );
    let mut monitor = monitor_over(body, &[&[(0, 2), (1, 3)], &[(0, 2), (1, 1), (2, 3)]]);
    assert_eq!(run_to_verdict(&mut monitor), Verdict::False);
}

#[test]
/// The monitor stays undecided while a relevant trace can still grow, and
/// decides once the missing events arrive.
fn online_progress() {
    let body = projection_prefix("in", "t1", "t2");
    let program = compile_formula(&forall2(body), &options()).unwrap();
    let input = TraceSet::new(TraceIdAllocator::new());
    let schema = schema_in_out();

    let t1 = input.new_trace();
    t1.append(schema.make_event(&[0, 0]).unwrap());
    t1.set_finished();
    let t2 = input.new_trace();
    t2.append(schema.make_event(&[0, 0]).unwrap());
    input.close();

    let mut monitor =
        HnlMonitor::new(&program, input.clone(), Rc::new(FunctionRegistry::new())).unwrap();
    for _ in 0..16 {
        assert_eq!(monitor.step(), Verdict::Unknown);
    }

    t2.append(schema.make_event(&[1, 0]).unwrap());
    t2.set_finished();
    assert_eq!(run_to_verdict(&mut monitor), Verdict::True);
}
