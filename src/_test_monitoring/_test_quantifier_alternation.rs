use crate::_test_monitoring::_test_util::*;
use crate::compilation::program::{compile_formula, CompileOptions};
use crate::evaluation::function::FunctionRegistry;
use crate::evaluation::hnl_monitor::HnlMonitor;
use crate::evaluation::trace_set::{TraceIdAllocator, TraceSet};
use crate::evaluation::Verdict;
use crate::preprocessing::hnl_formula::{BodyNode, IsPrefix, PrenexFormula, Quantifier};
use crate::preprocessing::trace_expr::{TraceExpr, TraceVariable};

use std::rc::Rc;

/// `∀t1 ∃t2 : in(t1) ≤ in(t2)`.
fn forall_exists() -> PrenexFormula {
    PrenexFormula::new(
        vec![
            Quantifier::mk_forall(TraceVariable::new("t1")),
            Quantifier::mk_exists(TraceVariable::new("t2")),
        ],
        projection_prefix("in", "t1", "t2"),
    )
}

/// `∃t1 ∀t2 : in(t1) ≤ in(t2)`.
fn exists_forall() -> PrenexFormula {
    PrenexFormula::new(
        vec![
            Quantifier::mk_exists(TraceVariable::new("t1")),
            Quantifier::mk_forall(TraceVariable::new("t2")),
        ],
        projection_prefix("in", "t1", "t2"),
    )
}

fn run_formula(formula: &PrenexFormula, traces: &[&[(i64, i64)]]) -> Verdict {
    let opts = CompileOptions::new(schema_in_out()).with_alphabet(vec![0, 1, 2, 3]);
    let program = compile_formula(formula, &opts).unwrap();

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
/// Every trace has an extension among the traces (itself at least), so the
/// existential witness always exists.
fn forall_exists_holds() {
    let verdict = run_formula(
        &forall_exists(),
        &[&[(0, 0)], &[(0, 0), (1, 0)], &[(0, 0), (2, 0)]],
    );
    assert_eq!(verdict, Verdict::True);
}

#[test]
/// `∀t1 ∃t2 : in(t1) ≤ out(t2)`: the input `[1, 2]` has no output witness,
/// so the existential part fails for one instance. (With the same projection
/// on both sides the formula is trivially true, every trace witnessing
/// itself.)
fn forall_exists_violated() {
    let formula = PrenexFormula::new(
        vec![
            Quantifier::mk_forall(TraceVariable::new("t1")),
            Quantifier::mk_exists(TraceVariable::new("t2")),
        ],
        BodyNode::mk_atom(IsPrefix::new(
            TraceExpr::mk_var("in", TraceVariable::new("t1")),
            TraceExpr::mk_var("out", TraceVariable::new("t2")),
        )),
    );
    let verdict = run_formula(&formula, &[&[(1, 0), (2, 0)], &[(0, 0), (0, 0)]]);
    assert_eq!(verdict, Verdict::False);
}

#[test]
/// `[0]` is a prefix of every trace, witnessing the existential prefix.
fn exists_forall_holds() {
    let verdict = run_formula(
        &exists_forall(),
        &[&[(0, 0)], &[(0, 0), (1, 0)], &[(0, 0), (2, 0)]],
    );
    assert_eq!(verdict, Verdict::True);
}

#[test]
/// With diverging traces, no single trace is a prefix of all others.
fn exists_forall_violated() {
    let verdict = run_formula(
        &exists_forall(),
        &[&[(0, 0), (1, 0)], &[(0, 0), (2, 0)], &[(3, 0)]],
    );
    assert_eq!(verdict, Verdict::False);
}
