use crate::evaluation::hnl_monitor::HnlMonitor;
use crate::evaluation::trace::Trace;
use crate::evaluation::trace_set::TraceSet;
use crate::evaluation::Verdict;
use crate::events::{EventSchema, FieldTy};
use crate::preprocessing::hnl_formula::{BodyNode, IsPrefix, PrenexFormula, Quantifier};
use crate::preprocessing::trace_expr::{TraceExpr, TraceVariable};

use std::rc::Rc;

/// The `in: int, out: int` schema used by most scenarios.
pub(super) fn schema_in_out() -> EventSchema {
    EventSchema::from_slices(&[("in", FieldTy::Int), ("out", FieldTy::Int)]).unwrap()
}

/// Append one `(in, out)` event per pair and finish the trace.
pub(super) fn fill_trace(trace: &Rc<Trace>, schema: &EventSchema, events: &[(i64, i64)]) {
    for (input, output) in events {
        trace.append(schema.make_event(&[*input, *output]).unwrap());
    }
    trace.set_finished();
}

/// Add a finished trace with the given `(in, out)` events to the set.
pub(super) fn add_trace(set: &Rc<TraceSet>, schema: &EventSchema, events: &[(i64, i64)]) {
    let trace = set.new_trace();
    fill_trace(&trace, schema, events);
}

/// The atom `field(t_left) ≤ field(t_right)` as a body node.
pub(super) fn projection_prefix(field: &str, left: &str, right: &str) -> BodyNode {
    BodyNode::mk_atom(IsPrefix::new(
        TraceExpr::mk_var(field, TraceVariable::new(left)),
        TraceExpr::mk_var(field, TraceVariable::new(right)),
    ))
}

/// `∀t1 ∀t2 : body`.
pub(super) fn forall2(body: BodyNode) -> PrenexFormula {
    PrenexFormula::new(
        vec![
            Quantifier::mk_forall(TraceVariable::new("t1")),
            Quantifier::mk_forall(TraceVariable::new("t2")),
        ],
        body,
    )
}

/// Step the monitor until it reaches a decisive verdict, with a step bound so
/// that a livelocked monitor fails the test instead of hanging it.
pub(super) fn run_to_verdict(monitor: &mut HnlMonitor) -> Verdict {
    for _ in 0..256 {
        let verdict = monitor.step();
        if verdict.is_decisive() {
            return verdict;
        }
    }
    Verdict::Unknown
}
