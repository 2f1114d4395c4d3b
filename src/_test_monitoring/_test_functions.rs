use crate::_test_monitoring::_test_util::*;
use crate::compilation::program::{compile_formula, CompileOptions, Reduction};
use crate::evaluation::function::{FunctionRegistry, FunctionTraces};
use crate::evaluation::hnl_monitor::HnlMonitor;
use crate::evaluation::shared_trace_set::SharedTraceSet;
use crate::evaluation::trace::{Trace, TraceQuery};
use crate::evaluation::trace_set::{TraceIdAllocator, TraceSet};
use crate::evaluation::Verdict;
use crate::events::EventSchema;
use crate::preprocessing::hnl_formula::{BodyNode, IsPrefix, PrenexFormula, Quantifier};
use crate::preprocessing::trace_expr::{FunctionTerm, ProgramVariable, TraceExpr, TraceVariable};

use std::cell::RefCell;
use std::rc::Rc;

/// A scripted provider: for every argument trace whose events are finished,
/// it produces one output trace consisting of `prefix`, a copy of the
/// argument, and `suffix`.
struct RewritingFunction {
    schema: EventSchema,
    ids: Rc<TraceIdAllocator>,
    prefix: Vec<(i64, i64)>,
    suffix: Vec<(i64, i64)>,
    outputs: Vec<(Rc<Trace>, SharedTraceSet, bool)>,
}

impl RewritingFunction {
    fn new(
        schema: EventSchema,
        ids: Rc<TraceIdAllocator>,
        prefix: Vec<(i64, i64)>,
        suffix: Vec<(i64, i64)>,
    ) -> RewritingFunction {
        RewritingFunction {
            schema,
            ids,
            prefix,
            suffix,
            outputs: Vec::new(),
        }
    }
}

impl FunctionTraces for RewritingFunction {
    fn get_trace_set(&mut self, args: &[Rc<Trace>]) -> SharedTraceSet {
        assert_eq!(args.len(), 1, "The test function is unary");
        if let Some((_, set, _)) = self
            .outputs
            .iter()
            .find(|(arg, _, _)| arg.id() == args[0].id())
        {
            return set.clone();
        }
        let set = SharedTraceSet::new(self.ids.clone());
        self.outputs.push((args[0].clone(), set.clone(), false));
        set
    }

    fn step(&mut self) {
        for (arg, set, produced) in self.outputs.iter_mut() {
            if *produced || !arg.is_finished() {
                continue;
            }
            let out = set.new_trace();
            for (input, output) in &self.prefix {
                out.append(self.schema.make_event(&[*input, *output]).unwrap());
            }
            for i in 0..arg.len() {
                if let TraceQuery::Has(event) = arg.get(i) {
                    out.append(event);
                }
            }
            for (input, output) in &self.suffix {
                out.append(self.schema.make_event(&[*input, *output]).unwrap());
            }
            out.set_finished();
            set.close();
            *produced = true;
        }
    }

    fn all_traces_finished(&self) -> bool {
        self.outputs.iter().all(|(_, _, produced)| *produced)
    }
}

/// `∀t1 ∀t2∈@f(t1) : in(t1) ≤ in(t2)`.
fn forall_from_fun_formula() -> PrenexFormula {
    let fun = FunctionTerm::new("f", vec![TraceVariable::new("t1")]);
    PrenexFormula::new(
        vec![
            Quantifier::mk_forall(TraceVariable::new("t1")),
            Quantifier::mk_forall_from_fun(TraceVariable::new("t2"), fun),
        ],
        projection_prefix("in", "t1", "t2"),
    )
}

/// `∀t1 ∀t2 : in(@f(t1)) ≤ in(t2)`.
fn function_atom_formula() -> PrenexFormula {
    let fun = FunctionTerm::new("f", vec![TraceVariable::new("t1")]);
    PrenexFormula::new(
        vec![
            Quantifier::mk_forall(TraceVariable::new("t1")),
            Quantifier::mk_forall(TraceVariable::new("t2")),
        ],
        BodyNode::mk_atom(IsPrefix::new(
            TraceExpr::Var(ProgramVariable::over_function("in", fun)),
            TraceExpr::mk_var("in", TraceVariable::new("t2")),
        )),
    )
}

fn run_with_function(
    formula: &PrenexFormula,
    reduction: Reduction,
    function: RewritingFunction,
    input: Rc<TraceSet>,
) -> Verdict {
    let opts = CompileOptions::new(schema_in_out())
        .with_alphabet(vec![0, 1, 2, 3])
        .with_reduction(reduction);
    let program = compile_formula(formula, &opts).unwrap();

    let mut registry = FunctionRegistry::new();
    registry.register("f", Rc::new(RefCell::new(function)));

    let mut monitor = HnlMonitor::new(&program, input, Rc::new(registry)).unwrap();
    run_to_verdict(&mut monitor)
}

#[test]
/// Every function output extends its argument, so quantifying over the
/// function traces keeps the prefix relation.
fn forall_from_fun_holds() {
    let schema = schema_in_out();
    let input = TraceSet::new(TraceIdAllocator::new());
    add_trace(&input, &schema, &[(0, 0)]);
    add_trace(&input, &schema, &[(0, 0), (1, 0)]);
    input.close();

    let function =
        RewritingFunction::new(schema, input.id_allocator(), vec![], vec![(1, 0)]);
    let verdict = run_with_function(
        &forall_from_fun_formula(),
        Reduction::default(),
        function,
        input,
    );
    assert_eq!(verdict, Verdict::True);
}

#[test]
/// The function prepends an event, so its outputs never extend the argument.
fn forall_from_fun_violated() {
    let schema = schema_in_out();
    let input = TraceSet::new(TraceIdAllocator::new());
    add_trace(&input, &schema, &[(0, 0)]);
    input.close();

    let function =
        RewritingFunction::new(schema, input.id_allocator(), vec![(3, 0)], vec![]);
    let verdict = run_with_function(
        &forall_from_fun_formula(),
        Reduction::default(),
        function,
        input,
    );
    assert_eq!(verdict, Verdict::False);
}

#[test]
/// A function atom: the extended first trace is a prefix of the second one.
fn function_atom_holds() {
    let schema = schema_in_out();
    let input = TraceSet::new(TraceIdAllocator::new());
    add_trace(&input, &schema, &[(0, 0)]);
    add_trace(&input, &schema, &[(0, 0), (1, 0), (3, 0)]);
    input.close();

    let function =
        RewritingFunction::new(schema, input.id_allocator(), vec![], vec![(1, 0)]);
    let verdict = run_with_function(
        &function_atom_formula(),
        Reduction {
            reflexive: true,
            symmetric: true,
        },
        function,
        input,
    );
    assert_eq!(verdict, Verdict::True);
}

#[test]
/// A function atom violated: the second trace diverges from the extension.
fn function_atom_violated() {
    let schema = schema_in_out();
    let input = TraceSet::new(TraceIdAllocator::new());
    add_trace(&input, &schema, &[(0, 0)]);
    add_trace(&input, &schema, &[(0, 0), (2, 0), (3, 0)]);
    input.close();

    let function =
        RewritingFunction::new(schema, input.id_allocator(), vec![], vec![(1, 0)]);
    let verdict = run_with_function(
        &function_atom_formula(),
        Reduction {
            reflexive: true,
            symmetric: true,
        },
        function,
        input,
    );
    assert_eq!(verdict, Verdict::False);
}

#[test]
/// A program mentioning an unregistered function is rejected at monitor
/// construction.
fn missing_function_is_rejected() {
    let opts = CompileOptions::new(schema_in_out()).with_alphabet(vec![0, 1]);
    let program = compile_formula(&forall_from_fun_formula(), &opts).unwrap();
    let input = TraceSet::new(TraceIdAllocator::new());
    let result = HnlMonitor::new(&program, input, Rc::new(FunctionRegistry::new()));
    assert!(result.is_err());
}
