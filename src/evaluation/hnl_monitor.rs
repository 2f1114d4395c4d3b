//! The HNL monitor: owns the instance store of one monitor level, schedules
//! atom monitors through the level's BDD plan, and aggregates instance
//! verdicts into the level verdict.

use crate::compilation::bdd_plan::PlanAction;
use crate::compilation::program::{
    AtomSpec, BindingRef, FunctionSide, HnlProgram, LevelProgram, QuantifierSource,
};
use crate::evaluation::atom_monitor::{
    AtomMonitor, AtomMonitorId, FunctionAtomMonitor, RegularAtomMonitor, SubAtomMonitor,
};
use crate::evaluation::function::FunctionRegistry;
use crate::evaluation::trace::{Trace, TraceId};
use crate::evaluation::trace_set::TraceSet;
use crate::evaluation::trace_set_view::TraceSetView;
use crate::evaluation::{MonitorStats, Verdict};

use log::debug;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// The runtime surroundings a monitor chain is parameterised by: the input
/// trace set and the function providers. There is no global state; every
/// monitor carries its environment.
#[derive(Clone)]
pub struct MonitorEnv {
    pub input: Rc<TraceSet>,
    pub functions: Rc<FunctionRegistry>,
}

/// One binding of the level's quantifiers to concrete traces, its position in
/// the BDD plan, and the atom monitor it currently waits for.
struct HnlInstance {
    bindings: Vec<Rc<Trace>>,
    cursor: usize,
    monitor: Rc<RefCell<AtomMonitor>>,
}

/// What happened to an instance after interpreting an atom verdict through
/// the plan.
enum InstanceFate {
    Keep,
    Retired,
    Violated,
}

/// A monitor for one (universal) level of a compiled formula.
pub struct HnlMonitor {
    level: Rc<LevelProgram>,
    env: MonitorEnv,
    fixed: Vec<Rc<Trace>>,
    sources: Vec<TraceSetView>,
    known: Vec<Vec<Rc<Trace>>>,
    seen_tuples: HashSet<Vec<TraceId>>,
    instances: Vec<HnlInstance>,
    monitors: HashMap<AtomMonitorId, Rc<RefCell<AtomMonitor>>>,
    verdict: Option<Verdict>,
    negate_output: bool,
    steps_functions: bool,
    stats: MonitorStats,
}

impl HnlMonitor {
    /// Create the top-level monitor of a compiled formula over the given input
    /// trace set. All functions the program mentions must be registered.
    pub fn new(
        program: &HnlProgram,
        input: Rc<TraceSet>,
        functions: Rc<FunctionRegistry>,
    ) -> Result<HnlMonitor, String> {
        validate_functions(&program.root, &functions)?;
        let env = MonitorEnv { input, functions };
        let mut monitor = Self::nested(program.root.clone(), env, Vec::new())?;
        monitor.negate_output = program.negate_output;
        monitor.steps_functions = true;
        Ok(monitor)
    }

    /// Create a monitor for a nested level, with the enclosing bindings fixed.
    pub(crate) fn nested(
        level: Rc<LevelProgram>,
        env: MonitorEnv,
        fixed: Vec<Rc<Trace>>,
    ) -> Result<HnlMonitor, String> {
        assert_eq!(
            fixed.len(),
            level.num_fixed,
            "Fixed bindings do not match the level program"
        );
        let sources = level
            .quantifiers
            .iter()
            .map(|q| match &q.source {
                QuantifierSource::Input => Ok(TraceSetView::of(env.input.clone())),
                QuantifierSource::Function { name, args } => {
                    let function = env
                        .functions
                        .get(name)
                        .ok_or_else(|| format!("Function '{name}' is not registered"))?;
                    let args: Vec<Rc<Trace>> = args
                        .iter()
                        .map(|binding| match binding {
                            BindingRef::Fixed(i) => fixed[*i].clone(),
                            BindingRef::Quantified(_) => {
                                unreachable!("Quantifier sources only reference fixed bindings")
                            }
                        })
                        .collect();
                    Ok(function.borrow_mut().get_trace_set(&args).view())
                }
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Self::with_sources(level, env, fixed, sources))
    }

    /// Create a monitor with explicitly provided per-quantifier sources; used
    /// by function atoms whose sources are resolved per instance.
    pub(crate) fn with_sources(
        level: Rc<LevelProgram>,
        env: MonitorEnv,
        fixed: Vec<Rc<Trace>>,
        sources: Vec<TraceSetView>,
    ) -> HnlMonitor {
        assert_eq!(sources.len(), level.quantifiers.len());
        let known = vec![Vec::new(); sources.len()];
        HnlMonitor {
            level,
            env,
            fixed,
            sources,
            known,
            seen_tuples: HashSet::new(),
            instances: Vec::new(),
            monitors: HashMap::new(),
            verdict: None,
            negate_output: false,
            steps_functions: false,
            stats: MonitorStats::default(),
        }
    }

    /// One cooperative step: instantiate new tuples, step every atom monitor
    /// once, advance instances through the plan, and aggregate.
    pub fn step(&mut self) -> Verdict {
        if let Some(verdict) = self.verdict {
            return self.output(verdict);
        }
        self.stats.num_steps += 1;
        if self.steps_functions {
            self.env.functions.step_all();
        }

        if self.instantiate() {
            return self.conclude(Verdict::False);
        }

        let monitors: Vec<Rc<RefCell<AtomMonitor>>> = self.monitors.values().cloned().collect();
        for monitor in monitors {
            monitor.borrow_mut().step();
        }

        let mut i = 0;
        while i < self.instances.len() {
            let verdict = self.instances[i].monitor.borrow().current_verdict();
            match verdict {
                Verdict::Unknown => i += 1,
                decisive => match self.advance_instance(i, decisive) {
                    InstanceFate::Keep => i += 1,
                    InstanceFate::Retired => {
                        self.instances.swap_remove(i);
                    }
                    InstanceFate::Violated => {
                        return self.conclude(Verdict::False);
                    }
                },
            }
        }

        // drop settled monitors nobody waits for any more
        self.monitors.retain(|_, m| Rc::strong_count(m) > 1);

        if self.done() {
            return self.conclude(Verdict::True);
        }
        Verdict::Unknown
    }

    /// The verdict reached so far, without stepping.
    pub fn verdict(&self) -> Verdict {
        match self.verdict {
            Some(verdict) => self.output(verdict),
            None => Verdict::Unknown,
        }
    }

    /// Whether the monitor's output is the negation of the level verdict (the
    /// case when the compiled prefix started existentially).
    pub(crate) fn set_negate_output(&mut self, negate: bool) {
        self.negate_output = negate;
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    fn output(&self, verdict: Verdict) -> Verdict {
        if self.negate_output {
            verdict.negated()
        } else {
            verdict
        }
    }

    fn conclude(&mut self, verdict: Verdict) -> Verdict {
        debug!("monitor [{}] concluded {verdict}", self.level.label);
        self.verdict = Some(verdict);
        // cancel every descendant monitor deterministically
        self.instances.clear();
        self.monitors.clear();
        self.output(verdict)
    }

    /// All instances are gone and no further ones can arrive.
    fn done(&self) -> bool {
        self.instances.is_empty() && self.sources.iter().all(|s| s.is_closed())
    }

    /// Pull new traces from every source and create the instances of every
    /// fresh tuple. Returns true when an instance is immediately violated by
    /// a constant plan.
    fn instantiate(&mut self) -> bool {
        let mut arrived = false;
        for q in 0..self.sources.len() {
            while let Some(trace) = self.sources[q].get_new_trace() {
                self.known[q].push(trace);
                arrived = true;
            }
        }
        if !arrived {
            return false;
        }

        let mut tuples: Vec<Vec<Rc<Trace>>> = Vec::new();
        collect_tuples(&self.known, &mut Vec::new(), &mut tuples);

        let mut violated = false;
        for tuple in tuples {
            let ids: Vec<TraceId> = tuple.iter().map(|t| t.id()).collect();
            if self.seen_tuples.contains(&ids) {
                continue;
            }
            if self.reduction_skips(&ids) {
                self.seen_tuples.insert(ids);
                continue;
            }
            self.seen_tuples.insert(ids);
            violated |= self.create_instance(tuple);
        }
        violated
    }

    /// Whether the reduction mode excludes the combination.
    fn reduction_skips(&self, ids: &[TraceId]) -> bool {
        let reduction = self.level.reduction;
        if !reduction.is_active() || ids.len() != 2 {
            return false;
        }
        if reduction.reflexive && ids[0] == ids[1] {
            return true;
        }
        reduction.symmetric && ids[0] > ids[1]
    }

    /// Create the instance of one tuple. Returns true when the plan decides
    /// FALSE without running any atom.
    fn create_instance(&mut self, bindings: Vec<Rc<Trace>>) -> bool {
        self.stats.num_instances += 1;
        let ids: Vec<TraceId> = bindings.iter().map(|t| t.id()).collect();
        debug!("HNLInstance[init, {ids:?}] in [{}]", self.level.label);

        match self.level.plan.initial {
            PlanAction::Result(true) => false,
            PlanAction::Result(false) => true,
            PlanAction::Row(row) => {
                let monitor = self.monitor_for_row(row, &bindings);
                self.instances.push(HnlInstance {
                    bindings,
                    cursor: row,
                    monitor,
                });
                false
            }
        }
    }

    /// Interpret a decisive atom verdict through the plan, moving the instance
    /// to its next atom monitor or retiring it.
    fn advance_instance(&mut self, index: usize, verdict: Verdict) -> InstanceFate {
        let mut verdict = verdict;
        loop {
            let row = &self.level.plan.rows[self.instances[index].cursor];
            let action = if verdict == Verdict::True { row.hi } else { row.lo };
            match action {
                PlanAction::Result(true) => return InstanceFate::Retired,
                PlanAction::Result(false) => return InstanceFate::Violated,
                PlanAction::Row(next) => {
                    let bindings = self.instances[index].bindings.clone();
                    let monitor = self.monitor_for_row(next, &bindings);
                    let next_verdict = monitor.borrow().current_verdict();
                    self.instances[index].cursor = next;
                    self.instances[index].monitor = monitor;
                    match next_verdict {
                        Verdict::Unknown => return InstanceFate::Keep,
                        decisive => verdict = decisive,
                    }
                }
            }
        }
    }

    /// The atom monitor for a plan row and a tuple of bindings, re-using an
    /// existing monitor with the same identity.
    fn monitor_for_row(
        &mut self,
        row: usize,
        bindings: &[Rc<Trace>],
    ) -> Rc<RefCell<AtomMonitor>> {
        let atom = self.level.plan.rows[row].atom;
        let used = self.level.atoms[atom].used_quantifiers(bindings.len());
        let id = AtomMonitorId {
            atom,
            traces: bindings
                .iter()
                .zip(used)
                .map(|(t, used)| if used { t.id() } else { 0 })
                .collect(),
        };
        if let Some(monitor) = self.monitors.get(&id) {
            return monitor.clone();
        }
        let monitor = Rc::new(RefCell::new(self.create_atom_monitor(atom, bindings)));
        self.stats.num_atom_monitors += 1;
        self.monitors.insert(id, monitor.clone());
        monitor
    }

    fn resolve_binding(&self, binding: BindingRef, bindings: &[Rc<Trace>]) -> Rc<Trace> {
        match binding {
            BindingRef::Quantified(i) => bindings[i].clone(),
            BindingRef::Fixed(i) => self.fixed[i].clone(),
        }
    }

    /// A trace-set view for one side of a function atom: the function's output
    /// set for the bound arguments, or a closed one-trace set around a bound
    /// trace.
    fn function_side_view(&self, side: &FunctionSide, bindings: &[Rc<Trace>]) -> TraceSetView {
        match side {
            FunctionSide::Bound(binding) => {
                let set = TraceSet::new(self.env.input.id_allocator());
                set.insert(self.resolve_binding(*binding, bindings));
                set.close();
                TraceSetView::of(set)
            }
            FunctionSide::Function { name, args } => {
                let function = self
                    .env
                    .functions
                    .get(name)
                    .expect("Functions were validated at construction");
                let args: Vec<Rc<Trace>> = args
                    .iter()
                    .map(|b| self.resolve_binding(*b, bindings))
                    .collect();
                function.borrow_mut().get_trace_set(&args).view()
            }
        }
    }

    fn create_atom_monitor(&self, atom: usize, bindings: &[Rc<Trace>]) -> AtomMonitor {
        match &self.level.atoms[atom] {
            AtomSpec::Regular {
                automaton,
                left,
                right,
                label,
                ..
            } => {
                debug!("new atom monitor for {label}");
                let left_trace = self.resolve_binding(left.binding, bindings);
                let right = right
                    .as_ref()
                    .map(|r| (self.resolve_binding(r.binding, bindings), r.field));
                AtomMonitor::Regular(RegularAtomMonitor::new(
                    automaton.clone(),
                    left_trace,
                    left.field,
                    right,
                ))
            }
            AtomSpec::Function {
                nested,
                left,
                right,
                label,
            } => {
                debug!("new function atom monitor for {label}");
                let sources = vec![
                    self.function_side_view(left, bindings),
                    self.function_side_view(right, bindings),
                ];
                let monitor =
                    HnlMonitor::with_sources(nested.clone(), self.env.clone(), Vec::new(), sources);
                AtomMonitor::Function(FunctionAtomMonitor::new(monitor))
            }
            AtomSpec::Sub { nested, negate } => {
                let mut fixed = self.fixed.clone();
                fixed.extend(bindings.iter().cloned());
                let monitor = HnlMonitor::nested(nested.clone(), self.env.clone(), fixed)
                    .expect("Functions were validated at construction");
                AtomMonitor::Sub(SubAtomMonitor::new(monitor, *negate))
            }
        }
    }
}

/// Check that every function mentioned anywhere in a level program (and its
/// nested levels) is registered.
fn validate_functions(level: &LevelProgram, functions: &FunctionRegistry) -> Result<(), String> {
    let check = |name: &str| -> Result<(), String> {
        if functions.get(name).is_none() {
            return Err(format!("Function '{name}' is not registered"));
        }
        Ok(())
    };
    for q in &level.quantifiers {
        if let QuantifierSource::Function { name, .. } = &q.source {
            check(name)?;
        }
    }
    for atom in &level.atoms {
        match atom {
            AtomSpec::Regular { .. } => {}
            AtomSpec::Function {
                nested, left, right, ..
            } => {
                for side in [left, right] {
                    if let FunctionSide::Function { name, .. } = side {
                        check(name)?;
                    }
                }
                validate_functions(nested, functions)?;
            }
            AtomSpec::Sub { nested, .. } => validate_functions(nested, functions)?,
        }
    }
    Ok(())
}

/// Enumerate the cartesian product of the per-quantifier known traces.
fn collect_tuples(
    known: &[Vec<Rc<Trace>>],
    tuple: &mut Vec<Rc<Trace>>,
    out: &mut Vec<Vec<Rc<Trace>>>,
) {
    let position = tuple.len();
    if position == known.len() {
        out.push(tuple.clone());
        return;
    }
    for trace in &known[position] {
        tuple.push(trace.clone());
        collect_tuples(known, tuple, out);
        tuple.pop();
    }
}

#[cfg(test)]
mod tests {
    use crate::compilation::program::{compile_formula, CompileOptions, Reduction};
    use crate::evaluation::function::FunctionRegistry;
    use crate::evaluation::hnl_monitor::HnlMonitor;
    use crate::evaluation::trace_set::{TraceIdAllocator, TraceSet};
    use crate::evaluation::Verdict;
    use crate::events::{EventSchema, FieldTy};
    use crate::preprocessing::hnl_formula::{BodyNode, IsPrefix, PrenexFormula, Quantifier};
    use crate::preprocessing::trace_expr::{TraceExpr, TraceVariable};
    use std::rc::Rc;

    fn schema() -> EventSchema {
        EventSchema::from_slices(&[("in", FieldTy::Int)]).unwrap()
    }

    fn universal_prefix_formula() -> PrenexFormula {
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

    fn run(monitor: &mut HnlMonitor) -> Verdict {
        for _ in 0..128 {
            let verdict = monitor.step();
            if verdict != Verdict::Unknown {
                return verdict;
            }
        }
        Verdict::Unknown
    }

    #[test]
    /// Test that de-duplication shares atom monitors between instances with
    /// the same identity and that instances are counted.
    fn instance_bookkeeping() {
        let formula = universal_prefix_formula();
        let opts = CompileOptions::new(schema()).with_alphabet(vec![0, 1]);
        let program = compile_formula(&formula, &opts).unwrap();

        let input = TraceSet::new(TraceIdAllocator::new());
        let mut monitor =
            HnlMonitor::new(&program, input.clone(), Rc::new(FunctionRegistry::new())).unwrap();

        let schema = schema();
        let t1 = input.new_trace();
        t1.append(schema.make_event(&[0]).unwrap());
        t1.set_finished();
        monitor.step();

        // one trace: the single tuple (t1, t1)
        assert_eq!(monitor.stats().num_instances, 1);
        assert_eq!(monitor.stats().num_atom_monitors, 1);

        let t2 = input.new_trace();
        t2.append(schema.make_event(&[0]).unwrap());
        t2.append(schema.make_event(&[1]).unwrap());
        t2.set_finished();
        monitor.step();

        // the three remaining tuples appeared; every identity is distinct
        assert_eq!(monitor.stats().num_instances, 4);

        input.close();
        assert_eq!(run(&mut monitor), Verdict::False);
    }

    #[test]
    /// Test the symmetric reduction: mirrored tuples are not instantiated.
    fn symmetric_reduction() {
        let formula = universal_prefix_formula();
        let opts = CompileOptions::new(schema())
            .with_alphabet(vec![0, 1])
            .with_reduction(Reduction {
                reflexive: false,
                symmetric: true,
            });
        let program = compile_formula(&formula, &opts).unwrap();

        let input = TraceSet::new(TraceIdAllocator::new());
        let mut monitor =
            HnlMonitor::new(&program, input.clone(), Rc::new(FunctionRegistry::new())).unwrap();

        let schema = schema();
        let t1 = input.new_trace();
        t1.append(schema.make_event(&[0]).unwrap());
        t1.set_finished();
        let t2 = input.new_trace();
        t2.append(schema.make_event(&[0]).unwrap());
        t2.append(schema.make_event(&[1]).unwrap());
        t2.set_finished();
        input.close();

        assert_eq!(run(&mut monitor), Verdict::True);
        // (t1, t1), (t1, t2), (t2, t2); the mirrored (t2, t1) is skipped
        assert_eq!(monitor.stats().num_instances, 3);
    }

    #[test]
    /// Test that an empty, closed input is vacuously true.
    fn vacuous_truth() {
        let formula = universal_prefix_formula();
        let opts = CompileOptions::new(schema()).with_alphabet(vec![0]);
        let program = compile_formula(&formula, &opts).unwrap();

        let input = TraceSet::new(TraceIdAllocator::new());
        input.close();
        let mut monitor =
            HnlMonitor::new(&program, input, Rc::new(FunctionRegistry::new())).unwrap();
        assert_eq!(monitor.step(), Verdict::True);
    }
}
