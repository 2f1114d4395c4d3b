//! Compiled monitor programs: the immutable artifacts produced from HNL
//! formulas and hypernode automata, shared by all monitors they spawn.

use crate::compilation::bdd_plan::{build_plan, BddPlan, PlanAction, PlanRow};
use crate::compilation::canonization::{canonize_atom, canonize_side};
use crate::compilation::composition::compose_automata;
use crate::compilation::construction::expr_to_automaton;
use crate::compilation::priority::{to_priority_automaton, PriorityAutomaton};
use crate::compilation::splitter::{group_is_existential, split_same_kind, universalized};
use crate::events::EventSchema;
use crate::preprocessing::hna_automaton::HypernodeAutomaton;
use crate::compilation::automaton::Automaton;
use crate::preprocessing::hnl_formula::{BodyNode, IsPrefix, PrenexFormula, Quantifier};
use crate::preprocessing::operator_enums::QuantifierKind;
use crate::preprocessing::trace_expr::{
    Constant, ProgramVariable, TraceExpr, TraceTerm, TraceVariable,
};

use log::debug;
use std::collections::HashMap;
use std::rc::Rc;

/// The reduction mode applied when instantiating two-quantifier prefixes:
/// `reflexive` skips identical pairs, `symmetric` instantiates each unordered
/// pair only once.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Reduction {
    pub reflexive: bool,
    pub symmetric: bool,
}

impl Reduction {
    pub fn is_active(&self) -> bool {
        self.reflexive || self.symmetric
    }
}

/// Everything compilation needs besides the specification itself.
#[derive(Clone, Debug)]
pub struct CompileOptions {
    pub schema: EventSchema,
    /// The alphabet of event-field values. When absent, the constants of the
    /// compiled formula(s) are used.
    pub alphabet: Option<Vec<i64>>,
    pub reduction: Reduction,
}

impl CompileOptions {
    pub fn new(schema: EventSchema) -> CompileOptions {
        CompileOptions {
            schema,
            alphabet: None,
            reduction: Reduction::default(),
        }
    }

    pub fn with_alphabet(mut self, alphabet: Vec<i64>) -> CompileOptions {
        self.alphabet = Some(alphabet);
        self
    }

    pub fn with_reduction(mut self, reduction: Reduction) -> CompileOptions {
        self.reduction = reduction;
        self
    }
}

/// A reference to a bound trace at runtime: either one of the level's own
/// quantifiers, or one of the bindings fixed by the enclosing monitors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BindingRef {
    Quantified(usize),
    Fixed(usize),
}

/// One side of a regular atom: which event field is projected, and which
/// bound trace it is read from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AtomSide {
    pub field: usize,
    pub binding: BindingRef,
}

/// One side of a function atom: either a single bound trace (treated as a
/// one-element trace set), or the output trace set of a function applied to
/// bound traces.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FunctionSide {
    Bound(BindingRef),
    Function { name: String, args: Vec<BindingRef> },
}

/// Where a quantifier of a level draws its traces from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum QuantifierSource {
    /// The monitored input trace set.
    Input,
    /// The output of a registered function applied to fixed bindings.
    Function { name: String, args: Vec<BindingRef> },
}

/// One quantifier of a compiled level. All compiled quantifiers are universal;
/// existential groups were rewritten by the splitter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QuantifierSpec {
    pub name: String,
    pub source: QuantifierSource,
}

/// A compiled atom, the unit scheduled by the BDD plan of its level.
#[derive(Clone, Debug)]
pub enum AtomSpec {
    /// An atom evaluated by running a priority automaton over two trace
    /// cursors. The automaton may be shared with other atoms; `automaton_id`
    /// identifies the shared object.
    Regular {
        automaton_id: usize,
        automaton: Rc<PriorityAutomaton>,
        left: AtomSide,
        right: Option<AtomSide>,
        label: String,
    },
    /// An atom over function-produced trace sets, evaluated by a nested
    /// monitor for the negation of the atom; the verdict is negated back at
    /// the atom boundary.
    Function {
        nested: Rc<LevelProgram>,
        left: FunctionSide,
        right: FunctionSide,
        label: String,
    },
    /// The placeholder atom of a split level: its monitor is the nested
    /// monitor of the next level, negated per the link polarity.
    Sub { nested: Rc<LevelProgram>, negate: bool },
}

impl AtomSpec {
    /// Which of the level's own quantifiers the atom depends on. Used to build
    /// the identity under which atom monitors are de-duplicated.
    pub fn used_quantifiers(&self, num_quantifiers: usize) -> Vec<bool> {
        let mut used = vec![false; num_quantifiers];
        let mut mark = |binding: &BindingRef| {
            if let BindingRef::Quantified(i) = binding {
                used[*i] = true;
            }
        };
        match self {
            AtomSpec::Regular { left, right, .. } => {
                mark(&left.binding);
                if let Some(right) = right {
                    mark(&right.binding);
                }
            }
            AtomSpec::Function { left, right, .. } => {
                for side in [left, right] {
                    match side {
                        FunctionSide::Bound(binding) => mark(binding),
                        FunctionSide::Function { args, .. } => args.iter().for_each(&mut mark),
                    }
                }
            }
            AtomSpec::Sub { .. } => used.fill(true),
        }
        used
    }
}

/// One monitor level: a universal quantifier group over a scheduled body.
#[derive(Clone, Debug)]
pub struct LevelProgram {
    pub quantifiers: Vec<QuantifierSpec>,
    pub num_fixed: usize,
    pub reduction: Reduction,
    pub plan: BddPlan,
    pub atoms: Vec<AtomSpec>,
    pub label: String,
}

/// A compiled HNL formula: the root monitor level, and whether the root
/// verdict must be negated (the case when the original prefix starts
/// existentially).
#[derive(Clone, Debug)]
pub struct HnlProgram {
    pub schema: EventSchema,
    pub alphabet: Vec<i64>,
    pub root: Rc<LevelProgram>,
    pub negate_output: bool,
}

/// One hypernode of a compiled HNA: its name and the compiled formula all
/// slices assigned to the node run.
#[derive(Clone, Debug)]
pub struct HnaStateProgram {
    pub name: String,
    pub root: Rc<LevelProgram>,
    pub negate_output: bool,
}

/// A compiled hypernode automaton: per-state formula programs and the
/// deterministic transition function over action ids.
#[derive(Clone, Debug)]
pub struct HnaProgram {
    pub schema: EventSchema,
    pub alphabet: Vec<i64>,
    pub actions: Vec<String>,
    pub states: Vec<HnaStateProgram>,
    pub delta: Vec<HashMap<usize, usize>>,
    pub initial: usize,
}

impl HnaProgram {
    pub fn action_id(&self, name: &str) -> Option<usize> {
        self.actions.iter().position(|a| a == name)
    }
}

/// Cache of compiled automata, so that atoms isomorphic modulo variable
/// renaming share one priority automaton (and side automata are built once).
#[derive(Default)]
struct AutomataCache {
    sides: HashMap<TraceExpr, Rc<Automaton<TraceExpr, Constant>>>,
    atoms: HashMap<IsPrefix, (usize, Rc<PriorityAutomaton>)>,
}

impl AutomataCache {
    fn atom_automaton(
        &mut self,
        atom: &IsPrefix,
        alphabet: &[i64],
    ) -> (usize, Rc<PriorityAutomaton>) {
        let canonical = canonize_atom(atom);
        if let Some(found) = self.atoms.get(&canonical) {
            debug!("Re-using the automaton of {canonical} for {atom}");
            return found.clone();
        }

        let lhs = canonize_side(&atom.lhs);
        let left = self
            .sides
            .entry(lhs.clone())
            .or_insert_with(|| Rc::new(expr_to_automaton(&lhs, alphabet)))
            .clone();
        let rhs = canonize_side(&atom.rhs);
        let right = self
            .sides
            .entry(rhs.clone())
            .or_insert_with(|| Rc::new(expr_to_automaton(&rhs, alphabet)))
            .clone();

        let composed = compose_automata(&left, &right, alphabet);
        let automaton = Rc::new(to_priority_automaton(&composed));
        let id = self.atoms.len();
        self.atoms.insert(canonical, (id, automaton.clone()));
        (id, automaton)
    }
}

struct CompileCtx<'a> {
    schema: &'a EventSchema,
    alphabet: &'a [i64],
    reduction: Reduction,
}

/// Compile a prenex HNL formula into a monitor program.
pub fn compile_formula(
    formula: &PrenexFormula,
    opts: &CompileOptions,
) -> Result<HnlProgram, String> {
    let alphabet = resolve_alphabet(opts, formula.constants())?;
    let mut cache = AutomataCache::default();
    let (root, negate_output) = compile_formula_with(formula, opts, &alphabet, &mut cache)?;
    Ok(HnlProgram {
        schema: opts.schema.clone(),
        alphabet,
        root,
        negate_output,
    })
}

/// Compile a hypernode automaton into a monitor program. The automaton must be
/// deterministic and have at least one state; when no alphabet is given, the
/// union of constants across all state formulas is used.
pub fn compile_automaton(
    hna: &HypernodeAutomaton,
    opts: &CompileOptions,
) -> Result<HnaProgram, String> {
    if let Some((state, action)) = hna.nondeterminism() {
        return Err(format!(
            "The HNA is not deterministic: state '{}' has several transitions on action '{}'",
            hna.states()[state].name,
            hna.actions()[action]
        ));
    }
    let initial = hna
        .initial()
        .ok_or_else(|| "The HNA has no states".to_string())?;

    let mut constants = Vec::new();
    for state in hna.states() {
        for value in state.formula.constants() {
            if !constants.contains(&value) {
                constants.push(value);
            }
        }
    }
    let alphabet = resolve_alphabet(opts, constants)?;

    let mut states = Vec::new();
    for state in hna.states() {
        let mut cache = AutomataCache::default();
        let (root, negate_output) =
            compile_formula_with(&state.formula, opts, &alphabet, &mut cache).map_err(|e| {
                format!("In the formula of hypernode '{}': {e}", state.name)
            })?;
        states.push(HnaStateProgram {
            name: state.name.clone(),
            root,
            negate_output,
        });
    }

    let mut delta: Vec<HashMap<usize, usize>> = vec![HashMap::new(); hna.states().len()];
    for (source, action, target) in hna.transitions() {
        delta[*source].insert(*action, *target);
    }

    Ok(HnaProgram {
        schema: opts.schema.clone(),
        alphabet,
        actions: hna.actions().to_vec(),
        states,
        delta,
        initial,
    })
}

fn resolve_alphabet(opts: &CompileOptions, constants: Vec<i64>) -> Result<Vec<i64>, String> {
    let mut alphabet = match &opts.alphabet {
        Some(alphabet) => alphabet.clone(),
        None => constants,
    };
    alphabet.sort_unstable();
    alphabet.dedup();
    if alphabet.is_empty() {
        return Err(
            "The alphabet is empty: the formula has no constants, provide an explicit alphabet"
                .to_string(),
        );
    }
    Ok(alphabet)
}

fn compile_formula_with(
    formula: &PrenexFormula,
    opts: &CompileOptions,
    alphabet: &[i64],
    cache: &mut AutomataCache,
) -> Result<(Rc<LevelProgram>, bool), String> {
    let problems = formula.problems();
    if !problems.is_empty() {
        return Err(problems.join("; "));
    }
    if !formula.is_simple() {
        return Err(format!(
            "The formula is not simple: some prefix atom has several program-variable \
             occurrences on one side: {formula}"
        ));
    }
    for atom in formula.formula.atoms() {
        for side in [&atom.lhs, &atom.rhs] {
            if side.iterates_program_variable() {
                return Err(format!(
                    "Iteration over a program variable is not supported: {side}"
                ));
            }
        }
    }

    let ctx = CompileCtx {
        schema: &opts.schema,
        alphabet,
        reduction: opts.reduction,
    };
    compile_level(
        &formula.quantifier_prefix,
        &formula.formula,
        &[],
        &ctx,
        cache,
    )
}

/// Compile one monitor level and, recursively, the levels below it. Returns
/// the level program and whether its verdict is the negation of the semantics
/// of `quantifiers · body` (the case for existential groups).
fn compile_level(
    quantifiers: &[Quantifier],
    body: &BodyNode,
    fixed: &[TraceVariable],
    ctx: &CompileCtx,
    cache: &mut AutomataCache,
) -> Result<(Rc<LevelProgram>, bool), String> {
    let (prefix, rest) = split_same_kind(quantifiers);
    let negate_self = group_is_existential(prefix);
    let prefix = universalized(prefix);

    let reduction = ctx.reduction;
    if reduction.is_active() && prefix.len() > 2 {
        return Err(format!(
            "Reductions are only supported for two quantifiers, the prefix has {}",
            prefix.len()
        ));
    }

    let quantifier_specs = build_quantifier_specs(&prefix, fixed)?;
    let label = level_label(&prefix, body);

    if rest.is_empty() {
        let body_eff = if negate_self {
            BodyNode::mk_not(body.clone())
        } else {
            body.clone()
        };
        let atoms = compile_atoms(&body_eff, &prefix, fixed, ctx, cache)?;
        let atom_list: Vec<IsPrefix> = body_eff.atoms().into_iter().cloned().collect();
        let plan = build_plan(&body_eff, &atom_list)?;
        let level = Rc::new(LevelProgram {
            quantifiers: quantifier_specs,
            num_fixed: fixed.len(),
            reduction,
            plan,
            atoms,
            label,
        });
        return Ok((level, negate_self));
    }

    // nested level: this level's bindings become fixed below
    let mut sub_fixed = fixed.to_vec();
    sub_fixed.extend(prefix.iter().map(|q| q.var.clone()));
    let (nested, sub_negated) = compile_level(rest, body, &sub_fixed, ctx, cache)?;
    let negate_link = sub_negated != negate_self;

    let level = Rc::new(LevelProgram {
        quantifiers: quantifier_specs,
        num_fixed: fixed.len(),
        reduction,
        plan: BddPlan {
            rows: vec![PlanRow {
                atom: 0,
                hi: PlanAction::Result(true),
                lo: PlanAction::Result(false),
            }],
            initial: PlanAction::Row(0),
        },
        atoms: vec![AtomSpec::Sub {
            nested,
            negate: negate_link,
        }],
        label,
    });
    Ok((level, negate_self))
}

fn level_label(prefix: &[Quantifier], body: &BodyNode) -> String {
    let mut label = String::new();
    for q in prefix {
        label.push_str(&format!("{q} "));
    }
    label.push_str(&format!(": {body}"));
    label
}

fn build_quantifier_specs(
    prefix: &[Quantifier],
    fixed: &[TraceVariable],
) -> Result<Vec<QuantifierSpec>, String> {
    prefix
        .iter()
        .map(|q| {
            let source = match &q.kind {
                QuantifierKind::ForAll => QuantifierSource::Input,
                QuantifierKind::ForAllFromFun(fun) => {
                    let args = fun
                        .traces
                        .iter()
                        .map(|arg| match fixed.iter().position(|f| f == arg) {
                            Some(i) => Ok(BindingRef::Fixed(i)),
                            None => Err(format!(
                                "Function argument {arg} of quantifier {q} must be bound by an \
                                 enclosing quantifier group"
                            )),
                        })
                        .collect::<Result<Vec<_>, String>>()?;
                    QuantifierSource::Function {
                        name: fun.name.clone(),
                        args,
                    }
                }
                QuantifierKind::Exists => {
                    unreachable!("Existential quantifiers are rewritten before this point")
                }
            };
            Ok(QuantifierSpec {
                name: q.var.name().to_string(),
                source,
            })
        })
        .collect()
}

fn resolve_binding(
    var: &TraceVariable,
    prefix: &[Quantifier],
    fixed: &[TraceVariable],
) -> Result<BindingRef, String> {
    if let Some(i) = prefix.iter().position(|q| q.var == *var) {
        return Ok(BindingRef::Quantified(i));
    }
    if let Some(i) = fixed.iter().position(|f| f == var) {
        return Ok(BindingRef::Fixed(i));
    }
    Err(format!("Trace variable {var} is not bound"))
}

fn compile_atoms(
    body: &BodyNode,
    prefix: &[Quantifier],
    fixed: &[TraceVariable],
    ctx: &CompileCtx,
    cache: &mut AutomataCache,
) -> Result<Vec<AtomSpec>, String> {
    body.atoms()
        .into_iter()
        .map(|atom| compile_atom(atom, prefix, fixed, ctx, cache))
        .collect()
}

fn compile_atom(
    atom: &IsPrefix,
    prefix: &[Quantifier],
    fixed: &[TraceVariable],
    ctx: &CompileCtx,
    cache: &mut AutomataCache,
) -> Result<AtomSpec, String> {
    if !atom.functions().is_empty() {
        return compile_function_atom(atom, prefix, fixed, ctx, cache);
    }

    let resolve_side = |side: &TraceExpr| -> Result<Option<AtomSide>, String> {
        let vars = side.program_variable_occurrences();
        let Some(var) = vars.first() else {
            return Ok(None);
        };
        let field = ctx.schema.field_index(&var.name).ok_or_else(|| {
            format!("Program variable '{}' does not match any event-schema field", var.name)
        })?;
        let TraceTerm::Variable(trace) = &var.trace else {
            unreachable!("Function-free atom has no function trace terms");
        };
        let binding = resolve_binding(trace, prefix, fixed)?;
        Ok(Some(AtomSide { field, binding }))
    };

    let left = resolve_side(&atom.lhs)?;
    let right = resolve_side(&atom.rhs)?;
    if left.is_none() && right.is_none() {
        return Err(format!(
            "Prefix atom {atom} has no program variables on either side"
        ));
    }
    let Some(left) = left else {
        return Err(format!(
            "Prefix atom {atom} has a program variable only on the right side, \
             which is not supported"
        ));
    };

    let (automaton_id, automaton) = cache.atom_automaton(atom, ctx.alphabet);
    Ok(AtomSpec::Regular {
        automaton_id,
        automaton,
        left,
        right,
        label: atom.to_string(),
    })
}

/// Compile an atom that mentions function-produced traces: a nested level
/// monitors the negation of the atom over all pairs of traces from the two
/// sides' trace sets, and the atom monitor negates the nested verdict back.
fn compile_function_atom(
    atom: &IsPrefix,
    prefix: &[Quantifier],
    fixed: &[TraceVariable],
    ctx: &CompileCtx,
    cache: &mut AutomataCache,
) -> Result<AtomSpec, String> {
    let resolve_function_side =
        |side: &TraceExpr, nested_var: &str| -> Result<(FunctionSide, TraceExpr), String> {
            let vars = side.program_variable_occurrences();
            let Some(var) = vars.first() else {
                return Err(format!(
                    "A function atom requires a program variable on both sides: {atom}"
                ));
            };
            let source = match &var.trace {
                TraceTerm::Variable(trace) => {
                    FunctionSide::Bound(resolve_binding(trace, prefix, fixed)?)
                }
                TraceTerm::Function(fun) => {
                    let args = fun
                        .traces
                        .iter()
                        .map(|arg| resolve_binding(arg, prefix, fixed))
                        .collect::<Result<Vec<_>, String>>()?;
                    FunctionSide::Function {
                        name: fun.name.clone(),
                        args,
                    }
                }
            };
            // rebind the side onto the nested quantifier variable
            let rebound = side.map_program_variables(&|v| ProgramVariable {
                name: v.name.clone(),
                trace: TraceTerm::Variable(TraceVariable::new(nested_var)),
            });
            Ok((source, rebound))
        };

    let (left_source, left_expr) = resolve_function_side(&atom.lhs, "l")?;
    let (right_source, right_expr) = resolve_function_side(&atom.rhs, "r")?;

    let nested_atom = IsPrefix::new(left_expr, right_expr);
    let nested_body = BodyNode::mk_not(BodyNode::mk_atom(nested_atom.clone()));
    let nested_prefix = vec![
        Quantifier::mk_forall(TraceVariable::new("l")),
        Quantifier::mk_forall(TraceVariable::new("r")),
    ];

    let nested_specs = compile_atoms(&nested_body, &nested_prefix, &[], ctx, cache)?;
    let plan = build_plan(&nested_body, &[nested_atom.clone()])?;
    let nested = Rc::new(LevelProgram {
        quantifiers: vec![
            QuantifierSpec {
                name: "l".to_string(),
                source: QuantifierSource::Input,
            },
            QuantifierSpec {
                name: "r".to_string(),
                source: QuantifierSource::Input,
            },
        ],
        num_fixed: 0,
        reduction: Reduction::default(),
        plan,
        atoms: nested_specs,
        label: format!("∀l ∀r : ¬{nested_atom}"),
    });

    Ok(AtomSpec::Function {
        nested,
        left: left_source,
        right: right_source,
        label: atom.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use crate::compilation::bdd_plan::PlanAction;
    use crate::compilation::program::{
        compile_formula, AtomSpec, BindingRef, CompileOptions, FunctionSide, Reduction,
    };
    use crate::events::{EventSchema, FieldTy};
    use crate::preprocessing::hnl_formula::{BodyNode, IsPrefix, PrenexFormula, Quantifier};
    use crate::preprocessing::trace_expr::{
        FunctionTerm, ProgramVariable, TraceExpr, TraceVariable,
    };

    fn schema() -> EventSchema {
        EventSchema::from_slices(&[("in", FieldTy::Int), ("out", FieldTy::Int)]).unwrap()
    }

    fn prefix_body(field: &str, t1: &str, t2: &str) -> BodyNode {
        BodyNode::mk_atom(IsPrefix::new(
            TraceExpr::mk_var(field, TraceVariable::new(t1)),
            TraceExpr::mk_var(field, TraceVariable::new(t2)),
        ))
    }

    fn forall(name: &str) -> Quantifier {
        Quantifier::mk_forall(TraceVariable::new(name))
    }

    #[test]
    /// Test the compilation of a universal two-quantifier formula.
    fn universal_formula() {
        let formula = PrenexFormula::new(
            vec![forall("t1"), forall("t2")],
            prefix_body("in", "t1", "t2"),
        );
        let opts = CompileOptions::new(schema()).with_alphabet(vec![0, 1, 2, 3]);
        let program = compile_formula(&formula, &opts).unwrap();

        assert!(!program.negate_output);
        assert_eq!(program.alphabet, vec![0, 1, 2, 3]);
        assert_eq!(program.root.quantifiers.len(), 2);
        assert_eq!(program.root.atoms.len(), 1);
        match &program.root.atoms[0] {
            AtomSpec::Regular { left, right, .. } => {
                assert_eq!(left.field, 0);
                assert_eq!(left.binding, BindingRef::Quantified(0));
                assert_eq!(right.unwrap().binding, BindingRef::Quantified(1));
            }
            other => panic!("Expected a regular atom, got {other:?}"),
        }
    }

    #[test]
    /// Test that isomorphic atoms share an automaton while distinct atoms
    /// get their own.
    fn automaton_sharing() {
        // ¬(in(t1) ≤ in(t2)) ∨ (out(t1) ≤ out(t2))
        let body = BodyNode::mk_or(
            BodyNode::mk_not(prefix_body("in", "t1", "t2")),
            prefix_body("out", "t1", "t2"),
        );
        let formula = PrenexFormula::new(vec![forall("t1"), forall("t2")], body);
        let opts = CompileOptions::new(schema()).with_alphabet(vec![0, 1]);
        let program = compile_formula(&formula, &opts).unwrap();

        let ids: Vec<usize> = program
            .root
            .atoms
            .iter()
            .map(|a| match a {
                AtomSpec::Regular { automaton_id, .. } => *automaton_id,
                other => panic!("Expected a regular atom, got {other:?}"),
            })
            .collect();
        assert_eq!(ids.len(), 2);
        // both atoms are v(t) ≤ v(t) after canonization
        assert_eq!(ids[0], ids[1]);
    }

    #[test]
    /// Test the splitting of an alternating formula and its polarities.
    fn alternation_compilation() {
        // ∀t1 ∃t2 : in(t1) ≤ in(t2)
        let formula = PrenexFormula::new(
            vec![forall("t1"), Quantifier::mk_exists(TraceVariable::new("t2"))],
            prefix_body("in", "t1", "t2"),
        );
        let opts = CompileOptions::new(schema()).with_alphabet(vec![0, 1]);
        let program = compile_formula(&formula, &opts).unwrap();

        assert!(!program.negate_output);
        assert_eq!(program.root.quantifiers.len(), 1);
        match &program.root.atoms[0] {
            AtomSpec::Sub { nested, negate } => {
                // the nested level is ∀t2 ¬(…) and the link negates
                assert!(*negate);
                assert_eq!(nested.quantifiers.len(), 1);
                assert_eq!(nested.num_fixed, 1);
                assert_eq!(nested.atoms.len(), 1);
            }
            other => panic!("Expected a sub atom, got {other:?}"),
        }

        // ∃t1 : in(t1) ≤ in(t1), where the output itself is negated
        let formula = PrenexFormula::new(
            vec![Quantifier::mk_exists(TraceVariable::new("t1"))],
            prefix_body("in", "t1", "t1"),
        );
        let program = compile_formula(&formula, &opts).unwrap();
        assert!(program.negate_output);
    }

    #[test]
    /// Test the compilation errors of malformed specifications.
    fn compilation_errors() {
        let opts = CompileOptions::new(schema()).with_alphabet(vec![0]);

        // free variable
        let formula = PrenexFormula::new(vec![forall("t1")], prefix_body("in", "t1", "t2"));
        assert!(compile_formula(&formula, &opts).is_err());

        // unknown field
        let formula = PrenexFormula::new(
            vec![forall("t1"), forall("t2")],
            prefix_body("bad", "t1", "t2"),
        );
        assert!(compile_formula(&formula, &opts).is_err());

        // non-simple side
        let two_vars = TraceExpr::mk_concat(
            TraceExpr::mk_var("in", TraceVariable::new("t1")),
            TraceExpr::mk_var("in", TraceVariable::new("t1")),
        );
        let formula = PrenexFormula::new(
            vec![forall("t1"), forall("t2")],
            BodyNode::mk_atom(IsPrefix::new(
                two_vars,
                TraceExpr::mk_var("in", TraceVariable::new("t2")),
            )),
        );
        assert!(compile_formula(&formula, &opts).is_err());

        // iteration over a program variable
        let formula = PrenexFormula::new(
            vec![forall("t1"), forall("t2")],
            BodyNode::mk_atom(IsPrefix::new(
                TraceExpr::mk_iter(TraceExpr::mk_var("in", TraceVariable::new("t1"))),
                TraceExpr::mk_var("in", TraceVariable::new("t2")),
            )),
        );
        assert!(compile_formula(&formula, &opts).is_err());

        // no program variables at all
        let formula = PrenexFormula::new(
            vec![forall("t1")],
            BodyNode::mk_atom(IsPrefix::new(
                TraceExpr::mk_constant(0),
                TraceExpr::mk_var("in", TraceVariable::new("t1")),
            )),
        );
        assert!(compile_formula(&formula, &opts).is_err());

        // reduction with more than two quantifiers
        let body = BodyNode::mk_and(
            prefix_body("in", "t1", "t2"),
            prefix_body("in", "t2", "t3"),
        );
        let formula = PrenexFormula::new(vec![forall("t1"), forall("t2"), forall("t3")], body);
        let reduced = CompileOptions::new(schema())
            .with_alphabet(vec![0])
            .with_reduction(Reduction {
                reflexive: true,
                symmetric: false,
            });
        assert!(compile_formula(&formula, &reduced).is_err());
    }

    #[test]
    /// Test the compilation of a function atom into a nested negation level.
    fn function_atom_compilation() {
        // ∀t1 ∀t2 : in(@f(t1)) ≤ in(t2)
        let fun = FunctionTerm::new("f", vec![TraceVariable::new("t1")]);
        let formula = PrenexFormula::new(
            vec![forall("t1"), forall("t2")],
            BodyNode::mk_atom(IsPrefix::new(
                TraceExpr::Var(ProgramVariable::over_function("in", fun)),
                TraceExpr::mk_var("in", TraceVariable::new("t2")),
            )),
        );
        let opts = CompileOptions::new(schema()).with_alphabet(vec![0, 1]);
        let program = compile_formula(&formula, &opts).unwrap();

        match &program.root.atoms[0] {
            AtomSpec::Function { nested, left, right, .. } => {
                match left {
                    FunctionSide::Function { name, args } => {
                        assert_eq!(name, "f");
                        assert_eq!(args, &vec![BindingRef::Quantified(0)]);
                    }
                    other => panic!("Expected a function side, got {other:?}"),
                }
                assert!(matches!(
                    right,
                    FunctionSide::Bound(BindingRef::Quantified(1))
                ));
                // the nested level decides ¬atom: TRUE on atom failure
                assert_eq!(nested.quantifiers.len(), 2);
                assert_eq!(nested.plan.rows.len(), 1);
                assert_eq!(nested.plan.rows[0].hi, PlanAction::Result(false));
                assert_eq!(nested.plan.rows[0].lo, PlanAction::Result(true));
            }
            other => panic!("Expected a function atom, got {other:?}"),
        }
    }
}
