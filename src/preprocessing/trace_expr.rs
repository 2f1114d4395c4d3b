//! Trace expressions: regular expressions over event constants and program-variable
//! projections, the terms on both sides of a prefix atom.

use std::collections::BTreeSet;
use std::fmt;

/// A named trace variable bound by a quantifier.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TraceVariable(pub String);

impl TraceVariable {
    pub fn new(name: &str) -> TraceVariable {
        TraceVariable(name.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceVariable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An application of a named function to trace variables. The traces produced
/// by the function are consumed through a shared trace set at runtime.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FunctionTerm {
    pub name: String,
    pub traces: Vec<TraceVariable>,
}

impl FunctionTerm {
    pub fn new(name: &str, traces: Vec<TraceVariable>) -> FunctionTerm {
        FunctionTerm {
            name: name.to_string(),
            traces,
        }
    }
}

impl fmt::Display for FunctionTerm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "@{}(", self.name)?;
        for (i, t) in self.traces.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{t}")?;
        }
        write!(f, ")")
    }
}

/// The trace a program variable projects from: either a quantified trace
/// variable, or the output of a function of trace variables.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TraceTerm {
    Variable(TraceVariable),
    Function(FunctionTerm),
}

impl TraceTerm {
    /// All trace variables this term depends on.
    pub fn trace_variables(&self) -> Vec<TraceVariable> {
        match self {
            TraceTerm::Variable(v) => vec![v.clone()],
            TraceTerm::Function(f) => f.traces.clone(),
        }
    }
}

impl fmt::Display for TraceTerm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TraceTerm::Variable(v) => write!(f, "{v}"),
            TraceTerm::Function(fun) => write!(f, "{fun}"),
        }
    }
}

/// A projection of one event field of a trace, e.g. `in(t1)`. Program variables
/// stand for "any event read from the trace" in the trace-expression language.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ProgramVariable {
    pub name: String,
    pub trace: TraceTerm,
}

impl ProgramVariable {
    pub fn new(name: &str, trace: TraceVariable) -> ProgramVariable {
        ProgramVariable {
            name: name.to_string(),
            trace: TraceTerm::Variable(trace),
        }
    }

    pub fn over_function(name: &str, fun: FunctionTerm) -> ProgramVariable {
        ProgramVariable {
            name: name.to_string(),
            trace: TraceTerm::Function(fun),
        }
    }
}

impl fmt::Display for ProgramVariable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}({})", self.name, self.trace)
    }
}

/// A constant letter carrying an event-field value and a pair of independent
/// marks. Marks never occur in user formulas; derivatives and automaton edges
/// use them:
///   - the `x` mark distinguishes letters read from a trace,
///   - the `rep` mark asks for the maximal repetition of the letter.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Constant {
    pub value: i64,
    pub marks: u8,
}

impl Constant {
    pub const NO_MARK: u8 = 0;
    pub const X_MARK: u8 = 1;
    pub const REP_MARK: u8 = 2;
    pub const REP_X_MARK: u8 = Self::X_MARK | Self::REP_MARK;

    pub fn new(value: i64) -> Constant {
        Constant {
            value,
            marks: Self::NO_MARK,
        }
    }

    /// All four combinations of the two marks.
    pub fn marks_combinations() -> [u8; 4] {
        [
            Self::NO_MARK,
            Self::X_MARK,
            Self::REP_MARK,
            Self::REP_X_MARK,
        ]
    }

    pub fn is_rep(&self) -> bool {
        self.marks & Self::REP_MARK != 0
    }

    pub fn is_x(&self) -> bool {
        self.marks & Self::X_MARK != 0
    }

    pub fn with_marks(&self, marks: u8) -> Constant {
        Constant {
            value: self.value,
            marks: self.marks | marks,
        }
    }

    pub fn with_rep(&self) -> Constant {
        self.with_marks(Self::REP_MARK)
    }

    pub fn with_x(&self) -> Constant {
        self.with_marks(Self::X_MARK)
    }

    pub fn remove_marks(&self) -> Constant {
        Constant::new(self.value)
    }

    pub fn remove_rep(&self) -> Constant {
        Constant {
            value: self.value,
            marks: self.marks & !Self::REP_MARK,
        }
    }

    pub fn remove_x(&self) -> Constant {
        Constant {
            value: self.value,
            marks: self.marks & !Self::X_MARK,
        }
    }

    /// Equivalence of the carried values, ignoring marks.
    pub fn equiv(&self, other: &Constant) -> bool {
        self.value == other.value
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.value,
            if self.is_rep() { "⊕" } else { "" },
            if self.is_x() { "ₓ" } else { "" }
        )
    }
}

/// The lookahead guard attached to a [TraceExpr::Lookahead] node: a constraint
/// on the next letter the guarded expression may consume.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum LookaheadGuard {
    Is(Constant),
    IsNot(Constant),
}

impl LookaheadGuard {
    /// Whether the guard admits the given letter. Only the carried values are
    /// compared, marks are ignored.
    pub fn matches(&self, letter: &Constant) -> bool {
        match self {
            LookaheadGuard::Is(c) => c.equiv(letter),
            LookaheadGuard::IsNot(c) => !c.equiv(letter),
        }
    }
}

impl fmt::Display for LookaheadGuard {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LookaheadGuard::Is(c) => write!(f, "{c}"),
            LookaheadGuard::IsNot(c) => write!(f, "¬({c})"),
        }
    }
}

/// A trace expression. Only `Constant` and `Var` are atomic; `Epsilon` is the
/// distinguished empty word. `Lookahead` nodes are produced by the derivative
/// engine for stutter reductions and never occur in user formulas.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TraceExpr {
    Epsilon,
    Constant(Constant),
    Var(ProgramVariable),
    Concat(Box<TraceExpr>, Box<TraceExpr>),
    Plus(Box<TraceExpr>, Box<TraceExpr>),
    Iter(Box<TraceExpr>),
    StutterReduce(Box<TraceExpr>),
    Lookahead(Box<TraceExpr>, LookaheadGuard),
}

impl TraceExpr {
    pub fn mk_constant(value: i64) -> TraceExpr {
        TraceExpr::Constant(Constant::new(value))
    }

    pub fn mk_var(name: &str, trace: TraceVariable) -> TraceExpr {
        TraceExpr::Var(ProgramVariable::new(name, trace))
    }

    pub fn mk_concat(left: TraceExpr, right: TraceExpr) -> TraceExpr {
        TraceExpr::Concat(Box::new(left), Box::new(right))
    }

    pub fn mk_plus(left: TraceExpr, right: TraceExpr) -> TraceExpr {
        TraceExpr::Plus(Box::new(left), Box::new(right))
    }

    pub fn mk_iter(child: TraceExpr) -> TraceExpr {
        TraceExpr::Iter(Box::new(child))
    }

    pub fn mk_stutter_reduce(child: TraceExpr) -> TraceExpr {
        TraceExpr::StutterReduce(Box::new(child))
    }

    pub fn mk_lookahead(child: TraceExpr, guard: LookaheadGuard) -> TraceExpr {
        TraceExpr::Lookahead(Box::new(child), guard)
    }

    /// True iff the empty word belongs to the language of this expression.
    pub fn nullable(&self) -> bool {
        match self {
            TraceExpr::Epsilon => true,
            TraceExpr::Constant(_) => false,
            // a program variable can stand for the empty projection
            TraceExpr::Var(_) => true,
            TraceExpr::Concat(l, r) => l.nullable() && r.nullable(),
            TraceExpr::Plus(l, r) => l.nullable() || r.nullable(),
            TraceExpr::Iter(_) => true,
            TraceExpr::StutterReduce(c) => c.nullable(),
            TraceExpr::Lookahead(c, guard) => {
                Self::guarded_first_non_empty(c, guard) && c.nullable()
            }
        }
    }

    fn guarded_first_non_empty(child: &TraceExpr, guard: &LookaheadGuard) -> bool {
        child.first().iter().any(|a| match a {
            TraceExpr::Var(_) => true,
            TraceExpr::Constant(c) => guard.matches(c),
            _ => unreachable!("first() returns only atomic expressions"),
        })
    }

    /// The set of symbols that can start a word of this expression's language.
    /// Since expressions do not carry their alphabet, the set may contain
    /// program variables standing for "any letter read from the trace".
    pub fn first(&self) -> BTreeSet<TraceExpr> {
        match self {
            TraceExpr::Epsilon => BTreeSet::new(),
            TraceExpr::Constant(_) | TraceExpr::Var(_) => BTreeSet::from([self.clone()]),
            TraceExpr::Concat(l, r) => {
                let mut firsts = l.first();
                if l.nullable() {
                    firsts.extend(r.first());
                }
                firsts
            }
            TraceExpr::Plus(l, r) => {
                let mut firsts = l.first();
                firsts.extend(r.first());
                firsts
            }
            TraceExpr::Iter(c) | TraceExpr::StutterReduce(c) => c.first(),
            TraceExpr::Lookahead(c, guard) => c
                .first()
                .into_iter()
                .filter(|a| match a {
                    TraceExpr::Var(_) => true,
                    TraceExpr::Constant(letter) => guard.matches(letter),
                    _ => unreachable!("first() returns only atomic expressions"),
                })
                .collect(),
        }
    }

    /// Apply language-preserving simplifications: drop epsilon factors of a
    /// concatenation, collapse nested stutter reductions, reduce iteration and
    /// stutter reduction of single letters, drop the guard of an expression
    /// that simplified to epsilon.
    pub fn simplify(&self) -> TraceExpr {
        match self {
            TraceExpr::Epsilon | TraceExpr::Constant(_) | TraceExpr::Var(_) => self.clone(),
            TraceExpr::Concat(l, r) => {
                let l = l.simplify();
                let r = r.simplify();
                if l == TraceExpr::Epsilon {
                    return r;
                }
                if r == TraceExpr::Epsilon {
                    return l;
                }
                TraceExpr::mk_concat(l, r)
            }
            TraceExpr::Plus(l, r) => TraceExpr::mk_plus(l.simplify(), r.simplify()),
            TraceExpr::Iter(c) => {
                let c = c.simplify();
                if c == TraceExpr::Epsilon {
                    return TraceExpr::Epsilon;
                }
                TraceExpr::mk_iter(c)
            }
            TraceExpr::StutterReduce(c) => {
                let mut inner: &TraceExpr = c;
                while let TraceExpr::StutterReduce(nested) = inner {
                    inner = nested;
                }
                match inner {
                    // the stutter reduction of a single letter is the letter
                    TraceExpr::Constant(_) | TraceExpr::Epsilon => inner.clone(),
                    _ => TraceExpr::mk_stutter_reduce(inner.simplify()),
                }
            }
            TraceExpr::Lookahead(c, guard) => {
                let c = c.simplify();
                if c == TraceExpr::Epsilon {
                    return TraceExpr::Epsilon;
                }
                TraceExpr::mk_lookahead(c, guard.clone())
            }
        }
    }

    /// A copy of this expression with every `StutterReduce` node replaced by
    /// its child.
    pub fn remove_stutter_reductions(&self) -> TraceExpr {
        match self {
            TraceExpr::Epsilon | TraceExpr::Constant(_) | TraceExpr::Var(_) => self.clone(),
            TraceExpr::Concat(l, r) => TraceExpr::mk_concat(
                l.remove_stutter_reductions(),
                r.remove_stutter_reductions(),
            ),
            TraceExpr::Plus(l, r) => TraceExpr::mk_plus(
                l.remove_stutter_reductions(),
                r.remove_stutter_reductions(),
            ),
            TraceExpr::Iter(c) => TraceExpr::mk_iter(c.remove_stutter_reductions()),
            TraceExpr::StutterReduce(c) => {
                let mut inner: &TraceExpr = c;
                while let TraceExpr::StutterReduce(nested) = inner {
                    inner = nested;
                }
                inner.remove_stutter_reductions()
            }
            TraceExpr::Lookahead(c, guard) => {
                TraceExpr::mk_lookahead(c.remove_stutter_reductions(), guard.clone())
            }
        }
    }

    /// All constant values used in this expression, in occurrence order,
    /// without duplicates.
    pub fn constants(&self) -> Vec<i64> {
        let mut values = Vec::new();
        self.collect_constants(&mut values);
        values
    }

    fn collect_constants(&self, values: &mut Vec<i64>) {
        match self {
            TraceExpr::Epsilon | TraceExpr::Var(_) => {}
            TraceExpr::Constant(c) => {
                if !values.contains(&c.value) {
                    values.push(c.value);
                }
            }
            TraceExpr::Concat(l, r) | TraceExpr::Plus(l, r) => {
                l.collect_constants(values);
                r.collect_constants(values);
            }
            TraceExpr::Iter(c) | TraceExpr::StutterReduce(c) | TraceExpr::Lookahead(c, _) => {
                c.collect_constants(values);
            }
        }
    }

    /// All program-variable occurrences, left to right. The same variable can
    /// appear multiple times.
    pub fn program_variable_occurrences(&self) -> Vec<&ProgramVariable> {
        let mut vars = Vec::new();
        self.collect_program_variables(&mut vars);
        vars
    }

    fn collect_program_variables<'a>(&'a self, vars: &mut Vec<&'a ProgramVariable>) {
        match self {
            TraceExpr::Epsilon | TraceExpr::Constant(_) => {}
            TraceExpr::Var(v) => vars.push(v),
            TraceExpr::Concat(l, r) | TraceExpr::Plus(l, r) => {
                l.collect_program_variables(vars);
                r.collect_program_variables(vars);
            }
            TraceExpr::Iter(c) | TraceExpr::StutterReduce(c) | TraceExpr::Lookahead(c, _) => {
                c.collect_program_variables(vars);
            }
        }
    }

    /// All trace variables this expression depends on, without duplicates.
    pub fn trace_variables(&self) -> Vec<TraceVariable> {
        let mut seen = Vec::new();
        for v in self.program_variable_occurrences() {
            for t in v.trace.trace_variables() {
                if !seen.contains(&t) {
                    seen.push(t);
                }
            }
        }
        seen
    }

    /// All function terms used by program variables of this expression.
    pub fn functions(&self) -> Vec<FunctionTerm> {
        let mut seen = Vec::new();
        for v in self.program_variable_occurrences() {
            if let TraceTerm::Function(f) = &v.trace {
                if !seen.contains(f) {
                    seen.push(f.clone());
                }
            }
        }
        seen
    }

    /// True iff some program variable occurs under an `Iter` node. Such
    /// expressions have no finite automaton and are rejected by compilation.
    pub fn iterates_program_variable(&self) -> bool {
        match self {
            TraceExpr::Epsilon | TraceExpr::Constant(_) | TraceExpr::Var(_) => false,
            TraceExpr::Concat(l, r) | TraceExpr::Plus(l, r) => {
                l.iterates_program_variable() || r.iterates_program_variable()
            }
            TraceExpr::Iter(c) => !c.program_variable_occurrences().is_empty(),
            TraceExpr::StutterReduce(c) | TraceExpr::Lookahead(c, _) => {
                c.iterates_program_variable()
            }
        }
    }

    /// A copy of this expression with every program variable replaced through
    /// `rename`. Used by canonization and by the construction of nested
    /// function-atom formulas.
    pub fn map_program_variables(
        &self,
        rename: &impl Fn(&ProgramVariable) -> ProgramVariable,
    ) -> TraceExpr {
        match self {
            TraceExpr::Epsilon | TraceExpr::Constant(_) => self.clone(),
            TraceExpr::Var(v) => TraceExpr::Var(rename(v)),
            TraceExpr::Concat(l, r) => TraceExpr::mk_concat(
                l.map_program_variables(rename),
                r.map_program_variables(rename),
            ),
            TraceExpr::Plus(l, r) => TraceExpr::mk_plus(
                l.map_program_variables(rename),
                r.map_program_variables(rename),
            ),
            TraceExpr::Iter(c) => TraceExpr::mk_iter(c.map_program_variables(rename)),
            TraceExpr::StutterReduce(c) => {
                TraceExpr::mk_stutter_reduce(c.map_program_variables(rename))
            }
            TraceExpr::Lookahead(c, guard) => {
                TraceExpr::mk_lookahead(c.map_program_variables(rename), guard.clone())
            }
        }
    }
}

// Display mirrors the notation of the formalism: `⌊e⌋` for stutter reduction,
// `(e | g)` for a guarded expression, `⊕`/`ₓ` for letter marks.
impl fmt::Display for TraceExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TraceExpr::Epsilon => write!(f, "ε"),
            TraceExpr::Constant(c) => write!(f, "{c}"),
            TraceExpr::Var(v) => write!(f, "{v}"),
            TraceExpr::Concat(l, r) => write!(f, "({l}.{r})"),
            TraceExpr::Plus(l, r) => write!(f, "({l} + {r})"),
            TraceExpr::Iter(c) => match c.as_ref() {
                TraceExpr::Constant(_) => write!(f, "{c}*"),
                _ => write!(f, "({c})*"),
            },
            TraceExpr::StutterReduce(c) => write!(f, "⌊{c}⌋"),
            TraceExpr::Lookahead(c, guard) => write!(f, "({c} | {guard})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::preprocessing::trace_expr::{Constant, TraceExpr, TraceVariable};

    #[test]
    /// Test nullability of the basic expression forms.
    fn nullability() {
        let t = TraceVariable::new("t");
        assert!(TraceExpr::Epsilon.nullable());
        assert!(!TraceExpr::mk_constant(0).nullable());
        assert!(TraceExpr::mk_var("x", t.clone()).nullable());
        assert!(TraceExpr::mk_iter(TraceExpr::mk_constant(0)).nullable());
        assert!(
            !TraceExpr::mk_concat(TraceExpr::mk_constant(0), TraceExpr::mk_var("x", t.clone()))
                .nullable()
        );
        assert!(
            TraceExpr::mk_plus(TraceExpr::mk_constant(0), TraceExpr::Epsilon).nullable()
        );
        assert!(
            TraceExpr::mk_stutter_reduce(TraceExpr::mk_var("x", t)).nullable()
        );
    }

    #[test]
    /// Test the `first` sets of concatenations and unions.
    fn first_sets() {
        let zero = TraceExpr::mk_constant(0);
        let one = TraceExpr::mk_constant(1);

        let concat = TraceExpr::mk_concat(zero.clone(), one.clone());
        assert_eq!(concat.first(), [zero.clone()].into());

        let nullable_head = TraceExpr::mk_concat(TraceExpr::mk_iter(zero.clone()), one.clone());
        assert_eq!(nullable_head.first(), [zero.clone(), one.clone()].into());

        let plus = TraceExpr::mk_plus(zero.clone(), one.clone());
        assert_eq!(plus.first(), [zero, one].into());
    }

    #[test]
    /// Test the simplification rules.
    fn simplification() {
        let zero = TraceExpr::mk_constant(0);

        let concat = TraceExpr::mk_concat(TraceExpr::Epsilon, zero.clone());
        assert_eq!(concat.simplify(), zero);

        let nested = TraceExpr::mk_stutter_reduce(TraceExpr::mk_stutter_reduce(
            TraceExpr::mk_var("x", TraceVariable::new("t")),
        ));
        assert_eq!(
            nested.simplify(),
            TraceExpr::mk_stutter_reduce(TraceExpr::mk_var("x", TraceVariable::new("t")))
        );

        // the stutter reduction of a single letter is the letter itself
        let single = TraceExpr::mk_stutter_reduce(zero.clone());
        assert_eq!(single.simplify(), zero);

        assert_eq!(
            TraceExpr::mk_iter(TraceExpr::Epsilon).simplify(),
            TraceExpr::Epsilon
        );
    }

    #[test]
    /// Test the mark manipulation helpers of constants.
    fn constant_marks() {
        let c = Constant::new(2);
        assert!(!c.is_rep() && !c.is_x());
        assert!(c.with_rep().is_rep());
        assert!(c.with_x().is_x());
        assert!(c.with_marks(Constant::REP_X_MARK).is_rep());
        assert_eq!(c.with_rep().remove_rep(), c);
        assert_eq!(c.with_marks(Constant::REP_X_MARK).remove_marks(), c);
        assert!(c.with_rep().equiv(&c));
        assert_eq!(Constant::marks_combinations().len(), 4);
    }
}
