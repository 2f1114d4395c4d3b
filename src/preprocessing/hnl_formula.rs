//! Syntax trees for prenex HNL formulas and functionality for their manipulation.

use crate::preprocessing::operator_enums::{BinaryOp, QuantifierKind, UnaryOp};
use crate::preprocessing::trace_expr::{FunctionTerm, TraceExpr, TraceVariable};

use std::fmt;

/// A prefix atom `lhs ≤ rhs`: the word described by `lhs` is a prefix of the
/// word described by `rhs`. Atoms are the unit scheduled by the BDD planner.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct IsPrefix {
    pub lhs: TraceExpr,
    pub rhs: TraceExpr,
}

impl IsPrefix {
    pub fn new(lhs: TraceExpr, rhs: TraceExpr) -> IsPrefix {
        IsPrefix { lhs, rhs }
    }

    /// An atom is simple when each side mentions at most one program-variable
    /// occurrence. Only simple atoms can be compiled.
    pub fn is_simple(&self) -> bool {
        self.lhs.program_variable_occurrences().len() <= 1
            && self.rhs.program_variable_occurrences().len() <= 1
    }

    /// All trace variables mentioned by either side, without duplicates.
    pub fn trace_variables(&self) -> Vec<TraceVariable> {
        let mut vars = self.lhs.trace_variables();
        for v in self.rhs.trace_variables() {
            if !vars.contains(&v) {
                vars.push(v);
            }
        }
        vars
    }

    /// All function terms mentioned by either side, without duplicates.
    pub fn functions(&self) -> Vec<FunctionTerm> {
        let mut funs = self.lhs.functions();
        for f in self.rhs.functions() {
            if !funs.contains(&f) {
                funs.push(f);
            }
        }
        funs
    }

    /// All constant values of either side, without duplicates.
    pub fn constants(&self) -> Vec<i64> {
        let mut values = self.lhs.constants();
        for v in self.rhs.constants() {
            if !values.contains(&v) {
                values.push(v);
            }
        }
        values
    }
}

impl fmt::Display for IsPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({} ≤ {})", self.lhs, self.rhs)
    }
}

/// Enum of possible node types in the quantifier-free body of an HNL formula.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum NodeType {
    Atom(IsPrefix),
    Unary(UnaryOp, Box<BodyNode>),
    Binary(BinaryOp, Box<BodyNode>, Box<BodyNode>),
}

/// A single node in the body of an HNL formula. Each node caches its canonical
/// string representation, which is used for display and uniqueness testing.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct BodyNode {
    pub formula_str: String,
    pub node_type: NodeType,
}

impl BodyNode {
    /// Create a [BodyNode] for a single prefix atom.
    pub fn mk_atom(atom: IsPrefix) -> BodyNode {
        BodyNode {
            formula_str: atom.to_string(),
            node_type: NodeType::Atom(atom),
        }
    }

    /// Create a negation [BodyNode] of the given child.
    pub fn mk_not(child: BodyNode) -> BodyNode {
        BodyNode {
            formula_str: format!("¬({child})"),
            node_type: NodeType::Unary(UnaryOp::Not, Box::new(child)),
        }
    }

    /// Create a binary [BodyNode] from the given arguments.
    pub fn mk_binary(left: BodyNode, right: BodyNode, op: BinaryOp) -> BodyNode {
        BodyNode {
            formula_str: format!("({left}) {op} ({right})"),
            node_type: NodeType::Binary(op, Box::new(left), Box::new(right)),
        }
    }

    pub fn mk_and(left: BodyNode, right: BodyNode) -> BodyNode {
        Self::mk_binary(left, right, BinaryOp::And)
    }

    pub fn mk_or(left: BodyNode, right: BodyNode) -> BodyNode {
        Self::mk_binary(left, right, BinaryOp::Or)
    }

    /// All prefix atoms of this body in first-occurrence order, without
    /// duplicates. The position in the returned vector is the atom id used
    /// by the BDD planner.
    pub fn atoms(&self) -> Vec<&IsPrefix> {
        let mut atoms = Vec::new();
        self.collect_atoms(&mut atoms);
        atoms
    }

    fn collect_atoms<'a>(&'a self, atoms: &mut Vec<&'a IsPrefix>) {
        match &self.node_type {
            NodeType::Atom(atom) => {
                if !atoms.contains(&atom) {
                    atoms.push(atom);
                }
            }
            NodeType::Unary(_, child) => child.collect_atoms(atoms),
            NodeType::Binary(_, left, right) => {
                left.collect_atoms(atoms);
                right.collect_atoms(atoms);
            }
        }
    }

    /// All trace variables of this body, without duplicates.
    pub fn trace_variables(&self) -> Vec<TraceVariable> {
        let mut vars: Vec<TraceVariable> = Vec::new();
        for atom in self.atoms() {
            for v in atom.trace_variables() {
                if !vars.contains(&v) {
                    vars.push(v);
                }
            }
        }
        vars
    }

    /// All function terms of this body, without duplicates.
    pub fn functions(&self) -> Vec<FunctionTerm> {
        let mut funs: Vec<FunctionTerm> = Vec::new();
        for atom in self.atoms() {
            for f in atom.functions() {
                if !funs.contains(&f) {
                    funs.push(f);
                }
            }
        }
        funs
    }

    /// All constant values of this body, without duplicates.
    pub fn constants(&self) -> Vec<i64> {
        let mut values: Vec<i64> = Vec::new();
        for atom in self.atoms() {
            for v in atom.constants() {
                if !values.contains(&v) {
                    values.push(v);
                }
            }
        }
        values
    }

    /// Evaluate the body under a truth assignment to its atoms.
    pub fn evaluate(&self, assignment: &impl Fn(&IsPrefix) -> bool) -> bool {
        match &self.node_type {
            NodeType::Atom(atom) => assignment(atom),
            NodeType::Unary(UnaryOp::Not, child) => !child.evaluate(assignment),
            NodeType::Binary(BinaryOp::And, left, right) => {
                left.evaluate(assignment) && right.evaluate(assignment)
            }
            NodeType::Binary(BinaryOp::Or, left, right) => {
                left.evaluate(assignment) || right.evaluate(assignment)
            }
        }
    }
}

impl BodyNode {
    pub fn as_str(&self) -> &str {
        self.formula_str.as_str()
    }
}

impl fmt::Display for BodyNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.formula_str)
    }
}

/// One quantifier of a prenex prefix.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Quantifier {
    pub kind: QuantifierKind,
    pub var: TraceVariable,
}

impl Quantifier {
    pub fn mk_forall(var: TraceVariable) -> Quantifier {
        Quantifier {
            kind: QuantifierKind::ForAll,
            var,
        }
    }

    pub fn mk_exists(var: TraceVariable) -> Quantifier {
        Quantifier {
            kind: QuantifierKind::Exists,
            var,
        }
    }

    pub fn mk_forall_from_fun(var: TraceVariable, fun: FunctionTerm) -> Quantifier {
        Quantifier {
            kind: QuantifierKind::ForAllFromFun(fun),
            var,
        }
    }

    /// The dual quantifier. Function-sourced quantifiers are self-dual here;
    /// they are only ever rewritten together with a body negation.
    pub fn swapped(&self) -> Quantifier {
        let kind = match &self.kind {
            QuantifierKind::ForAll => QuantifierKind::Exists,
            QuantifierKind::Exists => QuantifierKind::ForAll,
            QuantifierKind::ForAllFromFun(fun) => QuantifierKind::ForAllFromFun(fun.clone()),
        };
        Quantifier {
            kind,
            var: self.var.clone(),
        }
    }
}

impl fmt::Display for Quantifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.var)
    }
}

/// A formula in prenex form: an ordered quantifier prefix over a
/// quantifier-free body.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PrenexFormula {
    pub quantifier_prefix: Vec<Quantifier>,
    pub formula: BodyNode,
}

impl PrenexFormula {
    pub fn new(quantifier_prefix: Vec<Quantifier>, formula: BodyNode) -> PrenexFormula {
        PrenexFormula {
            quantifier_prefix,
            formula,
        }
    }

    /// Perform well-formedness checks and return a list of the problems found,
    /// if any. An empty result means the formula can be compiled.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.quantifier_prefix.is_empty() {
            problems.push("The quantifier prefix is empty".to_string());
        }

        let bound: Vec<&TraceVariable> = self.quantifier_prefix.iter().map(|q| &q.var).collect();
        for (i, var) in bound.iter().enumerate() {
            if bound[..i].contains(var) {
                problems.push(format!("Trace variable {var} is quantified twice"));
            }
        }

        let used = self.formula.trace_variables();
        for q in &self.quantifier_prefix {
            if !used.contains(&q.var) {
                problems.push(format!("Quantifier {q} is unused"));
            }
        }
        for var in &used {
            if !bound.contains(&var) {
                problems.push(format!("Free trace variable {var}"));
            }
        }

        // function arguments must be bound before the quantifier that uses them
        for (i, q) in self.quantifier_prefix.iter().enumerate() {
            if let QuantifierKind::ForAllFromFun(fun) = &q.kind {
                for arg in &fun.traces {
                    if !bound[..i].contains(&arg) {
                        problems.push(format!(
                            "Function argument {arg} of quantifier {q} is not bound by an \
                             enclosing quantifier"
                        ));
                    }
                }
            }
        }

        problems
    }

    /// The formula is simple when every atom of its body is simple; only
    /// simple formulas can be compiled.
    pub fn is_simple(&self) -> bool {
        self.formula.atoms().iter().all(|atom| atom.is_simple())
    }

    pub fn functions(&self) -> Vec<FunctionTerm> {
        let mut funs = self.formula.functions();
        for q in &self.quantifier_prefix {
            if let QuantifierKind::ForAllFromFun(fun) = &q.kind {
                if !funs.contains(fun) {
                    funs.push(fun.clone());
                }
            }
        }
        funs
    }

    pub fn constants(&self) -> Vec<i64> {
        self.formula.constants()
    }
}

impl fmt::Display for PrenexFormula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for q in &self.quantifier_prefix {
            write!(f, "{q} ")?;
        }
        write!(f, ": {}", self.formula)
    }
}

#[cfg(test)]
mod tests {
    use crate::preprocessing::hnl_formula::{BodyNode, IsPrefix, PrenexFormula, Quantifier};
    use crate::preprocessing::trace_expr::{TraceExpr, TraceVariable};

    fn prefix_atom(left: &str, right: &str) -> IsPrefix {
        IsPrefix::new(
            TraceExpr::mk_var("x", TraceVariable::new(left)),
            TraceExpr::mk_var("x", TraceVariable::new(right)),
        )
    }

    #[test]
    /// Test creation and display of formula trees.
    fn tree_generating() {
        let body = BodyNode::mk_or(
            BodyNode::mk_not(BodyNode::mk_atom(prefix_atom("t1", "t2"))),
            BodyNode::mk_atom(prefix_atom("t2", "t1")),
        );
        let formula = PrenexFormula::new(
            vec![
                Quantifier::mk_forall(TraceVariable::new("t1")),
                Quantifier::mk_forall(TraceVariable::new("t2")),
            ],
            body,
        );

        assert_eq!(
            formula.to_string(),
            "∀t1 ∀t2 : (¬((x(t1) ≤ x(t2)))) ∨ ((x(t2) ≤ x(t1)))"
        );
        assert!(formula.problems().is_empty());
        assert!(formula.is_simple());
    }

    #[test]
    /// Test that atoms are collected in first-occurrence order without duplicates.
    fn atom_collection() {
        let a = prefix_atom("t1", "t2");
        let b = prefix_atom("t2", "t1");
        let body = BodyNode::mk_and(
            BodyNode::mk_or(BodyNode::mk_atom(a.clone()), BodyNode::mk_atom(b.clone())),
            BodyNode::mk_atom(a.clone()),
        );
        assert_eq!(body.atoms(), vec![&a, &b]);
    }

    #[test]
    /// Test detection of malformed quantifier prefixes.
    fn problem_detection() {
        // unused quantifier and free variable
        let formula = PrenexFormula::new(
            vec![Quantifier::mk_forall(TraceVariable::new("t3"))],
            BodyNode::mk_atom(prefix_atom("t1", "t2")),
        );
        let problems = formula.problems();
        assert_eq!(problems.len(), 3);

        // duplicate binding
        let formula = PrenexFormula::new(
            vec![
                Quantifier::mk_forall(TraceVariable::new("t1")),
                Quantifier::mk_forall(TraceVariable::new("t1")),
            ],
            BodyNode::mk_atom(prefix_atom("t1", "t1")),
        );
        assert!(!formula.problems().is_empty());
    }

    #[test]
    /// Test the truth-table evaluation of a body.
    fn body_evaluation() {
        let a = prefix_atom("t1", "t2");
        let b = prefix_atom("t2", "t1");
        // ¬a ∨ b
        let body = BodyNode::mk_or(
            BodyNode::mk_not(BodyNode::mk_atom(a.clone())),
            BodyNode::mk_atom(b.clone()),
        );
        assert!(body.evaluate(&|atom| *atom == b));
        assert!(!body.evaluate(&|atom| *atom == a));
        assert!(body.evaluate(&|_| true));
        assert!(body.evaluate(&|_| false));
    }
}
