//! The BDD planner: turns the quantifier-free body of an HNL formula into an
//! evaluation schedule over its prefix atoms.

use crate::preprocessing::hnl_formula::{BodyNode, IsPrefix, NodeType};
use crate::preprocessing::operator_enums::{BinaryOp, UnaryOp};

use biodivine_lib_bdd::{Bdd, BddPointer, BddVariable, BddVariableSet, BddVariableSetBuilder};
use log::debug;
use std::collections::HashMap;
use std::fmt;

/// Where the plan goes after an atom resolved: to another plan row, or to a
/// final verdict of the whole body.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlanAction {
    Row(usize),
    Result(bool),
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlanAction::Row(row) => write!(f, "ROW_{row}"),
            PlanAction::Result(true) => write!(f, "RESULT_TRUE"),
            PlanAction::Result(false) => write!(f, "RESULT_FALSE"),
        }
    }
}

/// One row of the evaluation schedule: run the monitor of `atom`, then follow
/// `hi` on TRUE and `lo` on FALSE.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PlanRow {
    pub atom: usize,
    pub hi: PlanAction,
    pub lo: PlanAction,
}

/// The full evaluation schedule of one body. In the common case every atom
/// labels exactly one row and the row index coincides with the atom id; a BDD
/// in which one variable labels several nodes simply gets several rows for
/// that atom. A body whose BDD collapses to a constant has no rows and an
/// immediate `Result` as its initial action.
#[derive(Clone, Debug)]
pub struct BddPlan {
    pub rows: Vec<PlanRow>,
    pub initial: PlanAction,
}

impl BddPlan {
    /// Evaluate the plan under a truth assignment to atom ids. Used by tests
    /// to check faithfulness against the body formula; the monitors walk the
    /// plan incrementally instead.
    pub fn evaluate(&self, assignment: &impl Fn(usize) -> bool) -> bool {
        let mut action = self.initial;
        loop {
            match action {
                PlanAction::Result(value) => return value,
                PlanAction::Row(row) => {
                    let row = &self.rows[row];
                    action = if assignment(row.atom) { row.hi } else { row.lo };
                }
            }
        }
    }
}

/// Build the BDD of `body` over one variable per atom of `atoms` (in order),
/// and extract the plan table from its node graph.
pub fn build_plan(body: &BodyNode, atoms: &[IsPrefix]) -> Result<BddPlan, String> {
    let mut builder = BddVariableSetBuilder::new();
    let variables: Vec<BddVariable> = atoms
        .iter()
        .enumerate()
        .map(|(i, _)| builder.make_variable(format!("atom_{i}").as_str()))
        .collect();
    let set = builder.build();

    let bdd = body_to_bdd(body, atoms, &variables, &set)?;

    if bdd.is_true() {
        return Ok(BddPlan {
            rows: Vec::new(),
            initial: PlanAction::Result(true),
        });
    }
    if bdd.is_false() {
        return Ok(BddPlan {
            rows: Vec::new(),
            initial: PlanAction::Result(false),
        });
    }

    // walk the BDD graph, one plan row per inner node, rows in discovery order
    let mut rows: Vec<PlanRow> = Vec::new();
    let mut row_ids: HashMap<BddPointer, usize> = HashMap::new();
    let mut worklist = vec![bdd.root_pointer()];
    while let Some(pointer) = worklist.pop() {
        if pointer.is_terminal() || row_ids.contains_key(&pointer) {
            continue;
        }
        row_ids.insert(pointer, rows.len());
        rows.push(PlanRow {
            atom: bdd.var_of(pointer).to_index(),
            hi: PlanAction::Result(false), // patched below
            lo: PlanAction::Result(false),
        });
        worklist.push(bdd.high_link_of(pointer));
        worklist.push(bdd.low_link_of(pointer));
    }

    let action_of = |pointer: BddPointer| -> PlanAction {
        if pointer.is_one() {
            PlanAction::Result(true)
        } else if pointer.is_zero() {
            PlanAction::Result(false)
        } else {
            PlanAction::Row(row_ids[&pointer])
        }
    };
    for (pointer, row) in &row_ids {
        rows[*row].hi = action_of(bdd.high_link_of(*pointer));
        rows[*row].lo = action_of(bdd.low_link_of(*pointer));
    }

    debug!("BDD plan: {} rows over {} atoms", rows.len(), atoms.len());
    Ok(BddPlan {
        initial: PlanAction::Row(row_ids[&bdd.root_pointer()]),
        rows,
    })
}

fn body_to_bdd(
    body: &BodyNode,
    atoms: &[IsPrefix],
    variables: &[BddVariable],
    set: &BddVariableSet,
) -> Result<Bdd, String> {
    match &body.node_type {
        NodeType::Atom(atom) => {
            let id = atoms
                .iter()
                .position(|a| a == atom)
                .ok_or_else(|| format!("Atom {atom} is not in the atom table"))?;
            Ok(set.mk_var(variables[id]))
        }
        NodeType::Unary(UnaryOp::Not, child) => {
            Ok(body_to_bdd(child, atoms, variables, set)?.not())
        }
        NodeType::Binary(op, left, right) => {
            let left = body_to_bdd(left, atoms, variables, set)?;
            let right = body_to_bdd(right, atoms, variables, set)?;
            Ok(match op {
                BinaryOp::And => left.and(&right),
                BinaryOp::Or => left.or(&right),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compilation::bdd_plan::{build_plan, PlanAction};
    use crate::preprocessing::hnl_formula::{BodyNode, IsPrefix};
    use crate::preprocessing::trace_expr::{TraceExpr, TraceVariable};

    fn atom(n: i64) -> IsPrefix {
        // distinct atoms built over distinct constants
        IsPrefix::new(
            TraceExpr::mk_concat(
                TraceExpr::mk_constant(n),
                TraceExpr::mk_var("x", TraceVariable::new("t1")),
            ),
            TraceExpr::mk_var("x", TraceVariable::new("t2")),
        )
    }

    /// Check that walking the plan matches direct evaluation of the body for
    /// every assignment to the given number of atoms.
    fn assert_faithful(body: &BodyNode, num_atoms: usize) {
        let atoms: Vec<IsPrefix> = body.atoms().into_iter().cloned().collect();
        assert_eq!(atoms.len(), num_atoms);
        let plan = build_plan(body, &atoms).unwrap();
        for bits in 0..(1u32 << num_atoms) {
            let assignment = |i: usize| bits & (1 << i) != 0;
            let expected = body.evaluate(&|a| assignment(atoms.iter().position(|x| x == a).unwrap()));
            assert_eq!(plan.evaluate(&assignment), expected, "assignment {bits:b}");
        }
    }

    #[test]
    /// Test the plan of a single atom.
    fn single_atom_plan() {
        let body = BodyNode::mk_atom(atom(0));
        let plan = build_plan(&body, &[atom(0)]).unwrap();
        assert_eq!(plan.rows.len(), 1);
        assert_eq!(plan.initial, PlanAction::Row(0));
        assert_eq!(plan.rows[0].atom, 0);
        assert_eq!(plan.rows[0].hi, PlanAction::Result(true));
        assert_eq!(plan.rows[0].lo, PlanAction::Result(false));
    }

    #[test]
    /// Test plan faithfulness for boolean combinations of atoms.
    fn plan_faithfulness() {
        // ¬a ∨ b
        let body = BodyNode::mk_or(
            BodyNode::mk_not(BodyNode::mk_atom(atom(0))),
            BodyNode::mk_atom(atom(1)),
        );
        assert_faithful(&body, 2);

        // (a ∧ b) ∨ (¬a ∧ c)
        let body = BodyNode::mk_or(
            BodyNode::mk_and(BodyNode::mk_atom(atom(0)), BodyNode::mk_atom(atom(1))),
            BodyNode::mk_and(
                BodyNode::mk_not(BodyNode::mk_atom(atom(0))),
                BodyNode::mk_atom(atom(2)),
            ),
        );
        assert_faithful(&body, 3);
    }

    #[test]
    /// Test that tautologies and contradictions collapse to immediate results.
    fn constant_bodies() {
        let a = BodyNode::mk_atom(atom(0));
        let tautology = BodyNode::mk_or(a.clone(), BodyNode::mk_not(a.clone()));
        let plan = build_plan(&tautology, &[atom(0)]).unwrap();
        assert!(plan.rows.is_empty());
        assert_eq!(plan.initial, PlanAction::Result(true));

        let contradiction = BodyNode::mk_and(a.clone(), BodyNode::mk_not(a));
        let plan = build_plan(&contradiction, &[atom(0)]).unwrap();
        assert_eq!(plan.initial, PlanAction::Result(false));
    }
}
