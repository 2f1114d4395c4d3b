//! Atom monitors: the cooperative evaluators of single prefix atoms. A
//! regular monitor runs a shared priority automaton over two trace cursors;
//! function and sub monitors wrap a nested HNL monitor and translate its
//! verdict at the atom boundary.

use crate::compilation::automaton::StateId;
use crate::compilation::priority::PriorityAutomaton;
use crate::evaluation::hnl_monitor::HnlMonitor;
use crate::evaluation::trace::{Trace, TraceId, TraceQuery};
use crate::evaluation::Verdict;
use crate::events::Event;

use log::trace;
use std::rc::Rc;

/// One evaluation state of a regular atom monitor: an automaton state and the
/// positions of both trace cursors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EvalState {
    pub state: StateId,
    pub p1: usize,
    pub p2: usize,
}

/// The double-buffered set of evaluation states. Within one step, reads come
/// from the current buffer and writes go to the next one; `rotate()` promotes
/// the next buffer between steps. This makes the step result independent of
/// the order in which evaluation states are processed.
#[derive(Clone, Debug, Default)]
pub struct ConfigurationSet {
    current: Vec<EvalState>,
    next: Vec<EvalState>,
}

impl ConfigurationSet {
    pub fn with_initial(initial: Option<StateId>) -> ConfigurationSet {
        let mut set = ConfigurationSet::default();
        if let Some(state) = initial {
            set.current.push(EvalState {
                state,
                p1: 0,
                p2: 0,
            });
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn current(&self) -> &[EvalState] {
        &self.current
    }

    pub fn push_next(&mut self, state: EvalState) {
        self.next.push(state);
    }

    /// Promote the next buffer to current and clear the old one.
    pub fn rotate(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
        self.next.clear();
    }
}

/// The identity under which atom monitors are de-duplicated: the atom id and,
/// per quantifier of the owning level, the id of the bound trace (0 when the
/// atom does not use the quantifier).
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AtomMonitorId {
    pub atom: usize,
    pub traces: Vec<TraceId>,
}

/// A monitor of one prefix atom. The kinds are dispatched by the variant tag;
/// a monitor that produced a decisive verdict collapses to `Finished` and
/// keeps reporting that verdict, so `FALSE` is permanent.
pub enum AtomMonitor {
    Regular(RegularAtomMonitor),
    Function(FunctionAtomMonitor),
    Sub(SubAtomMonitor),
    Finished(Verdict),
}

impl AtomMonitor {
    /// One cooperative step.
    pub fn step(&mut self) -> Verdict {
        let verdict = match self {
            AtomMonitor::Finished(verdict) => return *verdict,
            AtomMonitor::Regular(monitor) => monitor.step(),
            AtomMonitor::Function(monitor) => monitor.step(),
            AtomMonitor::Sub(monitor) => monitor.step(),
        };
        if verdict != Verdict::Unknown {
            *self = AtomMonitor::Finished(verdict);
        }
        verdict
    }

    /// The verdict the monitor has settled on, or `UNKNOWN` while running.
    pub fn current_verdict(&self) -> Verdict {
        match self {
            AtomMonitor::Finished(verdict) => *verdict,
            _ => Verdict::Unknown,
        }
    }
}

/// A monitor evaluating a regular atom by running a (shared) priority
/// automaton over the events of two traces.
pub struct RegularAtomMonitor {
    automaton: Rc<PriorityAutomaton>,
    left: Rc<Trace>,
    left_field: usize,
    /// The right trace and its projected field; absent when the right side of
    /// the atom reads no trace.
    right: Option<(Rc<Trace>, usize)>,
    cfgs: ConfigurationSet,
}

impl RegularAtomMonitor {
    pub fn new(
        automaton: Rc<PriorityAutomaton>,
        left: Rc<Trace>,
        left_field: usize,
        right: Option<(Rc<Trace>, usize)>,
    ) -> RegularAtomMonitor {
        let cfgs = ConfigurationSet::with_initial(automaton.initial());
        RegularAtomMonitor {
            automaton,
            left,
            left_field,
            right,
            cfgs,
        }
    }

    fn step(&mut self) -> Verdict {
        // no evaluation state left and we have not accepted: reject
        if self.cfgs.is_empty() {
            return Verdict::False;
        }

        let automaton = self.automaton.clone();
        for i in 0..self.cfgs.len() {
            let cfg = self.cfgs.current()[i];

            let ev1 = match self.left.get(cfg.p1) {
                TraceQuery::Waiting => {
                    self.cfgs.push_next(cfg);
                    continue;
                }
                TraceQuery::Has(event) => Some(event),
                TraceQuery::End => None,
            };
            let ev2 = match &self.right {
                Some((trace, _)) => match trace.get(cfg.p2) {
                    TraceQuery::Waiting => {
                        self.cfgs.push_next(cfg);
                        continue;
                    }
                    TraceQuery::Has(event) => Some(event),
                    TraceQuery::End => None,
                },
                None => None,
            };

            // the left word ended in an accepting state: the prefix is witnessed
            if ev1.is_none() && automaton.is_accepting(cfg.state) {
                return Verdict::True;
            }

            self.step_state(&automaton, cfg, ev1.as_ref(), ev2.as_ref());
        }

        self.cfgs.rotate();
        if self.cfgs.is_empty() {
            return Verdict::False;
        }
        Verdict::Unknown
    }

    /// Advance one evaluation state: in decreasing priority order, fire every
    /// enabled transition of the group; a group with a match shadows all
    /// lower-priority groups. A state with no enabled transition at any
    /// priority is dropped silently.
    fn step_state(
        &mut self,
        automaton: &PriorityAutomaton,
        cfg: EvalState,
        ev1: Option<&Event>,
        ev2: Option<&Event>,
    ) {
        let left_field = self.left_field;
        let right_field = self.right.as_ref().map(|(_, field)| *field);

        for group in automaton.groups(cfg.state) {
            let mut matched = false;
            for t in &group.transitions {
                let left_ok = match t.left {
                    None => true,
                    Some(value) => ev1.is_some_and(|e| e.get(left_field) == value),
                };
                let right_ok = match t.right {
                    None => true,
                    Some(value) => match (ev2, right_field) {
                        (Some(e), Some(field)) => e.get(field) == value,
                        _ => false,
                    },
                };
                if left_ok && right_ok {
                    matched = true;
                    let next = EvalState {
                        state: t.target,
                        p1: cfg.p1 + usize::from(t.left.is_some()),
                        p2: cfg.p2 + usize::from(t.right.is_some()),
                    };
                    trace!(
                        "atom cfg ({}, {}, {}) -> ({}, {}, {})",
                        cfg.state,
                        cfg.p1,
                        cfg.p2,
                        next.state,
                        next.p1,
                        next.p2,
                    );
                    self.cfgs.push_next(next);
                }
            }
            if matched {
                return;
            }
        }
        trace!(
            "atom cfg ({}, {}, {}) dropped, no transition matched",
            cfg.state,
            cfg.p1,
            cfg.p2,
        );
    }
}

/// A monitor evaluating a function atom through a nested monitor for the
/// negation of the atom. The nested verdict is negated back at this boundary.
pub struct FunctionAtomMonitor {
    monitor: HnlMonitor,
}

impl FunctionAtomMonitor {
    pub fn new(monitor: HnlMonitor) -> FunctionAtomMonitor {
        FunctionAtomMonitor { monitor }
    }

    fn step(&mut self) -> Verdict {
        self.monitor.step().negated()
    }
}

/// The placeholder atom of a split monitor level: wraps the nested monitor of
/// the next level and applies the link polarity.
pub struct SubAtomMonitor {
    monitor: HnlMonitor,
    negate: bool,
}

impl SubAtomMonitor {
    pub fn new(monitor: HnlMonitor, negate: bool) -> SubAtomMonitor {
        SubAtomMonitor { monitor, negate }
    }

    fn step(&mut self) -> Verdict {
        let verdict = self.monitor.step();
        if self.negate {
            verdict.negated()
        } else {
            verdict
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compilation::composition::compose_automata;
    use crate::compilation::construction::expr_to_automaton;
    use crate::compilation::priority::to_priority_automaton;
    use crate::evaluation::atom_monitor::{AtomMonitor, ConfigurationSet, EvalState, RegularAtomMonitor};
    use crate::evaluation::trace::Trace;
    use crate::evaluation::Verdict;
    use crate::events::{EventSchema, FieldTy};
    use crate::preprocessing::trace_expr::{TraceExpr, TraceVariable};
    use std::rc::Rc;

    fn schema() -> EventSchema {
        EventSchema::from_slices(&[("in", FieldTy::Int)]).unwrap()
    }

    fn prefix_monitor(alphabet: &[i64], t1: Rc<Trace>, t2: Rc<Trace>) -> AtomMonitor {
        let lhs = expr_to_automaton(&TraceExpr::mk_var("in", TraceVariable::new("t1")), alphabet);
        let rhs = expr_to_automaton(&TraceExpr::mk_var("in", TraceVariable::new("t2")), alphabet);
        let automaton = Rc::new(to_priority_automaton(&compose_automata(&lhs, &rhs, alphabet)));
        AtomMonitor::Regular(RegularAtomMonitor::new(automaton, t1, 0, Some((t2, 0))))
    }

    fn run_to_verdict(monitor: &mut AtomMonitor) -> Verdict {
        for _ in 0..64 {
            let verdict = monitor.step();
            if verdict != Verdict::Unknown {
                return verdict;
            }
        }
        Verdict::Unknown
    }

    #[test]
    /// Test the double-buffer rotation.
    fn double_buffering() {
        let mut cfgs = ConfigurationSet::with_initial(Some(0));
        assert_eq!(cfgs.len(), 1);

        cfgs.push_next(EvalState {
            state: 1,
            p1: 1,
            p2: 0,
        });
        // the pushed state is not visible before the rotation
        assert_eq!(cfgs.len(), 1);
        cfgs.rotate();
        assert_eq!(cfgs.len(), 1);
        assert_eq!(cfgs.current()[0].state, 1);

        cfgs.rotate();
        assert!(cfgs.is_empty());
    }

    #[test]
    /// Test a satisfied prefix: the left trace is a prefix of the right one.
    fn satisfied_prefix() {
        let schema = schema();
        let t1 = Rc::new(Trace::new(1));
        let t2 = Rc::new(Trace::new(2));
        t1.append(schema.make_event(&[0]).unwrap());
        t1.set_finished();
        t2.append(schema.make_event(&[0]).unwrap());
        t2.append(schema.make_event(&[1]).unwrap());
        t2.set_finished();

        let mut monitor = prefix_monitor(&[0, 1, 2, 3], t1, t2);
        assert_eq!(run_to_verdict(&mut monitor), Verdict::True);
        // the verdict is permanent
        assert_eq!(monitor.step(), Verdict::True);
        assert_eq!(monitor.current_verdict(), Verdict::True);
    }

    #[test]
    /// Test a violated prefix: the traces diverge.
    fn violated_prefix() {
        let schema = schema();
        let t1 = Rc::new(Trace::new(1));
        let t2 = Rc::new(Trace::new(2));
        t1.append(schema.make_event(&[0]).unwrap());
        t1.append(schema.make_event(&[1]).unwrap());
        t1.set_finished();
        t2.append(schema.make_event(&[0]).unwrap());
        t2.append(schema.make_event(&[2]).unwrap());
        t2.set_finished();

        let mut monitor = prefix_monitor(&[0, 1, 2, 3], t1, t2);
        assert_eq!(run_to_verdict(&mut monitor), Verdict::False);
        assert_eq!(monitor.step(), Verdict::False);
    }

    #[test]
    /// Test that an unfinished trace suspends the monitor instead of
    /// deciding, and that appending resumes it.
    fn waiting_suspends() {
        let schema = schema();
        let t1 = Rc::new(Trace::new(1));
        let t2 = Rc::new(Trace::new(2));
        t1.append(schema.make_event(&[0]).unwrap());
        t1.set_finished();

        let mut monitor = prefix_monitor(&[0, 1], t1, t2.clone());
        for _ in 0..8 {
            assert_eq!(monitor.step(), Verdict::Unknown);
        }

        t2.append(schema.make_event(&[0]).unwrap());
        t2.set_finished();
        assert_eq!(run_to_verdict(&mut monitor), Verdict::True);
    }

    #[test]
    /// Test that a longer left trace is not a prefix of a shorter right one.
    fn longer_left_rejected() {
        let schema = schema();
        let t1 = Rc::new(Trace::new(1));
        let t2 = Rc::new(Trace::new(2));
        t1.append(schema.make_event(&[0]).unwrap());
        t1.append(schema.make_event(&[1]).unwrap());
        t1.set_finished();
        t2.append(schema.make_event(&[0]).unwrap());
        t2.set_finished();

        let mut monitor = prefix_monitor(&[0, 1], t1, t2);
        assert_eq!(run_to_verdict(&mut monitor), Verdict::False);
    }
}
