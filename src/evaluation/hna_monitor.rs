//! The hypernode-automaton monitor: a slice tree that routes input events
//! into per-slice HNL monitors, spawning child slices on action events.

use crate::compilation::program::HnaProgram;
use crate::evaluation::function::FunctionRegistry;
use crate::evaluation::hnl_monitor::{HnlMonitor, MonitorEnv};
use crate::evaluation::trace::Trace;
use crate::evaluation::trace_set::{TraceIdAllocator, TraceSet};
use crate::evaluation::{MonitorStats, Verdict};
use crate::events::ActionEvent;

use log::debug;
use std::collections::HashMap;
use std::rc::Rc;

/// One node of the slice tree: a hypernode state, the trace set of events
/// sliced into this node, the HNL monitor of the node's formula, and the
/// children spawned by actions. Nodes reference each other by arena indices,
/// so the tree stays free of ownership cycles.
struct SliceTreeNode {
    state: usize,
    set: Rc<TraceSet>,
    monitor: HnlMonitor,
    children: HashMap<usize, usize>,
    verdict: Verdict,
}

/// Where the events of one input trace currently go.
struct InputSlot {
    node: usize,
    trace: Rc<Trace>,
}

/// The monitor of a compiled hypernode automaton. The driver opens input
/// traces, pushes their (action) events, and steps the monitor; the monitor
/// owns the slice tree (`_nodes` holds every live node for step scheduling).
pub struct HnaMonitor {
    program: Rc<HnaProgram>,
    env_functions: Rc<FunctionRegistry>,
    ids: Rc<TraceIdAllocator>,
    nodes: Vec<SliceTreeNode>,
    inputs: HashMap<u64, InputSlot>,
    input_closed: bool,
    verdict: Option<Verdict>,
}

impl HnaMonitor {
    /// Create the monitor, with one root slice for the initial hypernode.
    pub fn new(
        program: Rc<HnaProgram>,
        functions: Rc<FunctionRegistry>,
    ) -> Result<HnaMonitor, String> {
        let ids = TraceIdAllocator::new();
        let mut monitor = HnaMonitor {
            program: program.clone(),
            env_functions: functions,
            ids,
            nodes: Vec::new(),
            inputs: HashMap::new(),
            input_closed: false,
            verdict: None,
        };
        monitor.new_node(program.initial)?;
        Ok(monitor)
    }

    fn new_node(&mut self, state: usize) -> Result<usize, String> {
        let set = TraceSet::new(self.ids.clone());
        let state_program = &self.program.states[state];
        let env = MonitorEnv {
            input: set.clone(),
            functions: self.env_functions.clone(),
        };
        let mut monitor = HnlMonitor::nested(state_program.root.clone(), env, Vec::new())?;
        monitor.set_negate_output(state_program.negate_output);
        let id = self.nodes.len();
        debug!(
            "new slice node {id} for hypernode '{}'",
            state_program.name
        );
        self.nodes.push(SliceTreeNode {
            state,
            set,
            monitor,
            children: HashMap::new(),
            verdict: Verdict::Unknown,
        });
        Ok(id)
    }

    /// Register a new input trace; its events start in the root slice. The
    /// key is the driver's name for the trace.
    pub fn open_trace(&mut self, key: u64) -> Result<(), String> {
        if self.input_closed {
            return Err("The input is closed".to_string());
        }
        if self.inputs.contains_key(&key) {
            return Err(format!("Input trace {key} is already open"));
        }
        let trace = self.nodes[0].set.new_trace();
        self.inputs.insert(key, InputSlot { node: 0, trace });
        Ok(())
    }

    /// Deliver one (action) event of an input trace.
    ///
    /// A regular event is appended to the trace segment of the slice the
    /// trace currently belongs to. An action event finishes that segment and
    /// routes the remainder of the trace into the child slice the automaton
    /// transition points to, creating the slice on first use. An action without a
    /// transition means the trace is not covered by the automaton; its
    /// slicing is retired.
    pub fn push(&mut self, key: u64, event: ActionEvent) -> Result<(), String> {
        if self.input_closed {
            return Err("The input is closed".to_string());
        }
        let slot = self
            .inputs
            .get_mut(&key)
            .ok_or_else(|| format!("Input trace {key} is not open"))?;

        match event {
            ActionEvent::Event(event) => {
                slot.trace.append(event);
                Ok(())
            }
            ActionEvent::Action(action) => {
                if action >= self.program.actions.len() {
                    return Err(format!("Unknown action id {action}"));
                }
                let node = slot.node;
                let Some(&next_state) = self.program.delta[self.nodes[node].state].get(&action)
                else {
                    debug!(
                        "input trace {key}: action '{}' is not covered, retiring the slice",
                        self.program.actions[action]
                    );
                    slot.trace.set_finished();
                    self.inputs.remove(&key);
                    return Ok(());
                };

                let child = match self.nodes[node].children.get(&action) {
                    Some(&child) => child,
                    None => {
                        let child = self.new_node(next_state)?;
                        self.nodes[node].children.insert(action, child);
                        child
                    }
                };

                // the events before the action stay in the old slice, the
                // events after it start a fresh segment in the child slice
                let slot = self.inputs.get_mut(&key).expect("Slot is present");
                slot.trace.set_finished();
                slot.trace = self.nodes[child].set.new_trace();
                slot.node = child;
                Ok(())
            }
        }
    }

    /// Mark one input trace finished.
    pub fn close_trace(&mut self, key: u64) -> Result<(), String> {
        let slot = self
            .inputs
            .remove(&key)
            .ok_or_else(|| format!("Input trace {key} is not open"))?;
        slot.trace.set_finished();
        Ok(())
    }

    /// Mark the whole input finished: every remaining trace segment is
    /// finished and every slice's trace set is closed.
    pub fn close_input(&mut self) {
        self.input_closed = true;
        for slot in self.inputs.values() {
            slot.trace.set_finished();
        }
        self.inputs.clear();
        for node in &self.nodes {
            node.set.close();
        }
    }

    /// One cooperative step: visit every live slice and step its monitor.
    /// The automaton accepts iff every reachable slice yields TRUE; any slice
    /// yielding FALSE is final.
    pub fn step(&mut self) -> Verdict {
        if let Some(verdict) = self.verdict {
            return verdict;
        }
        self.env_functions.step_all();

        for i in 0..self.nodes.len() {
            if self.nodes[i].verdict != Verdict::Unknown {
                continue;
            }
            let verdict = self.nodes[i].monitor.step();
            if verdict == Verdict::False {
                debug!(
                    "slice {i} ('{}') violated its formula",
                    self.program.states[self.nodes[i].state].name
                );
                self.verdict = Some(Verdict::False);
                self.nodes.clear();
                self.inputs.clear();
                return Verdict::False;
            }
            self.nodes[i].verdict = verdict;
        }

        if self.input_closed
            && self
                .nodes
                .iter()
                .all(|node| node.verdict == Verdict::True)
        {
            self.verdict = Some(Verdict::True);
            return Verdict::True;
        }
        Verdict::Unknown
    }

    /// The verdict reached so far, without stepping.
    pub fn verdict(&self) -> Verdict {
        self.verdict.unwrap_or(Verdict::Unknown)
    }

    pub fn num_slices(&self) -> usize {
        self.nodes.len()
    }

    /// Aggregate statistics over all slice monitors.
    pub fn stats(&self) -> MonitorStats {
        let mut stats = MonitorStats::default();
        for node in &self.nodes {
            let s = node.monitor.stats();
            stats.num_instances += s.num_instances;
            stats.num_atom_monitors += s.num_atom_monitors;
            stats.num_steps += s.num_steps;
        }
        stats
    }
}
