//! The contract between monitors and external function-trace providers.

use crate::evaluation::shared_trace_set::SharedTraceSet;
use crate::evaluation::trace::Trace;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A provider of function trace sets. For every tuple of argument traces the
/// provider exposes one shared trace set; the monitor grants it compute time
/// through `step()` and watches `all_traces_finished()` for the end of stream.
pub trait FunctionTraces {
    /// The trace set produced for the given argument traces. Repeated calls
    /// with the same arguments must return the same shared set.
    fn get_trace_set(&mut self, args: &[Rc<Trace>]) -> SharedTraceSet;

    /// Let the provider append events and traces to its trace sets. Called
    /// once per monitor step.
    fn step(&mut self);

    /// Whether every produced trace set is closed and all its traces are
    /// finished.
    fn all_traces_finished(&self) -> bool;
}

/// The functions available to a monitor, by name. The registry is shared by
/// the whole monitor chain; only the top-level monitor steps the providers.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Rc<RefCell<dyn FunctionTraces>>>,
}

impl FunctionRegistry {
    pub fn new() -> FunctionRegistry {
        FunctionRegistry::default()
    }

    pub fn register(&mut self, name: &str, function: Rc<RefCell<dyn FunctionTraces>>) {
        self.functions.insert(name.to_string(), function);
    }

    pub fn get(&self, name: &str) -> Option<Rc<RefCell<dyn FunctionTraces>>> {
        self.functions.get(name).cloned()
    }

    /// Step every registered provider once.
    pub fn step_all(&self) {
        for function in self.functions.values() {
            function.borrow_mut().step();
        }
    }

    /// Whether every registered provider finished all its traces.
    pub fn all_finished(&self) -> bool {
        self.functions
            .values()
            .all(|f| f.borrow().all_traces_finished())
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
