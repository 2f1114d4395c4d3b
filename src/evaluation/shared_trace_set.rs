//! Reference-counted trace sets shared between a function producer and the
//! monitors consuming its output.

use crate::evaluation::trace::Trace;
use crate::evaluation::trace_set::{TraceIdAllocator, TraceSet};
use crate::evaluation::trace_set_view::TraceSetView;

use std::rc::Rc;

/// A trace set owned by a [function], handed out to every atom monitor that
/// quantifies over the function's output. The producer appends traces and
/// closes the set; consumers watch it through views.
///
/// [function]: crate::evaluation::function::FunctionTraces
#[derive(Clone, Debug)]
pub struct SharedTraceSet {
    set: Rc<TraceSet>,
}

impl SharedTraceSet {
    pub fn new(ids: Rc<TraceIdAllocator>) -> SharedTraceSet {
        SharedTraceSet {
            set: TraceSet::new(ids),
        }
    }

    /// Create a new trace in the shared set.
    pub fn new_trace(&self) -> Rc<Trace> {
        self.set.new_trace()
    }

    /// Close the set: the function will not produce further traces.
    pub fn close(&self) {
        self.set.close();
    }

    pub fn is_closed(&self) -> bool {
        self.set.is_closed()
    }

    pub fn all_finished(&self) -> bool {
        self.set.all_finished()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// A fresh consumer view of the shared set.
    pub fn view(&self) -> TraceSetView {
        TraceSetView::of(self.set.clone())
    }
}
