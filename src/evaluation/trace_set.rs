//! Owned, insertion-ordered collections of traces.

use crate::evaluation::trace::{Trace, TraceId};

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Allocator of trace ids, shared by every trace set of one monitored system
/// so that ids stay unique across slice boundaries. Ids start at 1; 0 is kept
/// as the "unused" marker in atom-monitor identities.
#[derive(Debug)]
pub struct TraceIdAllocator {
    next: Cell<TraceId>,
}

impl TraceIdAllocator {
    pub fn new() -> Rc<TraceIdAllocator> {
        Rc::new(TraceIdAllocator { next: Cell::new(1) })
    }

    pub fn next_id(&self) -> TraceId {
        let id = self.next.get();
        self.next.set(id + 1);
        id
    }
}

/// An insertion-ordered set of traces. New traces arrive over time; `close()`
/// marks that no further trace will ever be inserted (monotone, like the
/// per-trace `finished` flag). The set carries its own new-trace watermark for
/// single-consumer use; additional consumers use [views].
///
/// [views]: crate::evaluation::trace_set_view::TraceSetView
#[derive(Debug)]
pub struct TraceSet {
    traces: RefCell<Vec<Rc<Trace>>>,
    closed: Cell<bool>,
    ids: Rc<TraceIdAllocator>,
    watermark: Cell<usize>,
}

impl TraceSet {
    pub fn new(ids: Rc<TraceIdAllocator>) -> Rc<TraceSet> {
        Rc::new(TraceSet {
            traces: RefCell::new(Vec::new()),
            closed: Cell::new(false),
            ids,
            watermark: Cell::new(0),
        })
    }

    /// Create a new empty trace in this set and return it.
    pub fn new_trace(&self) -> Rc<Trace> {
        assert!(!self.closed.get(), "Inserting into a closed trace set");
        let trace = Rc::new(Trace::new(self.ids.next_id()));
        self.traces.borrow_mut().push(trace.clone());
        trace
    }

    /// Insert an existing trace.
    pub fn insert(&self, trace: Rc<Trace>) {
        assert!(!self.closed.get(), "Inserting into a closed trace set");
        self.traces.borrow_mut().push(trace);
    }

    pub fn len(&self) -> usize {
        self.traces.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Rc<Trace>> {
        self.traces.borrow().get(index).cloned()
    }

    pub fn find(&self, id: TraceId) -> Option<Rc<Trace>> {
        self.traces.borrow().iter().find(|t| t.id() == id).cloned()
    }

    /// Mark that no further traces will be inserted.
    pub fn close(&self) {
        self.closed.set(true);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    /// Whether every trace of the set is finished.
    pub fn all_finished(&self) -> bool {
        self.traces.borrow().iter().all(|t| t.is_finished())
    }

    /// Return a trace inserted since the last call, if any. This is the set's
    /// own incremental-instantiation cursor.
    pub fn get_new_trace(&self) -> Option<Rc<Trace>> {
        let next = self.watermark.get();
        let trace = self.traces.borrow().get(next).cloned();
        if trace.is_some() {
            self.watermark.set(next + 1);
        }
        trace
    }

    pub fn id_allocator(&self) -> Rc<TraceIdAllocator> {
        self.ids.clone()
    }
}
