//! Non-owning views of a trace set with their own new-trace watermarks.

use crate::evaluation::trace::Trace;
use crate::evaluation::trace_set::TraceSet;

use std::cell::Cell;
use std::rc::Rc;

/// A view of one [TraceSet]. The view shares the owner's traces but keeps its
/// own watermark, so several consumers (one per quantifier of a monitor) can
/// each see every trace exactly once.
#[derive(Debug)]
pub struct TraceSetView {
    owner: Rc<TraceSet>,
    watermark: Cell<usize>,
}

impl TraceSetView {
    pub fn of(owner: Rc<TraceSet>) -> TraceSetView {
        TraceSetView {
            owner,
            watermark: Cell::new(0),
        }
    }

    /// Return a trace the view has not reported yet, if any. The contract is
    /// the same as [TraceSet::get_new_trace], against this view's watermark.
    pub fn get_new_trace(&self) -> Option<Rc<Trace>> {
        let next = self.watermark.get();
        let trace = self.owner.get(next);
        if trace.is_some() {
            self.watermark.set(next + 1);
        }
        trace
    }

    /// Whether the owner will never receive further traces.
    pub fn is_closed(&self) -> bool {
        self.owner.is_closed()
    }

    pub fn owner(&self) -> &Rc<TraceSet> {
        &self.owner
    }
}

#[cfg(test)]
mod tests {
    use crate::evaluation::trace_set::{TraceIdAllocator, TraceSet};
    use crate::evaluation::trace_set_view::TraceSetView;

    #[test]
    /// Test that views keep independent watermarks over one owner.
    fn independent_watermarks() {
        let set = TraceSet::new(TraceIdAllocator::new());
        let first = TraceSetView::of(set.clone());
        let second = TraceSetView::of(set.clone());

        set.new_trace();
        set.new_trace();

        assert_eq!(first.get_new_trace().unwrap().id(), 1);
        assert_eq!(first.get_new_trace().unwrap().id(), 2);
        assert!(first.get_new_trace().is_none());

        // the second view still sees everything
        assert_eq!(second.get_new_trace().unwrap().id(), 1);

        set.new_trace();
        assert_eq!(first.get_new_trace().unwrap().id(), 3);
        assert_eq!(second.get_new_trace().unwrap().id(), 2);

        assert!(!first.is_closed());
        set.close();
        assert!(first.is_closed() && second.is_closed());
    }
}
