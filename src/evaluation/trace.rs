//! Append-only event traces, the shared medium between event producers and
//! monitors.

use crate::events::Event;

use std::cell::{Cell, RefCell};

pub type TraceId = u64;

/// The result of asking a trace for the event at a position.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TraceQuery {
    /// The event at the position.
    Has(Event),
    /// The position is past the end so far, but the trace is not finished;
    /// the reader must retry later. This is the only suspension point of the
    /// whole runtime.
    Waiting,
    /// The position is past the end of a finished trace.
    End,
}

/// An append-only sequence of events with a stable id and a monotone
/// `finished` flag. Producers append and eventually finish the trace; monitors
/// read it through positional queries. The single-threaded cooperative model
/// needs no locking, only interior mutability.
#[derive(Debug)]
pub struct Trace {
    id: TraceId,
    events: RefCell<Vec<Event>>,
    finished: Cell<bool>,
}

impl Trace {
    pub fn new(id: TraceId) -> Trace {
        Trace {
            id,
            events: RefCell::new(Vec::new()),
            finished: Cell::new(false),
        }
    }

    pub fn id(&self) -> TraceId {
        self.id
    }

    /// Append an event. Appending to a finished trace is a producer bug.
    pub fn append(&self, event: Event) {
        assert!(!self.finished.get(), "Appending to a finished trace");
        self.events.borrow_mut().push(event);
    }

    /// Mark the trace finished: no event will ever be appended again. The
    /// transition is monotone.
    pub fn set_finished(&self) {
        self.finished.set(true);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Query the event at `pos`.
    pub fn get(&self, pos: usize) -> TraceQuery {
        let events = self.events.borrow();
        match events.get(pos) {
            Some(event) => TraceQuery::Has(event.clone()),
            None if self.finished.get() => TraceQuery::End,
            None => TraceQuery::Waiting,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::evaluation::trace::{Trace, TraceQuery};
    use crate::events::{EventSchema, FieldTy};

    #[test]
    /// Test the three query outcomes and the monotone finish transition.
    fn query_semantics() {
        let schema = EventSchema::from_slices(&[("in", FieldTy::Int)]).unwrap();
        let trace = Trace::new(1);

        assert_eq!(trace.get(0), TraceQuery::Waiting);

        trace.append(schema.make_event(&[7]).unwrap());
        match trace.get(0) {
            TraceQuery::Has(event) => assert_eq!(event.get(0), 7),
            other => panic!("Expected an event, got {other:?}"),
        }
        assert_eq!(trace.get(1), TraceQuery::Waiting);

        trace.set_finished();
        assert!(trace.is_finished());
        assert_eq!(trace.get(1), TraceQuery::End);
        assert!(matches!(trace.get(0), TraceQuery::Has(_)));
    }
}
