//! Trace sink boundary.
//!
//! Translation logic never inspects trace state directly; every
//! decision worth observing flows through [`TraceEvent`] and
//! [`TraceSink`]. This module is the only bridge between the
//! translator and whatever the host wires the events into.

use std::{cell::RefCell, rc::Rc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Rc<dyn TraceSink>>> = const { RefCell::new(None) };
}

///
/// TraceEvent
///

#[derive(Clone, Debug)]
pub enum TraceEvent {
    TranslateStart,
    TranslateFinish {
        plan_nodes: usize,
        bindings: usize,
    },
    /// A nested aggregate was absorbed into the grouped plan.
    AggregateFolded {
        func: &'static str,
    },
    /// A nested aggregate fell back to a correlated apply.
    AggregateApplyFallback {
        func: &'static str,
    },
    /// A translated query was wrapped for single-slot replay.
    Parameterized {
        slot: usize,
    },
    /// A captured local sequence was adapted into an in-plan source.
    LocalSourceAdapted {
        width: usize,
    },
}

///
/// TraceSink
///

pub trait TraceSink {
    fn record(&self, event: TraceEvent);
}

/// Default sink: drop everything. Hosts that want telemetry install a
/// scoped override.
struct NullSink;

impl TraceSink for NullSink {
    fn record(&self, _: TraceEvent) {}
}

pub(crate) fn record(event: TraceEvent) {
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match sink {
        Some(sink) => sink.record(event),
        None => NullSink.record(event),
    }
}

/// Run a closure with a temporary trace sink override. The previous
/// sink is restored on all exits, including unwind.
pub fn with_trace_sink<T>(sink: Rc<dyn TraceSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Rc<dyn TraceSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| {
                *cell.borrow_mut() = self.0.take();
            });
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}
