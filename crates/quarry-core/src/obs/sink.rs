//! Diagnostic sink boundary.
//!
//! Forge logic MUST NOT log hardened-mode warnings directly.
//! All such diagnostics flow through DiagnosticEvent and DiagnosticSink, so
//! the caller decides whether to log, ignore or escalate them.
use std::{cell::RefCell, fmt};
use tracing::warn;

///
/// DiagnosticEvent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DiagnosticEvent {
    /// A plural populate will fall back to the in-memory join while its
    /// sub-criteria page or sort the associated records.
    UnoptimizedPopulate {
        model: String,
        attribute: String,
        skip: u64,
        limit: u64,
        custom_sort: bool,
    },
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnoptimizedPopulate {
                model, attribute, ..
            } => write!(
                f,
                "populating '{attribute}' of model '{model}' with skip, limit or sort in its \
                 sub-criteria runs as an in-memory join; this can exhaust memory on large \
                 associations. Consider an explicit query on the associated model instead."
            ),
        }
    }
}

///
/// DiagnosticSink
///

pub trait DiagnosticSink {
    fn record(&self, event: DiagnosticEvent);
}

///
/// TracingSink
/// Default sink: every event becomes a `tracing` warning.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, event: DiagnosticEvent) {
        match &event {
            DiagnosticEvent::UnoptimizedPopulate {
                model,
                attribute,
                skip,
                limit,
                custom_sort,
            } => warn!(
                model = %model,
                attribute = %attribute,
                skip,
                limit,
                custom_sort,
                "{event}"
            ),
        }
    }
}

///
/// NoopSink
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl DiagnosticSink for NoopSink {
    fn record(&self, _event: DiagnosticEvent) {}
}

///
/// CollectingSink
/// Buffers events in memory; useful for callers that report them later.
///

#[derive(Debug, Default)]
pub struct CollectingSink {
    events: RefCell<Vec<DiagnosticEvent>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain every event recorded so far.
    pub fn take(&self) -> Vec<DiagnosticEvent> {
        self.events.take()
    }
}

impl DiagnosticSink for CollectingSink {
    fn record(&self, event: DiagnosticEvent) {
        self.events.borrow_mut().push(event);
    }
}
