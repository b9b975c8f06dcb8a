//! Per-request state.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use http::StatusCode;

use crate::trace::TraceParent;

/// Values carried alongside one in-flight request.
///
/// The dispatcher creates a fresh `Context` for every request and hands it to
/// the handler chain as `&mut Context`. Nothing is pooled or shared across
/// requests. The trace and start time are fixed at creation; the status is
/// written by [`respond`](crate::respond) so that logging middleware can read
/// it after the handler returns.
#[derive(Debug)]
pub struct Context {
    trace: TraceParent,
    start: Instant,
    started_at: DateTime<Utc>,
    status: Option<StatusCode>,
}

impl Context {
    pub fn new(trace: TraceParent) -> Self {
        Self { trace, start: Instant::now(), started_at: Utc::now(), status: None }
    }

    pub fn trace(&self) -> &TraceParent { &self.trace }
    pub fn trace_id(&self) -> &str { self.trace.trace_id() }
    pub fn start(&self) -> Instant { self.start }
    pub fn started_at(&self) -> DateTime<Utc> { self.started_at }
    pub fn elapsed(&self) -> Duration { self.start.elapsed() }

    /// The status code written for this request, if a response was sent.
    pub fn status(&self) -> Option<StatusCode> { self.status }

    pub(crate) fn set_status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

/// A context for a brand-new root trace. Handy in tests.
impl Default for Context {
    fn default() -> Self { Self::new(TraceParent::root()) }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn fresh_context_has_no_status() {
        let ctx = Context::default();
        assert_eq!(ctx.status(), None);
        assert_eq!(ctx.trace_id().len(), 32);
    }

    #[test]
    fn start_times_are_taken_at_creation() {
        let before = Utc::now();
        let ctx = Context::new(TraceParent::root());
        let after = Utc::now();

        assert!(ctx.started_at() >= before && ctx.started_at() <= after);
        assert!(ctx.start() <= Instant::now());
        assert!(ctx.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn child_trace_is_kept() {
        let parent = TraceParent::root();
        let ctx = Context::new(parent.child());
        assert_eq!(ctx.trace_id(), parent.trace_id());
        assert_ne!(ctx.trace().span_id(), parent.span_id());
    }
}
