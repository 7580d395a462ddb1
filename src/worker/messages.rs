//! Messages for the undo worker thread.
//!
//! Scheduling requests capture the caller's OpenTelemetry span so the eventual
//! `commit_delete` span on the worker thread is linked to the gesture that caused it.

use crate::domain::ItemId;
use std::sync::mpsc::Sender;
use std::time::Duration;

/// Trace and span ids captured on the sending thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    /// OpenTelemetry trace ID as a hex string.
    pub trace_id: String,

    /// Parent span ID for linking spans across threads.
    pub parent_span_id: String,
}

impl TraceContext {
    /// Captures the active span, or `None` when no valid OpenTelemetry context exists
    /// (for example when tracing was never initialized).
    #[must_use]
    pub fn from_current() -> Option<Self> {
        use opentelemetry::trace::TraceContextExt;
        use tracing_opentelemetry::OpenTelemetrySpanExt;

        let otel_context = tracing::Span::current().context();
        let span_ref = otel_context.span();
        let span_context = span_ref.span_context();

        span_context.is_valid().then(|| Self {
            trace_id: format!("{:032x}", span_context.trace_id()),
            parent_span_id: format!("{:016x}", span_context.span_id()),
        })
    }

    /// Makes this context the remote parent of spans created while the guard lives.
    #[must_use]
    pub fn attach(&self) -> Option<opentelemetry::ContextGuard> {
        use opentelemetry::trace::{
            SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
        };

        let trace_id = TraceId::from_hex(&self.trace_id).ok()?;
        let span_id = SpanId::from_hex(&self.parent_span_id).ok()?;
        let span_context = SpanContext::new(
            trace_id,
            span_id,
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );

        Some(
            opentelemetry::Context::current()
                .with_remote_span_context(span_context)
                .attach(),
        )
    }
}

/// Requests handled by [`super::UndoScheduler`]'s thread.
#[derive(Debug)]
pub enum UndoMessage {
    /// Commit the delete of `id` once `window` has elapsed. Re-scheduling an id
    /// replaces its deadline.
    Schedule {
        id: ItemId,
        window: Duration,
        trace_context: Option<TraceContext>,
    },

    /// Forget the timer for `id`; nothing is committed.
    Cancel { id: ItemId },

    /// Commit every scheduled delete now and reply with how many were committed.
    Flush(Sender<usize>),

    /// Commit every scheduled delete and stop the thread.
    Shutdown,
}

impl UndoMessage {
    /// Builds a `Schedule` request carrying the current trace context.
    #[must_use]
    pub fn schedule(id: ItemId, window: Duration) -> Self {
        Self::Schedule {
            id,
            window,
            trace_context: TraceContext::from_current(),
        }
    }

    pub(crate) const fn kind(&self) -> &'static str {
        match self {
            Self::Schedule { .. } => "schedule",
            Self::Cancel { .. } => "cancel",
            Self::Flush(_) => "flush",
            Self::Shutdown => "shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_context_without_tracing() {
        assert!(TraceContext::from_current().is_none());
        let UndoMessage::Schedule { trace_context, .. } =
            UndoMessage::schedule(ItemId(1), Duration::from_millis(10))
        else {
            panic!("expected schedule");
        };
        assert!(trace_context.is_none());
    }

    #[test]
    fn malformed_context_does_not_attach() {
        let bogus = TraceContext {
            trace_id: "not-hex".into(),
            parent_span_id: "0".into(),
        };
        assert!(bogus.attach().is_none());
    }
}
