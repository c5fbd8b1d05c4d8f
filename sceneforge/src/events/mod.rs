//! Trace sinks for observing per-stage lifecycle records.
//!
//! These are observability plumbing, separate from the consumer-facing
//! event stream: the stream carries the artifacts a caller renders, while
//! trace records carry timings and outcomes for logging and monitoring.

mod sink;

pub use sink::{
    CollectingTraceSink, LoggingTraceSink, NoOpTraceSink, TracePhase, TraceRecord, TraceSink,
};
