//! Consumer-facing event sequence for one pipeline run.

use crate::cancellation::CancelToken;
use crate::core::PipelineEvent;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The ordered, lazily produced sequence of [`PipelineEvent`]s for one run.
///
/// Emission is synchronized with consumption through a single-slot channel:
/// the producer can never run more than one undelivered event ahead of the
/// consumer, so the caller's pace is the pipeline's pace.
///
/// Dropping the stream abandons the run: the producer task is aborted,
/// which cancels every in-flight generation call, and nothing further is
/// emitted or buffered.
pub struct EventStream {
    rx: mpsc::Receiver<PipelineEvent>,
    handle: JoinHandle<()>,
    token: Arc<CancelToken>,
}

impl EventStream {
    pub(crate) fn new(
        rx: mpsc::Receiver<PipelineEvent>,
        handle: JoinHandle<()>,
        token: Arc<CancelToken>,
    ) -> Self {
        Self { rx, handle, token }
    }

    /// Pulls the next event, or `None` once the sequence has terminated.
    pub async fn next_event(&mut self) -> Option<PipelineEvent> {
        self.rx.recv().await
    }

    /// Cancels the run without consuming the stream.
    ///
    /// In-flight generation calls are aborted; any event already sitting in
    /// the slot may still be received, after which the sequence ends.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.token.cancel(reason);
        self.handle.abort();
    }

    /// Whether the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The cancellation reason, if the run was cancelled.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<String> {
        self.token.reason()
    }

    /// Drains the remaining events into a vector.
    pub async fn collect_events(mut self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }
}

impl Stream for EventStream {
    type Item = PipelineEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            self.token.cancel("event stream dropped by consumer");
            self.handle.abort();
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
