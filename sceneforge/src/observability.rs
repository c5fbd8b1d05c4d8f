//! Tracing setup and span helpers.

use crate::core::RunId;
use tracing::Span;
use tracing_subscriber::EnvFilter;

/// Installs a global tracing subscriber honoring `RUST_LOG`, defaulting to
/// `info` when the variable is unset.
///
/// Returns an error if a subscriber is already installed.
pub fn init_tracing() -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| e.to_string())
}

/// Builds the span under which one pipeline run executes.
#[must_use]
pub fn run_span(run_id: RunId) -> Span {
    tracing::info_span!("pipeline_run", run_id = %run_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_construction() {
        // Without a subscriber the span is disabled but must still build.
        let span = run_span(RunId::new());
        let _guard = span.enter();
    }
}
