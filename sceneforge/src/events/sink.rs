//! Trace sink trait and implementations.

use crate::core::{ObjectId, RunId, StageKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, Level};

/// Phase of a stage lifecycle record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TracePhase {
    /// The stage (or one object's slice of it) began.
    Started,
    /// It completed successfully.
    Completed,
    /// It failed.
    Failed,
}

/// One lifecycle record emitted by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    /// The run this record belongs to.
    pub run_id: RunId,
    /// The stage concerned.
    pub stage: StageKind,
    /// What happened.
    pub phase: TracePhase,
    /// The object concerned, for per-object records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Wall time of the completed work in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Free-form detail (object counts, error text).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// When the record was created (ISO 8601).
    pub timestamp: String,
}

impl TraceRecord {
    fn new(run_id: RunId, stage: StageKind, phase: TracePhase) -> Self {
        Self {
            run_id,
            stage,
            phase,
            id: None,
            duration_ms: None,
            detail: None,
            timestamp: crate::utils::iso_timestamp(),
        }
    }

    /// Creates a "started" record.
    #[must_use]
    pub fn started(run_id: RunId, stage: StageKind) -> Self {
        Self::new(run_id, stage, TracePhase::Started)
    }

    /// Creates a "completed" record with a duration.
    #[must_use]
    pub fn completed(run_id: RunId, stage: StageKind, duration_ms: f64) -> Self {
        let mut record = Self::new(run_id, stage, TracePhase::Completed);
        record.duration_ms = Some(duration_ms);
        record
    }

    /// Creates a "failed" record with the error text.
    #[must_use]
    pub fn failed(run_id: RunId, stage: StageKind, detail: impl Into<String>) -> Self {
        let mut record = Self::new(run_id, stage, TracePhase::Failed);
        record.detail = Some(detail.into());
        record
    }

    /// Scopes the record to one object.
    #[must_use]
    pub fn for_object(mut self, id: ObjectId) -> Self {
        self.id = Some(id);
        self
    }

    /// Attaches free-form detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Receives trace records from running pipelines.
///
/// Records are awaited inline between event emissions, so implementations
/// should hand work off rather than block the run.
#[async_trait]
pub trait TraceSink: Send + Sync {
    /// Accepts one record.
    async fn record(&self, record: &TraceRecord);
}

/// A sink that discards all records. Used when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpTraceSink;

#[async_trait]
impl TraceSink for NoOpTraceSink {
    async fn record(&self, _record: &TraceRecord) {
        // Intentionally empty
    }
}

/// A sink that logs records through the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingTraceSink {
    level: Level,
}

impl Default for LoggingTraceSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingTraceSink {
    /// Creates a sink logging at the given level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

#[async_trait]
impl TraceSink for LoggingTraceSink {
    async fn record(&self, record: &TraceRecord) {
        if self.level == Level::DEBUG {
            debug!(
                run_id = %record.run_id,
                stage = %record.stage,
                phase = ?record.phase,
                object = record.id.map(ObjectId::index),
                duration_ms = record.duration_ms,
                detail = record.detail.as_deref(),
                "stage trace"
            );
        } else {
            info!(
                run_id = %record.run_id,
                stage = %record.stage,
                phase = ?record.phase,
                object = record.id.map(ObjectId::index),
                duration_ms = record.duration_ms,
                detail = record.detail.as_deref(),
                "stage trace"
            );
        }
    }
}

/// A sink that collects records for inspection in tests.
#[derive(Debug, Default)]
pub struct CollectingTraceSink {
    records: parking_lot::RwLock<Vec<TraceRecord>>,
}

impl CollectingTraceSink {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected records.
    #[must_use]
    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.read().clone()
    }

    /// Returns the number of collected records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Returns records for one stage.
    #[must_use]
    pub fn of_stage(&self, stage: StageKind) -> Vec<TraceRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.stage == stage)
            .cloned()
            .collect()
    }

    /// Clears all collected records.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

#[async_trait]
impl TraceSink for CollectingTraceSink {
    async fn record(&self, record: &TraceRecord) {
        self.records.write().push(record.clone());
    }
}
