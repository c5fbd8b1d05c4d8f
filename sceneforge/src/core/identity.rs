//! Identity types correlating work within and across pipeline runs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation key for one identified object, stable across every stage of
/// a single run.
///
/// Ids are assigned once, by prompt position in the analysis output, and
/// carried inside every downstream payload so that a consumer can match the
/// image and mesh updates for the same object without re-deriving order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ObjectId(pub usize);

impl ObjectId {
    /// Returns the id as an index into prompt-ordered collections.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one end-to-end pipeline run.
///
/// Minted when the run starts and stamped onto every trace record; a run
/// has no identity (or state) once its terminal event has been consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Mints a fresh run id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
