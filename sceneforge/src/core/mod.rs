//! Core data types: identities, generated artifacts, and the event
//! vocabulary consumed by callers.

mod artifact;
mod event;
mod identity;

pub use artifact::{
    GeneratedImage, GeneratedMesh, GenerationPrompt, ImagePayload, SceneAnalysis, Suggestion,
};
pub use event::{PipelineEvent, PipelineFailure, StageKind};
pub use identity::{ObjectId, RunId};
