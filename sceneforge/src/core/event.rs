//! The ordered event vocabulary a pipeline run emits.

use crate::core::{GeneratedImage, GeneratedMesh, GenerationPrompt, ImagePayload, ObjectId};
use serde::{Deserialize, Serialize};

/// One of the four pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Scene analysis: photo in, prompt list out.
    Analysis,
    /// Per-object image generation.
    Image,
    /// Per-object mesh generation.
    Mesh,
    /// Final composite generation.
    Composite,
}

impl StageKind {
    /// Whether a failure in this stage terminates the whole run.
    ///
    /// Analysis and composite failures are fatal; image and mesh failures
    /// are scoped to one object and leave siblings running.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Analysis | Self::Composite)
    }

    /// The stage's wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Image => "image",
            Self::Mesh => "mesh",
            Self::Composite => "composite",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `failed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineFailure {
    /// The stage that failed.
    pub stage: StageKind,
    /// The affected object for identity-scoped failures; `None` for
    /// run-level failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Human-readable cause.
    pub message: String,
}

impl PipelineFailure {
    /// Creates a run-level failure.
    #[must_use]
    pub fn fatal(stage: StageKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            id: None,
            message: message.into(),
        }
    }

    /// Creates a failure scoped to one object.
    #[must_use]
    pub fn for_object(stage: StageKind, id: ObjectId, message: impl Into<String>) -> Self {
        Self {
            stage,
            id: Some(id),
            message: message.into(),
        }
    }

    /// Whether this failure terminates the run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.stage.is_fatal()
    }
}

/// An event on a run's ordered stream.
///
/// Events are immutable and consumed exactly once, in emission order. The
/// serialized form carries a discriminant tag plus, where applicable, the
/// object id, so a caller can correlate image and mesh updates for the same
/// object without re-deriving order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// The complete prompt list, always first among data-bearing events.
    PromptsReady(Vec<GenerationPrompt>),
    /// One object's image finished; arrives in completion order.
    CreatedImage(GeneratedImage),
    /// Every image outcome (success or failure) is known.
    AllImagesCreated,
    /// One object's mesh finished; arrives in completion order.
    MeshGenerated(GeneratedMesh),
    /// The composite shot is ready.
    CompositeImageCreated(ImagePayload),
    /// The run completed; nothing follows.
    Finished,
    /// A stage failed. Fatal failures terminate the stream; identity-scoped
    /// ones leave sibling objects running.
    Failed(PipelineFailure),
}

impl PipelineEvent {
    /// The event's wire name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::PromptsReady(_) => "prompts_ready",
            Self::CreatedImage(_) => "created_image",
            Self::AllImagesCreated => "all_images_created",
            Self::MeshGenerated(_) => "mesh_generated",
            Self::CompositeImageCreated(_) => "composite_image_created",
            Self::Finished => "finished",
            Self::Failed(_) => "failed",
        }
    }

    /// Whether no further events can follow this one.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Finished => true,
            Self::Failed(failure) => failure.is_fatal(),
            _ => false,
        }
    }

    /// The object this event concerns, if it is identity-scoped.
    #[must_use]
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Self::CreatedImage(image) => Some(image.id),
            Self::MeshGenerated(mesh) => Some(mesh.id),
            Self::Failed(failure) => failure.id,
            _ => None,
        }
    }
}
