//! Interfaces to the hosted generation services.
//!
//! Each remote generation operation is a black box behind a narrow trait,
//! so the orchestrator can be exercised against stubs and mocks and a
//! backend can be swapped without touching pipeline logic. The `remote`
//! feature supplies HTTP-backed implementations.

pub mod prompts;

#[cfg(feature = "remote")]
mod fal;
#[cfg(feature = "remote")]
mod gemini;

#[cfg(feature = "remote")]
pub use fal::FalMeshClient;
#[cfg(feature = "remote")]
pub use gemini::GeminiClient;

use crate::core::{ImagePayload, SceneAnalysis, Suggestion};
use crate::errors::ServiceError;
use async_trait::async_trait;
use std::sync::Arc;

/// Decomposes one photo into a scene overview and per-object generation
/// prompts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SceneAnalyzer: Send + Sync {
    /// Analyzes the photo. One call per run; failure is fatal to the run.
    async fn analyze(&self, photo: &ImagePayload) -> Result<SceneAnalysis, ServiceError>;
}

/// Produces one still image from one generation prompt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generates an image for the prompt. Invoked once per identified
    /// object, concurrently across objects.
    async fn generate_image(&self, prompt: &str) -> Result<ImagePayload, ServiceError>;
}

/// Produces one 3D-printable mesh from one generated image.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MeshGenerator: Send + Sync {
    /// Generates a mesh and returns the location of the asset. `hint`
    /// carries the object name for backends that accept one.
    async fn generate_mesh(
        &self,
        image: &ImagePayload,
        hint: &str,
    ) -> Result<String, ServiceError>;
}

/// Arranges a set of generated images into one composite shot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SceneCompositor: Send + Sync {
    /// Composites the images. `images` is in identity order; failure is
    /// fatal to the run.
    async fn composite(
        &self,
        images: &[ImagePayload],
        description: &str,
    ) -> Result<ImagePayload, ServiceError>;
}

/// Suggests captions for a captured photo.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// Returns up to `count` suggestions for the photo.
    async fn suggestions(
        &self,
        photo: &ImagePayload,
        count: usize,
    ) -> Result<Vec<Suggestion>, ServiceError>;
}

/// Bundle of collaborator handles injected into a pipeline at construction
/// time.
#[derive(Clone)]
pub struct SceneServices {
    /// Scene analysis backend.
    pub analyzer: Arc<dyn SceneAnalyzer>,
    /// Per-object image backend.
    pub images: Arc<dyn ImageGenerator>,
    /// Per-object mesh backend.
    pub meshes: Arc<dyn MeshGenerator>,
    /// Composite backend.
    pub compositor: Arc<dyn SceneCompositor>,
}

impl SceneServices {
    /// Bundles four collaborator handles.
    #[must_use]
    pub fn new(
        analyzer: Arc<dyn SceneAnalyzer>,
        images: Arc<dyn ImageGenerator>,
        meshes: Arc<dyn MeshGenerator>,
        compositor: Arc<dyn SceneCompositor>,
    ) -> Self {
        Self {
            analyzer,
            images,
            meshes,
            compositor,
        }
    }

    /// Bundles one value implementing every collaborator trait.
    #[must_use]
    pub fn from_single<S>(service: Arc<S>) -> Self
    where
        S: SceneAnalyzer + ImageGenerator + MeshGenerator + SceneCompositor + 'static,
    {
        Self {
            analyzer: service.clone(),
            images: service.clone(),
            meshes: service.clone(),
            compositor: service,
        }
    }
}

impl std::fmt::Debug for SceneServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneServices").finish_non_exhaustive()
    }
}

/// Maps a non-2xx response to [`ServiceError::Status`], consuming the body
/// as the message.
#[cfg(feature = "remote")]
pub(crate) async fn expect_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status: status.as_u16(),
        message,
    })
}
