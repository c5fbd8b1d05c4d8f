//! Stub collaborators for exercising the pipeline without live services.
//!
//! [`StubSceneService`] implements every collaborator trait with canned,
//! deterministic outputs: images resolve after a configurable per-object
//! delay so tests can force a specific completion order, and any object can
//! be primed to fail. Downstream consumers can use it to develop UI flows
//! without credentials.

use crate::core::{GenerationPrompt, ImagePayload, SceneAnalysis, Suggestion};
use crate::errors::ServiceError;
use crate::services::{
    ImageGenerator, MeshGenerator, SceneAnalyzer, SceneCompositor, SuggestionProvider,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// A tiny PNG-tagged payload usable as the input photo in tests.
#[must_use]
pub fn test_photo() -> ImagePayload {
    ImagePayload::png(vec![0x89, b'P', b'N', b'G'])
}

/// Configurable stub implementation of every collaborator trait.
///
/// Prompts produced by the stubbed analysis are simply the object names, so
/// delays and failures are keyed by name for both the image and mesh
/// stages.
#[derive(Debug)]
pub struct StubSceneService {
    analysis: Result<SceneAnalysis, String>,
    image_delays: RwLock<HashMap<String, Duration>>,
    mesh_delays: RwLock<HashMap<String, Duration>>,
    failing_images: RwLock<HashSet<String>>,
    failing_meshes: RwLock<HashSet<String>>,
    fail_composite: AtomicBool,
    image_calls: AtomicUsize,
    images_completed: AtomicUsize,
    mesh_calls: AtomicUsize,
    composite_calls: AtomicUsize,
}

impl StubSceneService {
    fn with_analysis(analysis: Result<SceneAnalysis, String>) -> Self {
        Self {
            analysis,
            image_delays: RwLock::new(HashMap::new()),
            mesh_delays: RwLock::new(HashMap::new()),
            failing_images: RwLock::new(HashSet::new()),
            failing_meshes: RwLock::new(HashSet::new()),
            fail_composite: AtomicBool::new(false),
            image_calls: AtomicUsize::new(0),
            images_completed: AtomicUsize::new(0),
            mesh_calls: AtomicUsize::new(0),
            composite_calls: AtomicUsize::new(0),
        }
    }

    /// Creates a stub whose analysis identifies the given objects.
    #[must_use]
    pub fn with_objects(names: &[&str]) -> Self {
        let analysis = SceneAnalysis {
            scene_overview: format!("A scene with {} objects.", names.len()),
            identified_objects: names.iter().map(ToString::to_string).collect(),
            generation_prompts: names
                .iter()
                .map(|name| GenerationPrompt {
                    object_name: (*name).to_string(),
                    prompt: (*name).to_string(),
                })
                .collect(),
        };
        Self::with_analysis(Ok(analysis))
    }

    /// Creates a stub whose analysis identifies nothing.
    #[must_use]
    pub fn empty_scene() -> Self {
        Self::with_objects(&[])
    }

    /// Creates a stub whose analysis call fails.
    #[must_use]
    pub fn failing_analysis(message: impl Into<String>) -> Self {
        Self::with_analysis(Err(message.into()))
    }

    /// Delays the named object's image call.
    pub fn delay_image(&self, name: &str, delay: Duration) {
        self.image_delays.write().insert(name.to_string(), delay);
    }

    /// Makes the named object's image call fail.
    pub fn fail_image(&self, name: &str) {
        self.failing_images.write().insert(name.to_string());
    }

    /// Delays the named object's mesh call.
    pub fn delay_mesh(&self, name: &str, delay: Duration) {
        self.mesh_delays.write().insert(name.to_string(), delay);
    }

    /// Makes the named object's mesh call fail.
    pub fn fail_mesh(&self, name: &str) {
        self.failing_meshes.write().insert(name.to_string());
    }

    /// Makes the composite call fail.
    pub fn fail_composite(&self) {
        self.fail_composite.store(true, Ordering::SeqCst);
    }

    /// Number of image calls started.
    #[must_use]
    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    /// Number of image calls that ran to successful completion.
    #[must_use]
    pub fn images_completed(&self) -> usize {
        self.images_completed.load(Ordering::SeqCst)
    }

    /// Number of mesh calls started.
    #[must_use]
    pub fn mesh_calls(&self) -> usize {
        self.mesh_calls.load(Ordering::SeqCst)
    }

    /// Number of composite calls started.
    #[must_use]
    pub fn composite_calls(&self) -> usize {
        self.composite_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SceneAnalyzer for StubSceneService {
    async fn analyze(&self, _photo: &ImagePayload) -> Result<SceneAnalysis, ServiceError> {
        self.analysis
            .clone()
            .map_err(ServiceError::Request)
    }
}

#[async_trait]
impl ImageGenerator for StubSceneService {
    async fn generate_image(&self, prompt: &str) -> Result<ImagePayload, ServiceError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.image_delays.read().get(prompt).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_images.read().contains(prompt) {
            return Err(ServiceError::Request(format!(
                "image generation refused for {prompt}"
            )));
        }

        self.images_completed.fetch_add(1, Ordering::SeqCst);
        Ok(ImagePayload::png(format!("png:{prompt}").into_bytes()))
    }
}

#[async_trait]
impl MeshGenerator for StubSceneService {
    async fn generate_mesh(
        &self,
        _image: &ImagePayload,
        hint: &str,
    ) -> Result<String, ServiceError> {
        self.mesh_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.mesh_delays.read().get(hint).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_meshes.read().contains(hint) {
            return Err(ServiceError::Request(format!(
                "mesh generation refused for {hint}"
            )));
        }

        Ok(format!("https://meshes.test/{hint}.glb"))
    }
}

#[async_trait]
impl SceneCompositor for StubSceneService {
    async fn composite(
        &self,
        images: &[ImagePayload],
        description: &str,
    ) -> Result<ImagePayload, ServiceError> {
        self.composite_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_composite.load(Ordering::SeqCst) {
            return Err(ServiceError::Request(
                "composite generation refused".to_string(),
            ));
        }

        Ok(ImagePayload::png(
            format!("composite:{}:{description}", images.len()).into_bytes(),
        ))
    }
}

#[async_trait]
impl SuggestionProvider for StubSceneService {
    async fn suggestions(
        &self,
        _photo: &ImagePayload,
        count: usize,
    ) -> Result<Vec<Suggestion>, ServiceError> {
        let canned = [
            Suggestion {
                fun_hook: "Party at the beach!".to_string(),
                detailed_description: "We're having a party at the beach!".to_string(),
                is_recommended: true,
            },
            Suggestion {
                fun_hook: "Office party".to_string(),
                detailed_description: "We're having an office party!".to_string(),
                is_recommended: false,
            },
        ];
        Ok(canned.into_iter().take(count).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    #[test]
    fn test_stub_analysis_lists_objects() {
        let stub = StubSceneService::with_objects(&["dog", "lamp"]);
        let analysis = block_on(stub.analyze(&test_photo())).unwrap();

        assert_eq!(analysis.identified_objects, vec!["dog", "lamp"]);
        assert_eq!(analysis.generation_prompts.len(), 2);
    }

    #[test]
    fn test_stub_analysis_failure() {
        let stub = StubSceneService::failing_analysis("no API key");
        assert!(block_on(stub.analyze(&test_photo())).is_err());
    }

    #[test]
    fn test_stub_image_generation_counts_calls() {
        let stub = StubSceneService::with_objects(&["dog"]);
        let image = block_on(stub.generate_image("dog")).unwrap();

        assert_eq!(image.data, b"png:dog".to_vec());
        assert_eq!(stub.image_calls(), 1);
        assert_eq!(stub.images_completed(), 1);
    }

    #[test]
    fn test_stub_image_failure_counts_start_only() {
        let stub = StubSceneService::with_objects(&["dog"]);
        stub.fail_image("dog");

        assert!(block_on(stub.generate_image("dog")).is_err());
        assert_eq!(stub.image_calls(), 1);
        assert_eq!(stub.images_completed(), 0);
    }

    #[test]
    fn test_stub_mesh_generation() {
        let stub = StubSceneService::with_objects(&["dog"]);
        let url = block_on(stub.generate_mesh(&test_photo(), "dog")).unwrap();
        assert_eq!(url, "https://meshes.test/dog.glb");
    }

    #[test]
    fn test_stub_composite_marks_input_count() {
        let stub = StubSceneService::with_objects(&["dog"]);
        let composite =
            block_on(stub.composite(&[test_photo(), test_photo()], "garden")).unwrap();
        assert_eq!(composite.data, b"composite:2:garden".to_vec());
    }

    #[test]
    fn test_stub_suggestions_respect_count() {
        let stub = StubSceneService::empty_scene();
        let suggestions = block_on(stub.suggestions(&test_photo(), 1)).unwrap();
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].is_recommended);
    }
}
