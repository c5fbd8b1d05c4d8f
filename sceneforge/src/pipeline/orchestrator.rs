//! The multi-stage run driver.
//!
//! One run flows: analysis → prompt list out → concurrent per-object image
//! generation → per-object mesh generation (each chained off its own image)
//! → composite → terminal event. Stage-to-stage sequencing is strictly
//! data-driven: a mesh call waits only for the image with the same
//! identity, and the composite waits for every image outcome but for no
//! mesh.

use crate::cancellation::CancelToken;
use crate::config::PipelineConfig;
use crate::core::{
    GeneratedImage, GeneratedMesh, GenerationPrompt, ImagePayload, ObjectId, PipelineEvent,
    PipelineFailure, RunId, SceneAnalysis, StageKind,
};
use crate::errors::ServiceError;
use crate::events::{NoOpTraceSink, TraceRecord, TraceSink};
use crate::observability;
use crate::pipeline::EventStream;
use crate::services::SceneServices;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn, Instrument};

/// Drives photos through the scene-generation stages.
///
/// A pipeline is cheap to construct and reusable: every call to
/// [`ScenePipeline::run`] starts an independent run with its own identity,
/// its own event stream, and no state shared with other runs.
pub struct ScenePipeline {
    services: Arc<SceneServices>,
    config: PipelineConfig,
    sink: Arc<dyn TraceSink>,
}

impl ScenePipeline {
    /// Creates a pipeline over the given collaborators.
    #[must_use]
    pub fn new(services: SceneServices, config: PipelineConfig) -> Self {
        Self {
            services: Arc::new(services),
            config,
            sink: Arc::new(NoOpTraceSink),
        }
    }

    /// Routes per-stage lifecycle records to the given sink.
    #[must_use]
    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Starts one run and returns its event stream.
    ///
    /// The returned stream yields events in the order the run produces
    /// them, one at a time; emission is paced by consumption. Dropping the
    /// stream cancels the run and every in-flight generation call.
    pub fn run(&self, photo: ImagePayload, scene_description: impl Into<String>) -> EventStream {
        let (tx, rx) = mpsc::channel(1);
        let token = Arc::new(CancelToken::new());
        let run_id = RunId::new();
        let driver = RunDriver {
            services: self.services.clone(),
            config: self.config.clone(),
            sink: self.sink.clone(),
            token: token.clone(),
            run_id,
            tx,
        };
        let handle = tokio::spawn(
            driver
                .drive(photo, scene_description.into())
                .instrument(observability::run_span(run_id)),
        );
        EventStream::new(rx, handle, token)
    }
}

impl std::fmt::Debug for ScenePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenePipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Marker returned by `emit` when the consumer has dropped the stream.
struct StreamClosed;

/// What remains to be done for the composite once the mesh stage drains.
enum CompositePlan {
    /// Nothing to composite (no prompts, or no image survived).
    Skip,
    /// Required images are missing; fail the stage without calling out.
    Reject(String),
    /// The composite call is in flight.
    Pending,
}

/// Per-run state moved into the producer task.
struct RunDriver {
    services: Arc<SceneServices>,
    config: PipelineConfig,
    sink: Arc<dyn TraceSink>,
    token: Arc<CancelToken>,
    run_id: RunId,
    tx: mpsc::Sender<PipelineEvent>,
}

impl RunDriver {
    async fn drive(self, photo: ImagePayload, scene_description: String) {
        if self
            .run_to_completion(photo, scene_description)
            .await
            .is_err()
        {
            debug!(run_id = %self.run_id, "consumer abandoned the run");
        }
    }

    async fn run_to_completion(
        &self,
        photo: ImagePayload,
        scene_description: String,
    ) -> Result<(), StreamClosed> {
        info!(run_id = %self.run_id, "pipeline run started");

        let analysis = match self.analyze(&photo).await {
            Ok(analysis) => analysis,
            Err(err) => {
                self.emit(PipelineEvent::Failed(PipelineFailure::fatal(
                    StageKind::Analysis,
                    err.to_string(),
                )))
                .await?;
                return Ok(());
            }
        };

        let prompts = analysis.generation_prompts;
        let total = prompts.len();
        self.emit(PipelineEvent::PromptsReady(prompts.clone()))
            .await?;

        let limiter = self
            .config
            .max_concurrent_calls
            .map(|n| Arc::new(Semaphore::new(n.max(1))));

        // Image fan-out. Identity is assigned here, from prompt position,
        // and never re-derived downstream.
        let mut image_tasks: JoinSet<ObjectReport<GeneratedImage>> = JoinSet::new();
        for (index, prompt) in prompts.into_iter().enumerate() {
            let services = self.services.clone();
            let limiter = limiter.clone();
            let deadline = self.config.call_timeout();
            let id = ObjectId(index);
            image_tasks.spawn(async move {
                let started = Instant::now();
                let outcome = generate_object_image(&services, limiter, deadline, id, prompt).await;
                (id, outcome, elapsed_ms(started))
            });
        }

        // Each finished image immediately seeds its mesh task; mesh events
        // are held until after the all-images marker.
        let mut mesh_tasks: JoinSet<ObjectReport<GeneratedMesh>> = JoinSet::new();
        let mut images: Vec<Option<GeneratedImage>> = vec![None; total];
        let mut image_failures = 0usize;

        while let Some(joined) = image_tasks.join_next().await {
            match settle(StageKind::Image, joined) {
                Settled::Done(id, image, duration_ms) => {
                    self.trace(
                        TraceRecord::completed(self.run_id, StageKind::Image, duration_ms)
                            .for_object(id),
                    )
                    .await;

                    let services = self.services.clone();
                    let limiter = limiter.clone();
                    let deadline = self.config.call_timeout();
                    let source = image.clone();
                    mesh_tasks.spawn(async move {
                        let started = Instant::now();
                        let outcome =
                            generate_object_mesh(&services, limiter, deadline, &source).await;
                        (source.id, outcome, elapsed_ms(started))
                    });

                    images[id.index()] = Some(image.clone());
                    self.emit(PipelineEvent::CreatedImage(image)).await?;
                }
                Settled::ObjectFailed(failure) => {
                    image_failures += 1;
                    self.trace_failure(&failure).await;
                    self.emit(PipelineEvent::Failed(failure)).await?;
                }
                Settled::Aborted => {}
            }
        }

        self.emit(PipelineEvent::AllImagesCreated).await?;
        if self.token.is_cancelled() {
            return Ok(());
        }

        // The composite needs every image outcome but no mesh, so its call
        // starts now and its event lands once the mesh stage has drained.
        let surviving: Vec<ImagePayload> = images
            .iter()
            .flatten()
            .map(|image| image.image.clone())
            .collect();

        let mut composite_task: JoinSet<(Result<ImagePayload, ServiceError>, f64)> =
            JoinSet::new();
        let composite = if total == 0 || surviving.is_empty() {
            debug!(run_id = %self.run_id, "composite skipped: nothing to arrange");
            CompositePlan::Skip
        } else if self.config.require_all_images && image_failures > 0 {
            CompositePlan::Reject(format!(
                "{image_failures} of {total} object images failed"
            ))
        } else {
            self.trace(TraceRecord::started(self.run_id, StageKind::Composite))
                .await;
            let services = self.services.clone();
            let deadline = self.config.call_timeout();
            let description = scene_description;
            composite_task.spawn(async move {
                let started = Instant::now();
                let outcome = guarded(
                    deadline,
                    services.compositor.composite(&surviving, &description),
                )
                .await;
                (outcome, elapsed_ms(started))
            });
            CompositePlan::Pending
        };

        while let Some(joined) = mesh_tasks.join_next().await {
            match settle(StageKind::Mesh, joined) {
                Settled::Done(id, mesh, duration_ms) => {
                    self.trace(
                        TraceRecord::completed(self.run_id, StageKind::Mesh, duration_ms)
                            .for_object(id),
                    )
                    .await;
                    self.emit(PipelineEvent::MeshGenerated(mesh)).await?;
                }
                Settled::ObjectFailed(failure) => {
                    self.trace_failure(&failure).await;
                    self.emit(PipelineEvent::Failed(failure)).await?;
                }
                Settled::Aborted => {}
            }
        }

        match composite {
            CompositePlan::Skip => {}
            CompositePlan::Reject(message) => {
                let failure = PipelineFailure::fatal(StageKind::Composite, message);
                self.trace_failure(&failure).await;
                self.emit(PipelineEvent::Failed(failure)).await?;
                return Ok(());
            }
            CompositePlan::Pending => match composite_task.join_next().await {
                Some(Ok((Ok(image), duration_ms))) => {
                    self.trace(TraceRecord::completed(
                        self.run_id,
                        StageKind::Composite,
                        duration_ms,
                    ))
                    .await;
                    self.emit(PipelineEvent::CompositeImageCreated(image)).await?;
                }
                Some(Ok((Err(err), _))) => {
                    let failure = PipelineFailure::fatal(StageKind::Composite, err.to_string());
                    self.trace_failure(&failure).await;
                    self.emit(PipelineEvent::Failed(failure)).await?;
                    return Ok(());
                }
                Some(Err(join_err)) => {
                    if join_err.is_cancelled() {
                        return Ok(());
                    }
                    let failure = PipelineFailure::fatal(
                        StageKind::Composite,
                        format!("composite task failed: {join_err}"),
                    );
                    self.trace_failure(&failure).await;
                    self.emit(PipelineEvent::Failed(failure)).await?;
                    return Ok(());
                }
                None => {}
            },
        }

        self.emit(PipelineEvent::Finished).await?;
        info!(run_id = %self.run_id, "pipeline run finished");
        Ok(())
    }

    async fn analyze(&self, photo: &ImagePayload) -> Result<SceneAnalysis, ServiceError> {
        self.trace(TraceRecord::started(self.run_id, StageKind::Analysis))
            .await;
        let started = Instant::now();
        let result = guarded(
            self.config.call_timeout(),
            self.services.analyzer.analyze(photo),
        )
        .await;

        match &result {
            Ok(analysis) => {
                info!(
                    run_id = %self.run_id,
                    objects = analysis.generation_prompts.len(),
                    "scene analyzed"
                );
                self.trace(
                    TraceRecord::completed(self.run_id, StageKind::Analysis, elapsed_ms(started))
                        .with_detail(format!(
                            "{} objects identified",
                            analysis.generation_prompts.len()
                        )),
                )
                .await;
            }
            Err(err) => {
                warn!(run_id = %self.run_id, error = %err, "scene analysis failed");
                self.trace(TraceRecord::failed(
                    self.run_id,
                    StageKind::Analysis,
                    err.to_string(),
                ))
                .await;
            }
        }

        result
    }

    async fn emit(&self, event: PipelineEvent) -> Result<(), StreamClosed> {
        debug!(run_id = %self.run_id, event = event.name(), "emitting event");
        self.tx.send(event).await.map_err(|_| StreamClosed)
    }

    async fn trace(&self, record: TraceRecord) {
        self.sink.record(&record).await;
    }

    async fn trace_failure(&self, failure: &PipelineFailure) {
        let mut record =
            TraceRecord::failed(self.run_id, failure.stage, failure.message.clone());
        record.id = failure.id;
        self.sink.record(&record).await;
    }
}

/// What a per-object task hands back: identity, outcome, and wall time.
type ObjectReport<T> = (ObjectId, Result<T, ServiceError>, f64);

/// A joined per-object task, classified.
enum Settled<T> {
    Done(ObjectId, T, f64),
    ObjectFailed(PipelineFailure),
    Aborted,
}

fn settle<T>(stage: StageKind, joined: Result<ObjectReport<T>, JoinError>) -> Settled<T> {
    match joined {
        Ok((id, Ok(value), duration_ms)) => Settled::Done(id, value, duration_ms),
        Ok((id, Err(err), _)) => {
            Settled::ObjectFailed(PipelineFailure::for_object(stage, id, err.to_string()))
        }
        Err(err) if err.is_cancelled() => Settled::Aborted,
        Err(err) => Settled::ObjectFailed(PipelineFailure {
            stage,
            id: None,
            message: format!("generation task failed: {err}"),
        }),
    }
}

async fn generate_object_image(
    services: &SceneServices,
    limiter: Option<Arc<Semaphore>>,
    deadline: Option<Duration>,
    id: ObjectId,
    prompt: GenerationPrompt,
) -> Result<GeneratedImage, ServiceError> {
    let _permit = acquire(limiter).await?;
    let image = guarded(deadline, services.images.generate_image(&prompt.prompt)).await?;
    Ok(GeneratedImage {
        id,
        object_name: prompt.object_name,
        image,
        prompt: prompt.prompt,
    })
}

async fn generate_object_mesh(
    services: &SceneServices,
    limiter: Option<Arc<Semaphore>>,
    deadline: Option<Duration>,
    source: &GeneratedImage,
) -> Result<GeneratedMesh, ServiceError> {
    let _permit = acquire(limiter).await?;
    let mesh_url = guarded(
        deadline,
        services
            .meshes
            .generate_mesh(&source.image, &source.object_name),
    )
    .await?;
    Ok(GeneratedMesh {
        id: source.id,
        object_name: source.object_name.clone(),
        mesh_url,
        image: source.image.clone(),
    })
}

async fn acquire(
    limiter: Option<Arc<Semaphore>>,
) -> Result<Option<OwnedSemaphorePermit>, ServiceError> {
    match limiter {
        Some(semaphore) => semaphore
            .acquire_owned()
            .await
            .map(Some)
            .map_err(|_| ServiceError::Cancelled("concurrency limiter closed".to_string())),
        None => Ok(None),
    }
}

async fn guarded<T, F>(deadline: Option<Duration>, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match deadline {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(limit)),
        },
        None => call.await,
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
