//! End-to-end scenario tests over stubbed collaborators.

use crate::config::PipelineConfig;
use crate::core::{ImagePayload, ObjectId, PipelineEvent, StageKind};
use crate::events::{CollectingTraceSink, TracePhase};
use crate::pipeline::ScenePipeline;
use crate::services::{MockSceneCompositor, SceneServices};
use crate::testing::{test_photo, StubSceneService};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn pipeline_over(stub: &Arc<StubSceneService>, config: PipelineConfig) -> ScenePipeline {
    ScenePipeline::new(SceneServices::from_single(stub.clone()), config)
}

fn names(events: &[PipelineEvent]) -> Vec<&'static str> {
    events.iter().map(PipelineEvent::name).collect()
}

fn position(events: &[PipelineEvent], name: &str) -> usize {
    events
        .iter()
        .position(|e| e.name() == name)
        .unwrap_or_else(|| panic!("no {name} event in {:?}", names(events)))
}

fn ids_of(events: &[PipelineEvent], name: &str) -> Vec<ObjectId> {
    events
        .iter()
        .filter(|e| e.name() == name)
        .filter_map(PipelineEvent::object_id)
        .collect()
}

#[tokio::test]
async fn test_successful_two_object_run() {
    let stub = Arc::new(StubSceneService::with_objects(&["dog", "lamp"]));
    let pipeline = pipeline_over(&stub, PipelineConfig::default());

    let events = pipeline
        .run(test_photo(), "a park scene")
        .collect_events()
        .await;

    assert_eq!(events.len(), 8);

    let PipelineEvent::PromptsReady(prompts) = &events[0] else {
        panic!("first event must carry the prompts");
    };
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0].object_name, "dog");

    // Two images in some completion order, then the marker.
    let mut image_ids = ids_of(&events, "created_image");
    image_ids.sort_unstable();
    assert_eq!(image_ids, vec![ObjectId(0), ObjectId(1)]);
    assert_eq!(position(&events, "all_images_created"), 3);

    let mut mesh_ids = ids_of(&events, "mesh_generated");
    mesh_ids.sort_unstable();
    assert_eq!(mesh_ids, vec![ObjectId(0), ObjectId(1)]);

    assert_eq!(events[6].name(), "composite_image_created");
    assert_eq!(events[7], PipelineEvent::Finished);
}

#[tokio::test]
async fn test_empty_scene_short_circuits() {
    let stub = Arc::new(StubSceneService::empty_scene());
    let pipeline = pipeline_over(&stub, PipelineConfig::default());

    let events = pipeline.run(test_photo(), "").collect_events().await;

    assert_eq!(
        names(&events),
        vec!["prompts_ready", "all_images_created", "finished"]
    );
    let PipelineEvent::PromptsReady(prompts) = &events[0] else {
        panic!("first event must carry the prompts");
    };
    assert!(prompts.is_empty());
    assert_eq!(stub.image_calls(), 0);
    assert_eq!(stub.composite_calls(), 0);
}

#[tokio::test]
async fn test_analysis_failure_is_the_only_event() {
    let stub = Arc::new(StubSceneService::failing_analysis("model unavailable"));
    let pipeline = pipeline_over(&stub, PipelineConfig::default());

    let events = pipeline.run(test_photo(), "").collect_events().await;

    assert_eq!(events.len(), 1);
    let PipelineEvent::Failed(failure) = &events[0] else {
        panic!("expected a failure event");
    };
    assert_eq!(failure.stage, StageKind::Analysis);
    assert!(failure.is_fatal());
    assert_eq!(stub.image_calls(), 0);
}

#[tokio::test]
async fn test_image_failure_yields_partial_composite() {
    let stub = Arc::new(StubSceneService::with_objects(&["dog", "lamp"]));
    stub.fail_image("lamp");
    let pipeline = pipeline_over(&stub, PipelineConfig::default());

    let events = pipeline.run(test_photo(), "garden").collect_events().await;

    // The failed object surfaces as an identity-scoped failure and gets no
    // mesh call; the survivor flows through to the composite.
    assert_eq!(ids_of(&events, "created_image"), vec![ObjectId(0)]);
    assert_eq!(ids_of(&events, "failed"), vec![ObjectId(1)]);
    assert_eq!(ids_of(&events, "mesh_generated"), vec![ObjectId(0)]);
    assert_eq!(stub.mesh_calls(), 1);

    let composite_at = position(&events, "composite_image_created");
    let PipelineEvent::CompositeImageCreated(image) = &events[composite_at] else {
        panic!("expected a composite event");
    };
    assert_eq!(image.data, b"composite:1:garden".to_vec());
    assert_eq!(events.last(), Some(&PipelineEvent::Finished));
}

#[tokio::test]
async fn test_image_failure_with_require_all_images() {
    let stub = Arc::new(StubSceneService::with_objects(&["dog", "lamp"]));
    stub.fail_image("lamp");
    let pipeline = pipeline_over(&stub, PipelineConfig::new().require_all_images());

    let events = pipeline.run(test_photo(), "garden").collect_events().await;

    // The surviving object still gets its image and mesh.
    assert_eq!(ids_of(&events, "created_image"), vec![ObjectId(0)]);
    assert_eq!(ids_of(&events, "mesh_generated"), vec![ObjectId(0)]);

    let PipelineEvent::Failed(failure) = events.last().unwrap() else {
        panic!("expected a terminal failure");
    };
    assert_eq!(failure.stage, StageKind::Composite);
    assert!(failure.is_fatal());
    assert!(!names(&events).contains(&"composite_image_created"));
    assert!(!events.contains(&PipelineEvent::Finished));
    assert_eq!(stub.composite_calls(), 0);
}

#[tokio::test]
async fn test_composite_failure_is_fatal() {
    let stub = Arc::new(StubSceneService::with_objects(&["dog"]));
    stub.fail_composite();
    let pipeline = pipeline_over(&stub, PipelineConfig::default());

    let events = pipeline.run(test_photo(), "").collect_events().await;

    let PipelineEvent::Failed(failure) = events.last().unwrap() else {
        panic!("expected a terminal failure");
    };
    assert_eq!(failure.stage, StageKind::Composite);
    assert!(!events.contains(&PipelineEvent::Finished));
    // The mesh stage is independent of the composite and still delivered.
    assert_eq!(ids_of(&events, "mesh_generated"), vec![ObjectId(0)]);
}

#[tokio::test]
async fn test_mesh_failure_is_identity_scoped() {
    let stub = Arc::new(StubSceneService::with_objects(&["dog", "lamp"]));
    stub.fail_mesh("dog");
    let pipeline = pipeline_over(&stub, PipelineConfig::default());

    let events = pipeline.run(test_photo(), "garden").collect_events().await;

    assert_eq!(ids_of(&events, "failed"), vec![ObjectId(0)]);
    assert_eq!(ids_of(&events, "mesh_generated"), vec![ObjectId(1)]);
    // Composite does not depend on meshes: it still arrives, from both images.
    let composite_at = position(&events, "composite_image_created");
    let PipelineEvent::CompositeImageCreated(image) = &events[composite_at] else {
        panic!("expected a composite event");
    };
    assert_eq!(image.data, b"composite:2:garden".to_vec());
    assert_eq!(events.last(), Some(&PipelineEvent::Finished));
}

#[tokio::test]
async fn test_images_arrive_in_completion_order() {
    let stub = Arc::new(StubSceneService::with_objects(&["dog", "lamp"]));
    stub.delay_image("dog", Duration::from_millis(150));
    let pipeline = pipeline_over(&stub, PipelineConfig::default());

    let events = pipeline.run(test_photo(), "").collect_events().await;

    // The undelayed lamp (id 1) lands first even though the prompt order
    // says otherwise.
    assert_eq!(
        ids_of(&events, "created_image"),
        vec![ObjectId(1), ObjectId(0)]
    );

    let PipelineEvent::PromptsReady(prompts) = &events[0] else {
        panic!("first event must carry the prompts");
    };
    assert_eq!(prompts[0].object_name, "dog");
}

#[tokio::test]
async fn test_event_ordering_invariants() {
    let stub = Arc::new(StubSceneService::with_objects(&["dog", "lamp", "mug"]));
    stub.delay_image("dog", Duration::from_millis(60));
    stub.delay_mesh("lamp", Duration::from_millis(60));
    let pipeline = pipeline_over(&stub, PipelineConfig::new().with_max_concurrent_calls(2));

    let events = pipeline.run(test_photo(), "desk").collect_events().await;

    let marker_at = position(&events, "all_images_created");
    let composite_at = position(&events, "composite_image_created");
    let finished_at = position(&events, "finished");

    assert_eq!(position(&events, "prompts_ready"), 0);
    assert_eq!(finished_at, events.len() - 1);
    assert!(marker_at < composite_at);
    assert!(composite_at < finished_at);

    let mut seen_images = Vec::new();
    for (index, event) in events.iter().enumerate() {
        match event {
            PipelineEvent::CreatedImage(image) => {
                assert!(index < marker_at, "images precede the marker");
                assert!(!seen_images.contains(&image.id), "distinct identities");
                seen_images.push(image.id);
            }
            PipelineEvent::MeshGenerated(mesh) => {
                assert!(index > marker_at, "meshes follow the marker");
                assert!(
                    seen_images.contains(&mesh.id),
                    "a mesh needs its own image first"
                );
            }
            _ => {}
        }
    }
    assert_eq!(seen_images.len(), 3);
}

#[tokio::test]
async fn test_abandoned_stream_cancels_inflight_calls() {
    let stub = Arc::new(StubSceneService::with_objects(&["dog", "lamp"]));
    stub.delay_image("dog", Duration::from_millis(400));
    stub.delay_image("lamp", Duration::from_secs(600));
    let pipeline = pipeline_over(&stub, PipelineConfig::default());

    let mut stream = pipeline.run(test_photo(), "");
    let first = stream.next_event().await;
    assert_eq!(first.map(|e| e.name()), Some("prompts_ready"));

    // Let the fan-out start, then abandon the run mid-flight.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(stub.image_calls(), 2);
    drop(stream);

    // Well past the faster image's delay: had the calls survived the
    // abandonment, at least one would have completed by now.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(stub.images_completed(), 0);
    assert_eq!(stub.mesh_calls(), 0);
    assert_eq!(stub.composite_calls(), 0);
}

#[tokio::test]
async fn test_explicit_cancel_ends_the_sequence() {
    let stub = Arc::new(StubSceneService::with_objects(&["dog"]));
    stub.delay_image("dog", Duration::from_secs(600));
    let pipeline = pipeline_over(&stub, PipelineConfig::default());

    let mut stream = pipeline.run(test_photo(), "");
    let first = stream.next_event().await;
    assert_eq!(first.map(|e| e.name()), Some("prompts_ready"));

    stream.cancel("operator changed their mind");
    assert!(stream.is_cancelled());

    // At most the already-buffered event can still arrive before the end.
    let mut trailing = 0;
    while stream.next_event().await.is_some() {
        trailing += 1;
        assert!(trailing <= 1, "no events may follow cancellation");
    }
}

#[tokio::test]
async fn test_slow_consumer_still_gets_the_full_sequence() {
    let stub = Arc::new(StubSceneService::with_objects(&["dog", "lamp"]));
    let pipeline = pipeline_over(&stub, PipelineConfig::default());

    let mut stream = pipeline.run(test_photo(), "park");
    let mut events = Vec::new();
    while let Some(event) = stream.next_event().await {
        tokio::time::sleep(Duration::from_millis(10)).await;
        events.push(event);
    }

    assert_eq!(events.len(), 8);
    assert_eq!(events.last(), Some(&PipelineEvent::Finished));
}

#[tokio::test]
async fn test_composite_receives_images_in_identity_order() {
    let stub = Arc::new(StubSceneService::with_objects(&["dog", "lamp"]));
    // Make the id-0 image finish last, so completion order is reversed.
    stub.delay_image("dog", Duration::from_millis(120));

    let mut compositor = MockSceneCompositor::new();
    compositor
        .expect_composite()
        .withf(|images, description| {
            images.len() == 2
                && images[0].data == b"png:dog".to_vec()
                && images[1].data == b"png:lamp".to_vec()
                && description == "garden"
        })
        .returning(|_, _| Ok(ImagePayload::png(vec![42])));

    let services = SceneServices::new(
        stub.clone(),
        stub.clone(),
        stub.clone(),
        Arc::new(compositor),
    );
    let pipeline = ScenePipeline::new(services, PipelineConfig::default());

    let events = pipeline.run(test_photo(), "garden").collect_events().await;

    let composite_at = position(&events, "composite_image_created");
    let PipelineEvent::CompositeImageCreated(image) = &events[composite_at] else {
        panic!("expected a composite event");
    };
    assert_eq!(image.data, vec![42]);
    assert_eq!(events.last(), Some(&PipelineEvent::Finished));
}

#[tokio::test]
async fn test_trace_sink_observes_stage_lifecycle() {
    let stub = Arc::new(StubSceneService::with_objects(&["dog"]));
    let sink = Arc::new(CollectingTraceSink::new());
    let pipeline =
        pipeline_over(&stub, PipelineConfig::default()).with_trace_sink(sink.clone());

    let events = pipeline.run(test_photo(), "").collect_events().await;
    assert_eq!(events.last(), Some(&PipelineEvent::Finished));

    let analysis = sink.of_stage(StageKind::Analysis);
    assert_eq!(analysis.len(), 2);
    assert_eq!(analysis[0].phase, TracePhase::Started);
    assert_eq!(analysis[1].phase, TracePhase::Completed);

    let image = sink.of_stage(StageKind::Image);
    assert_eq!(image.len(), 1);
    assert_eq!(image[0].id, Some(ObjectId(0)));
    assert!(image[0].duration_ms.is_some());

    let composite = sink.of_stage(StageKind::Composite);
    assert_eq!(composite.last().map(|r| r.phase), Some(TracePhase::Completed));
}

#[tokio::test]
async fn test_bounded_fanout_completes() {
    let stub = Arc::new(StubSceneService::with_objects(&[
        "a", "b", "c", "d", "e",
    ]));
    let pipeline = pipeline_over(&stub, PipelineConfig::new().with_max_concurrent_calls(1));

    let events = pipeline.run(test_photo(), "shelf").collect_events().await;

    assert_eq!(ids_of(&events, "created_image").len(), 5);
    assert_eq!(ids_of(&events, "mesh_generated").len(), 5);
    assert_eq!(events.last(), Some(&PipelineEvent::Finished));
}

#[tokio::test]
async fn test_per_call_timeout_scopes_to_the_object() {
    let stub = Arc::new(StubSceneService::with_objects(&["dog", "lamp"]));
    stub.delay_image("lamp", Duration::from_secs(600));
    let pipeline = pipeline_over(&stub, PipelineConfig::new().with_call_timeout(0.2));

    let events = pipeline.run(test_photo(), "garden").collect_events().await;

    let failed = ids_of(&events, "failed");
    assert_eq!(failed, vec![ObjectId(1)]);
    assert_eq!(ids_of(&events, "mesh_generated"), vec![ObjectId(0)]);
    assert_eq!(events.last(), Some(&PipelineEvent::Finished));
}
