use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::*;
use crate::error::StoreError;
use crate::memory::{MemoryScene, MemoryStorage};
use crate::scene::Entity;
use crate::test_helpers::{CountingFog, scene_document, seeded_storage};

// =============================================================================
// HELPERS
// =============================================================================

fn context(
    store: Arc<dyn DocumentStore>,
    storage: Arc<dyn FileStorage>,
    fog: Option<Arc<dyn FogReset>>,
) -> RotationContext {
    let config = RotationConfig { fog_settle: Duration::ZERO, ..RotationConfig::default() };
    RotationContext { store, storage, fog, config }
}

fn num(value: &Value) -> f64 {
    value.as_f64().unwrap()
}

fn assert_close(value: &Value, expected: f64) {
    let actual = num(value);
    assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
}

/// Wraps a [`MemoryScene`] with call counting and injected failures.
#[derive(Default)]
struct Faults {
    entities: Option<EmbeddedKind>,
    commit: bool,
    misfiled_wall: bool,
}

struct ScriptedStore {
    inner: MemoryScene,
    faults: Faults,
    calls: AtomicUsize,
}

impl ScriptedStore {
    fn new(document: Value, faults: Faults) -> Self {
        Self { inner: MemoryScene::new(document).unwrap(), faults, calls: AtomicUsize::new(0) }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn scene(&self) -> Result<Scene, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.scene().await
    }

    async fn embedded_entities(&self, kind: EmbeddedKind) -> Result<Vec<Entity>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.entities == Some(kind) {
            return Err(StoreError::Rejected(format!("{kind} unavailable")));
        }
        let mut entities = self.inner.embedded_entities(kind).await?;
        if self.faults.misfiled_wall && kind == EmbeddedKind::Token {
            entities.push(Entity::from_document("Wall", json!({ "_id": "stray", "c": [0, 0, 1, 1] }))?);
        }
        Ok(entities)
    }

    async fn commit(&self, payload: UpdatePayload) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.commit {
            return Err(StoreError::Rejected("write conflict".into()));
        }
        self.inner.commit(payload).await
    }
}

// =============================================================================
// GEOMETRY
// =============================================================================

#[tokio::test]
async fn clockwise_rotates_every_kind_in_one_commit() {
    let scene = Arc::new(MemoryScene::new(scene_document()).unwrap());
    let storage = Arc::new(seeded_storage().await);
    let ctx = context(scene.clone(), storage.clone(), None);

    let report = rotate_scene(&ctx, 90).await.unwrap();
    assert_eq!(report.stage, RotationStage::Done);
    assert_eq!((report.width, report.height), (500, 1000));
    assert!(report.warnings.is_empty());
    assert_eq!(scene.commits(), 1);

    let doc = scene.document().await;
    assert_eq!(doc["width"], json!(500));
    assert_eq!(doc["height"], json!(1000));

    let token = &doc["tokens"][0];
    assert_close(&token["x"], 350.0);
    assert_close(&token["y"], 100.0);
    assert_close(&token["rotation"], 90.0);
    assert_close(&token["width"], 1.0);
    assert_close(&token["height"], 2.0);

    let wall: Vec<f64> = doc["walls"][0]["c"].as_array().unwrap().iter().map(num).collect();
    assert_eq!(wall, vec![500.0, 0.0, 500.0, 100.0]);

    let light = &doc["lights"][0];
    assert_close(&light["x"], 480.0);
    assert_close(&light["y"], 10.0);
    assert_close(&light["config"]["rotation"], 135.0);

    let sound = &doc["sounds"][0];
    assert_close(&sound["x"], 450.0);
    assert_close(&sound["y"], 100.0);

    assert_close(&doc["templates"][0]["direction"], 90.0);

    for kind in EmbeddedKind::ALL {
        assert_eq!(report.updated.get(&kind), Some(&1), "{kind}");
    }
}

#[tokio::test]
async fn rotate_then_inverse_restores_geometry() {
    let scene = Arc::new(MemoryScene::new(scene_document()).unwrap());
    let storage = Arc::new(seeded_storage().await);
    let ctx = context(scene.clone(), storage.clone(), None);

    rotate_scene(&ctx, 90).await.unwrap();
    let report = rotate_scene(&ctx, -90).await.unwrap();
    assert!(report.warnings.is_empty());
    assert_eq!(scene.commits(), 2);

    let doc = scene.document().await;
    let original = scene_document();
    assert_eq!(doc["width"], original["width"]);
    assert_eq!(doc["height"], original["height"]);

    let token = &doc["tokens"][0];
    assert_close(&token["x"], 100.0);
    assert_close(&token["y"], 100.0);
    assert_close(&token["rotation"], 0.0);
    assert_close(&token["width"], 2.0);
    assert_close(&token["height"], 1.0);

    let wall: Vec<f64> = doc["walls"][0]["c"].as_array().unwrap().iter().map(num).collect();
    assert_eq!(wall, vec![0.0, 0.0, 100.0, 0.0]);
    assert_close(&doc["lights"][0]["config"]["rotation"], 45.0);

    assert_eq!(doc["background"]["src"], json!("maps/rotated-images/temple_rotation0.jpg"));
    assert_eq!(doc["foreground"], json!("maps/rotated-images/roof_rotation0.png"));
}

#[tokio::test]
async fn half_turn_keeps_dimensions_and_grid() {
    let mut document = scene_document();
    document["grid"]["type"] = json!(2);
    let scene = Arc::new(MemoryScene::new(document).unwrap());
    let ctx = context(scene.clone(), Arc::new(seeded_storage().await), None);

    let report = rotate_scene(&ctx, 180).await.unwrap();
    assert_eq!((report.width, report.height), (1000, 500));
    assert_eq!(report.grid_type, None);

    let doc = scene.document().await;
    assert_eq!(doc["grid"]["type"], json!(2));
    let token = &doc["tokens"][0];
    assert_close(&token["x"], 800.0);
    assert_close(&token["y"], 350.0);
    assert_close(&token["rotation"], 180.0);
    assert_close(&token["width"], 2.0);
}

#[tokio::test]
async fn quarter_turn_transposes_hex_grid() {
    let mut document = scene_document();
    document["grid"]["type"] = json!(2);
    let scene = Arc::new(MemoryScene::new(document).unwrap());
    let ctx = context(scene.clone(), Arc::new(seeded_storage().await), None);

    let report = rotate_scene(&ctx, -90).await.unwrap();
    assert_eq!(report.grid_type, Some(GridType::HexColsOdd));
    assert_eq!(scene.document().await["grid"]["type"], json!(4));
}

#[tokio::test]
async fn square_grid_is_left_alone() {
    let scene = Arc::new(MemoryScene::new(scene_document()).unwrap());
    let ctx = context(scene.clone(), Arc::new(seeded_storage().await), None);

    let report = rotate_scene(&ctx, 90).await.unwrap();
    assert_eq!(report.grid_type, None);
    assert_eq!(scene.document().await["grid"]["type"], json!(1));
}

#[tokio::test]
async fn null_geometry_rotates_as_zero() {
    let mut document = scene_document();
    document["tokens"][0]["rotation"] = Value::Null;
    document["templates"][0]["direction"] = Value::Null;
    document["background"]["offsetX"] = Value::Null;
    let scene = Arc::new(MemoryScene::new(document).unwrap());
    let ctx = context(scene.clone(), Arc::new(seeded_storage().await), None);

    let report = rotate_scene(&ctx, 90).await.unwrap();
    assert_eq!(report.stage, RotationStage::Done);

    let doc = scene.document().await;
    assert_close(&doc["tokens"][0]["rotation"], 90.0);
    assert_close(&doc["tokens"][0]["x"], 350.0);
    assert_close(&doc["templates"][0]["direction"], 90.0);
}

#[tokio::test]
async fn unknown_grid_type_is_kept() {
    let mut document = scene_document();
    document["grid"]["type"] = json!(6);
    let scene = Arc::new(MemoryScene::new(document).unwrap());
    let ctx = context(scene.clone(), Arc::new(seeded_storage().await), None);

    let report = rotate_scene(&ctx, 90).await.unwrap();
    assert_eq!(report.grid_type, None);
    assert_eq!(scene.document().await["grid"]["type"], json!(6));
}

#[tokio::test]
async fn misfiled_document_is_skipped() {
    let store = Arc::new(ScriptedStore::new(scene_document(), Faults { misfiled_wall: true, ..Faults::default() }));
    let ctx = context(store.clone(), Arc::new(seeded_storage().await), None);

    let report = rotate_scene(&ctx, 90).await.unwrap();
    assert_eq!(report.updated.get(&EmbeddedKind::Token), Some(&1));
    assert_eq!(report.stage, RotationStage::Done);
}

// =============================================================================
// IMAGES
// =============================================================================

#[tokio::test]
async fn images_are_rotated_and_paths_committed() {
    let scene = Arc::new(MemoryScene::new(scene_document()).unwrap());
    let storage = Arc::new(seeded_storage().await);
    let ctx = context(scene.clone(), storage.clone(), None);

    let report = rotate_scene(&ctx, 90).await.unwrap();
    assert_eq!(report.background.as_deref(), Some("maps/rotated-images/temple_rotation90.jpg"));
    assert_eq!(report.foreground.as_deref(), Some("maps/rotated-images/roof_rotation90.png"));
    assert_eq!(storage.uploads(), 2);

    let doc = scene.document().await;
    assert_eq!(doc["background"]["src"], json!("maps/rotated-images/temple_rotation90.jpg"));
    assert_eq!(doc["foreground"], json!("maps/rotated-images/roof_rotation90.png"));

    let bytes = storage.get("maps/rotated-images/roof_rotation90.png").await.unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!((img.width(), img.height()), (2, 4));
}

#[tokio::test]
async fn cached_variant_is_reused() {
    let scene = Arc::new(MemoryScene::new(scene_document()).unwrap());
    let storage = Arc::new(seeded_storage().await);
    storage.insert("maps/rotated-images/temple_rotation90.jpg", vec![1, 2, 3]).await;
    let ctx = context(scene.clone(), storage.clone(), None);

    let report = rotate_scene(&ctx, 90).await.unwrap();
    assert_eq!(report.background.as_deref(), Some("maps/rotated-images/temple_rotation90.jpg"));
    assert_eq!(storage.uploads(), 1);
    assert_eq!(storage.get("maps/rotated-images/temple_rotation90.jpg").await, Some(vec![1, 2, 3]));
}

#[tokio::test]
async fn image_failure_is_a_warning() {
    let scene = Arc::new(MemoryScene::new(scene_document()).unwrap());
    let ctx = context(scene.clone(), Arc::new(MemoryStorage::new()), None);

    let report = rotate_scene(&ctx, 90).await.unwrap();
    assert_eq!(report.stage, RotationStage::Done);
    assert_eq!(report.warnings.len(), 2);
    assert!(report.warnings.iter().all(|w| matches!(w, RotationError::ImageRotationFailed { .. })));
    assert_eq!(report.background, None);

    let doc = scene.document().await;
    assert_eq!(doc["background"]["src"], json!("maps/temple.jpg"));
    assert_eq!(doc["foreground"], json!("maps/roof.png"));
    assert_eq!(doc["width"], json!(500));
    assert_close(&doc["tokens"][0]["x"], 350.0);
}

#[tokio::test]
async fn one_failed_image_does_not_skip_the_other() {
    let scene = Arc::new(MemoryScene::new(scene_document()).unwrap());
    let storage = Arc::new(MemoryStorage::new());
    storage.insert("maps/temple.jpg", vec![0, 1, 2]).await;
    storage
        .insert("maps/roof.png", crate::test_helpers::marked_image(4, 2, image::ImageFormat::Png))
        .await;
    let ctx = context(scene.clone(), storage, None);

    let report = rotate_scene(&ctx, 90).await.unwrap();
    assert_eq!(report.warnings.len(), 1);
    assert!(matches!(&report.warnings[0], RotationError::ImageRotationFailed { path, .. } if path == "maps/temple.jpg"));
    assert_eq!(report.foreground.as_deref(), Some("maps/rotated-images/roof_rotation90.png"));
}

#[tokio::test]
async fn scene_without_images_touches_no_storage() {
    let mut document = scene_document();
    document["background"]["src"] = Value::Null;
    document["foreground"] = Value::Null;
    let scene = Arc::new(MemoryScene::new(document).unwrap());
    let storage = Arc::new(MemoryStorage::new());
    let ctx = context(scene.clone(), storage.clone(), None);

    let report = rotate_scene(&ctx, 90).await.unwrap();
    assert!(report.warnings.is_empty());
    assert_eq!(storage.uploads(), 0);
}

// =============================================================================
// FOG
// =============================================================================

fn fog_scene() -> Arc<MemoryScene> {
    let mut document = scene_document();
    document["fog"]["exploration"] = json!(true);
    Arc::new(MemoryScene::new(document).unwrap())
}

#[tokio::test]
async fn fog_is_reset_exactly_once() {
    let scene = fog_scene();
    let fog = Arc::new(CountingFog::default());
    let ctx = context(scene.clone(), Arc::new(seeded_storage().await), Some(fog.clone() as Arc<dyn FogReset>));

    let report = rotate_scene(&ctx, 90).await.unwrap();
    assert!(report.fog_reset);
    assert_eq!(fog.calls(), 1);
    assert_eq!(scene.commits(), 1);
}

#[tokio::test]
async fn fog_is_untouched_without_exploration() {
    let scene = Arc::new(MemoryScene::new(scene_document()).unwrap());
    let fog = Arc::new(CountingFog::default());
    let ctx = context(scene, Arc::new(seeded_storage().await), Some(fog.clone() as Arc<dyn FogReset>));

    let report = rotate_scene(&ctx, 90).await.unwrap();
    assert!(!report.fog_reset);
    assert_eq!(fog.calls(), 0);
}

#[tokio::test]
async fn missing_fog_collaborator_is_a_warning() {
    let scene = fog_scene();
    let ctx = context(scene.clone(), Arc::new(seeded_storage().await), None);

    let report = rotate_scene(&ctx, 90).await.unwrap();
    assert!(!report.fog_reset);
    assert!(matches!(report.warnings.as_slice(), [RotationError::FogResetUnavailable]));
    assert_eq!(scene.commits(), 1);
}

#[tokio::test]
async fn failed_fog_reset_still_commits() {
    let scene = fog_scene();
    let fog = Arc::new(CountingFog::failing());
    let ctx = context(scene.clone(), Arc::new(seeded_storage().await), Some(fog.clone() as Arc<dyn FogReset>));

    let report = rotate_scene(&ctx, -90).await.unwrap();
    assert_eq!(fog.calls(), 1);
    assert!(matches!(report.warnings.as_slice(), [RotationError::FogResetFailed(_)]));
    assert_eq!(scene.commits(), 1);
}

// =============================================================================
// FAILURES
// =============================================================================

#[tokio::test]
async fn invalid_step_calls_nothing() {
    let store = Arc::new(ScriptedStore::new(scene_document(), Faults::default()));
    let storage = Arc::new(seeded_storage().await);
    let fog = Arc::new(CountingFog::default());
    let ctx = context(store.clone(), storage.clone(), Some(fog.clone() as Arc<dyn FogReset>));

    for degrees in [0, 45, 360, -450] {
        let err = rotate_scene(&ctx, degrees).await.unwrap_err();
        assert!(matches!(err, RotationError::InvalidRotationStep(d) if d == degrees));
    }
    assert_eq!(store.calls(), 0);
    assert_eq!(storage.uploads(), 0);
    assert_eq!(fog.calls(), 0);
}

#[tokio::test]
async fn unreadable_collection_aborts_before_any_write() {
    let faults = Faults { entities: Some(EmbeddedKind::Wall), ..Faults::default() };
    let store = Arc::new(ScriptedStore::new(scene_document(), faults));
    let storage = Arc::new(seeded_storage().await);
    let ctx = context(store.clone(), storage.clone(), None);

    let err = rotate_scene(&ctx, 90).await.unwrap_err();
    assert!(matches!(err, RotationError::PlanningFailure(ref msg) if msg.contains("Wall")));
    assert_eq!(storage.uploads(), 0);
    assert_eq!(store.inner.commits(), 0);
    assert_eq!(store.inner.document().await, scene_document());
}

#[tokio::test]
async fn commit_failure_is_fatal() {
    let faults = Faults { commit: true, ..Faults::default() };
    let store = Arc::new(ScriptedStore::new(scene_document(), faults));
    let ctx = context(store.clone(), Arc::new(seeded_storage().await), None);

    let err = rotate_scene(&ctx, 90).await.unwrap_err();
    assert!(matches!(err, RotationError::CommitFailure(StoreError::Rejected(_))));
    assert_eq!(store.inner.document().await, scene_document());
}

#[test]
fn direction_maps_to_quarter_turns() {
    assert_eq!(Direction::Clockwise.step().degrees(), 90);
    assert_eq!(Direction::CounterClockwise.step().degrees(), -90);
}
