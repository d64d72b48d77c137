//! Scene rotation orchestrator.
//!
//! DESIGN
//! ======
//! One linear pass per call:
//!
//! ```text
//! Idle → PlanningEntities → RotatingImages → AdjustingGrid → InvalidatingFog → Committing → Done
//!                                     (any stage) → Failed
//! ```
//!
//! Planning reads the scene snapshot and every embedded collection and
//! accumulates one payload; nothing is written until `Committing`, which
//! issues exactly one store commit. Geometry always rotates as a unit.
//!
//! ERROR HANDLING
//! ==============
//! Invalid steps fail before any collaborator is called. Planning and commit
//! failures are fatal. Image and fog failures are recoverable: they are
//! logged, recorded on the report, and the rotation carries on without them.
//!
//! CONCURRENCY
//! ===========
//! Two rotations of the same scene are not coordinated here. Callers that
//! can trigger overlapping rotations must serialize them.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::RotationConfig;
use crate::error::{ErrorCode, RotationError};
use crate::image_cache::{ImageEncoding, ImageRotationCache};
use crate::planner::{PlanContext, plan_entity, plan_grid, plan_scene};
use crate::scene::{EmbeddedKind, GridType, Scene};
use crate::step::RotationStep;
use crate::store::{DocumentStore, FileStorage, FogReset};
use crate::update::{UpdatePayload, UpdateRecord};

// =============================================================================
// TYPES
// =============================================================================

/// Direction offered by a trigger surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

impl Direction {
    #[must_use]
    pub fn step(self) -> RotationStep {
        match self {
            Self::Clockwise => RotationStep::CLOCKWISE,
            Self::CounterClockwise => RotationStep::COUNTER_CLOCKWISE,
        }
    }
}

/// Progress of one rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStage {
    Idle,
    PlanningEntities,
    RotatingImages,
    AdjustingGrid,
    InvalidatingFog,
    Committing,
    Done,
    Failed,
}

/// Collaborators for rotating one scene. Cheap to clone.
#[derive(Clone)]
pub struct RotationContext {
    pub store: Arc<dyn DocumentStore>,
    pub storage: Arc<dyn FileStorage>,
    /// `None` when the host offers no way to reset fog for this scene.
    pub fog: Option<Arc<dyn FogReset>>,
    pub config: RotationConfig,
}

/// What a completed rotation did.
#[derive(Debug)]
pub struct RotationReport {
    pub step: RotationStep,
    pub stage: RotationStage,
    pub width: u32,
    pub height: u32,
    /// New background path, if the background image was rotated.
    pub background: Option<String>,
    /// New foreground path, if the foreground image was rotated.
    pub foreground: Option<String>,
    /// New grid type, if the hex orientation flipped.
    pub grid_type: Option<GridType>,
    /// Updated documents per kind.
    pub updated: BTreeMap<EmbeddedKind, usize>,
    pub fog_reset: bool,
    /// Recoverable failures, in the order they happened.
    pub warnings: Vec<RotationError>,
}

impl RotationReport {
    fn new(step: RotationStep, scene: &Scene) -> Self {
        Self {
            step,
            stage: RotationStage::Idle,
            width: scene.width,
            height: scene.height,
            background: None,
            foreground: None,
            grid_type: None,
            updated: BTreeMap::new(),
            fog_reset: false,
            warnings: Vec::new(),
        }
    }

    fn advance(&mut self, stage: RotationStage) {
        debug!(from = ?self.stage, to = ?stage, "rotation stage");
        self.stage = stage;
    }

    fn warn(&mut self, warning: RotationError) {
        warn!(code = warning.error_code(), error = %warning, "rotation continuing without this step");
        self.warnings.push(warning);
    }
}

// =============================================================================
// ROTATE
// =============================================================================

/// Rotate a scene by a signed multiple of 90° and commit every change at once.
///
/// # Errors
///
/// - `InvalidRotationStep` before anything is read.
/// - `PlanningFailure` if the scene or an embedded collection cannot be read
///   or planned; nothing is written.
/// - `CommitFailure` if the store rejects the payload.
pub async fn rotate_scene(ctx: &RotationContext, degrees: i32) -> Result<RotationReport, RotationError> {
    let step = RotationStep::new(degrees)?;
    let result = run(ctx, step).await;
    if let Err(e) = &result {
        error!(%step, code = e.error_code(), error = %e, "scene rotation failed");
    }
    result
}

async fn run(ctx: &RotationContext, step: RotationStep) -> Result<RotationReport, RotationError> {
    let scene = ctx
        .store
        .scene()
        .await
        .map_err(|e| RotationError::PlanningFailure(format!("scene unreadable: {e}")))?;
    info!(scene = %scene.id, name = %scene.name, %step, "rotating scene");

    let mut report = RotationReport::new(step, &scene);

    report.advance(RotationStage::PlanningEntities);
    let mut payload = plan(ctx.store.as_ref(), &scene, step, &mut report).await?;

    report.advance(RotationStage::RotatingImages);
    rotate_images(ctx, &scene, step, &mut payload, &mut report).await;

    report.advance(RotationStage::AdjustingGrid);
    if let Some(record) = plan_grid(&scene.grid, step) {
        let next = scene.grid.kind.transposed();
        info!(from = ?scene.grid.kind, to = ?next, "swapping hex grid orientation");
        report.grid_type = Some(next);
        payload.merge_scene(record);
    }

    report.advance(RotationStage::InvalidatingFog);
    if scene.fog.exploration {
        invalidate_fog(ctx, &mut report).await;
    }

    report.advance(RotationStage::Committing);
    if let Err(e) = ctx.store.commit(payload).await {
        report.advance(RotationStage::Failed);
        return Err(RotationError::CommitFailure(e));
    }

    report.advance(RotationStage::Done);
    info!(
        width = report.width,
        height = report.height,
        warnings = report.warnings.len(),
        "scene rotation committed"
    );
    Ok(report)
}

/// Build the scene record and every entity update.
async fn plan(
    store: &dyn DocumentStore,
    scene: &Scene,
    step: RotationStep,
    report: &mut RotationReport,
) -> Result<UpdatePayload, RotationError> {
    let mut payload = UpdatePayload::new();
    let scene_record = plan_scene(scene, step);
    if step.swaps_axes() {
        report.width = scene.height;
        report.height = scene.width;
    }
    payload.merge_scene(scene_record);

    let ctx = PlanContext::for_scene(scene, step);
    for kind in EmbeddedKind::ALL {
        let entities = store
            .embedded_entities(kind)
            .await
            .map_err(|e| RotationError::PlanningFailure(format!("{kind} collection unreadable: {e}")))?;

        let mut updates = Vec::with_capacity(entities.len());
        for entity in &entities {
            if entity.kind() != Some(kind) {
                debug!(%kind, id = entity.id(), "skipping document outside its collection kind");
                continue;
            }
            if let Some(update) = plan_entity(entity, &ctx)? {
                updates.push(update);
            }
        }
        if !updates.is_empty() {
            debug!(%kind, count = updates.len(), "planned entity updates");
            report.updated.insert(kind, updates.len());
        }
        payload.push_entities(kind, updates);
    }
    Ok(payload)
}

async fn rotate_images(
    ctx: &RotationContext,
    scene: &Scene,
    step: RotationStep,
    payload: &mut UpdatePayload,
    report: &mut RotationReport,
) {
    let cache = ImageRotationCache::new(ctx.storage.as_ref(), &ctx.config);

    if let Some(src) = scene.background.src.as_deref().filter(|s| !s.is_empty()) {
        info!(%src, "rotating background image");
        match cache.rotate_or_fetch(src, step, ImageEncoding::Jpeg).await {
            Ok(path) => {
                let mut record = UpdateRecord::new();
                record.set("background.src", path.as_str());
                payload.merge_scene(record);
                report.background = Some(path);
            }
            Err(e) => report.warn(e),
        }
    }

    if let Some(src) = scene.foreground.as_deref().filter(|s| !s.is_empty()) {
        info!(%src, "rotating foreground image");
        match cache.rotate_or_fetch(src, step, ImageEncoding::Png).await {
            Ok(path) => {
                let mut record = UpdateRecord::new();
                record.set("foreground", path.as_str());
                payload.merge_scene(record);
                report.foreground = Some(path);
            }
            Err(e) => report.warn(e),
        }
    }
}

async fn invalidate_fog(ctx: &RotationContext, report: &mut RotationReport) {
    let Some(fog) = &ctx.fog else {
        report.warn(RotationError::FogResetUnavailable);
        return;
    };
    info!("resetting fog of war to match rotated canvas");
    match fog.reset().await {
        Ok(()) => report.fog_reset = true,
        Err(e) => report.warn(RotationError::FogResetFailed(e)),
    }
    tokio::time::sleep(ctx.config.fog_settle).await;
}

#[cfg(test)]
#[path = "rotator_test.rs"]
mod tests;
