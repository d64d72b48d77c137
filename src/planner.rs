//! Entity transform planner — per-kind rotation rules.
//!
//! DESIGN
//! ======
//! Every rule reads an immutable entity and returns an update record; no
//! entity is mutated. Rules dispatch on the entity's kind tag:
//!
//! - Point kinds (lights, sounds, notes): the position is transformed. Lights
//!   with a cone also turn the cone by the step.
//! - Walls: both endpoints transform independently, order preserved.
//! - Box kinds (tokens, tiles, drawings): pivot on the center so the entity
//!   stays put relative to its surroundings, swap the extent on quarter turns,
//!   then recompute the top-left from the new center.
//! - Templates: the origin transforms and the facing turns by the step.
//!
//! Every angle written is normalized into `[0, 360)`.

use tracing::debug;

use crate::error::RotationError;
use crate::scene::{
    AmbientLight, BackgroundImage, Drawing, Entity, GridConfig, MeasuredTemplate, Placement, Scene, Tile, Token, Wall,
};
use crate::step::RotationStep;
use crate::transform::{Point, rotate_vector, rotated_extent, transform};
use crate::update::{EntityUpdate, UpdateRecord};

// =============================================================================
// CONTEXT
// =============================================================================

/// Canvas facts shared by every rule in one rotation.
#[derive(Debug, Clone, Copy)]
pub struct PlanContext {
    pub old_width: f64,
    pub old_height: f64,
    /// Pixels per grid cell, used to size tokens.
    pub grid_size: f64,
    pub step: RotationStep,
}

impl PlanContext {
    #[must_use]
    pub fn for_scene(scene: &Scene, step: RotationStep) -> Self {
        Self {
            old_width: f64::from(scene.width),
            old_height: f64::from(scene.height),
            grid_size: scene.grid.size,
            step,
        }
    }

    fn point(&self, x: f64, y: f64) -> Point {
        transform(Point::new(x, y), self.old_width, self.old_height, self.step)
    }
}

// =============================================================================
// ENTITY RULES
// =============================================================================

/// Plan the update for one entity.
///
/// Unknown kinds return `Ok(None)` and contribute nothing.
///
/// # Errors
///
/// Returns `PlanningFailure` if the entity's geometry produces a non-finite
/// coordinate.
pub fn plan_entity(entity: &Entity, ctx: &PlanContext) -> Result<Option<EntityUpdate>, RotationError> {
    let record = match entity {
        Entity::Token(token) => plan_token(token, ctx),
        Entity::Tile(tile) => plan_tile(tile, ctx),
        Entity::Drawing(drawing) => plan_drawing(drawing, ctx),
        Entity::Wall(wall) => plan_wall(wall, ctx),
        Entity::AmbientLight(light) => plan_light(light, ctx),
        Entity::AmbientSound(placement) | Entity::Note(placement) => plan_placement(placement, ctx),
        Entity::MeasuredTemplate(template) => plan_template(template, ctx),
        Entity::Unknown { kind, id } => {
            debug!(%kind, %id, "skipping embedded document of unknown kind");
            return Ok(None);
        }
    };
    ensure_finite(entity, &record)?;
    Ok(Some(EntityUpdate { id: entity.id().to_string(), record }))
}

fn plan_placement(placement: &Placement, ctx: &PlanContext) -> UpdateRecord {
    let p = ctx.point(placement.x, placement.y);
    let mut record = UpdateRecord::new();
    record.set("x", p.x).set("y", p.y);
    record
}

fn plan_light(light: &AmbientLight, ctx: &PlanContext) -> UpdateRecord {
    let p = ctx.point(light.x, light.y);
    let mut record = UpdateRecord::new();
    record.set("x", p.x).set("y", p.y);
    if let Some(rotation) = light.config.rotation {
        record.set("config.rotation", ctx.step.add_to_angle(rotation));
    }
    record
}

fn plan_wall(wall: &Wall, ctx: &PlanContext) -> UpdateRecord {
    let [x0, y0, x1, y1] = wall.c;
    let a = ctx.point(x0, y0);
    let b = ctx.point(x1, y1);
    let mut record = UpdateRecord::new();
    record.set("c", vec![a.x, a.y, b.x, b.y]);
    record
}

fn plan_template(template: &MeasuredTemplate, ctx: &PlanContext) -> UpdateRecord {
    let p = ctx.point(template.x, template.y);
    let mut record = UpdateRecord::new();
    record
        .set("x", p.x)
        .set("y", p.y)
        .set("direction", ctx.step.add_to_angle(template.direction));
    record
}

/// New placement of a top-left anchored box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxPlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
}

/// Rotate a box about its own center.
///
/// `width`/`height` are pixel extents; the returned extent is swapped on
/// quarter turns.
#[must_use]
pub fn rotate_box(x: f64, y: f64, width: f64, height: f64, rotation: f64, ctx: &PlanContext) -> BoxPlacement {
    let center = ctx.point(x + width / 2.0, y + height / 2.0);
    let (width, height) = rotated_extent(width, height, ctx.step);
    BoxPlacement {
        x: center.x - width / 2.0,
        y: center.y - height / 2.0,
        width,
        height,
        rotation: ctx.step.add_to_angle(rotation),
    }
}

/// Token pixel extent: the host's rendered size when known, otherwise cells
/// times the grid size.
#[must_use]
pub fn token_pixel_extent(token: &Token, grid_size: f64) -> (f64, f64) {
    match token.rendered {
        Some(extent) if extent.w > 0.0 && extent.h > 0.0 => (extent.w, extent.h),
        _ => (token.width * grid_size, token.height * grid_size),
    }
}

fn plan_token(token: &Token, ctx: &PlanContext) -> UpdateRecord {
    let (pixel_w, pixel_h) = token_pixel_extent(token, ctx.grid_size);
    let placed = rotate_box(token.x, token.y, pixel_w, pixel_h, token.rotation, ctx);
    let mut record = UpdateRecord::new();
    record
        .set("x", placed.x)
        .set("y", placed.y)
        .set("rotation", placed.rotation);
    if ctx.step.swaps_axes() {
        record.set("width", token.height).set("height", token.width);
    }
    record
}

fn plan_tile(tile: &Tile, ctx: &PlanContext) -> UpdateRecord {
    let placed = rotate_box(tile.x, tile.y, tile.width, tile.height, tile.rotation, ctx);
    let mut record = UpdateRecord::new();
    record
        .set("x", placed.x)
        .set("y", placed.y)
        .set("rotation", placed.rotation);
    if ctx.step.swaps_axes() {
        record.set("width", placed.width).set("height", placed.height);
    }
    record
}

fn plan_drawing(drawing: &Drawing, ctx: &PlanContext) -> UpdateRecord {
    let shape = &drawing.shape;
    let placed = rotate_box(drawing.x, drawing.y, shape.width, shape.height, drawing.rotation, ctx);
    let mut record = UpdateRecord::new();
    record
        .set("x", placed.x)
        .set("y", placed.y)
        .set("rotation", placed.rotation);
    if ctx.step.swaps_axes() {
        record
            .set("shape.width", placed.width)
            .set("shape.height", placed.height);
    }
    record
}

/// serde_json turns non-finite floats into `null`; treat that as a failed plan.
fn ensure_finite(entity: &Entity, record: &UpdateRecord) -> Result<(), RotationError> {
    let bad = record.fields().iter().find(|(_, value)| match value {
        serde_json::Value::Null => true,
        serde_json::Value::Array(items) => items.iter().any(serde_json::Value::is_null),
        _ => false,
    });
    match bad {
        Some((path, _)) => Err(RotationError::PlanningFailure(format!(
            "{} {} produced a non-finite `{path}`",
            entity.kind().map_or("entity", |k| k.document_name()),
            entity.id()
        ))),
        None => Ok(()),
    }
}

// =============================================================================
// SCENE RULES
// =============================================================================

/// Scene dimensions and background offset after the step.
///
/// The offset is a vector from the origin, so it rotates without reference to
/// the canvas extent.
#[must_use]
pub fn plan_scene(scene: &Scene, step: RotationStep) -> UpdateRecord {
    let (width, height) = if step.swaps_axes() { (scene.height, scene.width) } else { (scene.width, scene.height) };
    let BackgroundImage { offset_x, offset_y, .. } = scene.background;
    let offset = rotate_vector(Point::new(offset_x, offset_y), step);
    let mut record = UpdateRecord::new();
    record
        .set("width", width)
        .set("height", height)
        .set("background.offsetX", offset.x)
        .set("background.offsetY", offset.y);
    record
}

/// Grid type change needed to keep a hex lattice aligned, if any.
#[must_use]
pub fn plan_grid(grid: &GridConfig, step: RotationStep) -> Option<UpdateRecord> {
    if !grid.kind.is_hex() || !step.swaps_axes() {
        return None;
    }
    let mut record = UpdateRecord::new();
    record.set("grid.type", u8::from(grid.kind.transposed()));
    Some(record)
}

#[cfg(test)]
#[path = "planner_test.rs"]
mod tests;
