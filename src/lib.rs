//! Quarter-turn rotation of a tabletop scene and everything placed on it.
//!
//! A rotation turns the scene canvas by ±90° or 180° and carries every
//! embedded document along: tokens, tiles, drawings, walls, lights, sounds,
//! notes and measured templates keep their position relative to the map.
//! Background and foreground images are rotated through a reusable cache,
//! hex grids swap orientation, explored fog is reset, and all document
//! changes land in a single commit.
//!
//! The host binds its own persistence through the traits in [`store`]; the
//! [`memory`] and [`local`] modules provide in-process and on-disk bindings.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`rotator`] | Orchestrates one rotation from validation to commit |
//! | [`step`] | Validated rotation step and angle arithmetic |
//! | [`transform`] | Point and vector rotation on the canvas |
//! | [`planner`] | Per-kind update planning for embedded documents |
//! | [`scene`] | Scene settings and typed embedded documents |
//! | [`update`] | Dotted-path update records and the commit payload |
//! | [`image_cache`] | Cached rotated variants of scene images |
//! | [`store`] | Document store, file storage and fog collaborator traits |
//! | [`memory`] | In-memory collaborators |
//! | [`local`] | Filesystem collaborators for the command line |
//! | [`config`] | Environment configuration |
//! | [`error`] | Error enums and codes |

pub mod config;
pub mod error;
pub mod image_cache;
pub mod local;
pub mod memory;
pub mod planner;
pub mod rotator;
pub mod scene;
pub mod step;
pub mod store;
pub mod transform;
pub mod update;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::{ErrorCode, RotationError};
pub use rotator::{Direction, RotationContext, RotationReport, RotationStage, rotate_scene};
pub use step::RotationStep;
