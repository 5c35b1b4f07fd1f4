//! Scene data structures: geometry, transforms and textures.
//!
//! - `mesh` generates sphere/plane geometry and uploads it as GPU meshes
//! - `texture` contains GPU texture wrapper and creation utilities
//! - `transform` holds per-object transformation and its uniform block

pub mod mesh;
pub mod texture;
pub mod transform;
