//! Rigid-body world for the tickwell simulation core.
//!
//! # Invariants
//! - The world is the only writer of body poses during a step.
//! - Every pair of layers has a defined collision rule; holes are rejected
//!   when the [`LayerTable`] is built and panic if ever reached.
//! - `step` is deterministic: identical worlds stepped with identical `dt`
//!   produce bit-identical poses.

mod body;
mod error;
mod layers;
mod narrowphase;
mod query;
mod shape;
mod solver;
mod world;

pub use body::{BodyDesc, BodyHandle, Material, MotionType};
pub use error::{LayerConfigError, PhysicsError};
pub use layers::{BroadPhaseLayer, LayerMask, LayerTable, LayerTableBuilder, ObjectLayer};
pub use query::{Ray, RayFilter, RayHit};
pub use shape::{Aabb, Shape};
pub use world::{PhysicsConfig, PhysicsWorld, StepStats};

pub fn crate_info() -> &'static str {
    concat!("tickwell-physics v", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("physics"));
    }
}
