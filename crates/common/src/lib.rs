//! Shared types and numeric helpers used by every tickwell crate.
//!
//! # Invariants
//! - Blending helpers never produce NaN for finite inputs.
//! - `Pose` rotations are unit quaternions whenever they leave this crate.

pub mod math;
mod types;

pub use math::{lerp_vec3, nlerp, normalize_quat, slerp, yaw_from_direction};
pub use types::{EntityId, KindTag, Pose};

pub fn crate_info() -> &'static str {
    concat!("tickwell-common v", env!("CARGO_PKG_VERSION"))
}
