//! Simulation kernel: fixed-timestep clock, character locomotion and the
//! per-frame orchestration that ties input, physics and entity stores
//! together.
//!
//! # Invariants
//! - Physics only ever steps by [`TICK_DURATION`].
//! - Each tick runs store_previous, gameplay, step, sync, trigger
//!   consumption, in that order, for every store.
//! - Presentation reads interpolated poses only.

pub mod character;
pub mod clock;
pub mod config;
mod error;
pub mod world;

pub use character::{CharacterConfig, CharacterController, CharacterStep};
pub use clock::{FixedClock, TICK_DURATION, TICK_DURATION_F32, TICK_RATE_HZ};
pub use config::{ArenaConfig, SimConfig};
pub use error::{ConfigError, SimError};
pub use world::{CameraMode, CameraState, FrameReport, SimEvent, Simulation};

pub fn crate_info() -> &'static str {
    concat!("tickwell-kernel v", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("kernel"));
    }
}
