//! Input latching between the device poll cadence and the fixed tick.
//!
//! Raw device state is collected once per render frame into an
//! [`InputState`]. Gameplay triggers are consumed once per executed tick;
//! mode toggles are consumed once per render frame. The kernel reads the
//! latched state, never the device.
//!
//! # Invariants
//! - Collection only ever sets latched flags; it never clears them.
//! - Each latched category is cleared by exactly one consume operation.

pub mod action;
mod device;
mod latch;

pub use action::{Action, ActionCategory, Binding, Bindings, Key, MouseButton};
pub use device::{InputDevice, ScriptedDevice};
pub use latch::{InputLatch, InputState};

pub fn crate_info() -> &'static str {
    concat!("tickwell-input v", env!("CARGO_PKG_VERSION"))
}
