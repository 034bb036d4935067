//! Fixed-composition entity stores.
//!
//! One [`EntityStore`] per entity kind, laid out as structure-of-arrays.
//! Each row couples one record to one physics body; the two are created and
//! released together.
//!
//! # Invariants
//! - `previous == current` right after spawn and after any teleport.
//! - `store_previous` runs once per tick before the physics step,
//!   `sync_from_physics` once per tick after it.
//! - Row order is spawn order with swap-remove on despawn, so iteration is
//!   deterministic for a given sequence of operations.

mod kinds;
mod store;

pub use kinds::{
    Archetype, CharacterData, CharacterKind, CubeData, CubeKind, PropData, PropKind,
};
pub use store::{EntityKind, EntityStore, RenderInstance};

pub fn crate_info() -> &'static str {
    concat!("tickwell-ecs v", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("ecs"));
    }
}
