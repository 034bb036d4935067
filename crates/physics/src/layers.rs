//! Collision layer table: object layers, broad-phase buckets and the two
//! symmetric pair predicates used to prune candidate pairs.
//!
//! The table is built and validated once, then moved into the
//! [`PhysicsWorld`](crate::PhysicsWorld) that consults it for its whole
//! lifetime. Nothing here is global.

use serde::{Deserialize, Serialize};

use crate::error::LayerConfigError;

/// Exact collision category of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectLayer {
    /// Immovable level geometry.
    Static,
    /// Simulated props and cubes.
    Dynamic,
    /// Upright player and NPC capsules.
    Character,
    /// Small clutter that only rests on level geometry.
    Debris,
}

impl ObjectLayer {
    pub const COUNT: usize = 4;
    pub const ALL: [ObjectLayer; Self::COUNT] = [
        ObjectLayer::Static,
        ObjectLayer::Dynamic,
        ObjectLayer::Character,
        ObjectLayer::Debris,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn bit(self) -> u8 {
        1 << self.index()
    }
}

/// Coarse bucket a body is sorted into before exact layer tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BroadPhaseLayer {
    Static,
    Moving,
}

impl BroadPhaseLayer {
    pub const COUNT: usize = 2;
    pub const ALL: [BroadPhaseLayer; Self::COUNT] = [BroadPhaseLayer::Static, BroadPhaseLayer::Moving];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Bit set over [`ObjectLayer`], used by ray queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMask(pub u8);

impl LayerMask {
    pub const ALL: LayerMask = LayerMask(0b1111);
    pub const NONE: LayerMask = LayerMask(0);

    pub fn with(self, layer: ObjectLayer) -> Self {
        Self(self.0 | layer.bit())
    }

    pub fn without(self, layer: ObjectLayer) -> Self {
        Self(self.0 & !layer.bit())
    }

    pub fn contains(self, layer: ObjectLayer) -> bool {
        self.0 & layer.bit() != 0
    }
}

/// Validated, total collision layer table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerTable {
    broad_of: [Option<BroadPhaseLayer>; ObjectLayer::COUNT],
    broad_pairs: [[Option<bool>; BroadPhaseLayer::COUNT]; BroadPhaseLayer::COUNT],
    object_pairs: [[Option<bool>; ObjectLayer::COUNT]; ObjectLayer::COUNT],
}

impl LayerTable {
    pub fn builder() -> LayerTableBuilder {
        LayerTableBuilder::default()
    }

    /// Broad-phase bucket of an object layer.
    ///
    /// # Panics
    /// On an unmapped layer. `build()` rejects such tables, so reaching this
    /// is a configuration bug.
    pub fn broad_phase_layer(&self, layer: ObjectLayer) -> BroadPhaseLayer {
        match self.broad_of[layer.index()] {
            Some(bp) => bp,
            None => panic!("collision layer table: object layer {layer:?} is unmapped"),
        }
    }

    /// Whether bodies in two broad-phase buckets are worth testing at all.
    pub fn broad_phase_pair(&self, a: BroadPhaseLayer, b: BroadPhaseLayer) -> bool {
        match self.broad_pairs[a.index()][b.index()] {
            Some(rule) => rule,
            None => panic!("collision layer table: broad-phase pair ({a:?}, {b:?}) is unmapped"),
        }
    }

    /// Whether two bodies on these exact layers generate contacts.
    pub fn object_pair(&self, a: ObjectLayer, b: ObjectLayer) -> bool {
        match self.object_pairs[a.index()][b.index()] {
            Some(rule) => rule,
            None => panic!("collision layer table: object pair ({a:?}, {b:?}) is unmapped"),
        }
    }

    /// Both stages combined, broad bucket first.
    pub fn should_collide(&self, a: ObjectLayer, b: ObjectLayer) -> bool {
        let bp_a = self.broad_phase_layer(a);
        let bp_b = self.broad_phase_layer(b);
        self.broad_phase_pair(bp_a, bp_b) && self.object_pair(a, b)
    }
}

impl Default for LayerTable {
    /// Static geometry never tests against itself; debris rests on static
    /// geometry only; everything else collides.
    fn default() -> Self {
        use BroadPhaseLayer as Bp;
        use ObjectLayer as L;

        let result = LayerTable::builder()
            .map(L::Static, Bp::Static)
            .map(L::Dynamic, Bp::Moving)
            .map(L::Character, Bp::Moving)
            .map(L::Debris, Bp::Moving)
            .broad_pair(Bp::Static, Bp::Static, false)
            .broad_pair(Bp::Static, Bp::Moving, true)
            .broad_pair(Bp::Moving, Bp::Moving, true)
            .object_pair(L::Static, L::Static, false)
            .object_pair(L::Static, L::Dynamic, true)
            .object_pair(L::Static, L::Character, true)
            .object_pair(L::Static, L::Debris, true)
            .object_pair(L::Dynamic, L::Dynamic, true)
            .object_pair(L::Dynamic, L::Character, true)
            .object_pair(L::Dynamic, L::Debris, false)
            .object_pair(L::Character, L::Character, true)
            .object_pair(L::Character, L::Debris, false)
            .object_pair(L::Debris, L::Debris, false)
            .build();
        match result {
            Ok(table) => table,
            Err(e) => panic!("default collision layer table is incomplete: {e}"),
        }
    }
}

/// Accumulates layer rules. Pair rules are written symmetrically.
#[derive(Debug, Clone, Default)]
pub struct LayerTableBuilder {
    broad_of: [Option<BroadPhaseLayer>; ObjectLayer::COUNT],
    broad_pairs: [[Option<bool>; BroadPhaseLayer::COUNT]; BroadPhaseLayer::COUNT],
    object_pairs: [[Option<bool>; ObjectLayer::COUNT]; ObjectLayer::COUNT],
}

impl LayerTableBuilder {
    pub fn map(mut self, layer: ObjectLayer, bucket: BroadPhaseLayer) -> Self {
        self.broad_of[layer.index()] = Some(bucket);
        self
    }

    pub fn broad_pair(mut self, a: BroadPhaseLayer, b: BroadPhaseLayer, collide: bool) -> Self {
        self.broad_pairs[a.index()][b.index()] = Some(collide);
        self.broad_pairs[b.index()][a.index()] = Some(collide);
        self
    }

    pub fn object_pair(mut self, a: ObjectLayer, b: ObjectLayer, collide: bool) -> Self {
        self.object_pairs[a.index()][b.index()] = Some(collide);
        self.object_pairs[b.index()][a.index()] = Some(collide);
        self
    }

    /// Reject any table with a hole in it.
    pub fn build(self) -> Result<LayerTable, LayerConfigError> {
        for layer in ObjectLayer::ALL {
            if self.broad_of[layer.index()].is_none() {
                return Err(LayerConfigError::UnmappedObjectLayer(layer));
            }
        }
        for a in BroadPhaseLayer::ALL {
            for b in BroadPhaseLayer::ALL {
                if self.broad_pairs[a.index()][b.index()].is_none() {
                    return Err(LayerConfigError::UnmappedBroadPhasePair(a, b));
                }
            }
        }
        for a in ObjectLayer::ALL {
            for b in ObjectLayer::ALL {
                if self.object_pairs[a.index()][b.index()].is_none() {
                    return Err(LayerConfigError::UnmappedObjectPair(a, b));
                }
            }
        }
        Ok(LayerTable {
            broad_of: self.broad_of,
            broad_pairs: self.broad_pairs,
            object_pairs: self.object_pairs,
        })
    }
}
