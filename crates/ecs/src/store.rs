use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use serde::Serialize;
use tickwell_common::{EntityId, KindTag, Pose};
use tickwell_physics::{BodyDesc, BodyHandle, PhysicsError, PhysicsWorld};

/// Static description of one entity kind: its tag, its per-row extra data,
/// and how to build its physics body.
pub trait EntityKind {
    type Data: Clone + std::fmt::Debug;
    const TAG: KindTag;

    fn body_desc(pose: Pose, data: &Self::Data) -> BodyDesc;
}

/// Interpolated pose of one entity, tagged with its kind, for drawing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderInstance {
    pub id: EntityId,
    pub kind: KindTag,
    pub pose: Pose,
}

/// Structure-of-arrays storage for every live entity of kind `K`.
#[derive(Debug)]
pub struct EntityStore<K: EntityKind> {
    ids: Vec<EntityId>,
    positions: Vec<Vec3>,
    rotations: Vec<Quat>,
    previous_positions: Vec<Vec3>,
    previous_rotations: Vec<Quat>,
    bodies: Vec<BodyHandle>,
    data: Vec<K::Data>,
    rows: BTreeMap<EntityId, usize>,
}

impl<K: EntityKind> Default for EntityStore<K> {
    fn default() -> Self {
        Self {
            ids: Vec::new(),
            positions: Vec::new(),
            rotations: Vec::new(),
            previous_positions: Vec::new(),
            previous_rotations: Vec::new(),
            bodies: Vec::new(),
            data: Vec::new(),
            rows: BTreeMap::new(),
        }
    }
}

impl<K: EntityKind> EntityStore<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in row order.
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.rows.contains_key(&id)
    }

    /// Create the physics body, then the record. If the body cannot be
    /// created nothing is appended.
    pub fn spawn(
        &mut self,
        physics: &mut PhysicsWorld,
        pose: Pose,
        data: K::Data,
    ) -> Result<EntityId, PhysicsError> {
        let body = physics.create_body(K::body_desc(pose, &data))?;
        // Read back so the record matches the body exactly (normalized rotation).
        let pose = physics.pose(body);
        let id = EntityId::new();

        self.rows.insert(id, self.ids.len());
        self.ids.push(id);
        self.positions.push(pose.position);
        self.rotations.push(pose.rotation);
        self.previous_positions.push(pose.position);
        self.previous_rotations.push(pose.rotation);
        self.bodies.push(body);
        self.data.push(data);

        tracing::debug!(id = %id.short(), kind = ?K::TAG, position = ?pose.position, "spawned");
        Ok(id)
    }

    /// Destroy the body and remove the record.
    ///
    /// # Panics
    /// If `id` is not in this store. Double despawn is a caller bug.
    pub fn despawn(&mut self, physics: &mut PhysicsWorld, id: EntityId) -> K::Data {
        let Some(row) = self.rows.remove(&id) else {
            panic!("despawn of unknown {:?} entity {}", K::TAG, id.short());
        };
        physics.destroy_body(self.bodies[row]);

        self.ids.swap_remove(row);
        self.positions.swap_remove(row);
        self.rotations.swap_remove(row);
        self.previous_positions.swap_remove(row);
        self.previous_rotations.swap_remove(row);
        self.bodies.swap_remove(row);
        let data = self.data.swap_remove(row);
        if let Some(moved) = self.ids.get(row) {
            self.rows.insert(*moved, row);
        }

        tracing::debug!(id = %id.short(), kind = ?K::TAG, "despawned");
        data
    }

    /// Snapshot current poses as previous. Once per tick, before stepping.
    pub fn store_previous(&mut self) {
        self.previous_positions.copy_from_slice(&self.positions);
        self.previous_rotations.copy_from_slice(&self.rotations);
    }

    /// Re-read current poses from the physics world. Once per tick, after stepping.
    pub fn sync_from_physics(&mut self, physics: &PhysicsWorld) {
        for (row, body) in self.bodies.iter().enumerate() {
            let pose = physics.pose(*body);
            self.positions[row] = pose.position;
            self.rotations[row] = pose.rotation;
        }
    }

    /// Pose blended between the previous and current tick.
    pub fn interpolated_pose(&self, id: EntityId, alpha: f32) -> Option<Pose> {
        let row = *self.rows.get(&id)?;
        Some(self.blend_row(row, alpha))
    }

    fn blend_row(&self, row: usize, alpha: f32) -> Pose {
        Pose::interpolate(
            &Pose::new(self.previous_positions[row], self.previous_rotations[row]),
            &Pose::new(self.positions[row], self.rotations[row]),
            alpha,
        )
    }

    /// Force `previous = current` so the next frames do not blend across a
    /// discontinuity.
    pub fn reset_interpolation(&mut self, id: EntityId) -> bool {
        let Some(&row) = self.rows.get(&id) else {
            return false;
        };
        self.previous_positions[row] = self.positions[row];
        self.previous_rotations[row] = self.rotations[row];
        true
    }

    /// Move the entity and its body instantly, stop it, and drop interpolation history.
    pub fn teleport(&mut self, physics: &mut PhysicsWorld, id: EntityId, pose: Pose) -> bool {
        let Some(&row) = self.rows.get(&id) else {
            return false;
        };
        let body = self.bodies[row];
        physics.set_pose(body, pose);
        physics.set_linear_velocity(body, Vec3::ZERO);
        physics.set_angular_velocity(body, Vec3::ZERO);
        let pose = physics.pose(body);
        self.positions[row] = pose.position;
        self.rotations[row] = pose.rotation;
        self.reset_interpolation(id)
    }

    /// Current (last synced) pose.
    pub fn pose(&self, id: EntityId) -> Option<Pose> {
        let row = *self.rows.get(&id)?;
        Some(Pose::new(self.positions[row], self.rotations[row]))
    }

    pub fn previous_pose(&self, id: EntityId) -> Option<Pose> {
        let row = *self.rows.get(&id)?;
        Some(Pose::new(self.previous_positions[row], self.previous_rotations[row]))
    }

    pub fn body(&self, id: EntityId) -> Option<BodyHandle> {
        self.rows.get(&id).map(|&row| self.bodies[row])
    }

    pub fn data(&self, id: EntityId) -> Option<&K::Data> {
        self.rows.get(&id).map(|&row| &self.data[row])
    }

    pub fn data_mut(&mut self, id: EntityId) -> Option<&mut K::Data> {
        let row = *self.rows.get(&id)?;
        Some(&mut self.data[row])
    }

    /// Rows as `(id, body, data)` for per-tick gameplay passes.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = (EntityId, BodyHandle, &mut K::Data)> {
        self.ids
            .iter()
            .copied()
            .zip(self.bodies.iter().copied())
            .zip(self.data.iter_mut())
            .map(|((id, body), data)| (id, body, data))
    }

    /// Every entity's interpolated pose, in row order.
    pub fn render_instances(&self, alpha: f32) -> impl Iterator<Item = RenderInstance> + '_ {
        (0..self.ids.len()).map(move |row| RenderInstance {
            id: self.ids[row],
            kind: K::TAG,
            pose: self.blend_row(row, alpha),
        })
    }

    /// Current poses in row order, for hashing and inspection.
    pub fn current_poses(&self) -> impl Iterator<Item = Pose> + '_ {
        self.positions
            .iter()
            .zip(&self.rotations)
            .map(|(p, r)| Pose::new(*p, *r))
    }
}
