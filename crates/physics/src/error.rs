/// Errors surfaced by body creation. Everything else in the world is either
/// infallible or a programmer error that panics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PhysicsError {
    #[error("body capacity exceeded: world holds at most {max} bodies")]
    CapacityExceeded { max: usize },
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    #[error("invalid body description: {0}")]
    InvalidBody(String),
}

/// Errors from building a collision layer table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayerConfigError {
    #[error("object layer {0:?} has no broad-phase layer")]
    UnmappedObjectLayer(crate::ObjectLayer),
    #[error("broad-phase pair ({0:?}, {1:?}) has no collision rule")]
    UnmappedBroadPhasePair(crate::BroadPhaseLayer, crate::BroadPhaseLayer),
    #[error("object layer pair ({0:?}, {1:?}) has no collision rule")]
    UnmappedObjectPair(crate::ObjectLayer, crate::ObjectLayer),
}
