//! ECS error types

use super::{ComponentType, Entity};
use thiserror::Error;

/// Errors raised at the ECS boundary
///
/// These are contract violations: a caller used a handle that does not
/// name a live slot, or asked for data the entity's mask says is absent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Entity handle is the null handle or lies beyond current capacity
    #[error("Invalid entity {entity:?} (capacity {capacity})")]
    InvalidEntity {
        /// The offending handle
        entity: Entity,
        /// Number of slots at the time of the call
        capacity: usize,
    },

    /// Entity does not carry the requested component
    #[error("Entity {entity:?} has no {component:?} component")]
    MissingComponent {
        /// Entity that was queried
        entity: Entity,
        /// Component type whose mask bit is clear
        component: ComponentType,
    },

    /// Integer discriminant does not name a component type
    #[error("Unknown component type {0}")]
    UnknownComponentType(i64),

    /// Component document could not be decoded
    #[error("Failed to decode {component:?}: {reason}")]
    Decode {
        /// Component type being decoded
        component: ComponentType,
        /// Decoder message
        reason: String,
    },
}

/// Result type for ECS operations
pub type EcsResult<T> = Result<T, EcsError>;
