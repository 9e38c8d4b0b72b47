//! Transform component for entity positioning
//!
//! Position, rotation and non-uniform scale, composed as
//! `translation * rotation * scale` when converted to a model matrix.

use crate::ecs::{Component, ComponentType};
use nalgebra::{Isometry3, Matrix4, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Spatial placement of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    /// World position
    pub position: Vector3<f32>,
    /// Orientation
    pub rotation: UnitQuaternion<f32>,
    /// Per-axis scale
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Identity transform at `position`
    pub fn from_position(position: Vector3<f32>) -> Self {
        Self { position, ..Self::default() }
    }

    /// Replace the rotation
    pub fn with_rotation(mut self, rotation: UnitQuaternion<f32>) -> Self {
        self.rotation = rotation;
        self
    }

    /// Replace the scale
    pub fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.scale = scale;
        self
    }

    /// Model matrix
    pub fn matrix(&self) -> Matrix4<f32> {
        let isometry = Isometry3::from_parts(Translation3::from(self.position), self.rotation);
        isometry.to_homogeneous() * Matrix4::new_nonuniform_scaling(&self.scale)
    }

    /// Direction the entity faces (-Z in local space)
    pub fn forward(&self) -> Vector3<f32> {
        self.rotation * -Vector3::z()
    }

    /// Largest scale component, used to scale bounding radii
    pub fn max_scale(&self) -> f32 {
        self.scale.x.abs().max(self.scale.y.abs()).max(self.scale.z.abs())
    }
}

impl Component for Transform {
    const TYPE: ComponentType = ComponentType::Transform;
}
