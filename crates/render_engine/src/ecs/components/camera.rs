//! Camera component

use super::Transform;
use crate::ecs::{Component, ComponentType};
use nalgebra::{Matrix4, Perspective3};
use serde::{Deserialize, Serialize};

/// Perspective camera; the view comes from the entity's transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
    /// Whether this camera drives the main view
    pub active: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov_y: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 1000.0,
            active: true,
        }
    }
}

impl Camera {
    /// Projection matrix for a viewport aspect ratio
    pub fn projection(&self, aspect_ratio: f32) -> Matrix4<f32> {
        Perspective3::new(aspect_ratio, self.fov_y, self.near, self.far).to_homogeneous()
    }

    /// View matrix for a camera placed at `transform`
    pub fn view(transform: &Transform) -> Matrix4<f32> {
        transform.matrix().try_inverse().unwrap_or_else(Matrix4::identity)
    }
}

impl Component for Camera {
    const TYPE: ComponentType = ComponentType::Camera;
}
