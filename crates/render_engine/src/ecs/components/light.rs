//! Light component

use crate::ecs::{Component, ComponentType};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Kind of light emitter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    /// Omni-directional light with a finite radius
    #[default]
    Point,
    /// Infinitely distant light along the transform's forward axis
    Directional,
    /// Cone light along the transform's forward axis
    Spot,
}

/// Light emitter; position and direction come from the entity's transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Light {
    /// Emitter kind
    pub kind: LightKind,
    /// Linear RGB colour
    pub color: Vector3<f32>,
    /// Scalar intensity
    pub intensity: f32,
    /// Influence radius, ignored for directional lights
    pub radius: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            color: Vector3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            radius: 10.0,
        }
    }
}

impl Component for Light {
    const TYPE: ComponentType = ComponentType::Light;
}
