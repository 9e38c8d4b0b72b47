//! Material component

use crate::ecs::{Component, ComponentType};
use nalgebra::Vector4;
use serde::{Deserialize, Serialize};

/// Surface parameters consumed by the geometry pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    /// Linear RGBA base colour
    pub base_color: Vector4<f32>,
    /// Metalness in `[0, 1]`
    pub metallic: f32,
    /// Roughness in `[0, 1]`
    pub roughness: f32,
    /// Emissive strength
    pub emissive: f32,
    /// Optional diffuse texture asset
    pub diffuse_texture: Option<String>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: Vector4::new(1.0, 1.0, 1.0, 1.0),
            metallic: 0.0,
            roughness: 0.5,
            emissive: 0.0,
            diffuse_texture: None,
        }
    }
}

impl Component for Material {
    const TYPE: ComponentType = ComponentType::Material;
}
