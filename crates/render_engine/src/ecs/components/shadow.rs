//! Shadow caster marker

use crate::ecs::{Component, ComponentType};
use serde::{Deserialize, Serialize};

/// Marks an entity's mesh for the shadow pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowCaster {
    /// Constant depth bias applied while rendering the caster
    pub depth_bias: f32,
}

impl Default for ShadowCaster {
    fn default() -> Self {
        Self { depth_bias: 0.005 }
    }
}

impl Component for ShadowCaster {
    const TYPE: ComponentType = ComponentType::ShadowCaster;
}
