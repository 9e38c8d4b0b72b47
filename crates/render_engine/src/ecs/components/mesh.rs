//! Mesh component

use crate::ecs::{Component, ComponentType};
use crate::render::model::Model;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Renderable geometry reference
///
/// `model` is the asset identifier persisted in scene files; `handle` is
/// the loaded GPU geometry, filled in by the asset collaborator and
/// released when the component is destroyed.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Mesh {
    /// Asset identifier
    pub model: String,
    /// Loaded geometry, if any
    #[serde(skip)]
    pub handle: Option<Arc<dyn Model>>,
}

impl Mesh {
    /// Mesh referring to an asset that is not loaded yet
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), handle: None }
    }

    /// Mesh with loaded geometry
    pub fn with_handle(model: impl Into<String>, handle: Arc<dyn Model>) -> Self {
        Self { model: model.into(), handle: Some(handle) }
    }
}

impl fmt::Debug for Mesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mesh")
            .field("model", &self.model)
            .field("loaded", &self.handle.is_some())
            .finish()
    }
}

impl Component for Mesh {
    const TYPE: ComponentType = ComponentType::Mesh;

    fn on_destroy(&mut self) {
        self.handle = None;
    }
}
