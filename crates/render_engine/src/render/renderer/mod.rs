//! Renderer trait and registry
//!
//! A renderer records the draws of one subpass. Entity-driven renderers
//! declare a [`ComponentMask`] signature and are told when an entity
//! starts or stops matching it; filters declare none and draw once per
//! frame regardless of the scene.

pub mod container;
pub mod context;
pub mod entity_map;

pub use container::{RendererContainer, RendererId};
pub use context::{CameraView, RenderContext};
pub use entity_map::EntityMap;

use super::{RenderResult, StageIndex};
use crate::ecs::{ComponentMask, Entity};
use std::any::Any;
use std::fmt::Debug;

/// Downcast support for trait objects
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Records the draws of one subpass
pub trait Renderer: AsAny + Debug {
    /// Stage and subpass this renderer draws in
    fn stage(&self) -> StageIndex;

    /// Components an entity needs to be drawn, `None` for filters
    fn signature(&self) -> Option<ComponentMask> {
        None
    }

    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    /// An entity started matching the signature
    fn register_entity(&mut self, _entity: Entity) {}

    /// An entity stopped matching the signature
    fn unregister_entity(&mut self, _entity: Entity) {}

    /// Grow entity-indexed side arrays to `new_size`
    fn on_entity_resize(&mut self, _new_size: usize) {}

    /// Record this renderer's commands for the current frame
    fn render(&mut self, ctx: &RenderContext<'_>) -> RenderResult<()>;
}
