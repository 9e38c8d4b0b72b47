//! # Render Engine
//!
//! ECS-driven rendering core with a Vulkan render-stage graph.
//!
//! ## Features
//!
//! - **ECS**: recyclable entity handles, bitmask signatures and dense
//!   per-type component storage
//! - **Render stages**: render passes, attachments and framebuffers that
//!   rebuild themselves when the surface is resized
//! - **Descriptor caching**: uniform, storage and push-constant handles that
//!   only write when their contents change
//! - **Renderers**: mesh, shadow, deferred lighting and post filters,
//!   registered against component signatures
//! - **Scenes**: JSON persistence of entities and their components
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_engine::prelude::*;
//! use nalgebra::Vector3;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     config.init_logging();
//!     let mut scene = Scene::from_config("level", &config);
//!     let crate_entity = scene.create_entity();
//!     scene.add_component(crate_entity, Transform::from_position(Vector3::new(0.0, 1.0, 0.0)))?;
//!     scene.add_component(crate_entity, Mesh::new("models/crate.obj"))?;
//!     scene.save_json("level.json")?;
//!     Ok(())
//! }
//! ```

#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod ecs;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, EngineConfig, StageScale},
        ecs::{
            components::{Camera, Light, LightKind, Material, Mesh, ShadowCaster, Tag, Transform},
            Component, ComponentMask, ComponentType, EcsError, EcsResult, Entity, World,
        },
        render::{
            renderers::{DeferredRenderer, MeshRenderer, PingPong, PostFilter, ShadowRenderer},
            stage::{Attachment, AttachmentType, SubpassType, Viewport},
            ComputeTask, Graphics, GraphicsDevice, Pipeline, RenderContext, RenderError, RenderResult,
            RenderStage, Renderer, RendererContainer, RendererId, Shader, StageIndex, Swapchain,
        },
        scene::{Scene, SceneDocument, SceneError, SceneResult},
    };
}
