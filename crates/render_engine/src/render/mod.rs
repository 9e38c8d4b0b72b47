//! Rendering core
//!
//! Everything between the scene and the GPU: the stage graph (render
//! passes, attachments, framebuffers), shader reflection, the descriptor
//! and uniform caches, and the renderer registry that turns component
//! signatures into draw calls.
//!
//! All native calls go through [`GraphicsDevice`]. The ash backend in
//! [`vulkan`] is the production implementation.

pub mod compute;
pub mod descriptor;
pub mod device;
pub mod graphics;
pub mod model;
pub mod pipeline;
pub mod renderer;
pub mod renderers;
pub mod shader;
pub mod stage;
pub mod vulkan;

#[cfg(test)]
pub(crate) mod testing;

pub use compute::ComputeTask;
pub use device::{GraphicsDevice, Swapchain};
pub use graphics::Graphics;
pub use pipeline::{Pipeline, PipelineHandles, StageIndex};
pub use renderer::{RenderContext, Renderer, RendererContainer, RendererId};
pub use shader::Shader;
pub use stage::RenderStage;

use ash::vk;
use thiserror::Error;

/// Rendering errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Native call returned an error code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Backend or device setup failed
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// A GPU object could not be created
    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// Operation not valid in the current state
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// What went wrong
        reason: String,
    },

    /// A stage or subpass names an attachment that does not exist
    #[error("Attachment not found: {0}")]
    MissingAttachment(String),

    /// No memory type satisfies the requested properties
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,
}

impl From<vk::Result> for RenderError {
    fn from(result: vk::Result) -> Self {
        RenderError::Api(result)
    }
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
