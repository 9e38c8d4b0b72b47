//! ash backend
//!
//! [`VulkanDevice`] implements [`GraphicsDevice`](super::GraphicsDevice)
//! over an `ash::Device` created by the application. The layout helpers
//! turn a reflected [`Shader`](super::Shader) into the descriptor-set
//! layout, pool and pipeline layout a pipeline is built with.

mod device;
mod layout;

pub use device::{DeviceOptions, VulkanDevice};
pub use layout::{create_descriptor_pool, create_descriptor_set_layout, create_pipeline_layout};
