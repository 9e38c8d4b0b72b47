//! Mesh handles supplied by the asset layer
//!
//! Loading and parsing geometry happens elsewhere; the render core only
//! needs buffer handles and counts to record a draw.

use super::GraphicsDevice;
use ash::vk;
use std::fmt::Debug;

/// Uploaded geometry ready to draw
pub trait Model: Send + Sync + Debug {
    /// Vertex buffer bound at binding 0
    fn vertex_buffer(&self) -> vk::Buffer;

    /// Index buffer, if the model is indexed
    fn index_buffer(&self) -> Option<vk::Buffer>;

    fn vertex_count(&self) -> u32;

    fn index_count(&self) -> u32;

    fn index_type(&self) -> vk::IndexType {
        vk::IndexType::UINT32
    }

    /// Bounding sphere radius in model space
    fn radius(&self) -> f32;
}

/// Bind a model's buffers and record its draw
///
/// Indexed models draw `index_count` indices; others draw every vertex.
pub fn record_draw(device: &dyn GraphicsDevice, cmd: vk::CommandBuffer, model: &dyn Model, instances: u32) {
    device.cmd_bind_vertex_buffer(cmd, model.vertex_buffer());
    match model.index_buffer() {
        Some(indices) => {
            device.cmd_bind_index_buffer(cmd, indices, model.index_type());
            device.cmd_draw_indexed(cmd, model.index_count(), instances);
        }
        None => device.cmd_draw(cmd, model.vertex_count(), instances),
    }
}

/// Model built from handles owned by the asset layer
#[derive(Debug, Clone, Copy)]
pub struct StaticModel {
    pub vertex_buffer: vk::Buffer,
    pub index_buffer: Option<vk::Buffer>,
    pub vertex_count: u32,
    pub index_count: u32,
    pub radius: f32,
}

impl Model for StaticModel {
    fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer
    }

    fn index_buffer(&self) -> Option<vk::Buffer> {
        self.index_buffer
    }

    fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    fn index_count(&self) -> u32 {
        self.index_count
    }

    fn radius(&self) -> f32 {
        self.radius
    }
}
