//! Persistent descriptor set with RAII cleanup

use crate::render::device::{GraphicsDevice, WriteDescriptor};
use crate::render::{Pipeline, RenderResult};
use ash::vk;
use std::sync::Arc;

/// A descriptor set allocated from a pipeline's pool
#[derive(Debug)]
pub struct DescriptorSet {
    device: Arc<dyn GraphicsDevice>,
    pool: vk::DescriptorPool,
    set: vk::DescriptorSet,
    layout: vk::PipelineLayout,
    bind_point: vk::PipelineBindPoint,
}

impl DescriptorSet {
    /// Allocate one set with the pipeline's layout
    pub fn new(device: Arc<dyn GraphicsDevice>, pipeline: &dyn Pipeline) -> RenderResult<Self> {
        let pool = pipeline.descriptor_pool();
        let set = device.allocate_descriptor_set(pool, pipeline.descriptor_set_layout())?;
        Ok(Self {
            device,
            pool,
            set,
            layout: pipeline.pipeline_layout(),
            bind_point: pipeline.bind_point(),
        })
    }

    pub fn handle(&self) -> vk::DescriptorSet {
        self.set
    }

    /// Apply descriptor writes to this set
    pub fn update(&self, writes: &[WriteDescriptor]) {
        self.device.update_descriptor_set(self.set, writes);
    }

    /// Record the bind of this set
    pub fn bind(&self, cmd: vk::CommandBuffer) {
        self.device.cmd_bind_descriptor_set(cmd, self.bind_point, self.layout, self.set);
    }
}

impl Drop for DescriptorSet {
    fn drop(&mut self) {
        self.device.free_descriptor_set(self.pool, self.set);
    }
}
