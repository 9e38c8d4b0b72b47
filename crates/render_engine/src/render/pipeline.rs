//! Pipeline interface
//!
//! Pipeline objects are compiled by the backend; the render core only
//! needs their handles and the reflected [`Shader`] they were built from.

use super::{GraphicsDevice, Shader};
use ash::vk;
use std::fmt::Debug;
use std::sync::Arc;

/// Position of a pass in the frame: render stage and subpass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StageIndex {
    /// Render stage position in the graph
    pub stage: usize,
    /// Subpass within that stage
    pub subpass: u32,
}

impl StageIndex {
    pub const fn new(stage: usize, subpass: u32) -> Self {
        Self { stage, subpass }
    }
}

/// A compiled graphics or compute pipeline
pub trait Pipeline: Debug {
    /// Reflection of the program this pipeline runs
    fn shader(&self) -> &Arc<Shader>;

    /// Whether descriptors are pushed inline instead of bound as sets
    fn is_push_descriptors(&self) -> bool;

    fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout;

    fn descriptor_pool(&self) -> vk::DescriptorPool;

    fn pipeline_layout(&self) -> vk::PipelineLayout;

    fn pipeline(&self) -> vk::Pipeline;

    fn bind_point(&self) -> vk::PipelineBindPoint;

    /// Record the bind of this pipeline
    fn bind(&self, device: &dyn GraphicsDevice, cmd: vk::CommandBuffer) {
        device.cmd_bind_pipeline(cmd, self.bind_point(), self.pipeline());
    }
}

/// Pipeline described by handles the backend already created
#[derive(Debug, Clone)]
pub struct PipelineHandles {
    /// Reflection the layouts were created from
    pub shader: Arc<Shader>,
    /// Descriptors are pushed inline; `pool` is then unused
    pub push_descriptors: bool,
    pub set_layout: vk::DescriptorSetLayout,
    /// Pool persistent descriptor sets are allocated from
    pub pool: vk::DescriptorPool,
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
    /// Graphics or compute
    pub bind_point: vk::PipelineBindPoint,
}

impl PipelineHandles {
    /// Graphics pipeline with null handles, filled in by the caller
    pub fn graphics(shader: Arc<Shader>) -> Self {
        Self {
            shader,
            push_descriptors: false,
            set_layout: vk::DescriptorSetLayout::null(),
            pool: vk::DescriptorPool::null(),
            layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            bind_point: vk::PipelineBindPoint::GRAPHICS,
        }
    }

    /// Compute pipeline with null handles, filled in by the caller
    pub fn compute(shader: Arc<Shader>) -> Self {
        Self {
            bind_point: vk::PipelineBindPoint::COMPUTE,
            ..Self::graphics(shader)
        }
    }
}

impl Pipeline for PipelineHandles {
    fn shader(&self) -> &Arc<Shader> {
        &self.shader
    }

    fn is_push_descriptors(&self) -> bool {
        self.push_descriptors
    }

    fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.set_layout
    }

    fn descriptor_pool(&self) -> vk::DescriptorPool {
        self.pool
    }

    fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    fn bind_point(&self) -> vk::PipelineBindPoint {
        self.bind_point
    }
}
