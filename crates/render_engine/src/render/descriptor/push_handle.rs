//! Push constant staging

use super::MissingMembers;
use crate::render::device::GraphicsDevice;
use crate::render::shader::UniformBlock;
use crate::render::Pipeline;
use ash::vk;
use bytemuck::Pod;

/// CPU bytes for one push-constant block
#[derive(Debug, Clone, Default)]
pub struct PushHandle {
    multipipeline: bool,
    uniform_block: Option<UniformBlock>,
    data: Vec<u8>,
    missing: MissingMembers,
}

impl PushHandle {
    pub fn new(multipipeline: bool) -> Self {
        Self {
            multipipeline,
            ..Self::default()
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Write `value` into the member `name`
    pub fn push<T: Pod>(&mut self, name: &str, value: &T) {
        let Some(block) = &self.uniform_block else {
            return;
        };
        let Some(uniform) = self.missing.lookup(block, name) else {
            return;
        };
        let bytes = bytemuck::bytes_of(value);
        let size = bytes.len().min(uniform.size as usize);
        let offset = uniform.offset as usize;
        self.push_bytes(offset, &bytes[..size]);
    }

    /// Write raw bytes at `offset`; out of range writes are dropped
    pub fn push_bytes(&mut self, offset: usize, bytes: &[u8]) {
        let Some(end) = offset.checked_add(bytes.len()) else {
            return;
        };
        if let Some(target) = self.data.get_mut(offset..end) {
            target.copy_from_slice(bytes);
        }
    }

    /// Follow `block`; returns `false` when the data was reallocated
    pub fn update(&mut self, block: Option<&UniformBlock>) -> bool {
        let rebind = (self.multipipeline && self.uniform_block.is_none())
            || (!self.multipipeline && self.uniform_block.as_ref() != block);
        if rebind {
            self.uniform_block = block.cloned();
            self.data = vec![0; block.map_or(0, |block| block.size as usize)];
            self.missing.clear();
            return false;
        }
        true
    }

    /// Record the push of the staged bytes
    pub fn bind_push(&self, device: &dyn GraphicsDevice, cmd: vk::CommandBuffer, pipeline: &dyn Pipeline) {
        let Some(block) = &self.uniform_block else {
            return;
        };
        device.cmd_push_constants(cmd, pipeline.pipeline_layout(), block.stage_flags, 0, &self.data);
    }
}
