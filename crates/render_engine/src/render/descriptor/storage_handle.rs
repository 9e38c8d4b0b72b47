//! Storage block staging

use super::buffer::StagedBuffer;
use super::{Buffer, BufferStatus, MissingMembers};
use crate::render::device::GraphicsDevice;
use crate::render::shader::UniformBlock;
use crate::render::RenderResult;
use ash::vk;
use bytemuck::Pod;
use std::sync::Arc;

/// CPU-staged storage buffer bound to one shader block
///
/// Behaves like [`super::UniformHandle`] but backs a storage buffer and
/// accepts whole arrays, which is how per-frame light lists are uploaded.
#[derive(Debug)]
pub struct StorageHandle {
    multipipeline: bool,
    uniform_block: Option<UniformBlock>,
    staged: StagedBuffer,
    missing: MissingMembers,
}

impl StorageHandle {
    pub fn new(device: Arc<dyn GraphicsDevice>, multipipeline: bool) -> Self {
        Self {
            multipipeline,
            uniform_block: None,
            staged: StagedBuffer::new(device, vk::BufferUsageFlags::STORAGE_BUFFER),
            missing: MissingMembers::default(),
        }
    }

    pub fn status(&self) -> BufferStatus {
        self.staged.status()
    }

    pub fn buffer(&self) -> Option<&Buffer> {
        self.staged.buffer()
    }

    pub fn bytes(&self) -> &[u8] {
        self.staged.bytes()
    }

    /// Write `value` into the member `name`
    pub fn push<T: Pod>(&mut self, name: &str, value: &T) {
        self.push_slice(name, std::slice::from_ref(value));
    }

    /// Write an array into the member `name`
    ///
    /// Only whole elements that fit the member are written. Returns how
    /// many were, zero when no block is bound or the member is unknown.
    pub fn push_slice<T: Pod>(&mut self, name: &str, values: &[T]) -> usize {
        let Some(block) = &self.uniform_block else {
            return 0;
        };
        let Some(uniform) = self.missing.lookup(block, name) else {
            return 0;
        };
        let capacity = match std::mem::size_of::<T>() {
            0 => values.len(),
            element => uniform.size as usize / element,
        };
        let count = values.len().min(capacity);
        let offset = uniform.offset as usize;
        self.staged.write(offset, bytemuck::cast_slice(&values[..count]));
        count
    }

    /// Write raw bytes at `offset`
    pub fn push_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.staged.write(offset, bytes);
    }

    /// Follow `block` and upload pending changes; `false` after a rebind
    pub fn update(&mut self, block: Option<&UniformBlock>) -> RenderResult<bool> {
        let rebind = self.staged.status() == BufferStatus::Reset
            || (self.multipipeline && self.uniform_block.is_none())
            || (!self.multipipeline && self.uniform_block.as_ref() != block);
        if !rebind {
            self.staged.flush()?;
            return Ok(true);
        }

        self.uniform_block = block.cloned();
        self.missing.clear();
        match block {
            Some(block) => self.staged.reallocate(block.size as usize)?,
            None => self.staged.reset(),
        }
        Ok(false)
    }
}
