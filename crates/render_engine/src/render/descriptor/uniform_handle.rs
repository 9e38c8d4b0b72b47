//! Uniform block staging
//!
//! Values are pushed by member name into a CPU copy of the block. Bytes
//! are compared before they are copied, so pushing an unchanged value
//! leaves the buffer clean and nothing is uploaded on the next update.

use super::buffer::StagedBuffer;
use super::{Buffer, BufferStatus, MissingMembers};
use crate::render::device::GraphicsDevice;
use crate::render::shader::UniformBlock;
use crate::render::RenderResult;
use ash::vk;
use bytemuck::Pod;
use std::sync::Arc;

/// CPU-staged uniform buffer bound to one shader block
#[derive(Debug)]
pub struct UniformHandle {
    multipipeline: bool,
    uniform_block: Option<UniformBlock>,
    staged: StagedBuffer,
    missing: MissingMembers,
}

impl UniformHandle {
    /// Create a handle that sizes itself on first update
    ///
    /// A `multipipeline` handle keeps the first block it is bound to even
    /// when later updated with another pipeline's block.
    pub fn new(device: Arc<dyn GraphicsDevice>, multipipeline: bool) -> Self {
        Self {
            multipipeline,
            uniform_block: None,
            staged: StagedBuffer::new(device, vk::BufferUsageFlags::UNIFORM_BUFFER),
            missing: MissingMembers::default(),
        }
    }

    /// Create a handle already sized to `block`
    pub fn with_block(device: Arc<dyn GraphicsDevice>, block: &UniformBlock, multipipeline: bool) -> RenderResult<Self> {
        let mut handle = Self::new(device, multipipeline);
        handle.bind_block(Some(block))?;
        Ok(handle)
    }

    pub fn status(&self) -> BufferStatus {
        self.staged.status()
    }

    /// GPU buffer, once a block is bound
    pub fn buffer(&self) -> Option<&Buffer> {
        self.staged.buffer()
    }

    pub fn uniform_block(&self) -> Option<&UniformBlock> {
        self.uniform_block.as_ref()
    }

    /// CPU copy of the block
    pub fn bytes(&self) -> &[u8] {
        self.staged.bytes()
    }

    /// Write `value` into the member `name`
    ///
    /// At most the member's reflected size is copied. Pushes before a
    /// block is bound are ignored; unknown members are logged once.
    pub fn push<T: Pod>(&mut self, name: &str, value: &T) {
        self.push_sized(name, value, 0);
    }

    /// Write the first `size` bytes of `value` into the member `name`
    ///
    /// A `size` of zero copies `min(size_of::<T>(), member size)`.
    pub fn push_sized<T: Pod>(&mut self, name: &str, value: &T, size: usize) {
        let Some(block) = &self.uniform_block else {
            return;
        };
        let Some(uniform) = self.missing.lookup(block, name) else {
            return;
        };
        let bytes = bytemuck::bytes_of(value);
        let size = match size {
            0 => bytes.len().min(uniform.size as usize),
            size => size.min(bytes.len()),
        };
        let offset = uniform.offset as usize;
        self.staged.write(offset, &bytes[..size]);
    }

    /// Write raw bytes at `offset` into the block
    pub fn push_bytes(&mut self, offset: usize, bytes: &[u8]) {
        self.staged.write(offset, bytes);
    }

    /// Follow `block` and upload pending changes
    ///
    /// When the handle is rebound to a different block both copies are
    /// reallocated at the new size and `false` is returned; the upload
    /// happens on the next update.
    pub fn update(&mut self, block: Option<&UniformBlock>) -> RenderResult<bool> {
        let rebind = self.staged.status() == BufferStatus::Reset
            || (self.multipipeline && self.uniform_block.is_none())
            || (!self.multipipeline && self.uniform_block.as_ref() != block);
        if rebind {
            self.bind_block(block)?;
            return Ok(false);
        }

        self.staged.flush()?;
        Ok(true)
    }

    fn bind_block(&mut self, block: Option<&UniformBlock>) -> RenderResult<()> {
        self.missing.clear();
        match block {
            Some(block) => {
                self.uniform_block = Some(block.clone());
                self.staged.reallocate(block.size as usize)
            }
            None => {
                self.uniform_block = None;
                self.staged.reset();
                Ok(())
            }
        }
    }
}
