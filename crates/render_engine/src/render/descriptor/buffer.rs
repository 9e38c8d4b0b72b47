//! GPU buffer wrapper with RAII cleanup

use super::{Descriptor, OffsetSize, ResourceId};
use crate::render::device::{BufferAllocation, DescriptorInfo, GraphicsDevice, WriteDescriptor};
use crate::render::RenderResult;
use ash::vk;
use std::sync::Arc;

/// Dirty state of a staged buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStatus {
    /// No block bound yet; the buffer must be (re)allocated
    Reset,
    /// CPU bytes differ from the GPU copy
    Changed,
    /// GPU copy is current
    Normal,
}

/// Host-visible buffer owned through the device
pub struct Buffer {
    device: Arc<dyn GraphicsDevice>,
    allocation: BufferAllocation,
    usage: vk::BufferUsageFlags,
}

impl Buffer {
    /// Allocate `size` bytes
    pub fn new(device: Arc<dyn GraphicsDevice>, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> RenderResult<Self> {
        let allocation = device.create_buffer(size, usage)?;
        log::trace!("Created buffer {:?} ({} bytes, {:?})", allocation.buffer, size, usage);
        Ok(Self { device, allocation, usage })
    }

    /// Uniform buffer of `size` bytes
    pub fn uniform(device: Arc<dyn GraphicsDevice>, size: vk::DeviceSize) -> RenderResult<Self> {
        Self::new(device, size, vk::BufferUsageFlags::UNIFORM_BUFFER)
    }

    /// Storage buffer of `size` bytes
    pub fn storage(device: Arc<dyn GraphicsDevice>, size: vk::DeviceSize) -> RenderResult<Self> {
        Self::new(device, size, vk::BufferUsageFlags::STORAGE_BUFFER)
    }

    /// Copy `data` to `offset`
    pub fn write(&self, offset: vk::DeviceSize, data: &[u8]) -> RenderResult<()> {
        self.device.write_buffer(&self.allocation, offset, data)
    }

    pub fn handle(&self) -> vk::Buffer {
        self.allocation.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.allocation.size
    }

    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }
}

impl Descriptor for Buffer {
    fn resource_id(&self) -> ResourceId {
        ResourceId::Buffer(self.allocation.buffer)
    }

    fn write_descriptor(
        &self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        offset_size: Option<OffsetSize>,
    ) -> WriteDescriptor {
        let (offset, range) = offset_size.map_or((0, self.allocation.size), |os| (os.offset, os.size));
        WriteDescriptor {
            binding,
            descriptor_type,
            info: DescriptorInfo::Buffer(vk::DescriptorBufferInfo {
                buffer: self.allocation.buffer,
                offset,
                range,
            }),
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.device.destroy_buffer(&self.allocation);
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("buffer", &self.allocation.buffer)
            .field("size", &self.allocation.size)
            .field("usage", &self.usage)
            .finish()
    }
}

/// CPU staging bytes mirrored into a GPU buffer sized to a shader block
///
/// Shared by [`super::UniformHandle`] and [`super::StorageHandle`].
#[derive(Debug)]
pub(crate) struct StagedBuffer {
    device: Arc<dyn GraphicsDevice>,
    usage: vk::BufferUsageFlags,
    data: Vec<u8>,
    buffer: Option<Buffer>,
    status: BufferStatus,
}

impl StagedBuffer {
    pub(crate) fn new(device: Arc<dyn GraphicsDevice>, usage: vk::BufferUsageFlags) -> Self {
        Self {
            device,
            usage,
            data: Vec::new(),
            buffer: None,
            status: BufferStatus::Reset,
        }
    }

    pub(crate) fn status(&self) -> BufferStatus {
        self.status
    }

    pub(crate) fn buffer(&self) -> Option<&Buffer> {
        self.buffer.as_ref()
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copy `bytes` into the staging area if they differ from what is there
    ///
    /// Writes before the first allocation, or past the end, are dropped.
    pub(crate) fn write(&mut self, offset: usize, bytes: &[u8]) {
        if self.buffer.is_none() {
            return;
        }
        let Some(end) = offset.checked_add(bytes.len()).filter(|end| *end <= self.data.len()) else {
            log::warn!("Write of {} bytes at {} exceeds buffer of {}", bytes.len(), offset, self.data.len());
            return;
        };
        let target = &mut self.data[offset..end];
        if self.status != BufferStatus::Changed && target == bytes {
            return;
        }
        target.copy_from_slice(bytes);
        self.status = BufferStatus::Changed;
    }

    /// Reallocate both copies at `size`; the content is fully dirty
    pub(crate) fn reallocate(&mut self, size: usize) -> RenderResult<()> {
        self.buffer = None;
        self.data.resize(size, 0);
        self.buffer = Some(Buffer::new(self.device.clone(), size as vk::DeviceSize, self.usage)?);
        self.status = BufferStatus::Changed;
        Ok(())
    }

    /// Drop both copies until a block is bound again
    pub(crate) fn reset(&mut self) {
        self.buffer = None;
        self.data.clear();
        self.status = BufferStatus::Reset;
    }

    /// Copy the staging bytes to the GPU if they changed
    pub(crate) fn flush(&mut self) -> RenderResult<()> {
        if self.status != BufferStatus::Changed {
            return Ok(());
        }
        if let Some(buffer) = &self.buffer {
            buffer.write(0, &self.data)?;
            self.status = BufferStatus::Normal;
        }
        Ok(())
    }
}
