//! Descriptor binding caches
//!
//! Renderers push named resources and values every frame; the handles in
//! this module compare each push with what is already bound and only
//! touch the GPU when something actually changed.

pub mod buffer;
pub mod descriptor_handle;
pub mod descriptor_set;
pub mod push_handle;
pub mod storage_handle;
pub mod uniform_handle;

pub use buffer::{Buffer, BufferStatus};
pub use descriptor_handle::DescriptorHandle;
pub use descriptor_set::DescriptorSet;
pub use push_handle::PushHandle;
pub use storage_handle::StorageHandle;
pub use uniform_handle::UniformHandle;

use super::device::WriteDescriptor;
use super::shader::{Uniform, UniformBlock};
use ash::vk;
use std::collections::BTreeSet;

/// Member names already reported missing from a handle's bound block
#[derive(Debug, Clone, Default)]
pub(crate) struct MissingMembers(BTreeSet<String>);

impl MissingMembers {
    /// Member `name` of `block`, logging an absent name once
    pub(crate) fn lookup<'a>(&mut self, block: &'a UniformBlock, name: &str) -> Option<&'a Uniform> {
        let uniform = block.uniform(name);
        if uniform.is_none() && self.0.insert(name.to_owned()) {
            log::error!("Could not find uniform '{}' in block at binding {}", name, block.binding);
        }
        uniform
    }

    /// Forget reported names after binding another block
    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

/// Byte range of a buffer bound to a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OffsetSize {
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

impl OffsetSize {
    pub const fn new(offset: vk::DeviceSize, size: vk::DeviceSize) -> Self {
        Self { offset, size }
    }
}

/// Identity of a bound GPU resource
///
/// Two pushes with the same identity and range are the same binding,
/// whatever the resource's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceId {
    Buffer(vk::Buffer),
    Image(vk::ImageView, vk::Sampler),
}

/// Anything that can be written into a descriptor slot
pub trait Descriptor {
    fn resource_id(&self) -> ResourceId;

    /// Build the write for `binding`
    fn write_descriptor(
        &self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        offset_size: Option<OffsetSize>,
    ) -> WriteDescriptor;
}
