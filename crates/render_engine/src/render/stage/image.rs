//! Render target image with RAII cleanup

use crate::render::descriptor::{Descriptor, OffsetSize, ResourceId};
use crate::render::device::{DescriptorInfo, GraphicsDevice, ImageAllocation, ImageDesc, WriteDescriptor};
use crate::render::RenderResult;
use ash::vk;
use std::sync::Arc;

/// 2D image with view and sampler, destroyed on drop
#[derive(Debug)]
pub struct Image2d {
    device: Arc<dyn GraphicsDevice>,
    allocation: ImageAllocation,
    desc: ImageDesc,
}

impl Image2d {
    pub fn new(device: Arc<dyn GraphicsDevice>, desc: ImageDesc) -> RenderResult<Self> {
        let allocation = device.create_image(&desc)?;
        log::trace!(
            "Created image {:?} {}x{} {:?}",
            allocation.view,
            desc.extent.width,
            desc.extent.height,
            desc.format
        );
        Ok(Self { device, allocation, desc })
    }

    pub fn view(&self) -> vk::ImageView {
        self.allocation.view
    }

    pub fn image(&self) -> vk::Image {
        self.allocation.image
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.desc.extent
    }

    pub fn format(&self) -> vk::Format {
        self.desc.format
    }

    pub fn samples(&self) -> vk::SampleCountFlags {
        self.desc.samples
    }
}

impl Descriptor for Image2d {
    fn resource_id(&self) -> ResourceId {
        ResourceId::Image(self.allocation.view, self.allocation.sampler)
    }

    fn write_descriptor(
        &self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        _offset_size: Option<OffsetSize>,
    ) -> WriteDescriptor {
        WriteDescriptor {
            binding,
            descriptor_type,
            info: DescriptorInfo::Image(vk::DescriptorImageInfo {
                sampler: self.allocation.sampler,
                image_view: self.allocation.view,
                image_layout: self.desc.layout,
            }),
        }
    }
}

impl Drop for Image2d {
    fn drop(&mut self) {
        self.device.destroy_image(&self.allocation);
    }
}
