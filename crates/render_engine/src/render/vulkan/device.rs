//! `GraphicsDevice` over ash

use crate::config::EngineConfig;
use crate::render::device::{
    BufferAllocation, DescriptorInfo, GraphicsDevice, ImageAllocation, ImageDesc, RenderPassBegin, RenderPassDesc,
    WriteDescriptor,
};
use crate::render::{RenderError, RenderResult};
use ash::extensions::khr;
use ash::{vk, Device, Instance};
use std::fmt;

/// Device features requested by the engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceOptions {
    /// Upper bound on the MSAA sample count
    pub msaa_samples: u32,
    /// Load the push descriptor extension functions
    pub push_descriptors: bool,
}

impl From<&EngineConfig> for DeviceOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            msaa_samples: config.msaa_samples,
            push_descriptors: config.push_descriptors,
        }
    }
}

/// Vulkan device the render core records into
///
/// Buffers are host visible and coherent so uniform uploads are plain
/// memory copies. Push descriptors are used only when the extension was
/// enabled on the logical device.
pub struct VulkanDevice {
    device: Device,
    physical_device: vk::PhysicalDevice,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    msaa_samples: vk::SampleCountFlags,
    push_descriptor: Option<khr::PushDescriptor>,
}

impl VulkanDevice {
    /// Wrap a logical device
    ///
    /// `requested_samples` is clamped to what the device supports for both
    /// colour and depth targets.
    pub fn new(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        device: Device,
        requested_samples: u32,
        push_descriptors: bool,
    ) -> Self {
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let supported = properties.limits.framebuffer_color_sample_counts
            & properties.limits.framebuffer_depth_sample_counts;
        let msaa_samples = max_sample_count(supported, requested_samples);
        let push_descriptor = push_descriptors.then(|| khr::PushDescriptor::new(instance, &device));

        log::info!(
            "Vulkan device ready: {:?} samples, push descriptors {}",
            msaa_samples,
            if push_descriptor.is_some() { "on" } else { "off" }
        );
        Self {
            device,
            physical_device,
            memory_properties,
            msaa_samples,
            push_descriptor,
        }
    }

    /// Wrap a logical device with the options in `config`
    pub fn from_config(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        device: Device,
        config: &EngineConfig,
    ) -> Self {
        let options = DeviceOptions::from(config);
        Self::new(instance, physical_device, device, options.msaa_samples, options.push_descriptors)
    }

    pub fn raw(&self) -> &Device {
        &self.device
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn supports_push_descriptors(&self) -> bool {
        self.push_descriptor.is_some()
    }

    fn find_memory_type(&self, type_filter: u32, properties: vk::MemoryPropertyFlags) -> RenderResult<u32> {
        (0..self.memory_properties.memory_type_count)
            .find(|&i| {
                type_filter & (1 << i) != 0
                    && self.memory_properties.memory_types[i as usize]
                        .property_flags
                        .contains(properties)
            })
            .ok_or(RenderError::NoSuitableMemoryType)
    }

    fn allocate(
        &self,
        requirements: vk::MemoryRequirements,
        properties: vk::MemoryPropertyFlags,
    ) -> RenderResult<vk::DeviceMemory> {
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(self.find_memory_type(requirements.memory_type_bits, properties)?);
        Ok(unsafe { self.device.allocate_memory(&alloc_info, None)? })
    }

    fn create_image_handles(&self, desc: &ImageDesc, out: &mut ImageAllocation) -> RenderResult<()> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(desc.format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(desc.usage)
            .samples(desc.samples)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        out.image = unsafe { self.device.create_image(&image_info, None)? };

        let requirements = unsafe { self.device.get_image_memory_requirements(out.image) };
        out.memory = self.allocate(requirements, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;
        unsafe { self.device.bind_image_memory(out.image, out.memory, 0)? };

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(out.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(desc.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: desc.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        out.view = unsafe { self.device.create_image_view(&view_info, None)? };

        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(desc.filter)
            .min_filter(desc.filter)
            .address_mode_u(desc.address_mode)
            .address_mode_v(desc.address_mode)
            .address_mode_w(desc.address_mode)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .max_lod(1.0);
        out.sampler = unsafe { self.device.create_sampler(&sampler_info, None)? };
        Ok(())
    }

    fn create_buffer_handles(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        out: &mut BufferAllocation,
    ) -> RenderResult<()> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        out.buffer = unsafe { self.device.create_buffer(&buffer_info, None)? };

        let requirements = unsafe { self.device.get_buffer_memory_requirements(out.buffer) };
        out.memory = self.allocate(
            requirements,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        unsafe { self.device.bind_buffer_memory(out.buffer, out.memory, 0)? };
        Ok(())
    }
}

/// Largest supported sample count not above `requested`
fn max_sample_count(supported: vk::SampleCountFlags, requested: u32) -> vk::SampleCountFlags {
    [
        vk::SampleCountFlags::TYPE_64,
        vk::SampleCountFlags::TYPE_32,
        vk::SampleCountFlags::TYPE_16,
        vk::SampleCountFlags::TYPE_8,
        vk::SampleCountFlags::TYPE_4,
        vk::SampleCountFlags::TYPE_2,
    ]
    .into_iter()
    .find(|&count| count.as_raw() <= requested && supported.contains(count))
    .unwrap_or(vk::SampleCountFlags::TYPE_1)
}

/// Raw writes for `set`; the returned structs point into `writes`
fn raw_writes(set: vk::DescriptorSet, writes: &[WriteDescriptor]) -> Vec<vk::WriteDescriptorSet> {
    writes
        .iter()
        .map(|write| {
            let builder = vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(write.binding)
                .dst_array_element(0)
                .descriptor_type(write.descriptor_type);
            match &write.info {
                DescriptorInfo::Buffer(info) => builder.buffer_info(std::slice::from_ref(info)).build(),
                DescriptorInfo::Image(info) => builder.image_info(std::slice::from_ref(info)).build(),
            }
        })
        .collect()
}

impl GraphicsDevice for VulkanDevice {
    fn msaa_samples(&self) -> vk::SampleCountFlags {
        self.msaa_samples
    }

    fn create_image(&self, desc: &ImageDesc) -> RenderResult<ImageAllocation> {
        let mut allocation = ImageAllocation::default();
        if let Err(error) = self.create_image_handles(desc, &mut allocation) {
            self.destroy_image(&allocation);
            return Err(error);
        }
        Ok(allocation)
    }

    fn destroy_image(&self, image: &ImageAllocation) {
        unsafe {
            if image.sampler != vk::Sampler::null() {
                self.device.destroy_sampler(image.sampler, None);
            }
            if image.view != vk::ImageView::null() {
                self.device.destroy_image_view(image.view, None);
            }
            if image.image != vk::Image::null() {
                self.device.destroy_image(image.image, None);
            }
            if image.memory != vk::DeviceMemory::null() {
                self.device.free_memory(image.memory, None);
            }
        }
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> RenderResult<vk::RenderPass> {
        let subpasses: Vec<vk::SubpassDescription> = desc
            .subpasses
            .iter()
            .map(|subpass| {
                let builder = vk::SubpassDescription::builder()
                    .pipeline_bind_point(subpass.bind_point)
                    .color_attachments(&subpass.color_attachments);
                match &subpass.depth_attachment {
                    Some(depth) => builder.depth_stencil_attachment(depth).build(),
                    None => builder.build(),
                }
            })
            .collect();
        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&desc.attachments)
            .subpasses(&subpasses)
            .dependencies(&desc.dependencies);
        Ok(unsafe { self.device.create_render_pass(&create_info, None)? })
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(render_pass, None) };
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RenderResult<vk::Framebuffer> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        Ok(unsafe { self.device.create_framebuffer(&create_info, None)? })
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) };
    }

    fn create_buffer(&self, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> RenderResult<BufferAllocation> {
        let mut allocation = BufferAllocation {
            size,
            ..BufferAllocation::default()
        };
        if let Err(error) = self.create_buffer_handles(size, usage, &mut allocation) {
            self.destroy_buffer(&allocation);
            return Err(error);
        }
        Ok(allocation)
    }

    fn write_buffer(&self, buffer: &BufferAllocation, offset: vk::DeviceSize, data: &[u8]) -> RenderResult<()> {
        if offset + data.len() as vk::DeviceSize > buffer.size {
            return Err(RenderError::InvalidOperation {
                reason: format!(
                    "write of {} bytes at {} overflows buffer of {} bytes",
                    data.len(),
                    offset,
                    buffer.size
                ),
            });
        }
        unsafe {
            let ptr = self.device.map_memory(
                buffer.memory,
                offset,
                data.len() as vk::DeviceSize,
                vk::MemoryMapFlags::empty(),
            )?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.cast::<u8>(), data.len());
            self.device.unmap_memory(buffer.memory);
        }
        Ok(())
    }

    fn destroy_buffer(&self, buffer: &BufferAllocation) {
        unsafe {
            if buffer.buffer != vk::Buffer::null() {
                self.device.destroy_buffer(buffer.buffer, None);
            }
            if buffer.memory != vk::DeviceMemory::null() {
                self.device.free_memory(buffer.memory, None);
            }
        }
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> RenderResult<vk::DescriptorSet> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info)? };
        sets.into_iter()
            .next()
            .ok_or_else(|| RenderError::ResourceCreationFailed("descriptor set allocation returned nothing".into()))
    }

    fn free_descriptor_set(&self, pool: vk::DescriptorPool, set: vk::DescriptorSet) {
        if let Err(error) = unsafe { self.device.free_descriptor_sets(pool, &[set]) } {
            log::error!("Failed to free descriptor set: {:?}", error);
        }
    }

    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[WriteDescriptor]) {
        let raw = raw_writes(set, writes);
        unsafe { self.device.update_descriptor_sets(&raw, &[]) };
    }

    fn cmd_begin_render_pass(&self, cmd: vk::CommandBuffer, begin: &RenderPassBegin<'_>) {
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(begin.render_pass)
            .framebuffer(begin.framebuffer)
            .render_area(begin.area)
            .clear_values(begin.clear_values);
        unsafe {
            self.device
                .cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE)
        };
    }

    fn cmd_next_subpass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.cmd_next_subpass(cmd, vk::SubpassContents::INLINE) };
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(cmd) };
    }

    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, area: vk::Rect2D) {
        let viewport = vk::Viewport {
            x: area.offset.x as f32,
            y: area.offset.y as f32,
            width: area.extent.width as f32,
            height: area.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        unsafe {
            self.device.cmd_set_viewport(cmd, 0, &[viewport]);
            self.device.cmd_set_scissor(cmd, 0, &[area]);
        }
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        unsafe { self.device.cmd_bind_pipeline(cmd, bind_point, pipeline) };
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        unsafe {
            self.device
                .cmd_bind_descriptor_sets(cmd, bind_point, layout, 0, &[set], &[])
        };
    }

    fn cmd_push_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        writes: &[WriteDescriptor],
    ) {
        let Some(push_descriptor) = &self.push_descriptor else {
            log::error!("Push descriptors requested but the extension is not enabled");
            return;
        };
        let raw = raw_writes(vk::DescriptorSet::null(), writes);
        unsafe { push_descriptor.cmd_push_descriptor_set(cmd, bind_point, layout, 0, &raw) };
    }

    fn cmd_push_constants(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe { self.device.cmd_push_constants(cmd, layout, stages, offset, data) };
    }

    fn cmd_bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        unsafe { self.device.cmd_bind_vertex_buffers(cmd, 0, &[buffer], &[0]) };
    }

    fn cmd_bind_index_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer, index_type: vk::IndexType) {
        unsafe { self.device.cmd_bind_index_buffer(cmd, buffer, 0, index_type) };
    }

    fn cmd_draw(&self, cmd: vk::CommandBuffer, vertex_count: u32, instance_count: u32) {
        unsafe { self.device.cmd_draw(cmd, vertex_count, instance_count, 0, 0) };
    }

    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32, instance_count: u32) {
        unsafe { self.device.cmd_draw_indexed(cmd, index_count, instance_count, 0, 0, 0) };
    }

    fn cmd_dispatch(&self, cmd: vk::CommandBuffer, groups: [u32; 3]) {
        unsafe { self.device.cmd_dispatch(cmd, groups[0], groups[1], groups[2]) };
    }

    fn wait_idle(&self) -> RenderResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl fmt::Debug for VulkanDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanDevice")
            .field("physical_device", &self.physical_device)
            .field("msaa_samples", &self.msaa_samples)
            .field("push_descriptors", &self.push_descriptor.is_some())
            .finish()
    }
}
