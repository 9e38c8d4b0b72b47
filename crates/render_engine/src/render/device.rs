//! Native graphics interface
//!
//! The render core never talks to a driver directly. Every allocation,
//! descriptor write and command goes through [`GraphicsDevice`], which
//! takes raw `ash::vk` handles so the calls map one-to-one onto Vulkan.
//! Resources keep an `Arc<dyn GraphicsDevice>` and release themselves on
//! drop.

use super::RenderResult;
use ash::vk;
use std::fmt::Debug;

/// Parameters for a 2D image with view and sampler
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc {
    /// Size in pixels
    pub extent: vk::Extent2D,
    /// Texel format
    pub format: vk::Format,
    /// Usage flags
    pub usage: vk::ImageUsageFlags,
    /// Sample count
    pub samples: vk::SampleCountFlags,
    /// View aspect
    pub aspect: vk::ImageAspectFlags,
    /// Layout the image is in when read through a descriptor
    pub layout: vk::ImageLayout,
    /// Sampler filter
    pub filter: vk::Filter,
    /// Sampler address mode
    pub address_mode: vk::SamplerAddressMode,
}

impl ImageDesc {
    /// Colour render target that later stages may sample or write
    pub fn color_attachment(extent: vk::Extent2D, format: vk::Format, samples: vk::SampleCountFlags) -> Self {
        Self {
            extent,
            format,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
            samples,
            aspect: vk::ImageAspectFlags::COLOR,
            layout: vk::ImageLayout::GENERAL,
            filter: vk::Filter::LINEAR,
            address_mode: vk::SamplerAddressMode::CLAMP_TO_EDGE,
        }
    }

    /// Depth/stencil target, sampleable for shadow lookups
    pub fn depth_attachment(extent: vk::Extent2D, format: vk::Format, samples: vk::SampleCountFlags) -> Self {
        Self {
            extent,
            format,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            samples,
            aspect: vk::ImageAspectFlags::DEPTH,
            layout: vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            filter: vk::Filter::LINEAR,
            address_mode: vk::SamplerAddressMode::CLAMP_TO_EDGE,
        }
    }
}

/// Handles backing one image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageAllocation {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub sampler: vk::Sampler,
}

/// Handles backing one host-visible buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferAllocation {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

/// One subpass of a render pass description
#[derive(Debug, Clone, Default)]
pub struct SubpassDesc {
    pub bind_point: vk::PipelineBindPoint,
    pub color_attachments: Vec<vk::AttachmentReference>,
    pub depth_attachment: Option<vk::AttachmentReference>,
}

/// Everything needed to create a render pass
///
/// Kept as owned data so callers can inspect it before it reaches the
/// driver.
#[derive(Debug, Clone, Default)]
pub struct RenderPassDesc {
    pub attachments: Vec<vk::AttachmentDescription>,
    pub subpasses: Vec<SubpassDesc>,
    pub dependencies: Vec<vk::SubpassDependency>,
}

/// Payload of a descriptor write
#[derive(Debug, Clone, Copy)]
pub enum DescriptorInfo {
    Buffer(vk::DescriptorBufferInfo),
    Image(vk::DescriptorImageInfo),
}

/// A single descriptor write; the set is supplied by the call
#[derive(Debug, Clone, Copy)]
pub struct WriteDescriptor {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub info: DescriptorInfo,
}

/// Arguments to begin a render pass
#[derive(Clone, Copy)]
pub struct RenderPassBegin<'a> {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub area: vk::Rect2D,
    pub clear_values: &'a [vk::ClearValue],
}

/// GPU calls the render core depends on
pub trait GraphicsDevice: Send + Sync + Debug {
    /// Sample count applied to attachments flagged as multisampled
    fn msaa_samples(&self) -> vk::SampleCountFlags;

    /// Create an image with memory, view and sampler
    fn create_image(&self, desc: &ImageDesc) -> RenderResult<ImageAllocation>;

    fn destroy_image(&self, image: &ImageAllocation);

    fn create_render_pass(&self, desc: &RenderPassDesc) -> RenderResult<vk::RenderPass>;

    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    /// Create a single-layer framebuffer
    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RenderResult<vk::Framebuffer>;

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    /// Create a host-visible buffer
    fn create_buffer(&self, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> RenderResult<BufferAllocation>;

    /// Copy `data` into the buffer at `offset`
    fn write_buffer(&self, buffer: &BufferAllocation, offset: vk::DeviceSize, data: &[u8]) -> RenderResult<()>;

    fn destroy_buffer(&self, buffer: &BufferAllocation);

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> RenderResult<vk::DescriptorSet>;

    fn free_descriptor_set(&self, pool: vk::DescriptorPool, set: vk::DescriptorSet);

    /// Apply writes to a persistent set
    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[WriteDescriptor]);

    fn cmd_begin_render_pass(&self, cmd: vk::CommandBuffer, begin: &RenderPassBegin<'_>);

    fn cmd_next_subpass(&self, cmd: vk::CommandBuffer);

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer);

    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, area: vk::Rect2D);

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline);

    fn cmd_bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    );

    /// Record descriptor writes directly into the command buffer
    fn cmd_push_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        writes: &[WriteDescriptor],
    );

    fn cmd_push_constants(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    );

    fn cmd_bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer);

    fn cmd_bind_index_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer, index_type: vk::IndexType);

    fn cmd_draw(&self, cmd: vk::CommandBuffer, vertex_count: u32, instance_count: u32);

    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32, instance_count: u32);

    fn cmd_dispatch(&self, cmd: vk::CommandBuffer, groups: [u32; 3]);

    /// Block until the device has finished all submitted work
    fn wait_idle(&self) -> RenderResult<()>;
}

/// Presentation surface the last stage renders into
pub trait Swapchain {
    /// Current surface size
    fn extent(&self) -> vk::Extent2D;

    /// Surface format
    fn format(&self) -> vk::Format;

    /// One view per swapchain image
    fn image_views(&self) -> &[vk::ImageView];

    /// Index of the image acquired for this frame
    fn active_image_index(&self) -> usize;
}
