//! Recording device for tests
//!
//! Hands out fresh fake handles and logs every call so tests can assert
//! on what the render core asked the GPU to do.

use super::device::{
    BufferAllocation, GraphicsDevice, ImageAllocation, ImageDesc, RenderPassBegin, RenderPassDesc, Swapchain,
    WriteDescriptor,
};
use super::pipeline::PipelineHandles;
use super::shader::{Shader, StageReflection};
use super::{RenderError, RenderResult};
use ash::vk::{self, Handle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum Call {
    CreateImage { extent: vk::Extent2D, format: vk::Format, samples: vk::SampleCountFlags },
    DestroyImage(vk::ImageView),
    CreateRenderPass(RenderPassDesc),
    DestroyRenderPass(vk::RenderPass),
    CreateFramebuffer { attachments: Vec<vk::ImageView>, extent: vk::Extent2D },
    DestroyFramebuffer(vk::Framebuffer),
    CreateBuffer { size: vk::DeviceSize, usage: vk::BufferUsageFlags },
    WriteBuffer { buffer: vk::Buffer, offset: vk::DeviceSize, data: Vec<u8> },
    DestroyBuffer(vk::Buffer),
    AllocateSet(vk::DescriptorSet),
    FreeSet(vk::DescriptorSet),
    UpdateSet { set: vk::DescriptorSet, writes: Vec<WriteDescriptor> },
    BeginRenderPass { render_pass: vk::RenderPass, framebuffer: vk::Framebuffer, clear_count: usize },
    NextSubpass,
    EndRenderPass,
    SetViewport(vk::Rect2D),
    BindPipeline(vk::Pipeline),
    BindSet(vk::DescriptorSet),
    PushSet(Vec<WriteDescriptor>),
    PushConstants { stages: vk::ShaderStageFlags, data: Vec<u8> },
    BindVertexBuffer(vk::Buffer),
    BindIndexBuffer(vk::Buffer),
    Draw { vertices: u32 },
    DrawIndexed { indices: u32 },
    Dispatch([u32; 3]),
}

#[derive(Debug)]
pub struct TestDevice {
    calls: Mutex<Vec<Call>>,
    next_handle: AtomicU64,
    samples: vk::SampleCountFlags,
    fail_images: AtomicBool,
}

impl TestDevice {
    pub fn new() -> Arc<Self> {
        Self::with_samples(vk::SampleCountFlags::TYPE_4)
    }

    pub fn with_samples(samples: vk::SampleCountFlags) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            next_handle: AtomicU64::new(1),
            samples,
            fail_images: AtomicBool::new(false),
        })
    }

    /// Make every later image creation fail
    pub fn fail_images(&self) {
        self.fail_images.store(true, Ordering::SeqCst);
    }

    fn handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| predicate(call)).count()
    }
}

impl GraphicsDevice for TestDevice {
    fn msaa_samples(&self) -> vk::SampleCountFlags {
        self.samples
    }

    fn create_image(&self, desc: &ImageDesc) -> RenderResult<ImageAllocation> {
        if self.fail_images.load(Ordering::SeqCst) {
            return Err(RenderError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        self.record(Call::CreateImage { extent: desc.extent, format: desc.format, samples: desc.samples });
        Ok(ImageAllocation {
            image: vk::Image::from_raw(self.handle()),
            memory: vk::DeviceMemory::from_raw(self.handle()),
            view: vk::ImageView::from_raw(self.handle()),
            sampler: vk::Sampler::from_raw(self.handle()),
        })
    }

    fn destroy_image(&self, image: &ImageAllocation) {
        self.record(Call::DestroyImage(image.view));
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> RenderResult<vk::RenderPass> {
        self.record(Call::CreateRenderPass(desc.clone()));
        Ok(vk::RenderPass::from_raw(self.handle()))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.record(Call::DestroyRenderPass(render_pass));
    }

    fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RenderResult<vk::Framebuffer> {
        self.record(Call::CreateFramebuffer { attachments: attachments.to_vec(), extent });
        Ok(vk::Framebuffer::from_raw(self.handle()))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.record(Call::DestroyFramebuffer(framebuffer));
    }

    fn create_buffer(&self, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> RenderResult<BufferAllocation> {
        self.record(Call::CreateBuffer { size, usage });
        Ok(BufferAllocation {
            buffer: vk::Buffer::from_raw(self.handle()),
            memory: vk::DeviceMemory::from_raw(self.handle()),
            size,
        })
    }

    fn write_buffer(&self, buffer: &BufferAllocation, offset: vk::DeviceSize, data: &[u8]) -> RenderResult<()> {
        self.record(Call::WriteBuffer { buffer: buffer.buffer, offset, data: data.to_vec() });
        Ok(())
    }

    fn destroy_buffer(&self, buffer: &BufferAllocation) {
        self.record(Call::DestroyBuffer(buffer.buffer));
    }

    fn allocate_descriptor_set(
        &self,
        _pool: vk::DescriptorPool,
        _layout: vk::DescriptorSetLayout,
    ) -> RenderResult<vk::DescriptorSet> {
        let set = vk::DescriptorSet::from_raw(self.handle());
        self.record(Call::AllocateSet(set));
        Ok(set)
    }

    fn free_descriptor_set(&self, _pool: vk::DescriptorPool, set: vk::DescriptorSet) {
        self.record(Call::FreeSet(set));
    }

    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[WriteDescriptor]) {
        self.record(Call::UpdateSet { set, writes: writes.to_vec() });
    }

    fn cmd_begin_render_pass(&self, _cmd: vk::CommandBuffer, begin: &RenderPassBegin<'_>) {
        self.record(Call::BeginRenderPass {
            render_pass: begin.render_pass,
            framebuffer: begin.framebuffer,
            clear_count: begin.clear_values.len(),
        });
    }

    fn cmd_next_subpass(&self, _cmd: vk::CommandBuffer) {
        self.record(Call::NextSubpass);
    }

    fn cmd_end_render_pass(&self, _cmd: vk::CommandBuffer) {
        self.record(Call::EndRenderPass);
    }

    fn cmd_set_viewport(&self, _cmd: vk::CommandBuffer, area: vk::Rect2D) {
        self.record(Call::SetViewport(area));
    }

    fn cmd_bind_pipeline(&self, _cmd: vk::CommandBuffer, _bind_point: vk::PipelineBindPoint, pipeline: vk::Pipeline) {
        self.record(Call::BindPipeline(pipeline));
    }

    fn cmd_bind_descriptor_set(
        &self,
        _cmd: vk::CommandBuffer,
        _bind_point: vk::PipelineBindPoint,
        _layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        self.record(Call::BindSet(set));
    }

    fn cmd_push_descriptor_set(
        &self,
        _cmd: vk::CommandBuffer,
        _bind_point: vk::PipelineBindPoint,
        _layout: vk::PipelineLayout,
        writes: &[WriteDescriptor],
    ) {
        self.record(Call::PushSet(writes.to_vec()));
    }

    fn cmd_push_constants(
        &self,
        _cmd: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        _offset: u32,
        data: &[u8],
    ) {
        self.record(Call::PushConstants { stages, data: data.to_vec() });
    }

    fn cmd_bind_vertex_buffer(&self, _cmd: vk::CommandBuffer, buffer: vk::Buffer) {
        self.record(Call::BindVertexBuffer(buffer));
    }

    fn cmd_bind_index_buffer(&self, _cmd: vk::CommandBuffer, buffer: vk::Buffer, _index_type: vk::IndexType) {
        self.record(Call::BindIndexBuffer(buffer));
    }

    fn cmd_draw(&self, _cmd: vk::CommandBuffer, vertex_count: u32, _instance_count: u32) {
        self.record(Call::Draw { vertices: vertex_count });
    }

    fn cmd_draw_indexed(&self, _cmd: vk::CommandBuffer, index_count: u32, _instance_count: u32) {
        self.record(Call::DrawIndexed { indices: index_count });
    }

    fn cmd_dispatch(&self, _cmd: vk::CommandBuffer, groups: [u32; 3]) {
        self.record(Call::Dispatch(groups));
    }

    fn wait_idle(&self) -> RenderResult<()> {
        Ok(())
    }
}

/// Fixed-size swapchain with fake views
#[derive(Debug, Clone)]
pub struct TestSwapchain {
    pub extent: vk::Extent2D,
    pub views: Vec<vk::ImageView>,
    pub active: usize,
}

impl TestSwapchain {
    pub fn new(width: u32, height: u32, images: u64) -> Self {
        Self {
            extent: vk::Extent2D { width, height },
            views: (0..images).map(|i| vk::ImageView::from_raw(0xF000 + i)).collect(),
            active: 0,
        }
    }
}

impl Swapchain for TestSwapchain {
    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn format(&self) -> vk::Format {
        vk::Format::B8G8R8A8_SRGB
    }

    fn image_views(&self) -> &[vk::ImageView] {
        &self.views
    }

    fn active_image_index(&self) -> usize {
        self.active
    }
}

/// Shader with a scene block, an object block, a push block and samplers
pub fn mesh_shader(name: &str) -> Arc<Shader> {
    let vertex = StageReflection::from_json(
        r#"{
            "uniform_blocks": {
                "UniformScene": {
                    "binding": 0, "size": 160, "type": "uniform",
                    "uniforms": {
                        "projection": { "offset": 0, "size": 64, "type": "mat4" },
                        "view": { "offset": 64, "size": 64, "type": "mat4" },
                        "cameraPos": { "offset": 128, "size": 16, "type": "vec4" },
                        "lightsCount": { "offset": 144, "size": 4, "type": "uint" }
                    }
                },
                "UniformObject": {
                    "binding": 1, "size": 96, "type": "uniform",
                    "uniforms": {
                        "transform": { "offset": 0, "size": 64, "type": "mat4" },
                        "baseColour": { "offset": 64, "size": 16, "type": "vec4" },
                        "metallic": { "offset": 80, "size": 4, "type": "float" },
                        "roughness": { "offset": 84, "size": 4, "type": "float" }
                    }
                },
                "PushObject": {
                    "binding": 0, "size": 80, "type": "push",
                    "uniforms": {
                        "mvp": { "offset": 0, "size": 64, "type": "mat4" },
                        "bias": { "offset": 64, "size": 4, "type": "float" }
                    }
                },
                "BufferLights": {
                    "binding": 3, "size": 256, "type": "storage",
                    "uniforms": {
                        "lights": { "offset": 0, "size": 256, "type": "vec4" }
                    }
                }
            },
            "attributes": {
                "inPosition": { "location": 0, "size": 12, "type": "vec3" }
            }
        }"#,
    )
    .unwrap();
    let fragment = StageReflection::from_json(
        r#"{
            "uniform_blocks": {
                "UniformScene": { "binding": 0, "size": 160, "type": "uniform" }
            },
            "uniforms": {
                "samplerDiffuse": { "binding": 2, "type": "sampler2d" },
                "samplerColour": { "binding": 4, "type": "sampler2d" },
                "writeColour": { "binding": 5, "type": "image2d" },
                "samplerPosition": { "binding": 6, "type": "sampler2d" },
                "samplerNormal": { "binding": 7, "type": "sampler2d" },
                "samplerBrdf": { "binding": 8, "type": "sampler2d" }
            }
        }"#,
    )
    .unwrap();
    Arc::new(Shader::from_stages(
        name,
        [(vk::ShaderStageFlags::VERTEX, vertex), (vk::ShaderStageFlags::FRAGMENT, fragment)],
    ))
}

/// Pipeline handles around [`mesh_shader`]
pub fn pipeline(name: &str, push_descriptors: bool) -> PipelineHandles {
    PipelineHandles {
        push_descriptors,
        pool: vk::DescriptorPool::from_raw(0xA000),
        set_layout: vk::DescriptorSetLayout::from_raw(0xA001),
        layout: vk::PipelineLayout::from_raw(0xA002),
        pipeline: vk::Pipeline::from_raw(0xA003),
        ..PipelineHandles::graphics(mesh_shader(name))
    }
}
