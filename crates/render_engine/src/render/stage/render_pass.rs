//! Render pass derived from a stage's attachments and subpasses
//!
//! Attachments are cleared on load and stored so later subpasses and
//! filters can read them. Subpass `i` depends on subpass `i - 1` (subpass
//! 0 on the external scope before the pass) with a colour-output to
//! fragment-read barrier, and a final dependency makes the last subpass's
//! writes visible to whatever samples them after the pass.

use super::{AttachmentType, RenderStage};
use crate::render::device::{GraphicsDevice, RenderPassDesc, SubpassDesc};
use crate::render::RenderResult;
use ash::vk;
use std::sync::Arc;

/// Render pass owned through the device
#[derive(Debug)]
pub struct RenderPass {
    device: Arc<dyn GraphicsDevice>,
    render_pass: vk::RenderPass,
    surface_format: vk::Format,
}

impl RenderPass {
    /// Describe and create the pass for `stage`
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        stage: &RenderStage,
        surface_format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> RenderResult<Self> {
        let desc = Self::describe(stage, surface_format, samples);
        let render_pass = device.create_render_pass(&desc)?;
        log::debug!(
            "Created render pass {:?}: {} attachments, {} subpasses",
            render_pass,
            desc.attachments.len(),
            desc.subpasses.len()
        );
        Ok(Self {
            device,
            render_pass,
            surface_format,
        })
    }

    /// Build the pass description for `stage` without creating anything
    pub fn describe(stage: &RenderStage, surface_format: vk::Format, samples: vk::SampleCountFlags) -> RenderPassDesc {
        let attachments = stage
            .attachments()
            .iter()
            .map(|attachment| {
                let (format, final_layout) = match attachment.ty() {
                    AttachmentType::Image => (attachment.format(), vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
                    AttachmentType::Depth => (attachment.format(), vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
                    AttachmentType::Swapchain => (surface_format, vk::ImageLayout::PRESENT_SRC_KHR),
                };
                let samples = if attachment.is_multisampled() {
                    samples
                } else {
                    vk::SampleCountFlags::TYPE_1
                };
                vk::AttachmentDescription::builder()
                    .format(format)
                    .samples(samples)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(final_layout)
                    .build()
            })
            .collect();

        let subpasses = stage
            .subpasses()
            .iter()
            .map(|subpass| {
                let mut desc = SubpassDesc {
                    bind_point: vk::PipelineBindPoint::GRAPHICS,
                    ..SubpassDesc::default()
                };
                for &binding in subpass.attachment_bindings() {
                    let Some(attachment) = stage.attachment(binding) else {
                        continue;
                    };
                    match attachment.ty() {
                        AttachmentType::Depth => {
                            desc.depth_attachment = Some(
                                vk::AttachmentReference::builder()
                                    .attachment(binding)
                                    .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                                    .build(),
                            );
                        }
                        AttachmentType::Image | AttachmentType::Swapchain => {
                            desc.color_attachments.push(
                                vk::AttachmentReference::builder()
                                    .attachment(binding)
                                    .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                                    .build(),
                            );
                        }
                    }
                }
                desc
            })
            .collect();

        RenderPassDesc {
            attachments,
            subpasses,
            dependencies: Self::dependencies(stage.subpasses().len(), stage.depth_attachment().is_some()),
        }
    }

    /// Dependency chain for `count` subpasses: `count + 1` entries
    pub fn dependencies(count: usize, has_depth: bool) -> Vec<vk::SubpassDependency> {
        let mut dependencies = Vec::with_capacity(count + 1);

        for index in 0..count {
            let dst_subpass = index as u32;
            let dependency = if index == 0 {
                let mut dst_stage = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
                let mut dst_access =
                    vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
                if has_depth {
                    dst_stage |= vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
                    dst_access |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
                }
                vk::SubpassDependency::builder()
                    .src_subpass(vk::SUBPASS_EXTERNAL)
                    .dst_subpass(dst_subpass)
                    .src_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
                    .dst_stage_mask(dst_stage)
                    .src_access_mask(vk::AccessFlags::MEMORY_READ)
                    .dst_access_mask(dst_access)
                    .dependency_flags(vk::DependencyFlags::BY_REGION)
                    .build()
            } else {
                vk::SubpassDependency::builder()
                    .src_subpass(dst_subpass - 1)
                    .dst_subpass(dst_subpass)
                    .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
                    .dst_stage_mask(vk::PipelineStageFlags::FRAGMENT_SHADER)
                    .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
                    .dst_access_mask(vk::AccessFlags::SHADER_READ)
                    .dependency_flags(vk::DependencyFlags::BY_REGION)
                    .build()
            };
            dependencies.push(dependency);
        }

        if count > 0 {
            dependencies.push(
                vk::SubpassDependency::builder()
                    .src_subpass(count as u32 - 1)
                    .dst_subpass(vk::SUBPASS_EXTERNAL)
                    .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
                    .dst_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
                    .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
                    .dst_access_mask(vk::AccessFlags::MEMORY_READ)
                    .dependency_flags(vk::DependencyFlags::BY_REGION)
                    .build(),
            );
        }

        dependencies
    }

    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Surface format the pass was created for
    pub fn surface_format(&self) -> vk::Format {
        self.surface_format
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        self.device.destroy_render_pass(self.render_pass);
    }
}
