//! Per-swapchain-image framebuffers for a render stage

use super::{AttachmentType, Image2d, RenderPass, RenderStage};
use crate::render::device::{GraphicsDevice, ImageDesc, Swapchain};
use crate::render::{RenderError, RenderResult};
use ash::vk;
use std::sync::Arc;

/// Backing images and one framebuffer per swapchain image
///
/// Image attachments get their own images sized to the stage's render
/// area; depth attachments share the stage's depth image; swapchain
/// attachments use the view of the image being presented.
#[derive(Debug)]
pub struct Framebuffers {
    device: Arc<dyn GraphicsDevice>,
    images: Vec<Option<Image2d>>,
    framebuffers: Vec<vk::Framebuffer>,
}

impl Framebuffers {
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        stage: &RenderStage,
        render_pass: &RenderPass,
        swapchain: &dyn Swapchain,
        depth: Option<&Image2d>,
        samples: vk::SampleCountFlags,
    ) -> RenderResult<Self> {
        let extent = stage.render_area().extent;
        let mut framebuffers = Self {
            device: Arc::clone(&device),
            images: Vec::with_capacity(stage.attachments().len()),
            framebuffers: Vec::with_capacity(swapchain.image_views().len()),
        };

        for attachment in stage.attachments() {
            let image = match attachment.ty() {
                AttachmentType::Image => {
                    let samples = if attachment.is_multisampled() {
                        samples
                    } else {
                        vk::SampleCountFlags::TYPE_1
                    };
                    let desc = ImageDesc::color_attachment(extent, attachment.format(), samples);
                    Some(Image2d::new(Arc::clone(&device), desc)?)
                }
                AttachmentType::Depth | AttachmentType::Swapchain => None,
            };
            framebuffers.images.push(image);
        }

        for &swapchain_view in swapchain.image_views() {
            let views = stage
                .attachments()
                .iter()
                .zip(&framebuffers.images)
                .map(|(attachment, image)| {
                    let view = match attachment.ty() {
                        AttachmentType::Image => image.as_ref().map(Image2d::view),
                        AttachmentType::Depth => depth.map(Image2d::view),
                        AttachmentType::Swapchain => Some(swapchain_view),
                    };
                    view.ok_or_else(|| RenderError::MissingAttachment(attachment.name().to_owned()))
                })
                .collect::<RenderResult<Vec<_>>>()?;

            let framebuffer = device.create_framebuffer(render_pass.handle(), &views, extent)?;
            framebuffers.framebuffers.push(framebuffer);
        }

        log::debug!(
            "Created {} framebuffers at {}x{}",
            framebuffers.framebuffers.len(),
            extent.width,
            extent.height
        );
        Ok(framebuffers)
    }

    /// Image backing the attachment at `binding`, for image attachments
    pub fn attachment(&self, binding: u32) -> Option<&Image2d> {
        self.images.get(binding as usize)?.as_ref()
    }

    /// Framebuffer for a swapchain image index
    pub fn framebuffer(&self, index: usize) -> Option<vk::Framebuffer> {
        self.framebuffers.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        for &framebuffer in &self.framebuffers {
            self.device.destroy_framebuffer(framebuffer);
        }
    }
}
