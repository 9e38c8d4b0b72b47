//! Render stage state and rebuild protocol
//!
//! A stage starts declared, with no GPU objects. [`RenderStage::rebuild`]
//! creates the depth image, render pass and framebuffers for the current
//! render area. [`RenderStage::update`] recomputes the area every frame and
//! marks the stage out of date when it changed; the stage then stays out
//! of date until the next rebuild.

use super::{Attachment, AttachmentType, Framebuffers, Image2d, RenderArea, RenderPass, SubpassType, Viewport};
use crate::render::descriptor::Descriptor;
use crate::render::device::{GraphicsDevice, ImageDesc, Swapchain};
use crate::render::{RenderError, RenderResult};
use ash::vk;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
enum AttachmentSource {
    Depth,
    Image(u32),
}

/// Attachments, subpasses and the GPU objects derived from them
#[derive(Debug)]
pub struct RenderStage {
    attachments: Vec<Attachment>,
    subpasses: Vec<SubpassType>,
    viewport: Viewport,

    subpass_attachment_count: Vec<u32>,
    subpass_multisampled: Vec<bool>,
    depth_attachment: Option<usize>,
    swapchain_attachment: Option<usize>,

    render_area: RenderArea,
    built: bool,
    out_of_date: bool,

    render_pass: Option<RenderPass>,
    depth_stencil: Option<Image2d>,
    framebuffers: Option<Framebuffers>,
    descriptors: HashMap<String, AttachmentSource>,
}

impl RenderStage {
    /// Declare a stage
    ///
    /// Attachment bindings must run `0..n` in declaration order, subpass
    /// bindings likewise, and every binding a subpass lists must exist.
    /// At most one depth and one swapchain attachment are allowed.
    pub fn new(attachments: Vec<Attachment>, subpasses: Vec<SubpassType>, viewport: Viewport) -> RenderResult<Self> {
        let mut depth_attachment = None;
        let mut swapchain_attachment = None;

        for (index, attachment) in attachments.iter().enumerate() {
            if attachment.binding() as usize != index {
                return Err(RenderError::InvalidOperation {
                    reason: format!(
                        "attachment '{}' has binding {} at position {}",
                        attachment.name(),
                        attachment.binding(),
                        index
                    ),
                });
            }
            let slot = match attachment.ty() {
                AttachmentType::Depth => &mut depth_attachment,
                AttachmentType::Swapchain => &mut swapchain_attachment,
                AttachmentType::Image => continue,
            };
            if slot.replace(index).is_some() {
                return Err(RenderError::InvalidOperation {
                    reason: format!("more than one {:?} attachment", attachment.ty()),
                });
            }
        }

        let mut subpass_attachment_count = Vec::with_capacity(subpasses.len());
        let mut subpass_multisampled = Vec::with_capacity(subpasses.len());
        for (index, subpass) in subpasses.iter().enumerate() {
            if subpass.binding() as usize != index {
                return Err(RenderError::InvalidOperation {
                    reason: format!("subpass binding {} at position {}", subpass.binding(), index),
                });
            }

            let mut colors = 0;
            let mut multisampled = false;
            for &binding in subpass.attachment_bindings() {
                let attachment = attachments.get(binding as usize).ok_or_else(|| {
                    RenderError::MissingAttachment(format!("binding {} used by subpass {}", binding, index))
                })?;
                if attachment.ty() != AttachmentType::Depth {
                    colors += 1;
                    multisampled |= attachment.is_multisampled();
                }
            }
            subpass_attachment_count.push(colors);
            subpass_multisampled.push(multisampled);
        }

        Ok(Self {
            attachments,
            subpasses,
            viewport,
            subpass_attachment_count,
            subpass_multisampled,
            depth_attachment,
            swapchain_attachment,
            render_area: RenderArea::default(),
            built: false,
            out_of_date: false,
            render_pass: None,
            depth_stencil: None,
            framebuffers: None,
            descriptors: HashMap::new(),
        })
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Attachment declared at `binding`
    pub fn attachment(&self, binding: u32) -> Option<&Attachment> {
        self.attachments.get(binding as usize)
    }

    pub fn subpasses(&self) -> &[SubpassType] {
        &self.subpasses
    }

    pub fn depth_attachment(&self) -> Option<&Attachment> {
        self.depth_attachment.map(|index| &self.attachments[index])
    }

    pub fn swapchain_attachment(&self) -> Option<&Attachment> {
        self.swapchain_attachment.map(|index| &self.attachments[index])
    }

    pub fn has_swapchain(&self) -> bool {
        self.swapchain_attachment.is_some()
    }

    /// Colour attachments written by `subpass`; the depth attachment is not counted
    pub fn subpass_attachment_count(&self, subpass: u32) -> u32 {
        self.subpass_attachment_count.get(subpass as usize).copied().unwrap_or(0)
    }

    /// Whether any colour attachment of `subpass` is multisampled
    pub fn is_subpass_multisampled(&self, subpass: u32) -> bool {
        self.subpass_multisampled.get(subpass as usize).copied().unwrap_or(false)
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Replace the viewport; takes effect on the next update
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn render_area(&self) -> &RenderArea {
        &self.render_area
    }

    /// Whether GPU objects exist
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Whether the render area changed since the last rebuild
    pub fn is_out_of_date(&self) -> bool {
        self.out_of_date
    }

    /// Whether a rebuild is due before recording
    pub fn needs_rebuild(&self) -> bool {
        !self.built || self.out_of_date
    }

    /// Force a rebuild before the next recording, e.g. after swapchain recreation
    pub fn invalidate(&mut self) {
        self.out_of_date = true;
    }

    /// Recompute the render area for a window of `window` pixels
    pub fn update(&mut self, window: vk::Extent2D) {
        let render_area = self.viewport.render_area(window);
        if render_area != self.render_area {
            self.out_of_date = true;
        }
        self.render_area = render_area;
    }

    /// Recreate every GPU object for the current render area
    ///
    /// The render pass survives rebuilds unless the surface format changed.
    /// On error the stage is left unbuilt.
    pub fn rebuild(&mut self, device: &Arc<dyn GraphicsDevice>, swapchain: &dyn Swapchain) -> RenderResult<()> {
        self.update(swapchain.extent());
        let samples = device.msaa_samples();
        let extent = self.render_area.extent;

        self.built = false;
        self.descriptors.clear();
        // Framebuffers hold views of the depth image.
        self.framebuffers = None;
        self.depth_stencil = None;

        if let Some(depth) = self.depth_attachment() {
            let depth_samples = if depth.is_multisampled() {
                samples
            } else {
                vk::SampleCountFlags::TYPE_1
            };
            let desc = ImageDesc::depth_attachment(extent, depth.format(), depth_samples);
            self.depth_stencil = Some(Image2d::new(Arc::clone(device), desc)?);
        }

        let render_pass = match self.render_pass.take() {
            Some(render_pass) if render_pass.surface_format() == swapchain.format() => render_pass,
            _ => RenderPass::new(Arc::clone(device), self, swapchain.format(), samples)?,
        };
        let framebuffers = Framebuffers::new(
            Arc::clone(device),
            self,
            &render_pass,
            swapchain,
            self.depth_stencil.as_ref(),
            samples,
        );
        self.render_pass = Some(render_pass);
        self.framebuffers = Some(framebuffers?);

        self.built = true;
        self.out_of_date = false;

        self.descriptors = self
            .attachments
            .iter()
            .filter_map(|attachment| {
                let source = match attachment.ty() {
                    AttachmentType::Depth => AttachmentSource::Depth,
                    AttachmentType::Image => AttachmentSource::Image(attachment.binding()),
                    AttachmentType::Swapchain => return None,
                };
                Some((attachment.name().to_owned(), source))
            })
            .collect();

        log::debug!(
            "Rebuilt render stage at {}x{} ({} attachments, {} subpasses)",
            extent.width,
            extent.height,
            self.attachments.len(),
            self.subpasses.len()
        );
        Ok(())
    }

    pub fn render_pass(&self) -> Option<&RenderPass> {
        self.render_pass.as_ref()
    }

    pub fn framebuffers(&self) -> Option<&Framebuffers> {
        self.framebuffers.as_ref()
    }

    pub fn depth_stencil(&self) -> Option<&Image2d> {
        self.depth_stencil.as_ref()
    }

    /// Framebuffer for the swapchain image being recorded
    pub fn active_framebuffer(&self, image_index: usize) -> Option<vk::Framebuffer> {
        self.framebuffers.as_ref()?.framebuffer(image_index)
    }

    /// Attachment image by name, for sampling in later passes
    pub fn get_descriptor(&self, name: &str) -> Option<&dyn Descriptor> {
        match self.descriptors.get(name)? {
            AttachmentSource::Depth => self.depth_stencil.as_ref().map(|image| image as &dyn Descriptor),
            AttachmentSource::Image(binding) => self
                .framebuffers
                .as_ref()?
                .attachment(*binding)
                .map(|image| image as &dyn Descriptor),
        }
    }

    /// One clear value per attachment, in binding order
    pub fn clear_values(&self) -> Vec<vk::ClearValue> {
        self.attachments
            .iter()
            .map(|attachment| match attachment.ty() {
                AttachmentType::Depth => vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
                },
                AttachmentType::Image | AttachmentType::Swapchain => vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: attachment.clear_color(),
                    },
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::{Call, TestDevice, TestSwapchain};

    fn forward_stage() -> RenderStage {
        RenderStage::new(
            vec![
                Attachment::new(0, "depth", AttachmentType::Depth),
                Attachment::new(1, "swapchain", AttachmentType::Swapchain),
                Attachment::new(2, "colour", AttachmentType::Image).with_multisampling(true),
            ],
            vec![SubpassType::new(0, [0, 2]), SubpassType::new(1, [1])],
            Viewport::new(),
        )
        .unwrap()
    }

    fn dyn_device(device: &Arc<TestDevice>) -> Arc<dyn GraphicsDevice> {
        device.clone()
    }

    #[test]
    fn test_subpass_counts_exclude_depth() {
        let stage = forward_stage();
        assert_eq!(stage.subpass_attachment_count(0), 1);
        assert_eq!(stage.subpass_attachment_count(1), 1);
        assert!(stage.is_subpass_multisampled(0));
        assert!(!stage.is_subpass_multisampled(1));
        assert_eq!(stage.subpass_attachment_count(7), 0);
    }

    #[test]
    fn test_declaration_errors() {
        let missing = RenderStage::new(
            vec![Attachment::new(0, "colour", AttachmentType::Image)],
            vec![SubpassType::new(0, [0, 3])],
            Viewport::new(),
        );
        assert!(matches!(missing, Err(RenderError::MissingAttachment(_))));

        let two_depths = RenderStage::new(
            vec![
                Attachment::new(0, "depth", AttachmentType::Depth),
                Attachment::new(1, "shadow", AttachmentType::Depth),
            ],
            vec![],
            Viewport::new(),
        );
        assert!(matches!(two_depths, Err(RenderError::InvalidOperation { .. })));

        let misnumbered = RenderStage::new(
            vec![Attachment::new(4, "colour", AttachmentType::Image)],
            vec![],
            Viewport::new(),
        );
        assert!(misnumbered.is_err());
    }

    #[test]
    fn test_rebuild_creates_objects() {
        let device = TestDevice::new();
        let swapchain = TestSwapchain::new(800, 600, 3);
        let mut stage = forward_stage();
        assert!(stage.needs_rebuild());

        stage.rebuild(&dyn_device(&device), &swapchain).unwrap();
        assert!(stage.is_built());
        assert!(!stage.is_out_of_date());
        assert_eq!(stage.framebuffers().unwrap().len(), 3);
        assert_eq!(device.count(|c| matches!(c, Call::CreateRenderPass(_))), 1);

        let framebuffer_views: Vec<Vec<vk::ImageView>> = device
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateFramebuffer { attachments, extent } => {
                    assert_eq!((extent.width, extent.height), (800, 600));
                    Some(attachments)
                }
                _ => None,
            })
            .collect();
        assert_eq!(framebuffer_views.len(), 3);
        let depth_view = stage.depth_stencil().unwrap().view();
        let colour_view = stage.framebuffers().unwrap().attachment(2).unwrap().view();
        for (index, views) in framebuffer_views.iter().enumerate() {
            assert_eq!(views, &vec![depth_view, swapchain.views[index], colour_view]);
        }

        let multisampled = device.count(|c| {
            matches!(c, Call::CreateImage { samples, .. } if *samples == vk::SampleCountFlags::TYPE_4)
        });
        assert_eq!(multisampled, 1, "only the colour attachment is multisampled");
    }

    #[test]
    fn test_update_tracks_size_changes() {
        let device = dyn_device(&TestDevice::new());
        let mut swapchain = TestSwapchain::new(800, 600, 2);
        let mut stage = forward_stage();
        stage.rebuild(&device, &swapchain).unwrap();

        stage.update(swapchain.extent);
        assert!(!stage.is_out_of_date());
        assert!(!stage.needs_rebuild());

        swapchain.extent = vk::Extent2D { width: 1024, height: 768 };
        stage.update(swapchain.extent);
        assert!(stage.is_out_of_date());
        stage.update(swapchain.extent);
        assert!(stage.is_out_of_date(), "stays out of date until rebuilt");

        stage.rebuild(&device, &swapchain).unwrap();
        assert!(!stage.is_out_of_date());
        assert_eq!(stage.render_area().extent.width, 1024);
    }

    #[test]
    fn test_rebuild_reuses_render_pass_and_releases_old_objects() {
        let device = TestDevice::new();
        let swapchain = TestSwapchain::new(640, 480, 2);
        let mut stage = forward_stage();
        stage.rebuild(&dyn_device(&device), &swapchain).unwrap();
        device.clear();

        stage.rebuild(&dyn_device(&device), &swapchain).unwrap();
        assert_eq!(device.count(|c| matches!(c, Call::CreateRenderPass(_))), 0);
        assert_eq!(device.count(|c| matches!(c, Call::DestroyFramebuffer(_))), 2);
        assert_eq!(device.count(|c| matches!(c, Call::DestroyImage(_))), 2);
        assert_eq!(device.count(|c| matches!(c, Call::CreateFramebuffer { .. })), 2);
    }

    #[test]
    fn test_descriptors_by_name() {
        let device = dyn_device(&TestDevice::new());
        let mut stage = forward_stage();
        assert!(stage.get_descriptor("colour").is_none());

        stage.rebuild(&device, &TestSwapchain::new(320, 240, 1)).unwrap();
        let colour = stage.get_descriptor("colour").unwrap();
        let depth = stage.get_descriptor("depth").unwrap();
        assert_ne!(colour.resource_id(), depth.resource_id());
        assert!(stage.get_descriptor("swapchain").is_none());
        assert!(stage.get_descriptor("missing").is_none());
    }

    #[test]
    fn test_failed_image_creation_is_an_error() {
        let device = TestDevice::new();
        device.fail_images();
        let mut stage = forward_stage();
        let result = stage.rebuild(&dyn_device(&device), &TestSwapchain::new(320, 240, 1));
        assert!(matches!(result, Err(RenderError::Api(_))));
        assert!(!stage.is_built());
    }

    #[test]
    fn test_failed_rebuild_leaves_stage_unbuilt() {
        let device = TestDevice::new();
        let swapchain = TestSwapchain::new(320, 240, 2);
        let mut stage = forward_stage();
        stage.rebuild(&dyn_device(&device), &swapchain).unwrap();
        assert!(stage.is_built());

        device.fail_images();
        assert!(stage.rebuild(&dyn_device(&device), &swapchain).is_err());
        assert!(!stage.is_built());
        assert!(stage.needs_rebuild());
        assert!(stage.render_pass().is_some(), "render pass kept for the next rebuild");
        assert!(stage.framebuffers().is_none());
        assert!(stage.active_framebuffer(0).is_none());
        assert!(stage.get_descriptor("colour").is_none());
        assert!(stage.get_descriptor("depth").is_none());
    }

    #[test]
    fn test_clear_values_follow_attachments() {
        let stage = forward_stage();
        let values = stage.clear_values();
        assert_eq!(values.len(), 3);
        // SAFETY: attachment 0 is the depth attachment.
        let depth = unsafe { values[0].depth_stencil };
        assert_eq!(depth.depth, 1.0);
    }
}
