//! Frame driver
//!
//! Owns the render stages and records one frame: each stage's render pass
//! is begun on the framebuffer of the acquired swapchain image, its
//! subpasses are recorded in ascending order through the
//! [`RendererContainer`], and the pass is ended before the next stage.

use super::descriptor::Descriptor;
use super::device::{GraphicsDevice, RenderPassBegin, Swapchain};
use super::renderer::{CameraView, RenderContext, RendererContainer};
use super::stage::RenderStage;
use super::{RenderError, RenderResult, StageIndex};
use crate::config::StageScale;
use crate::ecs::World;
use ash::vk;
use std::sync::Arc;

/// Render stages plus the device they are built on
#[derive(Debug)]
pub struct Graphics {
    device: Arc<dyn GraphicsDevice>,
    stages: Vec<RenderStage>,
}

impl Graphics {
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            device,
            stages: Vec::new(),
        }
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// Append a stage; returns its index
    pub fn add_stage(&mut self, stage: RenderStage) -> usize {
        self.stages.push(stage);
        self.stages.len() - 1
    }

    pub fn stages(&self) -> &[RenderStage] {
        &self.stages
    }

    pub fn stage(&self, index: usize) -> Option<&RenderStage> {
        self.stages.get(index)
    }

    pub fn stage_mut(&mut self, index: usize) -> Option<&mut RenderStage> {
        self.stages.get_mut(index)
    }

    /// Attachment image by name, searched across all stages
    pub fn attachment(&self, name: &str) -> Option<&dyn Descriptor> {
        self.stages.iter().find_map(|stage| stage.get_descriptor(name))
    }

    /// Apply configured viewport scales; they take effect on the next prepare
    pub fn apply_stage_scales(&mut self, scales: &[StageScale]) {
        for scale in scales {
            let Some(stage) = self.stages.get_mut(scale.stage) else {
                log::warn!("Scale configured for missing render stage {}", scale.stage);
                continue;
            };
            let viewport = stage.viewport().with_scale(scale.scale[0], scale.scale[1]);
            stage.set_viewport(viewport);
        }
    }

    /// Mark every stage for rebuild after the swapchain was recreated
    pub fn on_swapchain_recreated(&mut self) {
        log::debug!("Swapchain recreated, invalidating {} stages", self.stages.len());
        for stage in &mut self.stages {
            stage.invalidate();
        }
    }

    /// Bring every stage in line with the swapchain size
    ///
    /// Waits for the device to go idle before the first rebuild, since the
    /// old framebuffers may still be in use.
    pub fn prepare(&mut self, swapchain: &dyn Swapchain) -> RenderResult<()> {
        let extent = swapchain.extent();
        let mut idle = false;
        for (index, stage) in self.stages.iter_mut().enumerate() {
            stage.update(extent);
            if !stage.needs_rebuild() {
                continue;
            }
            if !idle {
                self.device.wait_idle()?;
                idle = true;
            }
            log::debug!("Rebuilding render stage {}", index);
            stage.rebuild(&self.device, swapchain)?;
        }
        Ok(())
    }

    /// Record every stage into `cmd`
    ///
    /// Stages must have been prepared for the current swapchain size.
    pub fn record_frame(
        &self,
        cmd: vk::CommandBuffer,
        swapchain: &dyn Swapchain,
        renderers: &mut RendererContainer,
        world: &World,
    ) -> RenderResult<()> {
        let image_index = swapchain.active_image_index();
        for (index, stage) in self.stages.iter().enumerate() {
            let (Some(render_pass), Some(framebuffer)) = (stage.render_pass(), stage.active_framebuffer(image_index))
            else {
                return Err(RenderError::InvalidOperation {
                    reason: format!("render stage {index} recorded before it was built"),
                });
            };
            if stage.is_out_of_date() {
                return Err(RenderError::InvalidOperation {
                    reason: format!("render stage {index} is out of date"),
                });
            }

            let area = stage.render_area();
            let clear_values = stage.clear_values();
            self.device.cmd_begin_render_pass(
                cmd,
                &RenderPassBegin {
                    render_pass: render_pass.handle(),
                    framebuffer,
                    area: area.rect(),
                    clear_values: &clear_values,
                },
            );
            self.device.cmd_set_viewport(cmd, area.rect());

            let camera = CameraView::from_world(world, area.aspect_ratio).unwrap_or_default();
            for (position, subpass) in stage.subpasses().iter().enumerate() {
                if position > 0 {
                    self.device.cmd_next_subpass(cmd);
                }
                let stage_index = StageIndex::new(index, subpass.binding());
                let ctx = RenderContext {
                    device: &self.device,
                    command_buffer: cmd,
                    stage_index,
                    stages: &self.stages,
                    world,
                    camera,
                };
                renderers.render_stage(stage_index, &ctx)?;
            }

            self.device.cmd_end_render_pass(cmd);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::ComponentMask;
    use crate::render::renderer::Renderer;
    use crate::render::stage::{Attachment, AttachmentType, SubpassType, Viewport};
    use crate::render::testing::{Call, TestDevice, TestSwapchain};

    /// Draws `marker` vertices so the call log shows the recording order
    #[derive(Debug)]
    struct Marker {
        stage: StageIndex,
        marker: u32,
    }

    impl Renderer for Marker {
        fn stage(&self) -> StageIndex {
            self.stage
        }

        fn signature(&self) -> Option<ComponentMask> {
            None
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn set_enabled(&mut self, _enabled: bool) {}

        fn render(&mut self, ctx: &RenderContext<'_>) -> RenderResult<()> {
            ctx.device.cmd_draw(ctx.command_buffer, self.marker, 1);
            Ok(())
        }
    }

    fn shadow_stage() -> RenderStage {
        RenderStage::new(
            vec![Attachment::new(0, "shadows", AttachmentType::Depth)],
            vec![SubpassType::new(0, [0])],
            Viewport::fixed(1024, 1024),
        )
        .unwrap()
    }

    fn main_stage() -> RenderStage {
        RenderStage::new(
            vec![
                Attachment::new(0, "depth", AttachmentType::Depth),
                Attachment::new(1, "swapchain", AttachmentType::Swapchain),
                Attachment::new(2, "diffuse", AttachmentType::Image),
            ],
            vec![SubpassType::new(0, [0, 2]), SubpassType::new(1, [0, 1])],
            Viewport::new(),
        )
        .unwrap()
    }

    fn setup() -> (Arc<TestDevice>, Graphics, RendererContainer) {
        let device = TestDevice::new();
        let mut graphics = Graphics::new(device.clone());
        graphics.add_stage(shadow_stage());
        graphics.add_stage(main_stage());

        let mut renderers = RendererContainer::new();
        renderers.add(Marker { stage: StageIndex::new(1, 1), marker: 11 });
        renderers.add(Marker { stage: StageIndex::new(0, 0), marker: 0 });
        renderers.add(Marker { stage: StageIndex::new(1, 0), marker: 10 });
        (device, graphics, renderers)
    }

    fn framebuffers_created(device: &TestDevice) -> usize {
        device.count(|c| matches!(c, Call::CreateFramebuffer { .. }))
    }

    #[test]
    fn test_records_stages_and_subpasses_in_order() {
        let (device, mut graphics, mut renderers) = setup();
        let swapchain = TestSwapchain::new(800, 600, 3);
        graphics.prepare(&swapchain).unwrap();
        device.clear();

        graphics
            .record_frame(vk::CommandBuffer::null(), &swapchain, &mut renderers, &World::new())
            .unwrap();

        let trace: Vec<String> = device
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::BeginRenderPass { clear_count, .. } => Some(format!("begin{clear_count}")),
                Call::NextSubpass => Some("next".to_owned()),
                Call::EndRenderPass => Some("end".to_owned()),
                Call::Draw { vertices } => Some(format!("draw{vertices}")),
                _ => None,
            })
            .collect();
        assert_eq!(
            trace,
            ["begin1", "draw0", "end", "begin3", "draw10", "next", "draw11", "end"]
        );
        assert_eq!(device.count(|c| matches!(c, Call::SetViewport(_))), 2);
    }

    #[test]
    fn test_resize_rebuilds_only_scaled_stages() {
        let (device, mut graphics, _) = setup();
        graphics.prepare(&TestSwapchain::new(800, 600, 2)).unwrap();
        assert!(graphics.stages().iter().all(RenderStage::is_built));

        device.clear();
        graphics.prepare(&TestSwapchain::new(800, 600, 2)).unwrap();
        assert_eq!(framebuffers_created(&device), 0, "nothing changed");

        graphics.prepare(&TestSwapchain::new(1280, 720, 2)).unwrap();
        assert_eq!(framebuffers_created(&device), 2, "main stage only, one per image");
        assert_eq!(graphics.stage(1).unwrap().render_area().extent.width, 1280);
        assert_eq!(graphics.stage(0).unwrap().render_area().extent.width, 1024);
        assert_eq!(device.count(|c| matches!(c, Call::CreateRenderPass(_))), 0);
    }

    #[test]
    fn test_swapchain_recreation_rebuilds_every_stage() {
        let (device, mut graphics, _) = setup();
        let swapchain = TestSwapchain::new(640, 480, 2);
        graphics.prepare(&swapchain).unwrap();
        device.clear();

        graphics.on_swapchain_recreated();
        assert!(graphics.stages().iter().all(RenderStage::is_out_of_date));
        graphics.prepare(&swapchain).unwrap();
        assert_eq!(framebuffers_created(&device), 4);
        assert!(graphics.stages().iter().all(|stage| !stage.is_out_of_date()));
    }

    #[test]
    fn test_configured_scale_shrinks_stage() {
        let (device, mut graphics, _) = setup();
        let swapchain = TestSwapchain::new(800, 600, 2);
        graphics.prepare(&swapchain).unwrap();
        device.clear();

        graphics.apply_stage_scales(&[
            StageScale { stage: 1, scale: [0.5, 0.5] },
            StageScale { stage: 7, scale: [2.0, 2.0] },
        ]);
        graphics.prepare(&swapchain).unwrap();
        let extent = graphics.stage(1).unwrap().render_area().extent;
        assert_eq!((extent.width, extent.height), (400, 300));
        assert_eq!(framebuffers_created(&device), 2);
    }

    #[test]
    fn test_recording_unbuilt_stage_fails() {
        let (_device, graphics, mut renderers) = setup();
        let result = graphics.record_frame(
            vk::CommandBuffer::null(),
            &TestSwapchain::new(640, 480, 2),
            &mut renderers,
            &World::new(),
        );
        assert!(matches!(result, Err(RenderError::InvalidOperation { .. })));
    }

    #[test]
    fn test_attachment_lookup_spans_stages() {
        let (_device, mut graphics, _) = setup();
        assert!(graphics.attachment("shadows").is_none());
        graphics.prepare(&TestSwapchain::new(640, 480, 2)).unwrap();
        assert!(graphics.attachment("shadows").is_some());
        assert!(graphics.attachment("diffuse").is_some());
        assert!(graphics.attachment("swapchain").is_none());
    }
}
