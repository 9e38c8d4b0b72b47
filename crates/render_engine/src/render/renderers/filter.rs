//! Full-screen post filters

use crate::ecs::ComponentMask;
use crate::render::descriptor::DescriptorHandle;
use crate::render::device::GraphicsDevice;
use crate::render::renderer::{RenderContext, Renderer};
use crate::render::{Pipeline, RenderResult, StageIndex};
use std::sync::Arc;

/// Attachment a filter samples from and the one it writes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingPong {
    pub input: String,
    pub output: String,
}

impl PingPong {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    /// `count` passes alternating between `a` and `b`, starting by reading `a`
    pub fn chain(count: usize, a: &str, b: &str) -> Vec<Self> {
        (0..count)
            .map(|i| if i % 2 == 0 { Self::new(a, b) } else { Self::new(b, a) })
            .collect()
    }

    /// Same pair with the roles exchanged
    pub fn swapped(&self) -> Self {
        Self::new(self.output.clone(), self.input.clone())
    }
}

/// Reads `samplerColour` and writes `writeColour` over the whole render area
///
/// Filters ignore entities, so they never take part in registration.
#[derive(Debug)]
pub struct PostFilter {
    stage: StageIndex,
    enabled: bool,
    pipeline: Box<dyn Pipeline>,
    descriptors: DescriptorHandle,
    ping_pong: PingPong,
}

impl PostFilter {
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        stage: StageIndex,
        pipeline: Box<dyn Pipeline>,
        ping_pong: PingPong,
    ) -> Self {
        Self {
            stage,
            enabled: true,
            pipeline,
            descriptors: DescriptorHandle::new(device),
            ping_pong,
        }
    }

    pub fn ping_pong(&self) -> &PingPong {
        &self.ping_pong
    }
}

impl Renderer for PostFilter {
    fn stage(&self) -> StageIndex {
        self.stage
    }

    fn signature(&self) -> Option<ComponentMask> {
        None
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn render(&mut self, ctx: &RenderContext<'_>) -> RenderResult<()> {
        let pipeline = self.pipeline.as_ref();
        match ctx.attachment(&self.ping_pong.input) {
            Some(input) => self.descriptors.push("samplerColour", input, None),
            None => log::warn!("Filter input '{}' is not an attachment", self.ping_pong.input),
        }
        if let Some(output) = ctx.attachment(&self.ping_pong.output) {
            self.descriptors.push("writeColour", output, None);
        }

        if !self.descriptors.update(pipeline)? {
            return Ok(());
        }
        pipeline.bind(ctx.device.as_ref(), ctx.command_buffer);
        self.descriptors.bind_descriptor(ctx.command_buffer, pipeline);
        ctx.device.cmd_draw(ctx.command_buffer, 3, 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::World;
    use crate::render::descriptor::{Descriptor, ResourceId};
    use crate::render::device::DescriptorInfo;
    use crate::render::renderer::CameraView;
    use crate::render::stage::{Attachment, AttachmentType, RenderStage, SubpassType, Viewport};
    use crate::render::testing::{self, Call, TestDevice, TestSwapchain};
    use ash::vk;

    #[test]
    fn test_chain_alternates() {
        let chain = PingPong::chain(3, "colour", "scratch");
        assert_eq!(chain[0], PingPong::new("colour", "scratch"));
        assert_eq!(chain[1], PingPong::new("scratch", "colour"));
        assert_eq!(chain[2], chain[0]);
        assert_eq!(chain[1].swapped(), chain[0]);
        assert!(PingPong::chain(0, "a", "b").is_empty());
    }

    #[test]
    fn test_filter_binds_pair_and_draws_triangle() {
        let device = TestDevice::new();
        let dyn_device: Arc<dyn GraphicsDevice> = device.clone();
        let mut stage = RenderStage::new(
            vec![
                Attachment::new(0, "swapchain", AttachmentType::Swapchain),
                Attachment::new(1, "colour", AttachmentType::Image),
                Attachment::new(2, "scratch", AttachmentType::Image),
            ],
            vec![SubpassType::new(0, [0, 1, 2])],
            Viewport::new(),
        )
        .unwrap();
        stage.rebuild(&dyn_device, &TestSwapchain::new(320, 240, 2)).unwrap();
        let stages = vec![stage];
        let world = World::new();

        let mut filter = PostFilter::new(
            Arc::clone(&dyn_device),
            StageIndex::new(0, 0),
            Box::new(testing::pipeline("blur", true)),
            PingPong::new("colour", "scratch"),
        );
        assert!(filter.signature().is_none());

        let ctx = RenderContext {
            device: &dyn_device,
            command_buffer: vk::CommandBuffer::null(),
            stage_index: StageIndex::new(0, 0),
            stages: &stages,
            world: &world,
            camera: CameraView::default(),
        };
        filter.render(&ctx).unwrap();
        assert_eq!(device.count(|c| matches!(c, Call::Draw { .. })), 0);
        filter.render(&ctx).unwrap();
        assert_eq!(device.count(|c| matches!(c, Call::Draw { vertices: 3 })), 1);

        let view = |name: &str| match stages[0].get_descriptor(name).map(|d| d.resource_id()) {
            Some(ResourceId::Image(view, _)) => view,
            other => panic!("{name} is not an image: {other:?}"),
        };
        let writes = device
            .calls()
            .into_iter()
            .find_map(|c| match c {
                Call::PushSet(writes) => Some(writes),
                _ => None,
            })
            .unwrap();
        let bound = |binding: u32| {
            writes.iter().find(|w| w.binding == binding).map(|w| match w.info {
                DescriptorInfo::Image(info) => info.image_view,
                DescriptorInfo::Buffer(_) => vk::ImageView::null(),
            })
        };
        assert_eq!(bound(4), Some(view("colour")));
        assert_eq!(bound(5), Some(view("scratch")));
    }
}
