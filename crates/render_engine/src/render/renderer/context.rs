//! Per-subpass recording context

use crate::ecs::components::{Camera, Transform};
use crate::ecs::{ComponentMask, World};
use crate::render::descriptor::Descriptor;
use crate::render::device::GraphicsDevice;
use crate::render::stage::{RenderArea, RenderStage};
use crate::render::StageIndex;
use ash::vk;
use nalgebra::{Matrix4, Vector3};
use std::sync::Arc;

/// Camera matrices for the frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub position: Vector3<f32>,
}

impl CameraView {
    /// View of the first active camera that has a transform
    pub fn from_world(world: &World, aspect_ratio: f32) -> Option<Self> {
        world
            .entities_with(ComponentMask::CAMERA | ComponentMask::TRANSFORM)
            .find_map(|entity| {
                let camera = world.get::<Camera>(entity).ok().filter(|camera| camera.active)?;
                let transform = world.get::<Transform>(entity).ok()?;
                Some(Self {
                    view: Camera::view(transform),
                    projection: camera.projection(aspect_ratio),
                    position: transform.position,
                })
            })
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection * self.view
    }
}

impl Default for CameraView {
    fn default() -> Self {
        Self {
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
            position: Vector3::zeros(),
        }
    }
}

/// Everything a renderer may read while recording
pub struct RenderContext<'a> {
    pub device: &'a Arc<dyn GraphicsDevice>,
    pub command_buffer: vk::CommandBuffer,
    pub stage_index: StageIndex,
    pub stages: &'a [RenderStage],
    pub world: &'a World,
    pub camera: CameraView,
}

impl<'a> RenderContext<'a> {
    /// Stage being recorded
    pub fn stage(&self) -> Option<&'a RenderStage> {
        self.stages.get(self.stage_index.stage)
    }

    /// Render area of the stage being recorded
    pub fn render_area(&self) -> RenderArea {
        self.stage().map(|stage| *stage.render_area()).unwrap_or_default()
    }

    /// Attachment image by name
    ///
    /// The current stage is searched first, then every stage in order, so
    /// a filter can sample what an earlier stage rendered.
    pub fn attachment(&self, name: &str) -> Option<&'a dyn Descriptor> {
        self.stage()
            .and_then(|stage| stage.get_descriptor(name))
            .or_else(|| self.stages.iter().find_map(|stage| stage.get_descriptor(name)))
    }
}

impl std::fmt::Debug for RenderContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("command_buffer", &self.command_buffer)
            .field("stage_index", &self.stage_index)
            .field("stages", &self.stages.len())
            .finish()
    }
}
