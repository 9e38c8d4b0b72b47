//! Deferred lighting pass
//!
//! Reads the G-buffer attachments written by the geometry subpass, packs
//! every registered light into a storage buffer and draws one full-screen
//! triangle. The BRDF lookup image is produced by a background task; until
//! it arrives a placeholder image is bound in its place.

use super::{mat4, vec4};
use crate::ecs::components::{Light, LightKind, Transform};
use crate::ecs::{ComponentMask, Entity};
use crate::render::compute::ComputeTask;
use crate::render::descriptor::{Descriptor, DescriptorHandle, StorageHandle, UniformHandle};
use crate::render::device::GraphicsDevice;
use crate::render::renderer::{EntityMap, RenderContext, Renderer};
use crate::render::stage::Image2d;
use crate::render::{Pipeline, RenderResult, StageIndex};
use bytemuck::{Pod, Zeroable};
use std::sync::Arc;

/// Shader sampler name and the attachment bound to it
const GBUFFER: [(&str, &str); 3] = [
    ("samplerPosition", "position"),
    ("samplerDiffuse", "diffuse"),
    ("samplerNormal", "normal"),
];

/// One light as the lighting shader reads it
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DeferredLight {
    /// Linear RGB and intensity
    pub color: [f32; 4],
    /// World position and radius
    pub position: [f32; 4],
    /// Forward direction and kind
    pub direction: [f32; 4],
}

impl DeferredLight {
    pub fn new(light: &Light, transform: &Transform) -> Self {
        let kind = match light.kind {
            LightKind::Point => 0.0,
            LightKind::Directional => 1.0,
            LightKind::Spot => 2.0,
        };
        Self {
            color: vec4(&light.color, light.intensity),
            position: vec4(&transform.position, light.radius),
            direction: vec4(&transform.forward(), kind),
        }
    }
}

/// Full-screen lighting over the G-buffer
#[derive(Debug)]
pub struct DeferredRenderer {
    stage: StageIndex,
    enabled: bool,
    pipeline: Box<dyn Pipeline>,
    descriptors: DescriptorHandle,
    uniform_scene: UniformHandle,
    storage_lights: StorageHandle,
    lights: EntityMap<()>,
    brdf: Option<ComputeTask<Image2d>>,
    fallback: Option<Image2d>,
}

impl DeferredRenderer {
    pub fn new(device: Arc<dyn GraphicsDevice>, stage: StageIndex, pipeline: Box<dyn Pipeline>) -> Self {
        Self {
            stage,
            enabled: true,
            pipeline,
            descriptors: DescriptorHandle::new(Arc::clone(&device)),
            uniform_scene: UniformHandle::new(Arc::clone(&device), false),
            storage_lights: StorageHandle::new(device, false),
            lights: EntityMap::new(),
            brdf: None,
            fallback: None,
        }
    }

    /// Bind `brdf`'s image once ready, `fallback` until then
    pub fn with_brdf(mut self, brdf: ComputeTask<Image2d>, fallback: Option<Image2d>) -> Self {
        self.brdf = Some(brdf);
        self.fallback = fallback;
        self
    }

    /// Number of registered lights
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Whether the background BRDF result is in use
    pub fn is_brdf_ready(&mut self) -> bool {
        self.brdf.as_mut().is_some_and(ComputeTask::is_ready)
    }
}

impl Renderer for DeferredRenderer {
    fn stage(&self) -> StageIndex {
        self.stage
    }

    fn signature(&self) -> Option<ComponentMask> {
        Some(ComponentMask::TRANSFORM | ComponentMask::LIGHT)
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn register_entity(&mut self, entity: Entity) {
        self.lights.insert(entity, ());
    }

    fn unregister_entity(&mut self, entity: Entity) {
        self.lights.remove(entity);
    }

    fn on_entity_resize(&mut self, new_size: usize) {
        self.lights.resize(new_size);
    }

    fn render(&mut self, ctx: &RenderContext<'_>) -> RenderResult<()> {
        let device = ctx.device.as_ref();
        let cmd = ctx.command_buffer;
        let pipeline = self.pipeline.as_ref();

        let lights: Vec<DeferredLight> = self
            .lights
            .entities()
            .filter_map(|entity| {
                let light = ctx.world.get::<Light>(entity).ok()?;
                let transform = ctx.world.get::<Transform>(entity).ok()?;
                Some(DeferredLight::new(light, transform))
            })
            .collect();

        self.uniform_scene.push("view", &mat4(&ctx.camera.view));
        self.uniform_scene.push("cameraPos", &vec4(&ctx.camera.position, 1.0));
        let written = self.storage_lights.push_slice("lights", &lights);
        self.uniform_scene.push("lightsCount", &(written as u32));

        self.descriptors.push_uniform("UniformScene", &mut self.uniform_scene)?;
        self.descriptors.push_storage("BufferLights", &mut self.storage_lights)?;
        for (sampler, attachment) in GBUFFER {
            if let Some(image) = ctx.attachment(attachment) {
                self.descriptors.push(sampler, image, None);
            }
        }

        let brdf = self.brdf.as_mut().and_then(ComputeTask::poll).or(self.fallback.as_ref());
        if let Some(brdf) = brdf {
            self.descriptors.push("samplerBrdf", brdf as &dyn Descriptor, None);
        }

        if !self.descriptors.update(pipeline)? {
            return Ok(());
        }
        pipeline.bind(device, cmd);
        self.descriptors.bind_descriptor(cmd, pipeline);
        device.cmd_draw(cmd, 3, 1);
        if written < lights.len() {
            log::debug!("Light buffer holds {} of {} lights", written, lights.len());
        }
        log::trace!("Deferred pass with {} lights", written);
        Ok(())
    }
}
