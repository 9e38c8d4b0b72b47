//! Geometry pass renderer

use super::{mat4, vec4};
use crate::ecs::components::{Material, Mesh, Transform};
use crate::ecs::{ComponentMask, Entity};
use crate::render::descriptor::{DescriptorHandle, UniformHandle};
use crate::render::device::GraphicsDevice;
use crate::render::model::record_draw;
use crate::render::renderer::{EntityMap, RenderContext, Renderer};
use crate::render::{Pipeline, RenderResult, StageIndex};
use std::sync::Arc;

#[derive(Debug)]
struct MeshEntry {
    uniform_object: UniformHandle,
    descriptors: DescriptorHandle,
}

/// Draws every entity that has a [`Transform`] and a loaded [`Mesh`]
///
/// Each registered entity owns its object uniforms and descriptor cache,
/// so a static entity costs no buffer or descriptor writes after its
/// first frames.
#[derive(Debug)]
pub struct MeshRenderer {
    stage: StageIndex,
    enabled: bool,
    device: Arc<dyn GraphicsDevice>,
    pipeline: Box<dyn Pipeline>,
    uniform_scene: UniformHandle,
    entries: EntityMap<MeshEntry>,
}

impl MeshRenderer {
    pub fn new(device: Arc<dyn GraphicsDevice>, stage: StageIndex, pipeline: Box<dyn Pipeline>) -> Self {
        Self {
            stage,
            enabled: true,
            uniform_scene: UniformHandle::new(Arc::clone(&device), true),
            device,
            pipeline,
            entries: EntityMap::new(),
        }
    }

    /// Number of registered entities
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entries.contains(entity)
    }
}

impl Renderer for MeshRenderer {
    fn stage(&self) -> StageIndex {
        self.stage
    }

    fn signature(&self) -> Option<ComponentMask> {
        Some(ComponentMask::TRANSFORM | ComponentMask::MESH)
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn register_entity(&mut self, entity: Entity) {
        let entry = MeshEntry {
            uniform_object: UniformHandle::new(Arc::clone(&self.device), false),
            descriptors: DescriptorHandle::new(Arc::clone(&self.device)),
        };
        self.entries.insert(entity, entry);
    }

    fn unregister_entity(&mut self, entity: Entity) {
        self.entries.remove(entity);
    }

    fn on_entity_resize(&mut self, new_size: usize) {
        self.entries.resize(new_size);
    }

    fn render(&mut self, ctx: &RenderContext<'_>) -> RenderResult<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        let device = ctx.device.as_ref();
        let cmd = ctx.command_buffer;
        let pipeline = self.pipeline.as_ref();

        self.uniform_scene.push("projection", &mat4(&ctx.camera.projection));
        self.uniform_scene.push("view", &mat4(&ctx.camera.view));
        self.uniform_scene.push("cameraPos", &vec4(&ctx.camera.position, 1.0));

        pipeline.bind(device, cmd);
        let mut drawn = 0;
        for (entity, entry) in self.entries.iter_mut() {
            let (Ok(transform), Ok(mesh)) = (ctx.world.get::<Transform>(entity), ctx.world.get::<Mesh>(entity)) else {
                continue;
            };
            let Some(model) = mesh.handle.as_deref() else {
                continue;
            };
            let material = ctx.world.get::<Material>(entity).ok();
            let base_color = material.map_or([1.0; 4], |m| m.base_color.into());

            entry.uniform_object.push("transform", &mat4(&transform.matrix()));
            entry.uniform_object.push("baseColour", &base_color);
            entry.uniform_object.push("metallic", &material.map_or(0.0, |m| m.metallic));
            entry.uniform_object.push("roughness", &material.map_or(0.5, |m| m.roughness));

            entry.descriptors.push_uniform("UniformScene", &mut self.uniform_scene)?;
            entry.descriptors.push_uniform("UniformObject", &mut entry.uniform_object)?;
            if !entry.descriptors.update(pipeline)? {
                continue;
            }

            entry.descriptors.bind_descriptor(cmd, pipeline);
            record_draw(device, cmd, model, 1);
            drawn += 1;
        }
        log::trace!("Mesh renderer drew {} of {} entities", drawn, self.entries.len());
        Ok(())
    }
}
