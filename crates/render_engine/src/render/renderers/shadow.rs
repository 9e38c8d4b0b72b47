//! Depth-only shadow caster pass

use super::mat4;
use crate::ecs::components::{Camera, Light, LightKind, Mesh, ShadowCaster, Transform};
use crate::ecs::{ComponentMask, Entity, World};
use crate::render::descriptor::PushHandle;
use crate::render::model::record_draw;
use crate::render::renderer::{EntityMap, RenderContext, Renderer};
use crate::render::{Pipeline, RenderResult, StageIndex};
use nalgebra::{Matrix4, Orthographic3};

/// Draws shadow casters into a depth-only stage with push constants
#[derive(Debug)]
pub struct ShadowRenderer {
    stage: StageIndex,
    enabled: bool,
    pipeline: Box<dyn Pipeline>,
    push_object: PushHandle,
    casters: EntityMap<()>,
    extent: f32,
}

impl ShadowRenderer {
    /// `extent` is the half-size of the square the shadow map covers
    pub fn new(stage: StageIndex, pipeline: Box<dyn Pipeline>, extent: f32) -> Self {
        Self {
            stage,
            enabled: true,
            pipeline,
            push_object: PushHandle::new(false),
            casters: EntityMap::new(),
            extent,
        }
    }

    pub fn len(&self) -> usize {
        self.casters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.casters.is_empty()
    }

    /// View-projection of the first directional light, if any
    pub fn light_matrix(&self, world: &World) -> Option<Matrix4<f32>> {
        world
            .entities_with(ComponentMask::LIGHT | ComponentMask::TRANSFORM)
            .find_map(|entity| {
                let light = world.get::<Light>(entity).ok()?;
                if light.kind != LightKind::Directional {
                    return None;
                }
                let transform = world.get::<Transform>(entity).ok()?;
                let projection =
                    Orthographic3::new(-self.extent, self.extent, -self.extent, self.extent, -self.extent, self.extent);
                Some(projection.to_homogeneous() * Camera::view(transform))
            })
    }
}

impl Renderer for ShadowRenderer {
    fn stage(&self) -> StageIndex {
        self.stage
    }

    fn signature(&self) -> Option<ComponentMask> {
        Some(ComponentMask::TRANSFORM | ComponentMask::MESH | ComponentMask::SHADOW_CASTER)
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn register_entity(&mut self, entity: Entity) {
        self.casters.insert(entity, ());
    }

    fn unregister_entity(&mut self, entity: Entity) {
        self.casters.remove(entity);
    }

    fn on_entity_resize(&mut self, new_size: usize) {
        self.casters.resize(new_size);
    }

    fn render(&mut self, ctx: &RenderContext<'_>) -> RenderResult<()> {
        if self.casters.is_empty() {
            return Ok(());
        }
        let Some(light_matrix) = self.light_matrix(ctx.world) else {
            return Ok(());
        };
        let device = ctx.device.as_ref();
        let cmd = ctx.command_buffer;

        self.push_object.update(self.pipeline.shader().uniform_block("PushObject"));
        self.pipeline.bind(device, cmd);
        for entity in self.casters.entities() {
            let (Ok(transform), Ok(mesh), Ok(caster)) = (
                ctx.world.get::<Transform>(entity),
                ctx.world.get::<Mesh>(entity),
                ctx.world.get::<ShadowCaster>(entity),
            ) else {
                continue;
            };
            let Some(model) = mesh.handle.as_deref() else {
                continue;
            };

            self.push_object.push("mvp", &mat4(&(light_matrix * transform.matrix())));
            self.push_object.push("bias", &caster.depth_bias);
            self.push_object.bind_push(device, cmd, self.pipeline.as_ref());
            record_draw(device, cmd, model, 1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::MaskChange;
    use crate::render::model::{Model, StaticModel};
    use crate::render::renderer::CameraView;
    use crate::render::testing::{self, Call, TestDevice};
    use crate::render::GraphicsDevice;
    use ash::vk::{self, Handle};
    use std::sync::Arc;

    fn context<'a>(device: &'a Arc<dyn GraphicsDevice>, world: &'a World) -> RenderContext<'a> {
        RenderContext {
            device,
            command_buffer: vk::CommandBuffer::null(),
            stage_index: StageIndex::new(0, 0),
            stages: &[],
            world,
            camera: CameraView::default(),
        }
    }

    fn caster(world: &mut World, shadow: &mut ShadowRenderer) -> Entity {
        let e = world.create_entity(&mut ());
        let model: Arc<dyn Model> = Arc::new(StaticModel {
            vertex_buffer: vk::Buffer::from_raw(0xC000),
            index_buffer: None,
            vertex_count: 6,
            index_count: 0,
            radius: 1.0,
        });
        world.add_component(e, Transform::default()).unwrap();
        world.add_component(e, Mesh::with_handle("quad", model)).unwrap();
        let change = world.add_component(e, ShadowCaster { depth_bias: 0.25 }).unwrap();
        if change.new.matches(shadow.signature().unwrap()) {
            shadow.register_entity(e);
        }
        e
    }

    #[test]
    fn test_draws_casters_with_push_constants() {
        let device = TestDevice::new();
        let dyn_device: Arc<dyn GraphicsDevice> = device.clone();
        let mut world = World::new();
        let mut shadow = ShadowRenderer::new(StageIndex::new(0, 0), Box::new(testing::pipeline("shadow", false)), 20.0);
        caster(&mut world, &mut shadow);
        caster(&mut world, &mut shadow);

        shadow.render(&context(&dyn_device, &world)).unwrap();
        assert_eq!(device.count(|c| matches!(c, Call::Draw { .. })), 0, "no directional light yet");

        let sun = world.create_entity(&mut ());
        world.add_component(sun, Transform::default()).unwrap();
        world
            .add_component(sun, Light { kind: LightKind::Directional, ..Light::default() })
            .unwrap();
        shadow.render(&context(&dyn_device, &world)).unwrap();

        let pushes: Vec<_> = device
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::PushConstants { stages, data } => Some((stages, data)),
                _ => None,
            })
            .collect();
        assert_eq!(pushes.len(), 2);
        for (stages, data) in pushes {
            assert_eq!(stages, vk::ShaderStageFlags::VERTEX);
            assert_eq!(data.len(), 80);
            assert_eq!(&data[64..68], &0.25_f32.to_ne_bytes());
        }
        assert_eq!(device.count(|c| matches!(c, Call::Draw { vertices: 6 })), 2);
    }

    #[test]
    fn test_signature_requires_caster() {
        let shadow = ShadowRenderer::new(StageIndex::default(), Box::new(testing::pipeline("shadow", false)), 1.0);
        let change = MaskChange {
            entity: Entity::from_raw(1),
            old: ComponentMask::empty(),
            new: ComponentMask::TRANSFORM | ComponentMask::MESH,
        };
        assert!(!change.new.matches(shadow.signature().unwrap()));
    }
}
