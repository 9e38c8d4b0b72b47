//! Renderer ownership and entity registration
//!
//! Renderers are stored in a slot map and indexed twice: by the subpass
//! they draw in, for recording, and by concrete type, for lookup. Entity
//! registration is edge-triggered: a renderer hears about an entity only
//! when a mask change makes it start or stop matching the signature.

use super::{RenderContext, Renderer};
use crate::ecs::{ComponentMask, Entity, EntityResizeListener, MaskChange};
use crate::render::{RenderResult, StageIndex};
use slotmap::SlotMap;
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};

slotmap::new_key_type! {
    /// Handle to a renderer owned by a [`RendererContainer`]
    pub struct RendererId;
}

/// Owns every renderer, keyed by stage and subpass
#[derive(Debug, Default)]
pub struct RendererContainer {
    renderers: SlotMap<RendererId, Box<dyn Renderer>>,
    stages: BTreeMap<StageIndex, Vec<RendererId>>,
    by_type: HashMap<TypeId, Vec<RendererId>>,
    entity_capacity: usize,
}

impl RendererContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of renderers
    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    /// Take ownership of `renderer` at its declared stage
    ///
    /// The renderer's side arrays are grown to the current entity
    /// capacity; it starts with no registered entities.
    pub fn add<R: Renderer>(&mut self, mut renderer: R) -> RendererId {
        if self.entity_capacity > 0 {
            renderer.on_entity_resize(self.entity_capacity);
        }
        let stage = renderer.stage();
        let id = self.renderers.insert(Box::new(renderer));
        self.stages.entry(stage).or_default().push(id);
        self.by_type.entry(TypeId::of::<R>()).or_default().push(id);
        log::debug!(
            "Added renderer {} at stage {} subpass {}",
            std::any::type_name::<R>(),
            stage.stage,
            stage.subpass
        );
        id
    }

    /// Drop a renderer from every index
    pub fn remove(&mut self, id: RendererId) -> Option<Box<dyn Renderer>> {
        let renderer = self.renderers.remove(id)?;
        if let Some(ids) = self.stages.get_mut(&renderer.stage()) {
            ids.retain(|other| *other != id);
        }
        let type_id = renderer.as_ref().as_any().type_id();
        if let Some(ids) = self.by_type.get_mut(&type_id) {
            ids.retain(|other| *other != id);
        }
        Some(renderer)
    }

    pub fn renderer(&self, id: RendererId) -> Option<&dyn Renderer> {
        let renderer = self.renderers.get(id)?;
        Some(renderer.as_ref())
    }

    pub fn renderer_mut(&mut self, id: RendererId) -> Option<&mut dyn Renderer> {
        let renderer = self.renderers.get_mut(id)?;
        Some(renderer.as_mut())
    }

    fn find<R: Renderer>(&self, allow_disabled: bool) -> Option<RendererId> {
        let ids = self.by_type.get(&TypeId::of::<R>())?;
        ids.iter()
            .copied()
            .find(|id| self.renderers.get(*id).is_some_and(|r| r.is_enabled()))
            .or_else(|| allow_disabled.then(|| ids.first().copied()).flatten())
    }

    /// First renderer of type `R`
    ///
    /// Enabled renderers win; a disabled one is returned only when
    /// `allow_disabled` is set and no enabled one exists.
    pub fn get<R: Renderer>(&self, allow_disabled: bool) -> Option<&R> {
        let id = self.find::<R>(allow_disabled)?;
        self.renderers.get(id)?.as_ref().as_any().downcast_ref()
    }

    pub fn get_mut<R: Renderer>(&mut self, allow_disabled: bool) -> Option<&mut R> {
        let id = self.find::<R>(allow_disabled)?;
        self.renderers.get_mut(id)?.as_mut().as_any_mut().downcast_mut()
    }

    /// Stage keys that have at least one renderer, in recording order
    pub fn stages(&self) -> impl Iterator<Item = StageIndex> + '_ {
        self.stages
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(index, _)| *index)
    }

    /// Forward an entity's mask transition to every entity-driven renderer
    pub fn on_mask_change(&mut self, change: MaskChange) {
        if change.is_unchanged() {
            return;
        }
        for renderer in self.renderers.values_mut() {
            let Some(signature) = renderer.signature() else {
                continue;
            };
            let was = change.old.matches(signature);
            let is = change.new.matches(signature);
            if is && !was {
                log::trace!("Registering entity {} with {:?}", change.entity.id(), renderer.stage());
                renderer.register_entity(change.entity);
            } else if was && !is {
                log::trace!("Unregistering entity {} from {:?}", change.entity.id(), renderer.stage());
                renderer.unregister_entity(change.entity);
            }
        }
    }

    /// Register already-existing entities with a newly added renderer
    pub fn register_existing(&mut self, id: RendererId, entities: impl IntoIterator<Item = (Entity, ComponentMask)>) {
        let Some(renderer) = self.renderers.get_mut(id) else {
            return;
        };
        let Some(signature) = renderer.signature() else {
            return;
        };
        for (entity, mask) in entities {
            if mask.matches(signature) {
                renderer.register_entity(entity);
            }
        }
    }

    /// Record every enabled renderer at `index`, in insertion order
    pub fn render_stage(&mut self, index: StageIndex, ctx: &RenderContext<'_>) -> RenderResult<()> {
        let Some(ids) = self.stages.get(&index) else {
            return Ok(());
        };
        for id in ids {
            if let Some(renderer) = self.renderers.get_mut(*id) {
                if renderer.is_enabled() {
                    renderer.render(ctx)?;
                }
            }
        }
        Ok(())
    }
}

impl EntityResizeListener for RendererContainer {
    fn on_entity_resize(&mut self, new_size: usize) {
        self.entity_capacity = self.entity_capacity.max(new_size);
        for renderer in self.renderers.values_mut() {
            renderer.on_entity_resize(new_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{Mesh, Tag, Transform};
    use crate::ecs::World;
    use crate::render::renderer::EntityMap;
    use crate::render::testing::TestDevice;
    use crate::render::{GraphicsDevice, RenderError};
    use ash::vk;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct RecordingRenderer {
        stage: StageIndex,
        signature: Option<ComponentMask>,
        disabled: bool,
        registered: Vec<Entity>,
        unregistered: Vec<Entity>,
        side: EntityMap<()>,
        renders: usize,
    }

    impl RecordingRenderer {
        fn with_signature(signature: ComponentMask) -> Self {
            Self {
                signature: Some(signature),
                ..Self::default()
            }
        }
    }

    impl Renderer for RecordingRenderer {
        fn stage(&self) -> StageIndex {
            self.stage
        }

        fn signature(&self) -> Option<ComponentMask> {
            self.signature
        }

        fn is_enabled(&self) -> bool {
            !self.disabled
        }

        fn set_enabled(&mut self, enabled: bool) {
            self.disabled = !enabled;
        }

        fn register_entity(&mut self, entity: Entity) {
            self.registered.push(entity);
            self.side.insert(entity, ());
        }

        fn unregister_entity(&mut self, entity: Entity) {
            self.unregistered.push(entity);
            self.side.remove(entity);
        }

        fn on_entity_resize(&mut self, new_size: usize) {
            self.side.resize(new_size);
        }

        fn render(&mut self, _ctx: &RenderContext<'_>) -> RenderResult<()> {
            self.renders += 1;
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Failing;

    impl Renderer for Failing {
        fn stage(&self) -> StageIndex {
            StageIndex::new(0, 0)
        }

        fn is_enabled(&self) -> bool {
            true
        }

        fn set_enabled(&mut self, _enabled: bool) {}

        fn render(&mut self, _ctx: &RenderContext<'_>) -> RenderResult<()> {
            Err(RenderError::InvalidOperation { reason: "boom".into() })
        }
    }

    #[test]
    fn test_registration_is_edge_triggered() {
        let mut world = World::new();
        let mut renderers = RendererContainer::new();
        renderers.add(RecordingRenderer::with_signature(ComponentMask::TRANSFORM | ComponentMask::MESH));

        let e = world.create_entity(&mut renderers);
        renderers.on_mask_change(world.add_component(e, Mesh::new("m")).unwrap());
        let recorder = renderers.get::<RecordingRenderer>(false).unwrap();
        assert!(recorder.registered.is_empty());

        renderers.on_mask_change(world.add_component(e, Transform::default()).unwrap());
        renderers.on_mask_change(world.add_component(e, Tag::new("t")).unwrap());
        renderers.on_mask_change(world.add_component(e, Transform::default()).unwrap());
        let recorder = renderers.get::<RecordingRenderer>(false).unwrap();
        assert_eq!(recorder.registered, vec![e]);
        assert!(recorder.unregistered.is_empty());

        renderers.on_mask_change(world.remove_component::<Mesh>(e).unwrap());
        renderers.on_mask_change(world.remove_component::<Tag>(e).unwrap());
        let recorder = renderers.get::<RecordingRenderer>(false).unwrap();
        assert_eq!(recorder.registered, vec![e]);
        assert_eq!(recorder.unregistered, vec![e]);
        assert!(!recorder.side.contains(e));
    }

    #[test]
    fn test_destroy_unregisters_once() {
        let mut renderers = RendererContainer::new();
        renderers.add(RecordingRenderer::with_signature(ComponentMask::LIGHT));
        let e = Entity::from_raw(1);
        renderers.on_mask_change(MaskChange {
            entity: e,
            old: ComponentMask::empty(),
            new: ComponentMask::LIGHT | ComponentMask::TAG,
        });
        renderers.on_mask_change(MaskChange {
            entity: e,
            old: ComponentMask::LIGHT | ComponentMask::TAG,
            new: ComponentMask::empty(),
        });
        let recorder = renderers.get::<RecordingRenderer>(false).unwrap();
        assert_eq!((recorder.registered.len(), recorder.unregistered.len()), (1, 1));
    }

    #[test]
    fn test_filters_ignore_entities() {
        let mut renderers = RendererContainer::new();
        renderers.add(RecordingRenderer::default());
        renderers.on_mask_change(MaskChange {
            entity: Entity::from_raw(1),
            old: ComponentMask::empty(),
            new: ComponentMask::all(),
        });
        assert!(renderers.get::<RecordingRenderer>(false).unwrap().registered.is_empty());
    }

    #[test]
    fn test_get_prefers_enabled() {
        let mut renderers = RendererContainer::new();
        let disabled = renderers.add(RecordingRenderer {
            disabled: true,
            stage: StageIndex::new(0, 0),
            ..RecordingRenderer::default()
        });
        assert!(renderers.get::<RecordingRenderer>(false).is_none());
        assert!(renderers.get::<RecordingRenderer>(true).is_some());

        renderers.add(RecordingRenderer {
            stage: StageIndex::new(1, 0),
            ..RecordingRenderer::default()
        });
        assert_eq!(renderers.get::<RecordingRenderer>(true).unwrap().stage, StageIndex::new(1, 0));

        renderers.get_mut::<RecordingRenderer>(false).unwrap().set_enabled(false);
        renderers.renderer_mut(disabled).unwrap().set_enabled(true);
        assert_eq!(renderers.get::<RecordingRenderer>(false).unwrap().stage, StageIndex::new(0, 0));
        assert!(renderers.get::<Failing>(true).is_none());
    }

    #[test]
    fn test_resize_reaches_side_arrays() {
        let mut world = World::with_capacity(2, 2);
        let mut renderers = RendererContainer::new();
        renderers.add(RecordingRenderer::with_signature(ComponentMask::TAG));
        for _ in 0..5 {
            world.create_entity(&mut renderers);
        }
        assert_eq!(renderers.get::<RecordingRenderer>(false).unwrap().side.capacity(), world.capacity());

        world.resize(50, &mut renderers);
        assert!(renderers.get::<RecordingRenderer>(false).unwrap().side.capacity() >= 50);

        // Renderers added later start at the current capacity.
        let late = renderers.add(Failing);
        renderers.remove(late);
        let id = renderers.add(RecordingRenderer {
            stage: StageIndex::new(2, 0),
            ..RecordingRenderer::with_signature(ComponentMask::TAG)
        });
        let recorder = renderers.renderer(id).unwrap().as_any().downcast_ref::<RecordingRenderer>().unwrap();
        assert!(recorder.side.capacity() >= 50);
    }

    #[test]
    fn test_register_existing_entities() {
        let mut renderers = RendererContainer::new();
        let id = renderers.add(RecordingRenderer::with_signature(ComponentMask::MESH));
        renderers.register_existing(
            id,
            [
                (Entity::from_raw(1), ComponentMask::MESH),
                (Entity::from_raw(2), ComponentMask::TAG),
                (Entity::from_raw(3), ComponentMask::MESH | ComponentMask::TRANSFORM),
            ],
        );
        let recorder = renderers.get::<RecordingRenderer>(false).unwrap();
        assert_eq!(recorder.registered, vec![Entity::from_raw(1), Entity::from_raw(3)]);
    }

    #[test]
    fn test_render_stage_order_and_errors() {
        let device: Arc<dyn GraphicsDevice> = TestDevice::new();
        let world = World::new();
        let mut renderers = RendererContainer::new();
        let enabled = renderers.add(RecordingRenderer {
            stage: StageIndex::new(0, 1),
            ..RecordingRenderer::default()
        });
        let disabled = renderers.add(RecordingRenderer {
            stage: StageIndex::new(0, 1),
            disabled: true,
            ..RecordingRenderer::default()
        });
        let stages: Vec<_> = renderers.stages().collect();
        assert_eq!(stages, vec![StageIndex::new(0, 1)]);

        let ctx = RenderContext {
            device: &device,
            command_buffer: vk::CommandBuffer::null(),
            stage_index: StageIndex::new(0, 1),
            stages: &[],
            world: &world,
            camera: Default::default(),
        };
        renderers.render_stage(StageIndex::new(0, 1), &ctx).unwrap();
        renderers.render_stage(StageIndex::new(3, 0), &ctx).unwrap();
        let renders = |id| {
            let renderer = renderers.renderer(id).unwrap();
            renderer.as_any().downcast_ref::<RecordingRenderer>().unwrap().renders
        };
        assert_eq!(renders(enabled), 1);
        assert_eq!(renders(disabled), 0);

        renderers.add(Failing);
        assert!(renderers.render_stage(StageIndex::new(0, 0), &ctx).is_err());
    }
}
