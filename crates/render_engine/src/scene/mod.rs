//! Scene facade
//!
//! A [`Scene`] owns the [`World`] and the [`RendererContainer`] and is the
//! one place where component masks change. Every mutation forwards its
//! [`MaskChange`] to the renderers before returning, so a renderer's entity
//! list is always current by the time the next frame is recorded. Entity
//! storage growth reaches the renderers through the same path.

mod document;

pub use document::{ComponentCounts, EntityDocument, SceneDocument};

use crate::config::EngineConfig;
use crate::ecs::{Component, ComponentType, EcsError, EcsResult, Entity, EntityResizeListener, MaskChange, World};
use crate::render::renderer::Renderer;
use crate::render::{Graphics, RenderResult, RendererContainer, RendererId, Swapchain};
use ash::vk;
use thiserror::Error;

/// Scene load and save errors
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Scene file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scene document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Ecs(#[from] EcsError),
}

pub type SceneResult<T> = Result<T, SceneError>;

/// Entities, their components and the renderers that draw them
#[derive(Debug)]
pub struct Scene {
    name: String,
    world: World,
    renderers: RendererContainer,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_world(name.into(), World::new())
    }

    /// Scene sized by the engine configuration
    pub fn from_config(name: impl Into<String>, config: &EngineConfig) -> Self {
        Self::with_world(
            name.into(),
            World::with_capacity(config.entity_capacity, config.entity_grow_step),
        )
    }

    fn with_world(name: String, world: World) -> Self {
        // Renderers added later are sized from the container's capacity.
        let mut renderers = RendererContainer::new();
        renderers.on_entity_resize(world.capacity());
        Self { name, world, renderers }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn renderers(&self) -> &RendererContainer {
        &self.renderers
    }

    /// Renderers, for enabling and tuning
    ///
    /// Registration stays with the scene; adding renderers here skips the
    /// catch-up registration [`Scene::add_renderer`] performs.
    pub fn renderers_mut(&mut self) -> &mut RendererContainer {
        &mut self.renderers
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.world.len()
    }

    pub fn is_empty(&self) -> bool {
        self.world.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.world.entities()
    }

    pub fn create_entity(&mut self) -> Entity {
        self.world.create_entity(&mut self.renderers)
    }

    /// Grow every entity-indexed array to at least `new_size`
    pub fn resize(&mut self, new_size: usize) {
        self.world.resize(new_size, &mut self.renderers);
    }

    /// Destroy an entity, unregistering it from every renderer that drew it
    pub fn destroy_entity(&mut self, entity: Entity) -> EcsResult<()> {
        let change = self.world.destroy_entity(entity)?;
        self.apply(change);
        Ok(())
    }

    /// Destroy every entity
    pub fn clear(&mut self) {
        let entities: Vec<Entity> = self.world.entities().collect();
        for entity in entities {
            if let Err(error) = self.destroy_entity(entity) {
                log::warn!("Failed to destroy {:?} while clearing scene: {}", entity, error);
            }
        }
    }

    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> EcsResult<()> {
        let change = self.world.add_component(entity, component)?;
        self.apply(change);
        Ok(())
    }

    /// Default-initialize a component by runtime tag
    pub fn create_component(&mut self, entity: Entity, ty: ComponentType) -> EcsResult<()> {
        let change = self.world.create_component(entity, ty)?;
        self.apply(change);
        Ok(())
    }

    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> EcsResult<()> {
        self.destroy_component(entity, T::TYPE)
    }

    /// Remove a component by runtime tag
    pub fn destroy_component(&mut self, entity: Entity, ty: ComponentType) -> EcsResult<()> {
        let change = self.world.destroy_component(entity, ty)?;
        self.apply(change);
        Ok(())
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.world.has::<T>(entity)
    }

    pub fn get<T: Component>(&self, entity: Entity) -> EcsResult<&T> {
        self.world.get(entity)
    }

    /// Mutable component access; does not change the mask
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> EcsResult<&mut T> {
        self.world.get_mut(entity)
    }

    /// Copy every component of `source` onto a new entity
    pub fn clone_entity(&mut self, source: Entity) -> EcsResult<Entity> {
        let change = self.world.clone_entity(source, &mut self.renderers)?;
        self.apply(change);
        Ok(change.entity)
    }

    /// Add a renderer and register every live entity matching its signature
    pub fn add_renderer<R: Renderer>(&mut self, renderer: R) -> RendererId {
        let id = self.renderers.add(renderer);
        let world = &self.world;
        let existing = world.entities().filter_map(|entity| world.mask(entity).ok().map(|mask| (entity, mask)));
        self.renderers.register_existing(id, existing);
        id
    }

    pub fn remove_renderer(&mut self, id: RendererId) -> Option<Box<dyn Renderer>> {
        self.renderers.remove(id)
    }

    pub fn renderer<R: Renderer>(&self) -> Option<&R> {
        self.renderers.get(false)
    }

    pub fn renderer_mut<R: Renderer>(&mut self) -> Option<&mut R> {
        self.renderers.get_mut(false)
    }

    /// Record a frame of this scene through `graphics`
    pub fn render(&mut self, graphics: &Graphics, cmd: vk::CommandBuffer, swapchain: &dyn Swapchain) -> RenderResult<()> {
        graphics.record_frame(cmd, swapchain, &mut self.renderers, &self.world)
    }

    fn apply(&mut self, change: MaskChange) {
        self.renderers.on_mask_change(change);
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new("Untitled")
    }
}
