//! ECS world: entities plus their component storage
//!
//! Every mutation that changes an entity's mask returns a [`MaskChange`]
//! describing the transition, so the owner can forward it to whoever
//! filters entities by signature. Typed reads check the mask first; a
//! cleared slot is never handed out.

use super::{
    Component, ComponentManagerContainer, ComponentMask, ComponentStorage, ComponentType, EcsError, EcsResult,
    Entity, EntityManager, EntityResizeListener,
};
use serde_json::Value;

/// An entity's mask before and after a mutation
///
/// ```
/// use render_engine::ecs::components::Tag;
/// use render_engine::ecs::{ComponentMask, World};
///
/// let mut world = World::new();
/// let entity = world.create_entity(&mut ());
/// let change = world.add_component(entity, Tag::new("crate")).unwrap();
/// assert_eq!(change.entity, entity);
/// assert_eq!(change.old, ComponentMask::empty());
/// assert_eq!(change.new, ComponentMask::TAG);
/// assert!(!change.is_unchanged());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskChange {
    /// Entity the mutation applied to
    pub entity: Entity,
    /// Mask before the mutation
    pub old: ComponentMask,
    /// Mask after the mutation
    pub new: ComponentMask,
}

impl MaskChange {
    /// Whether the mutation left the mask as it was
    pub fn is_unchanged(&self) -> bool {
        self.old == self.new
    }
}

/// Entity manager and component managers, kept the same size
#[derive(Debug)]
pub struct World {
    entities: EntityManager,
    components: ComponentManagerContainer,
}

impl World {
    /// World with the default capacity and growth step
    pub fn new() -> Self {
        Self::with_capacity(EntityManager::DEFAULT_CAPACITY, EntityManager::DEFAULT_GROW_STEP)
    }

    /// World with `capacity` slots that grows by `grow_step` when full
    pub fn with_capacity(capacity: usize, grow_step: usize) -> Self {
        Self {
            entities: EntityManager::with_capacity(capacity, grow_step),
            components: ComponentManagerContainer::new(capacity, grow_step),
        }
    }

    /// Entity slot count
    pub fn capacity(&self) -> usize {
        self.entities.capacity()
    }

    /// Live entity count
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entity is live
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Slot allocator and per-entity masks
    pub fn entity_manager(&self) -> &EntityManager {
        &self.entities
    }

    /// One component manager per type
    pub fn components(&self) -> &ComponentManagerContainer {
        &self.components
    }

    /// Allocate an entity
    ///
    /// Storage growth reaches the component managers and then `listener`.
    pub fn create_entity<L>(&mut self, listener: &mut L) -> Entity
    where
        L: EntityResizeListener + ?Sized,
    {
        self.entities.create_entity(&mut (&mut self.components, listener))
    }

    /// Grow every entity-indexed array to at least `new_size`
    pub fn resize<L>(&mut self, new_size: usize, listener: &mut L)
    where
        L: EntityResizeListener + ?Sized,
    {
        self.entities.resize_entity(new_size, &mut (&mut self.components, listener));
    }

    /// Run every component's cleanup hook and free the entity
    pub fn destroy_entity(&mut self, entity: Entity) -> EcsResult<MaskChange> {
        let mask = self.entities.mask(entity)?;
        for ty in mask.types() {
            self.components.destroy_component(entity, ty)?;
        }
        let old = self.entities.destroy_entity(entity)?;
        Ok(MaskChange {
            entity,
            old,
            new: ComponentMask::empty(),
        })
    }

    /// Whether `entity` refers to an allocated slot
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Component mask of a live entity
    pub fn mask(&self, entity: Entity) -> EcsResult<ComponentMask> {
        self.entities.mask(entity)
    }

    /// Live entities whose mask contains `signature`
    pub fn entities_with(&self, signature: ComponentMask) -> impl Iterator<Item = Entity> + '_ {
        self.entities
            .entities()
            .filter(move |entity| self.entities.mask(*entity).is_ok_and(|mask| mask.matches(signature)))
    }

    /// Every live entity in slot order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.entities()
    }

    /// Store `component` on the entity, replacing any previous value
    pub fn add_component<T: Component>(&mut self, entity: Entity, component: T) -> EcsResult<MaskChange> {
        self.entities.validate(entity)?;
        self.storage_mut::<T>()?.add_component(entity, component)?;
        self.set_bit(entity, T::TYPE)
    }

    /// Default-initialize a component by runtime tag
    pub fn create_component(&mut self, entity: Entity, ty: ComponentType) -> EcsResult<MaskChange> {
        self.entities.validate(entity)?;
        self.components.create_component(entity, ty)?;
        self.set_bit(entity, ty)
    }

    /// Decode a component document into the entity's slot
    pub fn decode_component(&mut self, entity: Entity, ty: ComponentType, value: &Value) -> EcsResult<MaskChange> {
        self.entities.validate(entity)?;
        self.components.decode_component(entity, ty, value)?;
        self.set_bit(entity, ty)
    }

    /// Encode a present component
    pub fn encode_component(&self, entity: Entity, ty: ComponentType) -> EcsResult<Value> {
        self.check(entity, ty)?;
        self.components.encode_component(entity, ty)
    }

    /// Remove `T` from the entity
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> EcsResult<MaskChange> {
        self.destroy_component(entity, T::TYPE)
    }

    /// Remove a component by runtime tag; removing an absent component is an error
    pub fn destroy_component(&mut self, entity: Entity, ty: ComponentType) -> EcsResult<MaskChange> {
        self.check(entity, ty)?;
        self.components.destroy_component(entity, ty)?;
        let (old, new) = self.entities.destroy_component(entity, ty)?;
        Ok(MaskChange { entity, old, new })
    }

    /// Whether the entity is live and carries `T`
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.has_component(entity, T::TYPE)
    }

    /// Whether the entity is live and carries `ty`
    pub fn has_component(&self, entity: Entity, ty: ComponentType) -> bool {
        self.entities.has_component(entity, ty).unwrap_or(false)
    }

    /// Component of a live entity that carries it
    pub fn get<T: Component>(&self, entity: Entity) -> EcsResult<&T> {
        self.check(entity, T::TYPE)?;
        self.storage::<T>()?.get_unchecked(entity)
    }

    /// Mutable component of a live entity that carries it
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> EcsResult<&mut T> {
        self.check(entity, T::TYPE)?;
        self.storage_mut::<T>()?.get_unchecked_mut(entity)
    }

    /// Copy every component of `source` onto a fresh entity
    ///
    /// The returned change covers the whole transition from the empty
    /// mask to the clone's final mask.
    pub fn clone_entity<L>(&mut self, source: Entity, listener: &mut L) -> EcsResult<MaskChange>
    where
        L: EntityResizeListener + ?Sized,
    {
        let mask = self.entities.mask(source)?;
        let target = self.create_entity(listener);
        for ty in mask.types() {
            self.components.manager_mut(ty).clone_into(source, target)?;
            self.entities.add_component(target, ty)?;
        }
        Ok(MaskChange {
            entity: target,
            old: ComponentMask::empty(),
            new: self.entities.mask(target)?,
        })
    }

    fn check(&self, entity: Entity, ty: ComponentType) -> EcsResult<()> {
        if self.entities.has_component(entity, ty)? {
            Ok(())
        } else {
            Err(EcsError::MissingComponent { entity, component: ty })
        }
    }

    fn set_bit(&mut self, entity: Entity, ty: ComponentType) -> EcsResult<MaskChange> {
        let (old, new) = self.entities.add_component(entity, ty)?;
        Ok(MaskChange { entity, old, new })
    }

    fn storage<T: Component>(&self) -> EcsResult<&ComponentStorage<T>> {
        self.components.storage::<T>().ok_or(EcsError::UnknownComponentType(T::TYPE.index() as i64))
    }

    fn storage_mut<T: Component>(&mut self) -> EcsResult<&mut ComponentStorage<T>> {
        self.components
            .storage_mut::<T>()
            .ok_or(EcsError::UnknownComponentType(T::TYPE.index() as i64))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::{Light, Mesh, Tag, Transform};
    use nalgebra::Vector3;

    #[derive(Default)]
    struct SideArray(Vec<u32>);

    impl EntityResizeListener for SideArray {
        fn on_entity_resize(&mut self, new_size: usize) {
            self.0.resize(new_size, 0);
        }
    }

    #[test]
    fn test_slot_reuse_scenario() {
        let mut world = World::new();
        let entities: Vec<_> = (0..5).map(|_| world.create_entity(&mut ())).collect();
        let e3 = entities[2];
        world.add_component(e3, Tag::new("third")).unwrap();
        world.add_component(e3, Light::default()).unwrap();

        world.destroy_entity(e3).unwrap();
        let e6 = world.create_entity(&mut ());
        assert_eq!(e6, e3);
        assert_eq!(world.mask(e6).unwrap(), ComponentMask::empty());
        for ty in ComponentType::ALL {
            assert!(!world.has_component(e6, ty));
        }
        assert!(matches!(world.get::<Tag>(e6), Err(EcsError::MissingComponent { .. })));
    }

    #[test]
    fn test_mask_tracks_storage() {
        let mut world = World::new();
        let e = world.create_entity(&mut ());

        let change = world.add_component(e, Transform::default()).unwrap();
        assert_eq!(change.old, ComponentMask::empty());
        assert_eq!(change.new, ComponentMask::TRANSFORM);
        assert!(world.has::<Transform>(e));

        world.get_mut::<Transform>(e).unwrap().position = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(world.get::<Transform>(e).unwrap().position.y, 2.0);

        let change = world.remove_component::<Transform>(e).unwrap();
        assert_eq!(change.new, ComponentMask::empty());
        assert!(!world.has::<Transform>(e));
        assert!(world.get::<Transform>(e).is_err(), "tombstone must not be readable");

        assert!(matches!(
            world.remove_component::<Transform>(e),
            Err(EcsError::MissingComponent { component: ComponentType::Transform, .. })
        ));
    }

    #[test]
    fn test_readding_is_not_a_mask_change() {
        let mut world = World::new();
        let e = world.create_entity(&mut ());
        world.add_component(e, Tag::new("a")).unwrap();
        let change = world.add_component(e, Tag::new("b")).unwrap();
        assert!(change.is_unchanged());
        assert_eq!(world.get::<Tag>(e).unwrap().name, "b");
    }

    #[test]
    fn test_resize_reaches_components_and_listener() {
        let mut world = World::with_capacity(2, 2);
        let mut side = SideArray::default();
        for _ in 0..3 {
            world.create_entity(&mut side);
        }
        assert_eq!(world.capacity(), 4);
        assert_eq!(side.0.len(), 4);
        for ty in ComponentType::ALL {
            assert!(world.components().manager(ty).capacity() >= 4);
        }

        world.resize(33, &mut side);
        assert_eq!(side.0.len(), 33);
        for ty in ComponentType::ALL {
            assert!(world.components().manager(ty).capacity() >= 33);
        }
        let last = world.create_entity(&mut side);
        world.add_component(last, Tag::new("tail")).unwrap();
    }

    #[test]
    fn test_entities_with_signature() {
        let mut world = World::new();
        let a = world.create_entity(&mut ());
        let b = world.create_entity(&mut ());
        world.add_component(a, Transform::default()).unwrap();
        world.add_component(a, Mesh::new("cube")).unwrap();
        world.add_component(b, Transform::default()).unwrap();

        let meshes: Vec<_> = world.entities_with(ComponentMask::TRANSFORM | ComponentMask::MESH).collect();
        assert_eq!(meshes, vec![a]);
        assert_eq!(world.entities_with(ComponentMask::TRANSFORM).count(), 2);
    }

    #[test]
    fn test_clone_entity_copies_components() {
        let mut world = World::new();
        let prefab = world.create_entity(&mut ());
        world.add_component(prefab, Tag::new("rock")).unwrap();
        world
            .add_component(prefab, Transform::from_position(Vector3::new(4.0, 0.0, 0.0)))
            .unwrap();

        let change = world.clone_entity(prefab, &mut ()).unwrap();
        assert_ne!(change.entity, prefab);
        assert_eq!(change.new, ComponentMask::TAG | ComponentMask::TRANSFORM);
        assert_eq!(world.get::<Tag>(change.entity).unwrap().name, "rock");
        assert_eq!(world.get::<Transform>(change.entity).unwrap().position.x, 4.0);
    }

    #[test]
    fn test_dead_entity_is_rejected() {
        let mut world = World::new();
        let e = world.create_entity(&mut ());
        world.destroy_entity(e).unwrap();
        assert!(matches!(world.add_component(e, Tag::new("x")), Err(EcsError::InvalidEntity { .. })));
        assert!(world.destroy_entity(e).is_err());
        assert!(world.get::<Tag>(Entity::NULL).is_err());
    }
}
