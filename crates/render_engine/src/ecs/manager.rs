//! Type-erased component manager registry
//!
//! [`ComponentManagerContainer`] owns one [`ComponentManager`] per
//! [`ComponentType`], stored in a table indexed by the type's
//! discriminant. Runtime-tagged operations (scene decoding, prefab
//! cloning, entity destruction) go through the table; typed code
//! reaches the concrete [`ComponentStorage<T>`] by downcast.

use super::components::{Camera, Light, Material, Mesh, ShadowCaster, Tag, Transform};
use super::{Component, ComponentStorage, ComponentType, EcsResult, Entity, EntityResizeListener};
use serde_json::Value;
use std::any::Any;

/// Uniform capability interface over one component type's storage
pub trait ComponentManager: Any {
    /// Tag of the managed type
    fn component_type(&self) -> ComponentType;

    /// Number of slots
    fn capacity(&self) -> usize;

    /// Default-initialize the entity's slot
    fn create(&mut self, entity: Entity) -> EcsResult<()>;

    /// Run the cleanup hook for the entity's slot
    fn destroy(&mut self, entity: Entity) -> EcsResult<()>;

    /// Copy one entity's value into another entity's slot
    fn clone_into(&mut self, source: Entity, target: Entity) -> EcsResult<()>;

    /// Serialize the entity's slot
    fn encode(&self, entity: Entity) -> EcsResult<Value>;

    /// Deserialize into the entity's slot
    fn decode(&mut self, entity: Entity, value: &Value) -> EcsResult<()>;

    /// Grow storage to `new_size`
    fn on_entity_resize(&mut self, new_size: usize);

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ComponentManager for ComponentStorage<T> {
    fn component_type(&self) -> ComponentType {
        T::TYPE
    }

    fn capacity(&self) -> usize {
        ComponentStorage::capacity(self)
    }

    fn create(&mut self, entity: Entity) -> EcsResult<()> {
        self.create_component(entity).map(|_| ())
    }

    fn destroy(&mut self, entity: Entity) -> EcsResult<()> {
        self.destroy_component(entity)
    }

    fn clone_into(&mut self, source: Entity, target: Entity) -> EcsResult<()> {
        let value = self.get_unchecked(source)?.clone();
        self.add_component(target, value).map(|_| ())
    }

    fn encode(&self, entity: Entity) -> EcsResult<Value> {
        self.encode_component(entity)
    }

    fn decode(&mut self, entity: Entity, value: &Value) -> EcsResult<()> {
        self.decode_component(entity, value).map(|_| ())
    }

    fn on_entity_resize(&mut self, new_size: usize) {
        ComponentStorage::on_entity_resize(self, new_size);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Owns one manager per component type
pub struct ComponentManagerContainer {
    managers: Vec<Box<dyn ComponentManager>>,
}

impl ComponentManagerContainer {
    /// Build the dispatch table with every manager pre-sized to `capacity`
    pub fn new(capacity: usize, grow_step: usize) -> Self {
        fn boxed<T: Component>(capacity: usize, grow_step: usize) -> Box<dyn ComponentManager> {
            Box::new(ComponentStorage::<T>::with_capacity(capacity, grow_step))
        }

        let managers = vec![
            boxed::<Tag>(capacity, grow_step),
            boxed::<Transform>(capacity, grow_step),
            boxed::<Mesh>(capacity, grow_step),
            boxed::<Material>(capacity, grow_step),
            boxed::<Light>(capacity, grow_step),
            boxed::<Camera>(capacity, grow_step),
            boxed::<ShadowCaster>(capacity, grow_step),
        ];
        debug_assert!(managers
            .iter()
            .enumerate()
            .all(|(i, m)| m.component_type().index() == i));

        Self { managers }
    }

    /// Manager for a runtime tag
    pub fn manager(&self, ty: ComponentType) -> &dyn ComponentManager {
        self.managers[ty.index()].as_ref()
    }

    /// Mutable manager for a runtime tag
    pub fn manager_mut(&mut self, ty: ComponentType) -> &mut dyn ComponentManager {
        self.managers[ty.index()].as_mut()
    }

    /// Typed storage for `T`
    pub fn storage<T: Component>(&self) -> Option<&ComponentStorage<T>> {
        self.manager(T::TYPE).as_any().downcast_ref()
    }

    /// Mutable typed storage for `T`
    pub fn storage_mut<T: Component>(&mut self) -> Option<&mut ComponentStorage<T>> {
        self.manager_mut(T::TYPE).as_any_mut().downcast_mut()
    }

    /// Default-initialize a component by tag
    pub fn create_component(&mut self, entity: Entity, ty: ComponentType) -> EcsResult<()> {
        self.manager_mut(ty).create(entity)
    }

    /// Run the cleanup hook for a component by tag
    pub fn destroy_component(&mut self, entity: Entity, ty: ComponentType) -> EcsResult<()> {
        self.manager_mut(ty).destroy(entity)
    }

    /// Encode a component by tag
    pub fn encode_component(&self, entity: Entity, ty: ComponentType) -> EcsResult<Value> {
        self.manager(ty).encode(entity)
    }

    /// Decode a component by tag
    pub fn decode_component(&mut self, entity: Entity, ty: ComponentType, value: &Value) -> EcsResult<()> {
        self.manager_mut(ty).decode(entity, value)
    }

    /// Smallest slot count across managers
    pub fn capacity(&self) -> usize {
        self.managers.iter().map(|m| m.capacity()).min().unwrap_or(0)
    }
}

impl EntityResizeListener for ComponentManagerContainer {
    fn on_entity_resize(&mut self, new_size: usize) {
        for manager in &mut self.managers {
            manager.on_entity_resize(new_size);
        }
    }
}

impl std::fmt::Debug for ComponentManagerContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentManagerContainer")
            .field("types", &ComponentType::COUNT)
            .field("capacity", &self.capacity())
            .finish()
    }
}
