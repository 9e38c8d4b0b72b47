//! Dense per-type component storage
//!
//! Slot `entity - 1` of a [`ComponentStorage<T>`] holds that entity's `T`.
//! A slot is only meaningful while the entity's mask bit for `T` is set:
//! destroying a component leaves the old value in place as a tombstone.
//! The array grows in fixed increments and never shrinks.

use super::{Component, EcsError, EcsResult, Entity};
use serde::Deserialize;
use serde_json::Value;

/// Fixed-step growable array of one component type
#[derive(Debug, Clone)]
pub struct ComponentStorage<T: Component> {
    components: Vec<T>,
    grow_step: usize,
}

impl<T: Component> ComponentStorage<T> {
    /// Create storage pre-sized to `capacity` default values
    pub fn with_capacity(capacity: usize, grow_step: usize) -> Self {
        Self {
            components: vec![T::default(); capacity],
            grow_step: grow_step.max(1),
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.components.len()
    }

    fn slot(&self, entity: Entity) -> EcsResult<usize> {
        entity
            .slot()
            .filter(|slot| *slot < self.components.len())
            .ok_or(EcsError::InvalidEntity { entity, capacity: self.components.len() })
    }

    // Creation may outrun a resize notification, so grow on demand.
    fn ensure_slot(&mut self, entity: Entity) -> EcsResult<usize> {
        let slot = entity
            .slot()
            .ok_or(EcsError::InvalidEntity { entity, capacity: self.components.len() })?;
        if slot >= self.components.len() {
            let steps = (slot + 1 - self.components.len()).div_ceil(self.grow_step);
            self.on_entity_resize(self.components.len() + steps * self.grow_step);
        }
        Ok(slot)
    }

    /// Reset the entity's slot to `T::default()` and return it
    pub fn create_component(&mut self, entity: Entity) -> EcsResult<&mut T> {
        self.add_component(entity, T::default())
    }

    /// Move a caller supplied value into the entity's slot
    pub fn add_component(&mut self, entity: Entity, component: T) -> EcsResult<&mut T> {
        let slot = self.ensure_slot(entity)?;
        self.components[slot] = component;
        Ok(&mut self.components[slot])
    }

    /// Read the slot without consulting the entity mask
    ///
    /// The caller must already know the entity has this component; a
    /// cleared slot still returns its stale value.
    pub(crate) fn get_unchecked(&self, entity: Entity) -> EcsResult<&T> {
        let slot = self.slot(entity)?;
        Ok(&self.components[slot])
    }

    /// Mutable counterpart of [`ComponentStorage::get_unchecked`]
    pub(crate) fn get_unchecked_mut(&mut self, entity: Entity) -> EcsResult<&mut T> {
        let slot = self.slot(entity)?;
        Ok(&mut self.components[slot])
    }

    /// Run the component's cleanup hook; the slot keeps its value
    pub fn destroy_component(&mut self, entity: Entity) -> EcsResult<()> {
        let slot = self.slot(entity)?;
        self.components[slot].on_destroy();
        Ok(())
    }

    /// Grow to `new_size` slots, preserving existing entries
    pub fn on_entity_resize(&mut self, new_size: usize) {
        if new_size > self.components.len() {
            self.components.resize(new_size, T::default());
        }
    }

    /// Serialize the entity's slot to a JSON object
    pub fn encode_component(&self, entity: Entity) -> EcsResult<Value> {
        let component = self.get_unchecked(entity)?;
        serde_json::to_value(component).map_err(|e| EcsError::Decode {
            component: T::TYPE,
            reason: e.to_string(),
        })
    }

    /// Decode a JSON object into the entity's slot
    ///
    /// Fields absent from `value` take their default values.
    pub fn decode_component(&mut self, entity: Entity, value: &Value) -> EcsResult<&mut T> {
        let component = T::deserialize(value).map_err(|e| EcsError::Decode {
            component: T::TYPE,
            reason: e.to_string(),
        })?;
        self.add_component(entity, component)
    }
}
