//! Entity-indexed side array for renderer state
//!
//! Values are kept densely for iteration; a slot table indexed by
//! `entity - 1` locates each entity's value in O(1). The slot table grows
//! with the entity table through [`EntityMap::resize`].

use crate::ecs::Entity;

/// Per-entity values owned by a renderer
#[derive(Debug, Clone)]
pub struct EntityMap<T> {
    slots: Vec<Option<usize>>,
    values: Vec<(Entity, T)>,
}

impl<T> EntityMap<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Number of slots in the index table
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Grow the index table to `new_size` slots
    pub fn resize(&mut self, new_size: usize) {
        if new_size > self.slots.len() {
            self.slots.resize(new_size, None);
        }
    }

    /// Store `value` for `entity`, returning the value it replaced
    ///
    /// The null entity is ignored.
    pub fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        let slot = entity.slot()?;
        if slot >= self.slots.len() {
            log::warn!("Entity {} registered before side array growth", entity.id());
            self.resize(slot + 1);
        }
        match self.slots[slot] {
            Some(index) => Some(std::mem::replace(&mut self.values[index].1, value)),
            None => {
                self.slots[slot] = Some(self.values.len());
                self.values.push((entity, value));
                None
            }
        }
    }

    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let slot = entity.slot()?;
        let index = self.slots.get_mut(slot)?.take()?;
        let (_, value) = self.values.swap_remove(index);
        if let Some((moved, _)) = self.values.get(index) {
            if let Some(moved_slot) = moved.slot() {
                self.slots[moved_slot] = Some(index);
            }
        }
        Some(value)
    }

    fn index(&self, entity: Entity) -> Option<usize> {
        *self.slots.get(entity.slot()?)?
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.index(entity).is_some()
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.index(entity).map(|index| &self.values[index].1)
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.index(entity).map(|index| &mut self.values[index].1)
    }

    /// Registered entities, in no particular order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.values.iter().map(|(entity, _)| *entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.values.iter().map(|(entity, value)| (*entity, value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.values.iter_mut().map(|(entity, value)| (*entity, value))
    }
}

impl<T> Default for EntityMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
