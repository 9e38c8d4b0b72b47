//! Entity handles and the entity manager
//!
//! Entities are 1-based slot indices. Slot `id - 1` holds the entity's
//! [`ComponentMask`]; destroyed slots are reused by later allocations.

use super::{ComponentMask, ComponentType, EcsError, EcsResult};

/// Entity identifier
///
/// `Entity::NULL` (id 0) never names a live entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Entity(u32);

impl Entity {
    /// The invalid handle
    pub const NULL: Self = Self(0);

    /// Wrap a raw id, e.g. one read back from a tool
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Get the entity ID
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Storage slot for this entity, `None` for the null handle
    pub const fn slot(self) -> Option<usize> {
        match self.0 {
            0 => None,
            id => Some(id as usize - 1),
        }
    }

    fn from_slot(slot: usize) -> Self {
        Self(u32::try_from(slot + 1).unwrap_or(u32::MAX))
    }

    /// Whether this is the null handle
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Receives the new slot count whenever entity storage grows
///
/// Everything that keeps an array indexed by entity slot implements this
/// so all such arrays stay the same length as the entity table.
pub trait EntityResizeListener {
    /// Grow entity-indexed storage to at least `new_size` slots
    fn on_entity_resize(&mut self, new_size: usize);
}

impl EntityResizeListener for () {
    fn on_entity_resize(&mut self, _new_size: usize) {}
}

impl<A, B> EntityResizeListener for (&mut A, &mut B)
where
    A: EntityResizeListener + ?Sized,
    B: EntityResizeListener + ?Sized,
{
    fn on_entity_resize(&mut self, new_size: usize) {
        self.0.on_entity_resize(new_size);
        self.1.on_entity_resize(new_size);
    }
}

/// Allocates entity handles and owns each entity's component mask
#[derive(Debug, Clone)]
pub struct EntityManager {
    masks: Vec<ComponentMask>,
    alive: Vec<bool>,
    // No free slot exists below this index.
    next_free: usize,
    live: usize,
    grow_step: usize,
}

impl EntityManager {
    /// Slots allocated by [`EntityManager::new`]
    pub const DEFAULT_CAPACITY: usize = 64;
    /// Growth increment used by [`EntityManager::new`]
    pub const DEFAULT_GROW_STEP: usize = 64;

    /// Create a manager with the default capacity and growth step
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY, Self::DEFAULT_GROW_STEP)
    }

    /// Create a manager with `capacity` slots that grows by `grow_step`
    pub fn with_capacity(capacity: usize, grow_step: usize) -> Self {
        Self {
            masks: vec![ComponentMask::empty(); capacity],
            alive: vec![false; capacity],
            next_free: 0,
            live: 0,
            grow_step: grow_step.max(1),
        }
    }

    /// Number of slots, live or free
    pub fn capacity(&self) -> usize {
        self.alive.len()
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no entity is live
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Allocate an entity, growing storage by the fixed step when full
    ///
    /// Growth is reported to `listener` before the handle is returned.
    pub fn create_entity<L>(&mut self, listener: &mut L) -> Entity
    where
        L: EntityResizeListener + ?Sized,
    {
        let slot = match self.alive[self.next_free..].iter().position(|alive| !alive) {
            Some(offset) => self.next_free + offset,
            None => {
                let slot = self.capacity();
                self.resize_entity(slot + self.grow_step, listener);
                slot
            }
        };

        self.alive[slot] = true;
        self.masks[slot] = ComponentMask::empty();
        self.next_free = slot + 1;
        self.live += 1;

        let entity = Entity::from_slot(slot);
        log::trace!("Created entity {}", entity.id());
        entity
    }

    /// Free an entity's slot, returning the mask it had
    pub fn destroy_entity(&mut self, entity: Entity) -> EcsResult<ComponentMask> {
        let slot = self.validate(entity)?;
        let mask = std::mem::take(&mut self.masks[slot]);
        self.alive[slot] = false;
        self.next_free = self.next_free.min(slot);
        self.live -= 1;
        log::trace!("Destroyed entity {}", entity.id());
        Ok(mask)
    }

    /// Grow every slot array to `new_size` and cascade to `listener`
    ///
    /// Shrinking is never performed; a smaller `new_size` is ignored.
    pub fn resize_entity<L>(&mut self, new_size: usize, listener: &mut L)
    where
        L: EntityResizeListener + ?Sized,
    {
        if new_size <= self.capacity() {
            return;
        }
        log::debug!("Growing entity storage {} -> {}", self.capacity(), new_size);
        self.masks.resize(new_size, ComponentMask::empty());
        self.alive.resize(new_size, false);
        listener.on_entity_resize(new_size);
    }

    /// Check that `entity` names a live slot and return the slot index
    pub fn validate(&self, entity: Entity) -> EcsResult<usize> {
        match entity.slot() {
            Some(slot) if self.alive.get(slot).copied().unwrap_or(false) => Ok(slot),
            _ => Err(EcsError::InvalidEntity { entity, capacity: self.capacity() }),
        }
    }

    /// Whether `entity` is currently live
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.validate(entity).is_ok()
    }

    /// Current component mask of a live entity
    pub fn mask(&self, entity: Entity) -> EcsResult<ComponentMask> {
        self.validate(entity).map(|slot| self.masks[slot])
    }

    /// Set the bit for `ty`, returning `(old, new)` masks
    pub fn add_component(&mut self, entity: Entity, ty: ComponentType) -> EcsResult<(ComponentMask, ComponentMask)> {
        let slot = self.validate(entity)?;
        let old = self.masks[slot];
        self.masks[slot] = old | ty.mask();
        Ok((old, self.masks[slot]))
    }

    /// Clear the bit for `ty`, returning `(old, new)` masks
    pub fn destroy_component(&mut self, entity: Entity, ty: ComponentType) -> EcsResult<(ComponentMask, ComponentMask)> {
        let slot = self.validate(entity)?;
        let old = self.masks[slot];
        self.masks[slot] = old - ty.mask();
        Ok((old, self.masks[slot]))
    }

    /// Whether the entity's bit for `ty` is set
    pub fn has_component(&self, entity: Entity, ty: ComponentType) -> EcsResult<bool> {
        self.mask(entity).map(|mask| mask.has(ty))
    }

    /// Live entities in slot order
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(slot, _)| Entity::from_slot(slot))
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}
