//! Entity-Component-System implementation
//!
//! Entities are recyclable 1-based handles with a component bitmask.
//! Components live in dense per-type arrays indexed by `entity - 1`, and
//! the container dispatches runtime-tagged operations to them. [`World`]
//! keeps both in step and reports every mask transition.

pub mod component;
pub mod components;
pub mod entity;
pub mod error;
pub mod manager;
pub mod storage;
pub mod world;

pub use component::{Component, ComponentMask, ComponentType};
pub use entity::{Entity, EntityManager, EntityResizeListener};
pub use error::{EcsError, EcsResult};
pub use manager::{ComponentManager, ComponentManagerContainer};
pub use storage::ComponentStorage;
pub use world::{MaskChange, World};
