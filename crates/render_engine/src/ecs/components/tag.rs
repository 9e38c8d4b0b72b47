//! Name component

use crate::ecs::{Component, ComponentType};
use serde::{Deserialize, Serialize};

/// Human readable entity name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    /// Display name
    pub name: String,
}

impl Tag {
    /// Create a tag with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Component for Tag {
    const TYPE: ComponentType = ComponentType::Tag;
}
