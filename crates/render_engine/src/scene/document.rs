//! Scene documents
//!
//! ```json
//! { "name": "level", "entities": [ { "components": [ { "type": 1, "position": [0, 1, 0] } ] } ] }
//! ```
//!
//! `type` is the [`ComponentType`] discriminant; the remaining fields are
//! the component's own serde form. Loading is lenient: a component with
//! an unknown type or bad fields is logged and skipped, the rest of the
//! entity still loads.

use super::{Scene, SceneResult};
use crate::ecs::{ComponentType, EcsError, Entity};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const TYPE_KEY: &str = "type";

/// Whole-scene document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entities: Vec<EntityDocument>,
}

/// One entity and its tagged component objects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDocument {
    #[serde(default)]
    pub components: Vec<Value>,
}

/// Per-type component totals of a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentCounts {
    pub entities: usize,
    pub by_type: BTreeMap<ComponentType, usize>,
    /// Components whose `type` is missing or unknown
    pub unknown: usize,
}

impl SceneDocument {
    pub fn from_json(json: &str) -> SceneResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> SceneResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a document without building a scene
    pub fn load(path: impl AsRef<Path>) -> SceneResult<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> SceneResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn component_counts(&self) -> ComponentCounts {
        let mut counts = ComponentCounts {
            entities: self.entities.len(),
            ..ComponentCounts::default()
        };
        for component in self.entities.iter().flat_map(|entity| &entity.components) {
            match component_type(component) {
                Ok(ty) => *counts.by_type.entry(ty).or_default() += 1,
                Err(_) => counts.unknown += 1,
            }
        }
        counts
    }
}

/// Resolve the `type` tag of a component object
fn component_type(component: &Value) -> Result<ComponentType, EcsError> {
    let index = component
        .get(TYPE_KEY)
        .and_then(Value::as_i64)
        .ok_or(EcsError::UnknownComponentType(-1))?;
    ComponentType::from_index(index)
}

/// Component fields with the tag removed
fn component_fields(component: &Value) -> Value {
    match component {
        Value::Object(fields) => {
            let mut fields = fields.clone();
            fields.remove(TYPE_KEY);
            Value::Object(fields)
        }
        other => other.clone(),
    }
}

impl Scene {
    /// Snapshot every live entity
    pub fn to_document(&self) -> SceneDocument {
        let entities = self
            .world
            .entities()
            .map(|entity| EntityDocument {
                components: self.encode_entity(entity),
            })
            .collect();
        SceneDocument {
            name: self.name.clone(),
            entities,
        }
    }

    fn encode_entity(&self, entity: Entity) -> Vec<Value> {
        let Ok(mask) = self.world.mask(entity) else {
            return Vec::new();
        };
        mask.types()
            .filter_map(|ty| match self.world.encode_component(entity, ty) {
                Ok(Value::Object(fields)) => {
                    let mut tagged = Map::with_capacity(fields.len() + 1);
                    tagged.insert(TYPE_KEY.to_owned(), Value::from(ty as u8));
                    tagged.extend(fields);
                    Some(Value::Object(tagged))
                }
                Ok(other) => {
                    log::warn!("{} on entity {} did not encode to an object: {}", ty.name(), entity.id(), other);
                    None
                }
                Err(error) => {
                    log::warn!("Skipping {} on entity {}: {}", ty.name(), entity.id(), error);
                    None
                }
            })
            .collect()
    }

    /// Replace the scene's entities with the document's
    ///
    /// Returns the number of components that were skipped.
    pub fn load_document(&mut self, document: &SceneDocument) -> usize {
        self.clear();
        self.name.clone_from(&document.name);

        let mut skipped = 0;
        for entity_document in &document.entities {
            let entity = self.create_entity();
            for component in &entity_document.components {
                let loaded = component_type(component).and_then(|ty| {
                    let change = self.world.decode_component(entity, ty, &component_fields(component))?;
                    self.apply(change);
                    Ok(())
                });
                if let Err(error) = loaded {
                    log::warn!("Skipping component on entity {}: {}", entity.id(), error);
                    skipped += 1;
                }
            }
        }
        log::info!(
            "Loaded scene '{}': {} entities, {} components skipped",
            self.name,
            document.entities.len(),
            skipped
        );
        skipped
    }

    /// Build a scene from a document
    pub fn from_document(document: &SceneDocument) -> Self {
        let mut scene = Self::new(document.name.clone());
        scene.load_document(document);
        scene
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> SceneResult<()> {
        let path = path.as_ref();
        self.to_document().save(path)?;
        log::info!("Saved scene '{}' to {}", self.name, path.display());
        Ok(())
    }

    /// Load a scene file into this scene
    ///
    /// The file is parsed before anything is touched; on error the scene
    /// keeps its current contents and the failure is logged.
    pub fn load_json(&mut self, path: impl AsRef<Path>) -> SceneResult<usize> {
        let path = path.as_ref();
        let document = SceneDocument::load(path).map_err(|error| {
            log::error!("Failed to load scene {}: {}", path.display(), error);
            error
        })?;
        Ok(self.load_document(&document))
    }
}
