//! Component types, masks and the component trait
//!
//! Every component kind has a stable integer tag ([`ComponentType`]) and a
//! bit in [`ComponentMask`]. The tag is what scene documents store; the
//! mask is what entities and renderers compare.

use super::{EcsError, EcsResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Runtime tag for every component kind the engine knows about
///
/// Discriminants are persisted in scene files and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ComponentType {
    /// Human readable name
    Tag = 0,
    /// Position, rotation and scale
    Transform = 1,
    /// Reference to renderable geometry
    Mesh = 2,
    /// Surface parameters
    Material = 3,
    /// Light emitter
    Light = 4,
    /// View/projection source
    Camera = 5,
    /// Marks a mesh as casting shadows
    ShadowCaster = 6,
}

impl ComponentType {
    /// Every component type in discriminant order
    pub const ALL: [Self; 7] = [
        Self::Tag,
        Self::Transform,
        Self::Mesh,
        Self::Material,
        Self::Light,
        Self::Camera,
        Self::ShadowCaster,
    ];

    /// Number of component types
    pub const COUNT: usize = Self::ALL.len();

    /// Dense index used by dispatch tables
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Single-bit mask for this type
    pub const fn mask(self) -> ComponentMask {
        ComponentMask::from_bits_retain(1 << self as u64)
    }

    /// Resolve a persisted integer tag
    pub fn from_index(index: i64) -> EcsResult<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(EcsError::UnknownComponentType(index))
    }

    /// Display name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tag => "Tag",
            Self::Transform => "Transform",
            Self::Mesh => "Mesh",
            Self::Material => "Material",
            Self::Light => "Light",
            Self::Camera => "Camera",
            Self::ShadowCaster => "ShadowCaster",
        }
    }
}

// The mask is a u64; more component types than bits would silently alias.
const _: () = assert!(ComponentType::COUNT <= u64::BITS as usize);

bitflags::bitflags! {
    /// Set of component types
    ///
    /// On an entity it records which components are live. On a renderer it
    /// is the signature an entity must contain to be drawn by it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ComponentMask: u64 {
        /// [`ComponentType::Tag`]
        const TAG = 1 << 0;
        /// [`ComponentType::Transform`]
        const TRANSFORM = 1 << 1;
        /// [`ComponentType::Mesh`]
        const MESH = 1 << 2;
        /// [`ComponentType::Material`]
        const MATERIAL = 1 << 3;
        /// [`ComponentType::Light`]
        const LIGHT = 1 << 4;
        /// [`ComponentType::Camera`]
        const CAMERA = 1 << 5;
        /// [`ComponentType::ShadowCaster`]
        const SHADOW_CASTER = 1 << 6;
    }
}

impl Default for ComponentMask {
    fn default() -> Self {
        Self::empty()
    }
}

impl ComponentMask {
    /// Whether this mask satisfies a signature
    pub const fn matches(self, signature: Self) -> bool {
        self.contains(signature)
    }

    /// Whether the bit for `ty` is set
    pub const fn has(self, ty: ComponentType) -> bool {
        self.contains(ty.mask())
    }

    /// Component types present in the mask, in discriminant order
    pub fn types(self) -> impl Iterator<Item = ComponentType> {
        ComponentType::ALL.into_iter().filter(move |ty| self.has(*ty))
    }
}

impl From<ComponentType> for ComponentMask {
    fn from(ty: ComponentType) -> Self {
        ty.mask()
    }
}

/// Plain data attached to entities
///
/// `Default` is the freshly created state, serde is the scene document
/// mapping. Implementors should mark their structs `#[serde(default)]` so
/// that missing fields decode to defaults.
pub trait Component: Default + Clone + Serialize + DeserializeOwned + 'static {
    /// Runtime tag of this component type
    const TYPE: ComponentType;

    /// Release anything the component owns outside of its storage slot
    fn on_destroy(&mut self) {}
}
