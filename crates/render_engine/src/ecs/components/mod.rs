//! Built-in component types
//!
//! Each file defines one plain data record and its [`Component`](crate::ecs::Component)
//! tag. Renderers read them through the scene's checked accessors.

pub mod camera;
pub mod light;
pub mod material;
pub mod mesh;
pub mod shadow;
pub mod tag;
pub mod transform;

pub use camera::Camera;
pub use light::{Light, LightKind};
pub use material::Material;
pub use mesh::Mesh;
pub use shadow::ShadowCaster;
pub use tag::Tag;
pub use transform::Transform;
