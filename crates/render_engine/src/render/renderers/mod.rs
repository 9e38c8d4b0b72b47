//! Built-in renderers
//!
//! - [`MeshRenderer`]: geometry pass for every entity with a transform and a mesh
//! - [`ShadowRenderer`]: depth-only pass for shadow casters
//! - [`DeferredRenderer`]: full-screen lighting over the G-buffer
//! - [`PostFilter`]: full-screen filter reading and writing a [`PingPong`] pair

pub mod deferred;
pub mod filter;
pub mod mesh;
pub mod shadow;

pub use deferred::{DeferredLight, DeferredRenderer};
pub use filter::{PingPong, PostFilter};
pub use mesh::MeshRenderer;
pub use shadow::ShadowRenderer;

use nalgebra::{Matrix4, Vector3};

/// Column-major array form of a matrix, as shaders read it
pub(crate) fn mat4(matrix: &Matrix4<f32>) -> [[f32; 4]; 4] {
    (*matrix).into()
}

pub(crate) fn vec4(vector: &Vector3<f32>, w: f32) -> [f32; 4] {
    [vector.x, vector.y, vector.z, w]
}
