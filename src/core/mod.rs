//! Core data structures for the demo
//! Contains mesh arrays, GPU vertex layouts and shader uniforms.

pub mod mesh;
pub mod uniforms;
pub mod vertex;

// Re-export commonly used types
pub use mesh::MeshData;
pub use uniforms::Uniforms;
pub use vertex::{MeshInstance, ParticleInstance, Vertex};
