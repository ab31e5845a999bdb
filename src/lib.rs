// Core module with mesh arrays, vertex layouts and uniforms
pub mod core;

// Player module with the orbit camera, input and movement
pub mod player;

// Render module with asset loading and GPU uploads
pub mod render;

// Scene module with entities, lights, particles and the skybox clock
pub mod scene;

// World module with the heightmap sampler and terrain
pub mod world;

pub mod constants;

// Re-exports
pub use constants::*;
pub use crate::core::{MeshData, MeshInstance, ParticleInstance, Uniforms, Vertex};
pub use player::{Camera, InputState, Mover};
pub use render::{GpuMesh, load_obj};
pub use scene::{Entity, Light, ParticleRegistry, ParticleSystem, ParticleTexture, SkyCycle};
pub use world::{Heightmap, Terrain};
