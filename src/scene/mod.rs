//! Scene objects: entities, lights, particles and the skybox clock.

pub mod entity;
pub mod light;
pub mod particles;
pub mod skybox;

// Re-export commonly used types
pub use entity::Entity;
pub use light::Light;
pub use particles::{Particle, ParticleRegistry, ParticleSystem, ParticleTexture};
pub use skybox::SkyCycle;
