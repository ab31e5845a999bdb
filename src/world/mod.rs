//! Terrain generation and height queries
//! The heightmap sampler feeds the mesh builder once at startup; the height
//! query runs every frame.

pub mod heightmap;
pub mod terrain;

// Re-export commonly used types
pub use heightmap::Heightmap;
pub use terrain::Terrain;
