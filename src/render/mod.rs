//! Asset loading and GPU resource creation.

pub mod models;
pub mod obj;
pub mod texture;
pub mod upload;

pub use obj::load_obj;
pub use upload::GpuMesh;
