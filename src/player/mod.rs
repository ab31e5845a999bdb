//! Player-related modules
//! Contains the orbit camera, input handling and the movement controller.

pub mod camera;
pub mod input;
pub mod movement;

// Re-export commonly used types
pub use camera::Camera;
pub use input::InputState;
pub use movement::Mover;
