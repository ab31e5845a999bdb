use bytemuck::{Pod, Zeroable};

use crate::constants::MAX_LIGHTS;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct Uniforms {
    pub view_proj: [[f32; 4]; 4],
    /// View-projection with the camera translation removed, for the skybox.
    pub sky_view_proj: [[f32; 4]; 4],
    pub camera_pos: [f32; 3],
    pub time: f32,
    pub fog_colour: [f32; 3],
    /// Day-night blend factor for the skybox cubemap pair.
    pub sky_blend: f32,
    /// Camera basis vectors for particle billboarding.
    pub camera_right: [f32; 3],
    pub _pad0: f32,
    pub camera_up: [f32; 3],
    pub _pad1: f32,
    /// xyz = world position, w = 1.0 while the light slot is in use.
    pub light_positions: [[f32; 4]; MAX_LIGHTS],
    pub light_colours: [[f32; 4]; MAX_LIGHTS],
    /// Attenuation coefficients (constant, linear, quadratic).
    pub light_attenuations: [[f32; 4]; MAX_LIGHTS],
}
