// Terrain constants
pub const TERRAIN_SIZE: f32 = 1600.0;
pub const MAX_HEIGHT: f32 = 40.0;
// Half the packed 24-bit colour range (256^3 / 2)
pub const HALF_PIXEL_RANGE: f32 = 8_388_608.0;
pub const FALLBACK_HEIGHTMAP_SIZE: u32 = 128;
pub const TERRAIN_TEXTURE_TILES: f32 = 40.0;

// Player constants
pub const RUN_SPEED: f32 = 40.0;
pub const TURN_SPEED: f32 = 160.0;
pub const GRAVITY: f32 = -50.0;
pub const JUMP_POWER: f32 = 18.0;

// Camera constants
pub const CAMERA_START_DISTANCE: f32 = 50.0;
pub const CAMERA_START_PITCH: f32 = 20.0;

// Skybox constants
pub const SKYBOX_SIZE: f32 = 500.0;
pub const DAY_CYCLE_LENGTH: f32 = 24000.0;
pub const FOG_COLOUR: [f32; 3] = [0.544, 0.62, 0.69];

// Lighting
pub const MAX_LIGHTS: usize = 4;

// Particles
pub const PARTICLE_ATLAS_ROWS: u32 = 4;
pub const PROC_TEXTURE_SIZE: u32 = 256;
