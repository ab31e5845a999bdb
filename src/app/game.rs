use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bytemuck::Zeroable;
use cgmath::{Deg, Matrix4, Vector3};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wgpu::util::DeviceExt;
use winit::{
    event::{DeviceEvent, ElementState, Event, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowBuilder},
};

use terrarust::constants::{
    FALLBACK_HEIGHTMAP_SIZE, FOG_COLOUR, MAX_LIGHTS, PARTICLE_ATLAS_ROWS, PROC_TEXTURE_SIZE,
    TERRAIN_SIZE,
};
use terrarust::core::{MeshData, MeshInstance, ParticleInstance, Uniforms, Vertex};
use terrarust::player::{Camera, InputState, Mover};
use terrarust::render::texture::{self, TerrainTile};
use terrarust::render::upload::{self, GpuMesh};
use terrarust::render::{load_obj, models};
use terrarust::scene::{
    Entity, Light, ParticleRegistry, ParticleSystem, ParticleTexture, SkyCycle, skybox,
};
use terrarust::world::{Heightmap, Terrain};

/// Terrain walker demo
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Heightmap image (24-bit RGB); procedural terrain when absent
    #[arg(long)]
    heightmap: Option<PathBuf>,

    /// Directory with OBJ models and textures; built-in assets when absent
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Seed for procedural terrain and scenery placement
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[cfg_attr(rustfmt, rustfmt_skip)]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const SKY_VERTEX_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: 12,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![0 => Float32x3],
};

// Model table slots; entities reference these by index.
const MODEL_FIGURE: usize = 0;
const MODEL_TREE: usize = 1;
const MODEL_FERN: usize = 2;
const MODEL_LAMP: usize = 3;
const MODEL_CRATE: usize = 4;

/// A drawable model: its GPU mesh, its material bind group and how many
/// rows its colour texture atlas has.
struct Model {
    mesh: GpuMesh,
    bind_group: wgpu::BindGroup,
    atlas_rows: u32,
}

fn load_model(
    assets: Option<&Path>,
    name: &str,
    with_tangents: bool,
    fallback: fn() -> MeshData,
) -> MeshData {
    if let Some(dir) = assets {
        let path = dir.join(name);
        let loaded = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|source| load_obj(&source, with_tangents));
        match loaded {
            Ok(mesh) => {
                tracing::info!(
                    "Loaded model {} ({} vertices)",
                    path.display(),
                    mesh.vertex_count()
                );
                return mesh;
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load {}: {}. Using built-in model.",
                    path.display(),
                    e
                );
            }
        }
    }
    fallback()
}

fn load_texture_data(
    assets: Option<&Path>,
    name: &str,
    fallback: impl FnOnce() -> Vec<u8>,
) -> (Vec<u8>, u32, u32) {
    if let Some(dir) = assets {
        let path = dir.join(name);
        match texture::load_rgba_image(&path) {
            Ok((data, width, height)) => {
                tracing::info!("Loaded texture {} ({}x{})", path.display(), width, height);
                return (data, width, height);
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load {}: {}. Using generated texture.",
                    path.display(),
                    e
                );
            }
        }
    }
    (fallback(), PROC_TEXTURE_SIZE, PROC_TEXTURE_SIZE)
}

struct State {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_texture: wgpu::TextureView,

    terrain_pipeline: wgpu::RenderPipeline,
    entity_pipeline: wgpu::RenderPipeline,
    sky_pipeline: wgpu::RenderPipeline,
    particle_pipeline: wgpu::RenderPipeline,

    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    terrain_bind_group: wgpu::BindGroup,
    sky_bind_group: wgpu::BindGroup,
    particle_bind_group: wgpu::BindGroup,

    terrain_mesh: GpuMesh,
    terrain_instance_buffer: wgpu::Buffer,
    sky_vertex_buffer: wgpu::Buffer,
    models: Vec<Model>,

    terrain: Terrain,
    entities: Vec<Entity>,
    player: usize,
    mover: Mover,
    camera: Camera,
    input: InputState,
    lights: Vec<Light>,
    sky_cycle: SkyCycle,
    particles: ParticleRegistry,
    fountain: ParticleSystem,
    rng: StdRng,

    last_frame: Instant,
    start_time: Instant,
}

impl State {
    async fn new(window: Window, args: Args) -> Self {
        let window = Arc::new(window);
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        tracing::info!("WGPU Instance created successfully");

        let surface = instance.create_surface(window.clone()).unwrap();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .unwrap();

        let info = adapter.get_info();
        tracing::info!(
            "Selected adapter: {} on {:?} backend",
            info.name,
            info.backend
        );
        if info.device_type == wgpu::DeviceType::Cpu {
            tracing::warn!("Running on CPU (software renderer). Performance will be poor.");
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: Default::default(),
                experimental_features: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .unwrap();

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture = upload::create_depth_texture(&device, &config);

        // World
        let heightmap = match args.heightmap.as_deref() {
            Some(path) => match Heightmap::from_file(path) {
                Ok(map) => {
                    tracing::info!(
                        "Loaded heightmap {} ({}x{})",
                        path.display(),
                        map.side(),
                        map.side()
                    );
                    map
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to load {}: {}. Using procedural heightmap.",
                        path.display(),
                        e
                    );
                    Heightmap::procedural(FALLBACK_HEIGHTMAP_SIZE, args.seed as u32)
                }
            },
            None => Heightmap::procedural(FALLBACK_HEIGHTMAP_SIZE, args.seed as u32),
        };
        let terrain = Terrain::new(0, -1, &heightmap);
        let terrain_mesh = upload::upload_mesh(&device, "Terrain Mesh", terrain.mesh());
        tracing::info!(
            "Terrain built: {} vertices, {} indices",
            terrain.mesh().vertex_count(),
            terrain.mesh().index_count()
        );

        let terrain_model: [[f32; 4]; 4] =
            Matrix4::from_translation(Vector3::new(terrain.x(), 0.0, terrain.z())).into();
        let terrain_instance_buffer =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Terrain Instance Buffer"),
                contents: bytemuck::cast_slice(&[MeshInstance {
                    model: terrain_model,
                    atlas: [0.0, 0.0, 1.0, 0.0],
                }]),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let sky_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sky Vertex Buffer"),
            contents: bytemuck::cast_slice(&skybox::cube_positions()),
            usage: wgpu::BufferUsages::VERTEX,
        });

        // Shaders
        let terrain_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Terrain Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/terrain.wgsl").into()),
        });
        let entity_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Entity Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/entity.wgsl").into()),
        });
        let sky_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Sky Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/sky.wgsl").into()),
        });
        let particle_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Particle Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/particle.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Uniform Buffer"),
            contents: bytemuck::cast_slice(&[Uniforms::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        // Samplers
        let ground_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Ground Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });
        let clamp_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Clamp Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let assets = args.assets.as_deref();

        // Terrain material: four ground tiles plus the blend map.
        let (grass, gw, gh) = load_texture_data(assets, "grass.png", || {
            texture::generate_terrain_tile(TerrainTile::Grass)
        });
        let (mud, mw, mh) = load_texture_data(assets, "mud.png", || {
            texture::generate_terrain_tile(TerrainTile::Mud)
        });
        let (flowers, fw, fh) = load_texture_data(assets, "flowers.png", || {
            texture::generate_terrain_tile(TerrainTile::Flowers)
        });
        let (path_tile, pw, ph) = load_texture_data(assets, "path.png", || {
            texture::generate_terrain_tile(TerrainTile::Path)
        });
        let (blend, bw, bh) = load_texture_data(assets, "blend_map.png", || {
            texture::generate_blend_map(args.seed as u32)
        });

        let grass_view = upload::create_texture(&device, &queue, "Grass Texture", &grass, gw, gh);
        let mud_view = upload::create_texture(&device, &queue, "Mud Texture", &mud, mw, mh);
        let flowers_view =
            upload::create_texture(&device, &queue, "Flowers Texture", &flowers, fw, fh);
        let path_view = upload::create_texture(&device, &queue, "Path Texture", &path_tile, pw, ph);
        let blend_view = upload::create_texture(&device, &queue, "Blend Map", &blend, bw, bh);

        // Bind group layouts
        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("uniform_bind_group_layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let cube_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::Cube,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };

        let terrain_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("terrain_bind_group_layout"),
                entries: &[
                    texture_entry(0),
                    texture_entry(1),
                    texture_entry(2),
                    texture_entry(3),
                    texture_entry(4),
                    sampler_entry(5),
                ],
            });
        let entity_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("entity_bind_group_layout"),
                entries: &[texture_entry(0), texture_entry(1), sampler_entry(2)],
            });
        let sky_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("sky_bind_group_layout"),
                entries: &[cube_entry(0), cube_entry(1), sampler_entry(2)],
            });
        let particle_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("particle_bind_group_layout"),
                entries: &[texture_entry(0), sampler_entry(1)],
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_bind_group"),
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let terrain_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("terrain_bind_group"),
            layout: &terrain_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&grass_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&mud_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&flowers_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&path_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&blend_view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&ground_sampler),
                },
            ],
        });

        // Skybox cubemaps: day and night.
        let day_faces: [Vec<u8>; 6] = std::array::from_fn(|face| {
            texture::generate_sky_face(face as u32, [201, 183, 164], [92, 136, 201], false)
        });
        let night_faces: [Vec<u8>; 6] = std::array::from_fn(|face| {
            texture::generate_sky_face(face as u32, [16, 18, 32], [3, 4, 10], true)
        });
        let day_view =
            upload::create_cubemap(&device, &queue, "Day Sky", &day_faces, PROC_TEXTURE_SIZE);
        let night_view =
            upload::create_cubemap(&device, &queue, "Night Sky", &night_faces, PROC_TEXTURE_SIZE);

        let sky_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sky_bind_group"),
            layout: &sky_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&day_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&night_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&clamp_sampler),
                },
            ],
        });

        let (atlas, aw, ah) =
            load_texture_data(assets, "particles.png", texture::generate_particle_atlas);
        let atlas_view = upload::create_texture(&device, &queue, "Particle Atlas", &atlas, aw, ah);
        let particle_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("particle_bind_group"),
            layout: &particle_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&atlas_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&clamp_sampler),
                },
            ],
        });

        // Entity models. The flat normal map keeps un-mapped models on the
        // same pipeline as the normal-mapped crate.
        let flat_normal = vec![128u8, 128, 255, 255];
        let flat_normal_view =
            upload::create_texture(&device, &queue, "Flat Normal Map", &flat_normal, 1, 1);
        let (crate_normal, nw, nh) = load_texture_data(assets, "crate_normal.png", || {
            texture::generate_normal_map(args.seed as u32)
        });
        let crate_normal_view =
            upload::create_texture(&device, &queue, "Crate Normal Map", &crate_normal, nw, nh);

        let make_model = |name: &str,
                              colour_name: &str,
                              base: [u8; 3],
                              tex_seed: u32,
                              with_tangents: bool,
                              atlas_rows: u32,
                              fallback: fn() -> MeshData|
         -> Model {
            let mesh = load_model(assets, name, with_tangents, fallback);
            let (colour, cw, ch) = load_texture_data(assets, colour_name, || {
                texture::generate_entity_texture(base, tex_seed)
            });
            let colour_view = upload::create_texture(&device, &queue, colour_name, &colour, cw, ch);
            let normal_view = if with_tangents {
                &crate_normal_view
            } else {
                &flat_normal_view
            };
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(name),
                layout: &entity_bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&colour_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(normal_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&ground_sampler),
                    },
                ],
            });
            Model {
                mesh: upload::upload_mesh(&device, name, &mesh),
                bind_group,
                atlas_rows,
            }
        };

        let models = vec![
            make_model(
                "figure.obj",
                "figure.png",
                [170, 90, 60],
                30,
                false,
                1,
                models::build_figure,
            ),
            make_model(
                "tree.obj",
                "tree.png",
                [70, 110, 50],
                31,
                false,
                1,
                models::build_tree,
            ),
            make_model(
                "fern.obj",
                "fern.png",
                [60, 120, 45],
                32,
                false,
                2,
                models::build_fern,
            ),
            make_model(
                "lamp.obj",
                "lamp.png",
                [90, 85, 80],
                33,
                false,
                1,
                models::build_lamp,
            ),
            make_model(
                "crate.obj",
                "crate.png",
                [160, 120, 80],
                34,
                true,
                1,
                models::build_crate,
            ),
        ];

        // Pipelines
        let pipeline_layout = |material_layout: &wgpu::BindGroupLayout| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout, material_layout],
                immediate_size: 0,
            })
        };
        let terrain_pipeline_layout = pipeline_layout(&terrain_bind_group_layout);
        let entity_pipeline_layout = pipeline_layout(&entity_bind_group_layout);
        let sky_pipeline_layout = pipeline_layout(&sky_bind_group_layout);
        let particle_pipeline_layout = pipeline_layout(&particle_bind_group_layout);

        let terrain_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Terrain Pipeline"),
            layout: Some(&terrain_pipeline_layout),
            cache: None,
            vertex: wgpu::VertexState {
                module: &terrain_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[Vertex::desc(), MeshInstance::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &terrain_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
        });

        let entity_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Entity Pipeline"),
            layout: Some(&entity_pipeline_layout),
            cache: None,
            vertex: wgpu::VertexState {
                module: &entity_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[Vertex::desc(), MeshInstance::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &entity_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
        });

        let sky_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sky Pipeline"),
            layout: Some(&sky_pipeline_layout),
            cache: None,
            vertex: wgpu::VertexState {
                module: &sky_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[SKY_VERTEX_LAYOUT],
            },
            fragment: Some(wgpu::FragmentState {
                module: &sky_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
        });

        let particle_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Particle Pipeline"),
            layout: Some(&particle_pipeline_layout),
            cache: None,
            vertex: wgpu::VertexState {
                module: &particle_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[ParticleInstance::desc()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &particle_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
        });

        // Scene
        let mut rng = StdRng::seed_from_u64(args.seed);
        let place = |rng: &mut StdRng, terrain: &Terrain| -> Vector3<f32> {
            let x = rng.random::<f32>() * (TERRAIN_SIZE - 2.0) + 1.0;
            let z = -(rng.random::<f32>() * (TERRAIN_SIZE - 2.0) + 1.0);
            Vector3::new(x, terrain.height_at(x, z), z)
        };

        let mut entities = Vec::new();
        let player_pos = Vector3::new(
            TERRAIN_SIZE / 2.0,
            terrain.height_at(TERRAIN_SIZE / 2.0, -TERRAIN_SIZE / 2.0),
            -TERRAIN_SIZE / 2.0,
        );
        entities.push(Entity::new(MODEL_FIGURE, player_pos, 0.0, 180.0, 0.0, 1.0));
        let player = 0;

        for _ in 0..60 {
            let position = place(&mut rng, &terrain);
            let yaw = rng.random::<f32>() * 360.0;
            let scale = 2.5 + rng.random::<f32>() * 1.5;
            entities.push(Entity::new(MODEL_TREE, position, 0.0, yaw, 0.0, scale));
        }
        for _ in 0..120 {
            let position = place(&mut rng, &terrain);
            let yaw = rng.random::<f32>() * 360.0;
            entities.push(
                Entity::new(MODEL_FERN, position, 0.0, yaw, 0.0, 1.0)
                    .with_atlas_index(rng.random_range(0..4)),
            );
        }
        for _ in 0..10 {
            let position = place(&mut rng, &terrain);
            let yaw = rng.random::<f32>() * 360.0;
            entities.push(Entity::new(MODEL_CRATE, position, 0.0, yaw, 0.0, 2.0));
        }

        // Three lamps near the spawn point, each with a point light at the
        // lamp head.
        let lamp_colours = [
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(0.0, 2.0, 2.0),
            Vector3::new(2.0, 2.0, 0.0),
        ];
        let mut lights = vec![Light::new(
            Vector3::new(0.0, 10000.0, -7000.0),
            Vector3::new(0.4, 0.4, 0.4),
        )];
        for (i, colour) in lamp_colours.iter().enumerate() {
            let x = player_pos.x + (i as f32 - 1.0) * 30.0;
            let z = player_pos.z - 25.0;
            let y = terrain.height_at(x, z);
            entities.push(Entity::new(
                MODEL_LAMP,
                Vector3::new(x, y, z),
                0.0,
                0.0,
                0.0,
                3.0,
            ));
            lights.push(Light::with_attenuation(
                Vector3::new(x, y + 10.0, z),
                *colour,
                Vector3::new(1.0, 0.01, 0.002),
            ));
        }

        let fountain = ParticleSystem::new(
            ParticleTexture {
                id: 0,
                rows: PARTICLE_ATLAS_ROWS,
            },
            50.0,
            25.0,
            0.3,
            4.0,
        );

        tracing::info!(
            "Scene ready: {} entities, {} lights",
            entities.len(),
            lights.len()
        );

        Self {
            window,
            surface,
            device,
            queue,
            config,
            depth_texture,
            terrain_pipeline,
            entity_pipeline,
            sky_pipeline,
            particle_pipeline,
            uniform_buffer,
            uniform_bind_group,
            terrain_bind_group,
            sky_bind_group,
            particle_bind_group,
            terrain_mesh,
            terrain_instance_buffer,
            sky_vertex_buffer,
            models,
            terrain,
            entities,
            player,
            mover: Mover::new(),
            camera: Camera::new(),
            input: InputState::default(),
            lights,
            sky_cycle: SkyCycle::new(),
            particles: ParticleRegistry::new(),
            fountain,
            rng,
            last_frame: Instant::now(),
            start_time: Instant::now(),
        }
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth_texture = upload::create_depth_texture(&self.device, &self.config);
    }

    fn update(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        self.mover.update(
            &mut self.entities[self.player],
            &self.terrain,
            &self.input,
            dt,
        );
        self.camera
            .update(&self.entities[self.player], &mut self.input);
        self.sky_cycle.advance(dt);

        let origin = self.entities[self.player].position;
        self.fountain
            .emit(&mut self.particles, origin, dt, &mut self.rng);
        self.particles.update(dt, self.camera.position);
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let aspect = self.config.width as f32 / self.config.height as f32;
        let proj = cgmath::perspective(Deg(70.0), aspect, 0.1, 2000.0);
        let view_mat = self.camera.view_matrix();
        let view_proj = OPENGL_TO_WGPU_MATRIX * proj * view_mat;
        let sky_view_proj = OPENGL_TO_WGPU_MATRIX * proj * self.camera.sky_view_matrix();

        // Rotation rows of the view matrix are the camera's world-space axes.
        let camera_right = [view_mat.x.x, view_mat.y.x, view_mat.z.x];
        let camera_up = [view_mat.x.y, view_mat.y.y, view_mat.z.y];

        let mut light_positions = [[0.0f32; 4]; MAX_LIGHTS];
        let mut light_colours = [[0.0f32; 4]; MAX_LIGHTS];
        let mut light_attenuations = [[1.0f32, 0.0, 0.0, 0.0]; MAX_LIGHTS];
        for (i, light) in self.lights.iter().take(MAX_LIGHTS).enumerate() {
            light_positions[i] = [light.position.x, light.position.y, light.position.z, 1.0];
            light_colours[i] = [light.colour.x, light.colour.y, light.colour.z, 0.0];
            light_attenuations[i] = [
                light.attenuation.x,
                light.attenuation.y,
                light.attenuation.z,
                0.0,
            ];
        }

        let t = self.sky_cycle.time();
        let cubemap = if (8000.0..21000.0).contains(&t) { 0 } else { 1 };
        let (stage, _, _) = self.sky_cycle.blend_stage(cubemap);

        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::cast_slice(&[Uniforms {
                view_proj: view_proj.into(),
                sky_view_proj: sky_view_proj.into(),
                camera_pos: self.camera.position.into(),
                time: self.start_time.elapsed().as_secs_f32(),
                fog_colour: FOG_COLOUR,
                sky_blend: stage as f32,
                camera_right,
                _pad0: 0.0,
                camera_up,
                _pad1: 0.0,
                light_positions,
                light_colours,
                light_attenuations,
            }]),
        );

        // Per-frame instance buffers, one per model slot.
        let mut groups: Vec<Vec<MeshInstance>> = vec![Vec::new(); self.models.len()];
        for entity in &self.entities {
            let model = &self.models[entity.model];
            let offset = entity.atlas_offset(model.atlas_rows);
            groups[entity.model].push(MeshInstance {
                model: entity.model_matrix().into(),
                atlas: [offset[0], offset[1], 1.0 / model.atlas_rows as f32, 0.0],
            });
        }
        let entity_buffers: Vec<Option<(wgpu::Buffer, u32)>> = groups
            .iter()
            .map(|instances| {
                if instances.is_empty() {
                    return None;
                }
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("Entity Instance Buffer"),
                        contents: bytemuck::cast_slice(instances),
                        usage: wgpu::BufferUsages::VERTEX,
                    });
                Some((buffer, instances.len() as u32))
            })
            .collect();

        let particle_buffers: Vec<(wgpu::Buffer, u32)> = self
            .particles
            .groups()
            .map(|(texture, list)| {
                let instances: Vec<ParticleInstance> = list
                    .iter()
                    .map(|p| ParticleInstance {
                        position: p.position.into(),
                        rotation: p.rotation.to_radians(),
                        scale: p.scale,
                        blend: p.blend,
                        atlas_offset1: p.atlas_offset1,
                        atlas_offset2: p.atlas_offset2,
                        atlas_rows: texture.rows as f32,
                        _pad: 0.0,
                    })
                    .collect();
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("Particle Instance Buffer"),
                        contents: bytemuck::cast_slice(&instances),
                        usage: wgpu::BufferUsages::VERTEX,
                    });
                (buffer, instances.len() as u32)
            })
            .collect();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Main Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: FOG_COLOUR[0] as f64,
                            g: FOG_COLOUR[1] as f64,
                            b: FOG_COLOUR[2] as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_pipeline(&self.sky_pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_bind_group(1, &self.sky_bind_group, &[]);
            pass.set_vertex_buffer(0, self.sky_vertex_buffer.slice(..));
            pass.draw(0..36, 0..1);

            pass.set_pipeline(&self.terrain_pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_bind_group(1, &self.terrain_bind_group, &[]);
            pass.set_vertex_buffer(0, self.terrain_mesh.vertex_buffer.slice(..));
            pass.set_vertex_buffer(1, self.terrain_instance_buffer.slice(..));
            pass.set_index_buffer(
                self.terrain_mesh.index_buffer.slice(..),
                wgpu::IndexFormat::Uint32,
            );
            pass.draw_indexed(0..self.terrain_mesh.num_indices, 0, 0..1);

            pass.set_pipeline(&self.entity_pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            for (model, buffer) in self.models.iter().zip(entity_buffers.iter()) {
                let Some((buffer, count)) = buffer else {
                    continue;
                };
                pass.set_bind_group(1, &model.bind_group, &[]);
                pass.set_vertex_buffer(0, model.mesh.vertex_buffer.slice(..));
                pass.set_vertex_buffer(1, buffer.slice(..));
                pass.set_index_buffer(
                    model.mesh.index_buffer.slice(..),
                    wgpu::IndexFormat::Uint32,
                );
                pass.draw_indexed(0..model.mesh.num_indices, 0, 0..*count);
            }

            pass.set_pipeline(&self.particle_pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_bind_group(1, &self.particle_bind_group, &[]);
            for (buffer, count) in &particle_buffers {
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(0..6, 0..*count);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

pub fn run_demo() {
    let args = Args::parse();

    let event_loop = EventLoop::new().unwrap();
    let window = WindowBuilder::new()
        .with_title("terrarust")
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720))
        .build(&event_loop)
        .unwrap();

    let mut state = pollster::block_on(State::new(window, args));

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent {
                    event: WindowEvent::Resized(size),
                    ..
                } => {
                    state.resize(size);
                    state.window.request_redraw();
                }
                Event::WindowEvent {
                    event: WindowEvent::RedrawRequested,
                    ..
                } => {
                    state.update();
                    match state.render() {
                        Ok(_) => {}
                        Err(wgpu::SurfaceError::Lost) => state.resize(state.window.inner_size()),
                        Err(wgpu::SurfaceError::OutOfMemory) => elwt.exit(),
                        Err(e) => tracing::error!("Render error: {:?}", e),
                    }
                    state.window.request_redraw();
                }
                Event::WindowEvent {
                    event:
                        WindowEvent::KeyboardInput {
                            event:
                                KeyEvent {
                                    physical_key: PhysicalKey::Code(key),
                                    state: key_state,
                                    ..
                                },
                            ..
                        },
                    ..
                } => {
                    let pressed = key_state == ElementState::Pressed;
                    match key {
                        KeyCode::KeyW => state.input.forward = pressed,
                        KeyCode::KeyS => state.input.backward = pressed,
                        KeyCode::KeyA => state.input.left = pressed,
                        KeyCode::KeyD => state.input.right = pressed,
                        KeyCode::Space => state.input.jump = pressed,
                        KeyCode::Escape if pressed => elwt.exit(),
                        _ => {}
                    }
                }
                Event::WindowEvent {
                    event:
                        WindowEvent::MouseInput {
                            state: btn_state,
                            button: MouseButton::Left,
                            ..
                        },
                    ..
                } => {
                    state.input.orbiting = btn_state == ElementState::Pressed;
                }
                Event::WindowEvent {
                    event: WindowEvent::MouseWheel { delta, .. },
                    ..
                } => {
                    state.input.wheel_delta += match delta {
                        MouseScrollDelta::LineDelta(_, y) => y * 40.0,
                        MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
                    };
                }
                Event::DeviceEvent {
                    event: DeviceEvent::MouseMotion { delta },
                    ..
                } => {
                    state.input.mouse_dx += delta.0 as f32;
                    state.input.mouse_dy += delta.1 as f32;
                }
                Event::AboutToWait => {
                    state.window.request_redraw();
                }
                Event::WindowEvent {
                    event: WindowEvent::CloseRequested,
                    ..
                } => elwt.exit(),
                _ => {}
            }
        })
        .unwrap();
}
