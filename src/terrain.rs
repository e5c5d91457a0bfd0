use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};
use wgpu::util::DeviceExt;

use crate::error::Result;
use crate::renderer::validated;
use crate::shaders;
use crate::texture::{GridTexture, RasterBuffer};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;
pub const PACKED_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

// ======================================
// === SHADER DATA STRUCTURES ===
// ======================================

/// The one uniform record bound by both the color and the depth program.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable, PartialEq)]
pub struct TerrainUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub elevation: f32,
    pub texture_frequency: f32,
    pub time: f32,
    _padding: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: (std::mem::size_of::<[f32; 3]>() * 2) as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Which of the two terrain programs a pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainProgram {
    Color,
    Depth,
}

impl TerrainProgram {
    pub fn label(self) -> &'static str {
        match self {
            TerrainProgram::Color => "Terrain Color",
            TerrainProgram::Depth => "Terrain Depth",
        }
    }

    pub fn source(self) -> String {
        match self {
            TerrainProgram::Color => shaders::generate_terrain_color_shader(),
            TerrainProgram::Depth => shaders::generate_terrain_depth_shader(),
        }
    }

    fn entry_points(self) -> (&'static str, &'static str) {
        match self {
            TerrainProgram::Color => ("vs_color", "fs_color"),
            TerrainProgram::Depth => ("vs_depth", "fs_depth"),
        }
    }
}

// ======================================
// === CPU MIRROR OF THE SHADERS ===
// ======================================

/// Output of the color vertex stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorVaryings {
    pub clip_position: Vec4,
    pub uv: Vec2,
}

impl TerrainUniforms {
    pub fn new(elevation: f32, texture_frequency: f32) -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            model: Mat4::IDENTITY.to_cols_array_2d(),
            elevation,
            texture_frequency,
            time: 0.0,
            _padding: 0.0,
        }
    }

    pub fn set_view_proj(&mut self, view_proj: Mat4) {
        self.view_proj = view_proj.to_cols_array_2d();
    }

    pub fn set_model(&mut self, model: Mat4) {
        self.model = model.to_cols_array_2d();
    }

    /// `terrain_displace`: lift along local +Y by the sampled signal.
    pub fn displace(&self, raster: &RasterBuffer, position: Vec3, uv: Vec2) -> Vec3 {
        let scaled = uv * self.texture_frequency;
        let signal = raster.elevation_at(scaled.x, scaled.y);
        position + Vec3::Y * (self.elevation * signal)
    }

    /// `terrain_clip_position`: displacement, then model and view-projection.
    pub fn clip_position(&self, raster: &RasterBuffer, position: Vec3, uv: Vec2) -> Vec4 {
        let model = Mat4::from_cols_array_2d(&self.model);
        let view_proj = Mat4::from_cols_array_2d(&self.view_proj);
        let world = model * self.displace(raster, position, uv).extend(1.0);
        view_proj * world
    }

    /// `vs_color`.
    pub fn color_vertex(&self, raster: &RasterBuffer, vertex: &Vertex) -> ColorVaryings {
        let uv = Vec2::from(vertex.uv);
        ColorVaryings {
            clip_position: self.clip_position(raster, Vec3::from(vertex.position), uv),
            uv,
        }
    }

    /// `vs_depth`.
    pub fn depth_vertex(&self, raster: &RasterBuffer, vertex: &Vertex) -> Vec4 {
        self.clip_position(raster, Vec3::from(vertex.position), Vec2::from(vertex.uv))
    }
}

const PACK_UPSCALE: f32 = 256.0 / 255.0;
const UNPACK_DOWNSCALE: f32 = 255.0 / 256.0;
const SHIFT_RIGHT_8: f32 = 1.0 / 256.0;
const PACK_FACTORS: [f32; 3] = [256.0 * 256.0 * 256.0, 256.0 * 256.0, 256.0];

/// `pack_depth`: spreads a [0, 1) depth over four 8-bit channels.
pub fn pack_depth(depth: f32) -> [f32; 4] {
    let fract = |v: f32| v - v.floor();
    let mut r = [
        fract(depth * PACK_FACTORS[0]),
        fract(depth * PACK_FACTORS[1]),
        fract(depth * PACK_FACTORS[2]),
        depth,
    ];
    r[3] -= r[2] * SHIFT_RIGHT_8;
    r[2] -= r[1] * SHIFT_RIGHT_8;
    r[1] -= r[0] * SHIFT_RIGHT_8;
    r.map(|c| c * PACK_UPSCALE)
}

/// `unpack_depth`.
pub fn unpack_depth(packed: [f32; 4]) -> f32 {
    packed[0] * UNPACK_DOWNSCALE / PACK_FACTORS[0]
        + packed[1] * UNPACK_DOWNSCALE / PACK_FACTORS[1]
        + packed[2] * UNPACK_DOWNSCALE / PACK_FACTORS[2]
        + packed[3] * UNPACK_DOWNSCALE
}

// ======================================
// === GPU MATERIAL ===
// ======================================

/// Uniform buffer, grid texture and the two terrain pipelines that share
/// them through one bind group.
pub struct TerrainMaterial {
    pub uniforms: TerrainUniforms,
    pub uniform_buffer: wgpu::Buffer,
    pub grid_texture: GridTexture,
    pub bind_group: wgpu::BindGroup,
    pub color_pipeline: wgpu::RenderPipeline,
    pub depth_pipeline: wgpu::RenderPipeline,
}

impl TerrainMaterial {
    pub async fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        raster: &RasterBuffer,
        uniforms: TerrainUniforms,
        color_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Terrain Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let grid_texture = GridTexture::upload(device, queue, raster);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
            label: Some("terrain_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&grid_texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&grid_texture.sampler),
                },
            ],
            label: Some("terrain_bind_group"),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Terrain Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let color_pipeline = create_terrain_pipeline(
            device,
            &pipeline_layout,
            TerrainProgram::Color,
            wgpu::ColorTargetState {
                format: color_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            },
        )
        .await?;

        // Packed depth must land verbatim, so no blending at all.
        let depth_pipeline = create_terrain_pipeline(
            device,
            &pipeline_layout,
            TerrainProgram::Depth,
            wgpu::ColorTargetState {
                format: PACKED_DEPTH_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            },
        )
        .await?;

        Ok(Self {
            uniforms,
            uniform_buffer,
            grid_texture,
            bind_group,
            color_pipeline,
            depth_pipeline,
        })
    }

    pub fn write_uniforms(&mut self, queue: &wgpu::Queue, uniforms: TerrainUniforms) {
        if self.uniforms != uniforms {
            self.uniforms = uniforms;
            queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
        }
    }
}

async fn create_terrain_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    program: TerrainProgram,
    target: wgpu::ColorTargetState,
) -> Result<wgpu::RenderPipeline> {
    let (vs_entry, fs_entry) = program.entry_points();
    let label = program.label();

    validated(device, label, || {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(program.source().into()),
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(vs_entry),
                buffers: &[Vertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(fs_entry),
                targets: &[Some(target)],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // The plane is visible from below when orbiting under it.
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        })
    })
    .await
}
