use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use wgpu::util::DeviceExt;

use crate::error::Result;
use crate::geometry::TerrainMesh;
use crate::renderer::validated;
use crate::scene::Scene;
use crate::shaders;
use crate::terrain::{DEPTH_FORMAT, PACKED_DEPTH_FORMAT, TerrainMaterial};

pub const BOKEH_RINGS: [f32; 4] = [1.0, 0.9, 0.7, 0.4];
pub const BOKEH_RING_DIRECTIONS: u32 = 10;
const BOKEH_TAP_RADIUS: f32 = 0.4;

// ======================================
// === DEPTH OF FIELD (CPU MIRROR) ===
// ======================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthOfFieldParams {
    /// Distance from the camera to the sharp plane, in view units.
    pub focus: f32,
    pub aperture: f32,
    /// Largest blur offset in UV units.
    pub max_blur: f32,
}

impl Default for DepthOfFieldParams {
    fn default() -> Self {
        Self {
            focus: 1.0,
            aperture: 0.025,
            max_blur: 0.01,
        }
    }
}

impl DepthOfFieldParams {
    /// Signed blur offset for a fragment at view-space `view_z` (negative in
    /// front of the camera). Zero on the focus plane.
    pub fn blur_radius(&self, view_z: f32) -> f32 {
        ((self.focus + view_z) * self.aperture).clamp(-self.max_blur, self.max_blur)
    }
}

/// Inverse of the perspective depth mapping for a [0, 1] depth range.
pub fn perspective_depth_to_view_z(depth: f32, near: f32, far: f32) -> f32 {
    (near * far) / ((far - near) * depth - far)
}

/// Sample offsets of the bokeh kernel before aspect and blur scaling:
/// the center tap first, then each ring outermost to innermost.
pub fn bokeh_taps() -> Vec<Vec2> {
    let mut taps = Vec::with_capacity(1 + BOKEH_RINGS.len() * BOKEH_RING_DIRECTIONS as usize);
    taps.push(Vec2::ZERO);
    for scale in BOKEH_RINGS {
        for tap in 0..BOKEH_RING_DIRECTIONS {
            let angle = tap as f32 * std::f32::consts::TAU / BOKEH_RING_DIRECTIONS as f32;
            let (sin, cos) = angle.sin_cos();
            taps.push(Vec2::new(sin, cos) * BOKEH_TAP_RADIUS * scale);
        }
    }
    taps
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable, PartialEq)]
pub struct BokehUniforms {
    pub focus: f32,
    pub aperture: f32,
    pub max_blur: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    _padding: [f32; 2],
}

impl BokehUniforms {
    pub fn new(params: &DepthOfFieldParams, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            focus: params.focus,
            aperture: params.aperture,
            max_blur: params.max_blur,
            aspect,
            near,
            far,
            _padding: [0.0; 2],
        }
    }
}

// ======================================
// === RENDER TARGETS ===
// ======================================

pub struct Target {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Target {
    fn new(device: &wgpu::Device, label: &str, size: (u32, u32), format: wgpu::TextureFormat, sampled: bool) -> Self {
        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if sampled {
            usage |= wgpu::TextureUsages::TEXTURE_BINDING;
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Offscreen targets at render size. Recreated as a whole on resize.
pub struct RenderTargets {
    pub size: (u32, u32),
    pub color: Target,
    pub color_depth: Target,
    pub packed_depth: Target,
    pub packed_depth_depth: Target,
}

impl RenderTargets {
    pub fn new(device: &wgpu::Device, color_format: wgpu::TextureFormat, size: (u32, u32)) -> Self {
        let size = (size.0.max(1), size.1.max(1));
        log::debug!("Creating render targets at {}x{}", size.0, size.1);

        Self {
            size,
            color: Target::new(device, "Scene Color Target", size, color_format, true),
            color_depth: Target::new(device, "Scene Color Depth", size, DEPTH_FORMAT, false),
            packed_depth: Target::new(device, "Packed Depth Target", size, PACKED_DEPTH_FORMAT, true),
            packed_depth_depth: Target::new(device, "Packed Depth Depth", size, DEPTH_FORMAT, false),
        }
    }
}

// ======================================
// === COMPOSER ===
// ======================================

/// One stage of the frame. Passes run in insertion order; the last one is
/// expected to write `output`.
pub trait PostPass {
    fn label(&self) -> &str;

    /// Called after the shared targets were recreated.
    fn resize(&mut self, _device: &wgpu::Device, _targets: &RenderTargets) {}

    /// Uploads per-frame state before any pass records commands.
    fn prepare(&mut self, queue: &wgpu::Queue, scene: &Scene);

    fn render(&self, encoder: &mut wgpu::CommandEncoder, targets: &RenderTargets, output: &wgpu::TextureView);
}

pub struct EffectComposer {
    passes: Vec<Box<dyn PostPass>>,
    targets: RenderTargets,
    color_format: wgpu::TextureFormat,
}

impl EffectComposer {
    pub fn new(device: &wgpu::Device, color_format: wgpu::TextureFormat, size: (u32, u32)) -> Self {
        Self {
            passes: Vec::new(),
            targets: RenderTargets::new(device, color_format, size),
            color_format,
        }
    }

    pub fn targets(&self) -> &RenderTargets {
        &self.targets
    }

    pub fn add_pass(&mut self, device: &wgpu::Device, mut pass: Box<dyn PostPass>) {
        pass.resize(device, &self.targets);
        log::debug!("Added pass `{}`", pass.label());
        self.passes.push(pass);
    }

    pub fn resize(&mut self, device: &wgpu::Device, size: (u32, u32)) {
        if size == self.targets.size {
            return;
        }
        self.targets = RenderTargets::new(device, self.color_format, size);
        for pass in &mut self.passes {
            pass.resize(device, &self.targets);
        }
    }

    pub fn render(&mut self, queue: &wgpu::Queue, encoder: &mut wgpu::CommandEncoder, scene: &Scene, output: &wgpu::TextureView) {
        for pass in &mut self.passes {
            pass.prepare(queue, scene);
        }
        for pass in &self.passes {
            pass.render(encoder, &self.targets, output);
        }
    }
}

// ======================================
// === SCENE PASS ===
// ======================================

/// Draws the terrain twice: color program into the color target, depth
/// program into the packed depth target.
pub struct ScenePass {
    material: TerrainMaterial,
    mesh: TerrainMesh,
    clear_color: wgpu::Color,
}

impl ScenePass {
    pub fn new(material: TerrainMaterial, mesh: TerrainMesh, clear_color: wgpu::Color) -> Self {
        Self {
            material,
            mesh,
            clear_color,
        }
    }

    fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        target: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        clear: wgpu::Color,
        pipeline: &wgpu::RenderPipeline,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &self.material.bind_group, &[]);
        self.mesh.draw(&mut render_pass);
    }
}

impl PostPass for ScenePass {
    fn label(&self) -> &str {
        "Scene Pass"
    }

    fn prepare(&mut self, queue: &wgpu::Queue, scene: &Scene) {
        self.material.write_uniforms(queue, scene.uniforms);
    }

    fn render(&self, encoder: &mut wgpu::CommandEncoder, targets: &RenderTargets, _output: &wgpu::TextureView) {
        self.draw(
            encoder,
            "Terrain Color Pass",
            &targets.color.view,
            &targets.color_depth.view,
            self.clear_color,
            &self.material.color_pipeline,
        );
        // White packs to the far plane, so empty background reads as fully blurred.
        self.draw(
            encoder,
            "Terrain Depth Pass",
            &targets.packed_depth.view,
            &targets.packed_depth_depth.view,
            wgpu::Color::WHITE,
            &self.material.depth_pipeline,
        );
    }
}

// ======================================
// === BOKEH PASS ===
// ======================================

pub struct BokehPass {
    uniforms: BokehUniforms,
    uniform_buffer: wgpu::Buffer,
    color_sampler: wgpu::Sampler,
    depth_sampler: wgpu::Sampler,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: Option<wgpu::BindGroup>,
    pipeline: wgpu::RenderPipeline,
}

impl BokehPass {
    pub async fn new(device: &wgpu::Device, output_format: wgpu::TextureFormat, params: &DepthOfFieldParams) -> Result<Self> {
        let uniforms = BokehUniforms::new(params, 1.0, 0.1, 100.0);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Bokeh Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let color_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Bokeh Color Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        // Interpolating packed channels would corrupt the depth.
        let depth_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Bokeh Depth Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        };
        let sampler_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                texture_entry(0),
                texture_entry(1),
                sampler_entry(2),
                sampler_entry(3),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
            label: Some("bokeh_bind_group_layout"),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Bokeh Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = validated(device, "Bokeh", || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Bokeh Shader"),
                source: wgpu::ShaderSource::Wgsl(shaders::generate_bokeh_shader(BOKEH_RING_DIRECTIONS).into()),
            });

            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Bokeh Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_fullscreen"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_bokeh"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: output_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })
        .await?;

        Ok(Self {
            uniforms,
            uniform_buffer,
            color_sampler,
            depth_sampler,
            bind_group_layout,
            bind_group: None,
            pipeline,
        })
    }
}

impl PostPass for BokehPass {
    fn label(&self) -> &str {
        "Bokeh Pass"
    }

    fn resize(&mut self, device: &wgpu::Device, targets: &RenderTargets) {
        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&targets.color.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&targets.packed_depth.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.color_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.depth_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
            label: Some("bokeh_bind_group"),
        }));
    }

    fn prepare(&mut self, queue: &wgpu::Queue, scene: &Scene) {
        let camera = &scene.camera;
        let uniforms = BokehUniforms::new(&scene.config.depth_of_field, camera.aspect, camera.near, camera.far);
        if uniforms != self.uniforms {
            self.uniforms = uniforms;
            queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
        }
    }

    fn render(&self, encoder: &mut wgpu::CommandEncoder, _targets: &RenderTargets, output: &wgpu::TextureView) {
        let Some(bind_group) = &self.bind_group else {
            return;
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Bokeh Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec4};

    #[test]
    fn blur_is_zero_on_focus_plane_and_clamped() {
        let params = DepthOfFieldParams::default();
        assert_eq!(params.blur_radius(-params.focus), 0.0);
        assert_eq!(params.blur_radius(-100.0), -params.max_blur);
        assert_eq!(params.blur_radius(50.0), params.max_blur);

        let near_focus = params.blur_radius(-1.2);
        assert!((near_focus - (-0.2 * 0.025)).abs() < 1e-7);
    }

    #[test]
    fn depth_to_view_z_inverts_the_projection() {
        let (near, far) = (0.1, 100.0);
        let projection = Mat4::perspective_rh(75f32.to_radians(), 1.5, near, far);
        for view_z in [-0.1, -0.5, -1.0, -7.5, -42.0, -100.0] {
            let clip = projection * Vec4::new(0.0, 0.0, view_z, 1.0);
            let depth = clip.z / clip.w;
            let restored = perspective_depth_to_view_z(depth, near, far);
            assert!((restored - view_z).abs() / view_z.abs() < 1e-3, "{} -> {}", view_z, restored);
        }
    }

    #[test]
    fn kernel_has_forty_one_taps() {
        let taps = bokeh_taps();
        assert_eq!(taps.len(), 41);
        assert_eq!(taps[0], Vec2::ZERO);
        assert!(taps.iter().all(|t| t.length() <= BOKEH_TAP_RADIUS + 1e-6));

        let innermost = &taps[31..];
        assert!(innermost.iter().all(|t| (t.length() - 0.16).abs() < 1e-6));
    }

    #[test]
    fn uniform_layout() {
        assert_eq!(std::mem::size_of::<BokehUniforms>(), 32);
        let u = BokehUniforms::new(&DepthOfFieldParams::default(), 1.5, 0.1, 100.0);
        assert_eq!((u.focus, u.aperture, u.max_blur), (1.0, 0.025, 0.01));
    }
}
