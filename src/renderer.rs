use std::sync::Arc;

use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::error::{Result, TerrainError};
use crate::geometry::{PlaneGeometry, TerrainMesh};
use crate::postprocess::{BokehPass, DepthOfFieldParams, EffectComposer, ScenePass};
use crate::scene::Scene;
use crate::terrain::{TerrainMaterial, TerrainUniforms};
use crate::texture::RasterBuffer;

/// Runs `build` inside a validation error scope so shader and pipeline
/// failures come back as `TerrainError::Shader` instead of panicking in the
/// uncaptured error handler.
pub(crate) async fn validated<T>(device: &wgpu::Device, label: &str, build: impl FnOnce() -> T) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    match device.pop_error_scope().await {
        Some(error) => Err(TerrainError::shader(label, error)),
        None => Ok(value),
    }
}

// ======================================
// === GPU CONTEXT ===
// ======================================

pub struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub window: Arc<Window>,
}

impl GpuContext {
    pub async fn new(window: Arc<Window>, size: PhysicalSize<u32>) -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                    backends: wgpu::Backends::GL,
                    ..Default::default()
                });
            } else {
                let instance = wgpu::Instance::default();
            }
        }

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await?;

        let info = adapter.get_info();
        log::info!("Using adapter `{}` ({:?})", info.name, info.backend);

        cfg_if::cfg_if! {
            if #[cfg(target_arch = "wasm32")] {
                // WebGL2 baseline, but keep the adapter's texture size so
                // high-DPI targets fit.
                let limits = wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());
            } else {
                let limits = wgpu::Limits::default().using_resolution(adapter.limits());
            }
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("terrainw device"),
                required_features: wgpu::Features::empty(),
                required_limits: limits,
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(TerrainError::UnsupportedSurface)?;
        log::debug!("Surface format {:?}", surface_format);

        let max_dimension = device.limits().max_texture_dimension_2d;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.clamp(1, max_dimension),
            height: size.height.clamp(1, max_dimension),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            window,
        })
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn clamp_size(&self, (width, height): (u32, u32)) -> (u32, u32) {
        let max_dimension = self.device.limits().max_texture_dimension_2d;
        (width.clamp(1, max_dimension), height.clamp(1, max_dimension))
    }

    pub fn configure(&mut self, size: PhysicalSize<u32>) {
        let (width, height) = self.clamp_size((size.width, size.height));
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    pub fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }
}

// ======================================
// === RENDERER ===
// ======================================

/// Owned snapshot of the scene data the GPU side is built from. Detached
/// from `Scene` so initialisation can run in a spawned future on the web.
#[derive(Debug, Clone)]
pub struct RendererSetup {
    pub raster: RasterBuffer,
    pub uniforms: TerrainUniforms,
    pub mesh_size: f32,
    pub mesh_segments: u32,
    pub clear_color: wgpu::Color,
    pub depth_of_field: DepthOfFieldParams,
    pub render_size: (u32, u32),
}

pub struct Renderer {
    pub gpu: GpuContext,
    composer: EffectComposer,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, setup: RendererSetup) -> Result<Self> {
        let surface_size = window.inner_size();
        let gpu = GpuContext::new(window, surface_size).await?;
        let color_format = gpu.color_format();

        let material = TerrainMaterial::new(&gpu.device, &gpu.queue, &setup.raster, setup.uniforms, color_format).await?;
        let mesh = TerrainMesh::upload(&gpu.device, &PlaneGeometry::ground(setup.mesh_size, setup.mesh_segments));
        let bokeh = BokehPass::new(&gpu.device, color_format, &setup.depth_of_field).await?;

        let mut composer = EffectComposer::new(&gpu.device, color_format, gpu.clamp_size(setup.render_size));
        composer.add_pass(&gpu.device, Box::new(ScenePass::new(material, mesh, setup.clear_color)));
        composer.add_pass(&gpu.device, Box::new(bokeh));

        log::debug!("Renderer initialised");
        Ok(Self { gpu, composer })
    }

    pub fn resize(&mut self, surface_size: PhysicalSize<u32>, render_size: (u32, u32)) {
        if surface_size.width == 0 || surface_size.height == 0 {
            return;
        }
        self.gpu.configure(surface_size);
        let render_size = self.gpu.clamp_size(render_size);
        self.composer.resize(&self.gpu.device, render_size);
    }

    pub fn reconfigure(&self) {
        self.gpu.reconfigure();
    }

    pub fn render(&mut self, scene: &Scene) -> std::result::Result<(), wgpu::SurfaceError> {
        let output = self.gpu.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Encoder"),
        });
        self.composer.render(&self.gpu.queue, &mut encoder, scene, &view);

        self.gpu.queue.submit([encoder.finish()]);
        self.gpu.window.pre_present_notify();
        output.present();

        Ok(())
    }
}
