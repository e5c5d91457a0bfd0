use glam::{Mat4, Vec3};

use crate::camera::{OrbitControls, PerspectiveCamera};
use crate::config::SceneConfig;
use crate::error::Result;
use crate::renderer::RendererSetup;
use crate::terrain::TerrainUniforms;
use crate::texture::{self, RasterBuffer};

/// Output surface size in logical pixels plus the pixel ratio the render
/// targets are allocated with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32, device_pixel_ratio: f32, max_pixel_ratio: f32) -> Self {
        let pixel_ratio = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio.min(max_pixel_ratio)
        } else {
            1.0
        };
        Self {
            width: width.max(1),
            height: height.max(1),
            pixel_ratio,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Physical size of the offscreen targets.
    pub fn render_size(&self) -> (u32, u32) {
        let scale = |logical: u32| ((logical as f32 * self.pixel_ratio).round() as u32).max(1);
        (scale(self.width), scale(self.height))
    }
}

/// Explicit owner of all per-scene state: camera, controls, viewport,
/// terrain uniforms and the generated grid raster. The app hands it to the
/// frame loop and the resize handler; nothing here is global.
pub struct Scene {
    pub config: SceneConfig,
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    pub viewport: Viewport,
    pub uniforms: TerrainUniforms,
    raster: RasterBuffer,
}

impl Scene {
    pub fn new(config: SceneConfig, width: u32, height: u32, device_pixel_ratio: f32) -> Result<Self> {
        config.validate()?;

        let viewport = Viewport::new(width, height, device_pixel_ratio, config.max_pixel_ratio);
        let camera = PerspectiveCamera::new(&config.camera, viewport.aspect());
        let controls = OrbitControls::new(config.camera.target, config.damping_factor);

        // Computed once, uploaded once.
        let raster = texture::generate(&config.texture);

        let mut uniforms = TerrainUniforms::new(config.elevation, config.texture_frequency);
        uniforms.set_model(Mat4::from_scale(Vec3::splat(config.mesh_scale)));
        uniforms.set_view_proj(camera.view_proj());

        log::info!(
            "Scene ready: {}x{} viewport at {:.2}x, {}x{} terrain segments",
            viewport.width,
            viewport.height,
            viewport.pixel_ratio,
            config.mesh_segments,
            config.mesh_segments
        );

        Ok(Self {
            config,
            camera,
            controls,
            viewport,
            uniforms,
            raster,
        })
    }

    pub fn raster(&self) -> &RasterBuffer {
        &self.raster
    }

    /// Applies a new surface size. Zero-sized updates (minimised windows)
    /// are ignored and return false.
    pub fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }

        self.viewport = Viewport::new(width, height, device_pixel_ratio, self.config.max_pixel_ratio);
        self.camera.set_aspect(self.viewport.aspect());
        self.uniforms.set_view_proj(self.camera.view_proj());

        log::debug!(
            "Resized viewport to {}x{} (ratio {:.2})",
            width,
            height,
            self.viewport.pixel_ratio
        );
        true
    }

    /// Per-frame update: controls first, then the uniforms both terrain
    /// programs read.
    pub fn tick(&mut self, elapsed_seconds: f32) {
        self.controls.update(&mut self.camera);
        self.uniforms.time = elapsed_seconds;
        self.uniforms.set_view_proj(self.camera.view_proj());
    }

    pub fn render_size(&self) -> (u32, u32) {
        self.viewport.render_size()
    }

    pub fn renderer_setup(&self) -> RendererSetup {
        RendererSetup {
            raster: self.raster.clone(),
            uniforms: self.uniforms,
            mesh_size: self.config.mesh_size,
            mesh_segments: self.config.mesh_segments,
            clear_color: self.config.clear_color_linear(),
            depth_of_field: self.config.depth_of_field,
            render_size: self.render_size(),
        }
    }
}
