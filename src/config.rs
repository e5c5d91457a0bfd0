use glam::Vec3;

use crate::error::{Result, TerrainError};
use crate::postprocess::DepthOfFieldParams;
use crate::texture::GridTextureSpec;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            near: 0.1,
            far: 100.0,
            position: Vec3::new(1.0, 1.0, 1.0),
            target: Vec3::ZERO,
        }
    }
}

/// Everything the scene needs at startup. Defaults reproduce the reference
/// scene: a 1000x1000 segment plane scaled 10x, orbit camera with damping
/// and a light depth-of-field blur.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    pub texture: GridTextureSpec,
    /// Displacement along local +Y for a fully lit texel.
    pub elevation: f32,
    /// How many times the texture tiles across the plane's UV range.
    pub texture_frequency: f32,
    pub mesh_size: f32,
    pub mesh_segments: u32,
    pub mesh_scale: f32,
    pub camera: CameraConfig,
    pub damping_factor: f32,
    /// sRGB clear color as 0xRRGGBB.
    pub clear_color: u32,
    pub depth_of_field: DepthOfFieldParams,
    pub max_pixel_ratio: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            texture: GridTextureSpec::default(),
            elevation: 0.05,
            texture_frequency: 10.0,
            mesh_size: 1.0,
            mesh_segments: 1000,
            mesh_scale: 10.0,
            camera: CameraConfig::default(),
            damping_factor: 0.05,
            clear_color: 0x111111,
            depth_of_field: DepthOfFieldParams::default(),
            max_pixel_ratio: crate::MAX_PIXEL_RATIO,
        }
    }
}

impl SceneConfig {
    pub fn validate(&self) -> Result<()> {
        if self.mesh_segments == 0 {
            return Err(TerrainError::invalid_config("mesh_segments must be at least 1"));
        }
        if !(self.mesh_size > 0.0) || !(self.mesh_scale > 0.0) {
            return Err(TerrainError::invalid_config(format!(
                "mesh size and scale must be positive, got {} and {}",
                self.mesh_size, self.mesh_scale
            )));
        }
        if !(self.texture_frequency > 0.0) {
            return Err(TerrainError::invalid_config("texture_frequency must be positive"));
        }
        let camera = &self.camera;
        if !(camera.near > 0.0 && camera.far > camera.near) {
            return Err(TerrainError::invalid_config(format!(
                "camera clip range must satisfy 0 < near < far, got {}..{}",
                camera.near, camera.far
            )));
        }
        if !(camera.fov_y_degrees > 0.0 && camera.fov_y_degrees < 180.0) {
            return Err(TerrainError::invalid_config("camera fov must be in (0, 180)"));
        }
        if !(0.0..=1.0).contains(&self.damping_factor) {
            return Err(TerrainError::invalid_config("damping_factor must be in [0, 1]"));
        }
        if !(self.max_pixel_ratio >= 1.0) {
            return Err(TerrainError::invalid_config("max_pixel_ratio must be at least 1"));
        }
        Ok(())
    }

    /// Clear color converted to linear space, since the render targets use
    /// sRGB views.
    pub fn clear_color_linear(&self) -> wgpu::Color {
        let channel = |shift: u32| srgb_to_linear(((self.clear_color >> shift) & 0xff) as f64 / 255.0);
        wgpu::Color {
            r: channel(16),
            g: channel(8),
            b: channel(0),
            a: 1.0,
        }
    }
}

fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(SceneConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_clip_range() {
        let mut config = SceneConfig::default();
        config.camera.near = 10.0;
        config.camera.far = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_segments() {
        let config = SceneConfig {
            mesh_segments: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn clear_color_is_linearized() {
        let color = SceneConfig::default().clear_color_linear();
        assert!((color.r - 0.005605).abs() < 1e-4);
        assert_eq!(color.r, color.g);
        assert_eq!(color.g, color.b);
        assert_eq!(color.a, 1.0);
    }
}
