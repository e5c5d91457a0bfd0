use crate::error::{Result, TerrainError};

// ======================================
// === GRID TEXTURE SPEC ===
// ======================================

/// Describes the strip pattern painted into the terrain texture.
///
/// One opaque "big" band at the top edge, followed by `line_count - 1`
/// thinner translucent bands spread over the remaining height. Widths are
/// fractions of the texture height.
///
/// `big_line_width + line_count * small_line_width` should stay at or below
/// 1.0. Larger values are accepted but bands then overlap or get clipped at
/// the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTextureSpec {
    width: u32,
    height: u32,
    line_count: u32,
    big_line_width: f64,
    small_line_width: f64,
    small_line_alpha: f64,
    primary: [u8; 3],
    secondary: [u8; 3],
}

impl GridTextureSpec {
    pub fn new(
        width: u32,
        height: u32,
        line_count: u32,
        big_line_width: f64,
        small_line_width: f64,
        small_line_alpha: f64,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TerrainError::invalid_spec(format!(
                "dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        if line_count == 0 {
            return Err(TerrainError::invalid_spec("line_count must be at least 1"));
        }
        if !(big_line_width > 0.0 && big_line_width < 1.0) {
            return Err(TerrainError::invalid_spec(format!(
                "big_line_width must be in (0, 1), got {}",
                big_line_width
            )));
        }
        if !(small_line_width > 0.0 && small_line_width < 1.0) {
            return Err(TerrainError::invalid_spec(format!(
                "small_line_width must be in (0, 1), got {}",
                small_line_width
            )));
        }
        if !(0.0..=1.0).contains(&small_line_alpha) {
            return Err(TerrainError::invalid_spec(format!(
                "small_line_alpha must be in [0, 1], got {}",
                small_line_alpha
            )));
        }

        let overlap = big_line_width + line_count as f64 * small_line_width;
        if overlap > 1.0 {
            log::warn!(
                "grid texture bands cover {:.2} of the height, lines will overlap or clip",
                overlap
            );
        }

        Ok(Self {
            width,
            height,
            line_count,
            big_line_width,
            small_line_width,
            small_line_alpha,
            primary: [255, 255, 255],
            secondary: [255, 255, 255],
        })
    }

    pub fn with_colors(mut self, primary: [u8; 3], secondary: [u8; 3]) -> Self {
        self.primary = primary;
        self.secondary = secondary;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn line_count(&self) -> u32 {
        self.line_count
    }

    /// Height in rows of the opaque top band.
    pub fn big_band_rows(&self) -> u32 {
        round_rows(self.height as f64 * self.big_line_width)
    }

    /// Height in rows of every translucent band.
    pub fn small_band_rows(&self) -> u32 {
        round_rows(self.height as f64 * self.small_line_width)
    }

    /// First row of each translucent band, top to bottom.
    pub fn small_band_offsets(&self) -> Vec<u32> {
        let big = self.big_band_rows();
        let spacing = (self.height as f64 - big as f64) / self.line_count as f64;
        (0..self.line_count.saturating_sub(1))
            .map(|i| big + round_rows(spacing * (i + 1) as f64))
            .collect()
    }

    pub fn small_line_alpha_byte(&self) -> u8 {
        (self.small_line_alpha * 255.0).round() as u8
    }
}

impl Default for GridTextureSpec {
    fn default() -> Self {
        Self {
            width: 1,
            height: 128,
            line_count: 5,
            big_line_width: 0.08,
            small_line_width: 0.01,
            small_line_alpha: 0.5,
            primary: [255, 255, 255],
            secondary: [255, 255, 255],
        }
    }
}

#[inline]
fn round_rows(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

// ======================================
// === RASTER ===
// ======================================

/// Row-major RGBA8 pixels, starting out fully transparent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl RasterBuffer {
    /// Transparent raster. Zero dimensions are raised to one texel.
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        Self {
            width,
            height,
            pixels: vec![[0; 4]; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn row(&self, y: u32) -> &[[u8; 4]] {
        let start = (y * self.width) as usize;
        &self.pixels[start..start + self.width as usize]
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Paints rows `[top, top + rows)` with `color`, clipped to the raster.
    fn fill_rows(&mut self, top: u32, rows: u32, color: [u8; 4]) {
        let bottom = top.saturating_add(rows).min(self.height);
        if top >= bottom {
            return;
        }
        let start = (top * self.width) as usize;
        let end = (bottom * self.width) as usize;
        self.pixels[start..end].fill(color);
    }

    /// Nearest texel under repeat wrapping on both axes, the way the GPU
    /// sampler reads the uploaded texture.
    pub fn sample_nearest_repeat(&self, u: f32, v: f32) -> [u8; 4] {
        let x = wrap_texel(u, self.width);
        let y = wrap_texel(v, self.height);
        self.pixel(x, y)
    }

    /// Elevation signal in [0, 1]: luma of the texel scaled by its alpha.
    pub fn elevation_at(&self, u: f32, v: f32) -> f32 {
        let [r, g, b, a] = self.sample_nearest_repeat(u, v);
        let rgb = [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0];
        luma(rgb) * (a as f32 / 255.0)
    }
}

#[inline]
fn wrap_texel(coord: f32, size: u32) -> u32 {
    let wrapped = coord - coord.floor();
    ((wrapped * size as f32) as u32).min(size - 1)
}

/// Rec. 709 luma, matching `terrain_luma` in the WGSL chunk.
#[inline]
pub fn luma(rgb: [f32; 3]) -> f32 {
    0.2126 * rgb[0] + 0.7152 * rgb[1] + 0.0722 * rgb[2]
}

/// Paints the strip pattern described by `spec` into a fresh raster.
pub fn generate(spec: &GridTextureSpec) -> RasterBuffer {
    let mut raster = RasterBuffer::new(spec.width, spec.height);

    let [r, g, b] = spec.primary;
    raster.fill_rows(0, spec.big_band_rows(), [r, g, b, 255]);

    let [r, g, b] = spec.secondary;
    let small = [r, g, b, spec.small_line_alpha_byte()];
    let rows = spec.small_band_rows();
    for offset in spec.small_band_offsets() {
        raster.fill_rows(offset, rows, small);
    }

    log::debug!(
        "Generated {}x{} grid texture, {} lines",
        spec.width,
        spec.height,
        spec.line_count
    );

    raster
}

// ======================================
// === GPU UPLOAD ===
// ======================================

pub struct GridTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl GridTexture {
    /// Uploads the raster once. Repeat wrapping and nearest filtering keep
    /// the bands crisp and tile them across the terrain.
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, raster: &RasterBuffer) -> Self {
        let size = wgpu::Extent3d {
            width: raster.width(),
            height: raster.height(),
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Grid Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            raster.as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(raster.width() * 4),
                rows_per_image: Some(raster.height()),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Grid Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CLEAR: [u8; 4] = [0, 0, 0, 0];
    const OPAQUE: [u8; 4] = [255, 255, 255, 255];

    fn reference_spec() -> GridTextureSpec {
        GridTextureSpec::new(50, 150, 4, 0.08, 0.01, 0.6).unwrap()
    }

    fn row_color(raster: &RasterBuffer, y: u32) -> [u8; 4] {
        let row = raster.row(y);
        assert!(row.iter().all(|p| *p == row[0]), "row {} is not uniform", y);
        row[0]
    }

    #[test]
    fn generation_is_deterministic() {
        let spec = reference_spec();
        assert_eq!(generate(&spec).as_bytes(), generate(&spec).as_bytes());
    }

    #[test]
    fn reference_layout() {
        let spec = reference_spec();
        assert_eq!(spec.big_band_rows(), 12);
        assert_eq!(spec.small_band_rows(), 2);
        assert_eq!(spec.small_band_offsets(), vec![47, 81, 116]);

        let raster = generate(&spec);
        let small = [255, 255, 255, 153];
        for y in 0..raster.height() {
            let expected = match y {
                0..12 => OPAQUE,
                47..49 | 81..83 | 116..118 => small,
                _ => CLEAR,
            };
            assert_eq!(row_color(&raster, y), expected, "row {}", y);
        }
    }

    #[test]
    fn single_line_draws_only_big_band() {
        let spec = GridTextureSpec::new(4, 100, 1, 0.1, 0.02, 0.5).unwrap();
        assert!(spec.small_band_offsets().is_empty());

        let raster = generate(&spec);
        let opaque_rows = (0..100).filter(|&y| row_color(&raster, y) == OPAQUE).count();
        let clear_rows = (0..100).filter(|&y| row_color(&raster, y) == CLEAR).count();
        assert_eq!(opaque_rows, 10);
        assert_eq!(clear_rows, 90);
    }

    #[test]
    fn bands_clip_at_bottom_edge() {
        let spec = GridTextureSpec::new(1, 10, 2, 0.5, 0.9, 1.0).unwrap();
        let raster = generate(&spec);
        assert_eq!(raster.as_bytes().len(), 10 * 4);
        assert_eq!(row_color(&raster, 9), OPAQUE);
    }

    #[test]
    fn custom_colors_are_used() {
        let spec = reference_spec().with_colors([255, 0, 0], [0, 0, 255]);
        let raster = generate(&spec);
        assert_eq!(raster.pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(raster.pixel(3, 47), [0, 0, 255, 153]);
    }

    #[test]
    fn rejects_malformed_specs() {
        assert!(GridTextureSpec::new(0, 10, 1, 0.1, 0.1, 0.5).is_err());
        assert!(GridTextureSpec::new(10, 0, 1, 0.1, 0.1, 0.5).is_err());
        assert!(GridTextureSpec::new(10, 10, 0, 0.1, 0.1, 0.5).is_err());
        assert!(GridTextureSpec::new(10, 10, 1, 0.0, 0.1, 0.5).is_err());
        assert!(GridTextureSpec::new(10, 10, 1, 0.1, 1.0, 0.5).is_err());
        assert!(GridTextureSpec::new(10, 10, 1, 0.1, 0.1, 1.5).is_err());
        assert!(GridTextureSpec::new(10, 10, 1, 0.1, 0.1, f64::NAN).is_err());
    }

    #[test]
    fn wrap_boundary_is_seamless() {
        let raster = generate(&reference_spec());
        assert_eq!(raster.sample_nearest_repeat(0.0, 0.0), raster.sample_nearest_repeat(1.0, 0.0));
        assert_eq!(raster.sample_nearest_repeat(0.0, 0.0), raster.sample_nearest_repeat(0.0, 1.0));
        assert_eq!(raster.sample_nearest_repeat(0.25, 0.5), raster.sample_nearest_repeat(-0.75, 2.5));
    }

    #[test]
    fn elevation_follows_luma_and_alpha() {
        let raster = generate(&reference_spec());
        assert!((raster.elevation_at(0.0, 0.0) - 1.0).abs() < 1e-5);
        assert_eq!(raster.elevation_at(0.0, 0.5), 0.0);

        let small_v = 47.5 / 150.0;
        assert!((raster.elevation_at(0.0, small_v) - 0.6).abs() < 1e-5);
    }

    #[test]
    fn empty_raster_has_one_texel() {
        let raster = RasterBuffer::new(0, 0);
        assert_eq!((raster.width(), raster.height()), (1, 1));
        assert_eq!(raster.sample_nearest_repeat(0.7, -3.2), CLEAR);
        assert_eq!(raster.elevation_at(0.5, 0.5), 0.0);
    }
}
