// ============================
// === SHADER SOURCES ===
// ============================
// The color and depth programs are assembled from the same terrain chunk so
// both run the exact same displacement. Never inline a copy of
// `terrain_clip_position` into a single program.

/// Depth packing into an RGBA8 target. Shared by the depth program (pack)
/// and the bokeh pass (unpack).
pub const DEPTH_PACKING: &str = r#"
const PACK_UPSCALE: f32 = 1.00392156862745; // 256 / 255
const UNPACK_DOWNSCALE: f32 = 0.99609375; // 255 / 256
const SHIFT_RIGHT_8: f32 = 0.00390625; // 1 / 256
const PACK_FACTORS: vec3<f32> = vec3<f32>(16777216.0, 65536.0, 256.0);

fn pack_depth(v: f32) -> vec4<f32> {
    var r = vec4<f32>(fract(v * PACK_FACTORS), v);
    r = vec4<f32>(r.x, r.yzw - r.xyz * SHIFT_RIGHT_8);
    return r * PACK_UPSCALE;
}

fn unpack_depth(v: vec4<f32>) -> f32 {
    let factors = UNPACK_DOWNSCALE / vec4<f32>(PACK_FACTORS, 1.0);
    return dot(v, factors);
}
"#;

/// Uniforms, bindings and displacement shared by both terrain programs.
pub const TERRAIN_COMMON: &str = r#"
struct TerrainUniforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
    elevation: f32,
    texture_frequency: f32,
    time: f32,
}

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

@group(0) @binding(0) var<uniform> terrain: TerrainUniforms;
@group(0) @binding(1) var grid_texture: texture_2d<f32>;
@group(0) @binding(2) var grid_sampler: sampler;

fn terrain_luma(rgb: vec3<f32>) -> f32 {
    return dot(rgb, vec3<f32>(0.2126, 0.7152, 0.0722));
}

fn terrain_texel(uv: vec2<f32>) -> vec4<f32> {
    return textureSampleLevel(grid_texture, grid_sampler, uv * terrain.texture_frequency, 0.0);
}

fn terrain_signal(texel: vec4<f32>) -> f32 {
    return terrain_luma(texel.rgb) * texel.a;
}

fn terrain_displace(position: vec3<f32>, uv: vec2<f32>) -> vec3<f32> {
    let signal = terrain_signal(terrain_texel(uv));
    return position + vec3<f32>(0.0, terrain.elevation * signal, 0.0);
}

fn terrain_clip_position(position: vec3<f32>, uv: vec2<f32>) -> vec4<f32> {
    let world = terrain.model * vec4<f32>(terrain_displace(position, uv), 1.0);
    return terrain.view_proj * world;
}
"#;

const TERRAIN_COLOR_ENTRIES: &str = r#"
struct ColorVaryings {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_color(in: VertexInput) -> ColorVaryings {
    var out: ColorVaryings;
    out.clip_position = terrain_clip_position(in.position, in.uv);
    out.uv = in.uv;
    return out;
}

@fragment
fn fs_color(in: ColorVaryings) -> @location(0) vec4<f32> {
    let texel = terrain_texel(in.uv);
    let band = terrain_signal(texel);

    // Slow glow travelling along the strips. Color only, never geometry.
    let pulse = 0.75 + 0.25 * sin(terrain.time * 2.0 - in.uv.y * terrain.texture_frequency * 6.2831853);

    let base = vec3<f32>(0.02, 0.02, 0.035);
    let line = texel.rgb * pulse;
    return vec4<f32>(mix(base, line, band), 1.0);
}
"#;

const TERRAIN_DEPTH_ENTRIES: &str = r#"
struct DepthVaryings {
    @builtin(position) clip_position: vec4<f32>,
}

@vertex
fn vs_depth(in: VertexInput) -> DepthVaryings {
    var out: DepthVaryings;
    out.clip_position = terrain_clip_position(in.position, in.uv);
    return out;
}

@fragment
fn fs_depth(in: DepthVaryings) -> @location(0) vec4<f32> {
    return pack_depth(in.clip_position.z);
}
"#;

/// Terrain color program: displaced geometry shaded by the grid texture.
pub fn generate_terrain_color_shader() -> String {
    format!("{TERRAIN_COMMON}\n{TERRAIN_COLOR_ENTRIES}")
}

/// Terrain depth program: same vertex transform, packed depth out.
pub fn generate_terrain_depth_shader() -> String {
    format!("{TERRAIN_COMMON}\n{DEPTH_PACKING}\n{TERRAIN_DEPTH_ENTRIES}")
}

/// Full-screen bokeh blur reading the scene color and packed depth.
pub fn generate_bokeh_shader(ring_directions: u32) -> String {
    format!(r#"
    {DEPTH_PACKING}

    const RING_DIRECTIONS: u32 = {ring_directions}u;
    const TAP_RADIUS: f32 = 0.4;
    const TAU: f32 = 6.28318530718;

    struct BokehUniforms {{
        focus: f32,
        aperture: f32,
        max_blur: f32,
        aspect: f32,
        near: f32,
        far: f32,
    }}

    struct FullscreenVaryings {{
        @builtin(position) clip_position: vec4<f32>,
        @location(0) uv: vec2<f32>,
    }}

    @group(0) @binding(0) var color_texture: texture_2d<f32>;
    @group(0) @binding(1) var depth_texture: texture_2d<f32>;
    @group(0) @binding(2) var color_sampler: sampler;
    @group(0) @binding(3) var depth_sampler: sampler;
    @group(0) @binding(4) var<uniform> bokeh: BokehUniforms;

    @vertex
    fn vs_fullscreen(@builtin(vertex_index) index: u32) -> FullscreenVaryings {{
        let x = f32((index << 1u) & 2u);
        let y = f32(index & 2u);
        var out: FullscreenVaryings;
        out.clip_position = vec4<f32>(x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0, 1.0);
        out.uv = vec2<f32>(x, y);
        return out;
    }}

    fn perspective_depth_to_view_z(depth: f32, near: f32, far: f32) -> f32 {{
        return (near * far) / ((far - near) * depth - far);
    }}

    fn ring_scale(ring: u32) -> f32 {{
        var scales = array<f32, 4>(1.0, 0.9, 0.7, 0.4);
        return scales[ring];
    }}

    @fragment
    fn fs_bokeh(in: FullscreenVaryings) -> @location(0) vec4<f32> {{
        let aspect_correct = vec2<f32>(1.0, bokeh.aspect);
        let packed = textureSampleLevel(depth_texture, depth_sampler, in.uv, 0.0);
        let view_z = perspective_depth_to_view_z(unpack_depth(packed), bokeh.near, bokeh.far);

        let factor = bokeh.focus + view_z;
        let blur = vec2<f32>(clamp(factor * bokeh.aperture, -bokeh.max_blur, bokeh.max_blur));

        var color = textureSampleLevel(color_texture, color_sampler, in.uv, 0.0);
        for (var ring = 0u; ring < 4u; ring++) {{
            let scale = ring_scale(ring);
            for (var tap = 0u; tap < RING_DIRECTIONS; tap++) {{
                let angle = f32(tap) * TAU / f32(RING_DIRECTIONS);
                let offset = vec2<f32>(sin(angle), cos(angle)) * TAP_RADIUS * scale;
                color += textureSampleLevel(color_texture, color_sampler, in.uv + offset * aspect_correct * blur, 0.0);
            }}
        }}

        let taps = f32(4u * RING_DIRECTIONS + 1u);
        return vec4<f32>(color.rgb / taps, 1.0);
    }}
    "#)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_terrain_programs_share_the_displacement_chunk() {
        let color = generate_terrain_color_shader();
        let depth = generate_terrain_depth_shader();
        assert!(color.contains(TERRAIN_COMMON));
        assert!(depth.contains(TERRAIN_COMMON));
        assert_eq!(color.matches("fn terrain_displace").count(), 1);
        assert_eq!(depth.matches("fn terrain_displace").count(), 1);
    }

    #[test]
    fn entry_points_are_present() {
        let color = generate_terrain_color_shader();
        let depth = generate_terrain_depth_shader();
        assert!(color.contains("fn vs_color") && color.contains("fn fs_color"));
        assert!(depth.contains("fn vs_depth") && depth.contains("fn fs_depth"));
        assert!(!color.contains("fn pack_depth"));
    }

    #[test]
    fn bokeh_unpacks_with_the_shared_convention() {
        let bokeh = generate_bokeh_shader(10);
        assert!(bokeh.contains(DEPTH_PACKING));
        assert!(bokeh.contains("const RING_DIRECTIONS: u32 = 10u;"));
        assert!(bokeh.contains("fn fs_bokeh"));
    }

    fn validate(label: &str, source: &str) {
        let module = naga::front::wgsl::parse_str(source)
            .unwrap_or_else(|e| panic!("{label} failed to parse:\n{}", e.emit_to_string(source)));
        naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all())
            .validate(&module)
            .unwrap_or_else(|e| panic!("{label} failed validation: {e:?}"));
    }

    #[test]
    fn all_programs_validate() {
        validate("terrain color", &generate_terrain_color_shader());
        validate("terrain depth", &generate_terrain_depth_shader());
        validate("bokeh", &generate_bokeh_shader(crate::postprocess::BOKEH_RING_DIRECTIONS));
        validate("bokeh (single direction)", &generate_bokeh_shader(1));
    }
}
