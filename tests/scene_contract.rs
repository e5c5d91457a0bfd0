use glam::{Vec2, Vec3};
use pretty_assertions::assert_eq;

use terrainw::{
    DepthOfFieldParams, GridTextureSpec, OrbitControls, PointerButtons, Scene, SceneConfig, TerrainError, Vertex,
    bokeh_taps, generate, generate_terrain_color_shader, generate_terrain_depth_shader, perspective_depth_to_view_z,
};

fn reference_spec() -> GridTextureSpec {
    GridTextureSpec::new(50, 150, 4, 0.08, 0.01, 0.6).unwrap()
}

fn small_scene() -> Scene {
    let config = SceneConfig {
        texture: reference_spec(),
        mesh_segments: 8,
        ..Default::default()
    };
    Scene::new(config, 1080, 720, 1.0).unwrap()
}

#[test]
fn reference_raster_rows() {
    let raster = generate(&reference_spec());
    assert_eq!((raster.width(), raster.height()), (50, 150));

    let alphas: Vec<u8> = (0..150).map(|y| raster.pixel(0, y)[3]).collect();
    let mut expected = vec![0u8; 150];
    expected[..12].fill(255);
    for start in [47, 81, 116] {
        expected[start..start + 2].fill(153);
    }
    assert_eq!(alphas, expected);

    for y in 0..150 {
        assert!(raster.row(y).iter().all(|p| *p == raster.pixel(0, y)));
    }
}

#[test]
fn generation_is_repeatable() {
    let spec = GridTextureSpec::default();
    assert_eq!(generate(&spec), generate(&spec));
}

#[test]
fn malformed_spec_is_an_invalid_spec_error() {
    let err = GridTextureSpec::new(16, 16, 0, 0.1, 0.01, 0.5).unwrap_err();
    assert!(matches!(err, TerrainError::InvalidSpec(_)));
}

#[test]
fn invalid_config_is_rejected_by_scene() {
    let config = SceneConfig {
        texture_frequency: 0.0,
        ..Default::default()
    };
    assert!(matches!(
        Scene::new(config, 800, 600, 1.0),
        Err(TerrainError::InvalidConfig(_))
    ));
}

#[test]
fn resize_tracks_aspect() {
    let mut scene = small_scene();
    for (w, h) in [(640, 480), (1, 1000), (1000, 1), (2560, 1440)] {
        scene.resize(w, h, 2.0);
        assert_eq!(scene.camera.aspect, w as f32 / h as f32);
        assert_eq!(scene.render_size(), (w * 2, h * 2));
    }
}

#[test]
fn texture_wraps_without_seam() {
    let scene = small_scene();
    let raster = scene.raster();
    assert_eq!(raster.sample_nearest_repeat(0.0, 0.0), raster.sample_nearest_repeat(1.0, 0.0));
    assert_eq!(raster.elevation_at(0.0, 0.0), raster.elevation_at(1.0, 1.0));
}

#[test]
fn color_and_depth_programs_agree_on_geometry() {
    let mut scene = small_scene();
    scene.tick(1.25);
    let raster = scene.raster();

    for (i, uv) in [Vec2::ZERO, Vec2::new(0.3, 0.0321), Vec2::new(0.77, 0.5), Vec2::ONE].into_iter().enumerate() {
        let vertex = Vertex {
            position: [uv.x - 0.5, 0.0, uv.y - 0.5],
            normal: [0.0, 1.0, 0.0],
            uv: uv.to_array(),
        };
        let color = scene.uniforms.color_vertex(raster, &vertex).clip_position;
        let depth = scene.uniforms.depth_vertex(raster, &vertex);
        assert!((color - depth).abs().max_element() < 1e-6, "sample {}", i);
    }

    let color = generate_terrain_color_shader();
    let depth = generate_terrain_depth_shader();
    assert!(color.contains("fn terrain_clip_position") && depth.contains("fn terrain_clip_position"));
}

#[test]
fn orbit_drag_keeps_distance() {
    let mut scene = small_scene();
    let radius = (scene.camera.position - scene.camera.target).length();

    scene.controls.pointer_down(PointerButtons::PRIMARY);
    scene.controls.pointer_moved(10.0, 10.0, 720.0);
    scene.controls.pointer_moved(90.0, 40.0, 720.0);
    scene.controls.pointer_up(PointerButtons::PRIMARY);

    for frame in 0..240 {
        scene.tick(frame as f32 / 60.0);
    }
    let moved = (scene.camera.position - scene.camera.target).length();
    assert!((moved - radius).abs() < 1e-4);
}

#[test]
fn standalone_controls_orbit_the_target() {
    let mut scene = small_scene();
    let mut controls = OrbitControls::new(Vec3::ZERO, 0.05);
    controls.enable_damping = false;
    controls.rotate_left(std::f32::consts::FRAC_PI_2);
    assert!(controls.update(&mut scene.camera));
    assert!(scene.camera.position.y > 0.0);
}

#[test]
fn focus_plane_is_sharp() {
    let params = DepthOfFieldParams::default();
    let (near, far) = (0.1, 100.0);

    // Depth of a point exactly `focus` units in front of the camera.
    let depth = far * (near - params.focus) / ((far - near) * -params.focus);
    let view_z = perspective_depth_to_view_z(depth, near, far);
    assert!(params.blur_radius(view_z).abs() < 1e-6);
    assert_eq!(params.blur_radius(-far), -params.max_blur);
    assert_eq!(bokeh_taps().len(), 41);
}
