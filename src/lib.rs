//! Displaced-terrain scene: a procedurally generated grid texture drives
//! vertex displacement on a dense plane, rendered through a scene pass and
//! a depth-of-field (bokeh) pass, with an orbiting camera.

use winit::event_loop::{ControlFlow, EventLoop};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod geometry;
pub mod postprocess;
pub mod renderer;
pub mod scene;
pub mod shaders;
pub mod terrain;
pub mod texture;
pub mod timing;

pub use app::{AppEvent, TerrainApp};
pub use camera::{OrbitControls, PerspectiveCamera, PointerButtons};
pub use config::{CameraConfig, SceneConfig};
pub use error::{Result, TerrainError};
pub use postprocess::{DepthOfFieldParams, bokeh_taps, perspective_depth_to_view_z};
pub use scene::{Scene, Viewport};
pub use shaders::{generate_bokeh_shader, generate_terrain_color_shader, generate_terrain_depth_shader};
pub use terrain::{TerrainUniforms, Vertex};
pub use texture::{GridTextureSpec, RasterBuffer, generate};

// === CONSTANTS ===
pub const DIMX: u32 = 1080;
pub const DIMY: u32 = 720;
pub const STATS_LOGGING: bool = true; // FPS and frame time at `info`
pub const STATS_UPDATE_INTERVAL: f32 = 0.75; // Seconds between stats lines
pub const MAX_PIXEL_RATIO: f32 = 2.0;

fn init_logging() {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            let _ = console_log::init_with_level(log::Level::Info);
        } else {
            let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
        }
    }
}

// ======================================
// === MAIN ENTRY POINT ===
// ======================================

pub fn run() -> Result<()> {
    init_logging();
    log::info!("Started TerrainW v{}", env!("CARGO_PKG_VERSION"));

    let event_loop = EventLoop::<AppEvent>::with_user_event().build()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = TerrainApp::new(&event_loop, SceneConfig::default())?;
    event_loop.run_app(&mut app)?;
    app.into_result()
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    if let Err(e) = run() {
        log::error!("{e}");
    }
}
