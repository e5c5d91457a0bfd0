use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::camera::PointerButtons;
use crate::config::SceneConfig;
use crate::error::{Result, TerrainError};
use crate::renderer::Renderer;
use crate::scene::Scene;
use crate::timing::{Clock, StatsAccumulator};
use crate::{DIMX, DIMY, STATS_LOGGING, STATS_UPDATE_INTERVAL};

/// CSS applied to the canvas on the web so it tracks the browser viewport.
/// winit's resize observer then reports every browser resize as `Resized`.
pub const CANVAS_STYLE: [(&str, &str); 3] = [("width", "100vw"), ("height", "100vh"), ("display", "block")];

/// Delivered to the event loop from outside the window callbacks.
pub enum AppEvent {
    /// GPU bring-up finished in a spawned future (web only).
    RendererReady(Result<Renderer>),
}

// ======================================
// === TERRAIN APPLICATION ===
// ======================================

pub struct TerrainApp {
    scene: Scene,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    clock: Clock,
    stats: StatsAccumulator,
    fatal: Option<TerrainError>,
    #[cfg(target_arch = "wasm32")]
    proxy: winit::event_loop::EventLoopProxy<AppEvent>,
}

impl TerrainApp {
    pub fn new(event_loop: &EventLoop<AppEvent>, config: SceneConfig) -> Result<Self> {
        #[cfg(not(target_arch = "wasm32"))]
        let _ = event_loop;

        Ok(Self {
            scene: Scene::new(config, DIMX, DIMY, 1.0)?,
            window: None,
            renderer: None,
            clock: Clock::new(),
            stats: StatsAccumulator::new(STATS_UPDATE_INTERVAL),
            fatal: None,
            #[cfg(target_arch = "wasm32")]
            proxy: event_loop.create_proxy(),
        })
    }

    /// Error that stopped the loop, if any.
    pub fn into_result(self) -> Result<()> {
        match self.fatal {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: TerrainError) {
        log::error!("{error}");
        self.fatal = Some(error);
        event_loop.exit();
    }

    /// Pushes the window's current size into the scene and, once it exists,
    /// the renderer.
    fn sync_size(&mut self, window: &Window) {
        let physical = window.inner_size();
        let scale_factor = window.scale_factor();
        let logical = physical.to_logical::<f64>(scale_factor);

        let resized = self.scene.resize(
            logical.width.round() as u32,
            logical.height.round() as u32,
            scale_factor as f32,
        );
        if let (true, Some(renderer)) = (resized, &mut self.renderer) {
            renderer.resize(physical, self.scene.render_size());
        }
    }

    fn install_renderer(&mut self, renderer: Renderer) {
        self.renderer = Some(renderer);
        if let Some(window) = self.window.clone() {
            self.sync_size(&window);
            window.request_redraw();
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = &mut self.renderer else {
            return;
        };

        let elapsed = self.clock.tick();
        self.scene.tick(elapsed);

        match renderer.render(&self.scene) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => renderer.reconfigure(),
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Surface out of memory, exiting");
                event_loop.exit();
                return;
            }
            Err(e) => log::warn!("Frame skipped: {e}"),
        }

        if STATS_LOGGING {
            if let Some(stats) = self.stats.record(self.clock.delta_time) {
                log::info!("FPS: {:.1}, Frame: {:.2}ms", stats.fps, stats.frame_time_ms);
            }
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler<AppEvent> for TerrainApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title(concat!("TerrainW v", env!("CARGO_PKG_VERSION")))
            .with_inner_size(winit::dpi::LogicalSize::new(DIMX, DIMY));

        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };

        #[cfg(target_arch = "wasm32")]
        attach_canvas(&window);

        self.window = Some(window.clone());
        self.sync_size(&window);
        let setup = self.scene.renderer_setup();

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let result = Renderer::new(window, setup).await;
                if proxy.send_event(AppEvent::RendererReady(result)).is_err() {
                    log::warn!("Event loop closed before the renderer was ready");
                }
            });
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            match pollster::block_on(Renderer::new(window, setup)) {
                Ok(renderer) => self.install_renderer(renderer),
                Err(e) => self.fail(event_loop, e),
            }
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::RendererReady(Ok(renderer)) => self.install_renderer(renderer),
            AppEvent::RendererReady(Err(e)) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.clone() else {
            return;
        };
        if window.id() != id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => self.sync_size(&window),
            WindowEvent::MouseInput { state, button, .. } => {
                let button = match button {
                    MouseButton::Left => PointerButtons::PRIMARY,
                    MouseButton::Right => PointerButtons::SECONDARY,
                    MouseButton::Middle => PointerButtons::MIDDLE,
                    _ => return,
                };
                match state {
                    ElementState::Pressed => self.scene.controls.pointer_down(button),
                    ElementState::Released => self.scene.controls.pointer_up(button),
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let height = window.inner_size().height as f32;
                self.scene.controls.pointer_moved(position.x as f32, position.y as f32, height);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                // winit reports scrolling away from the user as positive.
                let delta_y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y,
                    MouseScrollDelta::PixelDelta(position) => -position.y as f32,
                };
                self.scene.controls.wheel(delta_y);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn attach_canvas(window: &Window) {
    use winit::platform::web::WindowExtWebSys;

    let Some(canvas) = window.canvas() else {
        log::warn!("Window has no canvas to attach");
        return;
    };
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };

    let container: Option<web_sys::Element> = document
        .get_element_by_id("app")
        .or_else(|| document.body().map(Into::into));

    match container {
        Some(container) => {
            if container.append_child(&canvas).is_err() {
                log::warn!("Couldn't append canvas to document");
            }
        }
        None => log::warn!("No #app element or body to attach the canvas to"),
    }

    let style = canvas.style();
    for (property, value) in CANVAS_STYLE {
        if style.set_property(property, value).is_err() {
            log::warn!("Couldn't set canvas {property}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style_value(property: &str) -> Option<&'static str> {
        CANVAS_STYLE.iter().find(|(p, _)| *p == property).map(|(_, v)| *v)
    }

    #[test]
    fn canvas_fills_the_viewport() {
        assert_eq!(style_value("width"), Some("100vw"));
        assert_eq!(style_value("height"), Some("100vh"));
    }
}
