mod input_state;
mod trackball;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use color_eyre::{Report, Result};
use glam::{Vec2, Vec3};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};
use crate::app::input_state::InputState;
use crate::app::trackball::Trackball;
use crate::renderer::config::RenderConfig;
use crate::renderer::core::window::VulkanWindow;
use crate::renderer::host::HostWindow;
use crate::renderer::{Renderer, RendererState};

/// Degrees per millisecond the object spins at before it is first dragged
const INITIAL_SPIN: f32 = -0.05;
/// Zoom per eighth of a degree of wheel rotation
const ZOOM_PER_WHEEL_ANGLE: f32 = 0.001;

/// Assets to load once the renderer is up
#[derive(Debug, Default, Clone)]
pub struct StartupAssets {
    pub model: Option<PathBuf>,
    pub texture: Option<PathBuf>,
}

pub struct App {
    config: RenderConfig,
    startup_assets: StartupAssets,
    window: Option<VulkanWindow>,
    renderer: Renderer,
    trackball: Trackball,

    // State
    input_state: InputState,
    close_requested: bool,
    fatal_error: Option<Report>,
}

impl App {
    pub fn new(config: RenderConfig, startup_assets: StartupAssets) -> Self {
        Self {
            renderer: Renderer::new(config.clone()),
            config,
            startup_assets,
            window: None,
            trackball: Trackball::new(INITIAL_SPIN, Vec3::Y, Instant::now()),

            input_state: InputState::default(),
            close_requested: false,
            fatal_error: None,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.run_app(&mut self)?;
        self.shutdown();

        match self.fatal_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title("objview")
            .with_inner_size(LogicalSize::new(800, 600));
        let window = Arc::new(event_loop.create_window(attributes)?);
        let window = VulkanWindow::new(window, &self.config)?;
        self.renderer.init_resources(&window)?;

        let startup = self.startup_assets.clone();
        for path in startup.model.iter().chain(startup.texture.iter()) {
            load_asset(&mut self.renderer, &window, path);
        }

        window.request_update();
        self.window = Some(window);
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        let Some(window) = self.window.as_mut() else {
            return Ok(());
        };
        if self.renderer.state() != RendererState::ResourcesReady {
            return Ok(());
        }

        self.renderer.set_object_rotation(self.trackball.rotation(Instant::now()));
        if window.begin_frame()? {
            self.renderer.start_next_frame(window)?;
        } else {
            window.request_update();
        }
        Ok(())
    }

    fn handle_pointer(&mut self) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let size = window.window().inner_size();
        let size = Vec2::new(size.width as f32, size.height as f32);
        let pos = Trackball::view_position(self.input_state.mouse_curr_pos, size);
        let now = Instant::now();

        if self.input_state.mouse_left_just_pressed {
            self.trackball.push(pos, now);
        } else if self.input_state.mouse_left_just_released {
            self.trackball.release(pos, now);
        } else if self.input_state.mouse_left_down
            && self.input_state.mouse_curr_pos != self.input_state.mouse_prev_pos
        {
            self.trackball.drag(pos, now);
        }

        if self.input_state.mouse_wheel_angle_delta != 0.0 {
            self.renderer.zoom(ZOOM_PER_WHEEL_ANGLE * self.input_state.mouse_wheel_angle_delta);
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: Report) {
        log::error!("{err:#}");
        self.fatal_error = Some(err);
        event_loop.exit();
    }

    /// Releases the renderer's resources while the device is still alive
    fn shutdown(&mut self) {
        if let Some(window) = self.window.take() {
            if let Err(err) = self.renderer.release_resources(&window) {
                log::error!("Failed to release renderer resources: {err}");
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() && self.fatal_error.is_none() {
            if let Err(err) = self.init(event_loop) {
                self.fail(event_loop, err);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent
    ) {
        match self.window.as_ref() {
            Some(window) if window.window().id() == window_id => {}
            _ => return,
        }

        self.input_state.process_window_events(&event);

        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = self.window.as_mut() {
                    window.resize();
                    window.request_update();
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.draw() {
                    self.fail(event_loop, err);
                }
            }
            WindowEvent::DroppedFile(path) => {
                if let Some(window) = self.window.as_ref() {
                    load_asset(&mut self.renderer, window, &path);
                }
            }
            WindowEvent::MouseInput { .. }
            | WindowEvent::CursorMoved { .. }
            | WindowEvent::CursorLeft { .. }
            | WindowEvent::MouseWheel { .. } => {
                self.handle_pointer();
            }
            WindowEvent::KeyboardInput {
                event:
                KeyEvent {
                    logical_key: Key::Named(NamedKey::Escape),
                    state: ElementState::Pressed,
                    ..
                },
                ..
            } => {
                self.close_requested = true;
            }
            _ => {}
        }

        self.input_state.reset_frame();
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.close_requested {
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}

/// Load failures leave the current object in place
fn load_asset(renderer: &mut Renderer, window: &VulkanWindow, path: &Path) {
    match renderer.load_asset(window, path) {
        Ok(()) => log::info!("Loaded {}", path.display()),
        Err(err) => log::error!("Failed to load {}: {err}", path.display()),
    }
}
