pub mod input;
pub mod interaction;
mod timing;
pub mod viewport;

use crate::assets::{self, AssetError, EnvironmentImage, ModelLoaded};
use crate::config::ViewerConfig;
use crate::render::{RenderContext, RenderError};
use crate::viewer::{LoadOutcome, Viewer};
use input::ContainerRect;
use timing::FrameClock;
use viewport::ViewportSize;

use glam::Vec2;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

/// Pixels of touchpad scroll treated as one wheel step.
const PIXELS_PER_SCROLL_STEP: f32 = 50.0;

/// Results handed back from loader threads.
#[derive(Debug)]
pub enum ViewerEvent {
    ModelLoaded(ModelLoaded),
    EnvironmentLoaded(Result<EnvironmentImage, AssetError>),
}

pub struct App {
    config: ViewerConfig,
    proxy: EventLoopProxy<ViewerEvent>,
    window: Option<Arc<Window>>,
    viewer: Option<Viewer>,
    render: Option<RenderContext>,
    clock: FrameClock,
    target_frame_duration: Duration,
    next_frame_time: Instant,
}

impl App {
    fn new(config: ViewerConfig, proxy: EventLoopProxy<ViewerEvent>) -> Self {
        let clock = FrameClock::new(config.tick_rate_hz, config.window.title.clone());
        Self {
            config,
            proxy,
            window: None,
            viewer: None,
            render: None,
            clock,
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: Instant::now(),
        }
    }

    fn init_viewer(&mut self, window: Arc<Window>) -> Result<(), RenderError> {
        let size = viewport_of(window.inner_size());
        let render = RenderContext::new(window.clone(), size)?;
        self.viewer = Some(Viewer::new(self.config.clone(), size));
        self.render = Some(render);

        if let Some(path) = self.config.environment_map.clone() {
            let proxy = self.proxy.clone();
            let spawned = assets::spawn_environment_load(path, move |result| {
                if proxy.send_event(ViewerEvent::EnvironmentLoaded(result)).is_err() {
                    log::debug!("Environment map finished after shutdown");
                }
            });
            if let Err(err) = spawned {
                log::warn!("{err}");
            }
        }
        match self.config.source.clone() {
            Some(source) => self.start_load(&source),
            None => log::info!("No model source given; drop a .glb or .gltf onto the window"),
        }
        Ok(())
    }

    /// Releases the current model and loads `source` in the background.
    fn start_load(&mut self, source: &str) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        let Some(ticket) = viewer.request_load(source) else {
            return;
        };
        if let Some(render) = &mut self.render {
            render.release_model();
        }
        let proxy = self.proxy.clone();
        let spawned = assets::spawn_model_load(ticket, move |loaded| {
            if proxy.send_event(ViewerEvent::ModelLoaded(loaded)).is_err() {
                log::debug!("Model load finished after shutdown");
            }
        });
        if let Err(err) = spawned {
            log::warn!("Could not load '{source}': {err}");
        }
    }

    fn container_rect(&self) -> Option<ContainerRect> {
        let size = self.window.as_ref()?.inner_size();
        Some(ContainerRect::from_size(size.width, size.height))
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        if let Some(size) = viewer.resize(viewport_of(new_size)) {
            if let Some(render) = &mut self.render {
                render.resize(size);
            }
        }
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(monitor) = window.current_monitor() {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(viewer), Some(render)) = (self.viewer.as_mut(), self.render.as_mut()) else {
            return;
        };
        let now = Instant::now();
        for _ in 0..self.clock.advance(now) {
            viewer.tick();
        }
        if let Err(err) = render.render(&viewer.frame()) {
            log::error!("Rendering stopped: {err}");
            event_loop.exit();
            return;
        }
        self.clock.update_title(self.window.as_deref(), now);
    }

    fn teardown(&mut self) {
        if let Some(viewer) = self.viewer.as_mut() {
            if viewer.teardown() {
                log::info!("Viewer torn down");
            }
        }
        if let Some(render) = self.render.as_mut() {
            render.release_model();
        }
        // GPU resources go before the window they present to.
        self.render = None;
        self.window = None;
    }
}

impl ApplicationHandler<ViewerEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title(self.config.window.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.window.width, self.config.window.height))
            .with_transparent(true)
            .with_resizable(true);

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };

        if let Err(err) = self.init_viewer(window.clone()) {
            log::error!("Failed to initialise renderer: {err}");
            event_loop.exit();
            return;
        }
        self.update_target_frame_duration(&window);
        self.window = Some(window);
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::ModelLoaded(loaded) => {
                let Some(viewer) = self.viewer.as_mut() else {
                    return;
                };
                let source = loaded.ticket.source.clone();
                match viewer.accept_load(loaded) {
                    LoadOutcome::Applied => {
                        if let (Some(render), Some(model)) = (self.render.as_mut(), viewer.model()) {
                            render.upload_model(model.generation, &model.asset);
                            log::info!(
                                "Showing '{source}' (fitted extent {:.1})",
                                model.composition.fitted_extent
                            );
                        }
                    }
                    LoadOutcome::Stale => {}
                    LoadOutcome::Failed | LoadOutcome::Degenerate => {
                        log::warn!("'{source}' not shown; rendering continues without a model");
                    }
                }
            }
            ViewerEvent::EnvironmentLoaded(Ok(image)) => {
                if let Some(render) = self.render.as_mut() {
                    render.set_environment(&image);
                }
            }
            ViewerEvent::EnvironmentLoaded(Err(err)) => {
                log::warn!("{err}; keeping the fallback reflection map");
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                    && event.state == ElementState::Pressed
                {
                    event_loop.exit();
                }
            }
            WindowEvent::Focused(false) => {
                // The matching release may never reach us.
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.focus_lost();
                }
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::Moved(_) => {
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let Some(rect) = self.container_rect() else {
                    return;
                };
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.pointer_moved(Vec2::new(position.x as f32, position.y as f32), rect);
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                let Some(rect) = self.container_rect() else {
                    return;
                };
                let Some(viewer) = self.viewer.as_mut() else {
                    return;
                };
                match state {
                    ElementState::Pressed => {
                        let outcome = viewer.pointer_pressed(rect);
                        log::debug!("press -> {outcome:?}");
                    }
                    ElementState::Released => viewer.pointer_released(),
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_SCROLL_STEP,
                };
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.scroll(steps);
                }
            }
            WindowEvent::DroppedFile(path) => {
                let source = path.to_string_lossy().into_owned();
                log::info!("Source changed to '{source}'");
                self.start_load(&source);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.teardown();
    }
}

fn viewport_of(size: PhysicalSize<u32>) -> ViewportSize {
    ViewportSize::new(size.width, size.height)
}

pub fn init_logging() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info,wgpu_core=warn,wgpu_hal=warn,naga=warn"),
    )
    .format_timestamp_millis()
    .init();
}

pub fn run(config: ViewerConfig) -> Result<(), winit::error::EventLoopError> {
    log::info!(
        "Showpiece viewer ({} mode, tick {} Hz)",
        config.mode,
        config.tick_rate_hz
    );

    let event_loop = EventLoop::<ViewerEvent>::with_user_event().build()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config, event_loop.create_proxy());
    event_loop.run_app(&mut app)?;

    log::info!("Viewer closed");
    Ok(())
}
