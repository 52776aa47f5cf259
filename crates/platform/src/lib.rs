//! Platform layer: windowing, event loop, egui and asset streaming.
//!
//! Each redraw runs one frame:
//! - drain finished asset loads into the viewer and GPU,
//! - tick the viewer (animation, controls, markers),
//! - draw the scene, then the egui overlay on top.
//!
//! A redraw is requested after every frame so the loop runs at display rate.

pub mod input;
pub mod loader;
pub mod overlay;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use corelib::Vec2;
use corelib::config::SceneConfig;
use corelib::poi::Sizes;
use corelib::viewer::Viewer;
use renderer::GpuState;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::input::{PointerState, wheel_steps};
use crate::loader::{AssetLoader, LoadEvent, Payload};
use crate::overlay::{OverlayOptions, OverlayState};

/// Options collected from the command line.
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub backends: wgpu::Backends,
    pub show_fps: bool,
    pub width: u32,
    pub height: u32,
    /// Show the tweak panel.
    pub debug: bool,
    pub assets_dir: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            show_fps: false,
            width: 1280,
            height: 720,
            debug: false,
            assets_dir: PathBuf::from("static"),
        }
    }
}

/// Logical-pixel viewport of a window.
fn sizes_of(size: PhysicalSize<u32>, scale_factor: f64) -> Sizes {
    let logical = size.to_logical::<f32>(scale_factor);
    Sizes::new(logical.width.max(1.0), logical.height.max(1.0))
}

struct EguiLayer {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

/// Everything that only exists once the window is up.
struct Running {
    window: Arc<Window>,
    gpu: GpuState,
    egui: EguiLayer,
    loader: AssetLoader,
    start: Instant,
}

struct App {
    options: RunOptions,
    viewer: Viewer,
    overlay: OverlayState,
    pointer: PointerState,
    running: Option<Running>,
    fps: f32,
    last_frame: Option<Instant>,
    init_error: Option<anyhow::Error>,
}

impl App {
    fn new(options: RunOptions) -> Self {
        let config = SceneConfig::default().with_assets_dir(&options.assets_dir);
        let sizes = Sizes::new(options.width as f32, options.height as f32);
        Self {
            viewer: Viewer::new(config, sizes),
            options,
            overlay: OverlayState::default(),
            pointer: PointerState::default(),
            running: None,
            fps: 0.0,
            last_frame: None,
            init_error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<Running> {
        let attrs = Window::default_attributes()
            .with_title("Roomview")
            .with_inner_size(PhysicalSize::new(self.options.width, self.options.height));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("Failed to create window")?,
        );
        let size = window.inner_size();
        log::info!(
            "Window created: {}x{} (scale {:.2})",
            size.width,
            size.height,
            window.scale_factor()
        );

        let gpu = pollster::block_on(GpuState::new(window.clone(), self.options.backends))?;

        let ctx = egui::Context::default();
        let state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            &*window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let renderer = egui_wgpu::Renderer::new(gpu.device(), gpu.surface_format(), None, 1, false);

        self.viewer
            .resize(sizes_of(size, window.scale_factor()));

        let (loader, urls) = AssetLoader::spawn(self.viewer.config())?;
        for url in urls {
            self.viewer.loading_manager_mut().item_start(url);
        }

        Ok(Running {
            window,
            gpu,
            egui: EguiLayer {
                ctx,
                state,
                renderer,
            },
            loader,
            start: Instant::now(),
        })
    }

    fn drain_loads(viewer: &mut Viewer, running: &mut Running) {
        for event in running.loader.poll() {
            match event {
                LoadEvent::Loaded { url, payload } => {
                    match payload {
                        Payload::Texture(texture) => running.gpu.set_texture(&texture),
                        Payload::Model(model) => {
                            if let Err(err) = viewer.attach_model(model) {
                                log::error!("One or more animations not found. ({err})");
                            }
                        }
                    }
                    viewer.on_item_loaded(&url);
                }
                LoadEvent::Failed { url, error } => {
                    viewer.on_item_failed(&url, &format!("{error:#}"));
                }
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(running) = self.running.as_mut() else {
            return;
        };

        let now = Instant::now();
        if let Some(last) = self.last_frame.replace(now) {
            let dt = now.duration_since(last).as_secs_f32();
            if dt > 0.0 {
                let instant = 1.0 / dt;
                self.fps = if self.fps == 0.0 {
                    instant
                } else {
                    self.fps * 0.9 + instant * 0.1
                };
            }
        }

        Self::drain_loads(&mut self.viewer, running);
        self.viewer.tick(running.start.elapsed().as_secs_f64());
        running.gpu.sync_scene(self.viewer.scene());

        let Running {
            window, gpu, egui, ..
        } = running;

        let options = OverlayOptions {
            debug: self.options.debug,
            fps: self.options.show_fps.then_some(self.fps),
        };
        let raw_input = egui.state.take_egui_input(window);
        let viewer = &mut self.viewer;
        let overlay = &mut self.overlay;
        let full_output = egui.ctx.run(raw_input, |ctx| {
            overlay.draw(ctx, viewer, &options);
        });
        egui.state
            .handle_platform_output(window, full_output.platform_output);
        let pixels_per_point = full_output.pixels_per_point;
        let paint_jobs = egui.ctx.tessellate(full_output.shapes, pixels_per_point);
        let textures = full_output.textures_delta;
        let egui_renderer = &mut egui.renderer;

        let result = gpu.render(self.viewer.scene(), self.viewer.camera(), |target| {
            for (id, delta) in &textures.set {
                egui_renderer.update_texture(target.device, target.queue, *id, delta);
            }
            let screen = egui_wgpu::ScreenDescriptor {
                size_in_pixels: target.size_in_pixels,
                pixels_per_point,
            };
            let commands = egui_renderer.update_buffers(
                target.device,
                target.queue,
                target.encoder,
                &paint_jobs,
                &screen,
            );
            {
                let mut pass = target
                    .encoder
                    .begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("OverlayPass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: target.view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Load,
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        occlusion_query_set: None,
                        timestamp_writes: None,
                    })
                    .forget_lifetime();
                egui_renderer.render(&mut pass, &paint_jobs, &screen);
            }
            for id in &textures.free {
                egui_renderer.free_texture(id);
            }
            commands
        });

        match result {
            Ok(()) => {}
            Err(err) if GpuState::is_surface_lost(&err) => {
                log::warn!("Surface lost/outdated: {err:?}. Recreating.");
                gpu.recreate_surface();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("GPU out of memory. Exiting.");
                event_loop.exit();
            }
            Err(err) => log::warn!("Frame skipped: {err:?}"),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(running) => self.running = Some(running),
            Err(err) => {
                log::error!("Initialisation failed: {err:#}");
                self.init_error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        let response = running.egui.state.on_window_event(&running.window, &event);

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                log::info!("Resized: {}x{}", new_size.width, new_size.height);
                running.gpu.resize(new_size.width, new_size.height);
                self.viewer
                    .resize(sizes_of(new_size, running.window.scale_factor()));
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                log::info!("Scale factor changed: {:.3}", scale_factor);
                self.viewer
                    .resize(sizes_of(running.window.inner_size(), scale_factor));
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::MouseInput { state, button, .. }
                if !response.consumed || state == ElementState::Released =>
            {
                self.pointer.on_button(button, state);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let logical = position.to_logical::<f32>(running.window.scale_factor());
                let height = self.viewer.sizes().height;
                let camera = *self.viewer.camera();
                let position = Vec2::new(logical.x, logical.y);
                if response.consumed {
                    // egui owns this drag
                    self.pointer.on_leave();
                }
                self.pointer
                    .on_move(position, height, self.viewer.controls_mut(), &camera);
            }
            WindowEvent::CursorLeft { .. } => self.pointer.on_leave(),
            WindowEvent::MouseWheel { delta, .. } if !response.consumed => {
                self.viewer.controls_mut().on_wheel(wheel_steps(delta));
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = &self.running {
            running.window.request_redraw();
        }
    }
}

/// Open the window and run the room viewer until it is closed.
pub fn run_viewer(options: RunOptions) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(options);
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow::anyhow!("Event loop error: {e:?}"))?;

    match app.init_error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
