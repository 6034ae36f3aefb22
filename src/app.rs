use crate::config::AppConfig;
use orbview_runtime::{Graphics, LoadEvent, LoadState, RcWindow, ThreadedLoader, Viewer};
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

pub enum AppEvent {
    Load(LoadEvent),
}

impl From<LoadEvent> for AppEvent {
    fn from(event: LoadEvent) -> Self {
        AppEvent::Load(event)
    }
}

enum State {
    Ready(Box<ReadyState>),
    Init,
    Failed,
}

struct Overlay {
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

struct ReadyState {
    window: RcWindow,
    viewer: Viewer<Graphics>,
    overlay: Option<Overlay>,
}

pub struct App {
    state: State,
    proxy: EventLoopProxy<AppEvent>,
    config: AppConfig,
}

impl App {
    pub fn new(event_loop: &EventLoop<AppEvent>, config: AppConfig) -> Self {
        Self {
            state: State::Init,
            proxy: event_loop.create_proxy(),
            config,
        }
    }

    fn init_overlay(gfx: &Graphics) -> Overlay {
        let egui_ctx = egui::Context::default();
        let viewport_id = egui_ctx.viewport_id();

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            viewport_id,
            gfx.window(),
            None,
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(
            gfx.device(),
            gfx.surface_config().format,
            egui_wgpu::RendererOptions::default(),
        );

        Overlay {
            egui_ctx,
            egui_state,
            egui_renderer,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<ReadyState> {
        let win = &self.config.window;
        let win_attr = Window::default_attributes()
            .with_title(win.title.clone())
            .with_inner_size(LogicalSize::new(win.width, win.height));
        let window: RcWindow = Arc::new(event_loop.create_window(win_attr)?);

        let loader = ThreadedLoader::new(self.proxy.clone());
        let viewer = Viewer::initialize(&*window, &self.config.viewer(), &loader, |_| {
            pollster::block_on(Graphics::new(Arc::clone(&window)))
        })?;

        let overlay = self
            .config
            .overlay
            .enabled
            .then(|| Self::init_overlay(&viewer.renderer));

        Ok(ReadyState {
            window,
            viewer,
            overlay,
        })
    }

    fn draw(ready: &mut ReadyState) {
        let Some(overlay) = ready.overlay.as_mut() else {
            ready.viewer.render_frame();
            return;
        };

        let lines: Vec<(String, Option<String>)> = ready
            .viewer
            .loads()
            .iter()
            .map(|load| {
                let name = load.path.display().to_string();
                match &load.state {
                    LoadState::Requested | LoadState::Loading => {
                        (format!("{name}: Models are on the way..."), None)
                    }
                    LoadState::Loaded(_) => (format!("{name}: loaded"), None),
                    LoadState::Failed(msg) => (format!("{name}: failed"), Some(msg.clone())),
                }
            })
            .collect();

        let raw_input = overlay.egui_state.take_egui_input(&ready.window);
        let full_output = overlay.egui_ctx.run(raw_input, |ctx| {
            egui::Area::new(egui::Id::new("load_status"))
                .anchor(egui::Align2::LEFT_TOP, egui::vec2(8.0, 8.0))
                .interactable(false)
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        for (line, error) in &lines {
                            match error {
                                Some(err) => {
                                    ui.colored_label(egui::Color32::RED, line);
                                    ui.small(err);
                                }
                                None => {
                                    ui.label(line);
                                }
                            }
                        }
                    });
                });
        });

        let egui::FullOutput {
            platform_output,
            textures_delta,
            shapes,
            pixels_per_point,
            ..
        } = full_output;

        overlay
            .egui_state
            .handle_platform_output(&ready.window, platform_output);
        let paint_jobs = overlay.egui_ctx.tessellate(shapes, pixels_per_point);
        let egui_renderer = &mut overlay.egui_renderer;

        ready.viewer.render_frame_with(|gfx, scene, camera| {
            gfx.draw(scene, camera, |gfx_inner, swap_view, encoder| {
                for (id, image_delta) in &textures_delta.set {
                    egui_renderer.update_texture(
                        gfx_inner.device(),
                        gfx_inner.queue(),
                        *id,
                        image_delta,
                    );
                }
                for id in &textures_delta.free {
                    egui_renderer.free_texture(id);
                }

                let screen_descriptor = egui_wgpu::ScreenDescriptor {
                    size_in_pixels: [
                        gfx_inner.surface_config().width,
                        gfx_inner.surface_config().height,
                    ],
                    pixels_per_point,
                };

                egui_renderer.update_buffers(
                    gfx_inner.device(),
                    gfx_inner.queue(),
                    encoder,
                    &paint_jobs,
                    &screen_descriptor,
                );

                let rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("overlay_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: swap_view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });

                let mut rpass = rpass.forget_lifetime();
                egui_renderer.render(&mut rpass, &paint_jobs, &screen_descriptor);
            });
        });
    }
}

/// Input the overlay used stays away from the orbit controls, except for
/// gesture ends, which always reach them so a drag can't stay latched.
fn forward_to_controls(event: &WindowEvent, consumed_by_overlay: bool) -> bool {
    if !consumed_by_overlay {
        return true;
    }
    match event {
        WindowEvent::MouseInput { state, .. } => *state == ElementState::Released,
        WindowEvent::Touch(touch) => {
            matches!(touch.phase, TouchPhase::Ended | TouchPhase::Cancelled)
        }
        WindowEvent::ModifiersChanged(_) | WindowEvent::CursorLeft { .. } => true,
        _ => false,
    }
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if !matches!(self.state, State::Init) {
            return;
        }
        match self.start(event_loop) {
            Ok(ready) => {
                ready.window.request_redraw();
                self.state = State::Ready(Box::new(ready));
            }
            Err(e) => {
                log::error!("failed to start viewer: {e:#}");
                self.state = State::Failed;
                event_loop.exit();
            }
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::Load(load) => {
                if let State::Ready(ready) = &mut self.state {
                    ready.viewer.handle_load_event(load);
                    ready.window.request_redraw();
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let State::Ready(ready) = &mut self.state else {
            if let WindowEvent::CloseRequested = event {
                event_loop.exit();
            }
            return;
        };

        match event {
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(overlay) = ready.overlay.as_mut() {
                    let _ = overlay.egui_state.on_window_event(&ready.window, &event);
                }
                let window = Arc::clone(&ready.window);
                ready.viewer.resize(&*window);
            }
            WindowEvent::RedrawRequested => {
                App::draw(ready);
                ready.window.request_redraw();
            }
            WindowEvent::CloseRequested => event_loop.exit(),
            other => {
                let consumed = match ready.overlay.as_mut() {
                    Some(overlay) => {
                        let response = overlay.egui_state.on_window_event(&ready.window, &other);
                        response.consumed
                    }
                    None => false,
                };
                if forward_to_controls(&other, consumed) {
                    ready.viewer.handle_window_event(&other);
                }
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
    }
}
