use crate::container::{Container, physical_size};
use crate::viewer::RenderBackend;
use anyhow::{Context, Result};
use orbview_3d::SceneRenderer;
use orbview_camera::PerspectiveCamera;
use orbview_scene::Scene;
use std::sync::Arc;
use wgpu::{
    Adapter, CommandEncoder, CommandEncoderDescriptor, Device, ExperimentalFeatures, Features,
    Instance, Limits, MemoryHints, PowerPreference, PresentMode, Queue, RequestAdapterOptions,
    Surface, SurfaceConfiguration, SurfaceError, TextureView, TextureViewDescriptor,
};
use winit::window::Window;

pub type RcWindow = Arc<Window>;

/// wgpu backend bound to a winit window.
#[allow(dead_code)]
pub struct Graphics {
    window: RcWindow,
    instance: Instance,
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    adapter: Adapter,
    device: Device,
    queue: Queue,
    renderer: SceneRenderer,
    size: (u32, u32),
    pixel_ratio: f64,
}

impl Graphics {
    pub async fn new(window: RcWindow) -> Result<Self> {
        let instance = Instance::default();
        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("failed to create surface")?;

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .context("could not get a GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: MemoryHints::Performance,
                trace: Default::default(),
                experimental_features: ExperimentalFeatures::disabled(),
            })
            .await
            .context("failed to get device")?;

        let size = window.client_size();
        let pixel_ratio = window.pixel_ratio();
        let (pw, ph) = physical_size(size.0, size.1, pixel_ratio);

        let mut surface_config = surface
            .get_default_config(&adapter, pw, ph)
            .context("surface is not supported by the adapter")?;
        let caps = surface.get_capabilities(&adapter);
        if let Some(srgb) = caps.formats.iter().copied().find(|f| f.is_srgb()) {
            surface_config.format = srgb;
        }
        surface_config.present_mode = PresentMode::Fifo;
        surface.configure(&device, &surface_config);

        let renderer = SceneRenderer::new(&device, &queue, surface_config.format, pw, ph);

        log::info!(
            "graphics ready: {:?} on {}, {}x{} {:?}",
            adapter.get_info().backend,
            adapter.get_info().name,
            pw,
            ph,
            surface_config.format
        );

        Ok(Self {
            window,
            instance,
            surface,
            surface_config,
            adapter,
            device,
            queue,
            renderer,
            size,
            pixel_ratio,
        })
    }

    fn reconfigure(&mut self) {
        let (pw, ph) = physical_size(self.size.0, self.size.1, self.pixel_ratio);
        if (pw, ph) == (self.surface_config.width, self.surface_config.height) {
            return;
        }
        self.surface_config.width = pw;
        self.surface_config.height = ph;
        self.surface.configure(&self.device, &self.surface_config);
        self.renderer.resize(&self.device, pw, ph);
    }

    /// Draws the scene, then hands the swapchain view and encoder to
    /// `overlay` before submitting.
    pub fn draw<F>(&mut self, scene: &Scene, camera: &PerspectiveCamera, overlay: F)
    where
        F: FnOnce(&mut Self, &TextureView, &mut CommandEncoder),
    {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.surface_config);
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                log::error!("out of memory acquiring surface texture");
                return;
            }
            Err(e) => {
                log::warn!("skipping frame: {e}");
                return;
            }
        };

        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });

        self.renderer.prepare(&self.device, &self.queue, scene, camera);
        self.renderer.render(&mut encoder, &view);
        overlay(self, &view, &mut encoder);

        self.queue.submit(Some(encoder.finish()));
        self.window.pre_present_notify();
        frame.present();
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn surface_config(&self) -> &SurfaceConfiguration {
        &self.surface_config
    }
}

impl RenderBackend for Graphics {
    fn set_pixel_ratio(&mut self, ratio: f64) {
        self.pixel_ratio = ratio;
        self.reconfigure();
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width.max(1), height.max(1));
        self.reconfigure();
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) {
        self.draw(scene, camera, |_, _, _| {});
    }
}
