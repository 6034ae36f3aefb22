use crate::container::{Container, physical_size};
use crate::loader::ModelLoader;
use anyhow::Result;
use glam::Vec3;
use orbview_camera::{OrbitControls, PerspectiveCamera, aspect_ratio};
use orbview_gltf::{LoadEvent, LoadEventKind, LoadId};
use orbview_scene::{Light, NodeId, Scene, rgb_from_hex};
use std::path::{Path, PathBuf};
use winit::event::WindowEvent;

/// Something that can draw a scene to the container.
pub trait RenderBackend {
    fn set_pixel_ratio(&mut self, ratio: f64);

    /// Sets the output size in logical pixels.
    fn set_size(&mut self, width: u32, height: u32);

    fn size(&self) -> (u32, u32);

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera);
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlsConfig {
    pub enabled: bool,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub background: u32,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub camera_position: Vec3,
    pub controls: ControlsConfig,
    pub model_path: PathBuf,
    pub model_position: Vec3,
    pub lights: Vec<Light>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            background: 0x8fbcd4,
            fov_y_degrees: 35.0,
            near: 1.0,
            far: 3000.0,
            camera_position: Vec3::new(50.0, 100.0, 100.0),
            controls: ControlsConfig::default(),
            model_path: PathBuf::from("computer.glb"),
            model_position: Vec3::ZERO,
            lights: vec![
                Light::hemisphere(0xddeeff, 0x202020, 5.0),
                Light::directional(0xffffff, 5.0, Vec3::new(10.0, 10.0, 10.0)),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Requested,
    Loading,
    Loaded(NodeId),
    Failed(String),
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadState::Loaded(_) | LoadState::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct AssetLoad {
    pub id: LoadId,
    pub path: PathBuf,
    pub position: Vec3,
    pub state: LoadState,
}

/// Everything the viewer owns: one scene, one camera, one set of controls,
/// one renderer, plus the models loaded so far.
pub struct Viewer<R> {
    pub scene: Scene,
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    pub renderer: R,
    models: Vec<NodeId>,
    loads: Vec<AssetLoad>,
    frames: u64,
}

impl<R: RenderBackend> Viewer<R> {
    /// Builds the viewer in order: scene, camera, controls, model load,
    /// lights, renderer.
    pub fn initialize<C, L, F>(
        container: &C,
        config: &ViewerConfig,
        loader: &L,
        make_renderer: F,
    ) -> Result<Self>
    where
        C: Container + ?Sized,
        L: ModelLoader + ?Sized,
        F: FnOnce(&C) -> Result<R>,
    {
        let (width, height) = container.client_size();

        let mut scene = Scene::new(rgb_from_hex(config.background));

        let mut camera = PerspectiveCamera::new(
            config.fov_y_degrees,
            aspect_ratio(width, height),
            config.near,
            config.far,
        );
        camera.position = config.camera_position;

        let mut controls = OrbitControls::new(&mut camera);
        controls.enabled = config.controls.enabled;
        controls.rotate_speed = config.controls.rotate_speed;
        controls.zoom_speed = config.controls.zoom_speed;
        controls.pan_speed = config.controls.pan_speed;
        let (pw, ph) = physical_size(width, height, container.pixel_ratio());
        controls.set_viewport_size(pw, ph);

        let mut loads = Vec::new();
        request_load(&mut loads, loader, &config.model_path, config.model_position);

        for light in &config.lights {
            scene.add_light(*light);
        }

        let mut renderer = make_renderer(container)?;
        renderer.set_size(width.max(1), height.max(1));
        renderer.set_pixel_ratio(container.pixel_ratio());

        log::info!("viewer initialized at {width}x{height}");

        Ok(Self {
            scene,
            camera,
            controls,
            renderer,
            models: Vec::new(),
            loads,
            frames: 0,
        })
    }

    /// Requests an asynchronous load; the model lands at `position` once
    /// the matching [`LoadEvent`] arrives.
    pub fn load_model<L>(&mut self, loader: &L, path: &Path, position: Vec3) -> LoadId
    where
        L: ModelLoader + ?Sized,
    {
        request_load(&mut self.loads, loader, path, position)
    }

    pub fn handle_load_event(&mut self, event: LoadEvent) {
        let Some(load) = self.loads.iter_mut().find(|l| l.id == event.id) else {
            log::warn!("load event for unknown request {:?}", event.id);
            return;
        };
        if load.state.is_terminal() {
            log::debug!("ignoring event for finished load {:?}", event.id);
            return;
        }

        match event.kind {
            LoadEventKind::Progress { loaded, total } => {
                load.state = LoadState::Loading;
                match total {
                    Some(total) => log::info!("Models are on the way... ({loaded}/{total} bytes)"),
                    None => log::info!("Models are on the way..."),
                }
            }
            LoadEventKind::Loaded(mut node) => {
                node.transform.translation = load.position;
                let id = self.scene.add(node);
                self.models.push(id);
                load.state = LoadState::Loaded(id);
                log::info!("loaded {} at {}", load.path.display(), load.position);
            }
            LoadEventKind::Failed(message) => {
                log::error!("{message}");
                load.state = LoadState::Failed(message);
            }
        }
    }

    /// Re-reads the container size. Scene content is untouched.
    pub fn resize<C: Container + ?Sized>(&mut self, container: &C) {
        let (width, height) = container.client_size();
        let (width, height) = (width.max(1), height.max(1));

        self.camera.aspect = aspect_ratio(width, height);
        self.camera.update_projection_matrix();

        self.renderer.set_pixel_ratio(container.pixel_ratio());
        self.renderer.set_size(width, height);

        let (pw, ph) = physical_size(width, height, container.pixel_ratio());
        self.controls.set_viewport_size(pw, ph);
    }

    /// Forwards input to the orbit controls. Returns `true` if it was used.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        self.controls.handle_window_event(event, &mut self.camera)
    }

    pub fn render_frame(&mut self) {
        self.render_frame_with(|renderer, scene, camera| renderer.render(scene, camera));
    }

    /// Renders through a custom draw call, e.g. to add an overlay pass.
    pub fn render_frame_with<F>(&mut self, draw: F)
    where
        F: FnOnce(&mut R, &Scene, &PerspectiveCamera),
    {
        self.frames += 1;
        draw(&mut self.renderer, &self.scene, &self.camera);
    }

    pub fn models(&self) -> &[NodeId] {
        &self.models
    }

    pub fn loads(&self) -> &[AssetLoad] {
        &self.loads
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }
}

fn request_load<L>(loads: &mut Vec<AssetLoad>, loader: &L, path: &Path, position: Vec3) -> LoadId
where
    L: ModelLoader + ?Sized,
{
    let id = LoadId(loads.len() as u64);
    loads.push(AssetLoad {
        id,
        path: path.to_path_buf(),
        position,
        state: LoadState::Requested,
    });
    log::debug!("requesting {} as {id:?}", path.display());
    loader.load(id, path);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use orbview_scene::{Material, Mesh, Node, Transform};
    use std::cell::RefCell;
    use std::sync::Arc;

    struct FakeContainer {
        size: (u32, u32),
        ratio: f64,
    }

    impl Container for FakeContainer {
        fn client_size(&self) -> (u32, u32) {
            self.size
        }

        fn pixel_ratio(&self) -> f64 {
            self.ratio
        }
    }

    #[derive(Default)]
    struct FakeRenderer {
        size: (u32, u32),
        ratio: f64,
        renders: u64,
        last_node_count: usize,
    }

    impl RenderBackend for FakeRenderer {
        fn set_pixel_ratio(&mut self, ratio: f64) {
            self.ratio = ratio;
        }

        fn set_size(&mut self, width: u32, height: u32) {
            self.size = (width, height);
        }

        fn size(&self) -> (u32, u32) {
            self.size
        }

        fn render(&mut self, scene: &Scene, _camera: &PerspectiveCamera) {
            self.renders += 1;
            self.last_node_count = scene.len();
        }
    }

    #[derive(Default)]
    struct RecordingLoader {
        requests: RefCell<Vec<(LoadId, PathBuf)>>,
    }

    impl ModelLoader for RecordingLoader {
        fn load(&self, id: LoadId, path: &Path) {
            self.requests.borrow_mut().push((id, path.to_path_buf()));
        }
    }

    fn container(w: u32, h: u32) -> FakeContainer {
        FakeContainer {
            size: (w, h),
            ratio: 1.0,
        }
    }

    fn viewer_at(w: u32, h: u32) -> (Viewer<FakeRenderer>, RecordingLoader) {
        let loader = RecordingLoader::default();
        let viewer = Viewer::initialize(
            &container(w, h),
            &ViewerConfig::default(),
            &loader,
            |_| Ok(FakeRenderer::default()),
        )
        .unwrap();
        (viewer, loader)
    }

    fn model_node() -> Node {
        let mesh = Mesh::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            None,
            None,
            None,
            Material::default(),
        );
        Node::new("Computer")
            .with_transform(Transform::from_translation(Vec3::new(3.0, 4.0, 5.0)))
            .with_mesh(Arc::new(mesh))
    }

    #[test]
    fn initialize_matches_container() {
        for (w, h) in [(800, 600), (1920, 1080), (300, 900), (1, 1)] {
            let (viewer, _) = viewer_at(w, h);
            assert_relative_eq!(viewer.camera.aspect, w as f32 / h as f32);
            assert_eq!(viewer.renderer.size(), (w, h));
        }
    }

    #[test]
    fn initialize_builds_reference_scene() {
        let (viewer, loader) = viewer_at(800, 600);

        assert_eq!(viewer.scene.lights.len(), 2);
        assert!(viewer.scene.is_empty());
        assert_eq!(viewer.camera.look_at, Vec3::ZERO);
        assert_relative_eq!(viewer.camera.fov_y_degrees, 35.0);
        assert_relative_eq!(viewer.renderer.ratio, 1.0);

        let requests = loader.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1, PathBuf::from("computer.glb"));
        assert_eq!(viewer.loads()[0].state, LoadState::Requested);
    }

    #[test]
    fn make_renderer_error_propagates() {
        let loader = RecordingLoader::default();
        let res: Result<Viewer<FakeRenderer>> = Viewer::initialize(
            &container(800, 600),
            &ViewerConfig::default(),
            &loader,
            |_| Err(anyhow::anyhow!("no adapter")),
        );
        assert!(res.is_err());
    }

    #[test]
    fn successful_load_places_model() {
        let (mut viewer, _) = viewer_at(800, 600);
        let id = viewer.loads()[0].id;

        viewer.handle_load_event(LoadEvent {
            id,
            kind: LoadEventKind::Progress {
                loaded: 10,
                total: Some(20),
            },
        });
        assert_eq!(viewer.loads()[0].state, LoadState::Loading);
        assert!(viewer.models().is_empty());

        viewer.handle_load_event(LoadEvent {
            id,
            kind: LoadEventKind::Loaded(model_node()),
        });

        assert_eq!(viewer.models().len(), 1);
        let node = viewer.scene.node(viewer.models()[0]).unwrap();
        assert_eq!(node.transform.translation, Vec3::ZERO);
        assert_eq!(node.name.as_deref(), Some("Computer"));
        assert_eq!(viewer.loads()[0].state, LoadState::Loaded(viewer.models()[0]));
    }

    #[test]
    fn failed_load_changes_nothing() {
        let (mut viewer, _) = viewer_at(800, 600);
        let id = viewer.loads()[0].id;

        viewer.handle_load_event(LoadEvent {
            id,
            kind: LoadEventKind::Failed("failed to read computer.glb".into()),
        });

        assert!(viewer.models().is_empty());
        assert!(viewer.scene.is_empty());
        assert_eq!(
            viewer.loads()[0].state,
            LoadState::Failed("failed to read computer.glb".into())
        );
    }

    #[test]
    fn events_after_completion_are_ignored() {
        let (mut viewer, _) = viewer_at(800, 600);
        let id = viewer.loads()[0].id;

        viewer.handle_load_event(LoadEvent {
            id,
            kind: LoadEventKind::Failed("boom".into()),
        });
        viewer.handle_load_event(LoadEvent {
            id,
            kind: LoadEventKind::Loaded(model_node()),
        });

        assert!(viewer.models().is_empty());
        assert_eq!(viewer.loads()[0].state, LoadState::Failed("boom".into()));
    }

    #[test]
    fn unknown_load_id_is_ignored() {
        let (mut viewer, _) = viewer_at(800, 600);
        viewer.handle_load_event(LoadEvent {
            id: LoadId(99),
            kind: LoadEventKind::Loaded(model_node()),
        });
        assert!(viewer.models().is_empty());
    }

    #[test]
    fn models_accumulate() {
        let (mut viewer, loader) = viewer_at(800, 600);
        let second = viewer.load_model(&loader, Path::new("desk.glb"), Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(loader.requests.borrow().len(), 2);

        viewer.handle_load_event(LoadEvent {
            id: second,
            kind: LoadEventKind::Loaded(model_node()),
        });
        viewer.handle_load_event(LoadEvent {
            id: viewer.loads()[0].id,
            kind: LoadEventKind::Loaded(model_node()),
        });

        assert_eq!(viewer.models().len(), 2);
        let first = viewer.scene.node(viewer.models()[0]).unwrap();
        assert_eq!(first.transform.translation, Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn resize_updates_camera_and_renderer_only() {
        let (mut viewer, _) = viewer_at(800, 600);
        viewer.handle_load_event(LoadEvent {
            id: viewer.loads()[0].id,
            kind: LoadEventKind::Loaded(model_node()),
        });
        let position = viewer.camera.position;

        viewer.resize(&FakeContainer {
            size: (1024, 512),
            ratio: 2.0,
        });

        assert_relative_eq!(viewer.camera.aspect, 2.0);
        assert_eq!(viewer.renderer.size(), (1024, 512));
        assert_relative_eq!(viewer.renderer.ratio, 2.0);
        assert_eq!(viewer.models().len(), 1);
        assert_eq!(viewer.scene.len(), 1);
        assert_eq!(viewer.camera.position, position);
    }

    #[test]
    fn resize_to_zero_clamps() {
        let (mut viewer, _) = viewer_at(800, 600);
        viewer.resize(&container(0, 0));
        assert_eq!(viewer.renderer.size(), (1, 1));
        assert_relative_eq!(viewer.camera.aspect, 1.0);
    }

    #[test]
    fn render_count_tracks_frames_without_mutation() {
        let (mut viewer, _) = viewer_at(800, 600);
        let camera = viewer.camera.clone();

        for _ in 0..5 {
            viewer.render_frame();
        }

        assert_eq!(viewer.frames_rendered(), 5);
        assert_eq!(viewer.renderer.renders, 5);
        assert_eq!(viewer.camera.position, camera.position);
        assert_eq!(viewer.camera.projection_matrix(), camera.projection_matrix());
        assert!(viewer.scene.is_empty());
    }

    #[test]
    fn reference_scenario() {
        let (mut viewer, _) = viewer_at(800, 600);
        assert_relative_eq!(viewer.camera.aspect, 1.3333, epsilon = 1e-4);

        viewer.handle_load_event(LoadEvent {
            id: viewer.loads()[0].id,
            kind: LoadEventKind::Loaded(model_node()),
        });
        assert_eq!(viewer.models().len(), 1);
        let node = viewer.scene.node(viewer.models()[0]).unwrap();
        assert_eq!(node.transform.translation, Vec3::ZERO);

        viewer.resize(&container(400, 300));
        assert_relative_eq!(viewer.camera.aspect, 1.3333, epsilon = 1e-4);
        assert_eq!(viewer.renderer.size(), (400, 300));

        viewer.render_frame();
        assert_eq!(viewer.renderer.last_node_count, 1);
    }
}
