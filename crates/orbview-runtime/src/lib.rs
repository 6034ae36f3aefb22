pub mod container;
pub mod graphics;
pub mod loader;
pub mod viewer;

pub use container::Container;
pub use graphics::{Graphics, RcWindow};
pub use loader::{ModelLoader, ThreadedLoader};
pub use viewer::{AssetLoad, ControlsConfig, LoadState, RenderBackend, Viewer, ViewerConfig};

pub use orbview_gltf::{LoadEvent, LoadEventKind, LoadId};
pub use orbview_scene::{Light, Scene};
