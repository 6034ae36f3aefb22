pub mod depth;
pub mod model;
pub mod pipeline;
pub mod render;

pub use depth::create_depth;
pub use model::{FrameUniform, GpuMesh, ModelUniform, Vertex, frame_uniform};
pub use pipeline::{Layouts, create_bind_group_layouts, create_pipeline};
pub use render::SceneRenderer;
