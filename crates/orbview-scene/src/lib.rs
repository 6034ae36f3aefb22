pub mod light;
pub mod mesh;
pub mod transform;

pub use light::{Light, rgb_from_hex};
pub use mesh::{Material, Mesh, MeshId, TextureData, TextureId};
pub use transform::Transform;

use glam::Mat4;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: Option<String>,
    pub transform: Transform,
    pub meshes: Vec<Arc<Mesh>>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_mesh(mut self, mesh: Arc<Mesh>) -> Self {
        self.meshes.push(mesh);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Number of meshes in this subtree.
    pub fn mesh_count(&self) -> usize {
        self.meshes.len() + self.children.iter().map(Node::mesh_count).sum::<usize>()
    }
}

/// Index of a root node inside its [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A mesh to draw along with its world matrix.
pub struct DrawItem<'a> {
    pub world: Mat4,
    pub mesh: &'a Arc<Mesh>,
}

pub struct Scene {
    pub background: [f32; 3],
    pub lights: Vec<Light>,
    nodes: Vec<Node>,
}

impl Scene {
    pub fn new(background: [f32; 3]) -> Self {
        Self {
            background,
            lights: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Adds a root node. Nodes are never removed, so the id stays valid.
    pub fn add(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Flattens the hierarchy into world-space draw items, parents first.
    pub fn draw_list(&self) -> Vec<DrawItem<'_>> {
        let mut out = Vec::new();
        for node in &self.nodes {
            collect(node, Mat4::IDENTITY, &mut out);
        }
        out
    }
}

fn collect<'a>(node: &'a Node, parent: Mat4, out: &mut Vec<DrawItem<'a>>) {
    let world = parent * node.transform.matrix();
    for mesh in &node.meshes {
        out.push(DrawItem { world, mesh });
    }
    for child in &node.children {
        collect(child, world, out);
    }
}
