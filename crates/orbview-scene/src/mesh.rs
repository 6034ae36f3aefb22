use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique mesh identity; renderers key their GPU caches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(u64);

/// Decoded RGBA8 image.
#[derive(Debug)]
pub struct TextureData {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        debug_assert_eq!(rgba.len(), (width * height * 4) as usize);
        Self {
            id: TextureId(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed)),
            width,
            height,
            rgba,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Material {
    pub base_color: [f32; 4],
    pub base_color_texture: Option<Arc<TextureData>>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
        }
    }
}

/// A single indexed triangle list.
#[derive(Debug)]
pub struct Mesh {
    pub id: MeshId,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
    pub material: Material,
}

impl Mesh {
    /// Builds a mesh, filling in whatever optional attributes are missing.
    ///
    /// Missing indices become a sequential list, missing normals are
    /// accumulated from face normals and missing UVs are zeroed.
    pub fn new(
        positions: Vec<[f32; 3]>,
        normals: Option<Vec<[f32; 3]>>,
        uvs: Option<Vec<[f32; 2]>>,
        indices: Option<Vec<u32>>,
        material: Material,
    ) -> Self {
        let indices = indices.unwrap_or_else(|| (0..positions.len() as u32).collect());
        let normals = match normals {
            Some(n) if n.len() == positions.len() => n,
            _ => compute_normals(&positions, &indices),
        };
        let uvs = match uvs {
            Some(uv) if uv.len() == positions.len() => uv,
            _ => vec![[0.0, 0.0]; positions.len()],
        };

        Self {
            id: MeshId(NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed)),
            positions,
            normals,
            uvs,
            indices,
            material,
        }
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

fn compute_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    use glam::Vec3;

    let mut acc = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let pa = Vec3::from_array(positions[a]);
        let pb = Vec3::from_array(positions[b]);
        let pc = Vec3::from_array(positions[c]);
        // area-weighted
        let n = (pb - pa).cross(pc - pa);
        acc[a] += n;
        acc[b] += n;
        acc[c] += n;
    }

    acc.into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
        .collect()
}
