use anyhow::{Context, Result, anyhow, bail};
use glam::{Quat, Vec3};
use gltf::image::Format;
use image::{DynamicImage, ImageBuffer};
use orbview_scene::{Material, Mesh, Node, TextureData, Transform};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Parses glTF/GLB bytes and returns the first root node of the default
/// scene, with its whole subtree.
///
/// External buffers and images are resolved relative to `base`.
pub fn parse_first_node(bytes: &[u8], base: Option<&Path>) -> Result<Node> {
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes).context("invalid glTF")?;
    let buffers = gltf::import_buffers(&document, base, blob).context("failed to load buffers")?;
    let images = gltf::import_images(&document, base, &buffers).context("failed to load images")?;

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| anyhow!("file contains no scene"))?;
    let root = scene
        .nodes()
        .next()
        .ok_or_else(|| anyhow!("scene {} has no nodes", scene.index()))?;

    let mut importer = Importer {
        buffers: &buffers,
        images: &images,
        textures: HashMap::new(),
    };
    importer.node(&root)
}

struct Importer<'a> {
    buffers: &'a [gltf::buffer::Data],
    images: &'a [gltf::image::Data],
    textures: HashMap<usize, Arc<TextureData>>,
}

impl Importer<'_> {
    fn node(&mut self, node: &gltf::Node) -> Result<Node> {
        let (t, r, s) = node.transform().decomposed();
        let transform = Transform {
            translation: Vec3::from_array(t),
            rotation: Quat::from_array(r),
            scale: Vec3::from_array(s),
        };

        let mut meshes = Vec::new();
        if let Some(mesh) = node.mesh() {
            for primitive in mesh.primitives() {
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    log::warn!(
                        "skipping {:?} primitive {} of mesh {:?}",
                        primitive.mode(),
                        primitive.index(),
                        mesh.name()
                    );
                    continue;
                }
                meshes.push(Arc::new(self.primitive(&primitive)?));
            }
        }

        let children = node
            .children()
            .map(|child| self.node(&child))
            .collect::<Result<Vec<_>>>()?;

        Ok(Node {
            name: node.name().map(str::to_owned),
            transform,
            meshes,
            children,
        })
    }

    fn primitive(&mut self, primitive: &gltf::Primitive) -> Result<Mesh> {
        // The accessor readers underflow on zero-length accessors.
        for (semantic, accessor) in primitive.attributes() {
            if accessor.count() == 0 {
                bail!(
                    "primitive {} has an empty {semantic:?} accessor",
                    primitive.index()
                );
            }
        }
        if primitive.indices().is_some_and(|a| a.count() == 0) {
            bail!("primitive {} has an empty index accessor", primitive.index());
        }

        let buffers = self.buffers;
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));

        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .ok_or_else(|| anyhow!("primitive {} has no positions", primitive.index()))?
            .collect();
        let normals = reader.read_normals().map(|n| n.collect());
        let uvs = reader.read_tex_coords(0).map(|uv| uv.into_f32().collect());
        let indices = reader.read_indices().map(|i| i.into_u32().collect());

        let pbr = primitive.material().pbr_metallic_roughness();
        let base_color_texture = match pbr.base_color_texture() {
            Some(info) => Some(self.texture(info.texture().source().index())?),
            None => None,
        };
        let material = Material {
            base_color: pbr.base_color_factor(),
            base_color_texture,
        };

        Ok(Mesh::new(positions, normals, uvs, indices, material))
    }

    fn texture(&mut self, image_index: usize) -> Result<Arc<TextureData>> {
        if let Some(tex) = self.textures.get(&image_index) {
            return Ok(Arc::clone(tex));
        }
        let data = self
            .images
            .get(image_index)
            .ok_or_else(|| anyhow!("missing image {image_index}"))?;
        let rgba = to_rgba8(data).with_context(|| format!("decoding image {image_index}"))?;
        let tex = Arc::new(TextureData::new(data.width, data.height, rgba));
        self.textures.insert(image_index, Arc::clone(&tex));
        Ok(tex)
    }
}

fn to_rgba8(data: &gltf::image::Data) -> Result<Vec<u8>> {
    let (w, h) = (data.width, data.height);
    let px = data.pixels.clone();

    let image = match data.format {
        Format::R8 => ImageBuffer::from_raw(w, h, px).map(DynamicImage::ImageLuma8),
        Format::R8G8 => ImageBuffer::from_raw(w, h, px).map(DynamicImage::ImageLumaA8),
        Format::R8G8B8 => ImageBuffer::from_raw(w, h, px).map(DynamicImage::ImageRgb8),
        Format::R8G8B8A8 => ImageBuffer::from_raw(w, h, px).map(DynamicImage::ImageRgba8),
        Format::R16 => ImageBuffer::from_raw(w, h, u16s(&px)).map(DynamicImage::ImageLuma16),
        Format::R16G16 => ImageBuffer::from_raw(w, h, u16s(&px)).map(DynamicImage::ImageLumaA16),
        Format::R16G16B16 => ImageBuffer::from_raw(w, h, u16s(&px)).map(DynamicImage::ImageRgb16),
        Format::R16G16B16A16 => {
            ImageBuffer::from_raw(w, h, u16s(&px)).map(DynamicImage::ImageRgba16)
        }
        Format::R32G32B32FLOAT => {
            ImageBuffer::from_raw(w, h, f32s(&px)).map(DynamicImage::ImageRgb32F)
        }
        Format::R32G32B32A32FLOAT => {
            ImageBuffer::from_raw(w, h, f32s(&px)).map(DynamicImage::ImageRgba32F)
        }
    };

    match image {
        Some(img) => Ok(img.to_rgba8().into_raw()),
        None => bail!("pixel buffer does not match {w}x{h} {:?}", data.format),
    }
}

fn u16s(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect()
}

fn f32s(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
