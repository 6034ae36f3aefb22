use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use orbview_camera::PerspectiveCamera;
use orbview_scene::{Light, Mesh, Scene, TextureData};
use wgpu::util::DeviceExt;
use wgpu::*;

pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const ATTRIBS: [VertexAttribute; 3] =
        vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> VertexBufferLayout<'static> {
        VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as BufferAddress,
            step_mode: VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Camera and light state shared by every draw in a frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FrameUniform {
    pub view_proj: [[f32; 4]; 4],
    pub sky: [f32; 4],
    pub ground: [f32; 4],
    pub light_dir: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    pub light_color: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    pub light_count: [u32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ModelUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
    pub base_color: [f32; 4],
}

impl ModelUniform {
    pub fn new(world: Mat4, base_color: [f32; 4]) -> Self {
        let normal = if world.determinant().abs() > f32::EPSILON {
            world.inverse().transpose()
        } else {
            Mat4::IDENTITY
        };
        Self {
            model: world.to_cols_array_2d(),
            normal: normal.to_cols_array_2d(),
            base_color,
        }
    }
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_rgb(rgb: [f32; 3]) -> Vec3 {
    Vec3::new(
        srgb_to_linear(rgb[0]),
        srgb_to_linear(rgb[1]),
        srgb_to_linear(rgb[2]),
    )
}

/// Background clear color in linear space.
pub fn clear_color(scene: &Scene) -> Color {
    let c = linear_rgb(scene.background);
    Color {
        r: c.x as f64,
        g: c.y as f64,
        b: c.z as f64,
        a: 1.0,
    }
}

/// Packs camera and lights. Hemisphere lights add up; directional lights
/// past [`MAX_DIRECTIONAL_LIGHTS`] are dropped.
pub fn frame_uniform(scene: &Scene, camera: &PerspectiveCamera) -> FrameUniform {
    let mut u = FrameUniform::zeroed();
    u.view_proj = camera.view_projection().to_cols_array_2d();

    let mut sky = Vec3::ZERO;
    let mut ground = Vec3::ZERO;
    let mut count = 0usize;

    for light in &scene.lights {
        match *light {
            Light::Hemisphere {
                sky: s,
                ground: g,
                intensity,
            } => {
                sky += linear_rgb(s) * intensity;
                ground += linear_rgb(g) * intensity;
            }
            Light::Directional {
                color, intensity, ..
            } => {
                let Some(dir) = light.direction_to_light() else {
                    continue;
                };
                if count == MAX_DIRECTIONAL_LIGHTS {
                    log::warn!(
                        "more than {MAX_DIRECTIONAL_LIGHTS} directional lights, ignoring extra"
                    );
                    continue;
                }
                u.light_dir[count] = dir.extend(0.0).to_array();
                u.light_color[count] = (linear_rgb(color) * intensity).extend(0.0).to_array();
                count += 1;
            }
        }
    }

    u.sky = sky.extend(0.0).to_array();
    u.ground = ground.extend(0.0).to_array();
    u.light_count = [count as u32, 0, 0, 0];
    u
}

pub struct GpuMesh {
    pub vbuf: Buffer,
    pub ibuf: Buffer,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn upload(device: &Device, mesh: &Mesh) -> Self {
        let vertices: Vec<Vertex> = mesh
            .positions
            .iter()
            .zip(&mesh.normals)
            .zip(&mesh.uvs)
            .map(|((p, n), uv)| Vertex {
                position: *p,
                normal: *n,
                uv: *uv,
            })
            .collect();

        let vbuf = device.create_buffer_init(&util::BufferInitDescriptor {
            label: Some("mesh_vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: BufferUsages::VERTEX,
        });
        let ibuf = device.create_buffer_init(&util::BufferInitDescriptor {
            label: Some("mesh_indices"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: BufferUsages::INDEX,
        });

        log::debug!(
            "uploaded mesh {:?}: {} vertices, {} indices",
            mesh.id,
            vertices.len(),
            mesh.indices.len()
        );

        Self {
            vbuf,
            ibuf,
            index_count: mesh.index_count(),
        }
    }
}

/// Creates the base color texture bind group for `data`.
pub fn create_material_bg(
    device: &Device,
    queue: &Queue,
    material_bgl: &BindGroupLayout,
    sampler: &Sampler,
    data: &TextureData,
) -> BindGroup {
    let size = Extent3d {
        width: data.width,
        height: data.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&TextureDescriptor {
        label: Some("base_color"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba8UnormSrgb,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: Origin3d::ZERO,
            aspect: TextureAspect::All,
        },
        &data.rgba,
        TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * data.width),
            rows_per_image: Some(data.height),
        },
        size,
    );
    let view = texture.create_view(&TextureViewDescriptor::default());

    device.create_bind_group(&BindGroupDescriptor {
        label: Some("material_bg"),
        layout: material_bgl,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(&view),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(sampler),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera() -> PerspectiveCamera {
        let mut cam = PerspectiveCamera::new(35.0, 4.0 / 3.0, 1.0, 3000.0);
        cam.position = Vec3::new(50.0, 100.0, 100.0);
        cam.look_at = Vec3::ZERO;
        cam
    }

    #[test]
    fn uniform_sizes_match_shader_layout() {
        assert_eq!(std::mem::size_of::<FrameUniform>(), 64 + 16 + 16 + 64 + 64 + 16);
        assert_eq!(std::mem::size_of::<ModelUniform>(), 144);
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn frame_uniform_packs_lights() {
        let mut scene = Scene::new([0.0; 3]);
        scene.add_light(Light::hemisphere(0xffffff, 0x000000, 5.0));
        scene.add_light(Light::directional(0xffffff, 2.0, Vec3::new(0.0, 10.0, 0.0)));

        let u = frame_uniform(&scene, &camera());
        assert_eq!(u.light_count[0], 1);
        assert_relative_eq!(u.sky[0], 5.0, epsilon = 1e-5);
        assert_relative_eq!(u.ground[0], 0.0);
        assert_relative_eq!(u.light_dir[0][1], 1.0);
        assert_relative_eq!(u.light_color[0][2], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn extra_directional_lights_are_dropped() {
        let mut scene = Scene::new([0.0; 3]);
        for _ in 0..6 {
            scene.add_light(Light::directional(0xffffff, 1.0, Vec3::X));
        }
        let u = frame_uniform(&scene, &camera());
        assert_eq!(u.light_count[0] as usize, MAX_DIRECTIONAL_LIGHTS);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let world = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let u = ModelUniform::new(world, [1.0; 4]);
        let normal = Mat4::from_cols_array_2d(&u.normal);
        assert_relative_eq!(normal.x_axis.x, 0.5);

        let degenerate = ModelUniform::new(Mat4::ZERO, [1.0; 4]);
        assert_eq!(Mat4::from_cols_array_2d(&degenerate.normal), Mat4::IDENTITY);
    }

    #[test]
    fn srgb_endpoints() {
        assert_relative_eq!(srgb_to_linear(0.0), 0.0);
        assert_relative_eq!(srgb_to_linear(1.0), 1.0, epsilon = 1e-6);
        assert!(srgb_to_linear(0.5) < 0.5);
    }
}
