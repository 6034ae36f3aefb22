use crate::depth::create_depth;
use crate::model::{GpuMesh, ModelUniform, clear_color, create_material_bg, frame_uniform};
use crate::pipeline::{Layouts, create_bind_group_layouts, create_pipeline};
use orbview_camera::PerspectiveCamera;
use orbview_scene::{MeshId, Scene, TextureData, TextureId};
use std::collections::{HashMap, HashSet};
use wgpu::*;

const INITIAL_MODEL_SLOTS: u64 = 16;

struct DrawCall {
    mesh: MeshId,
    texture: Option<TextureId>,
    offset: u32,
}

/// Forward renderer for a [`Scene`].
///
/// GPU buffers and textures are created the first time a mesh is drawn and
/// kept for the life of the renderer, since scene content is never removed.
pub struct SceneRenderer {
    pub render_pipeline: RenderPipeline,
    pub depth_view: TextureView,
    pub depth_tex: Texture,
    layouts: Layouts,
    frame_buf: Buffer,
    frame_bg: BindGroup,
    model_buf: Buffer,
    model_bg: BindGroup,
    model_slots: u64,
    model_stride: u64,
    sampler: Sampler,
    white_bg: BindGroup,
    meshes: HashMap<MeshId, GpuMesh>,
    materials: HashMap<TextureId, BindGroup>,
    rejected: HashSet<TextureId>,
    clear: Color,
    draws: Vec<DrawCall>,
}

impl SceneRenderer {
    pub fn new(
        device: &Device,
        queue: &Queue,
        surface_format: TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let layouts = create_bind_group_layouts(device);
        let render_pipeline = create_pipeline(device, surface_format, &layouts);
        let (depth_view, depth_tex) = create_depth(device, width, height);

        let frame_buf = device.create_buffer(&BufferDescriptor {
            label: Some("frame_ubo"),
            size: std::mem::size_of::<crate::model::FrameUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bg = device.create_bind_group(&BindGroupDescriptor {
            label: Some("frame_bg"),
            layout: &layouts.frame_bgl,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: frame_buf.as_entire_binding(),
            }],
        });

        let align = device.limits().min_uniform_buffer_offset_alignment as u64;
        let model_stride = (std::mem::size_of::<ModelUniform>() as u64).div_ceil(align) * align;
        let (model_buf, model_bg) =
            create_model_ubo(device, &layouts.model_bgl, model_stride, INITIAL_MODEL_SLOTS);

        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("base_color_sampler"),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            ..Default::default()
        });
        let white = TextureData::new(1, 1, vec![255; 4]);
        let white_bg = create_material_bg(device, queue, &layouts.material_bgl, &sampler, &white);

        Self {
            render_pipeline,
            depth_view,
            depth_tex,
            layouts,
            frame_buf,
            frame_bg,
            model_buf,
            model_bg,
            model_slots: INITIAL_MODEL_SLOTS,
            model_stride,
            sampler,
            white_bg,
            meshes: HashMap::new(),
            materials: HashMap::new(),
            rejected: HashSet::new(),
            clear: Color::BLACK,
            draws: Vec::new(),
        }
    }

    pub fn resize(&mut self, device: &Device, width: u32, height: u32) {
        let (dv, dt) = create_depth(device, width, height);
        self.depth_view = dv;
        self.depth_tex = dt;
    }

    /// Uploads whatever the scene needs and writes this frame's uniforms.
    pub fn prepare(
        &mut self,
        device: &Device,
        queue: &Queue,
        scene: &Scene,
        camera: &PerspectiveCamera,
    ) {
        self.clear = clear_color(scene);
        queue.write_buffer(
            &self.frame_buf,
            0,
            bytemuck::cast_slice(&[frame_uniform(scene, camera)]),
        );

        let items = scene.draw_list();
        self.draws.clear();

        let needed = items.len() as u64;
        if needed > self.model_slots {
            let slots = needed.next_power_of_two();
            let (buf, bg) =
                create_model_ubo(device, &self.layouts.model_bgl, self.model_stride, slots);
            self.model_buf = buf;
            self.model_bg = bg;
            self.model_slots = slots;
        }

        let max_dim = device.limits().max_texture_dimension_2d;
        let mut staging = vec![0u8; (needed * self.model_stride) as usize];
        for (slot, item) in items.iter().enumerate() {
            let mesh = item.mesh;
            if mesh.indices.is_empty() || mesh.positions.is_empty() {
                continue;
            }
            self.meshes
                .entry(mesh.id)
                .or_insert_with(|| GpuMesh::upload(device, mesh));

            let texture = match &mesh.material.base_color_texture {
                Some(tex) if !texture_fits(tex, max_dim) => {
                    if self.rejected.insert(tex.id) {
                        log::warn!(
                            "texture {:?} is {}x{}, device limit is {max_dim}; drawing untextured",
                            tex.id,
                            tex.width,
                            tex.height
                        );
                    }
                    None
                }
                Some(tex) => {
                    let (layouts, sampler) = (&self.layouts, &self.sampler);
                    self.materials.entry(tex.id).or_insert_with(|| {
                        create_material_bg(device, queue, &layouts.material_bgl, sampler, tex)
                    });
                    Some(tex.id)
                }
                _ => None,
            };

            let offset = slot as u64 * self.model_stride;
            let uniform = ModelUniform::new(item.world, mesh.material.base_color);
            let bytes = bytemuck::bytes_of(&uniform);
            staging[offset as usize..offset as usize + bytes.len()].copy_from_slice(bytes);

            self.draws.push(DrawCall {
                mesh: mesh.id,
                texture,
                offset: offset as u32,
            });
        }
        if !staging.is_empty() {
            queue.write_buffer(&self.model_buf, 0, &staging);
        }
    }

    pub fn render(&self, encoder: &mut CommandEncoder, target_view: &TextureView) {
        let mut r_pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("scene_pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: target_view,
                depth_slice: None,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(self.clear),
                    store: StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(Operations {
                    load: LoadOp::Clear(1.0),
                    store: StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        r_pass.set_pipeline(&self.render_pipeline);
        r_pass.set_bind_group(0, &self.frame_bg, &[]);

        for draw in &self.draws {
            let Some(mesh) = self.meshes.get(&draw.mesh) else {
                continue;
            };
            let material = draw
                .texture
                .and_then(|id| self.materials.get(&id))
                .unwrap_or(&self.white_bg);

            r_pass.set_bind_group(1, &self.model_bg, &[draw.offset]);
            r_pass.set_bind_group(2, material, &[]);
            r_pass.set_vertex_buffer(0, mesh.vbuf.slice(..));
            r_pass.set_index_buffer(mesh.ibuf.slice(..), IndexFormat::Uint32);
            r_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

/// Whether `tex` can be created as a 2D texture on a device with `max_dim`.
fn texture_fits(tex: &TextureData, max_dim: u32) -> bool {
    (1..=max_dim).contains(&tex.width) && (1..=max_dim).contains(&tex.height)
}

fn create_model_ubo(
    device: &Device,
    model_bgl: &BindGroupLayout,
    stride: u64,
    slots: u64,
) -> (Buffer, BindGroup) {
    let buf = device.create_buffer(&BufferDescriptor {
        label: Some("model_ubo"),
        size: stride * slots,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bg = device.create_bind_group(&BindGroupDescriptor {
        label: Some("model_bg"),
        layout: model_bgl,
        entries: &[BindGroupEntry {
            binding: 0,
            resource: BindingResource::Buffer(BufferBinding {
                buffer: &buf,
                offset: 0,
                size: BufferSize::new(std::mem::size_of::<ModelUniform>() as u64),
            }),
        }],
    });
    (buf, bg)
}
