use wgpu::{
    Device, Extent3d, Texture, TextureDescriptor, TextureDimension, TextureFormat, TextureUsages,
    TextureView,
};

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

pub fn create_depth(device: &Device, width: u32, height: u32) -> (TextureView, Texture) {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("depth"),
        size: Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = tex.create_view(&Default::default());
    (view, tex)
}
