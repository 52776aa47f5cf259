//! Baked texture upload and its bind group.

use asset::TextureData;
use wgpu::{
    BindGroup, BindGroupLayout, Device, Extent3d, Queue, Sampler, TextureDimension, TextureFormat,
    TextureUsages,
};

pub fn format_of(data: &TextureData) -> TextureFormat {
    if data.is_srgb() {
        TextureFormat::Rgba8UnormSrgb
    } else {
        TextureFormat::Rgba8Unorm
    }
}

pub fn create_sampler(device: &Device) -> Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Baked Sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// Upload RGBA8 pixels (with any mip levels) and build the material bind group.
pub fn upload(
    device: &Device,
    queue: &Queue,
    layout: &BindGroupLayout,
    sampler: &Sampler,
    data: &TextureData,
) -> BindGroup {
    let size = Extent3d {
        width: data.width.max(1),
        height: data.height.max(1),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Baked Texture"),
        size,
        mip_level_count: data.mip_level_count(),
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: format_of(data),
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });
    for level in 0..data.mip_level_count() {
        let Some(pixels) = data.mip_data(level) else {
            break;
        };
        let (width, height) = data.mip_size(level);
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: level,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(data.bytes_per_pixel() * width),
                rows_per_image: Some(height),
            },
            Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Baked BG"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_data_maps_to_srgb_format() {
        assert_eq!(
            format_of(&TextureData::solid([255; 4])),
            TextureFormat::Rgba8UnormSrgb
        );
        let linear = TextureData::new_rgba8(1, 1, vec![0; 4], false).unwrap();
        assert_eq!(format_of(&linear), TextureFormat::Rgba8Unorm);
    }
}
