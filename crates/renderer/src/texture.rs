//! GPU textures: depth buffers, sampled 2D images and the skybox cubemap.

use std::path::Path;

use procgen::TextureData;
use wgpu::util::DeviceExt;

use crate::error::{RenderError, RenderResult};

/// Returns `path` if the file exists. A missing asset is warned about.
fn existing_asset(path: &Path) -> Option<&Path> {
    if path.exists() {
        Some(path)
    } else {
        log::warn!("{} not found; using generated texture", path.display());
        None
    }
}

/// A texture with its default view and sampler.
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl Texture {
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Depth buffer that can also be sampled by later passes.
    pub fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        Self::create_depth_texture_with_format(device, width, height, Self::DEPTH_FORMAT, label)
    }

    pub fn create_depth_texture_with_format(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Self { texture, view, sampler }
    }

    /// Repeating, linearly filtered 2D texture from tightly packed RGBA8 pixels.
    pub fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
        srgb: bool,
    ) -> RenderResult<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(RenderError::InvalidTexture {
                label: label.to_string(),
                reason: format!("{}x{} needs {} bytes, got {}", width, height, expected, pixels.len()),
            });
        }

        let format = if srgb {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            pixels,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Ok(Self { texture, view, sampler })
    }

    /// Upload generated texture data. Colour maps want `srgb`; dudv and normal maps do not.
    pub fn from_texture_data(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        data: &TextureData,
        srgb: bool,
    ) -> RenderResult<Self> {
        Self::from_rgba(device, queue, label, data.width, data.height, &data.to_bytes(), srgb)
    }

    /// Load an image file from disk.
    pub fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: &Path,
        srgb: bool,
    ) -> RenderResult<Self> {
        let image = image::open(path).map_err(|source| RenderError::TextureLoad {
            path: path.to_path_buf(),
            source,
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let label = path.display().to_string();
        log::info!("Loaded texture {} ({}x{})", label, width, height);
        Self::from_rgba(device, queue, &label, width, height, &rgba, srgb)
    }

    /// Load `path` if it exists, otherwise upload `fallback`.
    pub fn load_or(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: &Path,
        fallback: &TextureData,
        srgb: bool,
    ) -> RenderResult<Self> {
        if let Some(path) = existing_asset(path) {
            match Self::load(device, queue, path, srgb) {
                Ok(texture) => return Ok(texture),
                Err(e) => log::warn!("{}; using generated texture", e),
            }
        }
        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "generated".to_string());
        Self::from_texture_data(device, queue, &label, fallback, srgb)
    }

    /// Six square faces in +X, -X, +Y, -Y, +Z, -Z order.
    pub fn cubemap(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        faces: &[TextureData],
    ) -> RenderResult<Self> {
        let invalid = |reason: String| RenderError::InvalidTexture {
            label: label.to_string(),
            reason,
        };
        if faces.len() != procgen::CUBE_FACES {
            return Err(invalid(format!("expected {} faces, got {}", procgen::CUBE_FACES, faces.len())));
        }
        let size = faces[0].width;
        if size == 0 || faces.iter().any(|f| f.width != size || f.height != size) {
            return Err(invalid("faces must be square and equally sized".to_string()));
        }

        let mut bytes = Vec::with_capacity(size as usize * size as usize * 4 * faces.len());
        for face in faces {
            bytes.extend_from_slice(&face.to_bytes());
        }

        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: procgen::CUBE_FACES as u32,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &bytes,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        Ok(Self { texture, view, sampler })
    }
}
