//! Offscreen render targets for the refraction and reflection passes.
//!
//! Both targets are created once at startup at the surface's physical size and are never
//! reallocated; the water shader samples them with normalized screen coordinates.

use crate::error::{RenderError, RenderResult};
use crate::texture::Texture;

/// The two offscreen targets the water samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetId {
    Refraction,
    Reflection,
}

impl TargetId {
    pub const ALL: [TargetId; 2] = [TargetId::Refraction, TargetId::Reflection];

    /// Texture slot the water shader samples this target from.
    pub fn slot(self) -> u32 {
        match self {
            TargetId::Refraction => 0,
            TargetId::Reflection => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TargetId::Refraction => "Refraction Target",
            TargetId::Reflection => "Reflection Target",
        }
    }
}

/// Requested shape of an offscreen target, checked before any GPU allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSpec {
    pub label: String,
    pub slot: u32,
    pub width: u32,
    pub height: u32,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
}

impl TargetSpec {
    pub fn new(id: TargetId, width: u32, height: u32, color_format: wgpu::TextureFormat) -> Self {
        Self {
            label: id.label().to_string(),
            slot: id.slot(),
            width,
            height,
            color_format,
            depth_format: Some(Texture::DEPTH_FORMAT),
        }
    }

    /// Reject specs that would produce an incomplete target.
    pub fn validate(&self, max_dimension: u32) -> RenderResult<wgpu::TextureFormat> {
        let incomplete = |reason: String| RenderError::IncompleteTarget {
            label: self.label.clone(),
            reason,
        };

        let depth_format = self
            .depth_format
            .ok_or_else(|| RenderError::MissingDepthAttachment(self.label.clone()))?;
        if !depth_format.has_depth_aspect() {
            return Err(incomplete(format!("{:?} is not a depth format", depth_format)));
        }
        if self.width == 0 || self.height == 0 {
            return Err(incomplete(format!("zero extent {}x{}", self.width, self.height)));
        }
        if self.width > max_dimension || self.height > max_dimension {
            return Err(incomplete(format!(
                "{}x{} exceeds the device limit of {}",
                self.width, self.height, max_dimension
            )));
        }
        if self.color_format.is_depth_stencil_format() {
            return Err(incomplete(format!(
                "{:?} is not a color format",
                self.color_format
            )));
        }
        Ok(depth_format)
    }
}

/// Color texture plus mandatory depth attachment.
pub struct OffscreenTarget {
    pub label: String,
    pub color: Texture,
    pub depth: Texture,
    pub width: u32,
    pub height: u32,
}

impl OffscreenTarget {
    pub fn create(device: &wgpu::Device, spec: &TargetSpec) -> RenderResult<Self> {
        let depth_format = spec.validate(device.limits().max_texture_dimension_2d)?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&spec.label),
            size: wgpu::Extent3d {
                width: spec.width,
                height: spec.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: spec.color_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&spec.label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let depth = Texture::create_depth_texture_with_format(
            device,
            spec.width,
            spec.height,
            depth_format,
            &format!("{} Depth", spec.label),
        );
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::IncompleteTarget {
                label: spec.label.clone(),
                reason: err.to_string(),
            });
        }

        log::info!(
            "Created {} ({}x{}, {:?} + {:?}) in slot {}",
            spec.label,
            spec.width,
            spec.height,
            spec.color_format,
            depth_format,
            spec.slot
        );

        Ok(Self {
            label: spec.label.clone(),
            color: Texture { texture, view, sampler },
            depth,
            width: spec.width,
            height: spec.height,
        })
    }
}

/// What a pass clears when it starts. Depth is cleared by every pass in this renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearOps {
    pub color: Option<wgpu::Color>,
    pub depth: bool,
}

/// A render destination ready to begin a pass on.
pub struct BoundTarget<'a> {
    label: &'a str,
    color: &'a wgpu::TextureView,
    depth: &'a wgpu::TextureView,
}

impl<'a> BoundTarget<'a> {
    pub fn label(&self) -> &str {
        self.label
    }

    pub fn begin_pass<'e>(&self, encoder: &'e mut wgpu::CommandEncoder, clear: ClearOps) -> wgpu::RenderPass<'e> {
        let color_load = match clear.color {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };
        let depth_load = if clear.depth {
            wgpu::LoadOp::Clear(1.0)
        } else {
            wgpu::LoadOp::Load
        };
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: self.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: self.depth,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }
}

/// Owns the refraction and reflection targets.
pub struct OffscreenTargets {
    refraction: OffscreenTarget,
    reflection: OffscreenTarget,
}

impl OffscreenTargets {
    /// Both targets at `width` x `height`. Any failure is a setup error.
    pub fn create(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        color_format: wgpu::TextureFormat,
    ) -> RenderResult<Self> {
        let refraction = OffscreenTarget::create(
            device,
            &TargetSpec::new(TargetId::Refraction, width, height, color_format),
        )?;
        let reflection = OffscreenTarget::create(
            device,
            &TargetSpec::new(TargetId::Reflection, width, height, color_format),
        )?;
        Ok(Self { refraction, reflection })
    }

    pub fn get(&self, id: TargetId) -> &OffscreenTarget {
        match id {
            TargetId::Refraction => &self.refraction,
            TargetId::Reflection => &self.reflection,
        }
    }

    /// Make `id` the destination of the next pass.
    pub fn bind(&self, id: TargetId) -> BoundTarget<'_> {
        let target = self.get(id);
        BoundTarget {
            label: &target.label,
            color: &target.color.view,
            depth: &target.depth.view,
        }
    }

    /// Restore the window surface as the destination.
    pub fn unbind<'a>(&self, screen: &'a wgpu::TextureView, depth: &'a wgpu::TextureView) -> BoundTarget<'a> {
        BoundTarget {
            label: "Main Pass",
            color: screen,
            depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLOR: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8UnormSrgb;

    #[test]
    fn default_spec_is_valid() {
        let spec = TargetSpec::new(TargetId::Refraction, 800, 600, COLOR);
        assert_eq!(spec.validate(8192).unwrap(), Texture::DEPTH_FORMAT);
        assert_eq!(spec.slot, 0);
        assert_eq!(TargetSpec::new(TargetId::Reflection, 800, 600, COLOR).slot, 1);
    }

    #[test]
    fn missing_depth_is_rejected() {
        let spec = TargetSpec {
            depth_format: None,
            ..TargetSpec::new(TargetId::Reflection, 800, 600, COLOR)
        };
        assert!(matches!(spec.validate(8192), Err(RenderError::MissingDepthAttachment(_))));
    }

    #[test]
    fn zero_extent_is_incomplete() {
        let spec = TargetSpec::new(TargetId::Refraction, 0, 600, COLOR);
        assert!(matches!(spec.validate(8192), Err(RenderError::IncompleteTarget { .. })));
    }

    #[test]
    fn oversized_extent_is_incomplete() {
        let spec = TargetSpec::new(TargetId::Refraction, 16384, 600, COLOR);
        assert!(matches!(spec.validate(8192), Err(RenderError::IncompleteTarget { .. })));
    }

    #[test]
    fn depth_color_format_is_incomplete() {
        let spec = TargetSpec::new(TargetId::Refraction, 800, 600, wgpu::TextureFormat::Depth24Plus);
        assert!(matches!(spec.validate(8192), Err(RenderError::IncompleteTarget { .. })));
    }

    #[test]
    fn color_depth_format_is_incomplete() {
        let spec = TargetSpec {
            depth_format: Some(wgpu::TextureFormat::Rgba8Unorm),
            ..TargetSpec::new(TargetId::Refraction, 800, 600, COLOR)
        };
        assert!(matches!(spec.validate(8192), Err(RenderError::IncompleteTarget { .. })));
    }
}
