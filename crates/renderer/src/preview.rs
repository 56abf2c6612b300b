//! Debug quads showing the refraction and reflection targets in the top corners.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::error::RenderResult;
use crate::pipeline;
use crate::shader;
use crate::target::{OffscreenTargets, TargetId};

const PREVIEW_SHADER: &str = include_str!("../shaders/preview.wgsl");

/// Must match preview.wgsl `PreviewRect`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PreviewRect {
    /// min x, min y, max x, max y in NDC
    pub rect: [f32; 4],
}

/// Screen rectangle for each target: refraction top-left, reflection top-right.
pub fn preview_rect(id: TargetId) -> PreviewRect {
    match id {
        TargetId::Refraction => PreviewRect {
            rect: [-0.9, 0.3, -0.1, 0.9],
        },
        TargetId::Reflection => PreviewRect {
            rect: [0.1, 0.3, 0.9, 0.9],
        },
    }
}

pub struct TargetPreview {
    pipeline: wgpu::RenderPipeline,
    bind_groups: Vec<wgpu::BindGroup>,
}

impl TargetPreview {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        targets: &OffscreenTargets,
    ) -> RenderResult<Self> {
        let module = shader::build(device, "Preview Shader", PREVIEW_SHADER)?;
        let layout = pipeline::create_preview_bind_group_layout(device);
        let pipeline = pipeline::create_preview_pipeline(device, &module, format, &layout);

        let bind_groups = TargetId::ALL
            .iter()
            .map(|&id| {
                let target = targets.get(id);
                let rect = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Preview Rect"),
                    contents: bytemuck::bytes_of(&preview_rect(id)),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(id.label()),
                    layout: &layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: rect.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(&target.color.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::Sampler(&target.color.sampler),
                        },
                    ],
                })
            })
            .collect();

        Ok(Self { pipeline, bind_groups })
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        for bind_group in &self.bind_groups {
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rects_sit_in_the_upper_half_without_overlap() {
        let a = preview_rect(TargetId::Refraction).rect;
        let b = preview_rect(TargetId::Reflection).rect;
        for r in [a, b] {
            assert!(r[0] < r[2] && r[1] < r[3]);
            assert!(r[1] > 0.0 && r[3] <= 1.0);
        }
        assert!(a[2] < b[0]);
    }

    #[test]
    fn rect_matches_shader_uniform_size() {
        assert_eq!(std::mem::size_of::<PreviewRect>(), 16);
    }
}
