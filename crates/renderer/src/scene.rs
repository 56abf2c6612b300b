//! Scene drawables: the textured pool meshes and the skybox.
//!
//! Each drawable owns its uniform buffer and re-binds its own pipeline when drawn. The pass
//! driver pushes per-pass camera and clip state through [`Drawable`] before the draws are
//! encoded.

use std::mem::offset_of;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use engine_core::{Mat4, Transform, Vec3};

use crate::clip::ClipState;
use crate::error::RenderResult;
use crate::mesh::Mesh;
use crate::pipeline;
use crate::shader::{self, ShaderUniforms, UniformBuffer, UniformMember, MAT4_SIZE, VEC4_SIZE};
use crate::texture::Texture;

const SCENE_SHADER: &str = include_str!("../shaders/scene.wgsl");
const SKYBOX_SHADER: &str = include_str!("../shaders/skybox.wgsl");

/// Point light shared by scene meshes and water.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub position: Vec3,
    pub color: Vec3,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            position: Vec3::new(3.0, 3.0, 3.0),
            color: Vec3::ONE,
        }
    }
}

/// Everything a drawable needs from the camera for one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub view: Mat4,
    pub projection: Mat4,
    pub eye: Vec3,
    pub lighting: Lighting,
    pub near: f32,
    pub far: f32,
}

/// Scene mesh uniforms (must match scene.wgsl SceneUniforms).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SceneUniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub eye_point: [f32; 4],
    pub light_position: [f32; 4],
    pub light_color: [f32; 4],
    pub clip_plane0: [f32; 4],
    pub clip_plane1: [f32; 4],
    /// x = slot 0 enabled, y = slot 1 enabled
    pub clip_enabled: [f32; 4],
}

impl ShaderUniforms for SceneUniforms {
    const STRUCT_NAME: &'static str = "SceneUniforms";
    const FIELDS: &'static [(&'static str, UniformMember)] = &[
        ("model", UniformMember::at(offset_of!(SceneUniforms, model), MAT4_SIZE)),
        ("view", UniformMember::at(offset_of!(SceneUniforms, view), MAT4_SIZE)),
        ("projection", UniformMember::at(offset_of!(SceneUniforms, projection), MAT4_SIZE)),
        ("eye_point", UniformMember::at(offset_of!(SceneUniforms, eye_point), VEC4_SIZE)),
        ("light_position", UniformMember::at(offset_of!(SceneUniforms, light_position), VEC4_SIZE)),
        ("light_color", UniformMember::at(offset_of!(SceneUniforms, light_color), VEC4_SIZE)),
        ("clip_plane0", UniformMember::at(offset_of!(SceneUniforms, clip_plane0), VEC4_SIZE)),
        ("clip_plane1", UniformMember::at(offset_of!(SceneUniforms, clip_plane1), VEC4_SIZE)),
        ("clip_enabled", UniformMember::at(offset_of!(SceneUniforms, clip_enabled), VEC4_SIZE)),
    ];
}

impl SceneUniforms {
    pub fn new(model: Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            ..Self::zeroed()
        }
    }

    pub fn set_frame(&mut self, frame: &FrameParams) {
        self.view = frame.view.to_cols_array_2d();
        self.projection = frame.projection.to_cols_array_2d();
        self.eye_point = frame.eye.extend(1.0).to_array();
        self.light_position = frame.lighting.position.extend(1.0).to_array();
        self.light_color = frame.lighting.color.extend(1.0).to_array();
    }

    pub fn set_clip_planes(&mut self, clip: &ClipState) {
        self.clip_plane0 = clip.plane_vec4(0).to_array();
        self.clip_plane1 = clip.plane_vec4(1).to_array();
        self.clip_enabled = clip.enabled_mask().to_array();
    }
}

/// Skybox uniforms (must match skybox.wgsl SkyUniforms).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SkyUniforms {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

impl ShaderUniforms for SkyUniforms {
    const STRUCT_NAME: &'static str = "SkyUniforms";
    const FIELDS: &'static [(&'static str, UniformMember)] = &[
        ("model", UniformMember::at(offset_of!(SkyUniforms, model), MAT4_SIZE)),
        ("view", UniformMember::at(offset_of!(SkyUniforms, view), MAT4_SIZE)),
        ("projection", UniformMember::at(offset_of!(SkyUniforms, projection), MAT4_SIZE)),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    Back,
    None,
}

/// Draw contract between the pass driver and scene geometry.
pub trait Drawable {
    fn label(&self) -> &str;

    /// Camera and lighting for the coming pass.
    fn set_frame(&mut self, frame: &FrameParams);

    /// Clip planes for the coming pass. Geometry that ignores clipping keeps the default.
    fn set_clip_planes(&mut self, _clip: &ClipState) {}

    /// Upload pending uniform writes. Must be called before the pass is submitted.
    fn prepare(&mut self, queue: &wgpu::Queue);

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>, cull: CullMode);
}

/// Shared pipelines and layouts for every [`SceneMesh`].
pub struct ScenePipelines {
    uniform_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    cull_back: wgpu::RenderPipeline,
    cull_none: wgpu::RenderPipeline,
}

impl ScenePipelines {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> RenderResult<Self> {
        let module = shader::build_with_uniforms::<SceneUniforms>(device, "Scene Shader", SCENE_SHADER)?;
        let uniform_layout = pipeline::create_uniform_bind_group_layout(device, "Scene Uniform Layout");
        let material_layout = pipeline::create_material_bind_group_layout(device);
        let cull_back = pipeline::create_scene_pipeline(
            device,
            &module,
            format,
            &uniform_layout,
            &material_layout,
            CullMode::Back,
        );
        let cull_none = pipeline::create_scene_pipeline(
            device,
            &module,
            format,
            &uniform_layout,
            &material_layout,
            CullMode::None,
        );
        Ok(Self {
            uniform_layout,
            material_layout,
            cull_back,
            cull_none,
        })
    }

    fn pipeline(&self, cull: CullMode) -> &wgpu::RenderPipeline {
        match cull {
            CullMode::Back => &self.cull_back,
            CullMode::None => &self.cull_none,
        }
    }
}

/// Opaque, textured, normal-mapped mesh with two clip-plane slots.
pub struct SceneMesh {
    label: String,
    pipelines: Arc<ScenePipelines>,
    mesh: Mesh,
    uniforms: UniformBuffer<SceneUniforms>,
    uniform_bind_group: wgpu::BindGroup,
    material_bind_group: wgpu::BindGroup,
}

impl SceneMesh {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        pipelines: Arc<ScenePipelines>,
        mesh: Mesh,
        base: &Texture,
        normal: &Texture,
        transform: Transform,
    ) -> Self {
        let uniforms = UniformBuffer::new(device, label, SceneUniforms::new(transform.to_matrix()));

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &pipelines.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.buffer().as_entire_binding(),
            }],
        });
        let material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &pipelines.material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&base.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&base.sampler),
                },
            ],
        });

        Self {
            label: label.to_string(),
            pipelines,
            mesh,
            uniforms,
            uniform_bind_group,
            material_bind_group,
        }
    }
}

impl Drawable for SceneMesh {
    fn label(&self) -> &str {
        &self.label
    }

    fn set_frame(&mut self, frame: &FrameParams) {
        self.uniforms.value_mut().set_frame(frame);
    }

    fn set_clip_planes(&mut self, clip: &ClipState) {
        self.uniforms.value_mut().set_clip_planes(clip);
    }

    fn prepare(&mut self, queue: &wgpu::Queue) {
        self.uniforms.flush(queue);
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>, cull: CullMode) {
        pass.set_pipeline(self.pipelines.pipeline(cull));
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, &self.material_bind_group, &[]);
        self.mesh.draw(pass, 0..1);
    }
}

/// Model matrix placing the sky cube around `eye`.
pub fn skybox_model(eye: Vec3, half_size: f32) -> Mat4 {
    Transform::from_position_scale(eye, half_size).to_matrix()
}

/// Cubemap sky. Follows whichever eye the pass renders from and ignores clip planes.
pub struct Skybox {
    half_size: f32,
    pipeline: wgpu::RenderPipeline,
    cube: Mesh,
    uniforms: UniformBuffer<SkyUniforms>,
    uniform_bind_group: wgpu::BindGroup,
    cubemap_bind_group: wgpu::BindGroup,
}

impl Skybox {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        cubemap: &Texture,
        half_size: f32,
    ) -> RenderResult<Self> {
        let module = shader::build_with_uniforms::<SkyUniforms>(device, "Skybox Shader", SKYBOX_SHADER)?;
        let uniform_layout = pipeline::create_uniform_bind_group_layout(device, "Skybox Uniform Layout");
        let cubemap_layout = pipeline::create_cubemap_bind_group_layout(device);
        let pipeline = pipeline::create_skybox_pipeline(device, &module, format, &uniform_layout, &cubemap_layout);

        let uniforms = UniformBuffer::new(device, "Skybox Uniforms", SkyUniforms::zeroed());
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skybox Uniforms"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.buffer().as_entire_binding(),
            }],
        });
        let cubemap_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skybox Cubemap"),
            layout: &cubemap_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&cubemap.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&cubemap.sampler),
                },
            ],
        });

        Ok(Self {
            half_size,
            pipeline,
            cube: Mesh::cube(device),
            uniforms,
            uniform_bind_group,
            cubemap_bind_group,
        })
    }
}

impl Drawable for Skybox {
    fn label(&self) -> &str {
        "Skybox"
    }

    fn set_frame(&mut self, frame: &FrameParams) {
        let u = self.uniforms.value_mut();
        u.model = skybox_model(frame.eye, self.half_size).to_cols_array_2d();
        u.view = frame.view.to_cols_array_2d();
        u.projection = frame.projection.to_cols_array_2d();
    }

    fn prepare(&mut self, queue: &wgpu::Queue) {
        self.uniforms.flush(queue);
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>, _cull: CullMode) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, &self.cubemap_bind_group, &[]);
        self.cube.draw(pass, 0..1);
    }
}

/// Skybox plus opaque meshes, in draw order.
pub struct SceneSet {
    pub skybox: Option<Box<dyn Drawable>>,
    pub meshes: Vec<Box<dyn Drawable>>,
}

impl SceneSet {
    pub fn new(skybox: Option<Box<dyn Drawable>>, meshes: Vec<Box<dyn Drawable>>) -> Self {
        Self { skybox, meshes }
    }

    fn all_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Drawable>> {
        self.skybox.iter_mut().chain(self.meshes.iter_mut())
    }

    pub fn set_frame(&mut self, frame: &FrameParams) {
        for drawable in self.all_mut() {
            drawable.set_frame(frame);
        }
    }

    pub fn set_clip_planes(&mut self, clip: &ClipState) {
        for drawable in self.all_mut() {
            drawable.set_clip_planes(clip);
        }
    }

    pub fn prepare(&mut self, queue: &wgpu::Queue) {
        for drawable in self.all_mut() {
            drawable.prepare(queue);
        }
    }

    pub fn draw_skybox(&self, pass: &mut wgpu::RenderPass<'_>) {
        if let Some(skybox) = &self.skybox {
            skybox.draw(pass, CullMode::None);
        }
    }

    pub fn draw_meshes(&self, pass: &mut wgpu::RenderPass<'_>, cull: CullMode) {
        for mesh in &self.meshes {
            mesh.draw(pass, cull);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::WaterPlane;
    use crate::shader::{check_fields, ShaderStruct};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn skybox_follows_eye() {
        let eye = Vec3::new(5.7, -0.6, -5.9);
        let model = skybox_model(eye, 500.0);
        assert!((model.transform_point3(Vec3::ZERO) - eye).length() < 1e-4);
        let corner = model.transform_point3(Vec3::ONE);
        assert!((corner - (eye + Vec3::splat(500.0))).length() < 1e-3);
    }

    #[test]
    fn scene_shader_matches_host_struct() {
        let declared = ShaderStruct::from_wgsl("scene", SCENE_SHADER, SceneUniforms::STRUCT_NAME).unwrap();
        assert!(check_fields::<SceneUniforms>("scene", &declared).unwrap().is_empty());
        assert_eq!(declared.span() as usize, std::mem::size_of::<SceneUniforms>());
        for name in ["clip_plane0", "clip_plane1", "clip_enabled"] {
            assert!(declared.member(name).is_some(), "missing {}", name);
        }
    }

    #[test]
    fn skybox_shader_matches_host_struct() {
        let declared = ShaderStruct::from_wgsl("skybox", SKYBOX_SHADER, SkyUniforms::STRUCT_NAME).unwrap();
        assert!(check_fields::<SkyUniforms>("skybox", &declared).unwrap().is_empty());
        assert_eq!(declared.span(), 192);
    }

    #[test]
    fn clip_state_lands_in_uniform_fields() {
        let mut u = SceneUniforms::new(Mat4::IDENTITY);
        u.set_clip_planes(&ClipState::refraction(&WaterPlane::new(2.2, 0.125)));
        assert_eq!(u.clip_enabled[0], 1.0);
        assert_eq!(u.clip_enabled[1], 0.0);
        // Keeps y <= 2.2.
        let plane = u.clip_plane0;
        let at = |y: f32| plane[1] * y + plane[3];
        assert!(at(2.0) >= 0.0 && at(2.5) < 0.0);
        u.set_clip_planes(&ClipState::DISABLED);
        assert_eq!(u.clip_enabled, [0.0; 4]);
    }

    /// Records calls so set broadcasting can be checked without a GPU.
    struct Recorder {
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Drawable for Recorder {
        fn label(&self) -> &str {
            "recorder"
        }
        fn set_frame(&mut self, frame: &FrameParams) {
            self.log.borrow_mut().push(format!("frame {}", frame.eye.y));
        }
        fn set_clip_planes(&mut self, clip: &ClipState) {
            self.log.borrow_mut().push(format!("clip {}", clip.enabled_mask().x));
        }
        fn prepare(&mut self, _queue: &wgpu::Queue) {}
        fn draw(&self, _pass: &mut wgpu::RenderPass<'_>, _cull: CullMode) {}
    }

    #[test]
    fn set_broadcasts_to_every_drawable() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let recorder = || Box::new(Recorder { log: log.clone() }) as Box<dyn Drawable>;
        let mut set = SceneSet::new(Some(recorder()), vec![recorder(), recorder()]);
        let frame = FrameParams {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            eye: Vec3::new(0.0, 2.0, 0.0),
            lighting: Lighting::default(),
            near: 0.1,
            far: 2000.0,
        };
        set.set_frame(&frame);
        set.set_clip_planes(&ClipState::DISABLED);
        let log = log.borrow();
        assert_eq!(log.iter().filter(|l| *l == "frame 2").count(), 3);
        assert_eq!(log.iter().filter(|l| *l == "clip 0").count(), 3);
    }
}
