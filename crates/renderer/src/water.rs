//! Water surface: the animated dudv scroll plus the tiled quad draw.
//!
//! The scroll advances a fixed step once per frame, independent of how many tiles are drawn.
//! Tiles queued by [`WaterSurface::draw`] are batched into one instanced draw in the main pass.

use std::mem::offset_of;

use bytemuck::{Pod, Zeroable};
use engine_core::{Mat4, Transform, Vec3};
use wgpu::util::DeviceExt;

use crate::error::RenderResult;
use crate::mesh::Mesh;
use crate::pipeline;
use crate::scene::FrameParams;
use crate::shader::{self, ShaderUniforms, UniformBuffer, UniformMember, F32_SIZE, MAT4_SIZE, VEC4_SIZE};
use crate::target::{OffscreenTargets, TargetId};
use crate::texture::Texture;
use crate::vertex::InstanceData;

const WATER_SHADER: &str = include_str!("../shaders/water.wgsl");

/// Water uniforms (must match water.wgsl WaterUniforms).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct WaterUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub eye_point: [f32; 4],
    pub light_position: [f32; 4],
    pub light_color: [f32; 4],
    pub dudv_move: f32,
    pub wave_strength: f32,
    pub near: f32,
    pub far: f32,
}

impl ShaderUniforms for WaterUniforms {
    const STRUCT_NAME: &'static str = "WaterUniforms";
    const FIELDS: &'static [(&'static str, UniformMember)] = &[
        ("view", UniformMember::at(offset_of!(WaterUniforms, view), MAT4_SIZE)),
        ("projection", UniformMember::at(offset_of!(WaterUniforms, projection), MAT4_SIZE)),
        ("eye_point", UniformMember::at(offset_of!(WaterUniforms, eye_point), VEC4_SIZE)),
        ("light_position", UniformMember::at(offset_of!(WaterUniforms, light_position), VEC4_SIZE)),
        ("light_color", UniformMember::at(offset_of!(WaterUniforms, light_color), VEC4_SIZE)),
        ("dudv_move", UniformMember::at(offset_of!(WaterUniforms, dudv_move), F32_SIZE)),
        ("wave_strength", UniformMember::at(offset_of!(WaterUniforms, wave_strength), F32_SIZE)),
        ("near", UniformMember::at(offset_of!(WaterUniforms, near), F32_SIZE)),
        ("far", UniformMember::at(offset_of!(WaterUniforms, far), F32_SIZE)),
    ];
}

impl WaterUniforms {
    pub fn new(wave_strength: f32) -> Self {
        Self {
            wave_strength,
            ..Self::zeroed()
        }
    }

    pub fn set_frame(&mut self, frame: &FrameParams) {
        self.view = frame.view.to_cols_array_2d();
        self.projection = frame.projection.to_cols_array_2d();
        self.eye_point = frame.eye.extend(1.0).to_array();
        self.light_position = frame.lighting.position.extend(1.0).to_array();
        self.light_color = frame.lighting.color.extend(1.0).to_array();
        self.near = frame.near;
        self.far = frame.far;
    }
}

/// Scroll offset in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterAnimation {
    scroll: f64,
    speed: f64,
    paused: bool,
}

impl WaterAnimation {
    pub fn new(speed: f32) -> Self {
        Self {
            scroll: 0.0,
            speed: speed as f64,
            paused: false,
        }
    }

    /// Advance by one step. Call exactly once per frame.
    pub fn tick(&mut self) {
        if !self.paused {
            self.scroll = (self.scroll + self.speed).rem_euclid(1.0);
        }
    }

    pub fn reset(&mut self) {
        self.scroll = 0.0;
    }

    /// Returns the new paused state.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn scroll(&self) -> f32 {
        self.scroll as f32
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

/// Per-frame water bookkeeping with no GPU state.
#[derive(Debug, Clone)]
pub struct WaterState {
    pub animation: WaterAnimation,
    tiles: Vec<InstanceData>,
}

impl WaterState {
    pub fn new(scroll_speed: f32) -> Self {
        Self {
            animation: WaterAnimation::new(scroll_speed),
            tiles: Vec::new(),
        }
    }

    pub fn tick(&mut self) {
        self.animation.tick();
    }

    pub fn queue_tile(&mut self, model: Mat4) {
        self.tiles.push(InstanceData::new(model, [1.0, 1.0, 1.0, 1.0]));
    }

    pub fn tiles(&self) -> &[InstanceData] {
        &self.tiles
    }

    /// Drop this frame's tiles.
    pub fn clear_tiles(&mut self) {
        self.tiles.clear();
    }
}

/// Number of tiles in a square grid, computed without `u32` overflow.
pub fn tile_count(tiles_per_side: u32) -> usize {
    (tiles_per_side as usize).pow(2)
}

/// Translations of a `tiles_per_side` x `tiles_per_side` grid of quads centered on the origin,
/// each quad `2 * half_size` wide.
pub fn tile_offsets(tiles_per_side: u32, half_size: f32) -> Vec<Vec3> {
    let n = tiles_per_side as f32;
    let step = 2.0 * half_size;
    let start = -(n - 1.0) * half_size;
    let mut offsets = Vec::with_capacity(tile_count(tiles_per_side));
    for z in 0..tiles_per_side {
        for x in 0..tiles_per_side {
            offsets.push(Vec3::new(start + x as f32 * step, 0.0, start + z as f32 * step));
        }
    }
    offsets
}

/// Model matrix for one tile at water height `height`.
pub fn tile_model(offset: Vec3, height: f32) -> Mat4 {
    Transform::from_position(offset + Vec3::new(0.0, height, 0.0)).to_matrix()
}

/// Settings the water renderer is built with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterSettings {
    pub half_size: f32,
    pub scroll_speed: f32,
    pub wave_strength: f32,
}

/// Draws the water quad with the refraction/reflection targets plus dudv and normal maps bound.
pub struct WaterSurface {
    state: WaterState,
    quad: Mesh,
    pipeline: wgpu::RenderPipeline,
    uniforms: UniformBuffer<WaterUniforms>,
    uniform_bind_group: wgpu::BindGroup,
    texture_bind_group: wgpu::BindGroup,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    instance_count: u32,
}

impl WaterSurface {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        targets: &OffscreenTargets,
        dudv: &Texture,
        normal: &Texture,
        settings: WaterSettings,
    ) -> RenderResult<Self> {
        let module = shader::build_with_uniforms::<WaterUniforms>(device, "Water Shader", WATER_SHADER)?;
        let uniform_layout = pipeline::create_uniform_bind_group_layout(device, "Water Uniform Layout");
        let water_layout = pipeline::create_water_bind_group_layout(device);
        let pipeline = pipeline::create_water_pipeline(device, &module, format, &uniform_layout, &water_layout);

        let uniforms = UniformBuffer::new(device, "Water Uniforms", WaterUniforms::new(settings.wave_strength));
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Water Uniforms"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.buffer().as_entire_binding(),
            }],
        });

        let refraction = targets.get(TargetId::Refraction);
        let reflection = targets.get(TargetId::Reflection);
        let texture_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Water Textures"),
            layout: &water_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&refraction.color.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&reflection.color.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&dudv.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&refraction.depth.view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&refraction.color.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(&dudv.sampler),
                },
            ],
        });

        let instance_capacity = 16;
        let instance_buffer = Self::create_instance_buffer(device, instance_capacity);

        Ok(Self {
            state: WaterState::new(settings.scroll_speed),
            quad: Mesh::water_quad(device, settings.half_size),
            pipeline,
            uniforms,
            uniform_bind_group,
            texture_bind_group,
            instance_buffer,
            instance_capacity,
            instance_count: 0,
        })
    }

    fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Water Instance Buffer"),
            contents: bytemuck::cast_slice(&vec![InstanceData::default(); capacity]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        })
    }

    pub fn tick(&mut self) {
        self.state.tick();
    }

    pub fn animation(&self) -> &WaterAnimation {
        &self.state.animation
    }

    pub fn animation_mut(&mut self) -> &mut WaterAnimation {
        &mut self.state.animation
    }

    /// Queue one water tile for the main pass with the camera and lighting it is drawn under.
    pub fn draw(&mut self, model: Mat4, frame: &FrameParams) {
        self.set_frame(frame);
        self.state.queue_tile(model);
    }

    pub fn set_frame(&mut self, frame: &FrameParams) {
        self.uniforms.value_mut().set_frame(frame);
    }

    /// Upload the scroll, uniforms and queued tiles. Call before the main pass is submitted.
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let scroll = self.state.animation.scroll();
        self.uniforms.value_mut().dudv_move = scroll;
        self.uniforms.flush(queue);

        let tiles = self.state.tiles();
        if tiles.len() > self.instance_capacity {
            self.instance_capacity = tiles.len().next_power_of_two();
            self.instance_buffer = Self::create_instance_buffer(device, self.instance_capacity);
            log::debug!("Grew water instance buffer to {} tiles", self.instance_capacity);
        }
        if !tiles.is_empty() {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(tiles));
        }
        self.instance_count = tiles.len() as u32;
    }

    /// Encode the queued tiles. Zero tiles draws nothing.
    pub fn encode(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.instance_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.set_bind_group(1, &self.texture_bind_group, &[]);
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        self.quad.draw(pass, 0..self.instance_count);
    }

    pub fn end_frame(&mut self) {
        self.state.clear_tiles();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{check_fields, ShaderStruct};

    /// Distance on the unit circle, so 0.9999999 and 0.0 compare equal.
    fn wrapped_diff(a: f32, b: f32) -> f32 {
        let d = (a - b).rem_euclid(1.0);
        d.min(1.0 - d)
    }

    #[test]
    fn two_thousand_ticks_wrap_to_zero() {
        let mut anim = WaterAnimation::new(0.0005);
        for _ in 0..2000 {
            anim.tick();
        }
        assert!(wrapped_diff(anim.scroll(), 0.0) < 1e-5);
    }

    #[test]
    fn scroll_stays_in_unit_range() {
        let mut anim = WaterAnimation::new(0.3);
        for _ in 0..100 {
            anim.tick();
            assert!((0.0..1.0).contains(&anim.scroll()));
        }
    }

    #[test]
    fn scroll_ignores_tile_count() {
        for tiles in [0usize, 1, 4, 9] {
            let mut state = WaterState::new(0.0005);
            for frame in 0..777 {
                state.tick();
                for _ in 0..tiles {
                    state.queue_tile(Mat4::IDENTITY);
                }
                assert_eq!(state.tiles().len(), tiles);
                state.clear_tiles();
                let expected = ((frame + 1) as f64 * 0.0005).rem_euclid(1.0) as f32;
                assert!(wrapped_diff(state.animation.scroll(), expected) < 1e-5);
            }
        }
    }

    #[test]
    fn reset_and_pause() {
        let mut anim = WaterAnimation::new(0.1);
        anim.tick();
        anim.tick();
        assert!(anim.toggle_pause());
        anim.tick();
        assert!((anim.scroll() - 0.2).abs() < 1e-6);
        anim.reset();
        assert_eq!(anim.scroll(), 0.0);
        assert!(!anim.toggle_pause());
        anim.tick();
        assert!((anim.scroll() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn single_tile_is_centered() {
        assert_eq!(tile_offsets(1, 5.0), vec![Vec3::ZERO]);
    }

    #[test]
    fn tile_grid_is_centered_and_contiguous() {
        let offsets = tile_offsets(3, 5.0);
        assert_eq!(offsets.len(), 9);
        assert_eq!(offsets[0], Vec3::new(-10.0, 0.0, -10.0));
        assert_eq!(offsets[4], Vec3::ZERO);
        assert_eq!(offsets[8], Vec3::new(10.0, 0.0, 10.0));
        let sum: Vec3 = offsets.iter().copied().sum();
        assert!(sum.length() < 1e-5);
    }

    #[test]
    fn zero_tiles_per_side_is_empty() {
        assert!(tile_offsets(0, 5.0).is_empty());
    }

    #[test]
    fn tile_model_lifts_to_water_height() {
        let m = tile_model(Vec3::new(10.0, 0.0, 0.0), 2.2);
        let p = m.transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(10.0, 2.2, 0.0)).length() < 1e-5);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn tile_count_past_u32_range() {
        assert_eq!(tile_count(70_000), 4_900_000_000);
        assert_eq!(tile_count(3), tile_offsets(3, 1.0).len());
    }

    #[test]
    fn water_shader_matches_host_struct() {
        let declared = ShaderStruct::from_wgsl("water", WATER_SHADER, WaterUniforms::STRUCT_NAME).unwrap();
        assert!(check_fields::<WaterUniforms>("water", &declared).unwrap().is_empty());
        assert_eq!(declared.member("dudv_move").unwrap().offset, 176);
        assert_eq!(declared.span() as usize, std::mem::size_of::<WaterUniforms>());
    }
}
