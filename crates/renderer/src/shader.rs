//! Shader building and typed uniform buffers.
//!
//! Each shader declares its per-draw uniforms as one WGSL struct with a `#[repr(C)]` Pod twin on
//! the Rust side. When a shader is built its struct is looked up in naga's parsed module and
//! checked against the Rust fields once. Fields the shader does not declare are warned about at
//! that point and simply never read; a field at the wrong offset is a setup error.

use std::collections::HashMap;

use bytemuck::Pod;

use crate::error::{RenderError, RenderResult};

/// Compile a WGSL module, turning validation errors into `RenderError::ShaderCompile`.
pub fn build(device: &wgpu::Device, label: &str, source: &str) -> RenderResult<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(RenderError::ShaderCompile {
            label: label.to_string(),
            message: err.to_string(),
        });
    }
    log::debug!("Built shader '{}'", label);
    Ok(module)
}

/// Build a shader whose uniform struct must line up with `T`.
pub fn build_with_uniforms<T: ShaderUniforms>(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> RenderResult<wgpu::ShaderModule> {
    let declared = ShaderStruct::from_wgsl(label, source, T::STRUCT_NAME)?;
    for name in check_fields::<T>(label, &declared)? {
        log::warn!(
            "Uniform '{}' not declared by {} in '{}'; upload ignored",
            name,
            T::STRUCT_NAME,
            label
        );
    }
    build(device, label, source)
}

/// Byte range of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformMember {
    pub offset: u32,
    pub size: u32,
}

impl UniformMember {
    /// Takes the `offset_of!` value of the host field.
    pub const fn at(offset: usize, size: u32) -> Self {
        Self {
            offset: offset as u32,
            size,
        }
    }
}

/// Rust-side uniform struct mirrored by a WGSL struct of the same name.
pub trait ShaderUniforms: Pod {
    const STRUCT_NAME: &'static str;
    /// Every field the shader may read, by WGSL member name.
    const FIELDS: &'static [(&'static str, UniformMember)];
}

pub const F32_SIZE: u32 = 4;
pub const VEC4_SIZE: u32 = 16;
pub const MAT4_SIZE: u32 = 64;

/// Member table of one WGSL struct as laid out by naga.
#[derive(Debug, Clone)]
pub struct ShaderStruct {
    name: String,
    members: HashMap<String, UniformMember>,
    span: u32,
}

impl ShaderStruct {
    pub fn from_wgsl(label: &str, source: &str, struct_name: &str) -> RenderResult<Self> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| RenderError::ShaderCompile {
            label: label.to_string(),
            message: e.emit_to_string(source),
        })?;
        let mut layouter = naga::proc::Layouter::default();
        layouter
            .update(module.to_ctx())
            .map_err(|e| RenderError::UniformLayout {
                label: label.to_string(),
                reason: e.to_string(),
            })?;

        let (members, span) = module
            .types
            .iter()
            .find_map(|(_, ty)| match &ty.inner {
                naga::TypeInner::Struct { members, span } if ty.name.as_deref() == Some(struct_name) => {
                    Some((members, *span))
                }
                _ => None,
            })
            .ok_or_else(|| RenderError::UniformStructMissing {
                label: label.to_string(),
                name: struct_name.to_string(),
            })?;

        let members = members
            .iter()
            .filter_map(|m| {
                let name = m.name.clone()?;
                Some((
                    name,
                    UniformMember {
                        offset: m.offset,
                        size: layouter[m.ty].size,
                    },
                ))
            })
            .collect();

        Ok(Self {
            name: struct_name.to_string(),
            members,
            span,
        })
    }

    pub fn member(&self, name: &str) -> Option<UniformMember> {
        self.members.get(name).copied()
    }

    /// Struct size including trailing padding.
    pub fn span(&self) -> u32 {
        self.span
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Compare `T` against the shader's struct. Returns the Rust fields the shader leaves undeclared.
pub fn check_fields<T: ShaderUniforms>(label: &str, declared: &ShaderStruct) -> RenderResult<Vec<&'static str>> {
    let mismatch = |reason: String| RenderError::UniformLayout {
        label: label.to_string(),
        reason,
    };

    let host_size = std::mem::size_of::<T>() as u32;
    if declared.span() > host_size {
        return Err(mismatch(format!(
            "{} is {} bytes in the shader but {} on the host",
            declared.name(),
            declared.span(),
            host_size
        )));
    }

    let mut undeclared = Vec::new();
    for &(name, host) in T::FIELDS {
        match declared.member(name) {
            Some(member) if member == host => {}
            Some(member) => {
                return Err(mismatch(format!(
                    "'{}' is at {}+{} in the shader but {}+{} on the host",
                    name, member.offset, member.size, host.offset, host.size
                )))
            }
            None => undeclared.push(name),
        }
    }
    if let Some(extra) = declared
        .members
        .keys()
        .find(|name| !T::FIELDS.iter().any(|(field, _)| *field == name.as_str()))
    {
        return Err(mismatch(format!("'{}' has no host-side field", extra)));
    }
    Ok(undeclared)
}

/// CPU copy of a uniform struct plus what was last uploaded.
#[derive(Debug, Clone, Copy)]
pub struct UniformData<T: Pod> {
    pub value: T,
    uploaded: Option<T>,
}

impl<T: Pod> UniformData<T> {
    pub fn new(value: T) -> Self {
        Self { value, uploaded: None }
    }

    /// Bytes to upload if the value changed since the last call.
    pub fn take_changed(&mut self) -> Option<&[u8]> {
        let changed = self
            .uploaded
            .map_or(true, |last| bytemuck::bytes_of(&last) != bytemuck::bytes_of(&self.value));
        if !changed {
            return None;
        }
        self.uploaded = Some(self.value);
        Some(bytemuck::bytes_of(&self.value))
    }
}

/// Typed uniform data plus the GPU buffer it is flushed into.
pub struct UniformBuffer<T: Pod> {
    data: UniformData<T>,
    buffer: wgpu::Buffer,
}

impl<T: Pod> UniformBuffer<T> {
    pub fn new(device: &wgpu::Device, label: &str, value: T) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<T>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            data: UniformData::new(value),
            buffer,
        }
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.data.value
    }

    /// Upload pending writes. Takes effect at the next queue submit.
    pub fn flush(&mut self, queue: &wgpu::Queue) {
        if let Some(bytes) = self.data.take_changed() {
            queue.write_buffer(&self.buffer, 0, bytes);
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;
    use std::mem::offset_of;

    #[repr(C)]
    #[derive(Debug, Clone, Copy, Pod, Zeroable)]
    struct Params {
        model: [[f32; 4]; 4],
        tint: [f32; 4],
        scroll: f32,
        strength: f32,
        _pad: [f32; 2],
    }

    impl ShaderUniforms for Params {
        const STRUCT_NAME: &'static str = "Params";
        const FIELDS: &'static [(&'static str, UniformMember)] = &[
            ("model", UniformMember::at(offset_of!(Params, model), MAT4_SIZE)),
            ("tint", UniformMember::at(offset_of!(Params, tint), VEC4_SIZE)),
            ("scroll", UniformMember::at(offset_of!(Params, scroll), F32_SIZE)),
            ("strength", UniformMember::at(offset_of!(Params, strength), F32_SIZE)),
        ];
    }

    const SOURCE: &str = r#"
        // Per-draw constants, kept together.
        struct Other { x: f32 };

        struct Params {
            model: mat4x4<f32>,
            tint: vec4<f32>, // rgb, alpha
            scroll: f32,
            /* amplitude, in uv units */
            strength: f32,
        };

        @group(0) @binding(0) var<uniform> u: Params;
    "#;

    fn declared(source: &str, name: &str) -> ShaderStruct {
        ShaderStruct::from_wgsl("test", source, name).unwrap()
    }

    #[test]
    fn offsets_follow_wgsl_alignment() {
        let s = declared("struct P { a: f32, b: vec3<f32>, c: f32, d: mat4x4<f32>, };", "P");
        assert_eq!(s.member("a").unwrap(), UniformMember { offset: 0, size: 4 });
        assert_eq!(s.member("b").unwrap(), UniformMember { offset: 16, size: 12 });
        // A following f32 packs into the vec3's last lane.
        assert_eq!(s.member("c").unwrap().offset, 28);
        assert_eq!(s.member("d").unwrap().offset, 32);
        assert_eq!(s.span(), 96);
    }

    #[test]
    fn explicit_align_attribute_is_honored() {
        let s = declared("struct P { a: f32, @align(16) b: f32, };", "P");
        assert_eq!(s.member("b").unwrap().offset, 16);
        assert!(s.member("@align(16) b").is_none());
    }

    #[test]
    fn comments_with_commas_are_ignored() {
        let s = declared("struct P { a: f32, /* padding, kept */ b: vec4<f32>, };", "P");
        assert_eq!(s.member("b").unwrap(), UniformMember { offset: 16, size: 16 });
        assert_eq!(s.span(), 32);
    }

    #[test]
    fn picks_the_named_struct() {
        let s = declared(SOURCE, "Other");
        assert_eq!(s.member("x").unwrap().offset, 0);
        assert!(s.member("model").is_none());
    }

    #[test]
    fn missing_struct_is_an_error() {
        let err = ShaderStruct::from_wgsl("test", SOURCE, "Nope").unwrap_err();
        assert!(matches!(err, RenderError::UniformStructMissing { .. }));
    }

    #[test]
    fn invalid_wgsl_is_a_compile_error() {
        let err = ShaderStruct::from_wgsl("test", "struct P { a: f32", "P").unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompile { .. }));
    }

    #[test]
    fn matching_struct_has_nothing_undeclared() {
        let undeclared = check_fields::<Params>("test", &declared(SOURCE, "Params")).unwrap();
        assert!(undeclared.is_empty());
    }

    #[test]
    fn undeclared_field_is_reported_not_fatal() {
        let src = "struct Params { model: mat4x4<f32>, tint: vec4<f32>, scroll: f32, };";
        let undeclared = check_fields::<Params>("test", &declared(src, "Params")).unwrap();
        assert_eq!(undeclared, vec!["strength"]);
    }

    #[test]
    fn misplaced_field_is_an_error() {
        let src = "struct Params { model: mat4x4<f32>, scroll: f32, tint: vec4<f32>, };";
        let err = check_fields::<Params>("test", &declared(src, "Params")).unwrap_err();
        assert!(matches!(err, RenderError::UniformLayout { .. }));
    }

    #[test]
    fn shader_only_field_is_an_error() {
        let src = "struct Params { model: mat4x4<f32>, tint: vec4<f32>, scroll: f32, extra: f32, };";
        let err = check_fields::<Params>("test", &declared(src, "Params")).unwrap_err();
        assert!(matches!(err, RenderError::UniformLayout { .. }));
    }

    #[test]
    fn unchanged_value_is_not_reuploaded() {
        let mut data = UniformData::new(Params::zeroed());
        assert!(data.take_changed().is_some());
        assert!(data.take_changed().is_none());
        data.value.strength = 0.02;
        assert_eq!(data.take_changed().unwrap().len(), std::mem::size_of::<Params>());
        data.value.strength = 0.02;
        assert!(data.take_changed().is_none());
    }
}
