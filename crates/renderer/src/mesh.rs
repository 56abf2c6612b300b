//! Mesh data structures and primitive generation.

use crate::vertex::Vertex;
use wgpu::util::DeviceExt;

/// A GPU mesh. Meshes without an index buffer are drawn as a plain triangle list.
pub struct Mesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: Option<wgpu::Buffer>,
    pub num_vertices: u32,
    pub num_indices: u32,
}

impl Mesh {
    /// Create a mesh from vertex and index data.
    pub fn new(device: &wgpu::Device, label: &str, vertices: &[Vertex], indices: &[u32]) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer: Some(index_buffer),
            num_vertices: vertices.len() as u32,
            num_indices: indices.len() as u32,
        }
    }

    /// Create a mesh with no index buffer.
    pub fn non_indexed(device: &wgpu::Device, label: &str, vertices: &[Vertex]) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            vertex_buffer,
            index_buffer: None,
            num_vertices: vertices.len() as u32,
            num_indices: 0,
        }
    }

    /// Cube spanning [-1, 1] on every axis. Used for the skybox.
    pub fn cube(device: &wgpu::Device) -> Self {
        let vertices = [
            // Front face
            Vertex::new([-1.0, -1.0, 1.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            Vertex::new([1.0, -1.0, 1.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([1.0, 1.0, 1.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([-1.0, 1.0, 1.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            // Back face
            Vertex::new([1.0, -1.0, -1.0], [0.0, 0.0, -1.0], [0.0, 1.0]),
            Vertex::new([-1.0, -1.0, -1.0], [0.0, 0.0, -1.0], [1.0, 1.0]),
            Vertex::new([-1.0, 1.0, -1.0], [0.0, 0.0, -1.0], [1.0, 0.0]),
            Vertex::new([1.0, 1.0, -1.0], [0.0, 0.0, -1.0], [0.0, 0.0]),
            // Top face
            Vertex::new([-1.0, 1.0, 1.0], [0.0, 1.0, 0.0], [0.0, 1.0]),
            Vertex::new([1.0, 1.0, 1.0], [0.0, 1.0, 0.0], [1.0, 1.0]),
            Vertex::new([1.0, 1.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0]),
            Vertex::new([-1.0, 1.0, -1.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            // Bottom face
            Vertex::new([-1.0, -1.0, -1.0], [0.0, -1.0, 0.0], [0.0, 1.0]),
            Vertex::new([1.0, -1.0, -1.0], [0.0, -1.0, 0.0], [1.0, 1.0]),
            Vertex::new([1.0, -1.0, 1.0], [0.0, -1.0, 0.0], [1.0, 0.0]),
            Vertex::new([-1.0, -1.0, 1.0], [0.0, -1.0, 0.0], [0.0, 0.0]),
            // Right face
            Vertex::new([1.0, -1.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0]),
            Vertex::new([1.0, -1.0, -1.0], [1.0, 0.0, 0.0], [1.0, 1.0]),
            Vertex::new([1.0, 1.0, -1.0], [1.0, 0.0, 0.0], [1.0, 0.0]),
            Vertex::new([1.0, 1.0, 1.0], [1.0, 0.0, 0.0], [0.0, 0.0]),
            // Left face
            Vertex::new([-1.0, -1.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0]),
            Vertex::new([-1.0, -1.0, 1.0], [-1.0, 0.0, 0.0], [1.0, 1.0]),
            Vertex::new([-1.0, 1.0, 1.0], [-1.0, 0.0, 0.0], [1.0, 0.0]),
            Vertex::new([-1.0, 1.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 0.0]),
        ];

        #[rustfmt::skip]
        let indices: [u32; 36] = [
            0, 1, 2, 2, 3, 0,       // Front
            4, 5, 6, 6, 7, 4,       // Back
            8, 9, 10, 10, 11, 8,    // Top
            12, 13, 14, 14, 15, 12, // Bottom
            16, 17, 18, 18, 19, 16, // Right
            20, 21, 22, 22, 23, 20, // Left
        ];

        Self::new(device, "Skybox Cube", &vertices, &indices)
    }

    /// Water quad: two triangles, six vertices, no index buffer.
    pub fn water_quad(device: &wgpu::Device, half_size: f32) -> Self {
        Self::non_indexed(device, "Water Quad", &water_quad_vertices(half_size))
    }

    /// Bind the vertex (and index) buffer and issue the draw for `instances`.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, instances: std::ops::Range<u32>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        match &self.index_buffer {
            Some(index_buffer) => {
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..self.num_indices, 0, instances);
            }
            None => pass.draw(0..self.num_vertices, instances),
        }
    }
}

/// Flat square in the XZ plane at y = 0, facing +Y.
pub fn water_quad_vertices(half_size: f32) -> [Vertex; 6] {
    let h = half_size;
    let up = [0.0, 1.0, 0.0];
    [
        Vertex::new([h, 0.0, -h], up, [1.0, 0.0]),
        Vertex::new([-h, 0.0, h], up, [0.0, 1.0]),
        Vertex::new([h, 0.0, h], up, [1.0, 1.0]),
        Vertex::new([-h, 0.0, h], up, [0.0, 1.0]),
        Vertex::new([h, 0.0, -h], up, [1.0, 0.0]),
        Vertex::new([-h, 0.0, -h], up, [0.0, 0.0]),
    ]
}

/// Mesh data before GPU upload (for procedural generation).
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn from_pool(pool: &procgen::PoolData) -> Self {
        Self {
            vertices: pool.vertices.iter().copied().map(Vertex::from).collect(),
            indices: pool.indices.clone(),
        }
    }

    pub fn upload(&self, device: &wgpu::Device, label: &str) -> Mesh {
        Mesh::new(device, label, &self.vertices, &self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn water_quad_is_two_triangles_on_y_zero() {
        let verts = water_quad_vertices(5.0);
        assert!(verts.iter().all(|v| v.position[1] == 0.0));
        for tri in verts.chunks(3) {
            let a = Vec3::from(tri[0].position);
            let b = Vec3::from(tri[1].position);
            let c = Vec3::from(tri[2].position);
            let n = (b - a).cross(c - a);
            // Counter-clockwise seen from above.
            assert!(n.y > 0.0);
        }
    }

    #[test]
    fn water_quad_uvs_span_unit_square() {
        let verts = water_quad_vertices(2.0);
        for v in &verts {
            let expect_u = if v.position[0] > 0.0 { 1.0 } else { 0.0 };
            let expect_v = if v.position[2] > 0.0 { 1.0 } else { 0.0 };
            assert_eq!(v.tex_coords, [expect_u, expect_v]);
        }
    }

    #[test]
    fn pool_mesh_data_keeps_counts() {
        let pool = procgen::PoolData::generate(procgen::PoolConfig {
            resolution: 9,
            ..Default::default()
        });
        let data = MeshData::from_pool(&pool);
        assert_eq!(data.vertices.len(), 81);
        assert_eq!(data.indices.len(), 8 * 8 * 6);
        assert_eq!(data.vertices[10].position, pool.vertices[10].position);
    }
}
