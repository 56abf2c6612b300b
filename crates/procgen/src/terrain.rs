//! Pool basin terrain generation using noise functions.
//!
//! The basin is a rounded-square bowl: a flat, slightly noisy floor below the water line that
//! rises to a rim above it. All noise is derived from `config.seed`, so the same seed always
//! produces the same mesh.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use noise::{NoiseFn, Perlin, Simplex};

/// Derive a deterministic u32 noise seed from a world seed and an offset.
#[inline]
fn deterministic_noise_seed(seed: u64, offset: u64) -> u32 {
    ((seed.wrapping_add(offset))
        .wrapping_mul(0x9e3779b97f4a7c15_u64)
        .wrapping_add(offset.wrapping_mul(0x6c078965_u64))
        >> 32) as u32
}

/// Vertex for the terrain mesh.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Configuration for pool generation.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Side length of the terrain square in world units.
    pub size: f32,
    /// Number of vertices per side.
    pub resolution: u32,
    /// Height of the basin floor.
    pub floor_height: f32,
    /// Height of the rim around the basin.
    pub rim_height: f32,
    /// Distance from the center where the floor starts to rise.
    pub basin_inner: f32,
    /// Distance from the center where the rim is reached.
    pub basin_outer: f32,
    /// Amplitude of the noise added on top of the profile.
    pub roughness: f32,
    /// Noise frequency (lower = smoother).
    pub frequency: f64,
    /// Number of octaves for fractal noise.
    pub octaves: u32,
    /// Lacunarity (frequency multiplier per octave).
    pub lacunarity: f64,
    /// Persistence (amplitude multiplier per octave).
    pub persistence: f64,
    /// World units covered by one texture repeat.
    pub uv_scale: f32,
    /// Seed for random generation.
    pub seed: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 40.0,
            resolution: 96,
            floor_height: 0.0,
            rim_height: 4.0,
            basin_inner: 6.0,
            basin_outer: 10.0,
            roughness: 0.4,
            frequency: 0.15,
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            uv_scale: 4.0,
            seed: 0,
        }
    }
}

/// Generated pool data.
#[derive(Debug)]
pub struct PoolData {
    pub vertices: Vec<TerrainVertex>,
    pub indices: Vec<u32>,
    pub heightmap: Vec<f32>,
    pub config: PoolConfig,
}

impl PoolData {
    /// Generate the basin mesh from configuration.
    pub fn generate(config: PoolConfig) -> Self {
        let perlin = Perlin::new(deterministic_noise_seed(config.seed, 0));
        let simplex = Simplex::new(deterministic_noise_seed(config.seed, 1));

        let res = config.resolution.max(2) as usize;
        let step = config.size / (res - 1) as f32;
        let half = config.size / 2.0;

        let mut vertices = Vec::with_capacity(res * res);
        let mut heightmap = Vec::with_capacity(res * res);

        for z in 0..res {
            for x in 0..res {
                let world_x = x as f32 * step - half;
                let world_z = z as f32 * step - half;

                let noise = Self::fractal_noise(&perlin, &simplex, world_x as f64, world_z as f64, &config);
                let world_y = Self::profile(world_x, world_z, &config) + (noise as f32 - 0.5) * 2.0 * config.roughness;
                heightmap.push(world_y);

                vertices.push(TerrainVertex {
                    position: [world_x, world_y, world_z],
                    normal: [0.0, 1.0, 0.0],
                    uv: [world_x / config.uv_scale, world_z / config.uv_scale],
                });
            }
        }

        // Counter-clockwise when seen from above.
        let mut indices = Vec::with_capacity((res - 1) * (res - 1) * 6);
        for z in 0..(res - 1) {
            for x in 0..(res - 1) {
                let i0 = (z * res + x) as u32;
                let i1 = i0 + 1;
                let i2 = ((z + 1) * res + x) as u32;
                let i3 = i2 + 1;
                indices.extend_from_slice(&[i0, i2, i1, i1, i2, i3]);
            }
        }

        Self::calculate_normals(&mut vertices, res);

        Self {
            vertices,
            indices,
            heightmap,
            config: PoolConfig {
                resolution: res as u32,
                ..config
            },
        }
    }

    /// Basin height before noise: floor inside `basin_inner`, rim beyond `basin_outer`.
    fn profile(x: f32, z: f32, config: &PoolConfig) -> f32 {
        // Superellipse distance gives a rounded square pool.
        let r = (x.powi(4) + z.powi(4)).powf(0.25);
        let t = ((r - config.basin_inner) / (config.basin_outer - config.basin_inner)).clamp(0.0, 1.0);
        let t = t * t * (3.0 - 2.0 * t);
        config.floor_height + (config.rim_height - config.floor_height) * t
    }

    /// Bilinear height lookup at a world position; clamps to the terrain edge.
    pub fn sample_height(&self, x: f32, z: f32) -> f32 {
        let res = self.config.resolution as usize;
        let step = self.config.size / (res - 1) as f32;
        let half = self.config.size / 2.0;

        let fx = ((x + half) / step).clamp(0.0, (res - 1) as f32);
        let fz = ((z + half) / step).clamp(0.0, (res - 1) as f32);
        let x0 = (fx.floor() as usize).min(res - 2);
        let z0 = (fz.floor() as usize).min(res - 2);
        let tx = fx - x0 as f32;
        let tz = fz - z0 as f32;

        let h00 = self.heightmap[z0 * res + x0];
        let h10 = self.heightmap[z0 * res + x0 + 1];
        let h01 = self.heightmap[(z0 + 1) * res + x0];
        let h11 = self.heightmap[(z0 + 1) * res + x0 + 1];

        let top = h00 + (h10 - h00) * tx;
        let bottom = h01 + (h11 - h01) * tx;
        top + (bottom - top) * tz
    }

    fn fractal_noise(perlin: &Perlin, simplex: &Simplex, x: f64, z: f64, config: &PoolConfig) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = config.frequency;
        let mut max_value = 0.0;

        for _ in 0..config.octaves.max(1) {
            // Mix Perlin and Simplex for variety
            let perlin_sample = perlin.get([x * frequency, z * frequency]);
            let simplex_sample = simplex.get([x * frequency + 1000.0, z * frequency + 1000.0]);

            value += (perlin_sample * 0.7 + simplex_sample * 0.3) * amplitude;
            max_value += amplitude;

            amplitude *= config.persistence;
            frequency *= config.lacunarity;
        }

        // Normalize to 0-1 range
        ((value / max_value + 1.0) * 0.5).clamp(0.0, 1.0)
    }

    fn calculate_normals(vertices: &mut [TerrainVertex], resolution: usize) {
        let mut normals: Vec<Vec3> = vec![Vec3::ZERO; vertices.len()];

        for z in 0..(resolution - 1) {
            for x in 0..(resolution - 1) {
                let i0 = z * resolution + x;
                let i1 = i0 + 1;
                let i2 = (z + 1) * resolution + x;
                let i3 = i2 + 1;

                let v0: Vec3 = vertices[i0].position.into();
                let v1: Vec3 = vertices[i1].position.into();
                let v2: Vec3 = vertices[i2].position.into();
                let v3: Vec3 = vertices[i3].position.into();

                let n1 = (v2 - v0).cross(v1 - v0).normalize_or_zero();
                normals[i0] += n1;
                normals[i2] += n1;
                normals[i1] += n1;

                let n2 = (v2 - v1).cross(v3 - v1).normalize_or_zero();
                normals[i1] += n2;
                normals[i2] += n2;
                normals[i3] += n2;
            }
        }

        for (i, vertex) in vertices.iter_mut().enumerate() {
            let n = normals[i].try_normalize().unwrap_or(Vec3::Y);
            vertex.normal = [n.x, n.y, n.z];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> PoolConfig {
        PoolConfig {
            resolution: 33,
            seed: 98765,
            ..Default::default()
        }
    }

    #[test]
    fn pool_deterministic_same_seed() {
        let a = PoolData::generate(small());
        let b = PoolData::generate(small());
        assert_eq!(a.heightmap, b.heightmap);
    }

    #[test]
    fn pool_different_seed_different_heights() {
        let a = PoolData::generate(small());
        let b = PoolData::generate(PoolConfig { seed: 22222, ..small() });
        assert_ne!(a.heightmap, b.heightmap);
    }

    /// Floor must stay under the default water line (2.2) and the rim above it.
    #[test]
    fn floor_below_and_rim_above_water() {
        let pool = PoolData::generate(small());
        assert!(pool.sample_height(0.0, 0.0) < 2.2);
        assert!(pool.sample_height(4.0, -4.0) < 2.2);
        assert!(pool.sample_height(19.0, 0.0) > 2.2);
        assert!(pool.sample_height(-15.0, 15.0) > 2.2);
    }

    #[test]
    fn index_count_matches_grid() {
        let pool = PoolData::generate(small());
        assert_eq!(pool.vertices.len(), 33 * 33);
        assert_eq!(pool.indices.len(), 32 * 32 * 6);
        assert!(pool.indices.iter().all(|&i| (i as usize) < pool.vertices.len()));
    }

    #[test]
    fn normals_are_unit_and_mostly_up() {
        let pool = PoolData::generate(small());
        for v in &pool.vertices {
            let n = Vec3::from(v.normal);
            assert!((n.length() - 1.0).abs() < 1e-4);
            assert!(n.y > 0.0);
        }
    }

    #[test]
    fn tilted_plane_normals_match_face_normal() {
        let res = 4;
        let mut vertices: Vec<TerrainVertex> = (0..res * res)
            .map(|i| {
                let x = (i % res) as f32;
                let z = (i / res) as f32;
                TerrainVertex {
                    position: [x, 0.5 * x, z],
                    normal: [0.0; 3],
                    uv: [0.0; 2],
                }
            })
            .collect();
        PoolData::calculate_normals(&mut vertices, res);

        let expected = Vec3::new(-0.5, 1.0, 0.0).normalize();
        for v in &vertices {
            let n = Vec3::from(v.normal);
            assert!(n.y > 0.0);
            assert!((n - expected).length() < 1e-4, "normal {n:?}");
        }
    }

    #[test]
    fn sample_height_matches_grid_points() {
        let pool = PoolData::generate(small());
        let step = pool.config.size / 32.0;
        let x = -20.0 + 5.0 * step;
        let z = -20.0 + 7.0 * step;
        assert!((pool.sample_height(x, z) - pool.heightmap[7 * 33 + 5]).abs() < 1e-4);
    }
}
