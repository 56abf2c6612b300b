//! Procedural texture generation for the water scene.
//! Ripple normal maps, dudv conversion, pool stone, and sky cubemap faces.

use std::path::Path;

use anyhow::{Context, Result};
use glam::{Vec2, Vec3};
use noise::{NoiseFn, Perlin};
use rand::prelude::*;

/// RGBA pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Pixel {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: (r.clamp(0.0, 1.0) * 255.0) as u8,
            g: (g.clamp(0.0, 1.0) * 255.0) as u8,
            b: (b.clamp(0.0, 1.0) * 255.0) as u8,
            a: 255,
        }
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Generated texture data
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Pixel>,
}

impl TextureData {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Pixel::new(0, 0, 0, 255); (width * height) as usize],
        }
    }

    /// Texture filled with a single color.
    pub fn filled(width: u32, height: u32, pixel: Pixel) -> Self {
        Self {
            width,
            height,
            pixels: vec![pixel; (width * height) as usize],
        }
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: Pixel) {
        if x < self.width && y < self.height {
            self.pixels[(y * self.width + x) as usize] = pixel;
        }
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Pixel {
        if x < self.width && y < self.height {
            self.pixels[(y * self.width + x) as usize]
        } else {
            Pixel::new(0, 0, 0, 255)
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for pixel in &self.pixels {
            bytes.extend_from_slice(&pixel.to_bytes());
        }
        bytes
    }

    pub fn from_image(image: &image::DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let pixels = rgba
            .pixels()
            .map(|p| Pixel::new(p[0], p[1], p[2], p[3]))
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn to_image(&self) -> image::RgbaImage {
        let mut out = image::RgbaImage::new(self.width, self.height);
        for (x, y, px) in out.enumerate_pixels_mut() {
            *px = image::Rgba(self.get_pixel(x, y).to_bytes());
        }
        out
    }

    /// Decode an image file (PNG or JPEG).
    pub fn load(path: &Path) -> Result<Self> {
        let img = image::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self::from_image(&img))
    }

    /// Encode as PNG (format chosen from the extension).
    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_image()
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Convert a tangent-space normal map into a dudv map.
///
/// Red holds `d(nx)/dx` and green `d(ny)/dy`, both from central differences whose
/// neighbours wrap around the edges so the result tiles like its source.
pub fn normal_to_dudv(normal: &TextureData) -> TextureData {
    let (w, h) = (normal.width, normal.height);
    let mut dudv = TextureData::new(w, h);
    if w == 0 || h == 0 {
        return dudv;
    }

    let unpack = |c: u8| c as f32 / 255.0 * 2.0 - 1.0;
    let pack = |v: f32| (((v + 1.0) / 2.0) * 255.0) as u8;

    for j in 0..h {
        for i in 0..w {
            let nx_left = unpack(normal.get_pixel((i + w - 1) % w, j).r);
            let nx_right = unpack(normal.get_pixel((i + 1) % w, j).r);
            let ny_up = unpack(normal.get_pixel(i, (j + h - 1) % h).g);
            let ny_down = unpack(normal.get_pixel(i, (j + 1) % h).g);

            let dnx = (nx_right - nx_left) / 2.0;
            let dny = (ny_down - ny_up) / 2.0;

            dudv.set_pixel(i, j, Pixel::new(pack(dnx), pack(dny), 0, 255));
        }
    }
    dudv
}

/// Cubemap face order used by the GPU (+X, -X, +Y, -Y, +Z, -Z).
pub const CUBE_FACES: usize = 6;

/// World direction through texel `(s, t)` of a cube face, with `s, t` in [-1, 1].
pub fn cube_face_direction(face: usize, s: f32, t: f32) -> Vec3 {
    let dir = match face {
        0 => Vec3::new(1.0, -t, -s),
        1 => Vec3::new(-1.0, -t, s),
        2 => Vec3::new(s, 1.0, t),
        3 => Vec3::new(s, -1.0, -t),
        4 => Vec3::new(s, -t, 1.0),
        _ => Vec3::new(-s, -t, -1.0),
    };
    dir.normalize()
}

/// Ripple normal map settings.
#[derive(Debug, Clone)]
pub struct RippleConfig {
    /// Feature count across one tile.
    pub scale: f64,
    pub octaves: u32,
    /// Slope multiplier before normalisation (higher = choppier).
    pub strength: f32,
}

impl Default for RippleConfig {
    fn default() -> Self {
        Self {
            scale: 4.0,
            octaves: 4,
            strength: 6.0,
        }
    }
}

/// Sky gradient colors (linear 0-1).
#[derive(Debug, Clone)]
pub struct SkyConfig {
    pub zenith: Vec3,
    pub horizon: Vec3,
    pub ground: Vec3,
    pub sun_direction: Vec3,
    pub cloud_cover: f32,
}

impl Default for SkyConfig {
    fn default() -> Self {
        Self {
            zenith: Vec3::new(0.22, 0.45, 0.80),
            horizon: Vec3::new(97.0 / 256.0, 175.0 / 256.0, 239.0 / 256.0),
            ground: Vec3::new(0.30, 0.33, 0.32),
            sun_direction: Vec3::new(3.0, 3.0, 3.0).normalize(),
            cloud_cover: 0.35,
        }
    }
}

/// Procedural texture generator
pub struct TextureGenerator {
    perlin: Perlin,
    rng: StdRng,
}

impl TextureGenerator {
    pub fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self {
            perlin: Perlin::new(rng.gen()),
            rng,
        }
    }

    /// Tileable water ripple normal map (tangent space, blue = up).
    pub fn water_normal_map(&mut self, size: u32, config: &RippleConfig) -> TextureData {
        let heights = self.tileable_heights(size, config.scale, config.octaves);
        let mut normal = TextureData::new(size, size);
        let n = size as i64;

        for y in 0..size {
            for x in 0..size {
                let at = |dx: i64, dy: i64| {
                    let xi = (x as i64 + dx).rem_euclid(n) as usize;
                    let yi = (y as i64 + dy).rem_euclid(n) as usize;
                    heights[yi * size as usize + xi]
                };
                let dx = (at(1, 0) - at(-1, 0)) * 0.5 * config.strength;
                let dy = (at(0, 1) - at(0, -1)) * 0.5 * config.strength;

                let normal_vec = Vec3::new(-dx, -dy, 1.0).normalize() * 0.5 + 0.5;
                normal.set_pixel(x, y, Pixel::from_rgb(normal_vec.x, normal_vec.y, normal_vec.z));
            }
        }
        normal
    }

    /// Pool stone albedo and matching normal map.
    pub fn stone(&mut self, size: u32) -> (TextureData, TextureData) {
        let mut albedo = TextureData::new(size, size);
        let heights = self.tileable_heights(size, 8.0, 5);
        let base = Vec3::new(0.62, 0.58, 0.50);
        let tint = Vec3::new(0.40, 0.42, 0.38);

        for y in 0..size {
            for x in 0..size {
                let h = heights[(y * size + x) as usize];
                let speck = if self.rng.gen::<f32>() < 0.02 { 0.85 } else { 1.0 };
                let color = base.lerp(tint, smooth_step(0.35, 0.65, h)) * (0.8 + h * 0.3) * speck;
                albedo.set_pixel(x, y, Pixel::from_rgb(color.x, color.y, color.z));
            }
        }

        let mut normal = TextureData::new(size, size);
        let n = size as i64;
        for y in 0..size {
            for x in 0..size {
                let at = |dx: i64, dy: i64| {
                    let xi = (x as i64 + dx).rem_euclid(n) as usize;
                    let yi = (y as i64 + dy).rem_euclid(n) as usize;
                    heights[yi * size as usize + xi]
                };
                let dx = at(1, 0) - at(-1, 0);
                let dy = at(0, 1) - at(0, -1);
                let normal_vec = Vec3::new(-dx * 2.0, -dy * 2.0, 1.0).normalize() * 0.5 + 0.5;
                normal.set_pixel(x, y, Pixel::from_rgb(normal_vec.x, normal_vec.y, normal_vec.z));
            }
        }

        (albedo, normal)
    }

    /// Six sky cubemap faces in GPU face order.
    pub fn sky_faces(&mut self, size: u32, config: &SkyConfig) -> Vec<TextureData> {
        (0..CUBE_FACES)
            .map(|face| {
                let mut tex = TextureData::new(size, size);
                for y in 0..size {
                    for x in 0..size {
                        let s = 2.0 * (x as f32 + 0.5) / size as f32 - 1.0;
                        let t = 2.0 * (y as f32 + 0.5) / size as f32 - 1.0;
                        let dir = cube_face_direction(face, s, t);
                        let c = self.sky_color(dir, config);
                        tex.set_pixel(x, y, Pixel::from_rgb(c.x, c.y, c.z));
                    }
                }
                tex
            })
            .collect()
    }

    fn sky_color(&self, dir: Vec3, config: &SkyConfig) -> Vec3 {
        let mut color = if dir.y >= 0.0 {
            config.horizon.lerp(config.zenith, dir.y.powf(0.6))
        } else {
            config.horizon.lerp(config.ground, (-dir.y * 4.0).min(1.0))
        };

        if dir.y > 0.02 {
            // Clouds projected onto a flat layer above the eye.
            let p = Vec2::new(dir.x, dir.z) / dir.y;
            let n = self.fbm(p.x as f64 * 1.5, p.y as f64 * 1.5, 5) as f32;
            let cover = smooth_step(1.0 - config.cloud_cover, 1.0, n) * smooth_step(0.02, 0.25, dir.y);
            color = color.lerp(Vec3::splat(0.96), cover);
        }

        let sun = dir.dot(config.sun_direction).max(0.0);
        color + Vec3::new(1.0, 0.9, 0.7) * sun.powf(256.0)
    }

    /// Heights in [0, 1] sampled on a 4D torus so the result tiles seamlessly.
    fn tileable_heights(&self, size: u32, scale: f64, octaves: u32) -> Vec<f32> {
        let tau = std::f64::consts::TAU;
        let radius = scale / tau;
        let mut heights = Vec::with_capacity((size * size) as usize);
        for y in 0..size {
            for x in 0..size {
                let u = x as f64 / size as f64 * tau;
                let v = y as f64 / size as f64 * tau;
                let p = [u.cos() * radius, u.sin() * radius, v.cos() * radius, v.sin() * radius];

                let mut value = 0.0;
                let mut amplitude = 1.0;
                let mut frequency = 1.0;
                let mut max_value = 0.0;
                for _ in 0..octaves.max(1) {
                    value += self.perlin.get([
                        p[0] * frequency,
                        p[1] * frequency,
                        p[2] * frequency,
                        p[3] * frequency,
                    ]) * amplitude;
                    max_value += amplitude;
                    amplitude *= 0.5;
                    frequency *= 2.0;
                }
                heights.push(((value / max_value + 1.0) * 0.5) as f32);
            }
        }
        heights
    }

    fn fbm(&self, x: f64, y: f64, octaves: u32) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 0.5;
        let mut frequency = 1.0;

        for _ in 0..octaves {
            value += self.perlin.get([x * frequency, y * frequency]) * amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }

        (value + 1.0) * 0.5
    }
}

fn smooth_step(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_normal_map_gives_neutral_dudv() {
        let flat = TextureData::filled(8, 8, Pixel::new(128, 128, 255, 255));
        let dudv = normal_to_dudv(&flat);
        for p in &dudv.pixels {
            assert_eq!((p.r, p.g, p.b), (127, 127, 0));
        }
    }

    /// The first column's neighbours must come from the last column, not from itself.
    #[test]
    fn dudv_wraps_left_and_right_edges() {
        let mut normal = TextureData::filled(4, 4, Pixel::new(128, 128, 255, 255));
        for y in 0..4 {
            normal.set_pixel(3, y, Pixel::new(255, 128, 255, 255));
        }
        let dudv = normal_to_dudv(&normal);
        // x = 0 sees the bright column on its left: negative slope.
        assert!(dudv.get_pixel(0, 1).r < 100);
        // x = 2 sees it on its right: positive slope.
        assert!(dudv.get_pixel(2, 1).r > 160);
        // x = 1 is between two neutral texels.
        assert_eq!(dudv.get_pixel(1, 1).r, 127);
    }

    #[test]
    fn dudv_wraps_top_and_bottom_edges() {
        let mut normal = TextureData::filled(4, 4, Pixel::new(128, 128, 255, 255));
        for x in 0..4 {
            normal.set_pixel(x, 0, Pixel::new(128, 255, 255, 255));
        }
        let dudv = normal_to_dudv(&normal);
        assert!(dudv.get_pixel(0, 3).g > 160);
        assert!(dudv.get_pixel(0, 1).g < 100);
    }

    #[test]
    fn water_normals_tile_seamlessly() {
        let mut gen = TextureGenerator::new(7);
        let tex = gen.water_normal_map(32, &RippleConfig::default());
        // Normals point mostly up (blue dominant).
        let avg_b: f32 = tex.pixels.iter().map(|p| p.b as f32).sum::<f32>() / tex.pixels.len() as f32;
        assert!(avg_b > 200.0);
        // Opposite edges should be about as similar as adjacent interior columns.
        let edge_diff: i32 = (0..32)
            .map(|y| (tex.get_pixel(0, y).r as i32 - tex.get_pixel(31, y).r as i32).abs())
            .sum();
        assert!(edge_diff / 32 < 40, "edge mismatch {}", edge_diff / 32);
    }

    #[test]
    fn same_seed_same_texture() {
        let a = TextureGenerator::new(42).water_normal_map(16, &RippleConfig::default());
        let b = TextureGenerator::new(42).water_normal_map(16, &RippleConfig::default());
        assert_eq!(a, b);
    }

    #[test]
    fn cube_face_centers() {
        assert!((cube_face_direction(0, 0.0, 0.0) - Vec3::X).length() < 1e-6);
        assert!((cube_face_direction(1, 0.0, 0.0) + Vec3::X).length() < 1e-6);
        assert!((cube_face_direction(2, 0.0, 0.0) - Vec3::Y).length() < 1e-6);
        assert!((cube_face_direction(3, 0.0, 0.0) + Vec3::Y).length() < 1e-6);
        assert!((cube_face_direction(4, 0.0, 0.0) - Vec3::Z).length() < 1e-6);
        assert!((cube_face_direction(5, 0.0, 0.0) + Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn sky_is_brighter_above_than_below() {
        let mut gen = TextureGenerator::new(1);
        let faces = gen.sky_faces(8, &SkyConfig::default());
        assert_eq!(faces.len(), CUBE_FACES);
        let up = faces[2].get_pixel(4, 4);
        let down = faces[3].get_pixel(4, 4);
        assert!(up.b > down.b);
    }

    #[test]
    fn image_roundtrip_keeps_pixels() {
        let mut tex = TextureData::new(3, 2);
        tex.set_pixel(2, 1, Pixel::new(10, 20, 30, 40));
        let back = TextureData::from_image(&image::DynamicImage::ImageRgba8(tex.to_image()));
        assert_eq!(back, tex);
    }
}
