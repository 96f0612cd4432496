//! Square heightmap with a world-space placement.
//!
//! Heights are stored normalized to [0, 1]; world height is
//! `origin.y + h * size.y`. Sampling is bilinear over texel centers at the
//! grid corners, which is also what grass_place.wgsl does with
//! `textureLoad`, so both paths agree to float precision.

use crate::core::types::{Vec2, Vec3};

#[derive(Clone, Debug, PartialEq)]
pub struct Heightmap {
    resolution: u32,
    /// Row-major, rows along +Z
    heights: Vec<f32>,
    origin: Vec3,
    size: Vec3,
}

impl Heightmap {
    /// `heights` must hold `resolution * resolution` normalized samples.
    ///
    /// # Panics
    /// Panics if the sample count does not match the resolution.
    pub fn new(resolution: u32, heights: Vec<f32>, origin: Vec3, size: Vec3) -> Self {
        assert_eq!(
            heights.len(),
            (resolution * resolution) as usize,
            "heightmap sample count must be resolution^2"
        );
        Self { resolution, heights, origin, size }
    }

    /// Constant-height terrain, handy for tools and tests.
    pub fn flat(origin: Vec3, size: Vec3, level: f32) -> Self {
        Self::new(2, vec![level.clamp(0.0, 1.0); 4], origin, size)
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// World-space min corner
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// World-space extent; `size.y` is the vertical range
    pub fn size(&self) -> Vec3 {
        self.size
    }

    /// Raw normalized samples for texture upload
    pub fn texels(&self) -> &[f32] {
        &self.heights
    }

    fn texel(&self, col: u32, row: u32) -> f32 {
        self.heights[(row * self.resolution + col) as usize]
    }

    /// Bilinear sample at normalized coordinates, clamped to the edges.
    pub fn sample(&self, uv: Vec2) -> f32 {
        let max = (self.resolution - 1) as f32;
        let p = uv.clamp(Vec2::ZERO, Vec2::ONE) * max;
        let base = p.floor();
        let f = p - base;

        let x0 = base.x as u32;
        let y0 = base.y as u32;
        let x1 = (x0 + 1).min(self.resolution - 1);
        let y1 = (y0 + 1).min(self.resolution - 1);

        let top = self.texel(x0, y0) * (1.0 - f.x) + self.texel(x1, y0) * f.x;
        let bottom = self.texel(x0, y1) * (1.0 - f.x) + self.texel(x1, y1) * f.x;
        top * (1.0 - f.y) + bottom * f.y
    }

    /// Normalized coordinates of a world XZ position
    pub fn uv_of(&self, x: f32, z: f32) -> Vec2 {
        Vec2::new(
            (x - self.origin.x) / self.size.x,
            (z - self.origin.z) / self.size.z,
        )
    }

    /// World height at (x, z)
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.origin.y + self.sample(self.uv_of(x, z)) * self.size.y
    }
}
