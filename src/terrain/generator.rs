//! Noise-based procedural terrain heights

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use super::heightmap::Heightmap;
use crate::core::types::{Vec2, Vec3};

/// Parameters controlling terrain generation
#[derive(Clone, Debug)]
pub struct TerrainParams {
    pub seed: u32,
    pub scale: f32,        // Horizontal scale (larger = smoother)
    pub height_scale: f32, // Vertical scale (max height)
    pub octaves: u32,      // FBM octaves (detail levels)
    pub persistence: f32,  // FBM persistence (0.5 typical)
    pub lacunarity: f32,   // FBM lacunarity (2.0 typical)
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            scale: 100.0,
            height_scale: 64.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

/// Procedural terrain generator using fractal Brownian motion (FBM)
pub struct TerrainGenerator {
    params: TerrainParams,
    noise: Fbm<Perlin>,
}

impl TerrainGenerator {
    /// Create a new terrain generator with the given parameters
    pub fn new(params: TerrainParams) -> Self {
        let noise = Fbm::<Perlin>::new(params.seed)
            .set_octaves(params.octaves as usize)
            .set_persistence(params.persistence as f64)
            .set_lacunarity(params.lacunarity as f64);

        Self { params, noise }
    }

    /// Get terrain height at world position (x, z), in [0, height_scale]
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let nx = (x / self.params.scale) as f64;
        let nz = (z / self.params.scale) as f64;

        // Fbm can overshoot [-1, 1] slightly when octaves stack up
        let noise_value = self.noise.get([nx, nz]).clamp(-1.0, 1.0);

        let normalized = (noise_value + 1.0) / 2.0;
        (normalized * self.params.height_scale as f64) as f32
    }

    /// Bake a square heightmap covering `extent` world units from `origin`
    /// (the min XZ corner) at `resolution` samples per edge.
    pub fn bake(&self, origin: Vec2, extent: f32, resolution: u32) -> Heightmap {
        let resolution = resolution.max(2);
        let step = extent / (resolution - 1) as f32;
        let height_scale = self.params.height_scale.max(f32::EPSILON);

        let mut heights = Vec::with_capacity((resolution * resolution) as usize);
        for row in 0..resolution {
            for col in 0..resolution {
                let x = origin.x + col as f32 * step;
                let z = origin.y + row as f32 * step;
                heights.push(self.height_at(x, z) / height_scale);
            }
        }

        log::debug!(
            "Baked {}x{} heightmap over {:.1}m (seed {})",
            resolution, resolution, extent, self.params.seed
        );

        Heightmap::new(
            resolution,
            heights,
            Vec3::new(origin.x, 0.0, origin.y),
            Vec3::new(extent, height_scale, extent),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terrain_params_default() {
        let params = TerrainParams::default();
        assert_eq!(params.seed, 12345);
        assert_eq!(params.scale, 100.0);
        assert_eq!(params.height_scale, 64.0);
        assert_eq!(params.octaves, 4);
    }

    #[test]
    fn test_height_at() {
        let generator = TerrainGenerator::new(TerrainParams::default());

        let height = generator.height_at(0.0, 0.0);
        assert!(height >= 0.0);
        assert!(height <= 64.0);
        assert_eq!(height, generator.height_at(0.0, 0.0));

        let height3 = generator.height_at(100.0, 100.0);
        assert!(height3 >= 0.0);
        assert!(height3 <= 64.0);
    }

    #[test]
    fn test_different_seeds() {
        let gen1 = TerrainGenerator::new(TerrainParams { seed: 1, ..Default::default() });
        let gen2 = TerrainGenerator::new(TerrainParams { seed: 2, ..Default::default() });
        assert_ne!(gen1.height_at(50.3, 50.7), gen2.height_at(50.3, 50.7));
    }

    #[test]
    fn test_bake_matches_generator_at_samples() {
        let generator = TerrainGenerator::new(TerrainParams::default());
        let map = generator.bake(Vec2::new(-8.0, -8.0), 16.0, 17);

        assert_eq!(map.resolution(), 17);
        assert_eq!(map.size(), Vec3::new(16.0, 64.0, 16.0));
        // Sample grid is 1m apart, so world (-3, 5) is an exact texel
        let expected = generator.height_at(-3.0, 5.0);
        assert!((map.height_at(-3.0, 5.0) - expected).abs() < 1e-3);
    }
}
