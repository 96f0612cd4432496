//! Grass configuration: blade shape, placement grid, and render settings.
//!
//! Every value has a documented range. Inputs coming from a host UI are
//! clamped with [`GrassConfig::clamped`]; configs loaded from disk are
//! checked with [`GrassConfig::validate`] so typos surface as errors.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

/// Blade segment count bounds. Three is the minimum for one stem quad plus
/// the tip triangle.
pub const MIN_SEGMENTS: u32 = 3;
pub const MAX_SEGMENTS: u32 = 5;

/// Shape of the single blade mesh shared by every instance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeParameters {
    /// Total blade height [0.5, 3.0]
    pub height: f32,
    /// Base width [0.01, 0.5]
    pub width: f32,
    /// Number of segments [3, 5]
    pub segments: u32,
    /// Bend magnitude [0, 1]
    pub curvature: f32,
    /// Fraction of stem height where bending begins [0, 1]
    pub curvature_position: f32,
    /// Lean direction in degrees [0, 360]
    pub bend_direction: f32,
    /// Fraction of height given to the tip triangle [0, 1]
    pub top_triangle_ratio: f32,
    /// Width at the top of the stem relative to the base [0.5, 1.5]
    pub width_variation: f32,
}

impl Default for ShapeParameters {
    fn default() -> Self {
        Self {
            height: 1.0,
            width: 0.1,
            segments: 4,
            curvature: 0.2,
            curvature_position: 0.5,
            bend_direction: 0.0,
            top_triangle_ratio: 0.3,
            width_variation: 1.0,
        }
    }
}

impl ShapeParameters {
    /// Copy with every field forced into its range.
    pub fn clamped(&self) -> Self {
        Self {
            height: self.height.clamp(0.5, 3.0),
            width: self.width.clamp(0.01, 0.5),
            segments: self.segments.clamp(MIN_SEGMENTS, MAX_SEGMENTS),
            curvature: self.curvature.clamp(0.0, 1.0),
            curvature_position: self.curvature_position.clamp(0.0, 1.0),
            bend_direction: self.bend_direction.clamp(0.0, 360.0),
            top_triangle_ratio: self.top_triangle_ratio.clamp(0.0, 1.0),
            width_variation: self.width_variation.clamp(0.5, 1.5),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let shape = |name, value, min, max| {
            check_range(value, min, max).map_err(|_| Error::InvalidShapeParameter { name, value, min, max })
        };
        shape("height", self.height, 0.5, 3.0)?;
        shape("width", self.width, 0.01, 0.5)?;
        shape("segments", self.segments as f32, MIN_SEGMENTS as f32, MAX_SEGMENTS as f32)?;
        shape("curvature", self.curvature, 0.0, 1.0)?;
        shape("curvature_position", self.curvature_position, 0.0, 1.0)?;
        shape("bend_direction", self.bend_direction, 0.0, 360.0)?;
        shape("top_triangle_ratio", self.top_triangle_ratio, 0.0, 1.0)?;
        shape("width_variation", self.width_variation, 0.5, 1.5)?;
        Ok(())
    }
}

/// Density grid that sizes the instance buffers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementGridConfig {
    /// Blades per unit length [1, 1000]
    pub density: u32,
    /// Tile edge length in world units [1, 100]
    pub tile_size: u32,
    /// Position jitter as a fraction of one cell [0, 1]
    pub randomize_position: f32,
    /// Maximum random yaw in degrees [0, 360]
    pub randomize_rotation: f32,
    /// World XZ center of the tile
    pub origin: [f32; 2],
}

impl Default for PlacementGridConfig {
    fn default() -> Self {
        Self {
            density: 10,
            tile_size: 1,
            randomize_position: 0.2,
            randomize_rotation: 360.0,
            origin: [0.0, 0.0],
        }
    }
}

impl PlacementGridConfig {
    /// Cells along one edge of the grid.
    pub fn side(&self) -> u32 {
        self.density * self.tile_size
    }

    /// Upper bound on instances; fixes the instance buffer sizes.
    ///
    /// Saturates rather than wrapping, so an oversized grid fails allocation.
    pub fn capacity(&self) -> u32 {
        let side = self.side();
        side.saturating_mul(side)
    }

    pub fn clamped(&self) -> Self {
        Self {
            density: self.density.clamp(1, 1000),
            tile_size: self.tile_size.clamp(1, 100),
            randomize_position: self.randomize_position.clamp(0.0, 1.0),
            randomize_rotation: self.randomize_rotation.clamp(0.0, 360.0),
            origin: self.origin,
        }
    }

    pub fn validate(&self) -> Result<()> {
        config_range("density", self.density as f32, 1.0, 1000.0)?;
        config_range("tile_size", self.tile_size as f32, 1.0, 100.0)?;
        config_range("randomize_position", self.randomize_position, 0.0, 1.0)?;
        config_range("randomize_rotation", self.randomize_rotation, 0.0, 360.0)?;
        Ok(())
    }
}

/// How blades take part in shadow rendering. Anything but `Off` publishes
/// the field to the host's shadow pass; `ShadowsOnly` also drops the colour
/// draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShadowCastingMode {
    #[default]
    Off,
    On,
    TwoSided,
    ShadowsOnly,
}

/// Culling and shadow settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Added to every frustum plane distance [-4, 4]. Positive values keep
    /// blades near the screen edge alive.
    pub culling_radius: f32,
    pub cast_shadows: ShadowCastingMode,
    pub receive_shadows: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            culling_radius: 0.0,
            cast_shadows: ShadowCastingMode::Off,
            receive_shadows: true,
        }
    }
}

impl RenderConfig {
    pub fn clamped(&self) -> Self {
        Self {
            culling_radius: self.culling_radius.clamp(-4.0, 4.0),
            ..*self
        }
    }

    pub fn validate(&self) -> Result<()> {
        config_range("culling_radius", self.culling_radius, -4.0, 4.0)
    }
}

/// Full host-facing configuration of the grass system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrassConfig {
    pub shape: ShapeParameters,
    pub placement: PlacementGridConfig,
    pub render: RenderConfig,
}

impl GrassConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.shape.validate()?;
        self.placement.validate()?;
        self.render.validate()
    }

    pub fn clamped(&self) -> Self {
        Self {
            shape: self.shape.clamped(),
            placement: self.placement.clamped(),
            render: self.render.clamped(),
        }
    }
}

fn check_range(value: f32, min: f32, max: f32) -> std::result::Result<(), ()> {
    // NaN fails both comparisons and is rejected
    if value >= min && value <= max { Ok(()) } else { Err(()) }
}

fn config_range(name: &'static str, value: f32, min: f32, max: f32) -> Result<()> {
    check_range(value, min, max).map_err(|_| Error::InvalidConfig { name, value, min, max })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = GrassConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.clamped(), cfg);
    }

    #[test]
    fn test_capacity_derivation() {
        let grid = PlacementGridConfig {
            density: 10,
            tile_size: 1,
            ..Default::default()
        };
        assert_eq!(grid.side(), 10);
        assert_eq!(grid.capacity(), 100);

        let grid = PlacementGridConfig {
            density: 4,
            tile_size: 3,
            ..Default::default()
        };
        assert_eq!(grid.side(), 12);
        assert_eq!(grid.capacity(), 144);
    }

    #[test]
    fn test_segments_clamped_to_minimum() {
        let shape = ShapeParameters {
            segments: 1,
            ..Default::default()
        };
        assert_eq!(shape.clamped().segments, MIN_SEGMENTS);
        assert!(matches!(
            shape.validate(),
            Err(Error::InvalidShapeParameter { name: "segments", .. })
        ));
    }

    #[test]
    fn test_out_of_range_placement_rejected() {
        let grid = PlacementGridConfig {
            density: 0,
            ..Default::default()
        };
        assert!(matches!(grid.validate(), Err(Error::InvalidConfig { name: "density", .. })));
        assert_eq!(grid.clamped().density, 1);
    }

    #[test]
    fn test_nan_rejected() {
        let render = RenderConfig {
            culling_radius: f32::NAN,
            ..Default::default()
        };
        assert!(render.validate().is_err());
    }

    #[test]
    fn test_load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "shape": {{ "segments": 5, "curvature": 0.0 }}, "render": {{ "cast_shadows": "TwoSided" }} }}"#
        )
        .unwrap();

        let cfg = GrassConfig::load(file.path()).unwrap();
        assert_eq!(cfg.shape.segments, 5);
        assert_eq!(cfg.shape.curvature, 0.0);
        assert_eq!(cfg.shape.height, ShapeParameters::default().height);
        assert_eq!(cfg.placement, PlacementGridConfig::default());
        assert_eq!(cfg.render.cast_shadows, ShadowCastingMode::TwoSided);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "shape": {{ "width_variation": 2.0 }} }}"#).unwrap();
        assert!(matches!(
            GrassConfig::load(file.path()),
            Err(Error::InvalidShapeParameter { name: "width_variation", .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            GrassConfig::load(dir.path().join("missing.json")),
            Err(Error::Io(_))
        ));
    }
}
