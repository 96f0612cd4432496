//! Terrain surface the grass grows on

pub mod generator;
pub mod heightmap;

pub use generator::{TerrainGenerator, TerrainParams};
pub use heightmap::Heightmap;
