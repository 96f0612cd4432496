//! Grass pipelines: placement and cull compute passes, indirect blade draw

pub mod blade;
pub mod cull;
pub mod placement;

pub use blade::{BladeDraw, BladeMeshBuffers, BladePipeline, DEPTH_FORMAT};
pub use cull::CullPipeline;
pub use placement::{HeightmapTexture, PlacementPipeline};
