//! Procedural grass field.
//!
//! One blade mesh is generated from [`ShapeParameters`] and instanced over a
//! density grid. Placement and visibility run as compute passes; the field is
//! drawn with a single indirect call whose instance count never leaves the
//! GPU. [`GrassSystem`] decides each frame what has to be rebuilt.

pub mod config;
pub mod mesh;
pub mod params;
pub mod system;

pub use config::{GrassConfig, PlacementGridConfig, RenderConfig, ShadowCastingMode, ShapeParameters};
pub use mesh::{BladeMesh, BladeMeshBuilder, BladeVertex};
pub use params::{CullParams, IndirectDrawArgs, InstanceRecord, PlacementParams};
pub use system::{DirtyReason, FrameReport, GrassSystem, SystemState};
