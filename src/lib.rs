//! Meadow - procedural grass blades and a GPU-driven instanced grass field

pub mod core;
pub mod math;
pub mod terrain;
pub mod grass;
pub mod render;
