//! Rendering system and GPU interfaces

pub mod context;
pub mod bindings;
pub mod buffer;
pub mod pipeline;
pub mod backend;
pub mod culling;
pub mod cpu;
pub mod gpu;

pub use backend::{DrawRequest, GrassBackend, ShadowCasters};
pub use cpu::{CpuFrame, CpuGrassBackend};
pub use gpu::{GpuFrame, WgpuGrassBackend};
