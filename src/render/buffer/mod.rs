//! GPU buffer management

pub mod camera_buffer;
pub mod instance_buffers;

pub use camera_buffer::{CameraBuffer, CameraUniform};
pub use instance_buffers::{CounterBuffer, InstanceBufferSet};
