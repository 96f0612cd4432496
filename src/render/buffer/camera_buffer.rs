//! GPU uniform buffer for camera data

use bytemuck::{Pod, Zeroable};
use crate::core::camera::Camera;
use crate::core::types::Vec3;

/// Camera uniform data for GPU (must match `Camera` in grass_blade.wgsl)
/// WGSL vec3 has 16-byte alignment, so we need explicit padding
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    /// View-projection matrix (64 bytes, offset 0)
    pub view_proj: [[f32; 4]; 4],
    /// Camera position in world space (12 bytes, offset 64)
    pub position: [f32; 3],
    /// Padding after position for vec3 alignment (4 bytes, offset 76)
    pub _pos_pad: f32,
    /// Direction towards the sun (12 bytes, offset 80)
    pub sun_direction: [f32; 3],
    /// 1.0 when blades take directional shading, 0.0 for flat ambient (offset 92)
    pub receive_shadows: f32,
}

/// Default light direction used when the host does not provide one
pub const DEFAULT_SUN_DIRECTION: Vec3 = Vec3::new(0.3, 0.8, 0.5);

impl CameraUniform {
    pub fn new(camera: &Camera, sun_direction: Vec3, receive_shadows: bool) -> Self {
        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            position: camera.position.to_array(),
            _pos_pad: 0.0,
            sun_direction: sun_direction.try_normalize().unwrap_or(Vec3::Y).to_array(),
            receive_shadows: if receive_shadows { 1.0 } else { 0.0 },
        }
    }
}

/// GPU buffer for camera uniform
pub struct CameraBuffer {
    /// Uniform buffer
    buffer: wgpu::Buffer,
    /// Bind group
    bind_group: wgpu::BindGroup,
}

impl CameraBuffer {
    /// Create new camera buffer bound through `layout`
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_camera_uniform"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_camera_bind_group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Self { buffer, bind_group }
    }

    /// Update buffer with camera data
    pub fn update(&self, queue: &wgpu::Queue, uniform: &CameraUniform) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(uniform));
    }

    /// Get bind group
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}
