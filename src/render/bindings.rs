//! Binding table shared by the grass kernels and the blade shader.
//!
//! All bind group layouts are created once at setup. Bind groups that point
//! at instance buffers are rebuilt from these layouts whenever the buffers
//! are reallocated; the layouts themselves never change.

/// Group indices used by every grass shader
pub const PARAMS_GROUP: u32 = 0;
pub const BUFFERS_GROUP: u32 = 1;

/// Vertex buffer slots of the blade pipeline
pub const BLADE_VERTEX_SLOT: u32 = 0;
pub const INSTANCE_VERTEX_SLOT: u32 = 1;

pub struct BindingTable {
    /// grass_place.wgsl group 0: params uniform + heightmap texture
    pub placement_params: wgpu::BindGroupLayout,
    /// grass_place.wgsl group 1: raw records + raw counter
    pub placement_output: wgpu::BindGroupLayout,
    /// grass_cull.wgsl group 0: planes uniform
    pub cull_params: wgpu::BindGroupLayout,
    /// grass_cull.wgsl group 1: raw records/counter in, visible records/counter out
    pub cull_buffers: wgpu::BindGroupLayout,
    /// grass_blade.wgsl group 0: camera uniform
    pub camera: wgpu::BindGroupLayout,
}

impl BindingTable {
    pub fn new(device: &wgpu::Device) -> Self {
        let placement_params = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_place_params_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                // Heightmap (R32Float, read with textureLoad)
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let placement_output = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_place_output_layout"),
            entries: &[storage_entry(0, false), storage_entry(1, false)],
        });

        let cull_params = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_cull_params_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::COMPUTE)],
        });

        let cull_buffers = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_cull_buffers_layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, true),
                storage_entry(2, false),
                storage_entry(3, false),
            ],
        });

        let camera = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_camera_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT)],
        });

        log::debug!("Grass binding table initialized");

        Self {
            placement_params,
            placement_output,
            cull_params,
            cull_buffers,
            camera,
        }
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
