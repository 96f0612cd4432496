//! Placement compute pipeline: fills the raw instance buffer

use crate::grass::params::{placement_workgroups, PlacementParams};
use crate::render::bindings::{BindingTable, BUFFERS_GROUP, PARAMS_GROUP};
use crate::render::buffer::CounterBuffer;
use crate::terrain::Heightmap;

/// Heightmap uploaded as an R32Float texture
pub struct HeightmapTexture {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl HeightmapTexture {
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, heightmap: &Heightmap) -> Self {
        let resolution = heightmap.resolution();
        let size = wgpu::Extent3d {
            width: resolution,
            height: resolution,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("grass_heightmap"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(heightmap.texels()),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(resolution * std::mem::size_of::<f32>() as u32),
                rows_per_image: Some(resolution),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// Dispatches grass_place.wgsl over the density grid
pub struct PlacementPipeline {
    pipeline: wgpu::ComputePipeline,
    params_buffer: wgpu::Buffer,
}

impl PlacementPipeline {
    pub fn new(device: &wgpu::Device, bindings: &BindingTable) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grass_place_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/grass_place.wgsl").into()),
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_place_params"),
            size: std::mem::size_of::<PlacementParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grass_place_pipeline_layout"),
            bind_group_layouts: &[&bindings.placement_params, &bindings.placement_output],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("grass_place_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self { pipeline, params_buffer }
    }

    /// Bind group for the params uniform and the terrain heightmap
    pub fn create_params_bind_group(
        &self,
        device: &wgpu::Device,
        bindings: &BindingTable,
        heightmap: &HeightmapTexture,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_place_params_bind_group"),
            layout: &bindings.placement_params,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(heightmap.view()),
                },
            ],
        })
    }

    /// Bind group for the raw buffer the kernel appends into
    pub fn create_output_bind_group(
        device: &wgpu::Device,
        bindings: &BindingTable,
        raw: &CounterBuffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_place_output_bind_group"),
            layout: &bindings.placement_output,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: raw.records().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: raw.counter().as_entire_binding(),
                },
            ],
        })
    }

    pub fn update_params(&self, queue: &wgpu::Queue, params: &PlacementParams) {
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(params));
    }

    /// Reset the raw counter and dispatch one thread per grid cell.
    pub fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        params_bind_group: &wgpu::BindGroup,
        output_bind_group: &wgpu::BindGroup,
        raw: &CounterBuffer,
        side: u32,
    ) {
        raw.reset_counter(encoder);

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("grass_place_pass"),
            timestamp_writes: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(PARAMS_GROUP, params_bind_group, &[]);
        pass.set_bind_group(BUFFERS_GROUP, output_bind_group, &[]);

        let groups = placement_workgroups(side);
        pass.dispatch_workgroups(groups, groups, 1);
    }
}
