//! Visibility compute pipeline: compacts in-frustum records

use crate::grass::params::{cull_workgroups, CullParams};
use crate::render::bindings::{BindingTable, BUFFERS_GROUP, PARAMS_GROUP};
use crate::render::buffer::CounterBuffer;

/// Dispatches grass_cull.wgsl over the raw buffer
pub struct CullPipeline {
    pipeline: wgpu::ComputePipeline,
    params_buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,
}

impl CullPipeline {
    pub fn new(device: &wgpu::Device, bindings: &BindingTable) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grass_cull_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/grass_cull.wgsl").into()),
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_cull_params"),
            size: std::mem::size_of::<CullParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_cull_params_bind_group"),
            layout: &bindings.cull_params,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grass_cull_pipeline_layout"),
            bind_group_layouts: &[&bindings.cull_params, &bindings.cull_buffers],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("grass_cull_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            params_buffer,
            params_bind_group,
        }
    }

    /// Bind group reading the raw buffer and appending into the visible one
    pub fn create_buffers_bind_group(
        device: &wgpu::Device,
        bindings: &BindingTable,
        raw: &CounterBuffer,
        visible: &CounterBuffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_cull_buffers_bind_group"),
            layout: &bindings.cull_buffers,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: raw.records().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: raw.counter().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: visible.records().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: visible.counter().as_entire_binding(),
                },
            ],
        })
    }

    pub fn update_params(&self, queue: &wgpu::Queue, params: &CullParams) {
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(params));
    }

    /// Reset the visible counter and dispatch one thread per raw record.
    pub fn dispatch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        buffers_bind_group: &wgpu::BindGroup,
        visible: &CounterBuffer,
        capacity: u32,
    ) {
        visible.reset_counter(encoder);

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("grass_cull_pass"),
            timestamp_writes: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(PARAMS_GROUP, &self.params_bind_group, &[]);
        pass.set_bind_group(BUFFERS_GROUP, buffers_bind_group, &[]);
        pass.dispatch_workgroups(cull_workgroups(capacity), 1, 1);
    }
}
