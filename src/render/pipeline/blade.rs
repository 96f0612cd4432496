//! Indirect blade renderer: one instanced draw for the whole field

use wgpu::util::DeviceExt;

use crate::grass::mesh::{BladeMesh, BladeVertex};
use crate::grass::params::{IndirectDrawArgs, InstanceRecord};
use crate::render::bindings::{BindingTable, BLADE_VERTEX_SLOT, INSTANCE_VERTEX_SLOT, PARAMS_GROUP};
use crate::render::buffer::{CameraBuffer, CounterBuffer};

/// Depth format the blade pipeline renders against
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Visible records read as per-instance vertex input, locations 4..=6
const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
    4 => Float32x3,
    5 => Float32x4,
    6 => Float32,
];

fn instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: InstanceRecord::STRIDE,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &INSTANCE_ATTRIBUTES,
    }
}

/// Blade geometry uploaded to the GPU
pub struct BladeMeshBuffers {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
}

impl BladeMeshBuffers {
    pub fn upload(device: &wgpu::Device, mesh: &BladeMesh) -> Self {
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grass_blade_vertices"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grass_blade_indices"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self { vertices, indices }
    }

    pub fn destroy(&self) {
        self.vertices.destroy();
        self.indices.destroy();
    }
}

/// Everything one indirect draw touches
pub struct BladeDraw<'a> {
    pub target: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
    pub camera: &'a CameraBuffer,
    pub mesh: &'a BladeMeshBuffers,
    pub visible: &'a CounterBuffer,
    pub args: &'a wgpu::Buffer,
}

pub struct BladePipeline {
    pipeline: wgpu::RenderPipeline,
}

impl BladePipeline {
    /// Blade vertex stream then visible-instance stream. Host shadow
    /// pipelines use the same layouts.
    pub fn vertex_layouts() -> [wgpu::VertexBufferLayout<'static>; 2] {
        [BladeVertex::layout(), instance_layout()]
    }

    pub fn new(device: &wgpu::Device, bindings: &BindingTable, color_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grass_blade_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/grass_blade.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grass_blade_pipeline_layout"),
            bind_group_layouts: &[&bindings.camera],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("grass_blade_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &Self::vertex_layouts(),
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                // Blades are single sheets seen from both sides
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview_mask: None,
            cache: None,
        });

        Self { pipeline }
    }

    /// Upload the staged args record. The instance count it carries is the
    /// buffer capacity; [`Self::copy_visible_count`] replaces it on the GPU.
    pub fn write_args(queue: &wgpu::Queue, args_buffer: &wgpu::Buffer, args: &IndirectDrawArgs) {
        queue.write_buffer(args_buffer, 0, bytemuck::bytes_of(args));
    }

    /// Overwrite only the instance-count word with the visible counter.
    pub fn copy_visible_count(encoder: &mut wgpu::CommandEncoder, visible: &CounterBuffer, args_buffer: &wgpu::Buffer) {
        encoder.copy_buffer_to_buffer(
            visible.counter(),
            0,
            args_buffer,
            IndirectDrawArgs::INSTANCE_COUNT_OFFSET,
            std::mem::size_of::<u32>() as u64,
        );
    }

    /// Record the single instanced indirect draw
    pub fn draw(&self, encoder: &mut wgpu::CommandEncoder, draw: &BladeDraw<'_>) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("grass_blade_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: draw.target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: draw.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(PARAMS_GROUP, draw.camera.bind_group(), &[]);
        Self::record_indirect(&mut pass, draw.mesh, draw.visible, draw.args);
    }

    /// Bind blade geometry and visible instances, then draw from `args`
    pub fn record_indirect(
        pass: &mut wgpu::RenderPass<'_>,
        mesh: &BladeMeshBuffers,
        visible: &CounterBuffer,
        args: &wgpu::Buffer,
    ) {
        pass.set_vertex_buffer(BLADE_VERTEX_SLOT, mesh.vertices.slice(..));
        pass.set_vertex_buffer(INSTANCE_VERTEX_SLOT, visible.records().slice(..));
        pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed_indirect(args, 0);
    }
}
