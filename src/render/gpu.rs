//! wgpu execution of the grass passes.
//!
//! Everything for one frame is recorded into the [`GpuFrame`] encoder in
//! call order: raw counter reset, placement, visible counter reset, cull,
//! count copy, draw. Uniform and args writes go through the queue and land
//! before the encoder's commands once the frame is submitted.
//!
//! With shadow casting on, the frame also carries a [`ShadowCasters`]
//! record; the host's shadow pass replays the same indirect draw through
//! [`WgpuGrassBackend::draw_shadow_casters`].

use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::grass::mesh::BladeMesh;
use crate::grass::params::{CullParams, PlacementParams};
use crate::render::backend::{DrawRequest, GrassBackend, ShadowCasters};
use crate::render::bindings::BindingTable;
use crate::render::buffer::{CameraBuffer, CameraUniform, InstanceBufferSet};
use crate::render::buffer::camera_buffer::DEFAULT_SUN_DIRECTION;
use crate::render::pipeline::{
    BladeDraw, BladeMeshBuffers, BladePipeline, CullPipeline, HeightmapTexture, PlacementPipeline,
};
use crate::terrain::Heightmap;

/// Command encoder plus the attachments the blade pass draws into
pub struct GpuFrame {
    pub encoder: wgpu::CommandEncoder,
    pub target: wgpu::TextureView,
    pub depth: wgpu::TextureView,
    /// Set by the grass draw when the field casts shadows
    pub shadow_casters: Option<ShadowCasters>,
}

impl GpuFrame {
    pub fn new(device: &wgpu::Device, target: wgpu::TextureView, depth: wgpu::TextureView) -> Self {
        let encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("grass_frame_encoder"),
        });
        Self {
            encoder,
            target,
            depth,
            shadow_casters: None,
        }
    }

    /// Clear color and depth; the blade pass loads both.
    pub fn clear(&mut self, color: wgpu::Color) {
        let _pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("grass_clear_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    pub fn finish(self) -> wgpu::CommandBuffer {
        self.encoder.finish()
    }
}

/// Heightmap currently resident on the GPU and the bind group that reads it
struct TerrainBinding {
    source: Heightmap,
    _texture: HeightmapTexture,
    params_bind_group: wgpu::BindGroup,
}

/// Bind groups that reference the instance buffers; rebuilt on reallocation
struct BufferBindGroups {
    place_output: wgpu::BindGroup,
    cull_buffers: wgpu::BindGroup,
}

pub struct WgpuGrassBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    bindings: BindingTable,
    camera: CameraBuffer,
    placement: PlacementPipeline,
    cull: CullPipeline,
    blade: BladePipeline,
    buffers: InstanceBufferSet,
    bind_groups: Option<BufferBindGroups>,
    mesh: Option<BladeMeshBuffers>,
    terrain: Option<TerrainBinding>,
    sun_direction: Vec3,
}

impl WgpuGrassBackend {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, color_format: wgpu::TextureFormat) -> Self {
        let bindings = BindingTable::new(device);
        let camera = CameraBuffer::new(device, &bindings.camera);
        let placement = PlacementPipeline::new(device, &bindings);
        let cull = CullPipeline::new(device, &bindings);
        let blade = BladePipeline::new(device, &bindings, color_format);

        log::info!("Grass pipelines created (target {:?})", color_format);

        Self {
            device: device.clone(),
            queue: queue.clone(),
            bindings,
            camera,
            placement,
            cull,
            blade,
            buffers: InstanceBufferSet::new(&device.limits()),
            bind_groups: None,
            mesh: None,
            terrain: None,
            sun_direction: DEFAULT_SUN_DIRECTION,
        }
    }

    pub fn set_sun_direction(&mut self, direction: Vec3) {
        self.sun_direction = direction;
    }

    /// Begin recording a frame that renders into `target`
    pub fn begin_frame(&self, target: wgpu::TextureView, depth: wgpu::TextureView) -> GpuFrame {
        GpuFrame::new(&self.device, target, depth)
    }

    pub fn submit(&self, frame: GpuFrame) {
        self.queue.submit(std::iter::once(frame.finish()));
    }

    /// Replay this frame's indirect draw into a host shadow pass.
    ///
    /// The pass must already have a depth-only pipeline built from
    /// [`BladePipeline::vertex_layouts`] and its own bind groups set. Call
    /// after the grass draw so the args hold the visible count.
    pub fn draw_shadow_casters(&self, pass: &mut wgpu::RenderPass<'_>) -> Result<()> {
        let mesh = self.mesh.as_ref().ok_or(Error::MissingResource("blade mesh"))?;
        let (Some(visible), Some(args)) = (self.buffers.visible(), self.buffers.args()) else {
            return Err(Error::MissingResource("instance buffers"));
        };
        BladePipeline::record_indirect(pass, mesh, visible, args);
        Ok(())
    }

    /// Upload `heightmap` unless the same terrain is already resident
    fn bind_terrain(&mut self, heightmap: &Heightmap) {
        let stale = self.terrain.as_ref().is_none_or(|t| t.source != *heightmap);
        if stale {
            let texture = HeightmapTexture::upload(&self.device, &self.queue, heightmap);
            let params_bind_group = self
                .placement
                .create_params_bind_group(&self.device, &self.bindings, &texture);
            log::debug!("Uploaded {}x{} heightmap", heightmap.resolution(), heightmap.resolution());
            self.terrain = Some(TerrainBinding {
                source: heightmap.clone(),
                _texture: texture,
                params_bind_group,
            });
        }
    }
}

impl GrassBackend for WgpuGrassBackend {
    type Frame = GpuFrame;

    fn upload_mesh(&mut self, mesh: &BladeMesh) -> Result<()> {
        self.destroy_mesh();
        self.mesh = Some(BladeMeshBuffers::upload(&self.device, mesh));
        Ok(())
    }

    fn destroy_mesh(&mut self) {
        if let Some(mesh) = self.mesh.take() {
            mesh.destroy();
        }
    }

    fn has_mesh(&self) -> bool {
        self.mesh.is_some()
    }

    fn allocate(&mut self, capacity: u32) -> Result<()> {
        self.bind_groups = None;
        self.buffers.allocate(&self.device, capacity)?;

        let (raw, visible) = self
            .buffers
            .raw()
            .zip(self.buffers.visible())
            .ok_or(Error::MissingResource("instance buffers"))?;

        self.bind_groups = Some(BufferBindGroups {
            place_output: PlacementPipeline::create_output_bind_group(&self.device, &self.bindings, raw),
            cull_buffers: CullPipeline::create_buffers_bind_group(&self.device, &self.bindings, raw, visible),
        });
        Ok(())
    }

    fn release(&mut self) {
        self.bind_groups = None;
        self.buffers.release();
    }

    fn capacity(&self) -> u32 {
        self.buffers.capacity()
    }

    fn place(&mut self, frame: &mut GpuFrame, params: &PlacementParams, terrain: &Heightmap) -> Result<()> {
        if self.bind_groups.is_none() {
            return Err(Error::MissingResource("instance buffers"));
        }
        self.bind_terrain(terrain);

        let (Some(raw), Some(groups), Some(terrain)) =
            (self.buffers.raw(), self.bind_groups.as_ref(), self.terrain.as_ref())
        else {
            return Err(Error::MissingResource("instance buffers"));
        };

        self.placement.update_params(&self.queue, params);
        self.placement.dispatch(
            &mut frame.encoder,
            &terrain.params_bind_group,
            &groups.place_output,
            raw,
            params.side,
        );
        Ok(())
    }

    fn cull(&mut self, frame: &mut GpuFrame, params: &CullParams) -> Result<()> {
        let (Some(visible), Some(groups)) = (self.buffers.visible(), self.bind_groups.as_ref()) else {
            return Err(Error::MissingResource("instance buffers"));
        };

        self.cull.update_params(&self.queue, params);
        self.cull
            .dispatch(&mut frame.encoder, &groups.cull_buffers, visible, params.capacity);
        Ok(())
    }

    fn draw(&mut self, frame: &mut GpuFrame, request: &DrawRequest<'_>) -> Result<()> {
        let mesh = self.mesh.as_ref().ok_or(Error::MissingResource("blade mesh"))?;
        let (Some(visible), Some(args)) = (self.buffers.visible(), self.buffers.args()) else {
            return Err(Error::MissingResource("instance buffers"));
        };

        let uniform = CameraUniform::new(request.camera, self.sun_direction, request.receive_shadows);
        self.camera.update(&self.queue, &uniform);

        BladePipeline::write_args(&self.queue, args, &request.args);
        BladePipeline::copy_visible_count(&mut frame.encoder, visible, args);

        frame.shadow_casters = request.shadow_casters();
        if !request.draws_colour() {
            return Ok(());
        }

        self.blade.draw(
            &mut frame.encoder,
            &BladeDraw {
                target: &frame.target,
                depth: &frame.depth,
                camera: &self.camera,
                mesh,
                visible,
                args,
            },
        );
        Ok(())
    }
}

impl Drop for WgpuGrassBackend {
    fn drop(&mut self) {
        self.destroy_mesh();
        self.release();
    }
}
