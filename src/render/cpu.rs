//! Host reference backend.
//!
//! Executes the placement, cull and draw contracts of the WGSL kernels in
//! memory: the same counter resets, the same append semantics and the same
//! args staging followed by a count copy. Every command is logged into the
//! frame so callers can check ordering as well as results.

use rayon::prelude::*;

use crate::core::error::Error;
use crate::core::types::{Quat, Result, Vec2, Vec3};
use crate::grass::mesh::BladeMesh;
use crate::grass::params::{
    cull_workgroups, placement_workgroups, CullParams, IndirectDrawArgs, InstanceRecord, PlacementParams,
};
use crate::render::backend::{DrawRequest, GrassBackend, ShadowCasters};
use crate::render::buffer::instance_buffers::max_records;
use crate::render::culling;
use crate::terrain::Heightmap;

/// Integer hash shared with grass_place.wgsl
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747796405).wrapping_add(2891336453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277803737);
    (word >> 22) ^ word
}

/// Hash mapped to [0, 1]
pub fn hash01(v: u32) -> f32 {
    pcg_hash(v) as f32 / 4294967295.0
}

/// Placement of grid cell (x, z), as computed by one placement thread.
pub fn place_cell(params: &PlacementParams, terrain: &Heightmap, x: u32, z: u32) -> InstanceRecord {
    let cell = z.wrapping_mul(params.side).wrapping_add(x);
    let spacing = 1.0 / params.density;
    let half_tile = params.side as f32 / params.density * 0.5;

    let local = (Vec2::new(x as f32, z as f32) + 0.5) * spacing - half_tile;
    let jitter = (Vec2::new(hash01(cell.wrapping_mul(3)), hash01(cell.wrapping_mul(3).wrapping_add(1))) - 0.5)
        * params.randomize_position
        * spacing;
    let xz = Vec2::from_array(params.grid_origin) + local + jitter;

    let position = Vec3::new(xz.x, terrain.height_at(xz.x, xz.y), xz.y);
    let yaw = hash01(cell.wrapping_mul(3).wrapping_add(2)) * params.randomize_rotation.to_radians();

    let factor = if params.far_distance > 0.0 {
        let camera = Vec3::from_array(params.camera_position);
        1.0 - (camera.distance(position) / params.far_distance).clamp(0.0, 1.0)
    } else {
        1.0
    };

    InstanceRecord::new(position, Quat::from_rotation_y(yaw), factor)
}

/// Which counter a reset targeted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CounterKind {
    Raw,
    Visible,
}

/// One recorded step, in submission order
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameCommand {
    ResetCounter(CounterKind),
    Place { workgroups: u32 },
    Cull { workgroups: u32 },
    /// Staged args written before the count copy
    WriteArgs(IndirectDrawArgs),
    /// Visible count copied over the instance-count word
    CopyCount(u32),
    /// Field published to the host's shadow pass
    ShadowCasters(ShadowCasters),
    /// Indirect draw with the args as they stood when it was issued
    Draw(IndirectDrawArgs),
}

/// Command log for one frame
#[derive(Debug, Default)]
pub struct CpuFrame {
    pub commands: Vec<FrameCommand>,
}

impl CpuFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Args of every draw issued this frame
    pub fn draws(&self) -> Vec<IndirectDrawArgs> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                FrameCommand::Draw(args) => Some(*args),
                _ => None,
            })
            .collect()
    }

    /// Shadow casters published this frame, if any
    pub fn shadow_casters(&self) -> Option<ShadowCasters> {
        self.commands.iter().find_map(|c| match c {
            FrameCommand::ShadowCasters(casters) => Some(*casters),
            _ => None,
        })
    }
}

/// In-memory counter-bearing buffer
#[derive(Debug)]
pub struct HostCounterBuffer {
    records: Vec<InstanceRecord>,
    counter: u32,
}

impl HostCounterBuffer {
    fn new(capacity: u32) -> Self {
        Self {
            records: vec![InstanceRecord::default(); capacity as usize],
            counter: 0,
        }
    }

    pub fn reset_counter(&mut self) {
        self.counter = 0;
    }

    /// Append at the counter slot. Returns the slot, or `None` when full.
    pub fn append(&mut self, record: InstanceRecord) -> Option<u32> {
        let slot = self.counter;
        let entry = self.records.get_mut(slot as usize)?;
        *entry = record;
        self.counter += 1;
        Some(slot)
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn capacity(&self) -> u32 {
        self.records.len() as u32
    }

    /// Records below the counter
    pub fn live(&self) -> &[InstanceRecord] {
        &self.records[..self.counter as usize]
    }
}

struct HostBuffers {
    raw: HostCounterBuffer,
    visible: HostCounterBuffer,
    args: IndirectDrawArgs,
}

pub struct CpuGrassBackend {
    mesh_index_count: Option<u32>,
    buffers: Option<HostBuffers>,
    capacity_limit: u32,
}

impl CpuGrassBackend {
    /// Backend bounded like a device with wgpu's default limits
    pub fn new() -> Self {
        Self::with_limits(&wgpu::Limits::default())
    }

    /// Backend that refuses what a device with `limits` could not store or cull
    pub fn with_limits(limits: &wgpu::Limits) -> Self {
        Self::with_capacity_limit(max_records(limits))
    }

    /// Backend that refuses allocations above `limit` records
    pub fn with_capacity_limit(limit: u32) -> Self {
        Self {
            mesh_index_count: None,
            buffers: None,
            capacity_limit: limit,
        }
    }

    pub fn mesh_index_count(&self) -> Option<u32> {
        self.mesh_index_count
    }

    pub fn raw(&self) -> Option<&HostCounterBuffer> {
        self.buffers.as_ref().map(|b| &b.raw)
    }

    pub fn visible(&self) -> Option<&HostCounterBuffer> {
        self.buffers.as_ref().map(|b| &b.visible)
    }

    /// Contents of the args buffer after the last draw
    pub fn args(&self) -> Option<IndirectDrawArgs> {
        self.buffers.as_ref().map(|b| b.args)
    }

    fn buffers_mut(&mut self) -> Result<&mut HostBuffers> {
        self.buffers.as_mut().ok_or(Error::MissingResource("instance buffers"))
    }
}

impl Default for CpuGrassBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GrassBackend for CpuGrassBackend {
    type Frame = CpuFrame;

    fn upload_mesh(&mut self, mesh: &BladeMesh) -> Result<()> {
        self.mesh_index_count = Some(mesh.index_count());
        Ok(())
    }

    fn destroy_mesh(&mut self) {
        self.mesh_index_count = None;
    }

    fn has_mesh(&self) -> bool {
        self.mesh_index_count.is_some()
    }

    fn allocate(&mut self, capacity: u32) -> Result<()> {
        self.release();

        if capacity == 0 || capacity > self.capacity_limit {
            return Err(Error::AllocationFailure {
                requested: capacity as u64 * InstanceRecord::STRIDE,
                limit: self.capacity_limit as u64 * InstanceRecord::STRIDE,
            });
        }

        self.buffers = Some(HostBuffers {
            raw: HostCounterBuffer::new(capacity),
            visible: HostCounterBuffer::new(capacity),
            args: IndirectDrawArgs::default(),
        });
        Ok(())
    }

    fn release(&mut self) {
        self.buffers = None;
    }

    fn capacity(&self) -> u32 {
        self.buffers.as_ref().map_or(0, |b| b.raw.capacity())
    }

    fn place(&mut self, frame: &mut CpuFrame, params: &PlacementParams, terrain: &Heightmap) -> Result<()> {
        let buffers = self.buffers_mut()?;
        buffers.raw.reset_counter();
        frame.commands.push(FrameCommand::ResetCounter(CounterKind::Raw));

        let side = params.side;
        let placed: Vec<InstanceRecord> = (0..side.saturating_mul(side))
            .into_par_iter()
            .map(|cell| place_cell(params, terrain, cell % side, cell / side))
            .collect();

        for record in placed {
            if buffers.raw.append(record).is_none() {
                log::warn!("Raw grass buffer full at {} records", buffers.raw.capacity());
                break;
            }
        }

        frame.commands.push(FrameCommand::Place {
            workgroups: placement_workgroups(side),
        });
        Ok(())
    }

    fn cull(&mut self, frame: &mut CpuFrame, params: &CullParams) -> Result<()> {
        let buffers = self.buffers_mut()?;
        buffers.visible.reset_counter();
        frame.commands.push(FrameCommand::ResetCounter(CounterKind::Visible));

        let raw = buffers.raw.live();
        let candidates = &raw[..raw.len().min(params.capacity as usize)];
        for record in culling::visible_records(&params.planes, candidates) {
            if buffers.visible.append(*record).is_none() {
                break;
            }
        }

        frame.commands.push(FrameCommand::Cull {
            workgroups: cull_workgroups(params.capacity),
        });
        Ok(())
    }

    fn draw(&mut self, frame: &mut CpuFrame, request: &DrawRequest<'_>) -> Result<()> {
        if self.mesh_index_count.is_none() {
            return Err(Error::MissingResource("blade mesh"));
        }
        let buffers = self.buffers_mut()?;

        buffers.args = request.args;
        frame.commands.push(FrameCommand::WriteArgs(request.args));

        let count = buffers.visible.counter();
        buffers.args.instance_count = count;
        frame.commands.push(FrameCommand::CopyCount(count));

        if let Some(casters) = request.shadow_casters() {
            frame.commands.push(FrameCommand::ShadowCasters(casters));
        }
        if request.draws_colour() {
            frame.commands.push(FrameCommand::Draw(buffers.args));
        }
        Ok(())
    }
}
