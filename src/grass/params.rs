//! GPU-visible grass structs.
//!
//! Layouts must match the WGSL declarations in `shaders/grass_place.wgsl`,
//! `shaders/grass_cull.wgsl` and `shaders/grass_blade.wgsl`.

use bytemuck::{Pod, Zeroable};

use crate::core::types::{Quat, Vec3};
use crate::grass::config::PlacementGridConfig;
use crate::terrain::Heightmap;

/// Threads per placement workgroup along each grid axis.
pub const PLACEMENT_WORKGROUP_SIZE: u32 = 8;
/// Threads per culling workgroup.
pub const CULL_WORKGROUP_SIZE: u32 = 128;

/// Per-blade placement data (32 bytes).
///
/// Written once by the placement pass; the cull pass copies it verbatim into
/// the visible buffer and the blade shader reads it as instance input.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceRecord {
    pub position: [f32; 3],
    /// Unit quaternion (x, y, z, w)
    pub rotation: [f32; 4],
    /// 1 at the camera, falling to 0 at the far distance
    pub distance_factor: f32,
}

impl InstanceRecord {
    pub const STRIDE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(position: Vec3, rotation: Quat, distance_factor: f32) -> Self {
        Self {
            position: position.to_array(),
            rotation: rotation.to_array(),
            distance_factor,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

/// Indexed indirect draw arguments (20 bytes), laid out as wgpu's
/// `DrawIndexedIndirectArgs`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct IndirectDrawArgs {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

impl IndirectDrawArgs {
    /// Byte offset of `instance_count`, the word overwritten by the
    /// visible-counter copy.
    pub const INSTANCE_COUNT_OFFSET: u64 = 4;
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Staging record written before the count copy. `instance_count` holds
    /// the buffer capacity until the GPU overwrites it.
    pub fn staged(index_count: u32, capacity: u32) -> Self {
        Self {
            index_count,
            instance_count: capacity,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        }
    }
}

/// Placement kernel uniform (64 bytes). Must match `PlaceParams` in
/// grass_place.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PlacementParams {
    pub terrain_origin: [f32; 3],
    pub density: f32,
    // -- 16 bytes --
    pub terrain_size: [f32; 3],
    pub randomize_position: f32,
    // -- 16 bytes --
    pub camera_position: [f32; 3],
    pub far_distance: f32,
    // -- 16 bytes --
    pub grid_origin: [f32; 2],
    pub side: u32,
    pub randomize_rotation: f32,
    // -- 16 bytes --
    // Total: 64 bytes
}

impl PlacementParams {
    pub fn new(grid: &PlacementGridConfig, terrain: &Heightmap, camera_position: Vec3) -> Self {
        // Distance factor reaches zero at the far corner of the terrain
        let far_corner = terrain.origin() + terrain.size();
        Self {
            terrain_origin: terrain.origin().to_array(),
            density: grid.density as f32,
            terrain_size: terrain.size().to_array(),
            randomize_position: grid.randomize_position,
            camera_position: camera_position.to_array(),
            far_distance: camera_position.distance(far_corner),
            grid_origin: grid.origin,
            side: grid.side(),
            randomize_rotation: grid.randomize_rotation,
        }
    }
}

/// Cull kernel uniform (112 bytes). Must match `CullParams` in
/// grass_cull.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct CullParams {
    /// (normal.xyz, distance) with the culling radius already added
    pub planes: [[f32; 4]; 6],
    /// Raw buffer capacity; the kernel also stops at the raw counter
    pub capacity: u32,
    pub _pad: [u32; 3],
    // Total: 112 bytes
}

impl CullParams {
    pub fn new(planes: [[f32; 4]; 6], capacity: u32) -> Self {
        Self {
            planes,
            capacity,
            _pad: [0; 3],
        }
    }
}

/// Workgroups along each axis for a placement grid of `side` cells.
pub fn placement_workgroups(side: u32) -> u32 {
    side.div_ceil(PLACEMENT_WORKGROUP_SIZE)
}

/// Workgroups for culling `capacity` raw records.
pub fn cull_workgroups(capacity: u32) -> u32 {
    capacity.div_ceil(CULL_WORKGROUP_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_record_stride() {
        assert_eq!(InstanceRecord::STRIDE, 32);
        assert_eq!(std::mem::size_of::<InstanceRecord>(), 8 * std::mem::size_of::<f32>());
    }

    #[test]
    fn test_indirect_args_layout() {
        assert_eq!(IndirectDrawArgs::SIZE, 20);
        let args = IndirectDrawArgs::staged(15, 100);
        let words: &[u32] = bytemuck::cast_slice(bytemuck::bytes_of(&args));
        assert_eq!(words, &[15, 100, 0, 0, 0]);
        assert_eq!(words[(IndirectDrawArgs::INSTANCE_COUNT_OFFSET / 4) as usize], 100);
    }

    #[test]
    fn test_uniform_sizes() {
        assert_eq!(std::mem::size_of::<PlacementParams>(), 64);
        assert_eq!(std::mem::size_of::<CullParams>(), 112);
        assert_eq!(std::mem::size_of::<CullParams>() % 16, 0);
    }

    #[test]
    fn test_workgroup_counts() {
        assert_eq!(placement_workgroups(10), 2);
        assert_eq!(placement_workgroups(8), 1);
        assert_eq!(placement_workgroups(1), 1);
        assert_eq!(cull_workgroups(100), 1);
        assert_eq!(cull_workgroups(128), 1);
        assert_eq!(cull_workgroups(129), 2);
        assert_eq!(cull_workgroups(0), 0);
    }
}
