//! Device seam between the grass orchestrator and whatever executes the
//! kernels.

use crate::core::camera::Camera;
use crate::core::types::Result;
use crate::grass::config::ShadowCastingMode;
use crate::grass::mesh::BladeMesh;
use crate::grass::params::{CullParams, IndirectDrawArgs, PlacementParams};
use crate::math::Aabb;
use crate::terrain::Heightmap;

/// Inputs of the single indirect draw issued each frame
#[derive(Clone, Copy, Debug)]
pub struct DrawRequest<'a> {
    pub camera: &'a Camera,
    /// Staged arguments; `instance_count` is the capacity until the visible
    /// counter is copied over it
    pub args: IndirectDrawArgs,
    /// World bounds of the whole field for upstream visibility/shadow culling
    pub bounds: Aabb,
    pub cast_shadows: ShadowCastingMode,
    pub receive_shadows: bool,
}

impl DrawRequest<'_> {
    /// False when the field only casts shadows
    pub fn draws_colour(&self) -> bool {
        self.cast_shadows != ShadowCastingMode::ShadowsOnly
    }

    /// Caster record for the host's shadow pass, `None` when shadows are off
    pub fn shadow_casters(&self) -> Option<ShadowCasters> {
        match self.cast_shadows {
            ShadowCastingMode::Off => None,
            mode => Some(ShadowCasters {
                bounds: self.bounds,
                two_sided: mode == ShadowCastingMode::TwoSided,
            }),
        }
    }
}

/// Field handed to the host's shadow pass. The host tests `bounds` against
/// its light volume and replays the same indirect draw into its shadow map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowCasters {
    pub bounds: Aabb,
    /// Back faces cast as well
    pub two_sided: bool,
}

/// Executes the blade mesh upload, the two compute passes and the draw.
///
/// `place` and `cull` reset their target counter as part of the same call;
/// implementations must never make that reset conditional.
pub trait GrassBackend {
    /// Per-frame recording context (command encoder, targets)
    type Frame;

    fn upload_mesh(&mut self, mesh: &BladeMesh) -> Result<()>;
    fn destroy_mesh(&mut self);
    fn has_mesh(&self) -> bool;

    /// Release existing instance buffers and allocate new ones.
    fn allocate(&mut self, capacity: u32) -> Result<()>;
    /// Idempotent.
    fn release(&mut self);
    /// Allocated record capacity, 0 when nothing is allocated
    fn capacity(&self) -> u32;

    fn place(&mut self, frame: &mut Self::Frame, params: &PlacementParams, terrain: &Heightmap) -> Result<()>;
    fn cull(&mut self, frame: &mut Self::Frame, params: &CullParams) -> Result<()>;
    /// Stage the args and copy the visible count, publish shadow casters,
    /// then issue the colour draw unless the request is shadows-only.
    fn draw(&mut self, frame: &mut Self::Frame, request: &DrawRequest<'_>) -> Result<()>;
}
