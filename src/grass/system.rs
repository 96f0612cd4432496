//! Grass field orchestrator.
//!
//! Two states: `Clean` (mesh and buffers valid) and `Dirty(reason)`. A dirty
//! frame rebuilds the blade mesh, reallocates the instance buffers when the
//! capacity changed, reruns placement and only then returns to `Clean` with
//! a snapshot of the camera pose. Culling and the draw run every frame,
//! dirty or not, so visibility always follows the current camera.

use crate::core::camera::{Camera, CameraPose};
use crate::core::error::Error;
use crate::core::types::{Result, Vec3};
use crate::grass::config::{GrassConfig, PlacementGridConfig, RenderConfig, ShapeParameters};
use crate::grass::mesh::{BladeMesh, BladeMeshBuilder};
use crate::grass::params::{CullParams, IndirectDrawArgs, PlacementParams};
use crate::math::Aabb;
use crate::render::backend::{DrawRequest, GrassBackend};
use crate::terrain::Heightmap;

/// What invalidated the cached mesh/buffers/placement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirtyReason {
    FirstActivation,
    ShapeChanged,
    PlacementChanged,
    CameraMoved,
    TerrainChanged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemState {
    Clean,
    Dirty(DirtyReason),
}

/// What one call to [`GrassSystem::frame`] did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Mesh rebuilt and placement rerun
    pub rebuilt: bool,
    /// Instance buffers released and allocated again
    pub reallocated: bool,
    pub culled: bool,
    /// Colour draw issued; false for shadows-only fields
    pub drew: bool,
    /// Field bounds touch the biased view frustum
    pub in_view: bool,
    /// Shadow casters published to the frame
    pub shadow_casters: bool,
    /// Missing precondition that suppressed the draw
    pub skipped: Option<&'static str>,
}

impl FrameReport {
    fn skipped(what: &'static str) -> Self {
        Self {
            skipped: Some(what),
            ..Default::default()
        }
    }
}

pub struct GrassSystem<B: GrassBackend> {
    backend: B,
    config: GrassConfig,
    terrain: Option<Heightmap>,
    state: SystemState,
    mesh: Option<BladeMesh>,
    camera_pose: Option<CameraPose>,
    /// Capacity whose allocation failed; not retried until the grid changes
    failed_capacity: Option<u32>,
}

impl<B: GrassBackend> GrassSystem<B> {
    pub fn new(backend: B, config: GrassConfig) -> Self {
        Self {
            backend,
            config: config.clamped(),
            terrain: None,
            state: SystemState::Dirty(DirtyReason::FirstActivation),
            mesh: None,
            camera_pose: None,
            failed_capacity: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &GrassConfig {
        &self.config
    }

    pub fn state(&self) -> SystemState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self.state, SystemState::Dirty(_))
    }

    /// Host copy of the blade currently uploaded
    pub fn mesh(&self) -> Option<&BladeMesh> {
        self.mesh.as_ref()
    }

    pub fn terrain(&self) -> Option<&Heightmap> {
        self.terrain.as_ref()
    }

    /// Invalidate cached state. An existing reason is kept.
    pub fn mark_dirty(&mut self, reason: DirtyReason) {
        if self.state == SystemState::Clean {
            log::debug!("Grass marked dirty: {:?}", reason);
            self.state = SystemState::Dirty(reason);
        }
    }

    pub fn set_shape(&mut self, shape: ShapeParameters) {
        let shape = shape.clamped();
        if shape != self.config.shape {
            self.config.shape = shape;
            self.mark_dirty(DirtyReason::ShapeChanged);
        }
    }

    pub fn set_placement(&mut self, placement: PlacementGridConfig) {
        let placement = placement.clamped();
        if placement != self.config.placement {
            self.config.placement = placement;
            self.failed_capacity = None;
            self.mark_dirty(DirtyReason::PlacementChanged);
        }
    }

    /// Render settings apply from the next frame without a rebuild.
    pub fn set_render(&mut self, render: RenderConfig) {
        self.config.render = render.clamped();
    }

    pub fn set_config(&mut self, config: GrassConfig) {
        self.set_shape(config.shape);
        self.set_placement(config.placement);
        self.set_render(config.render);
    }

    pub fn set_terrain(&mut self, terrain: Heightmap) {
        if self.terrain.as_ref() != Some(&terrain) {
            self.terrain = Some(terrain);
            self.mark_dirty(DirtyReason::TerrainChanged);
        }
    }

    pub fn clear_terrain(&mut self) {
        if self.terrain.take().is_some() {
            self.mark_dirty(DirtyReason::TerrainChanged);
        }
    }

    /// World bounds of the whole field: the tile footprint around the grid
    /// origin, twice the terrain's vertical range tall.
    pub fn field_bounds(&self) -> Option<Aabb> {
        let terrain = self.terrain.as_ref()?;
        let grid = &self.config.placement;

        let half_tile = grid.tile_size as f32 * 0.5;
        let vertical = terrain.size().y;
        let center = Vec3::new(grid.origin[0], terrain.origin().y + vertical * 0.5, grid.origin[1]);
        Some(Aabb::from_center_half_extent(center, Vec3::new(half_tile, vertical, half_tile)))
    }

    /// Run one frame: rebuild if dirty, then cull and draw.
    ///
    /// Missing terrain, camera, mesh or buffers skip the draw and are
    /// reported, not returned as errors. An allocation failure is returned
    /// once and then skipped until the placement grid changes.
    pub fn frame(&mut self, frame: &mut B::Frame, camera: Option<&Camera>) -> Result<FrameReport> {
        let Some(camera) = camera else {
            return Ok(self.skip("camera"));
        };
        if self.terrain.is_none() {
            return Ok(self.skip("terrain"));
        }

        if self.state == SystemState::Clean && self.camera_pose != Some(camera.pose()) {
            self.mark_dirty(DirtyReason::CameraMoved);
        }

        let mut report = FrameReport::default();
        if let SystemState::Dirty(reason) = self.state {
            let capacity = self.config.placement.capacity();
            if self.failed_capacity == Some(capacity) {
                return Ok(self.skip("instance buffers"));
            }
            report = self.rebuild(frame, camera, reason)?;
        }

        let capacity = self.backend.capacity();
        let Some(index_count) = self.mesh.as_ref().map(BladeMesh::index_count) else {
            return Ok(self.skip("blade mesh"));
        };
        if !self.backend.has_mesh() {
            return Ok(self.skip("blade mesh"));
        }
        if capacity == 0 {
            return Ok(self.skip("instance buffers"));
        }

        let render = self.config.render;
        let frustum = camera.frustum().biased(render.culling_radius);
        match self.backend.cull(frame, &CullParams::new(frustum.to_gpu_planes(), capacity)) {
            Err(Error::MissingResource(what)) => return Ok(self.skip(what)),
            result => result?,
        }
        report.culled = true;

        if self.is_dirty() {
            self.state = SystemState::Clean;
            self.camera_pose = Some(camera.pose());
        }

        let Some(bounds) = self.field_bounds() else {
            return Ok(self.skip("terrain"));
        };
        let request = DrawRequest {
            camera,
            args: IndirectDrawArgs::staged(index_count, capacity),
            bounds,
            cast_shadows: render.cast_shadows,
            receive_shadows: render.receive_shadows,
        };
        match self.backend.draw(frame, &request) {
            Err(Error::MissingResource(what)) => return Ok(self.skip(what)),
            result => result?,
        }
        report.drew = request.draws_colour();
        report.shadow_casters = request.shadow_casters().is_some();
        // Informational only: an empty view still issues the draw with zero instances
        report.in_view = frustum.intersects_aabb(&bounds);

        Ok(report)
    }

    /// Mesh, buffers, placement; the dirty flag is cleared by the caller
    /// once the first cull has run.
    fn rebuild(&mut self, frame: &mut B::Frame, camera: &Camera, reason: DirtyReason) -> Result<FrameReport> {
        let mut report = FrameReport {
            rebuilt: true,
            ..Default::default()
        };

        let mesh = BladeMeshBuilder::build(&self.config.shape);
        self.backend.upload_mesh(&mesh)?;
        self.mesh = Some(mesh);

        let capacity = self.config.placement.capacity();
        if self.backend.capacity() != capacity {
            if let Err(e) = self.backend.allocate(capacity) {
                log::error!("Grass buffer allocation failed for {} instances: {}", capacity, e);
                self.failed_capacity = Some(capacity);
                return Err(e);
            }
            report.reallocated = true;
        }

        let terrain = self.terrain.as_ref().ok_or(Error::MissingResource("terrain"))?;
        let params = PlacementParams::new(&self.config.placement, terrain, camera.position);
        self.backend.place(frame, &params, terrain)?;

        log::info!(
            "Grass rebuilt ({:?}): {} instances, {} indices per blade",
            reason,
            capacity,
            self.mesh.as_ref().map_or(0, BladeMesh::index_count)
        );
        Ok(report)
    }

    fn skip(&self, what: &'static str) -> FrameReport {
        log::debug!("Grass draw skipped: no {}", what);
        FrameReport::skipped(what)
    }

    /// Release buffers and the mesh; the next frame starts from scratch.
    pub fn teardown(&mut self) {
        self.backend.release();
        self.backend.destroy_mesh();
        self.mesh = None;
        self.camera_pose = None;
        self.state = SystemState::Dirty(DirtyReason::FirstActivation);
        log::debug!("Grass system torn down");
    }
}

impl<B: GrassBackend> Drop for GrassSystem<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grass::config::ShadowCastingMode;
    use crate::render::cpu::{CpuFrame, CpuGrassBackend, FrameCommand};

    fn terrain() -> Heightmap {
        Heightmap::flat(Vec3::new(-50.0, 0.0, -50.0), Vec3::new(100.0, 4.0, 100.0), 0.0)
    }

    fn camera() -> Camera {
        Camera::look_at(Vec3::new(0.0, 3.0, 3.0), Vec3::ZERO, Vec3::Y)
    }

    fn system() -> GrassSystem<CpuGrassBackend> {
        let mut system = GrassSystem::new(CpuGrassBackend::new(), GrassConfig::default());
        system.set_terrain(terrain());
        system
    }

    fn run(system: &mut GrassSystem<CpuGrassBackend>, camera: &Camera) -> (FrameReport, CpuFrame) {
        let mut frame = CpuFrame::new();
        let report = system.frame(&mut frame, Some(camera)).unwrap();
        (report, frame)
    }

    fn placed(frame: &CpuFrame) -> bool {
        frame.commands.iter().any(|c| matches!(c, FrameCommand::Place { .. }))
    }

    #[test]
    fn test_first_activation_rebuilds_everything() {
        let mut system = system();
        assert_eq!(system.state(), SystemState::Dirty(DirtyReason::FirstActivation));

        let (report, frame) = run(&mut system, &camera());
        assert!(report.rebuilt && report.reallocated && report.culled && report.drew);
        assert!(report.in_view && !report.shadow_casters);
        assert_eq!(report.skipped, None);
        assert_eq!(system.state(), SystemState::Clean);

        assert_eq!(system.backend().capacity(), 100);
        assert_eq!(system.backend().raw().unwrap().counter(), 100);
        assert_eq!(frame.draws().len(), 1);
    }

    #[test]
    fn test_pass_order() {
        let mut system = system();
        let (_, frame) = run(&mut system, &camera());
        let kinds: Vec<&'static str> = frame
            .commands
            .iter()
            .map(|c| match c {
                FrameCommand::ResetCounter(_) => "reset",
                FrameCommand::Place { .. } => "place",
                FrameCommand::Cull { .. } => "cull",
                FrameCommand::WriteArgs(_) => "write",
                FrameCommand::CopyCount(_) => "copy",
                FrameCommand::ShadowCasters(_) => "shadow",
                FrameCommand::Draw(_) => "draw",
            })
            .collect();
        assert_eq!(kinds, vec!["reset", "place", "reset", "cull", "write", "copy", "draw"]);
    }

    #[test]
    fn test_clean_frame_only_culls_and_draws() {
        let mut system = system();
        let camera = camera();
        run(&mut system, &camera);

        let (report, frame) = run(&mut system, &camera);
        assert!(!report.rebuilt && !report.reallocated);
        assert!(report.culled && report.drew);
        assert!(!placed(&frame));
        assert_eq!(frame.draws().len(), 1);
    }

    #[test]
    fn test_camera_move_replaces_without_reallocating() {
        let mut system = system();
        let mut camera = camera();
        run(&mut system, &camera);

        camera.position.x += 0.5;
        let (report, frame) = run(&mut system, &camera);
        assert!(report.rebuilt && !report.reallocated);
        assert!(placed(&frame));
        assert_eq!(system.state(), SystemState::Clean);
    }

    #[test]
    fn test_camera_turn_counts_as_move() {
        let mut system = system();
        let mut camera = camera();
        run(&mut system, &camera);

        camera.set_rotation_euler(0.3, -0.4);
        let (report, _) = run(&mut system, &camera);
        assert!(report.rebuilt);
    }

    #[test]
    fn test_shape_change_rebuilds_mesh() {
        let mut system = system();
        let camera = camera();
        run(&mut system, &camera);
        assert_eq!(system.backend().mesh_index_count(), Some(15));

        system.set_shape(ShapeParameters {
            segments: 3,
            ..Default::default()
        });
        assert_eq!(system.state(), SystemState::Dirty(DirtyReason::ShapeChanged));

        let (report, frame) = run(&mut system, &camera);
        assert!(report.rebuilt && !report.reallocated);
        assert_eq!(system.backend().mesh_index_count(), Some(9));
        assert_eq!(frame.draws()[0].index_count, 9);
    }

    #[test]
    fn test_unchanged_setters_stay_clean() {
        let mut system = system();
        run(&mut system, &camera());

        system.set_shape(ShapeParameters::default());
        system.set_placement(PlacementGridConfig::default());
        system.set_terrain(terrain());
        system.set_render(RenderConfig {
            culling_radius: 1.0,
            ..Default::default()
        });
        assert_eq!(system.state(), SystemState::Clean);
        assert_eq!(system.config().render.culling_radius, 1.0);
    }

    #[test]
    fn test_density_change_reallocates() {
        let mut system = system();
        let camera = camera();
        run(&mut system, &camera);

        system.set_placement(PlacementGridConfig {
            density: 20,
            ..Default::default()
        });
        let (report, _) = run(&mut system, &camera);
        assert!(report.reallocated);
        assert_eq!(system.backend().capacity(), 400);
        assert_eq!(system.backend().raw().unwrap().counter(), 400);
    }

    #[test]
    fn test_missing_terrain_skips_draw() {
        let mut system = GrassSystem::new(CpuGrassBackend::new(), GrassConfig::default());
        let (report, frame) = run(&mut system, &camera());
        assert_eq!(report.skipped, Some("terrain"));
        assert!(!report.drew);
        assert!(frame.commands.is_empty());
        assert!(system.is_dirty());

        system.set_terrain(terrain());
        let (report, _) = run(&mut system, &camera());
        assert!(report.drew);
    }

    #[test]
    fn test_clearing_terrain_marks_dirty() {
        let mut system = system();
        run(&mut system, &camera());
        system.clear_terrain();
        assert_eq!(system.state(), SystemState::Dirty(DirtyReason::TerrainChanged));
        let (report, _) = run(&mut system, &camera());
        assert_eq!(report.skipped, Some("terrain"));
    }

    #[test]
    fn test_missing_camera_skips_draw() {
        let mut system = system();
        let mut frame = CpuFrame::new();
        let report = system.frame(&mut frame, None).unwrap();
        assert_eq!(report.skipped, Some("camera"));
        assert!(frame.commands.is_empty());
    }

    #[test]
    fn test_teardown_releases_and_reactivates() {
        let mut system = system();
        let camera = camera();
        run(&mut system, &camera);

        system.teardown();
        system.teardown();
        assert_eq!(system.backend().capacity(), 0);
        assert!(!system.backend().has_mesh());
        assert!(system.mesh().is_none());
        assert_eq!(system.state(), SystemState::Dirty(DirtyReason::FirstActivation));

        let (report, _) = run(&mut system, &camera);
        assert!(report.rebuilt && report.reallocated && report.drew);
    }

    #[test]
    fn test_allocation_failure_is_not_retried() {
        let mut system = GrassSystem::new(CpuGrassBackend::with_capacity_limit(50), GrassConfig::default());
        system.set_terrain(terrain());
        let camera = camera();

        let err = system.frame(&mut CpuFrame::new(), Some(&camera)).unwrap_err();
        assert!(matches!(err, Error::AllocationFailure { .. }));

        let (report, frame) = run(&mut system, &camera);
        assert_eq!(report.skipped, Some("instance buffers"));
        assert!(frame.commands.is_empty());

        system.set_placement(PlacementGridConfig {
            density: 5,
            ..Default::default()
        });
        let (report, _) = run(&mut system, &camera);
        assert!(report.drew);
        assert_eq!(system.backend().capacity(), 25);
    }

    #[test]
    fn test_field_out_of_view_still_draws() {
        let mut system = system();
        let away = Camera::look_at(Vec3::new(0.0, 1.0, 500.0), Vec3::new(0.0, 1.0, 600.0), Vec3::Y);
        let (report, frame) = run(&mut system, &away);

        assert!(report.drew);
        assert!(!report.in_view);
        assert_eq!(system.backend().raw().unwrap().counter(), 100);
        assert_eq!(frame.draws()[0].instance_count, 0);
        assert_eq!(system.backend().args().unwrap().instance_count, 0);
    }

    #[test]
    fn test_draw_count_is_visible_not_capacity() {
        let mut system = GrassSystem::new(
            CpuGrassBackend::new(),
            GrassConfig {
                placement: PlacementGridConfig {
                    tile_size: 10,
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        system.set_terrain(terrain());
        let camera = Camera::look_at(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 2.0, -1.0), Vec3::Y);
        let (_, frame) = run(&mut system, &camera);

        let args = frame.draws()[0];
        let visible = system.backend().visible().unwrap().counter();
        assert_eq!(args.instance_count, visible);
        assert!(visible > 0 && visible < system.backend().capacity());
    }

    #[test]
    fn test_shadow_casters_carry_field_bounds() {
        let mut system = system();
        let camera = camera();
        system.set_render(RenderConfig {
            cast_shadows: ShadowCastingMode::TwoSided,
            ..Default::default()
        });

        let (report, frame) = run(&mut system, &camera);
        assert!(report.drew && report.shadow_casters);
        let casters = frame.shadow_casters().unwrap();
        assert_eq!(casters.bounds, system.field_bounds().unwrap());
        assert!(casters.two_sided);
        assert_eq!(frame.draws().len(), 1);
    }

    #[test]
    fn test_shadows_only_suppresses_colour_draw() {
        let mut system = system();
        let camera = camera();
        system.set_render(RenderConfig {
            cast_shadows: ShadowCastingMode::ShadowsOnly,
            ..Default::default()
        });

        let (report, frame) = run(&mut system, &camera);
        assert!(report.culled && report.shadow_casters);
        assert!(!report.drew);
        assert!(frame.draws().is_empty());
        assert!(!frame.shadow_casters().unwrap().two_sided);
        // Args still hold the visible count for the shadow replay
        let visible = system.backend().visible().unwrap().counter();
        assert_eq!(system.backend().args().unwrap().instance_count, visible);
    }

    #[test]
    fn test_field_bounds() {
        let mut system = GrassSystem::new(
            CpuGrassBackend::new(),
            GrassConfig {
                placement: PlacementGridConfig {
                    tile_size: 4,
                    origin: [10.0, -2.0],
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        assert!(system.field_bounds().is_none());

        system.set_terrain(terrain());
        let bounds = system.field_bounds().unwrap();
        assert_eq!(bounds.min, Vec3::new(8.0, -2.0, -4.0));
        assert_eq!(bounds.max, Vec3::new(12.0, 6.0, 0.0));
    }
}
