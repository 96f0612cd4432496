//! Procedural blade mesh.
//!
//! One blade is a strip of quads (two rail vertices per stem level) closed
//! by a single tip triangle. The strip tapers linearly and bends along a
//! horizontal lean axis with a quadratic ease-in above the curvature start.
//!
//! ```text
//!          apex
//!          /  \
//!       L2 ---- R2     level segments-2
//!       |  \    |
//!       L1 ---- R1
//!       |  \    |
//!       L0 ---- R0     level 0
//! ```

use bytemuck::{Pod, Zeroable};

use crate::core::types::Vec3;
use crate::grass::config::ShapeParameters;
use crate::math::Aabb;

/// Blade vertex (48 bytes). Must match the vertex inputs of grass_blade.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BladeVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// Brightness ramp used as ambient occlusion by the shader
    pub color: [f32; 4],
}

impl BladeVertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x4,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Geometry of one blade, shared by every instance.
#[derive(Clone, Debug, PartialEq)]
pub struct BladeMesh {
    pub vertices: Vec<BladeVertex>,
    pub indices: Vec<u32>,
    pub bounds: Aabb,
}

impl BladeMesh {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Builds blade meshes from [`ShapeParameters`].
pub struct BladeMeshBuilder;

impl BladeMeshBuilder {
    /// Build a blade. Deterministic: equal parameters give bit-identical
    /// output. Out-of-range parameters are clamped first.
    pub fn build(params: &ShapeParameters) -> BladeMesh {
        let p = params.clamped();
        let segments = p.segments as usize;
        let levels = segments - 1;

        let top_height = p.height * p.top_triangle_ratio;
        let stem_height = p.height - top_height;
        let stem_step = stem_height / levels as f32;

        let bend_angle = p.bend_direction.to_radians();
        let bend_dir = Vec3::new(bend_angle.sin(), 0.0, bend_angle.cos());

        let normal_left = Vec3::new(-0.1, 0.98, 0.0).normalize().to_array();
        let normal_right = Vec3::new(0.1, 0.98, 0.0).normalize().to_array();

        let mut vertices = Vec::with_capacity(levels * 2 + 1);
        for i in 0..levels {
            let t = i as f32 / levels as f32;
            let width = p.width * (1.0 - (1.0 - p.width_variation) * t);
            let y = i as f32 * stem_step;
            let offset = bend_dir * (bend_amount(&p, t) * p.height);
            let brightness = 0.5 + 0.5 * t;
            let color = [brightness, brightness, brightness, 1.0];

            vertices.push(BladeVertex {
                position: (Vec3::new(-width / 2.0, y, 0.0) + offset).to_array(),
                normal: normal_left,
                uv: [0.0, t],
                color,
            });
            vertices.push(BladeVertex {
                position: (Vec3::new(width / 2.0, y, 0.0) + offset).to_array(),
                normal: normal_right,
                uv: [1.0, t],
                color,
            });
        }

        // The tip takes the full curvature
        let apex_index = vertices.len() as u32;
        vertices.push(BladeVertex {
            position: (Vec3::new(0.0, p.height, 0.0) + bend_dir * (p.curvature * p.height)).to_array(),
            normal: [0.0, 1.0, 0.0],
            uv: [0.5, 1.0],
            color: [1.0; 4],
        });

        let mut indices = Vec::with_capacity(((segments - 2) * 2 + 1) * 3);
        for i in 0..levels - 1 {
            let bottom_left = (i * 2) as u32;
            let bottom_right = bottom_left + 1;
            let top_left = bottom_left + 2;
            let top_right = bottom_left + 3;

            indices.extend_from_slice(&[bottom_left, top_left, bottom_right]);
            indices.extend_from_slice(&[bottom_right, top_left, top_right]);
        }

        let last_left = ((levels - 1) * 2) as u32;
        indices.extend_from_slice(&[last_left, apex_index, last_left + 1]);

        let bounds = Aabb::from_points(vertices.iter().map(|v| Vec3::from_array(v.position)))
            .unwrap_or_default();

        BladeMesh { vertices, indices, bounds }
    }
}

/// Bend factor at stem fraction `t`: zero up to the curvature start, then a
/// quadratic ease-in reaching `curvature` at `t = 1`.
fn bend_amount(p: &ShapeParameters, t: f32) -> f32 {
    if t <= p.curvature_position {
        return 0.0;
    }
    let s = (t - p.curvature_position) / (1.0 - p.curvature_position);
    p.curvature * s * s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn horizontal_offset(v: &BladeVertex, left: bool, width: f32) -> Vec3 {
        let half = if left { -width / 2.0 } else { width / 2.0 };
        Vec3::new(v.position[0] - half, 0.0, v.position[2])
    }

    fn level_width(mesh: &BladeMesh, level: usize) -> f32 {
        mesh.vertices[level * 2 + 1].position[0] - mesh.vertices[level * 2].position[0]
    }

    #[test]
    fn test_vertex_and_triangle_counts() {
        for segments in 3..=5 {
            let mesh = BladeMeshBuilder::build(&ShapeParameters {
                segments,
                ..Default::default()
            });
            let s = segments as usize;
            assert_eq!(mesh.vertices.len(), 2 * s - 1, "segments={segments}");
            assert_eq!(mesh.triangle_count(), 2 * (s - 2) + 1, "segments={segments}");
            assert_eq!(mesh.index_count() as usize, mesh.indices.len());
            assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
        }
    }

    #[test]
    fn test_three_segments_is_one_quad_and_tip() {
        let mesh = BladeMeshBuilder::build(&ShapeParameters {
            segments: 3,
            ..Default::default()
        });
        assert_eq!(mesh.vertices.len(), 5);
        assert_eq!(mesh.indices, vec![0, 2, 1, 1, 2, 3, 2, 4, 3]);
    }

    #[test]
    fn test_scenario_straight_blade() {
        let params = ShapeParameters {
            height: 1.0,
            width: 0.1,
            segments: 4,
            top_triangle_ratio: 0.3,
            curvature: 0.0,
            ..Default::default()
        };
        let mesh = BladeMeshBuilder::build(&params);
        assert_eq!(mesh.vertices.len(), 7);
        assert_eq!(mesh.triangle_count(), 5);

        let stem_step = 0.7 / 3.0;
        for level in 0..3 {
            let left = &mesh.vertices[level * 2];
            let right = &mesh.vertices[level * 2 + 1];
            assert_eq!(left.position[0], -0.05);
            assert_eq!(right.position[0], 0.05);
            assert_eq!(left.position[2], 0.0);
            assert_eq!(right.position[2], 0.0);
            assert!((left.position[1] - level as f32 * stem_step).abs() < 1e-6);
        }
        assert_eq!(mesh.vertices[6].position, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_no_taper_at_unit_variation() {
        let mesh = BladeMeshBuilder::build(&ShapeParameters {
            width_variation: 1.0,
            segments: 5,
            ..Default::default()
        });
        for level in 0..4 {
            assert!((level_width(&mesh, level) - 0.1).abs() < 1e-6);
        }
    }

    #[test]
    fn test_taper_is_monotonic() {
        let mesh = BladeMeshBuilder::build(&ShapeParameters {
            width_variation: 0.5,
            segments: 5,
            ..Default::default()
        });
        for level in 1..4 {
            assert!(level_width(&mesh, level) <= level_width(&mesh, level - 1));
        }
        assert!(level_width(&mesh, 3) < level_width(&mesh, 0));
    }

    #[test]
    fn test_widening_supported() {
        let mesh = BladeMeshBuilder::build(&ShapeParameters {
            width_variation: 1.5,
            ..Default::default()
        });
        assert!(level_width(&mesh, 2) > level_width(&mesh, 0));
    }

    #[test]
    fn test_curvature_profile() {
        let params = ShapeParameters {
            segments: 5,
            curvature: 0.8,
            curvature_position: 0.3,
            bend_direction: 90.0,
            width_variation: 1.0,
            ..Default::default()
        };
        let mesh = BladeMeshBuilder::build(&params);
        let width = params.width;

        let mut previous = 0.0;
        for level in 0..4 {
            let t = level as f32 / 4.0;
            let offset = horizontal_offset(&mesh.vertices[level * 2], true, width).length();
            let right = horizontal_offset(&mesh.vertices[level * 2 + 1], false, width).length();
            assert!((offset - right).abs() < 1e-5);

            if t <= params.curvature_position {
                assert!(offset.abs() < 1e-6, "level {level} should not bend");
            } else {
                assert!(offset > previous, "level {level} should bend more than the one below");
            }
            previous = offset;
        }

        let apex = Vec3::from_array(mesh.vertices[8].position);
        let apex_offset = Vec3::new(apex.x, 0.0, apex.z).length();
        assert!(apex_offset > previous);
        assert!((apex_offset - params.curvature * params.height).abs() < 1e-5);
    }

    #[test]
    fn test_bend_follows_direction() {
        let mesh = BladeMeshBuilder::build(&ShapeParameters {
            curvature: 1.0,
            curvature_position: 0.0,
            bend_direction: 0.0,
            ..Default::default()
        });
        let apex = mesh.vertices.last().unwrap().position;
        assert!(apex[0].abs() < 1e-6);
        assert!((apex[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_build_is_deterministic() {
        let params = ShapeParameters {
            curvature: 0.37,
            bend_direction: 211.0,
            width_variation: 0.73,
            ..Default::default()
        };
        let a = BladeMeshBuilder::build(&params);
        let b = BladeMeshBuilder::build(&params);
        assert_eq!(bytemuck::cast_slice::<_, u8>(&a.vertices), bytemuck::cast_slice::<_, u8>(&b.vertices));
        assert_eq!(a.indices, b.indices);
    }

    #[test]
    fn test_vertex_attributes() {
        let mesh = BladeMeshBuilder::build(&ShapeParameters::default());
        let base = &mesh.vertices[0];
        assert_eq!(base.uv, [0.0, 0.0]);
        assert_eq!(base.color, [0.5, 0.5, 0.5, 1.0]);
        assert!(base.normal[0] < 0.0 && base.normal[1] > 0.9);
        assert_eq!(mesh.vertices[1].uv, [1.0, 0.0]);

        let apex = mesh.vertices.last().unwrap();
        assert_eq!(apex.uv, [0.5, 1.0]);
        assert_eq!(apex.color, [1.0; 4]);
        assert_eq!(apex.normal, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_bounds_cover_vertices() {
        let mesh = BladeMeshBuilder::build(&ShapeParameters {
            curvature: 0.5,
            bend_direction: 45.0,
            ..Default::default()
        });
        for v in &mesh.vertices {
            assert!(mesh.bounds.contains_point(Vec3::from_array(v.position)));
        }
        assert_eq!(mesh.bounds.max.y, 1.0);
    }

    #[test]
    fn test_vertex_size() {
        assert_eq!(std::mem::size_of::<BladeVertex>(), 48);
    }
}
