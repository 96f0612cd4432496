//! CPU-side frustum test for instance records

use glam::Vec3;

use crate::grass::params::InstanceRecord;

/// True when `point` is on the inner side of all six planes.
///
/// Planes are `(normal.xyz, distance)` with any culling radius already folded
/// into the distance, exactly as uploaded to the cull kernel.
pub fn is_inside(planes: &[[f32; 4]; 6], point: Vec3) -> bool {
    planes.iter().all(|p| Vec3::new(p[0], p[1], p[2]).dot(point) + p[3] >= 0.0)
}

/// Records of `raw` that survive the frustum test, in input order.
pub fn visible_records<'a>(
    planes: &'a [[f32; 4]; 6],
    raw: &'a [InstanceRecord],
) -> impl Iterator<Item = &'a InstanceRecord> + 'a {
    raw.iter().filter(move |r| is_inside(planes, r.position()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Frustum;
    use glam::{Mat4, Quat};

    fn planes(radius: f32) -> [[f32; 4]; 6] {
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        Frustum::from_view_projection(&proj).biased(radius).to_gpu_planes()
    }

    #[test]
    fn test_point_in_front() {
        assert!(is_inside(&planes(0.0), Vec3::new(0.0, 0.0, -10.0)));
        assert!(!is_inside(&planes(0.0), Vec3::new(0.0, 0.0, 10.0)));
    }

    #[test]
    fn test_boundary_is_inside() {
        // Every plane is x <= 5
        let p = [[-1.0, 0.0, 0.0, 5.0]; 6];
        assert!(is_inside(&p, Vec3::new(5.0, 0.0, 0.0)));
        assert!(!is_inside(&p, Vec3::new(5.001, 0.0, 0.0)));
    }

    #[test]
    fn test_visible_records_keep_order() {
        let raw: Vec<InstanceRecord> = [-5.0, 5.0, -20.0, -200.0]
            .iter()
            .map(|&z| InstanceRecord::new(Vec3::new(0.0, 0.0, z), Quat::IDENTITY, 1.0))
            .collect();
        let p = planes(0.0);
        let zs: Vec<f32> = visible_records(&p, &raw).map(|r| r.position[2]).collect();
        assert_eq!(zs, vec![-5.0, -20.0]);
    }
}
