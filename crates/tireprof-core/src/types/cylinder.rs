use serde::{Deserialize, Serialize};

use crate::{math::reject, Pt3, Real, Vec3};

/// Cylinder fitted to a scan: an infinite axis line plus a radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CylinderModel {
    /// A point on the axis.
    pub axis_point: Pt3,
    /// Unit axis direction.
    pub axis_direction: Vec3,
    /// Radius (> 0).
    pub radius: Real,
    /// Number of input points within the fit threshold of the surface.
    pub inlier_count: usize,
    /// `inlier_count / input size`, in `[0, 1]`.
    pub inlier_fraction: Real,
}

impl CylinderModel {
    /// Distance of `p` from the axis line.
    pub fn axis_distance(&self, p: &Pt3) -> Real {
        reject(&(p - self.axis_point), &self.axis_direction).norm()
    }

    /// Unsigned distance of `p` from the cylindrical surface.
    pub fn surface_distance(&self, p: &Pt3) -> Real {
        (self.axis_distance(p) - self.radius).abs()
    }

    /// Signed position of `p` along the axis, relative to `axis_point`.
    pub fn axial_coordinate(&self, p: &Pt3) -> Real {
        (p - self.axis_point).dot(&self.axis_direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances_to_z_axis_cylinder() {
        let model = CylinderModel {
            axis_point: Pt3::new(1.0, 0.0, 0.0),
            axis_direction: Vec3::z(),
            radius: 0.5,
            inlier_count: 0,
            inlier_fraction: 0.0,
        };
        let p = Pt3::new(1.0, 0.8, 3.0);
        assert!((model.axis_distance(&p) - 0.8).abs() < 1e-12);
        assert!((model.surface_distance(&p) - 0.3).abs() < 1e-12);
        assert!((model.axial_coordinate(&p) - 3.0).abs() < 1e-12);
    }
}
