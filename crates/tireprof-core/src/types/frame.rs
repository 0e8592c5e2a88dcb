use serde::{Deserialize, Serialize};

use crate::{Mat3, Pt3, Real, Rot3, Vec3};

/// Rigid transform from scan space to tire space.
///
/// Tire-space axes: X along the tire axis, Z toward the 12 o'clock reference,
/// Y = Z × X along the circumference. The rotation rows are those axes
/// expressed in scan space, so `p_tire = R · (p_scan − origin)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Scan → tire rotation (orthonormal, det = +1).
    pub rotation: Rot3,
    /// Tire-space origin in scan space (a point on the axis).
    pub origin: Pt3,
    /// 12 o'clock direction in scan space (unit, perpendicular to the axis).
    pub reference_dir: Vec3,
    /// Radius used to convert angles around the axis into arc length.
    pub arc_radius: Real,
}

/// Cylindrical coordinates of a point in tire space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylindricalCoords {
    /// Position along the axis (tire X).
    pub axial: Real,
    /// Angle from 12 o'clock toward +Y, in `(-π, π]`.
    pub angle: Real,
    /// Signed arc length `angle · arc_radius` (tire Y).
    pub arc: Real,
    /// Distance from the axis (tire Z).
    pub radial: Real,
}

impl Frame {
    /// Build a frame from an axis direction and a reference direction.
    ///
    /// Both are normalized; `reference` is made exactly perpendicular to `axis`.
    /// Returns `None` when `reference` is (nearly) parallel to `axis`.
    pub fn from_axes(
        axis: &Vec3,
        reference: &Vec3,
        origin: Pt3,
        arc_radius: Real,
    ) -> Option<Self> {
        let x = axis.try_normalize(1e-12)?;
        let z = (reference - x * x.dot(reference)).try_normalize(1e-9)?;
        let y = z.cross(&x);
        let m = Mat3::from_rows(&[x.transpose(), y.transpose(), z.transpose()]);
        Some(Self {
            rotation: Rot3::from_matrix_unchecked(m),
            origin,
            reference_dir: z,
            arc_radius,
        })
    }

    pub fn axial_dir(&self) -> Vec3 {
        self.rotation.matrix().row(0).transpose()
    }

    pub fn arc_dir(&self) -> Vec3 {
        self.rotation.matrix().row(1).transpose()
    }

    pub fn radial_dir(&self) -> Vec3 {
        self.rotation.matrix().row(2).transpose()
    }

    /// Cartesian tire-space coordinates of a scan-space point.
    pub fn to_tire(&self, p: &Pt3) -> Pt3 {
        Pt3::from(self.rotation * (p - self.origin))
    }

    /// Scan-space position of a tire-space point.
    pub fn to_scan(&self, p: &Pt3) -> Pt3 {
        self.origin + self.rotation.inverse() * p.coords
    }

    pub fn cylindrical(&self, p: &Pt3) -> CylindricalCoords {
        let t = self.to_tire(p);
        let angle = t.y.atan2(t.z);
        CylindricalCoords {
            axial: t.x,
            angle,
            arc: angle * self.arc_radius,
            radial: t.y.hypot(t.z),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_is_right_handed_and_round_trips() {
        let frame = Frame::from_axes(
            &Vec3::new(0.0, 0.0, 2.0),
            &Vec3::new(1.0, 0.0, 0.3),
            Pt3::new(0.5, 0.5, 0.0),
            0.3,
        )
        .unwrap();
        assert!((frame.rotation.matrix().determinant() - 1.0).abs() < 1e-12);
        assert!((frame.axial_dir() - Vec3::z()).norm() < 1e-12);
        assert!((frame.radial_dir() - Vec3::x()).norm() < 1e-12);
        assert!((frame.arc_dir() + Vec3::y()).norm() < 1e-12);

        let p = Pt3::new(0.9, 0.1, -0.2);
        let back = frame.to_scan(&frame.to_tire(&p));
        assert!((back - p).norm() < 1e-12);
    }

    #[test]
    fn cylindrical_coordinates_measure_from_reference() {
        let frame = Frame::from_axes(&Vec3::x(), &Vec3::z(), Pt3::origin(), 0.3).unwrap();
        let top = frame.cylindrical(&Pt3::new(0.1, 0.0, 0.3));
        assert!((top.axial - 0.1).abs() < 1e-12);
        assert!(top.angle.abs() < 1e-12);
        assert!((top.radial - 0.3).abs() < 1e-12);

        let a = 0.2_f64;
        let side = frame.cylindrical(&Pt3::new(0.0, 0.3 * a.sin(), 0.3 * a.cos()));
        assert!((side.angle - a).abs() < 1e-12);
        assert!((side.arc - 0.3 * a).abs() < 1e-12);
    }

    #[test]
    fn parallel_reference_is_rejected() {
        let parallel = Vec3::new(2.0, 0.0, 0.0);
        assert!(Frame::from_axes(&Vec3::x(), &parallel, Pt3::origin(), 1.0).is_none());
    }
}
