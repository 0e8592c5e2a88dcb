use super::noise::{symmetric_sample, unit_sample};
use crate::{PointSet, Pt3, Real, Vec3};

const STREAM_ANGLE: u64 = 1;
const STREAM_AXIAL: u64 = 2;
const STREAM_RADIAL: u64 = 3;
const STREAM_OUTLIER: u64 = 4;

/// Angular extent of a synthetic scan around the axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AngularCoverage {
    /// Uniform density over the full turn (no preferred direction).
    Full,
    /// Partial scan facing the 12 o'clock direction: angles in
    /// `[-half_span, half_span]` (at most π/2) with density ∝ cos(angle),
    /// as a handheld capture produces.
    Facing { half_span: Real },
}

/// Ground-truth cylindrical tire surface with a known tire-space frame.
///
/// Positions are described in tire-space cylindrical terms (axial offset,
/// angle from 12 o'clock toward +Y, radial distance) and mapped to scan space
/// through the frame `X = axis`, `Z = reference`, `Y = Z × X`.
#[derive(Debug, Clone)]
pub struct SyntheticTire {
    pub radius: Real,
    pub axis_point: Pt3,
    pub axial_range: (Real, Real),
    pub coverage: AngularCoverage,
    pub radial_noise: Real,
    pub outliers: usize,
    pub seed: u64,
    x: Vec3,
    y: Vec3,
    z: Vec3,
}

impl SyntheticTire {
    /// `None` when `radius` is not positive or the directions are degenerate.
    pub fn new(radius: Real, axis_point: Pt3, axis: Vec3, reference: Vec3) -> Option<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return None;
        }
        let x = axis.try_normalize(1e-12)?;
        let z = (reference - x * x.dot(&reference)).try_normalize(1e-9)?;
        let y = z.cross(&x);
        Some(Self {
            radius,
            axis_point,
            axial_range: (-0.1, 0.1),
            coverage: AngularCoverage::Full,
            radial_noise: 0.0,
            outliers: 0,
            seed: 0,
            x,
            y,
            z,
        })
    }

    pub fn with_axial_range(mut self, min: Real, max: Real) -> Self {
        self.axial_range = (min, max);
        self
    }

    pub fn with_coverage(mut self, coverage: AngularCoverage) -> Self {
        self.coverage = coverage;
        self
    }

    /// Uniform radial noise in `[-max_abs, max_abs]`.
    pub fn with_radial_noise(mut self, max_abs: Real) -> Self {
        self.radial_noise = max_abs;
        self
    }

    /// Add `count` points scattered uniformly in a cube around the tire.
    pub fn with_outliers(mut self, count: usize) -> Self {
        self.outliers = count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn axis_direction(&self) -> Vec3 {
        self.x
    }

    pub fn reference_dir(&self) -> Vec3 {
        self.z
    }

    pub fn arc_dir(&self) -> Vec3 {
        self.y
    }

    /// Scan-space position of a tire-space cylindrical coordinate.
    pub fn point_at(&self, axial: Real, angle: Real, radial: Real) -> Pt3 {
        self.axis_point
            + self.x * axial
            + (self.z * angle.cos() + self.y * angle.sin()) * radial
    }

    /// `n` surface points followed by the configured outliers.
    pub fn sample(&self, n: usize) -> PointSet {
        let (a0, a1) = self.axial_range;
        let mut points = Vec::with_capacity(n + self.outliers);
        for i in 0..n {
            let u = unit_sample(self.seed, STREAM_ANGLE, i);
            let angle = match self.coverage {
                AngularCoverage::Full => (u - 0.5) * std::f64::consts::TAU,
                AngularCoverage::Facing { half_span } => {
                    let h = half_span.clamp(0.0, std::f64::consts::FRAC_PI_2);
                    ((2.0 * u - 1.0) * h.sin()).asin()
                }
            };
            let axial = a0 + (a1 - a0) * unit_sample(self.seed, STREAM_AXIAL, i);
            let radial =
                self.radius + symmetric_sample(self.seed, STREAM_RADIAL, i, self.radial_noise);
            points.push(self.point_at(axial, angle, radial));
        }

        let extent = 1.5 * self.radius;
        for i in 0..self.outliers {
            let k = 3 * i;
            let offset = self.x * symmetric_sample(self.seed, STREAM_OUTLIER, k, extent)
                + self.y * symmetric_sample(self.seed, STREAM_OUTLIER, k + 1, extent)
                + self.z * symmetric_sample(self.seed, STREAM_OUTLIER, k + 2, extent);
            points.push(self.axis_point + offset);
        }
        PointSet::new(points)
    }

    /// Rim picks at axial position `axial` lying on `Z0(Y) = alpha + beta · Y`.
    ///
    /// `arcs` are arc lengths from 12 o'clock measured on the nominal radius.
    pub fn rim_points(&self, axial: Real, arcs: &[Real], alpha: Real, beta: Real) -> Vec<Pt3> {
        arcs.iter()
            .map(|&y| self.point_at(axial, y / self.radius, alpha + beta * y))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tire() -> SyntheticTire {
        SyntheticTire::new(
            0.3,
            Pt3::new(0.1, -0.2, 0.05),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::z(),
        )
        .unwrap()
    }

    #[test]
    fn surface_points_lie_on_cylinder() {
        let tire = tire().with_coverage(AngularCoverage::Facing { half_span: 1.2 });
        let axis = tire.axis_direction();
        for p in tire.sample(200).iter() {
            let w = p - tire.axis_point;
            let radial = (w - axis * w.dot(&axis)).norm();
            assert!((radial - 0.3).abs() < 1e-12);
            let axial = w.dot(&axis);
            assert!((-0.1..=0.1).contains(&axial));
            let angle = w.dot(&tire.arc_dir()).atan2(w.dot(&tire.reference_dir()));
            assert!(angle.abs() <= 1.2 + 1e-12);
        }
    }

    #[test]
    fn sampling_is_deterministic_and_counts_outliers() {
        let tire = tire().with_outliers(25).with_seed(9);
        let a = tire.sample(100);
        assert_eq!(a.len(), 125);
        assert_eq!(a, tire.sample(100));
        assert_ne!(a, tire.clone().with_seed(10).sample(100));
    }

    #[test]
    fn rim_points_follow_the_line() {
        let tire = tire();
        let arcs = [-0.02, 0.0, 0.02];
        let rim = tire.rim_points(0.08, &arcs, 0.28, 0.01);
        let axis = tire.axis_direction();
        for (p, y) in rim.iter().zip(arcs) {
            let w = p - tire.axis_point;
            let radial = (w - axis * w.dot(&axis)).norm();
            assert!((radial - (0.28 + 0.01 * y)).abs() < 1e-12);
        }
    }

    #[test]
    fn rejects_degenerate_setup() {
        assert!(SyntheticTire::new(0.0, Pt3::origin(), Vec3::z(), Vec3::x()).is_none());
        assert!(SyntheticTire::new(0.3, Pt3::origin(), Vec3::z(), Vec3::z()).is_none());
    }
}
