//! Scan → tire frame alignment.
//!
//! The axis comes from the fitted cylinder. Its sign is fixed from the scan
//! content: the direction is first canonicalized (largest component
//! positive), then flipped when the points extend farther along the negative
//! side of the axis point than along the positive side.
//!
//! The 12 o'clock direction is chosen by a [`ReferenceStrategy`] from the
//! angular positions and radial distances of all points around the axis.
//! The default, [`HistogramPeak`], refuses flat or multi-modal distributions
//! with [`FrameError::AmbiguousReference`] instead of falling back to an
//! arbitrary angle.

use std::f64::consts::{PI, TAU};

use log::debug;
use thiserror::Error;
use tireprof_core::{
    math::{orthonormal_basis, reject, wrap_angle},
    CylinderModel, Frame, PointSet, Real, Vec3,
};

/// Relative difference below which two axial spans count as equal.
const SPAN_TIE_TOLERANCE: Real = 1e-9;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("no points with a defined angle around the axis")]
    EmptyPointSet,
    #[error("no clear 12 o'clock reference: {metric} {value:.3} below required {required:.3}")]
    AmbiguousReference {
        metric: &'static str,
        value: Real,
        required: Real,
    },
    #[error("cylinder axis is degenerate")]
    DegenerateAxis,
}

/// A point's position around the axis, measured in a provisional basis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularSample {
    /// Angle in `(-π, π]`.
    pub angle: Real,
    /// Distance from the axis.
    pub radial: Real,
}

/// Picks the reference angle from the angular distribution of a scan.
pub trait ReferenceStrategy {
    fn reference_angle(&self, samples: &[AngularSample]) -> Result<Real, FrameError>;
}

/// Peak of a smoothed circular histogram of summed radial extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramPeak {
    /// Number of angular bins over the full turn.
    pub bins: usize,
    /// Triangular smoothing radius in bins.
    pub smoothing: usize,
    /// Required `(peak − mean) / peak` of the smoothed histogram.
    pub min_prominence: Real,
    /// Required ratio of the peak over any local maximum more than a quarter
    /// turn away.
    pub min_peak_ratio: Real,
}

impl Default for HistogramPeak {
    fn default() -> Self {
        Self {
            bins: 72,
            smoothing: 2,
            min_prominence: 0.25,
            min_peak_ratio: 1.05,
        }
    }
}

impl HistogramPeak {
    fn smoothed_histogram(&self, samples: &[AngularSample]) -> Vec<Real> {
        let n = self.bins;
        let width = TAU / n as Real;
        let mut hist = vec![0.0; n];
        for s in samples {
            let idx = (((s.angle + PI) / width).floor() as isize).rem_euclid(n as isize) as usize;
            hist[idx] += s.radial;
        }

        let k = self.smoothing as isize;
        let mut smoothed = vec![0.0; n];
        let mut total_weight = 0.0;
        for j in -k..=k {
            total_weight += (k + 1 - j.abs()) as Real;
        }
        for (i, out) in smoothed.iter_mut().enumerate() {
            let mut acc = 0.0;
            for j in -k..=k {
                let idx = (i as isize + j).rem_euclid(n as isize) as usize;
                acc += (k + 1 - j.abs()) as Real * hist[idx];
            }
            *out = acc / total_weight;
        }
        smoothed
    }
}

impl ReferenceStrategy for HistogramPeak {
    fn reference_angle(&self, samples: &[AngularSample]) -> Result<Real, FrameError> {
        if samples.is_empty() {
            return Err(FrameError::EmptyPointSet);
        }
        let n = self.bins.max(3);
        let strategy = HistogramPeak { bins: n, ..*self };
        let hist = strategy.smoothed_histogram(samples);

        let (peak_idx, peak) = hist
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or(FrameError::EmptyPointSet)?;
        if peak <= 0.0 {
            return Err(FrameError::EmptyPointSet);
        }

        let mean = hist.iter().sum::<Real>() / n as Real;
        let prominence = (peak - mean) / peak;
        debug!("reference histogram: peak bin {peak_idx}/{n}, prominence {prominence:.3}");
        if prominence < self.min_prominence {
            return Err(FrameError::AmbiguousReference {
                metric: "histogram prominence",
                value: prominence,
                required: self.min_prominence,
            });
        }

        // Strongest local maximum well away from the peak.
        let quarter = n / 4;
        let competitor = (0..n)
            .filter(|&i| {
                let d = i.abs_diff(peak_idx);
                d.min(n - d) > quarter
            })
            .filter(|&i| {
                let prev = hist[(i + n - 1) % n];
                let next = hist[(i + 1) % n];
                hist[i] > 0.0 && hist[i] >= prev && hist[i] >= next
            })
            .map(|i| hist[i])
            .fold(0.0, Real::max);
        if competitor > 0.0 {
            let ratio = peak / competitor;
            if ratio < self.min_peak_ratio {
                return Err(FrameError::AmbiguousReference {
                    metric: "peak ratio over competing maximum",
                    value: ratio,
                    required: self.min_peak_ratio,
                });
            }
        }

        let l = hist[(peak_idx + n - 1) % n];
        let r = hist[(peak_idx + 1) % n];
        let denom = l - 2.0 * peak + r;
        let offset = if denom < 0.0 {
            (0.5 * (l - r) / denom).clamp(-0.5, 0.5)
        } else {
            0.0
        };
        let width = TAU / n as Real;
        Ok(wrap_angle((peak_idx as Real + 0.5 + offset) * width - PI))
    }
}

/// Radially weighted circular mean of the point angles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedCentroid {
    /// Required mean resultant length in `[0, 1]`.
    pub min_resultant: Real,
}

impl Default for WeightedCentroid {
    fn default() -> Self {
        Self { min_resultant: 0.3 }
    }
}

impl ReferenceStrategy for WeightedCentroid {
    fn reference_angle(&self, samples: &[AngularSample]) -> Result<Real, FrameError> {
        let (mut c, mut s, mut w) = (0.0, 0.0, 0.0);
        for sample in samples {
            c += sample.radial * sample.angle.cos();
            s += sample.radial * sample.angle.sin();
            w += sample.radial;
        }
        if w <= 0.0 {
            return Err(FrameError::EmptyPointSet);
        }
        let resultant = c.hypot(s) / w;
        debug!("reference centroid: mean resultant length {resultant:.3}");
        if resultant < self.min_resultant {
            return Err(FrameError::AmbiguousReference {
                metric: "mean resultant length",
                value: resultant,
                required: self.min_resultant,
            });
        }
        Ok(s.atan2(c))
    }
}

/// Axis direction with the content-derived sign.
fn oriented_axis(points: &PointSet, model: &CylinderModel) -> Result<Vec3, FrameError> {
    let mut dir = model
        .axis_direction
        .try_normalize(1e-12)
        .ok_or(FrameError::DegenerateAxis)?;
    let imax = dir.iamax();
    if dir[imax] < 0.0 {
        dir = -dir;
    }

    let (mut lo, mut hi) = (0.0 as Real, 0.0 as Real);
    for p in points {
        let t = (p - model.axis_point).dot(&dir);
        lo = lo.min(t);
        hi = hi.max(t);
    }
    let negative = -lo;
    if negative - hi > SPAN_TIE_TOLERANCE * (negative + hi) {
        dir = -dir;
    }
    Ok(dir)
}

/// Build the frame with the default [`HistogramPeak`] reference.
pub fn build_frame(points: &PointSet, model: &CylinderModel) -> Result<Frame, FrameError> {
    build_frame_with(points, model, &HistogramPeak::default())
}

/// Build the frame choosing 12 o'clock with `strategy`.
pub fn build_frame_with<S: ReferenceStrategy + ?Sized>(
    points: &PointSet,
    model: &CylinderModel,
    strategy: &S,
) -> Result<Frame, FrameError> {
    if points.is_empty() {
        return Err(FrameError::EmptyPointSet);
    }
    if !(model.radius.is_finite() && model.radius > 0.0) {
        return Err(FrameError::DegenerateAxis);
    }
    let axis = oriented_axis(points, model)?;
    let (u, v) = orthonormal_basis(&axis);

    let samples: Vec<AngularSample> = points
        .iter()
        .filter_map(|p| {
            let w = reject(&(p - model.axis_point), &axis);
            let radial = w.norm();
            (radial > Real::EPSILON).then(|| AngularSample {
                angle: w.dot(&v).atan2(w.dot(&u)),
                radial,
            })
        })
        .collect();
    if samples.is_empty() {
        return Err(FrameError::EmptyPointSet);
    }

    let angle = strategy.reference_angle(&samples)?;
    let reference = u * angle.cos() + v * angle.sin();
    let frame = Frame::from_axes(&axis, &reference, model.axis_point, model.radius)
        .ok_or(FrameError::DegenerateAxis)?;
    debug!(
        "frame: axis {:?}, reference {:?} (angle {:.4} rad in provisional basis)",
        axis.as_slice(),
        frame.reference_dir.as_slice(),
        angle
    );
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tireprof_core::{
        synthetic::{noise::unit_sample, AngularCoverage, SyntheticTire},
        Pt3,
    };

    fn model_for(tire: &SyntheticTire, n: usize) -> CylinderModel {
        CylinderModel {
            axis_point: tire.axis_point,
            axis_direction: tire.axis_direction(),
            radius: tire.radius,
            inlier_count: n,
            inlier_fraction: 1.0,
        }
    }

    fn tire() -> SyntheticTire {
        SyntheticTire::new(
            0.3,
            Pt3::new(0.0, 0.1, -0.2),
            Vec3::new(0.3, 1.0, 0.0),
            Vec3::new(0.0, 0.2, 1.0),
        )
        .unwrap()
        .with_seed(4)
    }

    /// Triangular angular density around the true 12 o'clock.
    fn lobe_scan(tire: &SyntheticTire, n: usize, axial: impl Fn(Real) -> Real) -> PointSet {
        let points = (0..n)
            .map(|i| {
                let angle = 0.4 * (unit_sample(8, 0, i) + unit_sample(8, 1, i) - 1.0);
                tire.point_at(axial(unit_sample(8, 2, i)), angle, tire.radius)
            })
            .collect();
        PointSet::new(points)
    }

    #[test]
    fn frame_is_orthonormal_and_finds_reference() {
        let tire = tire();
        let scan = lobe_scan(&tire, 5000, |u| -0.1 + 0.2 * u);
        let frame = build_frame(&scan, &model_for(&tire, 5000)).unwrap();

        let m = frame.rotation.matrix();
        for i in 0..3 {
            assert!((m.row(i).norm() - 1.0).abs() < 1e-12);
            for j in (i + 1)..3 {
                assert!(m.row(i).dot(&m.row(j)).abs() < 1e-12);
            }
        }
        assert!((m.determinant() - 1.0).abs() < 1e-12);

        assert!(frame.axial_dir().cross(&tire.axis_direction()).norm() < 1e-12);
        let miss = frame
            .reference_dir
            .dot(&tire.reference_dir())
            .clamp(-1.0, 1.0)
            .acos();
        assert!(miss < 0.06, "reference off by {miss} rad");
        assert_eq!(frame.arc_radius, 0.3);
    }

    #[test]
    fn full_turn_scan_is_ambiguous() {
        let tire = tire().with_coverage(AngularCoverage::Full);
        let scan = tire.sample(10_000);
        let err = build_frame(&scan, &model_for(&tire, 10_000)).unwrap_err();
        assert!(matches!(err, FrameError::AmbiguousReference { .. }), "{err:?}");
    }

    #[test]
    fn opposite_lobes_are_ambiguous() {
        let samples: Vec<AngularSample> = (0..2000)
            .map(|i| {
                let lobe = if i % 2 == 0 { 0.0 } else { PI };
                let offset = 0.2 * ((i / 2) as Real / 999.0 - 0.5);
                AngularSample {
                    angle: wrap_angle(lobe + offset),
                    radial: 0.3,
                }
            })
            .collect();
        let err = HistogramPeak::default().reference_angle(&samples).unwrap_err();
        assert!(matches!(
            err,
            FrameError::AmbiguousReference {
                metric: "peak ratio over competing maximum",
                ..
            }
        ));
        assert!(matches!(
            WeightedCentroid::default().reference_angle(&samples),
            Err(FrameError::AmbiguousReference { .. })
        ));
    }

    #[test]
    fn strategies_agree_on_single_lobe() {
        let samples: Vec<AngularSample> = (0..1000)
            .map(|i| AngularSample {
                angle: 1.0 + 0.3 * (unit_sample(2, 0, i) + unit_sample(2, 1, i) - 1.0),
                radial: 0.3,
            })
            .collect();
        let centroid = WeightedCentroid::default().reference_angle(&samples).unwrap();
        assert!((centroid - 1.0).abs() < 0.02);
        let peak = HistogramPeak::default().reference_angle(&samples).unwrap();
        assert!((peak - 1.0).abs() < 0.06);
    }

    #[test]
    fn axis_points_toward_longer_side() {
        let tire = tire();
        let axis = tire.axis_direction();
        // Axial positions skewed so the scan reaches farther on the negative side.
        let scan = lobe_scan(&tire, 3000, |u| 0.05 - 0.2 * u * u);
        let mut model = model_for(&tire, scan.len());

        for sign in [1.0, -1.0] {
            model.axis_direction = axis * sign;
            let frame = build_frame(&scan, &model).unwrap();
            assert!(frame.axial_dir().dot(&axis) < -0.999_999);
            assert!((frame.rotation.matrix().determinant() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn degenerate_inputs() {
        let tire = tire();
        let mut model = model_for(&tire, 10);
        assert!(matches!(
            build_frame(&PointSet::default(), &model),
            Err(FrameError::EmptyPointSet)
        ));
        model.axis_direction = Vec3::zeros();
        assert!(matches!(
            build_frame(&tire.sample(10), &model),
            Err(FrameError::DegenerateAxis)
        ));
    }
}
