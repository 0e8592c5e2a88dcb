//! Circumferential band around 12 o'clock.

use log::debug;
use tireprof_core::{AxialWindow, BandPoint, Frame, PointSet, Pt3, Real};

/// Pure filter over tire-space coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandSelector {
    /// Full band width as arc length; points within `tape_width / 2` of
    /// 12 o'clock are kept.
    pub tape_width: Real,
    pub window: AxialWindow,
    /// Keep only points whose radial distance is within this of the frame radius.
    pub max_radial_deviation: Option<Real>,
}

impl BandSelector {
    pub fn new(tape_width: Real, window: AxialWindow) -> Self {
        Self {
            tape_width,
            window,
            max_radial_deviation: None,
        }
    }

    pub fn with_max_radial_deviation(mut self, deviation: Real) -> Self {
        self.max_radial_deviation = Some(deviation);
        self
    }

    /// Band points in input order. An empty result is a valid outcome.
    pub fn select(&self, points: &PointSet, frame: &Frame) -> Vec<BandPoint> {
        let half_arc = 0.5 * self.tape_width;
        let band: Vec<BandPoint> = points
            .iter()
            .filter_map(|p| {
                let c = frame.cylindrical(p);
                if c.arc.abs() > half_arc || !self.window.contains(c.axial) {
                    return None;
                }
                if let Some(dev) = self.max_radial_deviation {
                    if (c.radial - frame.arc_radius).abs() > dev {
                        return None;
                    }
                }
                Some(BandPoint {
                    x: c.axial,
                    y: c.arc,
                    z: c.radial,
                })
            })
            .collect();
        debug!(
            "band: {} of {} points within ±{:.4} arc, axial [{:.4}, {:.4}]",
            band.len(),
            points.len(),
            half_arc,
            self.window.min,
            self.window.max
        );
        band
    }
}

/// Band filter without a radial tolerance.
pub fn select_band(
    points: &PointSet,
    frame: &Frame,
    tape_width: Real,
    window: AxialWindow,
) -> Vec<BandPoint> {
    BandSelector::new(tape_width, window).select(points, frame)
}

/// Rim picks as tire-space `(Y, Z)` samples for the baseline fit.
pub fn project_rim_points(rim_points: &[Pt3], frame: &Frame) -> Vec<(Real, Real)> {
    rim_points
        .iter()
        .map(|p| {
            let c = frame.cylindrical(p);
            (c.arc, c.radial)
        })
        .collect()
}
