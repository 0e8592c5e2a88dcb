use serde::{Deserialize, Serialize};

use crate::Real;

/// Linear rim baseline `Z0(Y) = alpha + beta · Y` in tire space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RimBaseline {
    pub alpha: Real,
    pub beta: Real,
    /// RMS of `Z − Z0(Y)` over the rim samples (≥ 0).
    pub residual_rmse: Real,
    /// Number of rim samples the line was fitted to.
    pub samples: usize,
}

impl RimBaseline {
    /// Baseline height at arc position `y`.
    #[inline]
    pub fn eval(&self, y: Real) -> Real {
        self.alpha + self.beta * y
    }
}

/// A point kept by the circumferential band filter, in tire space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandPoint {
    /// Axial position.
    pub x: Real,
    /// Signed arc length from 12 o'clock.
    pub y: Real,
    /// Radial distance from the axis.
    pub z: Real,
}

/// How the baseline-corrected values inside one bin are reduced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    /// Highest point in the slice (least-worn surface).
    #[default]
    Max,
    Mean,
    Median,
}

/// Closed axial interval `[min, max]` in tire space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxialWindow {
    pub min: Real,
    pub max: Real,
}

impl AxialWindow {
    pub fn new(min: Real, max: Real) -> Self {
        Self { min, max }
    }

    /// `[center − half_width, center + half_width]`.
    pub fn centered(center: Real, half_width: Real) -> Self {
        Self {
            min: center - half_width,
            max: center + half_width,
        }
    }

    pub fn width(&self) -> Real {
        self.max - self.min
    }

    #[inline]
    pub fn contains(&self, x: Real) -> bool {
        x >= self.min && x <= self.max
    }

    /// `min < max` and both finite.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }
}

/// One axial slice of the profile.
///
/// Empty bins carry `z_prime == None`; they are never interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileBin {
    pub x_center: Real,
    /// Aggregated `Z'`, `None` when the bin has no samples.
    pub z_prime: Option<Real>,
    /// Sample standard deviation of `Z'`; `None` with fewer than two samples.
    pub z_std: Option<Real>,
    /// Mean of `Z − r` over the bin's samples, `r` the fitted radius.
    /// `None` when the bin is empty or no radius was supplied.
    #[serde(default)]
    pub delta_r_mean: Option<Real>,
    pub sample_count: usize,
}

impl ProfileBin {
    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

/// Baseline-corrected radial profile over the axial window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Bins ordered by strictly increasing `x_center`.
    pub bins: Vec<ProfileBin>,
    pub aggregate: Aggregate,
    pub window: AxialWindow,
}

impl Profile {
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// `true` when no bin holds any sample.
    pub fn is_empty(&self) -> bool {
        self.bins.iter().all(ProfileBin::is_empty)
    }

    /// Bins that hold data.
    pub fn non_empty(&self) -> impl Iterator<Item = &ProfileBin> {
        self.bins.iter().filter(|b| !b.is_empty())
    }

    pub fn total_samples(&self) -> usize {
        self.bins.iter().map(|b| b.sample_count).sum()
    }
}
