//! Rim baseline `Z0(Y) = alpha + beta · Y` from manually picked rim points.
//!
//! Ordinary least squares of radial height against arc position. All picks
//! are trusted equally: the sets are small and hand-curated, so no outlier
//! rejection is attempted. A high `residual_rmse` is the caller's signal that
//! the picks were sloppy or that the rim is not straight in `(Y, Z)`.

use thiserror::Error;
use tireprof_core::{Real, RimBaseline};

/// Fewest picks accepted for a baseline, whatever the caller asks for.
pub const MIN_RIM_POINTS: usize = 3;

/// Arc spread (metres) below which all picks count as sharing one `Y`.
const MIN_ARC_SPREAD: Real = 1e-9;

#[derive(Debug, Error)]
pub enum RimLineError {
    #[error("need at least {min} rim points, got {got}")]
    InsufficientRimPoints { got: usize, min: usize },
    #[error("at most {max} rim points are accepted, got {got}")]
    TooManyRimPoints { got: usize, max: usize },
    #[error("rim points share the same arc position (spread {spread:.3e}); baseline slope is undefined")]
    DegenerateArcSpread { spread: Real },
    #[error("rim point {index} has a non-finite coordinate")]
    NonFinite { index: usize },
}

/// Check a pick count against the `[min, max]` policy before any fitting.
///
/// `min` is raised to [`MIN_RIM_POINTS`] if lower.
pub fn check_rim_count(count: usize, min: usize, max: usize) -> Result<(), RimLineError> {
    let min = min.max(MIN_RIM_POINTS);
    if count < min {
        return Err(RimLineError::InsufficientRimPoints { got: count, min });
    }
    if count > max {
        return Err(RimLineError::TooManyRimPoints { got: count, max });
    }
    Ok(())
}

/// Fit the rim baseline to tire-space `(Y, Z)` samples.
///
/// Fails fast with [`RimLineError::InsufficientRimPoints`] when fewer than
/// `max(min_points, 3)` samples are given, and with
/// [`RimLineError::DegenerateArcSpread`] when every sample has the same `Y`.
pub fn fit_baseline(
    samples: &[(Real, Real)],
    min_points: usize,
) -> Result<RimBaseline, RimLineError> {
    let min = min_points.max(MIN_RIM_POINTS);
    let n = samples.len();
    if n < min {
        return Err(RimLineError::InsufficientRimPoints { got: n, min });
    }
    if let Some(index) = samples
        .iter()
        .position(|(y, z)| !y.is_finite() || !z.is_finite())
    {
        return Err(RimLineError::NonFinite { index });
    }

    let nf = n as Real;
    let y_mean = samples.iter().map(|s| s.0).sum::<Real>() / nf;
    let z_mean = samples.iter().map(|s| s.1).sum::<Real>() / nf;

    let mut syy = 0.0;
    let mut syz = 0.0;
    for &(y, z) in samples {
        let dy = y - y_mean;
        syy += dy * dy;
        syz += dy * (z - z_mean);
    }

    let spread = (syy / nf).sqrt();
    if spread < MIN_ARC_SPREAD {
        return Err(RimLineError::DegenerateArcSpread { spread });
    }

    let beta = syz / syy;
    let alpha = z_mean - beta * y_mean;

    let ss_res: Real = samples
        .iter()
        .map(|&(y, z)| {
            let r = z - (alpha + beta * y);
            r * r
        })
        .sum();

    Ok(RimBaseline {
        alpha,
        beta,
        residual_rmse: (ss_res / nf).sqrt(),
        samples: n,
    })
}
