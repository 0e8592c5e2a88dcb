//! End-to-end tire profile extraction.
//!
//! Stages, each a pure function of the previous outputs:
//!
//! 1. [`CylinderAxisEstimator`] fits the tire axis and radius.
//! 2. [`frame::build_frame_with`] aligns scan space to tire space.
//! 3. [`band::BandSelector`] keeps the 12 o'clock strip inside the axial window.
//! 4. The rim picks are projected to `(Y, Z)` and [`fit_baseline`] fits
//!    `Z0(Y) = α + β·Y`.
//! 5. [`profile::build_profile`] bins `Z' = Z − Z0(Y)` along the axis, with
//!    the mean deviation from the fitted radius next to each bin.
//!
//! [`run_profile_with`] chains them under a [`ProfilerConfig`]. The pipeline
//! holds no shared state; independent scans may run in parallel.

pub mod band;
pub mod config;
pub mod frame;
pub mod profile;

pub use band::{project_rim_points, select_band, BandSelector};
pub use config::{ProfilerConfig, ReferenceConfig, RimPointPolicy};
pub use frame::{
    build_frame, build_frame_with, AngularSample, FrameError, HistogramPeak, ReferenceStrategy,
    WeightedCentroid,
};
pub use profile::{build_profile, build_profile_with_radius, ProfileError};

use log::{info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tireprof_core::{
    AxialWindow, BandPoint, CancelToken, CylinderModel, Frame, PointSet, Profile, Pt3, RimBaseline,
};
use tireprof_linear::{
    check_rim_count, fit_baseline, CylinderAxisEstimator, CylinderError, RimLineError,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Cylinder(#[from] CylinderError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    RimLine(#[from] RimLineError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// Scan vertices plus manual rim picks, both in scan space.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileInput {
    pub points: Vec<Pt3>,
    pub rim_points: Vec<Pt3>,
}

/// Everything a run produced, for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileReport {
    /// RANSAC seed actually used.
    pub seed: u64,
    pub cylinder: CylinderModel,
    pub frame: Frame,
    pub baseline: RimBaseline,
    pub band_points: usize,
    pub profile: Profile,
}

pub fn run_profile(
    input: &ProfileInput,
    config: &ProfilerConfig,
) -> Result<ProfileReport, PipelineError> {
    let points = PointSet::new(input.points.clone());
    run_profile_with(&points, &input.rim_points, config, None)
}

/// Run the full chain on `points` with `rim_points`.
///
/// Rim pick counts are checked before any fitting. `cancel` is forwarded to
/// the cylinder search.
pub fn run_profile_with(
    points: &PointSet,
    rim_points: &[Pt3],
    config: &ProfilerConfig,
    cancel: Option<&CancelToken>,
) -> Result<ProfileReport, PipelineError> {
    config.validate()?;
    check_rim_count(rim_points.len(), config.rim_points.min, config.rim_points.max)?;

    let seed = match config.seed {
        Some(seed) => seed,
        None => {
            let seed = rand::rng().random::<u64>();
            info!("no seed configured, drew {seed}");
            seed
        }
    };
    let mut rng = StdRng::seed_from_u64(seed);

    let cylinder = CylinderAxisEstimator::estimate_with_rng(
        points,
        &config.cylinder_options(),
        &mut rng,
        cancel,
    )?;
    info!(
        "cylinder: radius {:.4}, {} inliers ({:.1}%)",
        cylinder.radius,
        cylinder.inlier_count,
        100.0 * cylinder.inlier_fraction
    );

    let strategy = config.reference.to_strategy();
    let frame = build_frame_with(points, &cylinder, strategy.as_ref())?;

    let window = AxialWindow::centered(config.axial_center, config.outer_band);
    let mut selector = BandSelector::new(config.tape_width, window);
    selector.max_radial_deviation = config.max_radial_deviation;
    let band: Vec<BandPoint> = selector.select(points, &frame);
    if band.is_empty() {
        warn!(
            "band is empty: no points within {} of 12 o'clock in axial [{}, {}]",
            0.5 * config.tape_width,
            window.min,
            window.max
        );
    }

    let rim_samples = project_rim_points(rim_points, &frame);
    let baseline = fit_baseline(&rim_samples, config.rim_points.min)?;
    if baseline.residual_rmse > config.rim_rmse_warning {
        warn!(
            "rim baseline rmse {:.4} exceeds {:.4}; check the rim picks",
            baseline.residual_rmse, config.rim_rmse_warning
        );
    }
    info!(
        "baseline: alpha {:.5}, beta {:.5}, rmse {:.2e}",
        baseline.alpha, baseline.beta, baseline.residual_rmse
    );

    let profile = build_profile_with_radius(
        &band,
        &baseline,
        window,
        config.nbins,
        config.aggregate,
        Some(frame.arc_radius),
    )?;
    info!(
        "profile: {}/{} bins with data from {} band points",
        profile.non_empty().count(),
        profile.len(),
        band.len()
    );

    Ok(ProfileReport {
        seed,
        cylinder,
        frame,
        baseline,
        band_points: band.len(),
        profile,
    })
}
