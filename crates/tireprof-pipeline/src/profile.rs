//! Baseline-corrected axial profile.

use log::debug;
use thiserror::Error;
use tireprof_core::{Aggregate, AxialWindow, BandPoint, Profile, ProfileBin, Real, RimBaseline};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile needs at least one bin")]
    InvalidBinCount,
    #[error("axial window [{min}, {max}] is empty or not finite")]
    InvalidWindow { min: Real, max: Real },
}

fn reduce(values: &mut [Real], aggregate: Aggregate) -> Real {
    match aggregate {
        Aggregate::Max => values.iter().copied().fold(Real::NEG_INFINITY, Real::max),
        Aggregate::Mean => values.iter().sum::<Real>() / values.len() as Real,
        Aggregate::Median => {
            values.sort_by(Real::total_cmp);
            let mid = values.len() / 2;
            if values.len() % 2 == 0 {
                0.5 * (values[mid - 1] + values[mid])
            } else {
                values[mid]
            }
        }
    }
}

fn sample_std(values: &[Real]) -> Option<Real> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as Real;
    let mean = values.iter().sum::<Real>() / n;
    let ss: Real = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    Some((ss / (n - 1.0)).sqrt())
}

/// Bin `Z' = Z − Z0(Y)` over `nbins` equal slices of `window`.
///
/// Points outside the window are ignored; a point at exactly `window.max`
/// lands in the last bin. Bins without samples stay empty.
pub fn build_profile(
    band: &[BandPoint],
    baseline: &RimBaseline,
    window: AxialWindow,
    nbins: usize,
    aggregate: Aggregate,
) -> Result<Profile, ProfileError> {
    build_profile_with_radius(band, baseline, window, nbins, aggregate, None)
}

/// [`build_profile`], also filling each bin's mean deviation `Z − radius`
/// when `radius` is given.
pub fn build_profile_with_radius(
    band: &[BandPoint],
    baseline: &RimBaseline,
    window: AxialWindow,
    nbins: usize,
    aggregate: Aggregate,
    radius: Option<Real>,
) -> Result<Profile, ProfileError> {
    if nbins == 0 {
        return Err(ProfileError::InvalidBinCount);
    }
    if !window.is_valid() {
        return Err(ProfileError::InvalidWindow {
            min: window.min,
            max: window.max,
        });
    }

    let width = window.width() / nbins as Real;
    let mut slices: Vec<Vec<Real>> = vec![Vec::new(); nbins];
    let mut radial_sums: Vec<Real> = vec![0.0; nbins];
    let mut skipped = 0usize;
    for p in band {
        let z_prime = p.z - baseline.eval(p.y);
        if !window.contains(p.x) || !z_prime.is_finite() {
            skipped += 1;
            continue;
        }
        let idx = (((p.x - window.min) / width).floor() as usize).min(nbins - 1);
        slices[idx].push(z_prime);
        radial_sums[idx] += p.z;
    }

    let bins: Vec<ProfileBin> = slices
        .iter_mut()
        .zip(&radial_sums)
        .enumerate()
        .map(|(i, (values, radial_sum))| {
            let x_center = window.min + (i as Real + 0.5) * width;
            if values.is_empty() {
                return ProfileBin {
                    x_center,
                    z_prime: None,
                    z_std: None,
                    delta_r_mean: None,
                    sample_count: 0,
                };
            }
            let count = values.len();
            let z_std = sample_std(values);
            ProfileBin {
                x_center,
                z_prime: Some(reduce(values, aggregate)),
                z_std,
                delta_r_mean: radius.map(|r| radial_sum / count as Real - r),
                sample_count: count,
            }
        })
        .collect();

    let profile = Profile {
        bins,
        aggregate,
        window,
    };
    debug!(
        "profile: {} bins, {} non-empty, {} samples ({} skipped)",
        nbins,
        profile.non_empty().count(),
        profile.total_samples(),
        skipped
    );
    Ok(profile)
}
