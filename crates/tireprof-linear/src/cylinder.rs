//! Robust cylinder estimation for tire scans.
//!
//! # Algorithm
//!
//! 1. Estimate an unoriented normal per point (PCA over k neighbours).
//! 2. RANSAC over pairs of oriented points: the axis is `n₁ × n₂`, the axis
//!    passes through the intersection of the two normal lines in the plane
//!    perpendicular to it, and the radius is the mean distance of the pair
//!    to that intersection. Points within `distance_threshold` of the
//!    surface are inliers.
//! 3. Each consensus set is refit linearly (axis = least eigenvector of
//!    `Σ nnᵀ`, center and radius from an algebraic circle fit in the
//!    perpendicular plane).
//! 4. The winning model is refined by Levenberg–Marquardt on the
//!    point-to-surface distances of its inliers, and inliers are recounted.
//!
//! The random source is explicit. [`CylinderAxisEstimator::estimate`] with
//! `seed: None` draws from OS entropy and is therefore not reproducible;
//! pass a seed (or an RNG) for repeatable fits.

use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};
use thiserror::Error;
use tireprof_core::{
    math::{orthonormal_basis, reject},
    ransac_fit_with_rng, CancelToken, CylinderModel, Estimator, PointSet, Pt3, RansacOptions,
    Real, Vec2, Vec3,
};

use crate::circle::fit_circle;
use crate::refine::refine_cylinder;

/// Fewest points a cylinder fit is attempted on.
pub const MIN_CYLINDER_POINTS: usize = 16;

/// Sine of the smallest angle between sample normals that still defines an axis.
const MIN_NORMAL_SINE: Real = 0.05;

#[derive(Debug, Error)]
pub enum CylinderError {
    #[error("need at least {min} points for a cylinder fit, got {got}")]
    NotEnoughPoints { got: usize, min: usize },
    #[error(
        "cylinder fit below confidence: inlier fraction {achieved:.3} < {required:.3} \
         ({inliers}/{points} points, {iterations} iterations)"
    )]
    FitQuality {
        achieved: Real,
        required: Real,
        inliers: usize,
        points: usize,
        iterations: usize,
    },
    #[error("cylinder fit cancelled after {iterations} iterations")]
    Cancelled { iterations: usize },
    #[error("invalid cylinder fit options: {0}")]
    InvalidOptions(String),
}

/// Options for [`CylinderAxisEstimator`].
#[derive(Debug, Clone)]
pub struct CylinderFitOptions {
    /// Inlier cutoff: maximum point-to-surface distance (scan units).
    pub distance_threshold: Real,
    /// Hard cap on RANSAC iterations.
    pub max_iterations: usize,
    /// Fits whose final inlier fraction stays below this fail.
    pub min_inlier_fraction: Real,
    /// Confidence for the adaptive iteration bound.
    pub confidence: Real,
    /// Neighbourhood size for normal estimation.
    pub normal_neighbors: usize,
    /// Run the Levenberg–Marquardt refinement after consensus.
    pub refine: bool,
    /// Iteration patience for the refinement.
    pub refine_max_iters: usize,
}

impl Default for CylinderFitOptions {
    fn default() -> Self {
        Self {
            distance_threshold: 0.003,
            max_iterations: 5000,
            min_inlier_fraction: 0.5,
            confidence: 0.999,
            normal_neighbors: 12,
            refine: true,
            refine_max_iters: 100,
        }
    }
}

impl CylinderFitOptions {
    fn validate(&self) -> Result<(), CylinderError> {
        if !(self.distance_threshold.is_finite() && self.distance_threshold > 0.0) {
            return Err(CylinderError::InvalidOptions(format!(
                "distance_threshold must be positive, got {}",
                self.distance_threshold
            )));
        }
        if self.max_iterations == 0 {
            return Err(CylinderError::InvalidOptions(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_inlier_fraction) {
            return Err(CylinderError::InvalidOptions(format!(
                "min_inlier_fraction must be in [0, 1], got {}",
                self.min_inlier_fraction
            )));
        }
        Ok(())
    }
}

/// Point with an (unoriented) unit surface normal; zero when unknown.
#[derive(Debug, Clone, Copy)]
pub struct OrientedPoint {
    pub position: Pt3,
    pub normal: Vec3,
}

/// Bare cylinder geometry used during the search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylinderParams {
    pub axis_point: Pt3,
    /// Unit axis direction.
    pub axis_direction: Vec3,
    pub radius: Real,
}

impl CylinderParams {
    #[inline]
    pub fn surface_distance(&self, p: &Pt3) -> Real {
        (reject(&(p - self.axis_point), &self.axis_direction).norm() - self.radius).abs()
    }
}

/// RANSAC estimator over [`OrientedPoint`]s.
pub struct CylinderEstimator;

impl Estimator for CylinderEstimator {
    type Datum = OrientedPoint;
    type Model = CylinderParams;

    const MIN_SAMPLES: usize = 2;

    fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model> {
        let a = &data[sample_indices[0]];
        let b = &data[sample_indices[1]];

        let axis = a.normal.cross(&b.normal);
        let sine = axis.norm();
        if sine < MIN_NORMAL_SINE {
            return None;
        }
        let dir = axis / sine;

        // Both normals are perpendicular to `dir`, so after projecting the
        // positions into the plane the two normal lines are coplanar.
        let pa = reject(&a.position.coords, &dir);
        let pb = reject(&b.position.coords, &dir);
        let na = a.normal;
        let nb = b.normal;

        let w0 = pa - pb;
        let c = na.dot(&nb);
        let denom = 1.0 - c * c;
        let d = na.dot(&w0);
        let e = nb.dot(&w0);
        let t = (c * e - d) / denom;
        let u = (e - c * d) / denom;
        let center = 0.5 * ((pa + na * t) + (pb + nb * u));

        let radius = 0.5 * ((pa - center).norm() + (pb - center).norm());
        if !radius.is_finite() || radius <= Real::EPSILON {
            return None;
        }

        Some(CylinderParams {
            axis_point: Pt3::from(center),
            axis_direction: dir,
            radius,
        })
    }

    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64 {
        model.surface_distance(&datum.position)
    }

    fn is_degenerate(data: &[Self::Datum], sample_indices: &[usize]) -> bool {
        sample_indices[0] == sample_indices[1]
            || sample_indices
                .iter()
                .any(|&i| data[i].normal.norm_squared() < 0.25)
    }

    fn refit(data: &[Self::Datum], inliers: &[usize]) -> Option<Self::Model> {
        refit_linear(data, inliers)
    }
}

/// Linear refit on a consensus set.
fn refit_linear(data: &[OrientedPoint], inliers: &[usize]) -> Option<CylinderParams> {
    if inliers.len() < 5 {
        return None;
    }

    let mut scatter = nalgebra::Matrix3::<Real>::zeros();
    for &i in inliers {
        let n = data[i].normal;
        scatter += n * n.transpose();
    }
    let eig = scatter.symmetric_eigen();
    let min_idx = eig.eigenvalues.imin();
    let dir = eig.eigenvectors.column(min_idx).into_owned().try_normalize(1e-12)?;

    let (u, v) = orthonormal_basis(&dir);
    let planar: Vec<Vec2> = inliers
        .iter()
        .map(|&i| {
            let p = data[i].position.coords;
            Vec2::new(p.dot(&u), p.dot(&v))
        })
        .collect();
    let circle = fit_circle(&planar).ok()?;

    Some(CylinderParams {
        axis_point: Pt3::from(u * circle.center.x + v * circle.center.y),
        axis_direction: dir,
        radius: circle.radius,
    })
}

/// Robust cylinder estimator (RANSAC + refinement).
#[derive(Debug, Clone, Copy, Default)]
pub struct CylinderAxisEstimator;

impl CylinderAxisEstimator {
    /// Fit with a [`StdRng`] from `seed`, or from OS entropy when `None`.
    pub fn estimate(
        points: &PointSet,
        opts: &CylinderFitOptions,
        seed: Option<u64>,
    ) -> Result<CylinderModel, CylinderError> {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Self::estimate_with_rng(points, opts, &mut rng, None)
    }

    /// Fit drawing RANSAC samples from `rng`.
    ///
    /// The token is polled once per RANSAC iteration.
    pub fn estimate_with_rng<R: Rng + ?Sized>(
        points: &PointSet,
        opts: &CylinderFitOptions,
        rng: &mut R,
        cancel: Option<&CancelToken>,
    ) -> Result<CylinderModel, CylinderError> {
        opts.validate()?;
        let n = points.len();
        if n < MIN_CYLINDER_POINTS {
            return Err(CylinderError::NotEnoughPoints {
                got: n,
                min: MIN_CYLINDER_POINTS,
            });
        }

        let normals = points.estimate_normals(opts.normal_neighbors);
        let data: Vec<OrientedPoint> = points
            .iter()
            .zip(normals)
            .map(|(p, normal)| OrientedPoint {
                position: *p,
                normal,
            })
            .collect();

        let ransac_opts = RansacOptions {
            max_iters: opts.max_iterations,
            thresh: opts.distance_threshold,
            min_inliers: CylinderEstimator::MIN_SAMPLES + 1,
            confidence: opts.confidence,
            refit_on_inliers: true,
            ..RansacOptions::default()
        };

        let res = ransac_fit_with_rng::<CylinderEstimator, R>(&data, &ransac_opts, rng, cancel);
        if res.cancelled {
            return Err(CylinderError::Cancelled {
                iterations: res.iters,
            });
        }
        let Some(mut model) = res.model else {
            return Err(CylinderError::FitQuality {
                achieved: 0.0,
                required: opts.min_inlier_fraction,
                inliers: 0,
                points: n,
                iterations: res.iters,
            });
        };
        let mut inliers = res.inliers;
        debug!(
            "cylinder ransac: {} iterations (best at {}), {}/{} inliers, rms {:.3e}",
            res.iters,
            res.best_iter,
            inliers.len(),
            n,
            res.inlier_rms
        );

        if opts.refine {
            let positions: Vec<Pt3> = inliers.iter().map(|&i| data[i].position).collect();
            if let Some(refined) = refine_cylinder(&positions, &model, opts.refine_max_iters) {
                let refined_inliers = collect_inliers(&data, &refined, opts.distance_threshold);
                if refined_inliers.len() >= inliers.len() {
                    model = refined;
                    inliers = refined_inliers;
                } else {
                    debug!(
                        "cylinder refinement dropped inliers ({} -> {}); keeping linear model",
                        inliers.len(),
                        refined_inliers.len()
                    );
                }
            }
        }

        let achieved = inliers.len() as Real / n as Real;
        if achieved < opts.min_inlier_fraction {
            return Err(CylinderError::FitQuality {
                achieved,
                required: opts.min_inlier_fraction,
                inliers: inliers.len(),
                points: n,
                iterations: res.iters,
            });
        }

        // Anchor the axis point at the inlier centroid's foot on the axis.
        let centroid = inliers
            .iter()
            .fold(Vec3::zeros(), |acc, &i| acc + data[i].position.coords)
            / inliers.len() as Real;
        let dir = model.axis_direction;
        let foot = model.axis_point + dir * (centroid - model.axis_point.coords).dot(&dir);

        Ok(CylinderModel {
            axis_point: foot,
            axis_direction: dir,
            radius: model.radius,
            inlier_count: inliers.len(),
            inlier_fraction: achieved,
        })
    }
}

fn collect_inliers(data: &[OrientedPoint], model: &CylinderParams, thresh: Real) -> Vec<usize> {
    data.iter()
        .enumerate()
        .filter(|(_, d)| model.surface_distance(&d.position) <= thresh)
        .map(|(i, _)| i)
        .collect()
}

/// Seeded convenience wrapper: `estimate(points, threshold, iterations, fraction)`.
pub fn estimate_cylinder(
    points: &PointSet,
    distance_threshold: Real,
    max_iterations: usize,
    min_inlier_fraction: Real,
    seed: Option<u64>,
) -> Result<CylinderModel, CylinderError> {
    let opts = CylinderFitOptions {
        distance_threshold,
        max_iterations,
        min_inlier_fraction,
        ..CylinderFitOptions::default()
    };
    CylinderAxisEstimator::estimate(points, &opts, seed)
}
