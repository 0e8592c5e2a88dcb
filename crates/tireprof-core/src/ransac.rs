//! Generic, model-agnostic RANSAC implementation.
//!
//! Implement the [`Estimator`] trait for a geometric model and call
//! [`ransac_fit`] (seeded from [`RansacOptions::seed`]) or
//! [`ransac_fit_with_rng`] (caller-supplied random source, optional
//! cancellation) with a slice of data.
//!
//! The loop never panics on failure: when no consensus is found,
//! the result has `success == false` and `model == None`.

use crate::CancelToken;
use rand::prelude::IndexedRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Configuration parameters for the generic RANSAC engine.
#[derive(Debug, Clone)]
pub struct RansacOptions {
    /// Hard cap on sampling iterations.
    pub max_iters: usize,
    /// Inlier residual threshold.
    pub thresh: f64,
    /// Minimum number of inliers required to accept a model.
    pub min_inliers: usize,
    /// Desired confidence level in `[0, 1]` for the adaptive iteration bound.
    pub confidence: f64,
    /// Seed used by [`ransac_fit`].
    pub seed: u64,
    /// If `true`, refit the model on all inliers before scoring.
    pub refit_on_inliers: bool,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            thresh: 0.003,
            min_inliers: 12,
            confidence: 0.99,
            seed: 1_234_567,
            refit_on_inliers: true,
        }
    }
}

/// Output of a RANSAC run.
///
/// When `success` is `false`, `model` is `None` and the other fields only
/// describe how far the search got.
#[derive(Debug, Clone)]
pub struct RansacResult<M> {
    /// Whether a consensus set satisfying the options was found.
    pub success: bool,
    /// Best model found (if any).
    pub model: Option<M>,
    /// Indices of inlier data points.
    pub inliers: Vec<usize>,
    /// Root-mean-square residual over inliers.
    pub inlier_rms: f64,
    /// Iteration at which the best model was found.
    pub best_iter: usize,
    /// Number of iterations actually performed.
    pub iters: usize,
    /// The loop stopped because the cancel token fired.
    pub cancelled: bool,
}

impl<M> Default for RansacResult<M> {
    fn default() -> Self {
        Self {
            success: false,
            model: None,
            inliers: Vec::new(),
            inlier_rms: f64::INFINITY,
            best_iter: 0,
            iters: 0,
            cancelled: false,
        }
    }
}

/// Generic estimator for RANSAC-like methods.
pub trait Estimator {
    type Datum;
    type Model;

    /// Minimal number of samples needed to estimate a model.
    const MIN_SAMPLES: usize;

    /// Fit a model from a subset of data indices.
    ///
    /// Return `None` if the subset is degenerate or fitting fails.
    fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model>;

    /// Non-negative residual for one datum, in the units of `opts.thresh`.
    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64;

    /// Optional degeneracy check on the sample subset.
    fn is_degenerate(_data: &[Self::Datum], _sample_indices: &[usize]) -> bool {
        false
    }

    /// Optional refit on the full inlier set. Default: keep the sampled model.
    fn refit(_data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

/// Inlier set of one hypothesis with its residuals.
#[derive(Debug, Default)]
struct Consensus {
    indices: Vec<usize>,
    residuals: Vec<f64>,
}

impl Consensus {
    fn gather<E: Estimator>(&mut self, model: &E::Model, data: &[E::Datum], thresh: f64) {
        self.indices.clear();
        self.residuals.clear();
        for (i, datum) in data.iter().enumerate() {
            let r = E::residual(model, datum);
            if r <= thresh {
                self.indices.push(i);
                self.residuals.push(r);
            }
        }
    }

    fn rms(&self) -> f64 {
        if self.residuals.is_empty() {
            return f64::INFINITY;
        }
        let ss: f64 = self.residuals.iter().map(|&v| v * v).sum();
        (ss / self.residuals.len() as f64).sqrt()
    }

    /// More inliers wins; ties go to the lower RMS.
    fn beats<M>(&self, rms: f64, best: &RansacResult<M>) -> bool {
        !best.success
            || self.indices.len() > best.inliers.len()
            || (self.indices.len() == best.inliers.len() && rms < best.inlier_rms)
    }
}

/// Iterations needed to draw one all-inlier sample with `confidence`,
/// clamped to `[done, max_iters]`.
fn iteration_budget(
    confidence: f64,
    inlier_ratio: f64,
    min_samples: usize,
    done: usize,
    max_iters: usize,
) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iters;
    }
    let log_miss = (1.0 - inlier_ratio.powi(min_samples as i32)).max(1e-12).ln();
    if log_miss >= 0.0 {
        return max_iters;
    }
    let needed = ((1.0 - confidence).ln() / log_miss).ceil() as usize;
    needed.clamp(done, max_iters)
}

/// Run RANSAC with a [`StdRng`] seeded from `opts.seed`.
///
/// Two calls with the same data and options return identical results.
pub fn ransac_fit<E: Estimator>(data: &[E::Datum], opts: &RansacOptions) -> RansacResult<E::Model> {
    let mut rng = StdRng::seed_from_u64(opts.seed);
    ransac_fit_with_rng::<E, _>(data, opts, &mut rng, None)
}

/// Run RANSAC drawing samples from `rng`.
///
/// `opts.seed` is ignored. When `cancel` fires, the loop stops at the next
/// iteration boundary and returns whatever was best so far with
/// `cancelled == true`.
pub fn ransac_fit_with_rng<E, R>(
    data: &[E::Datum],
    opts: &RansacOptions,
    rng: &mut R,
    cancel: Option<&CancelToken>,
) -> RansacResult<E::Model>
where
    E: Estimator,
    R: Rng + ?Sized,
{
    let mut best: RansacResult<E::Model> = RansacResult::default();
    if data.len() < E::MIN_SAMPLES {
        return best;
    }

    let indices: Vec<usize> = (0..data.len()).collect();
    let mut sample = vec![0usize; E::MIN_SAMPLES];
    let mut budget = opts.max_iters;
    let mut raw = Consensus::default();
    let mut refit = Consensus::default();

    let mut iter = 0;
    while iter < budget {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            best.cancelled = true;
            break;
        }
        iter += 1;

        for (slot, &idx) in sample
            .iter_mut()
            .zip(indices.as_slice().choose_multiple(rng, E::MIN_SAMPLES))
        {
            *slot = idx;
        }
        if E::is_degenerate(data, &sample) {
            continue;
        }
        let Some(hypothesis) = E::fit(data, &sample) else {
            continue;
        };

        raw.gather::<E>(&hypothesis, data, opts.thresh);
        if raw.indices.len() < opts.min_inliers {
            continue;
        }

        let refined = if opts.refit_on_inliers {
            E::refit(data, &raw.indices)
        } else {
            None
        };
        let (model, consensus) = match refined {
            Some(m) => {
                refit.gather::<E>(&m, data, opts.thresh);
                (m, &refit)
            }
            None => (hypothesis, &raw),
        };

        let rms = consensus.rms();
        if consensus.beats(rms, &best) {
            best.success = true;
            best.model = Some(model);
            best.inliers.clone_from(&consensus.indices);
            best.inlier_rms = rms;
            best.best_iter = iter;
        }

        let ratio = best.inliers.len() as f64 / data.len() as f64;
        budget = iteration_budget(opts.confidence, ratio, E::MIN_SAMPLES, iter, opts.max_iters);
    }

    best.iters = iter;
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Horizontal level `y = c`: one sample fixes the model.
    struct LevelEstimator;

    impl Estimator for LevelEstimator {
        type Datum = (f64, f64);
        type Model = f64;

        const MIN_SAMPLES: usize = 1;

        fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model> {
            Some(data[sample_indices[0]].1)
        }

        fn residual(model: &Self::Model, datum: &Self::Datum) -> f64 {
            (datum.1 - model).abs()
        }

        fn refit(data: &[Self::Datum], inliers: &[usize]) -> Option<Self::Model> {
            if inliers.is_empty() {
                return None;
            }
            let sum: f64 = inliers.iter().map(|&i| data[i].1).sum();
            Some(sum / inliers.len() as f64)
        }
    }

    fn level_data() -> Vec<(f64, f64)> {
        let mut data: Vec<(f64, f64)> = (0..40)
            .map(|i| {
                let jitter = if i % 2 == 0 { 0.001 } else { -0.001 };
                (i as f64, 0.25 + jitter)
            })
            .collect();
        data.extend([(3.0, 4.0), (7.0, -2.0), (9.0, 1.5), (11.0, 0.9)]);
        data
    }

    fn opts() -> RansacOptions {
        RansacOptions {
            max_iters: 200,
            thresh: 0.01,
            min_inliers: 10,
            confidence: 0.99,
            seed: 7,
            refit_on_inliers: true,
        }
    }

    #[test]
    fn handles_insufficient_data() {
        let res = ransac_fit::<LevelEstimator>(&[], &opts());
        assert!(!res.success);
        assert!(res.model.is_none());
        assert_eq!(res.iters, 0);
    }

    #[test]
    fn recovers_level_with_outliers() {
        let data = level_data();
        let res = ransac_fit::<LevelEstimator>(&data, &opts());
        assert!(res.success);
        let level = res.model.expect("model");
        assert!((level - 0.25).abs() < 1e-3);
        assert_eq!(res.inliers.len(), 40);
        assert!(!res.cancelled);
    }

    #[test]
    fn same_seed_reproduces_result() {
        let data = level_data();
        let a = ransac_fit::<LevelEstimator>(&data, &opts());
        let b = ransac_fit::<LevelEstimator>(&data, &opts());
        assert_eq!(a.model.map(f64::to_bits), b.model.map(f64::to_bits));
        assert_eq!(a.inliers, b.inliers);
        assert_eq!(a.iters, b.iters);
    }

    #[test]
    fn cancelled_token_stops_before_sampling() {
        let data = level_data();
        let token = CancelToken::new();
        token.cancel();
        let mut rng = StdRng::seed_from_u64(1);
        let res = ransac_fit_with_rng::<LevelEstimator, _>(&data, &opts(), &mut rng, Some(&token));
        assert!(res.cancelled);
        assert!(!res.success);
        assert_eq!(res.iters, 0);
    }

    #[test]
    fn iteration_bound_shrinks_with_high_inlier_ratio() {
        assert_eq!(iteration_budget(0.99, 0.0, 2, 0, 500), 500);
        let n = iteration_budget(0.99, 0.9, 2, 1, 500);
        assert!(n < 10, "expected a small bound, got {n}");
    }
}
