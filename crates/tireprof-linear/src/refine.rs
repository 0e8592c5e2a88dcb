//! Levenberg–Marquardt polish of a cylinder on its inlier set.
//!
//! Local parametrization around the initial model `(c₀, d₀, r₀)` with
//! `e₁, e₂ ⟂ d₀`:
//!
//! - axis direction `d = m / |m|`, `m = d₀ + a·e₁ + b·e₂`,
//! - axis point `c = c₀ + u·e₁ + v·e₂`,
//! - radius `r`.
//!
//! Residual per point is `|(p − c) − ((p − c)·d)·d| − r`, with the analytic
//! Jacobian over `(a, b, u, v, r)`.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use log::debug;
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use tireprof_core::{math::orthonormal_basis, Pt3, Real, Vec3};

use crate::cylinder::CylinderParams;

struct CylinderProblem<'a> {
    points: &'a [Pt3],
    c0: Pt3,
    d0: Vec3,
    e1: Vec3,
    e2: Vec3,
    params: DVector<Real>,
}

impl CylinderProblem<'_> {
    fn model(&self, x: &DVector<Real>) -> (Pt3, Vec3, Real, Real) {
        let m = self.d0 + self.e1 * x[0] + self.e2 * x[1];
        let m_norm = m.norm();
        let d = m / m_norm;
        let c = self.c0 + self.e1 * x[2] + self.e2 * x[3];
        (c, d, x[4], m_norm)
    }

    fn cost(&self, x: &DVector<Real>) -> Real {
        0.5 * self.residual_vector(x).norm_squared()
    }

    fn residual_vector(&self, x: &DVector<Real>) -> DVector<Real> {
        let (c, d, r, _) = self.model(x);
        DVector::from_iterator(
            self.points.len(),
            self.points.iter().map(|p| {
                let w = p - c;
                (w - d * w.dot(&d)).norm() - r
            }),
        )
    }

    fn params_to_cylinder(&self, x: &DVector<Real>) -> CylinderParams {
        let (c, d, r, _) = self.model(x);
        CylinderParams {
            axis_point: c,
            axis_direction: d,
            radius: r,
        }
    }
}

impl LeastSquaresProblem<Real, Dyn, Dyn> for CylinderProblem<'_> {
    type ResidualStorage = Owned<Real, Dyn>;
    type JacobianStorage = Owned<Real, Dyn, Dyn>;
    type ParameterStorage = Owned<Real, Dyn>;

    fn set_params(&mut self, x: &DVector<Real>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<Real> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<Real>> {
        let r = self.residual_vector(&self.params);
        r.iter().all(|v| v.is_finite()).then_some(r)
    }

    fn jacobian(&self) -> Option<DMatrix<Real>> {
        let (c, d, _, m_norm) = self.model(&self.params);
        let da = (self.e1 - d * d.dot(&self.e1)) / m_norm;
        let db = (self.e2 - d * d.dot(&self.e2)) / m_norm;

        let mut jac = DMatrix::zeros(self.points.len(), 5);
        for (i, p) in self.points.iter().enumerate() {
            let w = p - c;
            let along = w.dot(&d);
            let q = w - d * along;
            let q_norm = q.norm();
            if q_norm <= Real::EPSILON {
                jac[(i, 4)] = -1.0;
                continue;
            }
            let q_hat = q / q_norm;
            jac[(i, 0)] = -along * q_hat.dot(&da);
            jac[(i, 1)] = -along * q_hat.dot(&db);
            jac[(i, 2)] = -q_hat.dot(&self.e1);
            jac[(i, 3)] = -q_hat.dot(&self.e2);
            jac[(i, 4)] = -1.0;
        }
        Some(jac)
    }
}

/// Refine `initial` on `points`; `None` when the solver does not improve the cost.
pub(crate) fn refine_cylinder(
    points: &[Pt3],
    initial: &CylinderParams,
    max_iters: usize,
) -> Option<CylinderParams> {
    if points.len() < 5 {
        return None;
    }
    let d0 = initial.axis_direction.try_normalize(1e-12)?;
    let (e1, e2) = orthonormal_basis(&d0);

    let x0 = DVector::from_column_slice(&[0.0, 0.0, 0.0, 0.0, initial.radius]);
    let problem = CylinderProblem {
        points,
        c0: initial.axis_point,
        d0,
        e1,
        e2,
        params: x0.clone(),
    };
    let initial_cost = problem.cost(&x0);

    let lm = LevenbergMarquardt::new()
        .with_ftol(1e-12)
        .with_xtol(1e-12)
        .with_gtol(1e-12)
        .with_patience(max_iters.max(1));
    let (problem, report) = lm.minimize(problem);

    let x = problem.params();
    let final_cost = problem.cost(&x);
    debug!(
        "cylinder refine: {} evaluations, cost {:.3e} -> {:.3e} ({:?})",
        report.number_of_evaluations, initial_cost, final_cost, report.termination
    );

    if !final_cost.is_finite() || final_cost > initial_cost || x[4] <= 0.0 {
        return None;
    }
    Some(problem.params_to_cylinder(&x))
}
