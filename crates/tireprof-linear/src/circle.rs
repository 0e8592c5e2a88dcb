//! Algebraic (Kåsa) circle fit in the plane.

use nalgebra::{Matrix3, Vector3};
use thiserror::Error;
use tireprof_core::{Real, Vec2};

#[derive(Debug, Error)]
pub enum CircleFitError {
    #[error("need at least 3 points for a circle fit, got {0}")]
    NotEnoughPoints(usize),
    #[error("degenerate point configuration for circle fit")]
    Degenerate,
}

/// Circle in the plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle2 {
    pub center: Vec2,
    pub radius: Real,
}

/// Fit `x² + y² + D·x + E·y + F = 0` by linear least squares.
///
/// Points are centered on their mean before building the normal equations.
/// Collinear or coincident points are rejected.
pub fn fit_circle(points: &[Vec2]) -> Result<Circle2, CircleFitError> {
    let n = points.len();
    if n < 3 {
        return Err(CircleFitError::NotEnoughPoints(n));
    }

    let mean = points.iter().fold(Vec2::zeros(), |acc, p| acc + p) / n as Real;

    let mut ata = Matrix3::<Real>::zeros();
    let mut atb = Vector3::<Real>::zeros();
    let mut scale = 0.0;
    for p in points {
        let q = p - mean;
        let row = Vector3::new(q.x, q.y, 1.0);
        let rhs = -(q.x * q.x + q.y * q.y);
        ata += row * row.transpose();
        atb += row * rhs;
        scale += q.norm_squared();
    }
    scale /= n as Real;
    if scale <= Real::EPSILON {
        return Err(CircleFitError::Degenerate);
    }

    // Rank check on the spatial block: collinear points span a single direction.
    let spatial = ata.fixed_view::<2, 2>(0, 0).into_owned() / n as Real;
    let eig = spatial.symmetric_eigen();
    let lo = eig.eigenvalues.min();
    let hi = eig.eigenvalues.max();
    if hi <= 0.0 || lo / hi < 1e-10 {
        return Err(CircleFitError::Degenerate);
    }

    let sol = ata.cholesky().ok_or(CircleFitError::Degenerate)?.solve(&atb);
    let (d, e, f) = (sol[0], sol[1], sol[2]);
    let center = Vec2::new(-0.5 * d, -0.5 * e);
    let r2 = center.norm_squared() - f;
    if !r2.is_finite() || r2 <= 0.0 {
        return Err(CircleFitError::Degenerate);
    }

    Ok(Circle2 {
        center: center + mean,
        radius: r2.sqrt(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_circle_from_arc() {
        let c = Vec2::new(1.5, -0.25);
        let pts: Vec<Vec2> = (0..12)
            .map(|i| {
                let a = -0.6 + 0.1 * i as Real;
                c + Vec2::new(a.cos(), a.sin()) * 0.3
            })
            .collect();
        let fit = fit_circle(&pts).unwrap();
        assert!((fit.center - c).norm() < 1e-9);
        assert!((fit.radius - 0.3).abs() < 1e-9);
    }

    #[test]
    fn rejects_collinear_points() {
        let pts: Vec<Vec2> = (0..5).map(|i| Vec2::new(i as Real, 2.0 * i as Real)).collect();
        assert!(matches!(fit_circle(&pts), Err(CircleFitError::Degenerate)));
    }

    #[test]
    fn rejects_too_few_points() {
        let pts = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0)];
        assert!(matches!(
            fit_circle(&pts),
            Err(CircleFitError::NotEnoughPoints(2))
        ));
    }
}
