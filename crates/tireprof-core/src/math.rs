//! Mathematical utilities and type definitions.
//!
//! This module provides the fundamental types used throughout the workspace
//! and a few helpers for working in planes perpendicular to an axis.

use nalgebra::{Matrix3, Point3, Rotation3, Vector2, Vector3};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 3D rotation (SO(3)) using [`Real`].
pub type Rot3 = Rotation3<Real>;

/// Two unit vectors `(u, v)` spanning the plane perpendicular to `dir`.
///
/// `(u, v, dir)` is right-handed. The seed axis is the world axis least
/// aligned with `dir`, so the result is well conditioned for any input.
/// `dir` must be non-zero.
pub fn orthonormal_basis(dir: &Vec3) -> (Vec3, Vec3) {
    let d = dir.normalize();
    let ax = d.x.abs();
    let ay = d.y.abs();
    let az = d.z.abs();
    let seed = if ax <= ay && ax <= az {
        Vec3::x()
    } else if ay <= az {
        Vec3::y()
    } else {
        Vec3::z()
    };
    let u = (seed - d * d.dot(&seed)).normalize();
    let v = d.cross(&u);
    (u, v)
}

/// Wrap an angle into `(-π, π]`.
pub fn wrap_angle(angle: Real) -> Real {
    use std::f64::consts::{PI, TAU};
    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

/// Component of `v` perpendicular to the unit vector `dir`.
#[inline]
pub fn reject(v: &Vec3, dir: &Vec3) -> Vec3 {
    v - dir * v.dot(dir)
}
