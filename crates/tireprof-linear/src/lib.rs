//! Closed-form and least-squares solvers for tire scans.
//!
//! - [`cylinder`]: RANSAC cylinder estimation from oriented points, refined
//!   with Levenberg–Marquardt.
//! - [`circle`]: algebraic circle fit used by the cylinder refit.
//! - [`rimline`]: ordinary least-squares rim baseline.

pub mod circle;
pub mod cylinder;
mod refine;
pub mod rimline;

pub use circle::*;
pub use cylinder::*;
pub use rimline::*;
