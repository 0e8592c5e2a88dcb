//! Deterministic synthetic scans for tests and examples.
//!
//! The generators use explicit seeds and stable ordering, so fixtures are
//! identical across runs and platforms.
//!
//! # Example
//!
//! ```
//! use tireprof_core::{synthetic::{AngularCoverage, SyntheticTire}, Pt3, Vec3};
//!
//! let tire = SyntheticTire::new(0.3, Pt3::origin(), Vec3::z(), Vec3::x())
//!     .unwrap()
//!     .with_coverage(AngularCoverage::Facing { half_span: 1.5 });
//! let scan = tire.sample(500);
//! assert_eq!(scan.len(), 500);
//! ```

pub mod noise;
mod tire;

pub use tire::*;
