//! Core math and data model for `tireprof`.
//!
//! This crate provides the building blocks shared by the solver and
//! pipeline crates:
//!
//! - linear algebra type aliases (`Real`, `Vec3`, `Pt3`, ...),
//! - a deterministic, model-agnostic RANSAC engine with an injectable
//!   random source and cooperative cancellation,
//! - [`PointSet`], the immutable vertex container of a scan,
//! - the values passed between pipeline stages ([`CylinderModel`],
//!   [`Frame`], [`RimBaseline`], [`BandPoint`], [`Profile`]).
//!
//! Scan-to-profile chain (conceptually):
//! `PointSet → CylinderModel → Frame → band + baseline → Profile`

/// Linear algebra type aliases and helpers.
pub mod math;
/// Generic RANSAC engine and traits.
pub mod ransac;
/// Deterministic synthetic scans (tests/examples).
pub mod synthetic;

mod cancel;
mod point_set;
mod types;

pub use cancel::*;
pub use math::*;
pub use point_set::*;
pub use ransac::*;
pub use types::*;
