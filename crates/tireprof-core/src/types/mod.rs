//! Shared data model passed between pipeline stages.
//!
//! Every value here is produced once by a stage and never mutated afterwards;
//! a retried stage yields a new value.

mod cylinder;
mod frame;
mod profile;

pub use cylinder::*;
pub use frame::*;
pub use profile::*;
