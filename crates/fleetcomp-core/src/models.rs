//! Domain models for fleetcomp.
//!
//! These are the core types shared across all crates.

pub mod audit;
pub mod caf;
pub mod incident;
pub mod organization;
pub mod signature;
pub mod staff;
pub mod violation;
