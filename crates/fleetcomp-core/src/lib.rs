//! fleetcomp core: domain models, error taxonomy, repository traits and
//! the capability check shared by every other crate.

pub mod access;
pub mod error;
pub mod models;
pub mod repository;
