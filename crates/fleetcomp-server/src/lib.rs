//! fleetcomp HTTP server: configuration, logging, bearer identity and the
//! JSON API over the CAF service.

pub mod api;
pub mod config;
pub mod identity;
pub mod logging;
mod startup;

pub use startup::{StartupError, run};
