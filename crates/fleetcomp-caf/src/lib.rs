//! fleetcomp CAF engine: violation classification, CAF generation and
//! numbering, the status state machine, the signature workflow and the
//! incident completion cascade.
//!
//! Everything here is generic over [`fleetcomp_core::repository::Store`]
//! so the engine has no dependency on the database crate.

pub mod cascade;
pub mod classifier;
pub mod config;
pub mod error;
pub mod export;
pub mod generator;
mod lifecycle;
pub mod numbering;
pub mod service;
mod signature;

pub use classifier::{Classification, RiskScore, classify, score_risk};
pub use config::CafConfig;
pub use error::CafError;
pub use export::CafExport;
pub use service::{
    CafDetail, CafService, IncidentDetail, NewAttachment, NewCaf, NewStaff, NewViolation,
    OrganizationRisk, SignatureOutcome, SignatureRequest,
};
