//! Persistence, mandate lifecycle engine, and Merkle batching for the
//! Caracal pre-execution authority enforcement core.
//!
//! `authority-types` carries the pure domain model; this crate wires it to
//! SQLite and exposes the programmatic surface (`AuthorityCore`) that a CLI
//! or service adapter drives.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod merkle;
pub mod recovery;
pub mod store;

pub use api::{AuthorityCore, VerificationResult};
pub use config::Config;
pub use engine::{issue, revoke, validate, IssueParams, ValidationDecision};
pub use error::{Result, RuntimeError};
pub use merkle::{inclusion_proof, verify_batch, verify_time_range, InclusionProof, ProofPosition, ProofStep};
pub use recovery::RecoveryResult;
pub use store::{EventFilter, Store};
