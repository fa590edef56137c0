//! The mandate lifecycle engine (§4.4): issuance, validation, and revocation
//! with cascade, each as an ordered, fail-closed sequence of checks.

pub mod issue;
pub mod revoke;
pub mod validate;

pub use issue::{issue, IssueParams};
pub use revoke::revoke;
pub use validate::{validate, ValidationDecision};
