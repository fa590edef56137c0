//! Tamper-evident batching of ledger events into signed Merkle roots (§4.6-4.7).

pub mod batcher;
pub mod verifier;

pub use batcher::{close_migration_batch, form_batch, try_form_next_batch, MERKLE_ROOT_PAYLOAD_TYPE};
pub use verifier::{inclusion_proof, verify_batch, verify_time_range, InclusionProof, ProofPosition, ProofStep};
