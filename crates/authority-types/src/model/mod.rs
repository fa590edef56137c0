//! Core data model: principals, policies, mandates, and the ledger's record types.

pub mod ledger;
pub mod mandate;
pub mod policy;
pub mod principal;

pub use ledger::{BatchSource, Decision, EventType, LeafInput, LedgerEvent, LedgerSnapshot, MerkleRoot};
pub use mandate::{ExecutionMandate, MANDATE_PAYLOAD_TYPE};
pub use policy::AuthorityPolicy;
pub use principal::{Principal, PrincipalType};
