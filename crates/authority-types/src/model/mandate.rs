//! Execution Mandate (§3.3): a signed, time-bounded grant of action+resource scope.

use crate::crypto::{self, keys};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The attributes covered by a mandate's signature: everything except
/// `signature` and the mutable `revoked*` fields (§3.3 invariant).
#[derive(Serialize)]
struct CanonicalMandatePayload<'a> {
    mandate_id: Uuid,
    issuer_id: Uuid,
    subject_id: Uuid,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    resource_scope: &'a [String],
    action_scope: &'a [String],
    created_at: DateTime<Utc>,
    parent_mandate_id: Option<Uuid>,
    delegation_depth: u32,
    intent_hash: Option<&'a str>,
}

/// A signed, time-bounded grant of action+resource scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMandate {
    pub mandate_id: Uuid,
    pub issuer_id: Uuid,
    pub subject_id: Uuid,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub resource_scope: Vec<String>,
    pub action_scope: Vec<String>,
    /// Raw ECDSA signature bytes over the canonical payload above.
    pub signature: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub parent_mandate_id: Option<Uuid>,
    pub delegation_depth: u32,
    pub intent_hash: Option<String>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
}

/// The payload type bound into every mandate signature's PAE envelope.
pub const MANDATE_PAYLOAD_TYPE: &str = "caracal.mandate.v1";

impl ExecutionMandate {
    fn canonical_payload(&self) -> CanonicalMandatePayload<'_> {
        CanonicalMandatePayload {
            mandate_id: self.mandate_id,
            issuer_id: self.issuer_id,
            subject_id: self.subject_id,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            resource_scope: &self.resource_scope,
            action_scope: &self.action_scope,
            created_at: self.created_at,
            parent_mandate_id: self.parent_mandate_id,
            delegation_depth: self.delegation_depth,
            intent_hash: self.intent_hash.as_deref(),
        }
    }

    /// JCS canonical bytes of the signed attributes.
    pub fn canonical_payload_bytes(&self) -> Result<Vec<u8>, CoreError> {
        crypto::jcs::to_vec(&self.canonical_payload())
            .map_err(|e| CoreError::Crypto(format!("failed to canonicalize mandate payload: {e}")))
    }

    /// Verify this mandate's signature against the issuer's current public key.
    pub fn verify_signature(&self, issuer_public_key_pem: &str) -> Result<bool, CoreError> {
        let payload = self.canonical_payload_bytes()?;
        let verifying_key = keys::verifying_key_from_pem(issuer_public_key_pem)
            .map_err(|e| CoreError::Crypto(format!("unusable issuer public key: {e}")))?;
        crypto::verify_payload(MANDATE_PAYLOAD_TYPE, &payload, &self.signature, &verifying_key)
            .map_err(|e| CoreError::Crypto(format!("signature verification failed: {e}")))
    }

    /// Is `now` within `[valid_from, valid_until]`?
    pub fn is_within_validity(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }

    /// `parent_mandate_id` is set iff `delegation_depth > 0` (§3.3 invariant).
    pub fn has_consistent_delegation_fields(&self) -> bool {
        self.parent_mandate_id.is_some() == (self.delegation_depth > 0)
    }
}
