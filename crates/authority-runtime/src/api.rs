//! `AuthorityCore`: the single programmatic facade (§6.1) tying together the
//! mandate engine, ledger, Merkle batcher, and recovery over one `Store`.

use crate::config::Config;
use crate::engine::{self, IssueParams, ValidationDecision};
use crate::error::Result;
use crate::merkle::{self, InclusionProof};
use crate::recovery::{self, RecoveryResult};
use crate::store::{EventFilter, Store};
use authority_types::crypto::keys::{generate_keypair, signing_key_from_pem, verifying_key_from_pem};
use authority_types::{AuthorityPolicy, CoreError, Intent, ExecutionMandate, LedgerEvent, LedgerSnapshot, MerkleRoot, Principal, PrincipalType};
use chrono::Utc;
use p256::ecdsa::SigningKey;
use uuid::Uuid;

/// Outcome of [`AuthorityCore::verify_batch`] (§6.3 wire format).
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub batch_id: Uuid,
    pub verified: bool,
    pub stored_root: [u8; 32],
    pub computed_root: Option<[u8; 32]>,
    pub signature_valid: bool,
    pub is_migration_batch: bool,
}

/// The authority core's single programmatic surface.
pub struct AuthorityCore {
    store: Store,
    config: Config,
    batch_signing_key: SigningKey,
    batch_verifying_key_pem: String,
}

impl AuthorityCore {
    /// Construct a core over an existing store, batch-signing key, and config.
    pub fn new(store: Store, config: Config, batch_signing_key_pem: &str, batch_verifying_key_pem: String) -> Result<Self> {
        let batch_signing_key =
            signing_key_from_pem(batch_signing_key_pem).map_err(|e| CoreError::Crypto(e.to_string()))?;
        Ok(Self {
            store,
            config,
            batch_signing_key,
            batch_verifying_key_pem,
        })
    }

    /// Construct a core with a freshly-generated batch-signing keypair, for
    /// tests and ephemeral runs.
    pub fn with_generated_batch_key(store: Store, config: Config) -> Result<Self> {
        let pair = generate_keypair().map_err(|e| CoreError::Crypto(e.to_string()))?;
        Self::new(store, config, &pair.private_key_pem, pair.public_key_pem)
    }

    pub fn register_principal(
        &self,
        name: &str,
        principal_type: PrincipalType,
        owner: &str,
    ) -> Result<Principal> {
        let pair = generate_keypair().map_err(|e| CoreError::Crypto(e.to_string()))?;
        let principal = Principal::new(name, principal_type, owner, pair.public_key_pem, Some(pair.private_key_pem));
        self.store.insert_principal(&principal)?;
        Ok(principal)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_policy(
        &self,
        principal_id: Uuid,
        max_validity_seconds: i64,
        resource_patterns: Vec<String>,
        actions: Vec<String>,
        allow_delegation: bool,
        max_delegation_depth: u32,
        created_by: Uuid,
    ) -> Result<AuthorityPolicy> {
        let policy = AuthorityPolicy::new(
            principal_id,
            max_validity_seconds,
            resource_patterns,
            actions,
            allow_delegation,
            max_delegation_depth,
            created_by,
        );
        self.store.replace_policy(principal_id, &policy)?;
        Ok(policy)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn issue_mandate(
        &self,
        issuer_id: Uuid,
        subject_id: Uuid,
        resource_scope: Vec<String>,
        action_scope: Vec<String>,
        validity_seconds: i64,
        intent: Option<Intent>,
        parent_mandate_id: Option<Uuid>,
    ) -> Result<ExecutionMandate> {
        engine::issue(
            &self.store,
            IssueParams {
                issuer_id,
                subject_id,
                resource_scope,
                action_scope,
                validity_seconds,
                intent,
                parent_mandate_id,
            },
            Utc::now(),
        )
    }

    pub fn validate(
        &self,
        mandate_id: Uuid,
        action: &str,
        resource: &str,
        intent: Option<&Intent>,
    ) -> Result<ValidationDecision> {
        engine::validate(&self.store, mandate_id, action, resource, intent, Utc::now(), self.config.clock_skew_seconds)
    }

    pub fn revoke(&self, mandate_id: Uuid, revoker_id: Uuid, reason: Option<&str>, cascade: bool) -> Result<()> {
        engine::revoke(&self.store, mandate_id, revoker_id, reason, cascade, Utc::now())
    }

    pub fn query_events(&self, filter: &EventFilter) -> Result<Vec<LedgerEvent>> {
        self.store.query_events(filter)
    }

    /// Form and commit the next Merkle batch if the size or time trigger has
    /// fired. Returns `None` if no trigger fired.
    pub fn try_batch(&self) -> Result<Option<MerkleRoot>> {
        merkle::try_form_next_batch(&self.store, &self.config, &self.batch_signing_key)
    }

    /// Batch every remaining unbatched event unconditionally, for closing out
    /// a historical backfill.
    pub fn close_migration_batch(&self) -> Result<Option<MerkleRoot>> {
        merkle::close_migration_batch(&self.store, &self.batch_signing_key)
    }

    pub fn verify_batch(&self, batch_id: Uuid) -> Result<VerificationResult> {
        let root = self
            .store
            .list_merkle_roots()?
            .into_iter()
            .find(|r| r.batch_id == batch_id)
            .ok_or_else(|| CoreError::NotFound(format!("merkle batch {batch_id}")))?;

        let events = self.store.events_in_batch_range(root.first_event_id, root.last_event_id)?;

        let verified = merkle::verify_batch(&root, &events, &self.batch_verifying_key_pem).unwrap_or(false);
        let computed_root = if events.len() == root.event_count as usize {
            let leaves = events
                .iter()
                .map(crate::merkle::batcher::leaf_hash)
                .collect::<std::result::Result<Vec<_>, _>>()
                .ok();
            leaves.and_then(|l| crate::merkle::batcher::compute_merkle_root(&l))
        } else {
            None
        };

        let signature_valid = verifying_key_from_pem(&self.batch_verifying_key_pem)
            .ok()
            .map(|key| {
                authority_types::crypto::verify_payload(
                    merkle::MERKLE_ROOT_PAYLOAD_TYPE,
                    &root.merkle_root,
                    &root.signature,
                    &key,
                )
                .unwrap_or(false)
            })
            .unwrap_or(false);

        Ok(VerificationResult {
            batch_id,
            verified,
            stored_root: root.merkle_root,
            computed_root,
            signature_valid,
            is_migration_batch: matches!(root.source, authority_types::BatchSource::Migration),
        })
    }

    pub fn verify_event_inclusion(&self, event_id: i64) -> Result<Option<InclusionProof>> {
        let Some(root) = self.store.root_for_event(event_id)? else {
            return Ok(None);
        };
        let events = self.store.events_in_batch_range(root.first_event_id, root.last_event_id)?;
        Ok(merkle::inclusion_proof(&root, &events, event_id))
    }

    pub fn create_snapshot(&self) -> Result<LedgerSnapshot> {
        recovery::create_snapshot(&self.store, Utc::now())
    }

    pub fn recover(&self, snapshot_id: Uuid) -> Result<RecoveryResult> {
        recovery::recover_from_snapshot(&self.store, snapshot_id)
    }

    pub fn cleanup_snapshots(&self, retention_days: i64) -> Result<u64> {
        recovery::cleanup(&self.store, retention_days, Utc::now())
    }

    /// Borrow the underlying store, e.g. for direct reads in adapter code.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn batch_verifying_key_pem(&self) -> &str {
        &self.batch_verifying_key_pem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_single_mandate_happy_path() {
        let core = AuthorityCore::with_generated_batch_key(Store::memory().unwrap(), Config::default()).unwrap();

        let issuer = core.register_principal("issuer", PrincipalType::User, "owner").unwrap();
        core.set_policy(issuer.principal_id, 3600, vec!["api:*".into()], vec!["api_call".into()], true, 2, issuer.principal_id).unwrap();
        let subject = core.register_principal("agent", PrincipalType::Agent, "owner").unwrap();

        let mandate = core
            .issue_mandate(issuer.principal_id, subject.principal_id, vec!["api:openai:gpt-4".into()], vec!["api_call".into()], 1800, None, None)
            .unwrap();

        let decision = core.validate(mandate.mandate_id, "api_call", "api:openai:gpt-4", None).unwrap();
        assert!(decision.allowed);

        let events = core.query_events(&EventFilter::default()).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn merkle_round_trip_detects_tampering() {
        let core = AuthorityCore::with_generated_batch_key(Store::memory().unwrap(), Config { batch_size: 1, ..Config::default() }).unwrap();

        let issuer = core.register_principal("issuer", PrincipalType::User, "owner").unwrap();
        core.set_policy(issuer.principal_id, 3600, vec!["api:*".into()], vec!["api_call".into()], true, 2, issuer.principal_id).unwrap();
        let subject = core.register_principal("agent", PrincipalType::Agent, "owner").unwrap();
        core.issue_mandate(issuer.principal_id, subject.principal_id, vec!["api:openai:gpt-4".into()], vec!["api_call".into()], 1800, None, None).unwrap();

        let root = core.try_batch().unwrap().unwrap();
        let result = core.verify_batch(root.batch_id).unwrap();
        assert!(result.verified);

        {
            let conn = core.store().conn.lock().unwrap();
            conn.execute("UPDATE ledger_events SET requested_resource = 'database:prod' WHERE event_id = 1", []).unwrap();
        }

        let tampered = core.verify_batch(root.batch_id).unwrap();
        assert!(!tampered.verified);
        assert_ne!(tampered.stored_root, tampered.computed_root.unwrap());
    }
}
