//! Mandate revocation and cascade (§4.4 `revoke`).

use crate::error::{Result, RuntimeError};
use crate::store::Store;
use authority_types::{CoreError, EventType, LedgerEvent};
use chrono::{DateTime, Utc};
use serde_json::Map;
use tracing::warn;
use uuid::Uuid;

/// Revoke `mandate_id` on `revoker_id`'s behalf, optionally cascading to
/// every unrevoked direct descendant.
///
/// Authorization: `revoker_id` must be the issuer, the subject, or hold any
/// active authority policy (treated as admin — §9 keeps this broad, matching
/// the source system's default).
pub fn revoke(
    store: &Store,
    mandate_id: Uuid,
    revoker_id: Uuid,
    reason: Option<&str>,
    cascade: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let mandate = store.get_mandate(mandate_id)?;

    let is_authorized = revoker_id == mandate.issuer_id
        || revoker_id == mandate.subject_id
        || store.active_policy(revoker_id)?.is_some();
    if !is_authorized {
        return Err(RuntimeError::Core(CoreError::Authorization(
            "revoker holds neither the mandate nor any active authority policy".into(),
        )));
    }

    // 1. Not already revoked.
    if mandate.revoked {
        return Err(RuntimeError::Core(CoreError::StateViolation(
            "ALREADY_REVOKED: mandate has already been revoked".into(),
        )));
    }

    // 2. Atomically set revoked fields.
    store.revoke_mandate(mandate_id, reason, now)?;

    // 3. Append revoked event.
    store.append_event(&LedgerEvent {
        event_id: 0,
        event_type: EventType::Revoked,
        timestamp: now,
        principal_id: revoker_id,
        mandate_id: Some(mandate_id),
        decision: None,
        denial_reason: reason.map(String::from),
        requested_action: None,
        requested_resource: None,
        event_metadata: Map::new(),
        correlation_id: None,
        merkle_root_id: None,
    })?;

    // 4. Cascade to unrevoked direct children.
    if cascade {
        let cascade_reason = format!("Parent {mandate_id} revoked: {}", reason.unwrap_or("no reason given"));
        for child in store.active_children(mandate_id)? {
            if let Err(err) = revoke(store, child.mandate_id, revoker_id, Some(&cascade_reason), true, now) {
                warn!(mandate_id = %child.mandate_id, error = %err, "cascade revocation failed for descendant");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::issue::{issue, IssueParams};
    use authority_types::crypto::keys::generate_keypair;
    use authority_types::{AuthorityPolicy, Principal, PrincipalType};

    fn principal_with_policy(store: &Store, max_depth: u32) -> Uuid {
        let pair = generate_keypair().unwrap();
        let principal = Principal::new("p", PrincipalType::User, "owner", pair.public_key_pem, Some(pair.private_key_pem));
        store.insert_principal(&principal).unwrap();
        let policy = AuthorityPolicy::new(
            principal.principal_id,
            3600,
            vec!["api:*".into()],
            vec!["api_call".into()],
            true,
            max_depth,
            principal.principal_id,
        );
        store.insert_policy(&policy).unwrap();
        principal.principal_id
    }

    #[test]
    fn issuer_can_revoke_own_mandate() {
        let store = Store::memory().unwrap();
        let issuer_id = principal_with_policy(&store, 2);
        let subject = Principal::new("agent", PrincipalType::Agent, "owner", "pem", None);
        store.insert_principal(&subject).unwrap();

        let mandate = issue(
            &store,
            IssueParams {
                issuer_id,
                subject_id: subject.principal_id,
                resource_scope: vec!["api:openai:gpt-4".into()],
                action_scope: vec!["api_call".into()],
                validity_seconds: 1800,
                intent: None,
                parent_mandate_id: None,
            },
            Utc::now(),
        )
        .unwrap();

        revoke(&store, mandate.mandate_id, issuer_id, Some("done"), false, Utc::now()).unwrap();
        let loaded = store.get_mandate(mandate.mandate_id).unwrap();
        assert!(loaded.revoked);
    }

    #[test]
    fn revoking_twice_fails_on_second_attempt() {
        let store = Store::memory().unwrap();
        let issuer_id = principal_with_policy(&store, 2);
        let subject = Principal::new("agent", PrincipalType::Agent, "owner", "pem", None);
        store.insert_principal(&subject).unwrap();

        let mandate = issue(
            &store,
            IssueParams {
                issuer_id,
                subject_id: subject.principal_id,
                resource_scope: vec!["api:openai:gpt-4".into()],
                action_scope: vec!["api_call".into()],
                validity_seconds: 1800,
                intent: None,
                parent_mandate_id: None,
            },
            Utc::now(),
        )
        .unwrap();

        revoke(&store, mandate.mandate_id, issuer_id, None, false, Utc::now()).unwrap();
        let err = revoke(&store, mandate.mandate_id, issuer_id, None, false, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("ALREADY_REVOKED"));
    }

    #[test]
    fn unauthorized_revoker_is_rejected() {
        let store = Store::memory().unwrap();
        let issuer_id = principal_with_policy(&store, 2);
        let subject = Principal::new("agent", PrincipalType::Agent, "owner", "pem", None);
        store.insert_principal(&subject).unwrap();
        let bystander = Principal::new("bystander", PrincipalType::User, "owner", "pem", None);
        store.insert_principal(&bystander).unwrap();

        let mandate = issue(
            &store,
            IssueParams {
                issuer_id,
                subject_id: subject.principal_id,
                resource_scope: vec!["api:openai:gpt-4".into()],
                action_scope: vec!["api_call".into()],
                validity_seconds: 1800,
                intent: None,
                parent_mandate_id: None,
            },
            Utc::now(),
        )
        .unwrap();

        let err = revoke(&store, mandate.mandate_id, bystander.principal_id, None, false, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), "AUTHORIZATION");
    }

    #[test]
    fn cascade_revokes_every_descendant() {
        let store = Store::memory().unwrap();
        let issuer_id = principal_with_policy(&store, 2);
        let subject = Principal::new("agent", PrincipalType::Agent, "owner", "pem", None);
        store.insert_principal(&subject).unwrap();

        let parent = issue(
            &store,
            IssueParams {
                issuer_id,
                subject_id: subject.principal_id,
                resource_scope: vec!["api:*".into()],
                action_scope: vec!["api_call".into()],
                validity_seconds: 3600,
                intent: None,
                parent_mandate_id: None,
            },
            Utc::now(),
        )
        .unwrap();

        let child = issue(
            &store,
            IssueParams {
                issuer_id,
                subject_id: subject.principal_id,
                resource_scope: vec!["api:openai:*".into()],
                action_scope: vec!["api_call".into()],
                validity_seconds: 1800,
                intent: None,
                parent_mandate_id: Some(parent.mandate_id),
            },
            Utc::now(),
        )
        .unwrap();

        revoke(&store, parent.mandate_id, issuer_id, Some("compromised"), true, Utc::now()).unwrap();

        assert!(store.get_mandate(parent.mandate_id).unwrap().revoked);
        assert!(store.get_mandate(child.mandate_id).unwrap().revoked);
    }
}
