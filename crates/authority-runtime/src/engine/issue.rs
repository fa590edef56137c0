//! Mandate issuance (§4.4 `issue`): ordered, fail-closed checks against the
//! issuer's active policy and, for delegation, the parent mandate.

use crate::error::{Result, RuntimeError};
use crate::store::Store;
use authority_types::crypto::keys::signing_key_from_pem;
use authority_types::crypto::sign_payload;
use authority_types::{
    CoreError, Decision, EventType, ExecutionMandate, Intent, LedgerEvent, MANDATE_PAYLOAD_TYPE,
};
use authority_types::scope;
use chrono::{DateTime, Utc};
use serde_json::Map;
use uuid::Uuid;

/// Parameters to [`issue`]. Grouped per the teacher's convention of bundling
/// wide call sites into one struct rather than a long positional argument list.
#[derive(Debug, Clone)]
pub struct IssueParams {
    pub issuer_id: Uuid,
    pub subject_id: Uuid,
    pub resource_scope: Vec<String>,
    pub action_scope: Vec<String>,
    pub validity_seconds: i64,
    pub intent: Option<Intent>,
    pub parent_mandate_id: Option<Uuid>,
}

pub fn issue(store: &Store, params: IssueParams, now: DateTime<Utc>) -> Result<ExecutionMandate> {
    match issue_inner(store, &params, now) {
        Ok(mandate) => Ok(mandate),
        Err(err) => {
            if err.is_fatal() {
                return Err(err);
            }
            tracing::warn!(issuer_id = %params.issuer_id, subject_id = %params.subject_id, reason = %err, "mandate issuance denied");
            record_denied(store, &params, now, &err)?;
            Err(err)
        }
    }
}

fn record_denied(store: &Store, params: &IssueParams, now: DateTime<Utc>, err: &RuntimeError) -> Result<()> {
    store.append_event(&LedgerEvent {
        event_id: 0,
        event_type: EventType::Denied,
        timestamp: now,
        principal_id: params.issuer_id,
        mandate_id: None,
        decision: Some(Decision::Denied),
        denial_reason: Some(err.to_string()),
        requested_action: params.action_scope.first().cloned(),
        requested_resource: params.resource_scope.first().cloned(),
        event_metadata: Map::new(),
        correlation_id: None,
        merkle_root_id: None,
    })?;
    Ok(())
}

fn issue_inner(store: &Store, params: &IssueParams, now: DateTime<Utc>) -> Result<ExecutionMandate> {
    if params.resource_scope.is_empty() || params.action_scope.is_empty() {
        return Err(RuntimeError::Core(CoreError::InvalidInput(
            "resource_scope and action_scope must be non-empty".into(),
        )));
    }
    if params.validity_seconds <= 0 {
        return Err(RuntimeError::Core(CoreError::InvalidInput(
            "validity_seconds must be positive".into(),
        )));
    }

    // 1. Active policy for issuer_id exists.
    let policy = store
        .active_policy(params.issuer_id)?
        .ok_or_else(|| RuntimeError::Core(CoreError::ConstraintViolation("NO_POLICY: issuer has no active authority policy".into())))?;

    // 2. validity_seconds <= policy.max_validity_seconds.
    if params.validity_seconds > policy.max_validity_seconds {
        return Err(RuntimeError::Core(CoreError::ConstraintViolation(format!(
            "VALIDITY_EXCEEDS_POLICY: requested {} exceeds policy max {}",
            params.validity_seconds, policy.max_validity_seconds
        ))));
    }

    // 3. resource_scope / action_scope within policy.
    if !scope::is_resource_subset(&params.resource_scope, &policy.allowed_resource_patterns)
        || !scope::is_action_subset(&params.action_scope, &policy.allowed_actions)
    {
        return Err(RuntimeError::Core(CoreError::ConstraintViolation(
            "SCOPE_EXCEEDS_POLICY: requested scope is not contained in the issuer's policy".into(),
        )));
    }

    let valid_from = now;
    let mut valid_until = now + chrono::Duration::seconds(params.validity_seconds);
    let mut delegation_depth = 0u32;

    // 4. Parent-mandate constraints, if delegating.
    if let Some(parent_id) = params.parent_mandate_id {
        let parent = store.get_mandate(parent_id)?;

        // 4a.
        if parent.revoked || now > parent.valid_until {
            return Err(RuntimeError::Core(CoreError::ConstraintViolation(
                "PARENT_INVALID: parent mandate is revoked or expired".into(),
            )));
        }
        // 4b.
        if valid_from < parent.valid_from || valid_until > parent.valid_until {
            return Err(RuntimeError::Core(CoreError::ConstraintViolation(
                "VALIDITY_OUTSIDE_PARENT: child validity window exceeds parent's".into(),
            )));
        }
        // 4c.
        if !scope::is_resource_subset(&params.resource_scope, &parent.resource_scope)
            || !scope::is_action_subset(&params.action_scope, &parent.action_scope)
        {
            return Err(RuntimeError::Core(CoreError::ConstraintViolation(
                "SCOPE_EXCEEDS_PARENT: requested scope is not contained in the parent mandate's scope".into(),
            )));
        }
        // 4d.
        delegation_depth = parent.delegation_depth + 1;
        if delegation_depth > policy.max_delegation_depth {
            return Err(RuntimeError::Core(CoreError::ConstraintViolation(format!(
                "DEPTH_EXCEEDED: delegation depth {} exceeds policy max {}",
                delegation_depth, policy.max_delegation_depth
            ))));
        }
        // Narrow valid_until defensively in case it wasn't already clamped above.
        valid_until = valid_until.min(parent.valid_until);
    }

    // 5. Issuer's private key.
    let issuer = store.get_principal(params.issuer_id)?;
    let private_key_pem = issuer.private_key_pem.as_deref().ok_or_else(|| {
        RuntimeError::Core(CoreError::Crypto("ISSUER_UNSIGNABLE: issuer has no private key on record".into()))
    })?;
    let signing_key = signing_key_from_pem(private_key_pem)
        .map_err(|e| RuntimeError::Core(CoreError::Crypto(format!("ISSUER_UNSIGNABLE: {e}"))))?;

    // 6. Intent hash.
    let intent_hash = params
        .intent
        .as_ref()
        .map(Intent::hash)
        .transpose()
        .map_err(RuntimeError::Core)?;

    // 7. Assign identity and validity window.
    let mandate_id = Uuid::new_v4();
    let mut mandate = ExecutionMandate {
        mandate_id,
        issuer_id: params.issuer_id,
        subject_id: params.subject_id,
        valid_from,
        valid_until,
        resource_scope: params.resource_scope.clone(),
        action_scope: params.action_scope.clone(),
        signature: Vec::new(),
        created_at: now,
        parent_mandate_id: params.parent_mandate_id,
        delegation_depth,
        intent_hash,
        revoked: false,
        revoked_at: None,
        revocation_reason: None,
    };

    // 8. Sign, persist, and record.
    let payload = mandate
        .canonical_payload_bytes()
        .map_err(RuntimeError::Core)?;
    mandate.signature = sign_payload(MANDATE_PAYLOAD_TYPE, &payload, &signing_key)
        .map_err(|e| RuntimeError::Core(CoreError::Crypto(format!("failed to sign mandate: {e}"))))?;

    store.insert_mandate_with_event(
        &mandate,
        &LedgerEvent {
            event_id: 0,
            event_type: EventType::Issued,
            timestamp: now,
            principal_id: params.issuer_id,
            mandate_id: Some(mandate.mandate_id),
            decision: Some(Decision::Allowed),
            denial_reason: None,
            requested_action: params.action_scope.first().cloned(),
            requested_resource: params.resource_scope.first().cloned(),
            event_metadata: Map::new(),
            correlation_id: None,
            merkle_root_id: None,
        },
    )?;

    Ok(mandate)
}
