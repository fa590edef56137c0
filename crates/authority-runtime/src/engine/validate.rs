//! Mandate validation (§4.4 `validate`): fail-closed checks run in a fixed
//! order; every outcome — allowed or denied — is recorded.

use crate::error::{Result, RuntimeError};
use crate::store::Store;
use authority_types::{scope, CoreError, Decision, EventType, Intent, LedgerEvent};
use chrono::{DateTime, Utc};
use serde_json::Map;
use uuid::Uuid;

/// Outcome of a `validate` call. Always returned, never an error on its own —
/// a denial is a value, not an exception (§9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

pub fn validate(
    store: &Store,
    mandate_id: Uuid,
    requested_action: &str,
    requested_resource: &str,
    intent: Option<&Intent>,
    now: DateTime<Utc>,
    clock_skew_seconds: i64,
) -> Result<ValidationDecision> {
    let outcome = validate_inner(store, mandate_id, requested_action, requested_resource, intent, now, clock_skew_seconds);

    let (decision, reason, mandate_id_for_event) = match &outcome {
        Ok(()) => (Decision::Allowed, None, Some(mandate_id)),
        Err(err) if !err.is_fatal() => {
            tracing::warn!(%mandate_id, reason = %err, "mandate validation denied");
            (Decision::Denied, Some(err.to_string()), Some(mandate_id))
        }
        Err(err) => return Err(err.clone()),
    };

    let issuer_hint = store.get_mandate(mandate_id).ok().map(|m| m.issuer_id).unwrap_or(mandate_id);
    store.append_event(&LedgerEvent {
        event_id: 0,
        event_type: if decision == Decision::Allowed { EventType::Validated } else { EventType::Denied },
        timestamp: now,
        principal_id: issuer_hint,
        mandate_id: mandate_id_for_event,
        decision: Some(decision),
        denial_reason: reason.clone(),
        requested_action: Some(requested_action.to_string()),
        requested_resource: Some(requested_resource.to_string()),
        event_metadata: Map::new(),
        correlation_id: None,
        merkle_root_id: None,
    })?;

    Ok(ValidationDecision {
        allowed: decision == Decision::Allowed,
        reason,
    })
}

fn validate_inner(
    store: &Store,
    mandate_id: Uuid,
    requested_action: &str,
    requested_resource: &str,
    intent: Option<&Intent>,
    now: DateTime<Utc>,
    clock_skew_seconds: i64,
) -> Result<()> {
    // 1. Mandate loads.
    let mandate = store.get_mandate(mandate_id)?;

    // 2. Not revoked.
    if mandate.revoked {
        return Err(RuntimeError::Core(CoreError::StateViolation("REVOKED: mandate has been revoked".into())));
    }

    // 3. Within validity window, tolerant of clock skew at the edges.
    let skew = chrono::Duration::seconds(clock_skew_seconds.max(0));
    if now + skew < mandate.valid_from {
        return Err(RuntimeError::Core(CoreError::StateViolation("NOT_YET_VALID: mandate is not yet valid".into())));
    }
    if now - skew > mandate.valid_until {
        return Err(RuntimeError::Core(CoreError::StateViolation("EXPIRED: mandate validity window has passed".into())));
    }

    // 4. Signature verifies against the issuer's current public key.
    let issuer = store.get_principal(mandate.issuer_id)?;
    let signature_ok = mandate
        .verify_signature(&issuer.public_key_pem)
        .map_err(RuntimeError::Core)?;
    if !signature_ok {
        return Err(RuntimeError::Core(CoreError::StateViolation(
            "SIGNATURE_INVALID: mandate signature does not verify against issuer's current key".into(),
        )));
    }

    // 5. Requested action/resource within scope.
    let action_ok = mandate.action_scope.iter().any(|a| a == requested_action);
    let resource_ok = mandate.resource_scope.iter().any(|p| scope::matches(requested_resource, p));
    if !action_ok || !resource_ok {
        return Err(RuntimeError::Core(CoreError::Authorization(
            "OUT_OF_SCOPE: requested action/resource is not within the mandate's granted scope".into(),
        )));
    }

    // 6. Intent binding, if the mandate is bound to one.
    if let Some(expected_hash) = &mandate.intent_hash {
        let supplied = intent.ok_or_else(|| {
            RuntimeError::Core(CoreError::Authorization(
                "INTENT_MISMATCH: mandate is intent-bound but no intent was supplied".into(),
            ))
        })?;
        let supplied_hash = supplied.hash().map_err(RuntimeError::Core)?;
        if &supplied_hash != expected_hash {
            return Err(RuntimeError::Core(CoreError::Authorization(
                "INTENT_MISMATCH: supplied intent does not match the mandate's bound intent".into(),
            )));
        }
    }

    Ok(())
}
