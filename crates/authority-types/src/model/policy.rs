//! Authority Policy (§3.2): caps on what a principal may issue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caps on what a principal may issue: validity ceiling, allowed resource and
/// action patterns, and delegation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityPolicy {
    pub policy_id: Uuid,
    /// The policy's subject: constrains what this principal may *issue*.
    pub principal_id: Uuid,
    pub max_validity_seconds: i64,
    pub allowed_resource_patterns: Vec<String>,
    pub allowed_actions: Vec<String>,
    pub allow_delegation: bool,
    pub max_delegation_depth: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
}

impl AuthorityPolicy {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        principal_id: Uuid,
        max_validity_seconds: i64,
        allowed_resource_patterns: Vec<String>,
        allowed_actions: Vec<String>,
        allow_delegation: bool,
        max_delegation_depth: u32,
        created_by: Uuid,
    ) -> Self {
        Self {
            policy_id: Uuid::new_v4(),
            principal_id,
            max_validity_seconds,
            allowed_resource_patterns,
            allowed_actions,
            allow_delegation,
            max_delegation_depth,
            active: true,
            created_at: Utc::now(),
            created_by,
        }
    }

    /// Deactivated copy of this policy, used when replacing it (§3.2 lifecycle:
    /// "modified by replacement — create new, deactivate old").
    pub fn deactivated(&self) -> Self {
        let mut copy = self.clone();
        copy.active = false;
        copy
    }
}
