//! Intent parsing and content-hash binding (§4.3).
//!
//! An intent is a structured description of a proposed action. Its hash
//! binds a mandate to exactly one purpose; `context` is deliberately
//! excluded from the hash so tracing/locale metadata never breaks binding.

use crate::crypto::jcs;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A structured description of a proposed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub intent_id: Uuid,
    pub action: String,
    pub resource: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// The subset of an intent's fields that participate in its content hash.
#[derive(Serialize)]
struct HashableIntent<'a> {
    action: &'a str,
    resource: &'a str,
    parameters: &'a Map<String, Value>,
}

impl Intent {
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            intent_id: Uuid::new_v4(),
            action: action.into(),
            resource: resource.into(),
            parameters: Map::new(),
            context: Map::new(),
        }
    }

    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// Parse an intent record, validating that `action`/`resource` are present
    /// non-empty strings.
    pub fn parse(record: &Value) -> Result<Intent, CoreError> {
        let obj = record
            .as_object()
            .ok_or_else(|| CoreError::InvalidInput("intent record must be a JSON object".into()))?;

        let action = obj
            .get("action")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoreError::InvalidInput("intent.action must be a non-empty string".into()))?
            .to_string();

        let resource = obj
            .get("resource")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CoreError::InvalidInput("intent.resource must be a non-empty string".into())
            })?
            .to_string();

        let parameters = match obj.get("parameters") {
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(CoreError::InvalidInput(
                    "intent.parameters must be an object".into(),
                ))
            }
            None => Map::new(),
        };

        let context = match obj.get("context") {
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(CoreError::InvalidInput("intent.context must be an object".into()))
            }
            None => Map::new(),
        };

        let intent_id = obj
            .get("intent_id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Intent {
            intent_id,
            action,
            resource,
            parameters,
            context,
        })
    }

    /// `hex(SHA-256(canonical-JSON({action, resource, parameters})))`.
    pub fn hash(&self) -> Result<String, CoreError> {
        let hashable = HashableIntent {
            action: &self.action,
            resource: &self.resource,
            parameters: &self.parameters,
        };
        let canonical = jcs::to_vec(&hashable)
            .map_err(|e| CoreError::InvalidInput(format!("failed to canonicalize intent: {e}")))?;
        Ok(crate::crypto::sha256_hex(&canonical))
    }

    /// Does this intent's (action, resource) fall within the given scope?
    /// Narrowing only: this never widens what the scope already permits.
    pub fn matches_scope(&self, resource_scope: &[String], action_scope: &[String]) -> bool {
        action_scope.iter().any(|a| a == &self.action)
            && resource_scope.iter().any(|p| crate::scope::matches(&self.resource, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_rejects_missing_action() {
        let record = json!({"resource": "api:openai:gpt-4"});
        let err = Intent::parse(&record).unwrap_err();
        assert_eq!(err.kind(), "INVALID_INPUT");
    }

    #[test]
    fn parse_rejects_empty_resource() {
        let record = json!({"action": "api_call", "resource": ""});
        assert!(Intent::parse(&record).is_err());
    }

    #[test]
    fn parse_accepts_minimal_intent() {
        let record = json!({"action": "api_call", "resource": "api:openai:gpt-4"});
        let intent = Intent::parse(&record).unwrap();
        assert_eq!(intent.action, "api_call");
        assert_eq!(intent.resource, "api:openai:gpt-4");
        assert!(intent.parameters.is_empty());
    }

    #[test]
    fn hash_is_deterministic_and_order_independent() {
        let a = Intent::parse(&json!({
            "action": "api_call", "resource": "r",
            "parameters": {"a": 1, "b": 2}
        }))
        .unwrap();
        let b = Intent::parse(&json!({
            "action": "api_call", "resource": "r",
            "parameters": {"b": 2, "a": 1}
        }))
        .unwrap();
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
    }

    #[test]
    fn hash_excludes_context() {
        let a = Intent::parse(&json!({
            "action": "api_call", "resource": "r", "context": {"trace": "x"}
        }))
        .unwrap();
        let b = Intent::parse(&json!({
            "action": "api_call", "resource": "r", "context": {"trace": "y"}
        }))
        .unwrap();
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
    }

    #[test]
    fn hash_changes_with_action_or_resource() {
        let base = Intent::parse(&json!({"action": "a", "resource": "r"})).unwrap();
        let other = Intent::parse(&json!({"action": "b", "resource": "r"})).unwrap();
        assert_ne!(base.hash().unwrap(), other.hash().unwrap());
    }

    #[test]
    fn matches_scope_requires_both_action_and_resource() {
        let intent = Intent::new("api_call", "api:openai:gpt-4");
        let resource_scope = vec!["api:*".to_string()];
        let action_scope = vec!["api_call".to_string()];
        assert!(intent.matches_scope(&resource_scope, &action_scope));

        let wrong_action = vec!["database_call".to_string()];
        assert!(!intent.matches_scope(&resource_scope, &wrong_action));
    }
}
