//! Principal (§3.1): a named identity that may issue, hold, delegate, or revoke mandates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of identity a principal represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    Agent,
    User,
    Service,
}

impl PrincipalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::User => "user",
            Self::Service => "service",
        }
    }
}

impl std::str::FromStr for PrincipalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent" => Ok(Self::Agent),
            "user" => Ok(Self::User),
            "service" => Ok(Self::Service),
            other => Err(format!("unknown principal_type: {other}")),
        }
    }
}

/// A named identity that may issue, hold, delegate, or revoke mandates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub principal_id: Uuid,
    pub name: String,
    pub principal_type: PrincipalType,
    pub owner: String,
    pub public_key_pem: String,
    /// Present only for principals the system may sign on behalf of.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_pem: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Principal {
    pub fn new(
        name: impl Into<String>,
        principal_type: PrincipalType,
        owner: impl Into<String>,
        public_key_pem: impl Into<String>,
        private_key_pem: Option<String>,
    ) -> Self {
        Self {
            principal_id: Uuid::new_v4(),
            name: name.into(),
            principal_type,
            owner: owner.into(),
            public_key_pem: public_key_pem.into(),
            private_key_pem,
            created_at: Utc::now(),
        }
    }

    /// Whether this principal holds key material the system may sign with.
    pub fn can_sign(&self) -> bool {
        self.private_key_pem.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_type_round_trips_through_str() {
        for pt in [PrincipalType::Agent, PrincipalType::User, PrincipalType::Service] {
            let s = pt.as_str();
            let parsed: PrincipalType = s.parse().unwrap();
            assert_eq!(parsed, pt);
        }
    }

    #[test]
    fn unknown_principal_type_is_rejected() {
        assert!("robot".parse::<PrincipalType>().is_err());
    }

    #[test]
    fn can_sign_reflects_private_key_presence() {
        let signable = Principal::new("p1", PrincipalType::Agent, "org", "pub", Some("priv".into()));
        assert!(signable.can_sign());

        let unsignable = Principal::new("p2", PrincipalType::User, "org", "pub", None);
        assert!(!unsignable.can_sign());
    }
}
