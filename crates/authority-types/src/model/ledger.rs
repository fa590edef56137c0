//! Ledger Event, Merkle Root, and Snapshot data model (§3.5-3.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The kind of decision an authority-engine call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Issued,
    Validated,
    Denied,
    Revoked,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Validated => "validated",
            Self::Denied => "denied",
            Self::Revoked => "revoked",
        }
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issued" => Ok(Self::Issued),
            "validated" => Ok(Self::Validated),
            "denied" => Ok(Self::Denied),
            "revoked" => Ok(Self::Revoked),
            other => Err(format!("unknown event_type: {other}")),
        }
    }
}

/// Allow/deny outcome recorded on `validated`/`denied` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Denied => "denied",
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allowed" => Ok(Self::Allowed),
            "denied" => Ok(Self::Denied),
            other => Err(format!("unknown decision: {other}")),
        }
    }
}

/// An immutable, sequence-numbered record of an authority-engine decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub event_id: i64,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub principal_id: Uuid,
    pub mandate_id: Option<Uuid>,
    pub decision: Option<Decision>,
    pub denial_reason: Option<String>,
    pub requested_action: Option<String>,
    pub requested_resource: Option<String>,
    #[serde(default)]
    pub event_metadata: Map<String, Value>,
    pub correlation_id: Option<Uuid>,
    /// Null until batched by the Merkle batcher.
    pub merkle_root_id: Option<Uuid>,
}

/// The subset of a ledger event's fields that feed its Merkle leaf hash (§4.6 step 2).
#[derive(Serialize)]
pub struct LeafInput<'a> {
    pub event_id: i64,
    pub principal_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub requested_action: Option<&'a str>,
    pub requested_resource: Option<&'a str>,
}

impl LedgerEvent {
    pub fn leaf_input(&self) -> LeafInput<'_> {
        LeafInput {
            event_id: self.event_id,
            principal_id: self.principal_id,
            timestamp: self.timestamp,
            event_type: self.event_type,
            requested_action: self.requested_action.as_deref(),
            requested_resource: self.requested_resource.as_deref(),
        }
    }
}

/// Whether a Merkle batch was produced by live ingestion or a historical backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSource {
    Live,
    Migration,
}

impl BatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Migration => "migration",
        }
    }
}

impl std::str::FromStr for BatchSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(Self::Live),
            "migration" => Ok(Self::Migration),
            other => Err(format!("unknown batch source: {other}")),
        }
    }
}

/// A contiguous range of ledger events whose leaf hashes build a tree whose
/// signed root tamper-evidences the range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleRoot {
    pub root_id: Uuid,
    pub batch_id: Uuid,
    pub merkle_root: [u8; 32],
    pub signature: Vec<u8>,
    pub event_count: u32,
    pub first_event_id: i64,
    pub last_event_id: i64,
    pub source: BatchSource,
    pub created_at: DateTime<Utc>,
}

/// A lightweight marker allowing recovery to resume without replaying every
/// historical event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub snapshot_id: Uuid,
    pub snapshot_timestamp: DateTime<Utc>,
    pub total_events: i64,
    /// Latest root at snapshot time, or the zero hash if none exists yet.
    pub merkle_root: [u8; 32],
    #[serde(default)]
    pub snapshot_data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_str() {
        for et in [EventType::Issued, EventType::Validated, EventType::Denied, EventType::Revoked] {
            assert_eq!(et.as_str().parse::<EventType>().unwrap(), et);
        }
    }

    #[test]
    fn batch_source_round_trips_through_str() {
        for bs in [BatchSource::Live, BatchSource::Migration] {
            assert_eq!(bs.as_str().parse::<BatchSource>().unwrap(), bs);
        }
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        assert!("mysterious".parse::<EventType>().is_err());
    }

    #[test]
    fn decision_round_trips_through_str() {
        for d in [Decision::Allowed, Decision::Denied] {
            assert_eq!(d.as_str().parse::<Decision>().unwrap(), d);
        }
    }
}
