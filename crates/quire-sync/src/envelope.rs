//! Sync envelope: the JSON message exchanged over the transport.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::diff::Diff;
use crate::transport::SessionIdentity;

/// Exclusive upper bound for generated sender ids.
pub const SENDER_ID_RANGE: u64 = 100_000_000;

/// Envelope operation code.
///
/// Unknown codes are kept so they can be logged and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Operation {
    /// No-op. The relay ends the connection's read loop on it.
    Ignore,
    /// Carries a diff to replay.
    Update,
    Other(i64),
}

impl From<i64> for Operation {
    fn from(code: i64) -> Self {
        match code {
            0 => Operation::Ignore,
            1 => Operation::Update,
            other => Operation::Other(other),
        }
    }
}

impl From<Operation> for i64 {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Ignore => 0,
            Operation::Update => 1,
            Operation::Other(code) => code,
        }
    }
}

/// Per-session random id used to recognise our own echoes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderId(pub u64);

impl SenderId {
    /// Draw a fresh id from `0..SENDER_ID_RANGE`.
    pub fn random() -> Self {
        Self(rand::random_range(0..SENDER_ID_RANGE))
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One synchronization message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    #[serde(rename = "opt")]
    pub operation: Operation,
    #[serde(rename = "name", default)]
    pub document_name: SmolStr,
    #[serde(default)]
    pub diffs: Option<Diff>,
    #[serde(rename = "doc_id")]
    pub document_id: i64,
    /// Vestigial full-text field. Always sent empty and never read.
    #[serde(rename = "mark_down", default)]
    pub content_unused: String,
    #[serde(rename = "random_id")]
    pub sender_id: SenderId,
}

impl SyncEnvelope {
    /// Update envelope carrying `diffs` for the session's document.
    pub fn update(identity: &SessionIdentity, diffs: Diff) -> Self {
        Self {
            operation: Operation::Update,
            document_name: identity.document_name.clone(),
            diffs: Some(diffs),
            document_id: identity.document_id,
            content_unused: String::new(),
            sender_id: identity.sender_id,
        }
    }

    /// No-op envelope, used to end a relay connection politely.
    pub fn ignore(identity: &SessionIdentity) -> Self {
        Self {
            operation: Operation::Ignore,
            diffs: None,
            ..Self::update(identity, Diff::default())
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_update(&self) -> bool {
        self.operation == Operation::Update
    }

    /// Diff segments, if there are any.
    pub fn diff(&self) -> Option<&Diff> {
        self.diffs.as_ref().filter(|d| !d.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffSegment, encode};

    fn identity() -> SessionIdentity {
        SessionIdentity {
            document_name: "notes".into(),
            document_id: 42,
            sender_id: SenderId(1234),
        }
    }

    #[test]
    fn test_update_envelope_wire_format() {
        let envelope = SyncEnvelope::update(&identity(), encode("hello world", "hello brave world"));
        let json = serde_json::to_string_pretty(&envelope).unwrap();
        insta::assert_snapshot!(json, @r#"
        {
          "opt": 1,
          "name": "notes",
          "diffs": [
            {
              "count": 6,
              "type": 0,
              "value": ""
            },
            {
              "count": 6,
              "type": 1,
              "value": "brave "
            },
            {
              "count": 5,
              "type": 0,
              "value": ""
            }
          ],
          "doc_id": 42,
          "mark_down": "",
          "random_id": 1234
        }
        "#);
    }

    #[test]
    fn test_ignore_envelope_wire_format() {
        let json = SyncEnvelope::ignore(&identity()).to_json().unwrap();
        insta::assert_snapshot!(json, @r#"{"opt":0,"name":"notes","diffs":null,"doc_id":42,"mark_down":"","random_id":1234}"#);
    }

    #[test]
    fn test_decode_relay_message() {
        let json = r#"{"opt":1,"name":"notes","diffs":[{"count":2,"type":2,"value":""},{"count":1,"type":1,"value":"x"}],"doc_id":7,"mark_down":"ignored","random_id":99}"#;
        let envelope = SyncEnvelope::from_json(json).unwrap();
        assert!(envelope.is_update());
        assert_eq!(envelope.document_id, 7);
        assert_eq!(envelope.sender_id, SenderId(99));
        assert_eq!(
            envelope.diff().unwrap().segments(),
            &[DiffSegment::Deleted(2), DiffSegment::Inserted("x".into())]
        );
    }

    #[test]
    fn test_decode_null_and_missing_diffs() {
        let null = SyncEnvelope::from_json(r#"{"opt":1,"name":"n","diffs":null,"doc_id":1,"mark_down":"","random_id":5}"#).unwrap();
        assert!(null.diff().is_none());

        let missing = SyncEnvelope::from_json(r#"{"opt":1,"doc_id":1,"random_id":5}"#).unwrap();
        assert!(missing.diff().is_none());
        assert_eq!(missing.document_name, "");
    }

    #[test]
    fn test_unknown_operation_preserved() {
        let envelope = SyncEnvelope::from_json(r#"{"opt":9,"doc_id":1,"random_id":5}"#).unwrap();
        assert_eq!(envelope.operation, Operation::Other(9));
        assert!(!envelope.is_update());
        assert!(envelope.to_json().unwrap().starts_with(r#"{"opt":9,"#));
    }

    #[test]
    fn test_unknown_segment_type_is_decode_error() {
        let json = r#"{"opt":1,"diffs":[{"count":1,"type":3,"value":""}],"doc_id":1,"random_id":5}"#;
        assert!(SyncEnvelope::from_json(json).is_err());
    }

    #[test]
    fn test_random_sender_id_in_range() {
        for _ in 0..100 {
            assert!(SenderId::random().0 < SENDER_ID_RANGE);
        }
    }
}
