//! Mutation records and the append-only mutation log

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of edit applied to a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    ValueSpoof,
    ValueBias,
    RouteRedirect,
    ReplayPrime,
}

impl MutationKind {
    pub const ALL: [MutationKind; 4] = [
        Self::ValueSpoof,
        Self::ValueBias,
        Self::RouteRedirect,
        Self::ReplayPrime,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValueSpoof => "value_spoof",
            Self::ValueBias => "value_bias",
            Self::RouteRedirect => "route_redirect",
            Self::ReplayPrime => "replay_prime",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The field value a mutation changed, before or after
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum RecordValue {
    Reading(f32),
    ServiceId(u16),
    Sequence(u32),
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reading(v) => write!(f, "{v}"),
            Self::ServiceId(id) => write!(f, "service {id}"),
            Self::Sequence(seq) => write!(f, "seq {seq}"),
        }
    }
}

/// Audit entry for one mutation attempt that produced a frame
#[derive(Debug, Clone, Serialize)]
pub struct MutationRecord {
    #[serde(serialize_with = "serialize_hex")]
    pub original: Bytes,
    #[serde(serialize_with = "serialize_hex")]
    pub mutated: Bytes,
    pub kind: MutationKind,
    pub pre: RecordValue,
    pub post: RecordValue,
    pub timestamp: DateTime<Utc>,
    /// False when the post-mutation check rejected the frame
    pub success: bool,
    /// The reading was located by the raw tag scan, not a schema decode
    pub via_raw_scan: bool,
}

fn serialize_hex<S: serde::Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

/// Append-only record log shared across workers
///
/// With a capacity bound the oldest records are evicted first.
#[derive(Debug, Default)]
pub struct MutationLog {
    records: Mutex<Vec<Arc<MutationRecord>>>,
    capacity: Option<usize>,
}

impl MutationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(Vec::with_capacity(capacity.min(1024))),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn append(&self, record: Arc<MutationRecord>) {
        let mut records = self.records.lock();
        if let Some(cap) = self.capacity {
            if records.len() >= cap {
                let excess = records.len() + 1 - cap;
                records.drain(..excess);
            }
        }
        records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `n` most recent records, oldest first
    pub fn recent(&self, n: usize) -> Vec<Arc<MutationRecord>> {
        let records = self.records.lock();
        let start = records.len().saturating_sub(n);
        records[start..].to_vec()
    }

    pub fn all(&self) -> Vec<Arc<MutationRecord>> {
        self.records.lock().clone()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

#[cfg(test)]
pub(crate) fn sample_record(kind: MutationKind, post: f32) -> MutationRecord {
    MutationRecord {
        original: Bytes::from_static(b"orig"),
        mutated: Bytes::from_static(b"mut"),
        kind,
        pre: RecordValue::Reading(0.0),
        post: RecordValue::Reading(post),
        timestamp: Utc::now(),
        success: true,
        via_raw_scan: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_indices_are_dense() {
        for (i, kind) in MutationKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_log_capacity_evicts_oldest() {
        let log = MutationLog::with_capacity(3);
        for i in 0..5 {
            log.append(Arc::new(sample_record(MutationKind::ValueSpoof, i as f32)));
        }
        assert_eq!(log.len(), 3);
        let posts: Vec<_> = log.all().iter().map(|r| r.post).collect();
        assert_eq!(
            posts,
            vec![
                RecordValue::Reading(2.0),
                RecordValue::Reading(3.0),
                RecordValue::Reading(4.0)
            ]
        );
    }

    #[test]
    fn test_recent_returns_tail() {
        let log = MutationLog::new();
        for i in 0..4 {
            log.append(Arc::new(sample_record(MutationKind::ReplayPrime, i as f32)));
        }
        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].post, RecordValue::Reading(3.0));
        assert_eq!(log.recent(10).len(), 4);
    }

    #[test]
    fn test_record_serializes_frames_as_hex() {
        let record = sample_record(MutationKind::RouteRedirect, 1.0);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["original"], "6f726967");
        assert_eq!(json["kind"], "route_redirect");
        assert_eq!(json["post"]["type"], "reading");
    }
}
