//! Running Statistics
//!
//! Lock-free counters updated from every worker, plus the last successful
//! mutation record behind a mutex. `snapshot()` reads each counter once, so
//! a snapshot taken under load can be off by the frames in flight.

use crate::record::{MutationKind, MutationRecord};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct RunningStatistics {
    total_frames: AtomicU64,
    mutated: AtomicU64,
    passed_through: AtomicU64,
    malformed: AtomicU64,
    failures: AtomicU64,
    checksum_failures: AtomicU64,
    injection_errors: AtomicU64,
    per_kind: [AtomicU64; 4],
    last_record: Mutex<Option<Arc<MutationRecord>>>,
}

impl RunningStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&self) {
        self.total_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_passthrough(&self) {
        self.passed_through.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mutation(&self, record: Arc<MutationRecord>) {
        self.mutated.fetch_add(1, Ordering::Relaxed);
        self.per_kind[record.kind.index()].fetch_add(1, Ordering::Relaxed);
        *self.last_record.lock() = Some(record);
    }

    /// A mutation that could not be built or was rejected
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// An inbound frame whose checksum did not verify
    pub fn record_checksum_failure(&self) {
        self.checksum_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_injection_error(&self) {
        self.injection_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last_record(&self) -> Option<Arc<MutationRecord>> {
        self.last_record.lock().clone()
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let per_kind = MutationKind::ALL
            .iter()
            .map(|kind| (*kind, self.per_kind[kind.index()].load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();

        StatisticsSnapshot {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            mutated: self.mutated.load(Ordering::Relaxed),
            passed_through: self.passed_through.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            checksum_failures: self.checksum_failures.load(Ordering::Relaxed),
            injection_errors: self.injection_errors.load(Ordering::Relaxed),
            per_kind,
            last_mutation: self.last_record().map(|r| r.kind),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.total_frames,
            &self.mutated,
            &self.passed_through,
            &self.malformed,
            &self.failures,
            &self.checksum_failures,
            &self.injection_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        for counter in &self.per_kind {
            counter.store(0, Ordering::Relaxed);
        }
        *self.last_record.lock() = None;
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    pub total_frames: u64,
    pub mutated: u64,
    pub passed_through: u64,
    pub malformed: u64,
    pub failures: u64,
    pub checksum_failures: u64,
    pub injection_errors: u64,
    pub per_kind: BTreeMap<MutationKind, u64>,
    pub last_mutation: Option<MutationKind>,
}

impl StatisticsSnapshot {
    pub fn kind_count(&self, kind: MutationKind) -> u64 {
        self.per_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Fraction of frames that left the pipeline mutated
    pub fn mutation_rate(&self) -> f64 {
        if self.total_frames == 0 {
            0.0
        } else {
            self.mutated as f64 / self.total_frames as f64
        }
    }
}
