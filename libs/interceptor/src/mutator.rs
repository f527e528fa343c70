//! # Mutation Engine
//!
//! Edits decoded frames in place and rebuilds them with a self-consistent
//! checksum. Value edits touch only the reading's bytes.
//!
//! ## Lifecycle of one attempt
//!
//! ```text
//! mutate() ──Ok──→ commit()  record logged, statistics, observers notified
//!    │        └──→ reject()  record logged with success = false, failure counted
//!    └──Err─→ failure counted, no record
//! ```
//!
//! [`Mutator::apply`] runs `mutate` then `commit`. The pipeline calls the
//! steps separately so it can put [`Mutator::validate`] in between.

use crate::analysis::{decode_tagged_block, ReadingSource};
use crate::config::ValidationConfig;
use crate::directive::Directive;
use crate::directory::ServiceDirectory;
use crate::observer::ObserverRegistry;
use crate::record::{MutationKind, MutationLog, MutationRecord, RecordValue};
use crate::stats::RunningStatistics;
use bytes::Bytes;
use chrono::Utc;
use codec::{
    current_timestamp_micros, find_tagged_value, parse_frame, parse_frame_verified,
    replace_tagged_value, PlausibleRange, ProtocolError,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Why a directive could not be applied to a frame
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MutationFailure {
    #[error("frame not decodable: {0}")]
    Malformed(#[from] ProtocolError),

    #[error("no reading tagged {tag} in payload")]
    NoReading { tag: u32 },

    #[error("service '{0}' not in directory")]
    UnknownService(String),
}

/// A rebuilt frame and the record describing the edit
#[derive(Debug, Clone)]
pub struct MutatedFrame {
    pub bytes: Bytes,
    pub record: Arc<MutationRecord>,
}

impl MutatedFrame {
    pub fn kind(&self) -> MutationKind {
        self.record.kind
    }
}

/// Applies directives to frames
#[derive(Debug)]
pub struct Mutator {
    directory: Arc<ServiceDirectory>,
    stats: Arc<RunningStatistics>,
    log: Arc<MutationLog>,
    observers: Arc<ObserverRegistry>,
    tag: u32,
    range: PlausibleRange,
}

impl Mutator {
    pub fn new(
        directory: Arc<ServiceDirectory>,
        stats: Arc<RunningStatistics>,
        log: Arc<MutationLog>,
        observers: Arc<ObserverRegistry>,
        validation: &ValidationConfig,
    ) -> Self {
        Self {
            directory,
            stats,
            log,
            observers,
            tag: validation.temperature_topic_id,
            range: validation.plausible_range(),
        }
    }

    /// Mutate, commit on success, count a failure otherwise
    pub fn apply(&self, frame: &[u8], directive: &Directive) -> Option<MutatedFrame> {
        match self.mutate(frame, directive) {
            Ok(mutated) => {
                self.commit(&mutated);
                Some(mutated)
            }
            Err(failure) => {
                debug!(directive = %directive, %failure, "Mutation not applied");
                self.stats.record_failure();
                None
            }
        }
    }

    /// Build the mutated frame without recording anything
    pub fn mutate(
        &self,
        frame: &[u8],
        directive: &Directive,
    ) -> Result<MutatedFrame, MutationFailure> {
        match directive {
            Directive::ValueSpoof { target } => {
                let target = *target;
                self.rewrite_reading(frame, MutationKind::ValueSpoof, |_| target)
            }
            Directive::ValueBias { delta } => {
                let delta = *delta;
                self.rewrite_reading(frame, MutationKind::ValueBias, |v| v + delta)
            }
            Directive::RouteRedirect { service } => self.redirect(frame, service),
            Directive::ReplayPrime { repeat } => self.replay_prime(frame, *repeat),
        }
    }

    /// Publish a successful mutation
    pub fn commit(&self, mutated: &MutatedFrame) {
        info!(
            kind = %mutated.record.kind,
            pre = %mutated.record.pre,
            post = %mutated.record.post,
            raw_scan = mutated.record.via_raw_scan,
            "Frame mutated"
        );
        self.log.append(Arc::clone(&mutated.record));
        self.stats.record_mutation(Arc::clone(&mutated.record));
        self.observers.notify(&mutated.record);
    }

    /// Log a mutation that failed the post-mutation check
    pub fn reject(&self, mutated: MutatedFrame) {
        let mut record = (*mutated.record).clone();
        record.success = false;
        debug!(kind = %record.kind, post = %record.post, "Mutation rejected by validation");
        self.log.append(Arc::new(record));
        self.stats.record_failure();
    }

    /// Sanity gate for a mutated frame
    ///
    /// The checksum must verify and, when the payload carries a tagged
    /// reading, it must be plausible. For a schema-decoded block every float
    /// field is range-checked.
    pub fn validate(&self, frame: &[u8]) -> bool {
        let parsed = match parse_frame_verified(frame) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(error = %e, "Mutated frame failed verification");
                return false;
            }
        };

        if let Some(block) = decode_tagged_block(parsed.payload, self.tag) {
            return codec::validate(&parsed.payload[..block.end], &block.schema, &self.range);
        }
        match find_tagged_value(parsed.payload, self.tag) {
            Some(found) => self.range.contains(found.value as f64),
            None => true,
        }
    }

    fn rewrite_reading(
        &self,
        frame: &[u8],
        kind: MutationKind,
        edit: impl Fn(f32) -> f32,
    ) -> Result<MutatedFrame, MutationFailure> {
        let parsed = parse_frame(frame)?;
        let payload = parsed.payload;

        let (new_payload, pre, post, source) = match decode_tagged_block(payload, self.tag) {
            Some(block) => {
                // Only the reading's four bytes change; labels and padding
                // are carried as received
                let pre = block.reading.value;
                let post = edit(pre);
                let offset = block.reading.offset;
                let mut rebuilt = payload.to_vec();
                rebuilt[offset..offset + 4].copy_from_slice(&post.to_le_bytes());
                (rebuilt, pre, post, ReadingSource::Decoded)
            }
            None => {
                // Unverified path: the tag may be a coincidental match
                let mut rebuilt = payload.to_vec();
                let pre = find_tagged_value(payload, self.tag)
                    .ok_or(MutationFailure::NoReading { tag: self.tag })?
                    .value;
                let post = edit(pre);
                replace_tagged_value(&mut rebuilt, self.tag, post)
                    .ok_or(MutationFailure::NoReading { tag: self.tag })?;
                (rebuilt, pre, post, ReadingSource::RawScan)
            }
        };

        let header = parsed.header.with_payload(&new_payload);
        Ok(self.build(
            frame,
            header.encode(&new_payload),
            kind,
            RecordValue::Reading(pre),
            RecordValue::Reading(post),
            source == ReadingSource::RawScan,
        ))
    }

    fn redirect(&self, frame: &[u8], service: &str) -> Result<MutatedFrame, MutationFailure> {
        let parsed = parse_frame(frame)?;
        let target_id = self
            .directory
            .resolve_name(service)
            .ok_or_else(|| MutationFailure::UnknownService(service.to_string()))?;

        let mut header = parsed.header;
        let pre = header.target_service_id;
        header.target_service_id = target_id;
        let header = header.with_payload(parsed.payload);

        Ok(self.build(
            frame,
            header.encode(parsed.payload),
            MutationKind::RouteRedirect,
            RecordValue::ServiceId(pre),
            RecordValue::ServiceId(target_id),
            false,
        ))
    }

    fn replay_prime(&self, frame: &[u8], repeat: u32) -> Result<MutatedFrame, MutationFailure> {
        let parsed = parse_frame(frame)?;

        let mut header = parsed.header;
        let pre = header.sequence_number;
        header.sequence_number = pre.wrapping_add(repeat);
        header.timestamp_micros = current_timestamp_micros();
        let header = header.with_payload(parsed.payload);

        Ok(self.build(
            frame,
            header.encode(parsed.payload),
            MutationKind::ReplayPrime,
            RecordValue::Sequence(pre),
            RecordValue::Sequence(header.sequence_number),
            false,
        ))
    }

    fn build(
        &self,
        original: &[u8],
        mutated: Vec<u8>,
        kind: MutationKind,
        pre: RecordValue,
        post: RecordValue,
        via_raw_scan: bool,
    ) -> MutatedFrame {
        let bytes = Bytes::from(mutated);
        let record = MutationRecord {
            original: Bytes::copy_from_slice(original),
            mutated: bytes.clone(),
            kind,
            pre,
            post,
            timestamp: Utc::now(),
            success: true,
            via_raw_scan,
        };
        MutatedFrame {
            bytes,
            record: Arc::new(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_services;
    use crate::observer::ObserverError;
    use codec::ucdr::FIELD_TEMPERATURE;
    use codec::{
        create_temperature_payload, decode_required, encode_frame, verify_checksum, MessageType,
        PacketHeader, Schema, UcdrValue, TEMPERATURE_TOPIC_ID,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        mutator: Mutator,
        stats: Arc<RunningStatistics>,
        log: Arc<MutationLog>,
        observers: Arc<ObserverRegistry>,
    }

    fn fixture() -> Fixture {
        let stats = Arc::new(RunningStatistics::new());
        let log = Arc::new(MutationLog::new());
        let observers = Arc::new(ObserverRegistry::new());
        let mutator = Mutator::new(
            Arc::new(ServiceDirectory::with_services(&default_services())),
            Arc::clone(&stats),
            Arc::clone(&log),
            Arc::clone(&observers),
            &ValidationConfig::default(),
        );
        Fixture {
            mutator,
            stats,
            log,
            observers,
        }
    }

    fn sensor_frame(value: f32) -> Vec<u8> {
        let payload = create_temperature_payload(value, 0.1).unwrap();
        encode_frame(&PacketHeader::new(MessageType::GuaranteeData, 1, 2, 500), &payload)
    }

    fn reading(frame: &[u8]) -> UcdrValue {
        let parsed = parse_frame(frame).unwrap();
        decode_required(parsed.payload, &Schema::temperature())
            .unwrap()
            .get(FIELD_TEMPERATURE)
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_value_bias_adds_delta() {
        let f = fixture();
        let mutated = f
            .mutator
            .apply(&sensor_frame(20.0), &Directive::ValueBias { delta: 10.0 })
            .unwrap();
        assert_eq!(reading(&mutated.bytes), UcdrValue::F32(30.0));
        assert!(verify_checksum(&mutated.bytes));
        assert!(!mutated.record.via_raw_scan);
        assert_eq!(f.stats.snapshot().kind_count(MutationKind::ValueBias), 1);
    }

    #[test]
    fn test_value_edit_keeps_trailing_payload_bytes() {
        let f = fixture();
        let mut payload = create_temperature_payload(20.0, 0.1).unwrap();
        payload.extend_from_slice(b"tail");
        let frame = encode_frame(&PacketHeader::new(MessageType::GuaranteeData, 1, 2, 1), &payload);

        let mutated = f
            .mutator
            .apply(&frame, &Directive::ValueSpoof { target: 5.0 })
            .unwrap();
        let parsed = parse_frame(&mutated.bytes).unwrap();
        assert_eq!(parsed.payload.len(), payload.len());
        assert!(parsed.payload.ends_with(b"tail"));
    }

    #[test]
    fn test_value_edit_preserves_non_utf8_label() {
        let label = [b'T', 0xFF, b'm', b'p'];
        let mut payload = TEMPERATURE_TOPIC_ID.to_le_bytes().to_vec();
        payload.extend_from_slice(&4u32.to_le_bytes());
        payload.extend_from_slice(&label);
        payload.extend_from_slice(&20.0f32.to_le_bytes());
        payload.extend_from_slice(&0.1f32.to_le_bytes());
        let frame = encode_frame(&PacketHeader::new(MessageType::GuaranteeData, 1, 2, 1), &payload);

        let f = fixture();
        let mutated = f
            .mutator
            .apply(&frame, &Directive::ValueSpoof { target: 30.0 })
            .unwrap();
        assert!(!mutated.record.via_raw_scan);

        let parsed = parse_frame(&mutated.bytes).unwrap();
        assert_eq!(parsed.payload.len(), payload.len());
        assert_eq!(&parsed.payload[8..12], &label);
        assert_eq!(&parsed.payload[12..16], &30.0f32.to_le_bytes());
        assert_eq!(&parsed.payload[16..], &payload[16..]);
    }

    #[test]
    fn test_truncated_labelled_block_edit_is_flagged() {
        let mut payload = TEMPERATURE_TOPIC_ID.to_le_bytes().to_vec();
        payload.extend_from_slice(&4u32.to_le_bytes());
        payload.extend_from_slice(b"Temp");
        payload.extend_from_slice(&25.5f32.to_le_bytes());
        let frame = encode_frame(&PacketHeader::new(MessageType::GuaranteeData, 1, 2, 1), &payload);

        let f = fixture();
        let mutated = f
            .mutator
            .mutate(&frame, &Directive::ValueSpoof { target: 99.9 })
            .unwrap();
        assert!(mutated.record.via_raw_scan);
    }

    #[test]
    fn test_raw_scan_edit_is_flagged() {
        let f = fixture();
        let mut payload = vec![0xAA, 0xBB];
        payload.extend_from_slice(&TEMPERATURE_TOPIC_ID.to_le_bytes());
        payload.extend_from_slice(&21.0f32.to_le_bytes());
        let header = PacketHeader::new(MessageType::TemperatureData, 1, 2, 1);
        let frame = encode_frame(&header, &payload);

        let mutated = f
            .mutator
            .apply(&frame, &Directive::ValueSpoof { target: 80.0 })
            .unwrap();
        assert!(mutated.record.via_raw_scan);
        assert_eq!(mutated.record.pre, RecordValue::Reading(21.0));
        assert!(verify_checksum(&mutated.bytes));
    }

    #[test]
    fn test_value_spoof_without_reading_fails() {
        let f = fixture();
        let frame = encode_frame(&PacketHeader::new(MessageType::Heartbeat, 1, 2, 1), b"beat");
        assert_eq!(
            f.mutator.mutate(&frame, &Directive::ValueSpoof { target: 1.0 }).unwrap_err(),
            MutationFailure::NoReading {
                tag: TEMPERATURE_TOPIC_ID
            }
        );
        assert!(f.mutator.apply(&frame, &Directive::ValueSpoof { target: 1.0 }).is_none());
        assert_eq!(f.stats.snapshot().failures, 1);
        assert!(f.log.is_empty());
    }

    #[test]
    fn test_replay_prime_advances_sequence() {
        let f = fixture();
        let frame = sensor_frame(20.0);
        let mutated = f
            .mutator
            .apply(&frame, &Directive::ReplayPrime { repeat: 3 })
            .unwrap();
        let header = PacketHeader::decode(&mutated.bytes).unwrap();
        assert_eq!(header.sequence_number, 503);
        assert!(header.timestamp_micros >= PacketHeader::decode(&frame).unwrap().timestamp_micros);
        assert_eq!(mutated.record.post, RecordValue::Sequence(503));
        assert!(verify_checksum(&mutated.bytes));
    }

    #[test]
    fn test_replay_prime_wraps_sequence() {
        let f = fixture();
        let header = PacketHeader::new(MessageType::GuaranteeData, 1, 2, u32::MAX);
        let frame = encode_frame(&header, &[]);
        let mutated = f
            .mutator
            .mutate(&frame, &Directive::ReplayPrime { repeat: 2 })
            .unwrap();
        assert_eq!(PacketHeader::decode(&mutated.bytes).unwrap().sequence_number, 1);
    }

    #[test]
    fn test_redirect_is_idempotent() {
        let f = fixture();
        let directive = Directive::RouteRedirect {
            service: "Cerebrum".into(),
        };
        let once = f.mutator.apply(&sensor_frame(20.0), &directive).unwrap();
        let twice = f.mutator.apply(&once.bytes, &directive).unwrap();
        assert_eq!(once.bytes, twice.bytes);
        assert_eq!(PacketHeader::decode(&twice.bytes).unwrap().target_service_id, 3);
    }

    #[test]
    fn test_malformed_frame_is_failure() {
        let f = fixture();
        let err = f
            .mutator
            .mutate(&[0u8; 20], &Directive::ReplayPrime { repeat: 1 })
            .unwrap_err();
        assert!(matches!(err, MutationFailure::Malformed(_)));
    }

    #[test]
    fn test_validate_gate() {
        let f = fixture();
        let spoofed = f
            .mutator
            .mutate(&sensor_frame(20.0), &Directive::ValueSpoof { target: 5000.0 })
            .unwrap();
        assert!(verify_checksum(&spoofed.bytes));
        assert!(!f.mutator.validate(&spoofed.bytes));

        let fine = f
            .mutator
            .mutate(&sensor_frame(20.0), &Directive::ValueSpoof { target: 40.0 })
            .unwrap();
        assert!(f.mutator.validate(&fine.bytes));

        let mut broken = fine.bytes.to_vec();
        broken[40] ^= 0x01;
        assert!(!f.mutator.validate(&broken));
    }

    #[test]
    fn test_reject_logs_without_notifying() {
        let f = fixture();
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        f.observers
            .register(Arc::new(move |_: &MutationRecord| -> Result<(), ObserverError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));

        let mutated = f
            .mutator
            .mutate(&sensor_frame(20.0), &Directive::ValueSpoof { target: 5000.0 })
            .unwrap();
        f.mutator.reject(mutated);

        assert_eq!(notified.load(Ordering::SeqCst), 0);
        assert_eq!(f.log.len(), 1);
        assert!(!f.log.all()[0].success);
        assert_eq!(f.stats.snapshot().failures, 1);
        assert_eq!(f.stats.snapshot().mutated, 0);
    }
}
