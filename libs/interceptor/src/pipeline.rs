//! # Interception Pipeline
//!
//! ## Per-frame state machine
//!
//! ```text
//! Received ─→ Classified ─┬─→ Mutated ──────────→ Forwarded
//!    │                    ├─→ PassThrough ──────→ Forwarded
//!    │                    └─→ MutationRejected ─→ Forwarded (original bytes)
//!    └─→ Dropped (oversized or undecodable header)
//! ```
//!
//! ## Tasks
//!
//! `start()` spawns `workers` capture tasks that share one capture channel
//! and one periodic poisoning refresh task. All of them watch the same stop
//! signal. `stop()` signals, joins, then restores the link with a fixed
//! number of time-bounded attempts.
//!
//! Dropping a running pipeline ends its tasks but does not restore the link;
//! call `stop()` for that.

use crate::config::{InterceptorConfig, PoisoningConfig};
use crate::directive::{ArmedDirective, Directive, DirectiveSpec};
use crate::directory::ServiceDirectory;
use crate::error::{DirectiveError, InterceptorError, InterceptorResult};
use crate::mutator::{MutatedFrame, Mutator};
use crate::observer::{MutationObserver, ObserverRegistry};
use crate::poison::LinkPoisoner;
use crate::record::{MutationKind, MutationLog};
use crate::stats::{RunningStatistics, StatisticsSnapshot};
use crate::transport::{CaptureChannel, InjectionChannel};
use bytes::Bytes;
use codec::{parse_frame, ProtocolError};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Why a frame was not forwarded
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    Malformed(ProtocolError),
    Oversized { len: usize, max: usize },
}

/// What the pipeline did with one frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Dropped(DropReason),
    PassedThrough,
    Mutated(MutationKind),
    /// A directive applied but produced nothing usable; original forwarded
    MutationRejected,
}

impl FrameOutcome {
    pub fn is_forwarded(&self) -> bool {
        !matches!(self, Self::Dropped(_))
    }
}

/// State shared by every worker
struct PipelineCore {
    max_frame_size: usize,
    fail_closed_on_malformed: bool,
    injection_timeout: Duration,
    directory: Arc<ServiceDirectory>,
    stats: Arc<RunningStatistics>,
    log: Arc<MutationLog>,
    observers: Arc<ObserverRegistry>,
    mutator: Mutator,
    armed: RwLock<Option<Arc<ArmedDirective>>>,
}

impl PipelineCore {
    fn process_frame(&self, bytes: &Bytes) -> (FrameOutcome, Option<Bytes>) {
        self.stats.record_frame();

        if bytes.len() > self.max_frame_size {
            self.stats.record_malformed();
            warn!(len = bytes.len(), max = self.max_frame_size, "Dropping oversized frame");
            let reason = DropReason::Oversized {
                len: bytes.len(),
                max: self.max_frame_size,
            };
            return (FrameOutcome::Dropped(reason), None);
        }

        let frame = match parse_frame(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                self.stats.record_malformed();
                let prefix = &bytes[..bytes.len().min(8)];
                if self.fail_closed_on_malformed {
                    debug!(error = %e, prefix = %hex::encode(prefix), "Dropping malformed frame");
                    return (FrameOutcome::Dropped(DropReason::Malformed(e)), None);
                }
                debug!(error = %e, prefix = %hex::encode(prefix), "Forwarding malformed frame");
                self.stats.record_passthrough();
                return (FrameOutcome::PassedThrough, Some(bytes.clone()));
            }
        };

        let header = frame.header;
        self.directory
            .observe(header.source_service_id, header.target_service_id);

        if !frame.checksum_valid() {
            // Not ours to fix; forward as received
            self.stats.record_checksum_failure();
            warn!(
                seq = header.sequence_number,
                src = header.source_service_id,
                tgt = header.target_service_id,
                "Inbound checksum mismatch, forwarding unmodified"
            );
            return self.pass_through(bytes);
        }

        let armed = match self.armed.read().clone() {
            Some(armed) if armed.applies_to(&header) => armed,
            _ => return self.pass_through(bytes),
        };

        match self.mutator.mutate(bytes, &armed.directive) {
            Ok(mutated) => {
                if self.mutator.validate(&mutated.bytes) {
                    let kind = mutated.kind();
                    self.mutator.commit(&mutated);
                    (FrameOutcome::Mutated(kind), Some(mutated.bytes))
                } else {
                    self.mutator.reject(mutated);
                    self.stats.record_passthrough();
                    (FrameOutcome::MutationRejected, Some(bytes.clone()))
                }
            }
            Err(failure) => {
                debug!(
                    directive = %armed.directive,
                    %failure,
                    "Mutation failed, forwarding original"
                );
                self.stats.record_failure();
                self.stats.record_passthrough();
                (FrameOutcome::MutationRejected, Some(bytes.clone()))
            }
        }
    }

    fn pass_through(&self, bytes: &Bytes) -> (FrameOutcome, Option<Bytes>) {
        self.stats.record_passthrough();
        (FrameOutcome::PassedThrough, Some(bytes.clone()))
    }

    async fn handle_frame(&self, bytes: Bytes, injector: &dyn InjectionChannel) -> FrameOutcome {
        let (outcome, forward) = self.process_frame(&bytes);
        if let Some(out) = forward {
            match timeout(self.injection_timeout, injector.send(&out)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.stats.record_injection_error();
                    warn!("Injection failed: {}", e);
                }
                Err(_) => {
                    self.stats.record_injection_error();
                    warn!(
                        "Injection timed out after {}ms",
                        self.injection_timeout.as_millis()
                    );
                }
            }
        }
        outcome
    }
}

struct RunningState {
    stop_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

/// Live interception over a capture and an injection channel
pub struct InterceptionPipeline {
    core: Arc<PipelineCore>,
    capture: Arc<dyn CaptureChannel>,
    injector: Arc<dyn InjectionChannel>,
    poisoner: Arc<dyn LinkPoisoner>,
    workers: usize,
    poisoning: PoisoningConfig,
    running: Mutex<Option<RunningState>>,
}

impl InterceptionPipeline {
    pub fn new(
        config: &InterceptorConfig,
        capture: Arc<dyn CaptureChannel>,
        injector: Arc<dyn InjectionChannel>,
        poisoner: Arc<dyn LinkPoisoner>,
    ) -> InterceptorResult<Self> {
        config.validate()?;

        let directory = Arc::new(ServiceDirectory::with_services(&config.services));
        let stats = Arc::new(RunningStatistics::new());
        let log = Arc::new(match config.pipeline.mutation_log_capacity {
            Some(capacity) => MutationLog::with_capacity(capacity),
            None => MutationLog::new(),
        });
        let observers = Arc::new(ObserverRegistry::new());
        let mutator = Mutator::new(
            Arc::clone(&directory),
            Arc::clone(&stats),
            Arc::clone(&log),
            Arc::clone(&observers),
            &config.validation,
        );

        let core = PipelineCore {
            max_frame_size: config.pipeline.max_frame_size,
            fail_closed_on_malformed: config.pipeline.fail_closed_on_malformed,
            injection_timeout: config.pipeline.injection_timeout(),
            directory,
            stats,
            log,
            observers,
            mutator,
            armed: RwLock::new(None),
        };

        Ok(Self {
            core: Arc::new(core),
            capture,
            injector,
            poisoner,
            workers: config.pipeline.workers,
            poisoning: config.poisoning.clone(),
            running: Mutex::new(None),
        })
    }

    pub fn directory(&self) -> &Arc<ServiceDirectory> {
        &self.core.directory
    }

    pub fn mutation_log(&self) -> &Arc<MutationLog> {
        &self.core.log
    }

    pub fn register_observer(&self, observer: Arc<dyn MutationObserver>) {
        self.core.observers.register(observer);
    }

    /// Apply a directive to one frame outside the capture loop
    pub fn apply(&self, frame: &[u8], directive: &Directive) -> Option<MutatedFrame> {
        self.core.mutator.apply(frame, directive)
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.core.stats.snapshot()
    }

    pub fn reset_statistics(&self) {
        self.core.stats.reset();
    }

    /// Validate and install a directive, replacing any armed one
    ///
    /// On error nothing changes; a previously armed directive stays armed.
    pub fn arm(&self, spec: &DirectiveSpec) -> Result<(), DirectiveError> {
        let armed = ArmedDirective::from_spec(spec, &self.core.directory)?;
        self.arm_directive(armed);
        Ok(())
    }

    pub fn arm_directive(&self, armed: ArmedDirective) {
        info!(directive = %armed.directive, filter = ?armed.filter, "Directive armed");
        *self.core.armed.write() = Some(Arc::new(armed));
    }

    pub fn disarm(&self) -> Option<ArmedDirective> {
        let previous = self.core.armed.write().take();
        if previous.is_some() {
            info!("Directive disarmed");
        }
        previous.map(|armed| (*armed).clone())
    }

    pub fn armed(&self) -> Option<ArmedDirective> {
        self.core.armed.read().as_deref().cloned()
    }

    /// Classify and possibly mutate one frame without injecting it
    pub fn process_frame(&self, bytes: &Bytes) -> (FrameOutcome, Option<Bytes>) {
        self.core.process_frame(bytes)
    }

    /// Process one frame and inject whatever should be forwarded
    pub async fn handle_frame(&self, bytes: Bytes) -> FrameOutcome {
        self.core.handle_frame(bytes, self.injector.as_ref()).await
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Install channels, start poisoning and spawn the worker tasks
    #[instrument(skip(self), fields(workers = self.workers))]
    pub async fn start(&self) -> InterceptorResult<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(InterceptorError::AlreadyRunning);
        }

        self.capture
            .install()
            .await
            .map_err(|e| InterceptorError::transport(format!("capture channel: {}", e)))?;
        self.injector
            .install()
            .await
            .map_err(|e| InterceptorError::transport(format!("injection channel: {}", e)))?;
        self.poisoner
            .start()
            .await
            .map_err(|e| InterceptorError::transport(format!("link poisoning: {}", e)))?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(self.workers + 1);

        for worker in 0..self.workers {
            tasks.push(tokio::spawn(capture_loop(
                worker,
                Arc::clone(&self.core),
                Arc::clone(&self.capture),
                Arc::clone(&self.injector),
                stop_rx.clone(),
            )));
        }
        tasks.push(tokio::spawn(refresh_loop(
            Arc::clone(&self.poisoner),
            self.poisoning.refresh_interval(),
            stop_rx,
        )));

        info!("Interception pipeline started");
        *running = Some(RunningState { stop_tx, tasks });
        Ok(())
    }

    /// Stop all tasks, restore the link and return the final statistics
    pub async fn stop(&self) -> InterceptorResult<StatisticsSnapshot> {
        let state = self
            .running
            .lock()
            .await
            .take()
            .ok_or(InterceptorError::NotRunning)?;

        // Receivers may already be gone if every task exited on its own
        let _ = state.stop_tx.send(true);
        for result in futures::future::join_all(state.tasks).await {
            if let Err(e) = result {
                error!("Pipeline task ended abnormally: {}", e);
            }
        }

        self.restore_link().await;
        let snapshot = self.core.stats.snapshot();
        info!(
            total = snapshot.total_frames,
            mutated = snapshot.mutated,
            malformed = snapshot.malformed,
            "Interception pipeline stopped"
        );
        Ok(snapshot)
    }

    /// Bounded restore; returns whether an attempt succeeded
    async fn restore_link(&self) -> bool {
        let attempts = self.poisoning.restore_attempts;
        let limit = self.poisoning.restore_timeout();

        for attempt in 1..=attempts {
            match timeout(limit, self.poisoner.restore()).await {
                Ok(Ok(())) => {
                    info!(attempt, "Link mappings restored");
                    return true;
                }
                Ok(Err(e)) => warn!(attempt, attempts, "Link restore failed: {}", e),
                Err(_) => warn!(attempt, attempts, "Link restore timed out after {:?}", limit),
            }
        }
        error!(attempts, "Giving up on link restore");
        false
    }
}

async fn capture_loop(
    worker: usize,
    core: Arc<PipelineCore>,
    capture: Arc<dyn CaptureChannel>,
    injector: Arc<dyn InjectionChannel>,
    mut stop: watch::Receiver<bool>,
) {
    debug!(worker, "Capture worker started");
    loop {
        if *stop.borrow() {
            break;
        }
        let frame = tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
                continue;
            }
            frame = capture.next_frame() => frame,
        };

        match frame {
            Some(bytes) => {
                core.handle_frame(bytes, injector.as_ref()).await;
            }
            None => {
                info!(worker, "Capture channel closed");
                break;
            }
        }
    }
    debug!(worker, "Capture worker stopped");
}

async fn refresh_loop(
    poisoner: Arc<dyn LinkPoisoner>,
    period: Duration,
    mut stop: watch::Receiver<bool>,
) {
    // start() already poisoned once
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = poisoner.refresh().await {
                    warn!("Link poisoning refresh failed: {}", e);
                }
            }
        }
    }
    debug!("Poisoning refresh task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::FlowFilter;
    use crate::poison::NoopPoisoner;
    use crate::transport::{MemoryCapture, MemoryInjector};
    use codec::{create_temperature_payload, encode_frame, MessageType, PacketHeader};

    fn pipeline() -> InterceptionPipeline {
        let (_tx, capture) = MemoryCapture::channel(8);
        let (injector, _rx) = MemoryInjector::channel();
        InterceptionPipeline::new(
            &InterceptorConfig::default(),
            Arc::new(capture),
            Arc::new(injector),
            Arc::new(NoopPoisoner),
        )
        .unwrap()
    }

    fn sensor_frame(src: u16, tgt: u16) -> Bytes {
        let payload = create_temperature_payload(22.0, 0.1).unwrap();
        Bytes::from(encode_frame(
            &PacketHeader::new(MessageType::GuaranteeData, src, tgt, 1),
            &payload,
        ))
    }

    #[test]
    fn test_unarmed_frames_pass_through() {
        let pipeline = pipeline();
        let frame = sensor_frame(1, 2);
        let (outcome, out) = pipeline.process_frame(&frame);
        assert_eq!(outcome, FrameOutcome::PassedThrough);
        assert_eq!(out, Some(frame));
        assert_eq!(pipeline.statistics().passed_through, 1);
        assert_eq!(pipeline.directory().observed_ids(), vec![1, 2]);
    }

    #[test]
    fn test_oversized_frame_dropped() {
        let pipeline = pipeline();
        let (outcome, out) = pipeline.process_frame(&Bytes::from(vec![0u8; 70_000]));
        assert!(matches!(outcome, FrameOutcome::Dropped(DropReason::Oversized { .. })));
        assert!(out.is_none());
        assert_eq!(pipeline.statistics().malformed, 1);
    }

    #[test]
    fn test_filter_limits_mutation_to_flow() {
        let pipeline = pipeline();
        pipeline.arm_directive(ArmedDirective::new(
            Directive::ValueSpoof { target: 30.0 },
            FlowFilter::any().source(1),
        ));

        let (outcome, _) = pipeline.process_frame(&sensor_frame(1, 2));
        assert_eq!(outcome, FrameOutcome::Mutated(MutationKind::ValueSpoof));

        let (outcome, _) = pipeline.process_frame(&sensor_frame(3, 2));
        assert_eq!(outcome, FrameOutcome::PassedThrough);
    }

    #[test]
    fn test_bad_inbound_checksum_is_not_mutated() {
        let pipeline = pipeline();
        pipeline.arm_directive(ArmedDirective::new(
            Directive::ReplayPrime { repeat: 1 },
            FlowFilter::any(),
        ));
        let mut frame = sensor_frame(1, 2).to_vec();
        frame[18] ^= 0xFF;
        let frame = Bytes::from(frame);

        let (outcome, out) = pipeline.process_frame(&frame);
        assert_eq!(outcome, FrameOutcome::PassedThrough);
        assert_eq!(out, Some(frame));
        assert_eq!(pipeline.statistics().checksum_failures, 1);
    }

    #[test]
    fn test_failed_arm_keeps_previous_directive() {
        let pipeline = pipeline();
        pipeline
            .arm(&DirectiveSpec::new("replay-prime").param_value("replay_count", 2))
            .unwrap();
        let err = pipeline
            .arm(&DirectiveSpec::new("route-redirect").param_value("target_service", "Nobody"))
            .unwrap_err();
        assert_eq!(err, DirectiveError::UnknownService("Nobody".into()));
        assert_eq!(
            pipeline.armed().map(|a| a.directive),
            Some(Directive::ReplayPrime { repeat: 2 })
        );
        assert!(pipeline.disarm().is_some());
        assert!(pipeline.armed().is_none());
    }

    #[test]
    fn test_lenient_mode_forwards_malformed() {
        let mut config = InterceptorConfig::default();
        config.pipeline.fail_closed_on_malformed = false;
        let (_tx, capture) = MemoryCapture::channel(1);
        let (injector, _rx) = MemoryInjector::channel();
        let pipeline = InterceptionPipeline::new(
            &config,
            Arc::new(capture),
            Arc::new(injector),
            Arc::new(NoopPoisoner),
        )
        .unwrap();

        let junk = Bytes::from_static(b"definitely not an ASOA frame!!!!!!");
        let (outcome, out) = pipeline.process_frame(&junk);
        assert_eq!(outcome, FrameOutcome::PassedThrough);
        assert_eq!(out, Some(junk));
        assert_eq!(pipeline.statistics().malformed, 1);
    }
}
