//! # ASOA Interceptor
//!
//! ## Purpose
//!
//! Sits between ASOA services, classifies every captured frame and, when a
//! directive is armed, rewrites it so the receiver still accepts it:
//! - Directive validation and flow filtering
//! - Mutation engine (value spoof, value bias, route redirect, replay prime)
//! - Service directory with name and id lookup
//! - Running statistics, mutation log and observer notification
//! - Async pipeline over pluggable capture, injection and poisoning seams
//!
//! ## Architecture Role
//!
//! ```text
//! CaptureChannel ─→ InterceptionPipeline ─→ InjectionChannel
//!                        │
//!                        ├─ codec (header, checksum, ucdr)
//!                        ├─ Mutator ─→ MutationLog / RunningStatistics
//!                        │               └─→ MutationObserver(s)
//!                        └─ LinkPoisoner (start / refresh / restore)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use interceptor::{Directive, InterceptorConfig, Mutator, MutationLog,
//!     ObserverRegistry, RunningStatistics, ServiceDirectory};
//! use std::sync::Arc;
//!
//! # fn frame() -> Vec<u8> { Vec::new() }
//! let config = InterceptorConfig::default();
//! let mutator = Mutator::new(
//!     Arc::new(ServiceDirectory::with_services(&config.services)),
//!     Arc::new(RunningStatistics::new()),
//!     Arc::new(MutationLog::new()),
//!     Arc::new(ObserverRegistry::new()),
//!     &config.validation,
//! );
//! if let Some(mutated) = mutator.apply(&frame(), &Directive::ValueSpoof { target: 99.9 }) {
//!     println!("{} -> {}", mutated.record.pre, mutated.record.post);
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod directive;
pub mod directory;
pub mod error;
pub mod logging;
pub mod mutator;
pub mod observer;
pub mod pipeline;
pub mod poison;
pub mod record;
pub mod stats;
pub mod transport;

pub use analysis::{
    analyze, group_flows, locate_reading, temperature_flows, FrameAnalysis, LocatedReading,
    ReadingSource,
};
pub use config::{
    default_services, InterceptorConfig, LoggingConfig, PipelineConfig, PoisoningConfig,
    ServiceEntry, TransportConfig, ValidationConfig,
};
pub use directive::{ArmedDirective, Directive, DirectiveSpec, FlowFilter};
pub use directory::ServiceDirectory;
pub use error::{DirectiveError, InterceptorError, InterceptorResult};
pub use logging::init_logging;
pub use mutator::{MutatedFrame, MutationFailure, Mutator};
pub use observer::{MutationObserver, ObserverError, ObserverRegistry};
pub use pipeline::{DropReason, FrameOutcome, InterceptionPipeline};
pub use poison::{LinkPoisoner, NoopPoisoner};
pub use record::{MutationKind, MutationLog, MutationRecord, RecordValue};
pub use stats::{RunningStatistics, StatisticsSnapshot};
pub use transport::{CaptureChannel, InjectionChannel, MemoryCapture, MemoryInjector, UdpRelay};
