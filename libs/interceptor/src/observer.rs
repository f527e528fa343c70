//! Mutation observers
//!
//! Observers run synchronously on the worker that produced the mutation, in
//! registration order. Each call is isolated: an error or a panic is logged
//! and the remaining observers still run. Delivery is at most once.

use crate::record::MutationRecord;
use parking_lot::RwLock;
use std::error::Error;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, warn};

pub type ObserverError = Box<dyn Error + Send + Sync>;

/// Receives every successful mutation
pub trait MutationObserver: Send + Sync {
    fn on_mutation(&self, record: &MutationRecord) -> Result<(), ObserverError>;

    /// Label used in failure logs
    fn name(&self) -> &str {
        "observer"
    }
}

impl<F> MutationObserver for F
where
    F: Fn(&MutationRecord) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_mutation(&self, record: &MutationRecord) -> Result<(), ObserverError> {
        self(record)
    }
}

#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<Vec<Arc<dyn MutationObserver>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, observer: Arc<dyn MutationObserver>) {
        self.observers.write().push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify every observer; returns how many completed without error
    pub fn notify(&self, record: &MutationRecord) -> usize {
        // Snapshot so observers may register others without deadlocking
        let observers = self.observers.read().clone();

        let mut delivered = 0;
        for (index, observer) in observers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| observer.on_mutation(record))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!(
                    observer = observer.name(),
                    index,
                    kind = %record.kind,
                    error = %e,
                    "Mutation observer failed"
                ),
                Err(_) => error!(
                    observer = observer.name(),
                    index,
                    kind = %record.kind,
                    "Mutation observer panicked"
                ),
            }
        }
        delivered
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}
