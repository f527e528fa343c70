//! Link-layer poisoning seam
//!
//! Whatever diverts traffic through the interceptor (ARP cache poisoning,
//! a bridge, a routing rule) sits behind [`LinkPoisoner`]. The pipeline
//! starts it before capture, refreshes it on a timer, and restores the
//! original mappings on stop with a bounded number of attempts.

use crate::error::InterceptorResult;
use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait LinkPoisoner: Send + Sync {
    /// Divert traffic; failure prevents the pipeline from starting
    async fn start(&self) -> InterceptorResult<()>;

    /// Re-assert the diversion; called every refresh interval
    async fn refresh(&self) -> InterceptorResult<()>;

    /// Undo the diversion
    async fn restore(&self) -> InterceptorResult<()>;
}

/// Poisoner for setups where traffic already reaches the interceptor
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPoisoner;

#[async_trait]
impl LinkPoisoner for NoopPoisoner {
    async fn start(&self) -> InterceptorResult<()> {
        debug!("No link poisoning configured");
        Ok(())
    }

    async fn refresh(&self) -> InterceptorResult<()> {
        Ok(())
    }

    async fn restore(&self) -> InterceptorResult<()> {
        Ok(())
    }
}
