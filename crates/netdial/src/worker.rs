//! Dial worker - one bounded connect attempt, posted into the result slot.
//!
//! The worker does not know whether anyone is still waiting. It always posts;
//! if the slot was sealed in the meantime the handle closes what it carried.
//! A worker that panics or is aborted still posts a failure on its way out,
//! so the dialer never waits on an empty slot.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::connector::{Connector, DeviceBinder, timed_out};
use crate::handle::InterruptibleHandle;
use crate::slot::DialOutcome;

pub(crate) struct DialJob {
    pub connector: Arc<dyn Connector>,
    pub handle: InterruptibleHandle,
    pub timeout: Duration,
    pub device_binder: Option<Arc<dyn DeviceBinder>>,
}

/// Posts exactly once: the real outcome, or a failure if dropped first.
struct OutcomeGuard {
    handle: Option<InterruptibleHandle>,
}

impl OutcomeGuard {
    fn new(handle: &InterruptibleHandle) -> Self {
        Self {
            handle: Some(handle.clone()),
        }
    }

    fn post(mut self, outcome: DialOutcome) {
        if let Some(handle) = self.handle.take() {
            handle.post(outcome);
        }
    }
}

impl Drop for OutcomeGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::warn!(
                dial_id = %handle.id(),
                addr = %handle.addr(),
                "Dial worker ended without an outcome"
            );
            handle.post(DialOutcome::Failed(io::Error::other(
                "dial worker ended without an outcome",
            )));
        }
    }
}

pub(crate) fn spawn_dial_worker(job: DialJob) -> JoinHandle<()> {
    // Built outside the task so an abort before the first poll still posts.
    let guard = OutcomeGuard::new(&job.handle);
    tokio::spawn(run_dial_worker(job, guard))
}

async fn run_dial_worker(job: DialJob, guard: OutcomeGuard) {
    let DialJob {
        connector,
        handle,
        timeout,
        device_binder,
    } = job;

    // The same timeout bounds this task even if the connector ignores it.
    let connect = connector.connect(handle.addr(), timeout, device_binder.as_deref());
    let outcome = match tokio::time::timeout(timeout, connect).await {
        Ok(Ok(stream)) => DialOutcome::Established(stream),
        Ok(Err(e)) => DialOutcome::Failed(e),
        Err(_) => DialOutcome::Failed(timed_out(timeout)),
    };

    tracing::debug!(
        dial_id = %handle.id(),
        addr = %handle.addr(),
        outcome = outcome.kind(),
        "Dial worker finished"
    );
    guard.post(outcome);
}
