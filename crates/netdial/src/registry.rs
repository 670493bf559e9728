//! Pending dial registry.
//!
//! Tracks every dial attempt that is still waiting so they can be interrupted
//! in bulk (shutdown, network change). The dialer only needs `add`/`remove`;
//! `interrupt_all` is for whoever drives state changes.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;

use crate::error::InterruptError;
use crate::handle::{DialId, InterruptibleHandle};

pub trait PendingRegistry: Send + Sync {
    /// Register a pending dial. Returns `false` once the registry is closed.
    fn add(&self, handle: &InterruptibleHandle) -> bool;

    fn remove(&self, handle: &InterruptibleHandle);

    /// Interrupt every registered dial. Returns how many interrupts were posted.
    fn interrupt_all(&self) -> usize;
}

/// Concurrent pending-dial registry with a one-way closed flag.
#[derive(Default)]
pub struct PendingDials {
    pending: DashMap<DialId, InterruptibleHandle>,
    closed: AtomicBool,
}

impl PendingDials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse new dials and interrupt everything pending.
    pub fn close(&self) -> usize {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(pending = self.pending.len(), "Closing pending dials");
        }
        self.interrupt_all()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, id: DialId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Snapshot of the currently registered handles.
    pub fn pending(&self) -> Vec<InterruptibleHandle> {
        self.pending.iter().map(|e| e.value().clone()).collect()
    }
}

impl PendingRegistry for PendingDials {
    fn add(&self, handle: &InterruptibleHandle) -> bool {
        if self.is_closed() {
            return false;
        }
        self.pending.insert(handle.id(), handle.clone());

        // Re-check after inserting: a concurrent close() either sees this
        // entry when it sweeps, or we see its flag here and back out.
        if self.is_closed() {
            self.pending.remove(&handle.id());
            return false;
        }
        true
    }

    fn remove(&self, handle: &InterruptibleHandle) {
        self.pending.remove(&handle.id());
    }

    fn interrupt_all(&self) -> usize {
        // Collect first so no map shard stays locked while interrupting.
        let handles = self.pending();
        let mut posted = 0;
        for handle in handles {
            match handle.interrupt() {
                Ok(()) => posted += 1,
                Err(InterruptError::AlreadyResolved(id)) => {
                    tracing::trace!(dial_id = %id, "Skipping resolved dial");
                }
            }
        }
        if posted > 0 {
            tracing::debug!(interrupted = posted, "Interrupted pending dials");
        }
        posted
    }
}
