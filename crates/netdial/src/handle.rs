//! Interruptible handle - the per-attempt object shared by the dialer, its
//! worker, the pending registry and whoever issues the interrupt.
//!
//! State machine:
//! `Idle` → `Dialing` → `Resolved{Success,Failure,Interrupted}` → `Drained`
//!
//! Only the first posted outcome is observed by the dialer. A second post
//! still lands in the slot (or is handed back once the slot is sealed) and is
//! disposed here, closing any connection it carries.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::InterruptError;
use crate::slot::{DialOutcome, SlotReceiver, SlotSender, result_slot};

/// Identifies one dial attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DialId(uuid::Uuid);

impl DialId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for DialId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum HandleState {
    /// Created and possibly registered, worker not launched.
    Idle = 0,
    /// Worker launched, dialer waiting on the slot.
    Dialing = 1,
    ResolvedSuccess = 2,
    ResolvedFailure = 3,
    ResolvedInterrupted = 4,
    /// Slot sealed; nothing further can reach the caller.
    Drained = 5,
}

impl HandleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Dialing,
            2 => Self::ResolvedSuccess,
            3 => Self::ResolvedFailure,
            4 => Self::ResolvedInterrupted,
            _ => Self::Drained,
        }
    }

    /// True once the dialer has consumed its one outcome.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::ResolvedSuccess | Self::ResolvedFailure | Self::ResolvedInterrupted | Self::Drained
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Dialing => "dialing",
            Self::ResolvedSuccess => "resolved_success",
            Self::ResolvedFailure => "resolved_failure",
            Self::ResolvedInterrupted => "resolved_interrupted",
            Self::Drained => "drained",
        }
    }

    fn resolved_by(outcome: &DialOutcome) -> Self {
        match outcome {
            DialOutcome::Established(_) => Self::ResolvedSuccess,
            DialOutcome::Failed(_) => Self::ResolvedFailure,
            DialOutcome::Interrupted => Self::ResolvedInterrupted,
        }
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct HandleInner {
    id: DialId,
    addr: String,
    state: AtomicU8,
    interrupt_posted: AtomicBool,
    orphans_closed: AtomicUsize,
    slot: SlotSender,
}

/// Caller-visible handle for one dial attempt.
///
/// Clones share the same attempt. Holders other than the dialer may only
/// observe it or interrupt it.
#[derive(Clone)]
pub struct InterruptibleHandle {
    inner: Arc<HandleInner>,
}

impl InterruptibleHandle {
    /// Create a handle with a fresh result slot; the receiver goes to the dialer.
    pub(crate) fn new(addr: &str) -> (Self, SlotReceiver) {
        let (slot, receiver) = result_slot();
        let handle = Self {
            inner: Arc::new(HandleInner {
                id: DialId::new(),
                addr: addr.to_string(),
                state: AtomicU8::new(HandleState::Idle as u8),
                interrupt_posted: AtomicBool::new(false),
                orphans_closed: AtomicUsize::new(0),
                slot,
            }),
        };
        (handle, receiver)
    }

    pub fn id(&self) -> DialId {
        self.inner.id
    }

    pub fn addr(&self) -> &str {
        &self.inner.addr
    }

    pub fn state(&self) -> HandleState {
        HandleState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupt_posted.load(Ordering::Acquire)
    }

    /// Connections that arrived after the race was decided and were closed.
    pub fn orphans_closed(&self) -> usize {
        self.inner.orphans_closed.load(Ordering::Acquire)
    }

    /// Abandon this attempt by posting a synthetic interrupted outcome.
    ///
    /// - Unresolved, first call: posts the interrupt; `Ok(())`.
    /// - Unresolved, repeated call: no-op; `Ok(())`.
    /// - Outcome already consumed, or slot sealed: `Err(AlreadyResolved)`,
    ///   nothing changes and `is_interrupted()` stays false.
    ///
    /// `Ok` means the interrupt reached the slot, not that it won the race.
    pub fn interrupt(&self) -> Result<(), InterruptError> {
        let id = self.inner.id;
        if self.state().is_settled() {
            return Err(InterruptError::AlreadyResolved(id));
        }

        // At most one interrupt post per handle keeps the slot within capacity.
        if self.inner.interrupt_posted.swap(true, Ordering::AcqRel) {
            tracing::trace!(dial_id = %id, "Interrupt already posted");
            return Ok(());
        }

        match self.inner.slot.post(DialOutcome::Interrupted) {
            Ok(()) => {
                tracing::debug!(dial_id = %id, addr = %self.inner.addr, "Dial interrupted");
                Ok(())
            }
            Err(_) => {
                // Slot sealed: the dial resolved without this interrupt.
                self.inner.interrupt_posted.store(false, Ordering::Release);
                Err(InterruptError::AlreadyResolved(id))
            }
        }
    }

    pub(crate) fn post(&self, outcome: DialOutcome) {
        if let Err(outcome) = self.inner.slot.post(outcome) {
            self.dispose(outcome);
        }
    }

    pub(crate) fn mark_dialing(&self) {
        self.set_state(HandleState::Dialing);
    }

    pub(crate) fn mark_resolved(&self, outcome: &DialOutcome) {
        self.set_state(HandleState::resolved_by(outcome));
    }

    pub(crate) fn mark_drained(&self) {
        self.set_state(HandleState::Drained);
    }

    /// Dispose of an outcome nobody will consume. A carried connection is
    /// closed here rather than left open and unreferenced.
    pub(crate) fn dispose(&self, outcome: DialOutcome) {
        match outcome {
            DialOutcome::Established(stream) => {
                tracing::warn!(
                    dial_id = %self.inner.id,
                    addr = %self.inner.addr,
                    peer = ?stream.peer_addr().ok(),
                    "Closing orphaned connection"
                );
                drop(stream);
                self.inner.orphans_closed.fetch_add(1, Ordering::AcqRel);
            }
            DialOutcome::Failed(err) => {
                tracing::trace!(
                    dial_id = %self.inner.id,
                    error = %err,
                    "Discarding unobserved dial failure"
                );
            }
            DialOutcome::Interrupted => {}
        }
    }

    fn set_state(&self, state: HandleState) {
        let prev = HandleState::from_u8(self.inner.state.swap(state as u8, Ordering::AcqRel));
        tracing::trace!(dial_id = %self.inner.id, from = %prev, to = %state, "Handle state");
    }
}

impl fmt::Debug for InterruptibleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptibleHandle")
            .field("id", &self.inner.id)
            .field("addr", &self.inner.addr)
            .field("state", &self.state())
            .finish()
    }
}
