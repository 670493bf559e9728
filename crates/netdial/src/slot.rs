//! Result slot - the bounded channel a dial worker and an interrupt race into.
//!
//! Exactly two parties may post into a slot: the worker (once) and an
//! interrupt (at most once, enforced by the handle). The channel holds
//! `SLOT_CAPACITY` values so neither post can ever block, even after the
//! reader has taken its one value and gone away.

use std::io;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// One post per possible sender: the worker and one interrupt.
pub const SLOT_CAPACITY: usize = 2;

/// What a single poster delivers into the slot.
#[derive(Debug)]
pub(crate) enum DialOutcome {
    Established(TcpStream),
    Failed(io::Error),
    Interrupted,
}

impl DialOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Established(_) => "established",
            Self::Failed(_) => "failed",
            Self::Interrupted => "interrupted",
        }
    }
}

pub(crate) fn result_slot() -> (SlotSender, SlotReceiver) {
    let (tx, rx) = mpsc::channel(SLOT_CAPACITY);
    (SlotSender { tx }, SlotReceiver { rx })
}

#[derive(Debug, Clone)]
pub(crate) struct SlotSender {
    tx: mpsc::Sender<DialOutcome>,
}

impl SlotSender {
    /// Post without waiting. A full or sealed slot hands the outcome back so
    /// the caller can dispose of whatever it carries.
    pub fn post(&self, outcome: DialOutcome) -> Result<(), DialOutcome> {
        self.tx.try_send(outcome).map_err(|e| match e {
            TrySendError::Full(outcome) => {
                tracing::error!(outcome = outcome.kind(), "Bug: result slot over capacity");
                outcome
            }
            TrySendError::Closed(outcome) => outcome,
        })
    }
}

#[derive(Debug)]
pub(crate) struct SlotReceiver {
    rx: mpsc::Receiver<DialOutcome>,
}

impl SlotReceiver {
    /// Wait for the first posted outcome.
    ///
    /// Returns `None` only if every sender is gone without posting.
    pub async fn recv(&mut self) -> Option<DialOutcome> {
        self.rx.recv().await
    }

    /// Refuse further posts and return whatever was already buffered.
    ///
    /// Posts racing with the seal either land in the buffer (and are returned
    /// here) or are handed back to their poster.
    pub async fn seal(mut self) -> Vec<DialOutcome> {
        self.rx.close();
        let mut leftover = Vec::new();
        while let Some(outcome) = self.rx.recv().await {
            leftover.push(outcome);
        }
        leftover
    }
}
