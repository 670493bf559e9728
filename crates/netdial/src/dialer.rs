//! Interrupt dialer - races a dial worker against an external interrupt.
//!
//! Flow:
//! 1. Fail fast on unsupported capabilities
//! 2. Register the handle with the pending registry (refused once closed)
//! 3. Spawn the dial worker
//! 4. Wait for the first outcome in the result slot
//! 5. Seal the slot, closing any connection that lost the race
//!
//! An interrupt does not cancel the connect syscall; it only decides the race.
//! Under `InterruptStrategy::Abort` the worker task is aborted as well.

use std::sync::Arc;

use crate::config::{DialConfig, DialerConfig, InterruptStrategy};
use crate::connection::Connection;
use crate::connector::{Connector, TcpConnector};
use crate::error::DialError;
use crate::handle::InterruptibleHandle;
use crate::registry::PendingRegistry;
use crate::slot::DialOutcome;
use crate::worker::{DialJob, spawn_dial_worker};

/// Removes the handle from the registry on drop unless disarmed.
///
/// Covers every exit after registration: failures, interrupts, and the
/// caller dropping the `dial` future mid-wait.
struct Registration<'a> {
    registry: &'a dyn PendingRegistry,
    handle: Option<InterruptibleHandle>,
}

impl<'a> Registration<'a> {
    fn new(registry: &'a dyn PendingRegistry, handle: &InterruptibleHandle) -> Self {
        Self {
            registry,
            handle: Some(handle.clone()),
        }
    }

    /// Keep the registration; the caller now owns removal.
    fn disarm(&mut self) {
        self.handle = None;
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if let Some(ref handle) = self.handle {
            self.registry.remove(handle);
        }
    }
}

pub struct InterruptDialer {
    registry: Arc<dyn PendingRegistry>,
    connector: Arc<dyn Connector>,
    config: DialerConfig,
}

impl InterruptDialer {
    pub fn new(
        registry: Arc<dyn PendingRegistry>,
        connector: Arc<dyn Connector>,
        config: DialerConfig,
    ) -> Self {
        Self {
            registry,
            connector,
            config,
        }
    }

    /// Dialer over the tokio network stack with environment-derived settings.
    pub fn tcp(registry: Arc<dyn PendingRegistry>) -> Self {
        Self::new(registry, Arc::new(TcpConnector::new()), DialerConfig::default())
    }

    pub fn strategy(&self) -> InterruptStrategy {
        self.config.strategy
    }

    pub fn registry(&self) -> &Arc<dyn PendingRegistry> {
        &self.registry
    }

    /// Establish a connection to `addr`, or fail, or be interrupted.
    ///
    /// On success the handle remains registered; remove it via
    /// `Connection::handle()` once the connection is owned elsewhere.
    /// No retries happen here.
    pub async fn dial(&self, addr: &str, config: &DialConfig) -> Result<Connection, DialError> {
        if config.requires_device_binding() && !self.connector.supports_device_binding() {
            return Err(DialError::UnsupportedCapability(
                "device binding is not supported on this platform".to_string(),
            ));
        }

        let (handle, mut slot) = InterruptibleHandle::new(addr);
        if !self.registry.add(&handle) {
            return Err(DialError::RegistryClosed);
        }
        let mut registration = Registration::new(self.registry.as_ref(), &handle);

        let worker = if handle.is_interrupted() {
            tracing::debug!(dial_id = %handle.id(), addr, "Interrupted before dial worker launch");
            None
        } else {
            handle.mark_dialing();
            tracing::debug!(
                dial_id = %handle.id(),
                addr,
                timeout = ?config.connect_timeout,
                "Launching dial worker"
            );
            Some(spawn_dial_worker(DialJob {
                connector: Arc::clone(&self.connector),
                handle: handle.clone(),
                timeout: config.connect_timeout,
                device_binder: config.device_binder.clone(),
            }))
        };

        // A launched worker posts exactly once, even when it panics or is
        // aborted, and an unlaunched one means the interrupt is already here.
        let outcome = slot.recv().await.unwrap_or(DialOutcome::Interrupted);
        handle.mark_resolved(&outcome);
        tracing::debug!(
            dial_id = %handle.id(),
            addr,
            outcome = outcome.kind(),
            "Dial resolved"
        );

        if let (DialOutcome::Interrupted, Some(worker), InterruptStrategy::Abort) =
            (&outcome, &worker, self.config.strategy)
        {
            worker.abort();
        }

        for leftover in slot.seal().await {
            handle.dispose(leftover);
        }
        handle.mark_drained();

        match outcome {
            DialOutcome::Established(stream) => {
                registration.disarm();
                Ok(Connection::new(stream, handle))
            }
            DialOutcome::Failed(e) => Err(DialError::network(addr, e)),
            DialOutcome::Interrupted => Err(DialError::interrupted(addr)),
        }
    }
}
