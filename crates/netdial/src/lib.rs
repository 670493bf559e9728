//! netdial: interruptible TCP connection establishment.
//!
//! A dial runs as an independent worker task that races an external
//! interrupt into a two-slot result channel. Whichever posts first is what
//! the caller sees; a connection that loses the race is closed.

mod config;
mod connection;
mod connector;
mod dialer;
mod error;
mod handle;
mod registry;
mod slot;
mod worker;

pub use config::{
    CONNECT_TIMEOUT_ENV, DEFAULT_CONNECT_TIMEOUT, DialConfig, DialerConfig,
    INTERRUPT_STRATEGY_ENV, InterruptStrategy, ParseStrategyError,
};
pub use connection::Connection;
pub use connector::{Connector, DeviceBinder, InterfaceBinder, TcpConnector};
pub use dialer::InterruptDialer;
pub use error::{DialError, InterruptError};
pub use handle::{DialId, HandleState, InterruptibleHandle};
pub use registry::{PendingDials, PendingRegistry};
pub use slot::SLOT_CAPACITY;

/// netdial version from Cargo.toml
pub const NETDIAL_VERSION: &str = env!("CARGO_PKG_VERSION");
