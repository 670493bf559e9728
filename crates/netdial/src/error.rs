//! Error types for dial attempts and interrupts.

use std::io;

use crate::handle::DialId;

/// Why a dial attempt did not produce a connection.
///
/// Every variant except `Network` is decided before or instead of network I/O,
/// so only `Network` is worth retrying as-is.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("unsupported capability: {0}")]
    UnsupportedCapability(String),

    #[error("pending dials already closed")]
    RegistryClosed,

    #[error("dial {addr} failed: {source}")]
    Network {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("dial {addr} interrupted")]
    Interrupted { addr: String },
}

impl DialError {
    pub(crate) fn network(addr: &str, source: io::Error) -> Self {
        Self::Network {
            addr: addr.to_string(),
            source,
        }
    }

    pub(crate) fn interrupted(addr: &str) -> Self {
        Self::Interrupted {
            addr: addr.to_string(),
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    /// True when repeating the same dial could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// The underlying I/O error kind, for network failures only.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Network { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InterruptError {
    #[error("dial {0} already resolved")]
    AlreadyResolved(DialId),
}
