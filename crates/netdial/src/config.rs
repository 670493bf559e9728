//! Dial configuration.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connector::DeviceBinder;

pub const CONNECT_TIMEOUT_ENV: &str = "NETDIAL_CONNECT_TIMEOUT";
pub const INTERRUPT_STRATEGY_ENV: &str = "NETDIAL_INTERRUPT_STRATEGY";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Per-dial parameters: how long to wait, and which capabilities are required.
#[derive(Clone)]
pub struct DialConfig {
    pub connect_timeout: Duration,
    /// When set, every socket must be bound through this before connecting.
    /// Dialing fails fast if the connector cannot honour it.
    pub device_binder: Option<Arc<dyn DeviceBinder>>,
}

impl Default for DialConfig {
    fn default() -> Self {
        Self {
            connect_timeout: parse_timeout(std::env::var(CONNECT_TIMEOUT_ENV).ok().as_deref()),
            device_binder: None,
        }
    }
}

impl DialConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_device_binder(mut self, binder: Arc<dyn DeviceBinder>) -> Self {
        self.device_binder = Some(binder);
        self
    }

    pub fn requires_device_binding(&self) -> bool {
        self.device_binder.is_some()
    }
}

impl fmt::Debug for DialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialConfig")
            .field("connect_timeout", &self.connect_timeout)
            .field("device_binder", &self.device_binder.is_some())
            .finish()
    }
}

/// Seconds as a float; anything missing, unparseable, non-positive or too
/// large for a `Duration` falls back to the default.
fn parse_timeout(value: Option<&str>) -> Duration {
    value
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT)
}

/// What happens to the dial worker once an interrupt wins the race.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterruptStrategy {
    /// Leave the worker running; a connection it produces later is closed.
    #[default]
    Abandon,
    /// Also abort the worker task, dropping the in-flight socket.
    Abort,
}

impl InterruptStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abandon => "abandon",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for InterruptStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interrupt strategy '{0}', expected 'abandon' or 'abort'")]
pub struct ParseStrategyError(String);

impl FromStr for InterruptStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abandon" => Ok(Self::Abandon),
            "abort" => Ok(Self::Abort),
            _ => Err(ParseStrategyError(s.to_string())),
        }
    }
}

/// Dialer-wide settings, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialerConfig {
    pub strategy: InterruptStrategy,
}

impl Default for DialerConfig {
    fn default() -> Self {
        let strategy = match std::env::var(INTERRUPT_STRATEGY_ENV) {
            Ok(value) => value.parse().unwrap_or_else(|e: ParseStrategyError| {
                tracing::warn!(error = %e, "Ignoring {}", INTERRUPT_STRATEGY_ENV);
                InterruptStrategy::default()
            }),
            Err(_) => InterruptStrategy::default(),
        };
        Self { strategy }
    }
}

impl DialerConfig {
    pub fn with_strategy(strategy: InterruptStrategy) -> Self {
        Self { strategy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_parses_fractional_seconds() {
        assert_eq!(parse_timeout(Some("1.5")), Duration::from_millis(1500));
        assert_eq!(parse_timeout(Some(" 3 ")), Duration::from_secs(3));
    }

    #[test]
    fn timeout_falls_back_to_default() {
        assert_eq!(parse_timeout(None), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(parse_timeout(Some("soon")), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(parse_timeout(Some("0")), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(parse_timeout(Some("-2")), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(parse_timeout(Some("inf")), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(parse_timeout(Some("NaN")), DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(parse_timeout(Some("1e30")), DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn strategy_from_str() {
        assert_eq!("abandon".parse::<InterruptStrategy>(), Ok(InterruptStrategy::Abandon));
        assert_eq!("ABORT".parse::<InterruptStrategy>(), Ok(InterruptStrategy::Abort));

        let err = "cancel".parse::<InterruptStrategy>().unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"unknown interrupt strategy 'cancel', expected 'abandon' or 'abort'");
    }

    #[test]
    fn strategy_serializes_lowercase() {
        let json = serde_json::to_string(&[InterruptStrategy::Abandon, InterruptStrategy::Abort])
            .unwrap();
        insta::assert_snapshot!(json, @r#"["abandon","abort"]"#);
        assert_eq!(
            serde_json::from_str::<InterruptStrategy>("\"abort\"").unwrap(),
            InterruptStrategy::Abort
        );
    }

    #[test]
    fn dial_config_builder() {
        struct NoopBinder;
        impl DeviceBinder for NoopBinder {
            fn bind(&self, _socket: &tokio::net::TcpSocket) -> std::io::Result<()> {
                Ok(())
            }
        }

        let config = DialConfig::default().with_timeout(Duration::from_millis(300));
        assert_eq!(config.connect_timeout, Duration::from_millis(300));
        assert!(!config.requires_device_binding());

        let config = config.with_device_binder(Arc::new(NoopBinder));
        assert!(config.requires_device_binding());
        assert_eq!(
            format!("{config:?}"),
            "DialConfig { connect_timeout: 300ms, device_binder: true }"
        );
    }
}
