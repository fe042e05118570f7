//! Outbound delivery channels (push, email, ...).
//!
//! Delivery is best-effort: the notification row is the source of truth, a
//! failed push never fails the operation that produced it.

use crate::notification::Notification;

#[derive(Debug)]
pub struct TransportError {
    pub reason: String,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "delivery failed: {}", self.reason)
    }
}

impl std::error::Error for TransportError {}

pub trait NotificationTransport: Send + Sync {
    /// Channel name used in delivery-failure logs.
    fn name(&self) -> &str;

    fn deliver(&self, notification: &Notification) -> Result<(), TransportError>;
}

/// Transport that drops everything, for setups with no outbound channel.
#[derive(Debug, Default)]
pub struct NoopTransport;

impl NotificationTransport for NoopTransport {
    fn name(&self) -> &str {
        "noop"
    }

    fn deliver(&self, _notification: &Notification) -> Result<(), TransportError> {
        Ok(())
    }
}
