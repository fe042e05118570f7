//! Synchronous projection fan-out.
//!
//! `SyncProjectionBus` runs registered envelope handlers inline during
//! `publish`, so read models are already current when a dispatch returns
//! (read-your-writes for the API layer). It still delegates to an inner
//! channel-based bus for out-of-band subscribers.

use std::sync::{Arc, RwLock};

use serde_json::Value as JsonValue;

use docflow_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};

pub type EnvelopeHandler =
    Arc<dyn Fn(&EventEnvelope<JsonValue>) -> Result<(), anyhow::Error> + Send + Sync>;

#[derive(Debug)]
pub enum FanoutError {
    /// A projection handler rejected the envelope.
    Handler(String),
    /// Internal lock poisoning.
    Poisoned,
}

#[derive(Default)]
pub struct SyncProjectionBus {
    inner: InMemoryEventBus<EventEnvelope<JsonValue>>,
    handlers: RwLock<Vec<EnvelopeHandler>>,
}

impl SyncProjectionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler invoked inline on every publish, in registration
    /// order. Handlers must be idempotent.
    pub fn register(&self, handler: EnvelopeHandler) {
        if let Ok(mut handlers) = self.handlers.write() {
            handlers.push(handler);
        }
    }
}

impl EventBus<EventEnvelope<JsonValue>> for SyncProjectionBus {
    type Error = FanoutError;

    fn publish(&self, message: EventEnvelope<JsonValue>) -> Result<(), Self::Error> {
        {
            let handlers = self.handlers.read().map_err(|_| FanoutError::Poisoned)?;
            for handler in handlers.iter() {
                handler(&message).map_err(|e| FanoutError::Handler(e.to_string()))?;
            }
        }
        self.inner
            .publish(message)
            .map_err(|_| FanoutError::Poisoned)
    }

    fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.inner.subscribe()
    }
}
