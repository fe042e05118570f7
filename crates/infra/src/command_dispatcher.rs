//! Command execution pipeline (application-level orchestration).
//!
//! One pipeline for every aggregate:
//!
//! ```text
//! Command
//!   ↓
//! 1. Load events from store
//!   ↓
//! 2. Rehydrate aggregate (apply history)
//!   ↓
//! 3. Handle command (pure decision logic, produces events)
//!   ↓
//! 4. Persist events (append-only, optimistic concurrency check)
//!   ↓
//! 5. Publish events to bus (projections, notification fan-out)
//! ```
//!
//! The dispatcher contains no IO itself; it composes the `EventStore` and
//! `EventBus` traits, so tests wire in the in-memory implementations and
//! production can swap in real backends.
//!
//! Publication happens only after a successful append. If publication fails
//! the events are already durable, so retrying is safe (at-least-once;
//! consumers must be idempotent).

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use docflow_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use docflow_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
pub enum DispatchError {
    /// Optimistic concurrency failure (stale aggregate version or a lost
    /// domain-level race).
    Conflict(String),
    /// Domain validation failure (deterministic).
    Validation(String),
    /// Domain authorization failure.
    Forbidden(String),
    /// Missing or invalid credential.
    Unauthenticated(String),
    /// Domain-level not found.
    NotFound,
    /// Department tree shape violation.
    InvalidHierarchy(String),
    /// Workflow stage rule violation.
    InvalidTransition(String),
    /// A collaborator was unreachable; retryable.
    Unavailable(String),
    /// Failed to deserialize historical event payloads into the aggregate
    /// event type.
    Deserialize(String),
    /// Persisting to the event store failed.
    Store(EventStoreError),
    /// Publication failed after a successful append (at-least-once; retry may
    /// duplicate).
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => DispatchError::Conflict(msg.clone()),
            _ => DispatchError::Store(value),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::Forbidden(msg) => DispatchError::Forbidden(msg),
            DomainError::Unauthenticated(msg) => DispatchError::Unauthenticated(msg),
            DomainError::InvalidHierarchy(msg) => DispatchError::InvalidHierarchy(msg),
            DomainError::InvalidTransition(msg) => DispatchError::InvalidTransition(msg),
            DomainError::Unavailable(msg) => DispatchError::Unavailable(msg),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store and bus so tests run fully in-memory. Each dispatch
/// operates on exactly one aggregate instance, under optimistic concurrency:
/// the version loaded at step 1 must still hold at step 4, otherwise the
/// append fails with `DispatchError::Conflict` and the caller retries or
/// surfaces the conflict.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full pipeline.
    ///
    /// `make_aggregate` is a factory producing a blank instance for
    /// rehydration (for example `|id| Document::empty(id.into())`), keeping
    /// the dispatcher ignorant of aggregate construction.
    ///
    /// Returns the committed events with their assigned sequence numbers; an
    /// empty vec means the command was a no-op.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: docflow_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate aggregate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide events (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        // 5) Publish committed events (after append)
        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }

    /// Rehydrate an aggregate's current state without dispatching anything.
    ///
    /// Read-side helpers (bootstrap checks, cross-aggregate lookups) use this
    /// when a projection would be overkill.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Reject cross-stream data from a buggy backend; ensure the stream is
    // monotonically increasing by sequence number.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!("loaded stream contains wrong aggregate_id at index {idx}"),
            )));
        }
        if e.sequence_number == 0 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                "stored event has sequence_number=0".to_string(),
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                format!(
                    "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                    e.sequence_number
                ),
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    // Ensure deterministic ordering.
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
