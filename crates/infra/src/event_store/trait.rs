use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use frigoerp_core::ExpectedVersion;
use std::sync::Arc;

/// An event ready to be appended to a stream (no sequence number yet).
///
/// Built from a typed domain event via [`UncommittedEvent::from_typed`],
/// which serializes the payload and captures the metadata needed to
/// deserialize it later. The store assigns sequence numbers during append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    /// Stream key, e.g. `batch/FRIBOI-20260315-001` or `ledger-cash`.
    pub stream_id: String,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A stored event in an append-only stream (assigned a sequence number).
///
/// Sequence numbers are stream-scoped, start at 1, have no gaps, and never
/// change once assigned. The highest sequence number of a stream is its
/// version for optimistic-concurrency purposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub stream_id: String,
    pub aggregate_type: String,

    /// Monotonically increasing position in the stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }
}

/// Event store operation error.
///
/// These are **infrastructure failures** (storage, concurrency, malformed
/// appends), as opposed to domain errors. When an atomic append fails,
/// nothing was committed; the caller retries the same top-level operation.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// One stream's contribution to an atomic multi-stream append.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamAppend {
    pub expected_version: ExpectedVersion,
    pub events: Vec<UncommittedEvent>,
}

/// Append-only event store.
///
/// Streams are keyed by `stream_id`, one stream per aggregate instance.
/// Implementations must:
/// - enforce optimistic concurrency (check version before append)
/// - assign sequence numbers monotonically (no gaps, no duplicates)
/// - keep a stream's `aggregate_type` stable across its lifetime
/// - make [`EventStore::append_multi`] **all-or-nothing across streams**:
///   every event of every batch commits, or none does. This is the
///   transaction boundary behind batch commit, payment settlement and the
///   reversal cascades.
///
/// No update or delete exists at this interface, by construction.
pub trait EventStore: Send + Sync {
    /// Append events to a single stream.
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Atomically append to several streams. Stream ids must be distinct
    /// across batches (merge same-stream events into one batch first).
    fn append_multi(&self, batches: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream, in sequence order. Missing stream = empty.
    fn load_stream(&self, stream_id: &str) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load every event of every stream of one aggregate type, ordered by
    /// (stream, sequence). Serves the filtered-list reads (all batches,
    /// all sales, ...), including reversed entities for audit.
    fn load_by_type(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn append_multi(&self, batches: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append_multi(batches)
    }

    fn load_stream(&self, stream_id: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(stream_id)
    }

    fn load_by_type(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_by_type(aggregate_type)
    }
}

impl UncommittedEvent {
    /// Build an uncommitted event from a typed domain event.
    ///
    /// Keeps infra decoupled from the domain crates while preserving the
    /// metadata needed for later deserialization.
    pub fn from_typed<E>(
        stream_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: frigoerp_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            stream_id: stream_id.into(),
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
