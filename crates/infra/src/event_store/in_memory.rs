use std::collections::HashMap;
use std::sync::RwLock;

use frigoerp_core::ExpectedVersion;

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};

/// In-memory append-only event store.
///
/// Intended for tests/dev and as the reference semantics for real backends.
/// One lock guards all streams, which trivially makes `append_multi`
/// all-or-nothing: validation of every batch happens before the first event
/// is committed.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<String, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Validate one batch against the current stream state; returns the
    /// stream id and the sequence number to assign first.
    fn validate_batch(
        streams: &HashMap<String, Vec<StoredEvent>>,
        batch: &StreamAppend,
    ) -> Result<(String, u64), EventStoreError> {
        let first = batch.events.first().ok_or_else(|| {
            EventStoreError::InvalidAppend("empty batch in multi-stream append".to_string())
        })?;
        let stream_id = first.stream_id.clone();
        let aggregate_type = first.aggregate_type.clone();

        for (idx, e) in batch.events.iter().enumerate() {
            if e.stream_id != stream_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple stream_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let stream = streams.get(&stream_id).map(Vec::as_slice).unwrap_or(&[]);
        let current = Self::current_version(stream);
        if !batch.expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "stream {stream_id}: expected {:?}, found {current}",
                batch.expected_version
            )));
        }

        // Aggregate type stability across the stream's lifetime.
        if let Some(existing) = stream.first() {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream {stream_id} is '{}', attempted append with '{}'",
                    existing.aggregate_type, aggregate_type
                )));
            }
        }

        Ok((stream_id, current + 1))
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(vec![]);
        }
        self.append_multi(vec![StreamAppend {
            expected_version,
            events,
        }])
    }

    fn append_multi(&self, batches: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        let batches: Vec<StreamAppend> =
            batches.into_iter().filter(|b| !b.events.is_empty()).collect();
        if batches.is_empty() {
            return Ok(vec![]);
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        // Validate everything first: a failed batch must leave every other
        // batch uncommitted too.
        let mut plans = Vec::with_capacity(batches.len());
        for batch in &batches {
            let plan = Self::validate_batch(&streams, batch)?;
            if plans.iter().any(|(id, _)| *id == plan.0) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "duplicate stream {} in multi-stream append",
                    plan.0
                )));
            }
            plans.push(plan);
        }

        // Commit phase: assign sequence numbers and append (append-only).
        let mut committed = Vec::new();
        for (batch, (stream_id, mut next)) in batches.into_iter().zip(plans) {
            let stream = streams.entry(stream_id).or_default();
            for e in batch.events {
                let stored = StoredEvent {
                    event_id: e.event_id,
                    stream_id: e.stream_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: next,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                };
                next += 1;
                stream.push(stored.clone());
                committed.push(stored);
            }
        }

        Ok(committed)
    }

    fn load_stream(&self, stream_id: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        Ok(streams.get(stream_id).cloned().unwrap_or_default())
    }

    fn load_by_type(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::InvalidAppend("lock poisoned".to_string()))?;

        let mut stream_ids: Vec<&String> = streams
            .iter()
            .filter(|(_, events)| {
                events
                    .first()
                    .is_some_and(|e| e.aggregate_type == aggregate_type)
            })
            .map(|(id, _)| id)
            .collect();
        stream_ids.sort();

        let mut all = Vec::new();
        for id in stream_ids {
            all.extend(streams[id].iter().cloned());
        }
        Ok(all)
    }
}
