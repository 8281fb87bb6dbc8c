//! Command execution pipeline (application-level orchestration).
//!
//! Every state change follows the same shape:
//!
//! ```text
//! 1. Load the stream         (append-only history)
//! 2. Rehydrate the aggregate (apply historical events)
//! 3. Handle the command      (pure decision, produces events)
//! 4. Append the events       (optimistic concurrency check)
//! ```
//!
//! Single-stream operations go through [`CommandExecutor::execute`].
//! Operations that must commit across several streams at once (batch
//! commit, payment + ledger entry, the reversal cascades) stage their
//! events in a [`UnitOfWork`] and commit it through one atomic
//! `append_multi` call: every event lands, or none does.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use frigoerp_core::{Aggregate, DomainError, DomainErrorKind, ExpectedVersion};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};

/// Failure class of an operation, for callers that route on class.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FailureClass {
    /// Bad input; correct the call and resubmit.
    Validation,
    /// A business rule said no; no partial effect.
    DomainRule,
    /// Stale client state or broken invariant; logged as serious.
    Consistency,
    /// The storage backend failed mid-operation. Nothing was committed;
    /// retrying the same top-level operation converges.
    Atomicity,
}

/// Error surface of the application operations.
#[derive(Debug, Error)]
pub enum OpError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage failure, nothing committed: {0}")]
    Atomicity(#[from] EventStoreError),

    #[error("failed to decode stored event: {0}")]
    Deserialize(String),
}

impl OpError {
    pub fn class(&self) -> FailureClass {
        match self {
            OpError::Domain(e) => match e.kind() {
                DomainErrorKind::Validation => FailureClass::Validation,
                DomainErrorKind::DomainRule => FailureClass::DomainRule,
                DomainErrorKind::Consistency => FailureClass::Consistency,
            },
            OpError::Atomicity(_) => FailureClass::Atomicity,
            OpError::Deserialize(_) => FailureClass::Consistency,
        }
    }
}

/// Decode a stream's stored events back into typed domain events,
/// restoring sequence order first.
pub fn decode_events<E: DeserializeOwned>(history: &[StoredEvent]) -> Result<Vec<E>, OpError> {
    let mut sorted: Vec<&StoredEvent> = history.iter().collect();
    sorted.sort_by(|a, b| {
        a.stream_id
            .cmp(&b.stream_id)
            .then(a.sequence_number.cmp(&b.sequence_number))
    });

    sorted
        .into_iter()
        .map(|stored| {
            serde_json::from_value(stored.payload.clone())
                .map_err(|e| OpError::Deserialize(format!("{}: {e}", stored.event_type)))
        })
        .collect()
}

/// Reusable command execution engine over an [`EventStore`].
#[derive(Debug)]
pub struct CommandExecutor<S> {
    store: S,
}

impl<S> CommandExecutor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: EventStore> CommandExecutor<S> {
    /// Load and rehydrate an aggregate from its stream. A missing stream
    /// yields the empty aggregate (`created = false`), letting the domain
    /// decide whether that is acceptable.
    pub fn load<A>(&self, stream_id: &str, make: impl FnOnce() -> A) -> Result<A, OpError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(stream_id)?;
        let mut aggregate = make();
        for event in decode_events::<A::Event>(&history)? {
            aggregate.apply(&event);
        }
        Ok(aggregate)
    }

    /// Execute one command against one stream: load, rehydrate, handle,
    /// append with the loaded version as the concurrency expectation.
    pub fn execute<A>(
        &self,
        stream_id: &str,
        aggregate_type: &str,
        command: A::Command,
        make: impl FnOnce() -> A,
    ) -> Result<Vec<StoredEvent>, OpError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: frigoerp_events::Event + Serialize + DeserializeOwned,
    {
        let aggregate = self.load(stream_id, make)?;
        let based_on = aggregate.version();

        let decided = aggregate.handle(&command).map_err(OpError::Domain)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let mut uow = UnitOfWork::new();
        uow.stage(stream_id, aggregate_type, ExpectedVersion::Exact(based_on), &decided)?;
        uow.commit(&self.store)
    }
}

/// Staged events across streams, committed as one atomic append.
///
/// Staging the same stream twice merges the events and keeps the first
/// expectation: cascades rehydrate each aggregate once, keep handling and
/// applying against the in-memory copy, and stage as they go.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    staged: Vec<StagedStream>,
}

#[derive(Debug)]
struct StagedStream {
    stream_id: String,
    expected_version: ExpectedVersion,
    events: Vec<UncommittedEvent>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.iter().all(|s| s.events.is_empty())
    }

    /// Stage typed events for one stream.
    pub fn stage<E>(
        &mut self,
        stream_id: &str,
        aggregate_type: &str,
        expected_version: ExpectedVersion,
        events: &[E],
    ) -> Result<(), OpError>
    where
        E: frigoerp_events::Event + Serialize,
    {
        if events.is_empty() {
            return Ok(());
        }

        let mut uncommitted = Vec::with_capacity(events.len());
        for event in events {
            uncommitted.push(UncommittedEvent::from_typed(
                stream_id,
                aggregate_type,
                Uuid::now_v7(),
                event,
            )?);
        }

        if let Some(existing) = self.staged.iter_mut().find(|s| s.stream_id == stream_id) {
            existing.events.extend(uncommitted);
        } else {
            self.staged.push(StagedStream {
                stream_id: stream_id.to_string(),
                expected_version,
                events: uncommitted,
            });
        }
        Ok(())
    }

    /// Commit everything staged in one atomic multi-stream append.
    pub fn commit<S: EventStore>(self, store: &S) -> Result<Vec<StoredEvent>, OpError> {
        let batches: Vec<StreamAppend> = self
            .staged
            .into_iter()
            .filter(|s| !s.events.is_empty())
            .map(|s| StreamAppend {
                expected_version: s.expected_version,
                events: s.events,
            })
            .collect();
        if batches.is_empty() {
            return Ok(vec![]);
        }
        Ok(store.append_multi(batches)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::InMemoryEventStore;
    use chrono::Utc;
    use frigoerp_core::{AggregateRoot, BatchCosts, PaymentTerms, SupplierId};
    use frigoerp_batches::{Batch, BatchCommand, BatchDraft, CommitBatch, PartSpec};
    use frigoerp_stock::PartType;

    fn commit_command(batch_id: &str) -> BatchCommand {
        BatchCommand::Commit(CommitBatch {
            batch_id: batch_id.parse().unwrap(),
            draft: BatchDraft::new(
                SupplierId::new(),
                "Friboi",
                chrono::NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
                1_000.0,
                BatchCosts::new(18_000.0, 500.0, 200.0),
                PaymentTerms::Cash,
            ),
            parts: vec![PartSpec {
                sequence: 1,
                part_type: PartType::Whole,
                entry_weight: 240.0,
            }],
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn execute_persists_and_reload_rehydrates() {
        let store = InMemoryEventStore::new();
        let executor = CommandExecutor::new(store);
        let batch_id = "FRIBOI-20260315-001";

        let stored = executor
            .execute(
                "batch/FRIBOI-20260315-001",
                "batches.batch",
                commit_command(batch_id),
                || Batch::empty(batch_id.parse().unwrap()),
            )
            .unwrap();
        assert_eq!(stored.len(), 1);

        let batch: Batch = executor
            .load("batch/FRIBOI-20260315-001", || {
                Batch::empty(batch_id.parse().unwrap())
            })
            .unwrap();
        assert!(batch.is_committed());
        assert_eq!(batch.version(), 1);
    }

    #[test]
    fn rejected_command_classifies_and_persists_nothing() {
        let store = InMemoryEventStore::new();
        let executor = CommandExecutor::new(store);
        let batch_id = "FRIBOI-20260315-001";

        let mut cmd = commit_command(batch_id);
        if let BatchCommand::Commit(c) = &mut cmd {
            c.parts.clear();
        }
        let err = executor
            .execute(
                "batch/FRIBOI-20260315-001",
                "batches.batch",
                cmd,
                || Batch::empty(batch_id.parse().unwrap()),
            )
            .unwrap_err();
        assert_eq!(err.class(), FailureClass::DomainRule);
        assert!(executor
            .store()
            .load_stream("batch/FRIBOI-20260315-001")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn staging_the_same_stream_twice_merges_into_one_batch() {
        let mut uow = UnitOfWork::new();
        let batch_id = "FRIBOI-20260315-001";
        let batch = Batch::empty(batch_id.parse().unwrap());
        let events = batch.handle(&commit_command(batch_id)).unwrap();

        uow.stage("batch/X", "batches.batch", ExpectedVersion::Exact(0), &events)
            .unwrap();
        uow.stage("batch/X", "batches.batch", ExpectedVersion::Exact(0), &events)
            .unwrap();

        let store = InMemoryEventStore::new();
        let stored = uow.commit(&store).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].sequence_number, 2);
    }
}
