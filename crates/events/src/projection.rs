use crate::Event;

/// A projection builds a read model by folding an append-only event stream.
///
/// Read models here are **disposable and recomputed on demand**: balances,
/// sellable stock and receivable snapshots are never cached as mutable
/// state - each query folds the relevant streams from scratch. This keeps a
/// single source of truth (the events) and makes every derived figure
/// consistent with the audit trail by construction.
///
/// `apply` must be deterministic; replaying the same stream always yields
/// the same read model.
pub trait Projection: Default {
    type Ev: Event;

    /// Apply a single event, updating the read model.
    fn apply(&mut self, event: &Self::Ev);
}

/// Fold a stream (already in sequence order) into a fresh read model.
pub fn project<P: Projection>(events: impl IntoIterator<Item = P::Ev>) -> P {
    let mut model = P::default();
    for event in events {
        model.apply(&event);
    }
    model
}
