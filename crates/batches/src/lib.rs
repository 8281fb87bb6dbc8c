//! `frigoerp-batches` - batch lifecycle and cost allocation.
//!
//! A batch is drafted in memory (never persisted), then committed in a
//! single atomic step that creates the batch, all of its initial stock
//! items and the supplier payable. Committed batches own their parts'
//! sold/available/reversed transitions.

pub mod batch;
pub mod cost;

pub use batch::{
    Batch, BatchCommand, BatchDraft, BatchEvent, BatchStatus, BatchUpdates, CommitBatch,
    EditBatch, MarkPartSold, PartSpec, ReleasePart, ReverseBatch,
};
pub use cost::cost_per_kg;
