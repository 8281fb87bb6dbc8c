//! `frigoerp-credit` - client credit risk.
//!
//! A deterministic rule ladder over derived receivable snapshots. Nothing
//! here is stored: the tier is recomputed on every query from canonical
//! ledger/sale state, so there is no cached figure to drift.

pub mod evaluator;

pub use evaluator::{
    evaluate, CreditAssessment, CreditTier, ReceivableSnapshot, HARD_BLOCK_OVERDUE_DAYS,
    HIGH_VOLUME_THRESHOLD,
};
