//! `frigoerp-stock` - carcass inventory leaf logic.
//!
//! Part types and stock item states, the whole/half weight-reconciliation
//! rule, and the cold-storage aging classifier. Everything here is pure;
//! stream ownership of stock items lives with the batch aggregate.

pub mod aging;
pub mod part;
pub mod reconcile;

pub use aging::{classify_age, days_in_storage, AgeClass};
pub use part::{PartType, StockItem, StockStatus};
pub use reconcile::{reconcile_sequence, SequenceReconciliation, CARCASS_SPLIT_LOSS_KG};
