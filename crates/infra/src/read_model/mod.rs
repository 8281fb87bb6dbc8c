//! Derived read models: disposable folds over the event streams,
//! recomputed on demand so no cached figure can drift from the ledger.

pub mod receivables;
pub mod stock_view;

pub use receivables::{ReceivablesView, SaleReceivable};
pub use stock_view::{SellableItem, StockView};
