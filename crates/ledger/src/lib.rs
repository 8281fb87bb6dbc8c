//! `frigoerp-ledger` - the financial ledger.
//!
//! An append-only cash transaction log (the only write primitive is
//! `append`; reversal appends a compensating entry) plus the supplier
//! payable aggregate. Balances are pure folds, never cached.

pub mod payable;
pub mod transaction;

pub use payable::{
    AccruePayable, CancelPayable, PayPayable, Payable, PayableCommand, PayableEvent,
    PayableStatus, ReversePayable,
};
pub use transaction::{
    AppendTransaction, BalanceFilter, CashLedger, Direction, EntityRef, LedgerCommand,
    LedgerEvent, ReverseTransaction, Transaction, TransactionCategory, CASH_LEDGER_STREAM,
};
