//! `frigoerp-sales` - sale settlement.
//!
//! A sale consumes stock items (grouped carcass parts may be sold
//! together), records the independently weighed exit weight against the
//! reconciled entry weight (the difference is breakage), and drives the
//! receivable balance as partial payments and discounts are applied.

pub mod sale;

pub use sale::{
    ApplyPayment, OpenSale, PaymentMethod, ReverseSale, Sale, SaleCommand, SaleEvent, SaleStatus,
};
