//! Shared value objects: compared by value, immutable once built.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Tolerance for monetary comparisons: one centavo.
pub const MONEY_EPSILON: f64 = 0.01;

/// Tolerance for derived per-kilogram figures.
pub const COST_EPSILON: f64 = 1e-6;

/// Acquisition cost breakdown of one purchased batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchCosts {
    /// Price paid for the animals themselves.
    pub purchase: f64,
    /// Freight from the farm to the plant.
    pub freight: f64,
    /// Everything else attributable to the batch (tolls, commission, ...).
    pub extras: f64,
}

impl BatchCosts {
    pub fn new(purchase: f64, freight: f64, extras: f64) -> Self {
        Self {
            purchase,
            freight,
            extras,
        }
    }

    /// Total acquisition cost of the batch.
    pub fn total(&self) -> f64 {
        self.purchase + self.freight + self.extras
    }

    /// All components must be finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [self.purchase, self.freight, self.extras]
            .iter()
            .all(|c| c.is_finite() && *c >= 0.0)
    }
}

/// Payment terms agreed with the supplier at batch intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentTerms {
    /// Paid on receipt; the payable is settled inside the commit.
    Cash,
    /// Deferred; the payable stays open until `due_date`.
    Term { due_date: NaiveDate },
}

impl PaymentTerms {
    pub fn is_deferred(&self) -> bool {
        matches!(self, PaymentTerms::Term { .. })
    }
}
