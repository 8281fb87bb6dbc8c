//! Per-sequence weight reconciliation.
//!
//! A split carcass loses a fixed amount of mass to sawdust and trim, so a
//! sequence holding both halves weighs less than the sum of its parts.

use serde::{Deserialize, Serialize};

use crate::part::{PartType, StockItem};

/// Fixed weight lost when a carcass is split into two halves (kg).
pub const CARCASS_SPLIT_LOSS_KG: f64 = 3.0;

/// Outcome of reconciling the parts of one physical animal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequenceReconciliation {
    /// Physical total weight attributed to the sequence (kg).
    pub total_weight: f64,
    /// Whether the split-loss discount entered the total.
    pub discount_applied: bool,
}

/// Reconcile the physical weight of one sequence (one animal).
///
/// - both halves present: `weight_A + weight_B - 3`
/// - a single half, or a lone WHOLE: the item's own weight, no discount
/// - a WHOLE together with halves (tolerated data-entry inconsistency):
///   the WHOLE weight takes precedence and the halves are ignored
///
/// Callers group by `(batch, sequence)` before calling; the slice must hold
/// the parts of a single sequence.
pub fn reconcile_sequence(parts: &[StockItem]) -> SequenceReconciliation {
    if let Some(whole) = parts.iter().find(|p| p.part_type == PartType::Whole) {
        return SequenceReconciliation {
            total_weight: whole.entry_weight,
            discount_applied: false,
        };
    }

    let half_a = parts.iter().find(|p| p.part_type == PartType::HalfA);
    let half_b = parts.iter().find(|p| p.part_type == PartType::HalfB);

    match (half_a, half_b) {
        (Some(a), Some(b)) => SequenceReconciliation {
            total_weight: a.entry_weight + b.entry_weight - CARCASS_SPLIT_LOSS_KG,
            discount_applied: true,
        },
        (Some(single), None) | (None, Some(single)) => SequenceReconciliation {
            total_weight: single.entry_weight,
            discount_applied: false,
        },
        (None, None) => SequenceReconciliation {
            total_weight: 0.0,
            discount_applied: false,
        },
    }
}
