use core::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use frigoerp_core::{BatchId, DomainError, StockItemId};

/// Physical form of a carcass part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartType {
    Whole,
    HalfA,
    HalfB,
}

impl PartType {
    /// Stable code used inside stock item identifiers. Underscores only:
    /// the id format reserves hyphens as segment separators.
    pub fn code(&self) -> &'static str {
        match self {
            PartType::Whole => "WHOLE",
            PartType::HalfA => "HALF_A",
            PartType::HalfB => "HALF_B",
        }
    }
}

impl core::fmt::Display for PartType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for PartType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WHOLE" => Ok(PartType::Whole),
            "HALF_A" => Ok(PartType::HalfA),
            "HALF_B" => Ok(PartType::HalfB),
            other => Err(DomainError::invalid_id(format!("unknown part type: {other}"))),
        }
    }
}

/// Lifecycle of a carcass part in cold storage.
///
/// ESTORNADO is reached only through the cascading reversal of the owning
/// batch or sale, and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    Available,
    Sold,
    Estornado,
}

/// One carcass part in cold storage, owned by exactly one batch.
///
/// Parts sharing a sequence number belong to the same physical animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockItem {
    pub id: StockItemId,
    pub batch_id: BatchId,
    pub sequence: u32,
    pub part_type: PartType,
    /// Weight measured at cold-storage entry (kg).
    pub entry_weight: f64,
    pub entry_date: NaiveDate,
    pub status: StockStatus,
}

impl StockItem {
    /// A freshly received part, AVAILABLE, with its id derived from the
    /// labelling convention.
    pub fn received(
        batch_id: BatchId,
        sequence: u32,
        part_type: PartType,
        entry_weight: f64,
        entry_date: NaiveDate,
    ) -> Self {
        let id = StockItemId::derive(&batch_id, sequence, part_type.code());
        Self {
            id,
            batch_id,
            sequence,
            part_type,
            entry_weight,
            entry_date,
            status: StockStatus::Available,
        }
    }
}
