//! Strongly-typed identifiers used across the domain.
//!
//! Batches and stock items carry human-readable identifiers following the
//! warehouse labelling convention (`{batchId}-{sequence:03}-{partType}`);
//! everything else uses UUIDv7 newtypes.

use core::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a purchased batch: `{supplier-prefix}-{YYYYMMDD}-{seq:03}`.
///
/// Exactly three hyphen-delimited segments; the prefix itself must not
/// contain hyphens so that segment arithmetic on derived ids stays stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    /// Compose a batch id from its parts.
    pub fn compose(
        supplier_prefix: &str,
        receipt_date: NaiveDate,
        sequence: u32,
    ) -> Result<Self, DomainError> {
        let prefix = supplier_prefix.trim().to_uppercase();
        if prefix.is_empty() {
            return Err(DomainError::invalid_id("batch supplier prefix is empty"));
        }
        if prefix.contains('-') {
            return Err(DomainError::invalid_id(
                "batch supplier prefix must not contain '-'",
            ));
        }
        Ok(Self(format!(
            "{prefix}-{}-{sequence:03}",
            receipt_date.format("%Y%m%d")
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for BatchId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BatchId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split('-').collect();
        if segments.len() != 3 || segments.iter().any(|seg| seg.is_empty()) {
            return Err(DomainError::invalid_id(format!(
                "BatchId must have three non-empty segments: {s}"
            )));
        }
        Ok(Self(s.to_string()))
    }
}

/// Identifier of a carcass part in stock: `{batchId}-{sequence:03}-{partCode}`.
///
/// Part codes (`WHOLE`, `HALF_A`, `HALF_B`) use underscores, never hyphens,
/// so a stock item id always has exactly five hyphen-delimited segments and
/// the owning batch is always the first three.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockItemId(String);

impl StockItemId {
    /// Derive the id of one part of one animal within a batch.
    pub fn derive(batch_id: &BatchId, sequence: u32, part_code: &str) -> Self {
        Self(format!("{batch_id}-{sequence:03}-{part_code}"))
    }

    /// The owning batch: the first three hyphen-delimited segments.
    ///
    /// This derivation is the only supported way to recover a batch id from
    /// a sale's item reference (a fully consumed whole-carcass sale's item
    /// may no longer be independently queryable).
    pub fn batch_id(&self) -> Result<BatchId, DomainError> {
        let segments: Vec<&str> = self.0.split('-').collect();
        if segments.len() != 5 {
            return Err(DomainError::invalid_id(format!(
                "StockItemId must have five segments: {}",
                self.0
            )));
        }
        segments[..3].join("-").parse()
    }

    /// Sequence number of the animal within its batch.
    pub fn sequence(&self) -> Result<u32, DomainError> {
        let segments: Vec<&str> = self.0.split('-').collect();
        if segments.len() != 5 {
            return Err(DomainError::invalid_id(format!(
                "StockItemId must have five segments: {}",
                self.0
            )));
        }
        segments[3]
            .parse()
            .map_err(|e| DomainError::invalid_id(format!("bad sequence in {}: {e}", self.0)))
    }

    /// The raw part code segment (`WHOLE`, `HALF_A`, `HALF_B`).
    pub fn part_code(&self) -> Result<&str, DomainError> {
        self.0
            .split('-')
            .nth(4)
            .ok_or_else(|| DomainError::invalid_id(format!("missing part code in {}", self.0)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for StockItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StockItemId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Self(s.to_string());
        id.batch_id()?;
        id.sequence()?;
        Ok(id)
    }
}

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in
            /// tests for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

/// Identifier of a sale.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaleId(Uuid);

/// Identifier of a payable (money owed to a supplier).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayableId(Uuid);

/// Identifier of a cash ledger entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

/// Identifier of a client (buyer).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Uuid);

/// Identifier of a supplier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(Uuid);

impl_uuid_newtype!(SaleId, "SaleId");
impl_uuid_newtype!(PayableId, "PayableId");
impl_uuid_newtype!(TransactionId, "TransactionId");
impl_uuid_newtype!(ClientId, "ClientId");
impl_uuid_newtype!(SupplierId, "SupplierId");

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn batch_id_composition_follows_labelling_convention() {
        let id = BatchId::compose("friboi", date(2026, 3, 15), 7).unwrap();
        assert_eq!(id.as_str(), "FRIBOI-20260315-007");
    }

    #[test]
    fn batch_prefix_with_hyphen_is_rejected() {
        let err = BatchId::compose("bom-boi", date(2026, 3, 15), 1).unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(_)));
    }

    #[test]
    fn stock_item_id_round_trips_back_to_its_batch() {
        let batch = BatchId::compose("FRIBOI", date(2026, 3, 15), 7).unwrap();
        let item = StockItemId::derive(&batch, 12, "HALF_A");
        assert_eq!(item.as_str(), "FRIBOI-20260315-007-012-HALF_A");
        assert_eq!(item.batch_id().unwrap(), batch);
        assert_eq!(item.sequence().unwrap(), 12);
        assert_eq!(item.part_code().unwrap(), "HALF_A");
    }

    #[test]
    fn malformed_stock_item_id_fails_to_parse() {
        assert!("FRIBOI-20260315-007".parse::<StockItemId>().is_err());
        assert!("FRIBOI-007-012-HALF_A".parse::<StockItemId>().is_err());
    }
}
