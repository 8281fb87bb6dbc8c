//! Sellable-stock read model.
//!
//! Folds every batch stream into one inventory listing, applies the
//! FECHADO/AVAILABLE/aging eligibility rules and the FIFO rotation order.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use frigoerp_batches::{BatchEvent, BatchStatus};
use frigoerp_core::{BatchId, StockItemId};
use frigoerp_events::Projection;
use frigoerp_stock::{classify_age, days_in_storage, AgeClass, StockItem, StockStatus};

/// One line of the sellable listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellableItem {
    pub item: StockItem,
    pub age_class: AgeClass,
    pub days_in_storage: i64,
    /// ATTENTION-window parts carry a caller-visible warning flag.
    pub attention: bool,
}

/// Inventory read model over all batch streams.
#[derive(Debug, Default)]
pub struct StockView {
    items: BTreeMap<StockItemId, StockItem>,
    batch_status: BTreeMap<BatchId, BatchStatus>,
}

impl Projection for StockView {
    type Ev = BatchEvent;

    fn apply(&mut self, event: &Self::Ev) {
        match event {
            BatchEvent::Committed(e) => {
                self.batch_status
                    .insert(e.batch_id.clone(), BatchStatus::Fechado);
                for part in &e.parts {
                    self.items.insert(part.id.clone(), part.clone());
                }
            }
            BatchEvent::Edited(_) => {}
            BatchEvent::PartSold(e) => {
                if let Some(item) = self.items.get_mut(&e.item_id) {
                    item.status = StockStatus::Sold;
                }
            }
            BatchEvent::PartReleased(e) => {
                if let Some(item) = self.items.get_mut(&e.item_id) {
                    item.status = StockStatus::Available;
                }
            }
            BatchEvent::Reversed(e) => {
                self.batch_status
                    .insert(e.batch_id.clone(), BatchStatus::Estornado);
                for item in self.items.values_mut() {
                    if item.batch_id == e.batch_id {
                        item.status = StockStatus::Estornado;
                    }
                }
            }
        }
    }
}

impl StockView {
    /// Every item ever stocked, reversed ones included (audit listing).
    pub fn all_items(&self) -> impl Iterator<Item = &StockItem> {
        self.items.values()
    }

    pub fn item(&self, id: &StockItemId) -> Option<&StockItem> {
        self.items.get(id)
    }

    pub fn batch_status(&self, id: &BatchId) -> Option<BatchStatus> {
        self.batch_status.get(id).copied()
    }

    /// AVAILABLE items of FECHADO batches whose age is not BLOCKED,
    /// oldest entry first (sanitary rotation). ATTENTION items are
    /// included and flagged.
    pub fn sellable(&self, batch_filter: Option<&BatchId>, today: NaiveDate) -> Vec<SellableItem> {
        let mut listing: Vec<SellableItem> = self
            .items
            .values()
            .filter(|item| item.status == StockStatus::Available)
            .filter(|item| batch_filter.is_none_or(|b| &item.batch_id == b))
            .filter(|item| {
                self.batch_status.get(&item.batch_id) == Some(&BatchStatus::Fechado)
            })
            .filter_map(|item| {
                let days = days_in_storage(item.entry_date, today);
                let age_class = classify_age(days);
                age_class.is_sellable().then(|| SellableItem {
                    item: item.clone(),
                    age_class,
                    days_in_storage: days,
                    attention: age_class.needs_attention(),
                })
            })
            .collect();

        listing.sort_by(|a, b| {
            a.item
                .entry_date
                .cmp(&b.item.entry_date)
                .then_with(|| a.item.id.cmp(&b.item.id))
        });
        listing
    }
}
