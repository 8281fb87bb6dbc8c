use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use frigoerp_core::{
    Aggregate, AggregateRoot, BatchCosts, BatchId, DomainError, PaymentTerms, SaleId, StockItemId,
    SupplierId,
};
use frigoerp_events::Event;
use frigoerp_stock::{PartType, StockItem, StockStatus};

use crate::cost;

/// Batch lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    /// In-memory draft; never persisted.
    Aberto,
    /// Committed and durable; parts are sellable.
    Fechado,
    /// Reversed; terminal and excluded from active views.
    Estornado,
}

/// An uncommitted batch: a plain value the intake form mutates freely.
///
/// Drafting tolerates incomplete data (zero declared weight gives a zero
/// cost basis); validation bites at commit, the only durable boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDraft {
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub receipt_date: NaiveDate,
    /// Declared gross weight from the romaneio (kg).
    pub declared_weight: f64,
    pub costs: BatchCosts,
    pub payment_terms: PaymentTerms,
}

impl BatchDraft {
    pub fn new(
        supplier_id: SupplierId,
        supplier_name: impl Into<String>,
        receipt_date: NaiveDate,
        declared_weight: f64,
        costs: BatchCosts,
        payment_terms: PaymentTerms,
    ) -> Self {
        Self {
            supplier_id,
            supplier_name: supplier_name.into(),
            receipt_date,
            declared_weight,
            costs,
            payment_terms,
        }
    }

    pub fn status(&self) -> BatchStatus {
        BatchStatus::Aberto
    }

    /// Derived cost basis; 0.0 while the weight is not yet known.
    pub fn cost_per_kg(&self) -> f64 {
        cost::cost_per_kg(
            self.costs.purchase,
            self.costs.freight,
            self.costs.extras,
            self.declared_weight,
        )
    }
}

/// One carcass part declared at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartSpec {
    pub sequence: u32,
    pub part_type: PartType,
    /// Cold-storage entry weight (kg).
    pub entry_weight: f64,
}

/// Field updates for a batch. Financial fields become immutable once the
/// batch is FECHADO; corrections then go through reversal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BatchUpdates {
    pub supplier_name: Option<String>,
    pub receipt_date: Option<NaiveDate>,
    pub declared_weight: Option<f64>,
    pub costs: Option<BatchCosts>,
    pub payment_terms: Option<PaymentTerms>,
}

impl BatchUpdates {
    pub fn is_empty(&self) -> bool {
        self.supplier_name.is_none()
            && self.receipt_date.is_none()
            && self.declared_weight.is_none()
            && self.costs.is_none()
            && self.payment_terms.is_none()
    }

    fn touches_financials(&self) -> Option<&'static str> {
        if self.declared_weight.is_some() {
            Some("declared_weight")
        } else if self.costs.is_some() {
            Some("costs")
        } else if self.payment_terms.is_some() {
            Some("payment_terms")
        } else {
            None
        }
    }
}

/// Aggregate root: Batch.
///
/// Owns its stock items: the batch stream carries every part transition, so
/// commit, allocation and reversal of parts share one optimistic-concurrency
/// boundary per batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    id: BatchId,
    supplier_id: Option<SupplierId>,
    supplier_name: String,
    receipt_date: Option<NaiveDate>,
    declared_weight: f64,
    costs: BatchCosts,
    payment_terms: Option<PaymentTerms>,
    status: BatchStatus,
    parts: BTreeMap<StockItemId, StockItem>,
    sold_to: BTreeMap<StockItemId, SaleId>,
    version: u64,
    created: bool,
}

impl Batch {
    /// Empty, not-yet-committed instance for rehydration.
    pub fn empty(id: BatchId) -> Self {
        Self {
            id,
            supplier_id: None,
            supplier_name: String::new(),
            receipt_date: None,
            declared_weight: 0.0,
            costs: BatchCosts::new(0.0, 0.0, 0.0),
            payment_terms: None,
            status: BatchStatus::Aberto,
            parts: BTreeMap::new(),
            sold_to: BTreeMap::new(),
            version: 0,
            created: false,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.created
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn supplier_name(&self) -> &str {
        &self.supplier_name
    }

    pub fn receipt_date(&self) -> Option<NaiveDate> {
        self.receipt_date
    }

    pub fn declared_weight(&self) -> f64 {
        self.declared_weight
    }

    pub fn costs(&self) -> BatchCosts {
        self.costs
    }

    pub fn payment_terms(&self) -> Option<PaymentTerms> {
        self.payment_terms
    }

    /// Derived cost basis, recomputed from its inputs on every call.
    pub fn cost_per_kg(&self) -> f64 {
        cost::cost_per_kg(
            self.costs.purchase,
            self.costs.freight,
            self.costs.extras,
            self.declared_weight,
        )
    }

    pub fn parts(&self) -> &BTreeMap<StockItemId, StockItem> {
        &self.parts
    }

    pub fn part(&self, item_id: &StockItemId) -> Option<&StockItem> {
        self.parts.get(item_id)
    }

    /// The sale a SOLD part was allocated to, if any.
    pub fn sale_of(&self, item_id: &StockItemId) -> Option<SaleId> {
        self.sold_to.get(item_id).copied()
    }

    /// Every (item, sale) pair currently allocated out of this batch.
    pub fn sold_parts(&self) -> impl Iterator<Item = (&StockItemId, SaleId)> {
        self.sold_to.iter().map(|(id, sale)| (id, *sale))
    }
}

impl AggregateRoot for Batch {
    type Id = BatchId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CommitBatch - the only draft-to-durable transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitBatch {
    pub batch_id: BatchId,
    pub draft: BatchDraft,
    pub parts: Vec<PartSpec>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EditBatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditBatch {
    pub batch_id: BatchId,
    pub updates: BatchUpdates,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkPartSold - allocation of one part to a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkPartSold {
    pub batch_id: BatchId,
    pub item_id: StockItemId,
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleasePart - a reversed sale returns the part to stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleasePart {
    pub batch_id: BatchId,
    pub item_id: StockItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseBatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseBatch {
    pub batch_id: BatchId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BatchCommand {
    Commit(CommitBatch),
    Edit(EditBatch),
    MarkPartSold(MarkPartSold),
    ReleasePart(ReleasePart),
    Reverse(ReverseBatch),
}

/// Event: BatchCommitted - carries the batch and all initial parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCommitted {
    pub batch_id: BatchId,
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub receipt_date: NaiveDate,
    pub declared_weight: f64,
    pub costs: BatchCosts,
    pub payment_terms: PaymentTerms,
    pub parts: Vec<StockItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BatchEdited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEdited {
    pub batch_id: BatchId,
    pub updates: BatchUpdates,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartSold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartSold {
    pub batch_id: BatchId,
    pub item_id: StockItemId,
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PartReleased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartReleased {
    pub batch_id: BatchId,
    pub item_id: StockItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BatchReversed - marks the batch and every part ESTORNADO.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReversed {
    pub batch_id: BatchId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BatchEvent {
    Committed(BatchCommitted),
    Edited(BatchEdited),
    PartSold(PartSold),
    PartReleased(PartReleased),
    Reversed(BatchReversed),
}

impl Event for BatchEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BatchEvent::Committed(_) => "batches.batch.committed",
            BatchEvent::Edited(_) => "batches.batch.edited",
            BatchEvent::PartSold(_) => "batches.batch.part_sold",
            BatchEvent::PartReleased(_) => "batches.batch.part_released",
            BatchEvent::Reversed(_) => "batches.batch.reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BatchEvent::Committed(e) => e.occurred_at,
            BatchEvent::Edited(e) => e.occurred_at,
            BatchEvent::PartSold(e) => e.occurred_at,
            BatchEvent::PartReleased(e) => e.occurred_at,
            BatchEvent::Reversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Batch {
    type Command = BatchCommand;
    type Event = BatchEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BatchEvent::Committed(e) => {
                self.id = e.batch_id.clone();
                self.supplier_id = Some(e.supplier_id);
                self.supplier_name = e.supplier_name.clone();
                self.receipt_date = Some(e.receipt_date);
                self.declared_weight = e.declared_weight;
                self.costs = e.costs;
                self.payment_terms = Some(e.payment_terms);
                self.status = BatchStatus::Fechado;
                self.parts = e
                    .parts
                    .iter()
                    .map(|p| (p.id.clone(), p.clone()))
                    .collect();
                self.created = true;
            }
            BatchEvent::Edited(e) => {
                if let Some(name) = &e.updates.supplier_name {
                    self.supplier_name = name.clone();
                }
                if let Some(date) = e.updates.receipt_date {
                    self.receipt_date = Some(date);
                }
                if let Some(weight) = e.updates.declared_weight {
                    self.declared_weight = weight;
                }
                if let Some(costs) = e.updates.costs {
                    self.costs = costs;
                }
                if let Some(terms) = e.updates.payment_terms {
                    self.payment_terms = Some(terms);
                }
            }
            BatchEvent::PartSold(e) => {
                if let Some(part) = self.parts.get_mut(&e.item_id) {
                    part.status = StockStatus::Sold;
                }
                self.sold_to.insert(e.item_id.clone(), e.sale_id);
            }
            BatchEvent::PartReleased(e) => {
                if let Some(part) = self.parts.get_mut(&e.item_id) {
                    part.status = StockStatus::Available;
                }
                self.sold_to.remove(&e.item_id);
            }
            BatchEvent::Reversed(_) => {
                self.status = BatchStatus::Estornado;
                for part in self.parts.values_mut() {
                    part.status = StockStatus::Estornado;
                }
                // sold_to is kept: the audit trail still answers which sale
                // consumed which part before the estorno.
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BatchCommand::Commit(cmd) => self.handle_commit(cmd),
            BatchCommand::Edit(cmd) => self.handle_edit(cmd),
            BatchCommand::MarkPartSold(cmd) => self.handle_mark_sold(cmd),
            BatchCommand::ReleasePart(cmd) => self.handle_release(cmd),
            BatchCommand::Reverse(cmd) => self.handle_reverse(cmd),
        }
    }
}

impl Batch {
    fn ensure_batch_id(&self, batch_id: &BatchId) -> Result<(), DomainError> {
        if &self.id != batch_id {
            return Err(DomainError::invariant("batch_id mismatch"));
        }
        Ok(())
    }

    fn handle_commit(&self, cmd: &CommitBatch) -> Result<Vec<BatchEvent>, DomainError> {
        self.ensure_batch_id(&cmd.batch_id)?;
        if self.created {
            return Err(DomainError::conflict("batch already committed"));
        }
        if cmd.parts.is_empty() {
            return Err(DomainError::EmptyBatch);
        }
        if cmd.draft.supplier_name.trim().is_empty() {
            return Err(DomainError::validation("supplier name cannot be empty"));
        }
        if !cmd.draft.costs.is_valid() {
            return Err(DomainError::validation(
                "batch costs must be finite and non-negative",
            ));
        }
        if !(cmd.draft.declared_weight.is_finite() && cmd.draft.declared_weight > 0.0) {
            return Err(DomainError::validation(
                "declared weight must be positive at commit",
            ));
        }

        let mut parts = Vec::with_capacity(cmd.parts.len());
        let mut seen: Vec<(u32, PartType)> = Vec::new();
        for spec in &cmd.parts {
            if !(spec.entry_weight.is_finite() && spec.entry_weight > 0.0) {
                return Err(DomainError::validation(format!(
                    "part {:03}-{} must have a positive entry weight",
                    spec.sequence, spec.part_type
                )));
            }
            if seen.contains(&(spec.sequence, spec.part_type)) {
                return Err(DomainError::validation(format!(
                    "duplicate part {:03}-{} in batch",
                    spec.sequence, spec.part_type
                )));
            }
            seen.push((spec.sequence, spec.part_type));
            parts.push(StockItem::received(
                cmd.batch_id.clone(),
                spec.sequence,
                spec.part_type,
                spec.entry_weight,
                cmd.draft.receipt_date,
            ));
        }

        Ok(vec![BatchEvent::Committed(BatchCommitted {
            batch_id: cmd.batch_id.clone(),
            supplier_id: cmd.draft.supplier_id,
            supplier_name: cmd.draft.supplier_name.clone(),
            receipt_date: cmd.draft.receipt_date,
            declared_weight: cmd.draft.declared_weight,
            costs: cmd.draft.costs,
            payment_terms: cmd.draft.payment_terms,
            parts,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Drafts (ABERTO) are edited as plain values before commit; this path
    /// covers the committed batch, where only non-financial fields remain
    /// mutable.
    fn handle_edit(&self, cmd: &EditBatch) -> Result<Vec<BatchEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("batch {}", cmd.batch_id)));
        }
        self.ensure_batch_id(&cmd.batch_id)?;
        if self.status == BatchStatus::Estornado {
            return Err(DomainError::conflict("cannot edit a reversed batch"));
        }
        if cmd.updates.is_empty() {
            return Ok(vec![]);
        }
        if let Some(field) = cmd.updates.touches_financials() {
            return Err(DomainError::immutable(field));
        }
        if let Some(name) = &cmd.updates.supplier_name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("supplier name cannot be empty"));
            }
        }

        Ok(vec![BatchEvent::Edited(BatchEdited {
            batch_id: cmd.batch_id.clone(),
            updates: cmd.updates.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_sold(&self, cmd: &MarkPartSold) -> Result<Vec<BatchEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("batch {}", cmd.batch_id)));
        }
        self.ensure_batch_id(&cmd.batch_id)?;
        if self.status != BatchStatus::Fechado {
            return Err(DomainError::invariant(
                "parts can only be sold out of a FECHADO batch",
            ));
        }
        let part = self
            .parts
            .get(&cmd.item_id)
            .ok_or_else(|| DomainError::not_found(format!("stock item {}", cmd.item_id)))?;
        match part.status {
            StockStatus::Available => {}
            StockStatus::Sold => {
                return Err(DomainError::conflict(format!(
                    "stock item {} already sold",
                    cmd.item_id
                )));
            }
            StockStatus::Estornado => {
                return Err(DomainError::invariant(format!(
                    "stock item {} was reversed and cannot be sold",
                    cmd.item_id
                )));
            }
        }

        Ok(vec![BatchEvent::PartSold(PartSold {
            batch_id: cmd.batch_id.clone(),
            item_id: cmd.item_id.clone(),
            sale_id: cmd.sale_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleasePart) -> Result<Vec<BatchEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("batch {}", cmd.batch_id)));
        }
        self.ensure_batch_id(&cmd.batch_id)?;
        let part = self
            .parts
            .get(&cmd.item_id)
            .ok_or_else(|| DomainError::not_found(format!("stock item {}", cmd.item_id)))?;

        // Idempotent: an already-available part, or one swallowed by a batch
        // reversal, releases as a no-op so retried cascades converge.
        if self.status == BatchStatus::Estornado || part.status != StockStatus::Sold {
            return Ok(vec![]);
        }

        Ok(vec![BatchEvent::PartReleased(PartReleased {
            batch_id: cmd.batch_id.clone(),
            item_id: cmd.item_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse(&self, cmd: &ReverseBatch) -> Result<Vec<BatchEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("batch {}", cmd.batch_id)));
        }
        self.ensure_batch_id(&cmd.batch_id)?;
        if self.status == BatchStatus::Estornado {
            // Idempotent no-op: callers may retry a partially applied cascade.
            return Ok(vec![]);
        }

        Ok(vec![BatchEvent::Reversed(BatchReversed {
            batch_id: cmd.batch_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_batch_id() -> BatchId {
        "FRIBOI-20260315-001".parse().unwrap()
    }

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_draft() -> BatchDraft {
        BatchDraft::new(
            SupplierId::new(),
            "Friboi",
            test_date(),
            1_000.0,
            BatchCosts::new(18_000.0, 500.0, 200.0),
            PaymentTerms::Term {
                due_date: NaiveDate::from_ymd_opt(2026, 4, 15).unwrap(),
            },
        )
    }

    fn half_pair() -> Vec<PartSpec> {
        vec![
            PartSpec {
                sequence: 1,
                part_type: PartType::HalfA,
                entry_weight: 120.0,
            },
            PartSpec {
                sequence: 1,
                part_type: PartType::HalfB,
                entry_weight: 118.0,
            },
        ]
    }

    fn committed_batch() -> Batch {
        let mut batch = Batch::empty(test_batch_id());
        let events = batch
            .handle(&BatchCommand::Commit(CommitBatch {
                batch_id: test_batch_id(),
                draft: test_draft(),
                parts: half_pair(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            batch.apply(e);
        }
        batch
    }

    fn item_id(seq: u32, code: &str) -> StockItemId {
        StockItemId::derive(&test_batch_id(), seq, code)
    }

    #[test]
    fn commit_creates_batch_with_all_parts_fechado() {
        let batch = committed_batch();
        assert_eq!(batch.status(), BatchStatus::Fechado);
        assert_eq!(batch.parts().len(), 2);
        assert!((batch.cost_per_kg() - 18.70).abs() < 1e-9);
        let part = batch.part(&item_id(1, "HALF_A")).unwrap();
        assert_eq!(part.status, StockStatus::Available);
        assert_eq!(part.entry_date, test_date());
    }

    #[test]
    fn commit_without_parts_is_an_empty_batch_error() {
        let batch = Batch::empty(test_batch_id());
        let err = batch
            .handle(&BatchCommand::Commit(CommitBatch {
                batch_id: test_batch_id(),
                draft: test_draft(),
                parts: vec![],
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::EmptyBatch);
    }

    #[test]
    fn commit_with_zero_declared_weight_is_rejected() {
        let batch = Batch::empty(test_batch_id());
        let mut draft = test_draft();
        draft.declared_weight = 0.0;
        let err = batch
            .handle(&BatchCommand::Commit(CommitBatch {
                batch_id: test_batch_id(),
                draft,
                parts: half_pair(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn double_commit_conflicts() {
        let batch = committed_batch();
        let err = batch
            .handle(&BatchCommand::Commit(CommitBatch {
                batch_id: test_batch_id(),
                draft: test_draft(),
                parts: half_pair(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn financial_fields_are_immutable_once_fechado() {
        let batch = committed_batch();
        let err = batch
            .handle(&BatchCommand::Edit(EditBatch {
                batch_id: test_batch_id(),
                updates: BatchUpdates {
                    declared_weight: Some(900.0),
                    ..Default::default()
                },
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::immutable("declared_weight"));
    }

    #[test]
    fn supplier_name_stays_editable_once_fechado() {
        let mut batch = committed_batch();
        let events = batch
            .handle(&BatchCommand::Edit(EditBatch {
                batch_id: test_batch_id(),
                updates: BatchUpdates {
                    supplier_name: Some("Friboi Matriz".to_string()),
                    ..Default::default()
                },
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            batch.apply(e);
        }
        assert_eq!(batch.supplier_name(), "Friboi Matriz");
        // Financials untouched by the edit.
        assert!((batch.cost_per_kg() - 18.70).abs() < 1e-9);
    }

    #[test]
    fn selling_and_releasing_a_part_round_trips_its_status() {
        let mut batch = committed_batch();
        let id = item_id(1, "HALF_A");
        let sale = SaleId::new();

        let events = batch
            .handle(&BatchCommand::MarkPartSold(MarkPartSold {
                batch_id: test_batch_id(),
                item_id: id.clone(),
                sale_id: sale,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            batch.apply(e);
        }
        assert_eq!(batch.part(&id).unwrap().status, StockStatus::Sold);
        assert_eq!(batch.sale_of(&id), Some(sale));

        let events = batch
            .handle(&BatchCommand::ReleasePart(ReleasePart {
                batch_id: test_batch_id(),
                item_id: id.clone(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            batch.apply(e);
        }
        assert_eq!(batch.part(&id).unwrap().status, StockStatus::Available);
        assert_eq!(batch.sale_of(&id), None);
    }

    #[test]
    fn selling_a_sold_part_conflicts() {
        let mut batch = committed_batch();
        let id = item_id(1, "HALF_B");
        let events = batch
            .handle(&BatchCommand::MarkPartSold(MarkPartSold {
                batch_id: test_batch_id(),
                item_id: id.clone(),
                sale_id: SaleId::new(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            batch.apply(e);
        }

        let err = batch
            .handle(&BatchCommand::MarkPartSold(MarkPartSold {
                batch_id: test_batch_id(),
                item_id: id,
                sale_id: SaleId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn reversal_marks_batch_and_every_part_estornado() {
        let mut batch = committed_batch();
        let events = batch
            .handle(&BatchCommand::Reverse(ReverseBatch {
                batch_id: test_batch_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(events.len(), 1);
        for e in &events {
            batch.apply(e);
        }
        assert_eq!(batch.status(), BatchStatus::Estornado);
        assert!(batch
            .parts()
            .values()
            .all(|p| p.status == StockStatus::Estornado));

        // Second reversal: idempotent no-op.
        let events = batch
            .handle(&BatchCommand::Reverse(ReverseBatch {
                batch_id: test_batch_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn reversed_batch_rejects_sales_and_edits() {
        let mut batch = committed_batch();
        let events = batch
            .handle(&BatchCommand::Reverse(ReverseBatch {
                batch_id: test_batch_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            batch.apply(e);
        }

        let err = batch
            .handle(&BatchCommand::MarkPartSold(MarkPartSold {
                batch_id: test_batch_id(),
                item_id: item_id(1, "HALF_A"),
                sale_id: SaleId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        let err = batch
            .handle(&BatchCommand::Edit(EditBatch {
                batch_id: test_batch_id(),
                updates: BatchUpdates {
                    supplier_name: Some("X".to_string()),
                    ..Default::default()
                },
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn draft_cost_basis_tracks_declared_weight() {
        let mut draft = test_draft();
        assert!((draft.cost_per_kg() - 18.70).abs() < 1e-9);
        draft.declared_weight = 0.0;
        assert_eq!(draft.cost_per_kg(), 0.0);
        assert_eq!(draft.status(), BatchStatus::Aberto);
    }
}
