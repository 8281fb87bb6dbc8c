//! Application service surface: the operation-style contracts the intake,
//! sales and dashboard collaborators call.
//!
//! Writes compose pure aggregate decisions and commit them through a
//! [`UnitOfWork`]; reads rehydrate aggregates or fold read models on
//! demand. Nothing here caches derived state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use frigoerp_batches::{
    Batch, BatchCommand, BatchDraft, BatchUpdates, CommitBatch, EditBatch, MarkPartSold, PartSpec,
};
use frigoerp_core::{
    Aggregate, AggregateRoot, BatchId, ClientId, DomainError, ExpectedVersion, PayableId,
    PaymentTerms, SaleId, StockItemId, TransactionId,
};
use frigoerp_credit::{evaluate, CreditAssessment};
use frigoerp_events::project;
use frigoerp_ledger::{
    AccruePayable, AppendTransaction, CancelPayable, CashLedger, Direction, EntityRef,
    LedgerCommand, LedgerEvent, PayPayable, Payable, PayableCommand, PayableEvent,
    ReverseTransaction, Transaction, TransactionCategory, CASH_LEDGER_STREAM,
};
use frigoerp_sales::{ApplyPayment, OpenSale, PaymentMethod, Sale, SaleCommand, SaleStatus};
use frigoerp_stock::{classify_age, days_in_storage, reconcile_sequence, StockItem};

use crate::event_store::EventStore;
use crate::executor::{decode_events, CommandExecutor, OpError, UnitOfWork};
use crate::read_model::{ReceivablesView, SellableItem, StockView};
use crate::registry::{ClientRegistry, SupplierRegistry};
use crate::reversal::ReversalCoordinator;

pub const AGG_BATCH: &str = "batches.batch";
pub const AGG_SALE: &str = "sales.sale";
pub const AGG_PAYABLE: &str = "ledger.payable";
pub const AGG_LEDGER: &str = "ledger.cash";

pub fn batch_stream(id: &BatchId) -> String {
    format!("batch/{id}")
}

pub fn sale_stream(id: SaleId) -> String {
    format!("sale/{id}")
}

pub fn payable_stream(id: PayableId) -> String {
    format!("payable/{id}")
}

/// Outcome of a successful batch commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    pub batch_id: BatchId,
    pub payable_id: PayableId,
}

/// Outcome of a successful allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationReceipt {
    pub sale_id: SaleId,
    /// Reconciled cold-storage weight of the allocated parts (kg).
    pub entry_weight: f64,
    pub exit_weight: f64,
    /// `entry - exit`; reported to the caller, not constrained here.
    pub breakage: f64,
}

/// Outcome of a successful payment application.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub status: SaleStatus,
    pub amount_paid: f64,
    pub outstanding: f64,
    /// The `IN/SALE` entry, when cash actually moved.
    pub cash_entry: Option<TransactionId>,
    /// The `OUT/DISCOUNT` entry, when a discount was granted.
    pub discount_entry: Option<TransactionId>,
}

/// Parameters of a sale allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationRequest {
    pub item_ids: Vec<StockItemId>,
    pub client_id: ClientId,
    /// Independently measured dispatch weight (kg).
    pub exit_weight: f64,
    pub price_per_kg: f64,
    pub extra_costs: f64,
    pub due_date: NaiveDate,
}

/// The core's synchronous operation surface.
pub struct CoreServices<S: EventStore + Clone> {
    executor: CommandExecutor<S>,
    reversals: ReversalCoordinator<S>,
    clients: Arc<dyn ClientRegistry>,
    suppliers: Arc<dyn SupplierRegistry>,
}

impl<S: EventStore + Clone> CoreServices<S> {
    pub fn new(
        store: S,
        clients: Arc<dyn ClientRegistry>,
        suppliers: Arc<dyn SupplierRegistry>,
    ) -> Self {
        Self {
            executor: CommandExecutor::new(store.clone()),
            reversals: ReversalCoordinator::new(store),
            clients,
            suppliers,
        }
    }

    fn store(&self) -> &S {
        self.executor.store()
    }

    // ----- batch intake -------------------------------------------------

    /// Commit a drafted batch: the batch, all of its initial stock items
    /// and the supplier payable become durable in one atomic append. Cash
    /// purchases settle the payable inside the same commit with an
    /// `OUT/PURCHASE` ledger entry.
    pub fn commit_batch(
        &self,
        draft: BatchDraft,
        parts: Vec<PartSpec>,
        occurred_at: DateTime<Utc>,
    ) -> Result<CommitReceipt, OpError> {
        let supplier = self
            .suppliers
            .supplier(draft.supplier_id)
            .ok_or_else(|| DomainError::not_found(format!("supplier {}", draft.supplier_id)))?;
        let batch_id = self.next_batch_id(&supplier.prefix, draft.receipt_date)?;

        let batch = self
            .executor
            .load(&batch_stream(&batch_id), || Batch::empty(batch_id.clone()))?;
        let payment_terms = draft.payment_terms;
        let receipt_date = draft.receipt_date;
        let total_cost = draft.costs.total();
        let part_count = parts.len();

        let batch_events = batch.handle(&BatchCommand::Commit(CommitBatch {
            batch_id: batch_id.clone(),
            draft,
            parts,
            occurred_at,
        }))?;

        // The supplier payable accrues with the batch; cash terms settle it
        // on the spot so every batch leaves an auditable payable trail.
        let payable_id = PayableId::new();
        let mut payable = Payable::empty(payable_id);
        let mut payable_events = payable.handle(&PayableCommand::Accrue(AccruePayable {
            payable_id,
            description: format!("Lote {batch_id} ({})", supplier.name),
            batch_id: Some(batch_id.clone()),
            supplier_id: Some(supplier.id),
            total: total_cost,
            due_date: match payment_terms {
                PaymentTerms::Term { due_date } => Some(due_date),
                PaymentTerms::Cash => None,
            },
            occurred_at,
        }))?;
        for e in &payable_events {
            payable.apply(e);
        }

        let mut uow = UnitOfWork::new();
        if payment_terms == PaymentTerms::Cash {
            let settled = payable.handle(&PayableCommand::Pay(PayPayable {
                payable_id,
                amount: total_cost,
                payment_date: receipt_date,
                occurred_at,
            }))?;
            for e in &settled {
                payable.apply(e);
            }
            payable_events.extend(settled);

            let (ledger, ledger_based_on) = self.load_ledger()?;
            let ledger_events = ledger.handle(&LedgerCommand::Append(AppendTransaction {
                tx: Transaction {
                    id: TransactionId::new(),
                    date: receipt_date,
                    description: format!("Pagamento lote {batch_id} ({})", supplier.name),
                    direction: Direction::Out,
                    category: TransactionCategory::Purchase,
                    amount: total_cost,
                    related: Some(EntityRef::Payable(payable_id)),
                    reversal_of: None,
                },
                occurred_at,
            }))?;
            uow.stage(
                CASH_LEDGER_STREAM,
                AGG_LEDGER,
                ExpectedVersion::Exact(ledger_based_on),
                &ledger_events,
            )?;
        }

        uow.stage(
            &batch_stream(&batch_id),
            AGG_BATCH,
            ExpectedVersion::Exact(0),
            &batch_events,
        )?;
        uow.stage(
            &payable_stream(payable_id),
            AGG_PAYABLE,
            ExpectedVersion::Exact(0),
            &payable_events,
        )?;
        uow.commit(self.store())?;

        tracing::info!(batch = %batch_id, parts = part_count, total = total_cost, "batch committed");
        Ok(CommitReceipt {
            batch_id,
            payable_id,
        })
    }

    /// Edit a committed batch. Financial fields are immutable once FECHADO.
    pub fn edit_batch(
        &self,
        batch_id: &BatchId,
        updates: BatchUpdates,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), OpError> {
        self.executor
            .execute(
                &batch_stream(batch_id),
                AGG_BATCH,
                BatchCommand::Edit(EditBatch {
                    batch_id: batch_id.clone(),
                    updates,
                    occurred_at,
                }),
                || Batch::empty(batch_id.clone()),
            )
            .map(|_| ())
    }

    /// Next free human-readable id for this supplier and receipt date.
    fn next_batch_id(&self, prefix: &str, receipt_date: NaiveDate) -> Result<BatchId, OpError> {
        let probe = BatchId::compose(prefix, receipt_date, 1)?;
        let stem = {
            let full = batch_stream(&probe);
            // Strip the trailing "001": everything up to the last segment.
            full[..full.len() - 3].to_string()
        };

        let existing = self.store().load_by_type(AGG_BATCH)?;
        let mut streams: Vec<&str> = existing
            .iter()
            .map(|e| e.stream_id.as_str())
            .filter(|id| id.starts_with(&stem))
            .collect();
        streams.sort_unstable();
        streams.dedup();

        Ok(BatchId::compose(prefix, receipt_date, streams.len() as u32 + 1)?)
    }

    // ----- sale settlement ----------------------------------------------

    /// Allocate AVAILABLE stock items to a client, atomically marking every
    /// part SOLD and opening the sale PENDENTE. Rejects BLOCKED parts with
    /// a stale-inventory error; ATTENTION parts go through with a warning.
    pub fn allocate(
        &self,
        request: AllocationRequest,
        today: NaiveDate,
        occurred_at: DateTime<Utc>,
    ) -> Result<AllocationReceipt, OpError> {
        if request.item_ids.is_empty() {
            return Err(DomainError::validation("no stock items to allocate").into());
        }
        self.clients
            .client(request.client_id)
            .ok_or_else(|| DomainError::not_found(format!("client {}", request.client_id)))?;

        let sale_id = SaleId::new();
        let mut uow = UnitOfWork::new();
        let mut entry_weight = 0.0;

        for (batch_id, item_ids) in group_items_by_batch(&request.item_ids)? {
            let mut batch = self
                .executor
                .load(&batch_stream(&batch_id), || Batch::empty(batch_id.clone()))?;
            if !batch.is_committed() {
                return Err(DomainError::not_found(format!("batch {batch_id}")).into());
            }
            let based_on = batch.version();

            let mut allocated: Vec<StockItem> = Vec::with_capacity(item_ids.len());
            for item_id in &item_ids {
                let part = batch
                    .part(item_id)
                    .ok_or_else(|| DomainError::not_found(format!("stock item {item_id}")))?
                    .clone();
                let days = days_in_storage(part.entry_date, today);
                if !classify_age(days).is_sellable() {
                    return Err(DomainError::StaleInventory {
                        item_id: item_id.to_string(),
                        days,
                    }
                    .into());
                }
                if classify_age(days).needs_attention() {
                    tracing::warn!(item = %item_id, days, "allocating a part in the attention window");
                }
                allocated.push(part);
            }

            let mut batch_events = Vec::new();
            for item_id in &item_ids {
                let events = batch.handle(&BatchCommand::MarkPartSold(MarkPartSold {
                    batch_id: batch_id.clone(),
                    item_id: item_id.clone(),
                    sale_id,
                    occurred_at,
                }))?;
                for e in &events {
                    batch.apply(e);
                }
                batch_events.extend(events);
            }
            uow.stage(
                &batch_stream(&batch_id),
                AGG_BATCH,
                ExpectedVersion::Exact(based_on),
                &batch_events,
            )?;

            // Per-sequence reconciliation of what this sale takes.
            let mut by_sequence: BTreeMap<u32, Vec<StockItem>> = BTreeMap::new();
            for part in allocated {
                by_sequence.entry(part.sequence).or_default().push(part);
            }
            for parts in by_sequence.values() {
                entry_weight += reconcile_sequence(parts).total_weight;
            }
        }

        let sale = Sale::empty(sale_id);
        let sale_events = sale.handle(&SaleCommand::Open(OpenSale {
            sale_id,
            client_id: request.client_id,
            item_ids: request.item_ids.clone(),
            entry_weight,
            exit_weight: request.exit_weight,
            price_per_kg: request.price_per_kg,
            extra_costs: request.extra_costs,
            due_date: request.due_date,
            occurred_at,
        }))?;
        uow.stage(
            &sale_stream(sale_id),
            AGG_SALE,
            ExpectedVersion::Exact(0),
            &sale_events,
        )?;
        uow.commit(self.store())?;

        let breakage = entry_weight - request.exit_weight;
        tracing::info!(
            sale = %sale_id,
            items = request.item_ids.len(),
            entry_weight,
            exit_weight = request.exit_weight,
            breakage,
            "sale allocated"
        );
        Ok(AllocationReceipt {
            sale_id,
            entry_weight,
            exit_weight: request.exit_weight,
            breakage,
        })
    }

    /// Apply a payment (and optional discount) to a sale, appending the
    /// matching ledger entries in the same atomic commit. The discount is
    /// modeled as money leaving the business (`OUT/DISCOUNT`), so the cash
    /// total stays literal.
    pub fn apply_payment(
        &self,
        sale_id: SaleId,
        amount_received: f64,
        discount: f64,
        method: PaymentMethod,
        payment_date: NaiveDate,
        occurred_at: DateTime<Utc>,
    ) -> Result<PaymentReceipt, OpError> {
        let mut sale = self
            .executor
            .load(&sale_stream(sale_id), || Sale::empty(sale_id))?;
        if !sale.is_open() {
            return Err(DomainError::not_found(format!("sale {sale_id}")).into());
        }
        let based_on = sale.version();

        let sale_events = sale.handle(&SaleCommand::ApplyPayment(ApplyPayment {
            sale_id,
            amount_received,
            discount,
            method,
            payment_date,
            occurred_at,
        }))?;
        for e in &sale_events {
            sale.apply(e);
        }

        let (mut ledger, ledger_based_on) = self.load_ledger()?;
        let mut ledger_events: Vec<LedgerEvent> = Vec::new();
        let mut cash_entry = None;
        let mut discount_entry = None;

        if amount_received > 0.0 {
            let id = TransactionId::new();
            let events = ledger.handle(&LedgerCommand::Append(AppendTransaction {
                tx: Transaction {
                    id,
                    date: payment_date,
                    description: format!("Recebimento venda {sale_id}"),
                    direction: Direction::In,
                    category: TransactionCategory::Sale,
                    amount: amount_received,
                    related: Some(EntityRef::Sale(sale_id)),
                    reversal_of: None,
                },
                occurred_at,
            }))?;
            for e in &events {
                ledger.apply(e);
            }
            ledger_events.extend(events);
            cash_entry = Some(id);
        }
        if discount > 0.0 {
            let id = TransactionId::new();
            let events = ledger.handle(&LedgerCommand::Append(AppendTransaction {
                tx: Transaction {
                    id,
                    date: payment_date,
                    description: format!("Desconto concedido venda {sale_id}"),
                    direction: Direction::Out,
                    category: TransactionCategory::Discount,
                    amount: discount,
                    related: Some(EntityRef::Sale(sale_id)),
                    reversal_of: None,
                },
                occurred_at,
            }))?;
            for e in &events {
                ledger.apply(e);
            }
            ledger_events.extend(events);
            discount_entry = Some(id);
        }

        let mut uow = UnitOfWork::new();
        uow.stage(
            &sale_stream(sale_id),
            AGG_SALE,
            ExpectedVersion::Exact(based_on),
            &sale_events,
        )?;
        uow.stage(
            CASH_LEDGER_STREAM,
            AGG_LEDGER,
            ExpectedVersion::Exact(ledger_based_on),
            &ledger_events,
        )?;
        uow.commit(self.store())?;

        tracing::info!(
            sale = %sale_id,
            amount = amount_received,
            discount,
            status = ?sale.status(),
            "payment applied"
        );
        Ok(PaymentReceipt {
            status: sale.status(),
            amount_paid: sale.amount_paid(),
            outstanding: sale.outstanding(),
            cash_entry,
            discount_entry,
        })
    }

    // ----- payables & ad hoc cash ---------------------------------------

    /// Pay down a supplier payable, appending the `OUT/PURCHASE` cash entry
    /// in the same atomic commit.
    pub fn pay_payable(
        &self,
        payable_id: PayableId,
        amount: f64,
        payment_date: NaiveDate,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), OpError> {
        let payable = self
            .executor
            .load(&payable_stream(payable_id), || Payable::empty(payable_id))?;
        if !payable.is_accrued() {
            return Err(DomainError::not_found(format!("payable {payable_id}")).into());
        }
        let based_on = payable.version();
        let payable_events = payable.handle(&PayableCommand::Pay(PayPayable {
            payable_id,
            amount,
            payment_date,
            occurred_at,
        }))?;

        let (ledger, ledger_based_on) = self.load_ledger()?;
        let ledger_events = ledger.handle(&LedgerCommand::Append(AppendTransaction {
            tx: Transaction {
                id: TransactionId::new(),
                date: payment_date,
                description: format!("Pagamento {}", payable.description()),
                direction: Direction::Out,
                category: TransactionCategory::Purchase,
                amount,
                related: Some(EntityRef::Payable(payable_id)),
                reversal_of: None,
            },
            occurred_at,
        }))?;

        let mut uow = UnitOfWork::new();
        uow.stage(
            &payable_stream(payable_id),
            AGG_PAYABLE,
            ExpectedVersion::Exact(based_on),
            &payable_events,
        )?;
        uow.stage(
            CASH_LEDGER_STREAM,
            AGG_LEDGER,
            ExpectedVersion::Exact(ledger_based_on),
            &ledger_events,
        )?;
        uow.commit(self.store())?;

        tracing::info!(payable = %payable_id, amount, "payable payment made");
        Ok(())
    }

    /// Cancel a payable nothing has been paid against.
    pub fn cancel_payable(
        &self,
        payable_id: PayableId,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), OpError> {
        self.executor
            .execute(
                &payable_stream(payable_id),
                AGG_PAYABLE,
                PayableCommand::Cancel(CancelPayable {
                    payable_id,
                    occurred_at,
                }),
                || Payable::empty(payable_id),
            )
            .map(|_| ())
    }

    /// Record an ad hoc operational cash movement (rent, fuel, ice) outside
    /// any sale or payable.
    pub fn record_operational(
        &self,
        description: impl Into<String>,
        direction: Direction,
        amount: f64,
        date: NaiveDate,
        occurred_at: DateTime<Utc>,
    ) -> Result<TransactionId, OpError> {
        let id = TransactionId::new();
        self.executor.execute(
            CASH_LEDGER_STREAM,
            AGG_LEDGER,
            LedgerCommand::Append(AppendTransaction {
                tx: Transaction {
                    id,
                    date,
                    description: description.into(),
                    direction,
                    category: TransactionCategory::Operational,
                    amount,
                    related: None,
                    reversal_of: None,
                },
                occurred_at,
            }),
            CashLedger::new,
        )?;
        Ok(id)
    }

    /// Reverse a single ledger entry: appends the compensating entry and
    /// returns its id. The original stays untouched for audit.
    pub fn reverse_transaction(
        &self,
        transaction_id: TransactionId,
        occurred_at: DateTime<Utc>,
    ) -> Result<TransactionId, OpError> {
        let reversal_id = TransactionId::new();
        self.executor.execute(
            CASH_LEDGER_STREAM,
            AGG_LEDGER,
            LedgerCommand::Reverse(ReverseTransaction {
                transaction_id,
                reversal_id,
                date: occurred_at.date_naive(),
                occurred_at,
            }),
            CashLedger::new,
        )?;
        Ok(reversal_id)
    }

    // ----- reversal cascades --------------------------------------------

    /// Reverse a sale: payments compensated, items back to stock, sale
    /// ESTORNADO. Idempotent; atomic.
    pub fn reverse_sale(&self, sale_id: SaleId, occurred_at: DateTime<Utc>) -> Result<(), OpError> {
        self.reversals.reverse_sale(sale_id, occurred_at)
    }

    /// Reverse a batch and everything causally derived from it. Idempotent;
    /// atomic.
    pub fn reverse_batch(
        &self,
        batch_id: &BatchId,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), OpError> {
        self.reversals.reverse_batch(batch_id, occurred_at)
    }

    // ----- reads --------------------------------------------------------

    /// Sellable stock, FIFO, with aging flags.
    pub fn list_sellable(
        &self,
        batch_filter: Option<&BatchId>,
        today: NaiveDate,
    ) -> Result<Vec<SellableItem>, OpError> {
        Ok(self.stock_view()?.sellable(batch_filter, today))
    }

    /// Cash balance as a pure fold over the ledger.
    pub fn balance(&self, filter: &frigoerp_ledger::BalanceFilter) -> Result<f64, OpError> {
        Ok(self.ledger()?.balance(filter))
    }

    /// Derive a client's credit tier from their receivable history.
    pub fn evaluate_client(
        &self,
        client_id: ClientId,
        today: NaiveDate,
    ) -> Result<CreditAssessment, OpError> {
        let client = self
            .clients
            .client(client_id)
            .ok_or_else(|| DomainError::not_found(format!("client {client_id}")))?;
        let receivables = self.receivables_view()?.client_snapshots(client_id);
        Ok(evaluate(client.credit_limit, &receivables, today))
    }

    /// Rehydrated batch (audit queries see ESTORNADO entities too).
    pub fn load_batch(&self, batch_id: &BatchId) -> Result<Batch, OpError> {
        let batch = self
            .executor
            .load(&batch_stream(batch_id), || Batch::empty(batch_id.clone()))?;
        if !batch.is_committed() {
            return Err(DomainError::not_found(format!("batch {batch_id}")).into());
        }
        Ok(batch)
    }

    /// Rehydrated sale.
    pub fn load_sale(&self, sale_id: SaleId) -> Result<Sale, OpError> {
        let sale = self
            .executor
            .load(&sale_stream(sale_id), || Sale::empty(sale_id))?;
        if !sale.is_open() {
            return Err(DomainError::not_found(format!("sale {sale_id}")).into());
        }
        Ok(sale)
    }

    /// Rehydrated payable.
    pub fn load_payable(&self, payable_id: PayableId) -> Result<Payable, OpError> {
        let payable = self
            .executor
            .load(&payable_stream(payable_id), || Payable::empty(payable_id))?;
        if !payable.is_accrued() {
            return Err(DomainError::not_found(format!("payable {payable_id}")).into());
        }
        Ok(payable)
    }

    /// The payable accrued for a batch, if one exists.
    pub fn payable_of_batch(&self, batch_id: &BatchId) -> Result<Option<Payable>, OpError> {
        match find_payable_id_for_batch(self.store(), batch_id)? {
            Some(id) => self.load_payable(id).map(Some),
            None => Ok(None),
        }
    }

    /// Rehydrated cash ledger (audit listing of every entry).
    pub fn ledger(&self) -> Result<CashLedger, OpError> {
        Ok(self.load_ledger()?.0)
    }

    fn load_ledger(&self) -> Result<(CashLedger, u64), OpError> {
        let ledger = self.executor.load(CASH_LEDGER_STREAM, CashLedger::new)?;
        let version = ledger.version();
        Ok((ledger, version))
    }

    fn stock_view(&self) -> Result<StockView, OpError> {
        let stored = self.store().load_by_type(AGG_BATCH)?;
        Ok(project(decode_events(&stored)?))
    }

    fn receivables_view(&self) -> Result<ReceivablesView, OpError> {
        let stored = self.store().load_by_type(AGG_SALE)?;
        Ok(project(decode_events(&stored)?))
    }
}

/// Group item ids by their owning batch (first three id segments).
pub(crate) fn group_items_by_batch(
    items: &[StockItemId],
) -> Result<BTreeMap<BatchId, Vec<StockItemId>>, OpError> {
    let mut by_batch: BTreeMap<BatchId, Vec<StockItemId>> = BTreeMap::new();
    for item in items {
        by_batch
            .entry(item.batch_id()?)
            .or_default()
            .push(item.clone());
    }
    Ok(by_batch)
}

/// Scan the payable streams for the one accrued against a batch.
pub(crate) fn find_payable_id_for_batch<S: EventStore>(
    store: &S,
    batch_id: &BatchId,
) -> Result<Option<PayableId>, OpError> {
    let stored = store.load_by_type(AGG_PAYABLE)?;
    for event in decode_events::<PayableEvent>(&stored)? {
        if let PayableEvent::Accrued(accrued) = event {
            if accrued.batch_id.as_ref() == Some(batch_id) {
                return Ok(Some(accrued.payable_id));
            }
        }
    }
    Ok(None)
}
