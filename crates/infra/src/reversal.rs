//! Cascading reversal ("estorno").
//!
//! A reversal never deletes: every step appends compensating events and
//! marks entities ESTORNADO, preserving the audit trail. One top-level call
//! stages the whole cascade - dependents before owners - and commits it as
//! a single atomic multi-stream append. Every step is also idempotent
//! (reversing the already-reversed emits nothing), so re-invoking the same
//! call after a storage failure converges instead of double-compensating.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use frigoerp_batches::{Batch, BatchCommand, BatchStatus, ReleasePart, ReverseBatch};
use frigoerp_core::{
    Aggregate, AggregateRoot, BatchId, DomainError, ExpectedVersion, SaleId, TransactionId,
};
use frigoerp_ledger::{
    CashLedger, EntityRef, LedgerCommand, LedgerEvent, Payable, PayableCommand, ReversePayable,
    ReverseTransaction, CASH_LEDGER_STREAM,
};
use frigoerp_sales::{ReverseSale, Sale, SaleCommand, SaleStatus};

use crate::event_store::EventStore;
use crate::executor::{CommandExecutor, OpError, UnitOfWork};
use crate::services::{
    batch_stream, find_payable_id_for_batch, group_items_by_batch, payable_stream, sale_stream,
    AGG_BATCH, AGG_LEDGER, AGG_PAYABLE, AGG_SALE,
};

/// Orchestrates the compensating cascades over the entity graph.
pub struct ReversalCoordinator<S> {
    executor: CommandExecutor<S>,
}

/// The cash ledger loaded once per cascade: compensating entries for every
/// affected sale and payable accumulate here and commit as one batch.
struct LedgerSession {
    ledger: CashLedger,
    based_on: u64,
    events: Vec<LedgerEvent>,
}

impl<S: EventStore> ReversalCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self {
            executor: CommandExecutor::new(store),
        }
    }

    /// Reverse a sale on its own: ledger entries compensated, stock items
    /// released back to AVAILABLE (unless their batch is already
    /// ESTORNADO), sale marked ESTORNADO.
    pub fn reverse_sale(
        &self,
        sale_id: SaleId,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), OpError> {
        let sale = self
            .executor
            .load(&sale_stream(sale_id), || Sale::empty(sale_id))?;
        if !sale.is_open() {
            return Err(DomainError::not_found(format!("sale {sale_id}")).into());
        }
        if sale.status() == SaleStatus::Estornado {
            return Ok(());
        }

        let mut uow = UnitOfWork::new();
        let mut ledger = self.open_ledger_session()?;
        self.stage_ledger_compensations(&mut ledger, &EntityRef::Sale(sale_id), occurred_at)?;

        // Items go back to stock; ReleasePart no-ops for parts a batch
        // reversal already swallowed.
        for (batch_id, item_ids) in group_items_by_batch(sale.item_ids())? {
            let mut batch = self
                .executor
                .load(&batch_stream(&batch_id), || Batch::empty(batch_id.clone()))?;
            if !batch.is_committed() {
                tracing::error!(batch = %batch_id, sale = %sale_id, "sale references a missing batch");
                continue;
            }
            let based_on = batch.version();
            let mut events = Vec::new();
            for item_id in item_ids {
                let released = batch.handle(&BatchCommand::ReleasePart(ReleasePart {
                    batch_id: batch_id.clone(),
                    item_id,
                    occurred_at,
                }))?;
                for e in &released {
                    batch.apply(e);
                }
                events.extend(released);
            }
            uow.stage(
                &batch_stream(&batch_id),
                AGG_BATCH,
                ExpectedVersion::Exact(based_on),
                &events,
            )?;
        }

        let sale_events = sale.handle(&SaleCommand::Reverse(ReverseSale {
            sale_id,
            occurred_at,
        }))?;
        uow.stage(
            &sale_stream(sale_id),
            AGG_SALE,
            ExpectedVersion::Exact(sale.version()),
            &sale_events,
        )?;

        self.close_ledger_session(&mut uow, ledger)?;
        uow.commit(self.executor.store())?;

        tracing::info!(sale = %sale_id, "sale reversed");
        Ok(())
    }

    /// Reverse a batch and everything causally derived from it, dependents
    /// first: sold items' sales, then the batch payable, then every stock
    /// item and the batch itself.
    pub fn reverse_batch(
        &self,
        batch_id: &BatchId,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), OpError> {
        let batch = self
            .executor
            .load(&batch_stream(batch_id), || Batch::empty(batch_id.clone()))?;
        if !batch.is_committed() {
            return Err(DomainError::not_found(format!("batch {batch_id}")).into());
        }
        if batch.status() == BatchStatus::Estornado {
            return Ok(());
        }

        let mut uow = UnitOfWork::new();
        let mut ledger = self.open_ledger_session()?;

        // 1. Dependent sales first. Items are NOT released: the batch
        //    reversal below supersedes the release.
        let sale_ids: BTreeSet<SaleId> = batch.sold_parts().map(|(_, sale_id)| sale_id).collect();
        for sale_id in sale_ids {
            let sale = self
                .executor
                .load(&sale_stream(sale_id), || Sale::empty(sale_id))?;
            if !sale.is_open() {
                tracing::error!(sale = %sale_id, batch = %batch_id, "sold part references a missing sale");
                continue;
            }
            if sale.status() == SaleStatus::Estornado {
                continue;
            }
            self.stage_ledger_compensations(&mut ledger, &EntityRef::Sale(sale_id), occurred_at)?;
            let sale_events = sale.handle(&SaleCommand::Reverse(ReverseSale {
                sale_id,
                occurred_at,
            }))?;
            uow.stage(
                &sale_stream(sale_id),
                AGG_SALE,
                ExpectedVersion::Exact(sale.version()),
                &sale_events,
            )?;
        }

        // 2. The batch payable and its payment entries.
        if let Some(payable_id) = find_payable_id_for_batch(self.executor.store(), batch_id)? {
            let payable = self
                .executor
                .load(&payable_stream(payable_id), || Payable::empty(payable_id))?;
            if payable.is_accrued() {
                self.stage_ledger_compensations(
                    &mut ledger,
                    &EntityRef::Payable(payable_id),
                    occurred_at,
                )?;
                let payable_events = payable.handle(&PayableCommand::Reverse(ReversePayable {
                    payable_id,
                    occurred_at,
                }))?;
                uow.stage(
                    &payable_stream(payable_id),
                    AGG_PAYABLE,
                    ExpectedVersion::Exact(payable.version()),
                    &payable_events,
                )?;
            }
        }

        // 3+4. Every stock item and the batch itself.
        let batch_events = batch.handle(&BatchCommand::Reverse(ReverseBatch {
            batch_id: batch_id.clone(),
            occurred_at,
        }))?;
        uow.stage(
            &batch_stream(batch_id),
            AGG_BATCH,
            ExpectedVersion::Exact(batch.version()),
            &batch_events,
        )?;

        self.close_ledger_session(&mut uow, ledger)?;
        uow.commit(self.executor.store())?;

        tracing::info!(batch = %batch_id, "batch reversed");
        Ok(())
    }

    fn open_ledger_session(&self) -> Result<LedgerSession, OpError> {
        let ledger = self.executor.load(CASH_LEDGER_STREAM, CashLedger::new)?;
        let based_on = ledger.version();
        Ok(LedgerSession {
            ledger,
            based_on,
            events: Vec::new(),
        })
    }

    /// Compensate every active ledger entry referencing an entity.
    fn stage_ledger_compensations(
        &self,
        session: &mut LedgerSession,
        related: &EntityRef,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), OpError> {
        let targets: Vec<TransactionId> = session
            .ledger
            .active_entries_for(related)
            .map(|tx| tx.id)
            .collect();
        for transaction_id in targets {
            let events = session
                .ledger
                .handle(&LedgerCommand::Reverse(ReverseTransaction {
                    transaction_id,
                    reversal_id: TransactionId::new(),
                    date: occurred_at.date_naive(),
                    occurred_at,
                }))?;
            for e in &events {
                session.ledger.apply(e);
            }
            session.events.extend(events);
        }
        Ok(())
    }

    fn close_ledger_session(
        &self,
        uow: &mut UnitOfWork,
        session: LedgerSession,
    ) -> Result<(), OpError> {
        uow.stage(
            CASH_LEDGER_STREAM,
            AGG_LEDGER,
            ExpectedVersion::Exact(session.based_on),
            &session.events,
        )
    }
}
