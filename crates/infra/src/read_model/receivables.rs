//! Receivables read model: per-sale balances folded from the sale streams,
//! feeding dashboards and the credit evaluator.

use std::collections::BTreeMap;

use serde::Serialize;

use chrono::NaiveDate;
use frigoerp_core::{ClientId, SaleId, MONEY_EPSILON};
use frigoerp_credit::ReceivableSnapshot;
use frigoerp_events::Projection;
use frigoerp_sales::{SaleEvent, SaleStatus};

/// One sale's receivable position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleReceivable {
    pub sale_id: SaleId,
    pub client_id: ClientId,
    pub total_due: f64,
    pub amount_paid: f64,
    pub due_date: NaiveDate,
    pub status: SaleStatus,
}

impl SaleReceivable {
    pub fn outstanding(&self) -> f64 {
        (self.total_due - self.amount_paid).max(0.0)
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == SaleStatus::Pendente
            && self.outstanding() > MONEY_EPSILON
            && self.due_date < today
    }
}

/// Receivables over all sale streams.
#[derive(Debug, Default)]
pub struct ReceivablesView {
    sales: BTreeMap<SaleId, SaleReceivable>,
}

impl Projection for ReceivablesView {
    type Ev = SaleEvent;

    fn apply(&mut self, event: &Self::Ev) {
        match event {
            SaleEvent::Opened(e) => {
                self.sales.insert(
                    e.sale_id,
                    SaleReceivable {
                        sale_id: e.sale_id,
                        client_id: e.client_id,
                        total_due: e.exit_weight * e.price_per_kg + e.extra_costs,
                        amount_paid: 0.0,
                        due_date: e.due_date,
                        status: SaleStatus::Pendente,
                    },
                );
            }
            SaleEvent::PaymentApplied(e) => {
                if let Some(sale) = self.sales.get_mut(&e.sale_id) {
                    sale.amount_paid = e.new_amount_paid;
                    if sale.amount_paid >= sale.total_due - MONEY_EPSILON {
                        sale.status = SaleStatus::Pago;
                    }
                }
            }
            SaleEvent::Reversed(e) => {
                if let Some(sale) = self.sales.get_mut(&e.sale_id) {
                    sale.status = SaleStatus::Estornado;
                }
            }
        }
    }
}

impl ReceivablesView {
    /// Every sale, reversed ones included (audit listing).
    pub fn all(&self) -> impl Iterator<Item = &SaleReceivable> {
        self.sales.values()
    }

    pub fn sale(&self, id: SaleId) -> Option<&SaleReceivable> {
        self.sales.get(&id)
    }

    /// Active (non-reversed) receivables of one client, as the credit
    /// evaluator consumes them.
    pub fn client_snapshots(&self, client_id: ClientId) -> Vec<ReceivableSnapshot> {
        self.sales
            .values()
            .filter(|s| s.client_id == client_id && s.status != SaleStatus::Estornado)
            .map(|s| ReceivableSnapshot {
                sale_id: s.sale_id,
                total_due: s.total_due,
                amount_paid: s.amount_paid,
                due_date: s.due_date,
            })
            .collect()
    }

    /// Total the client still owes across active sales.
    pub fn outstanding_for(&self, client_id: ClientId) -> f64 {
        self.sales
            .values()
            .filter(|s| s.client_id == client_id && s.status == SaleStatus::Pendente)
            .map(SaleReceivable::outstanding)
            .sum()
    }
}
