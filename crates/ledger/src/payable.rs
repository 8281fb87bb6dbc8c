use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use frigoerp_core::{Aggregate, AggregateRoot, BatchId, DomainError, PayableId, SupplierId, MONEY_EPSILON};
use frigoerp_events::Event;

/// Payable lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayableStatus {
    Pendente,
    Parcial,
    Pago,
    Estornado,
    Cancelado,
}

/// Aggregate root: Payable - money the business owes a supplier.
#[derive(Debug, Clone, PartialEq)]
pub struct Payable {
    id: PayableId,
    description: String,
    batch_id: Option<BatchId>,
    supplier_id: Option<SupplierId>,
    total: f64,
    amount_paid: f64,
    due_date: Option<NaiveDate>,
    status: PayableStatus,
    version: u64,
    created: bool,
}

impl Payable {
    /// Empty, not-yet-accrued instance for rehydration.
    pub fn empty(id: PayableId) -> Self {
        Self {
            id,
            description: String::new(),
            batch_id: None,
            supplier_id: None,
            total: 0.0,
            amount_paid: 0.0,
            due_date: None,
            status: PayableStatus::Pendente,
            version: 0,
            created: false,
        }
    }

    pub fn is_accrued(&self) -> bool {
        self.created
    }

    pub fn status(&self) -> PayableStatus {
        self.status
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn batch_id(&self) -> Option<&BatchId> {
        self.batch_id.as_ref()
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn amount_paid(&self) -> f64 {
        self.amount_paid
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn outstanding(&self) -> f64 {
        (self.total - self.amount_paid).max(0.0)
    }
}

impl AggregateRoot for Payable {
    type Id = PayableId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AccruePayable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccruePayable {
    pub payable_id: PayableId,
    pub description: String,
    pub batch_id: Option<BatchId>,
    pub supplier_id: Option<SupplierId>,
    pub total: f64,
    pub due_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PayPayable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayPayable {
    pub payable_id: PayableId,
    pub amount: f64,
    pub payment_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelPayable - only while nothing has been paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelPayable {
    pub payable_id: PayableId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReversePayable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversePayable {
    pub payable_id: PayableId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PayableCommand {
    Accrue(AccruePayable),
    Pay(PayPayable),
    Cancel(CancelPayable),
    Reverse(ReversePayable),
}

/// Event: PayableAccrued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayableAccrued {
    pub payable_id: PayableId,
    pub description: String,
    pub batch_id: Option<BatchId>,
    pub supplier_id: Option<SupplierId>,
    pub total: f64,
    pub due_date: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PayablePaymentMade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayablePaymentMade {
    pub payable_id: PayableId,
    pub amount: f64,
    pub new_amount_paid: f64,
    pub payment_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PayableCancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayableCancelled {
    pub payable_id: PayableId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PayableReversed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayableReversed {
    pub payable_id: PayableId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PayableEvent {
    Accrued(PayableAccrued),
    PaymentMade(PayablePaymentMade),
    Cancelled(PayableCancelled),
    Reversed(PayableReversed),
}

impl Event for PayableEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PayableEvent::Accrued(_) => "ledger.payable.accrued",
            PayableEvent::PaymentMade(_) => "ledger.payable.payment_made",
            PayableEvent::Cancelled(_) => "ledger.payable.cancelled",
            PayableEvent::Reversed(_) => "ledger.payable.reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PayableEvent::Accrued(e) => e.occurred_at,
            PayableEvent::PaymentMade(e) => e.occurred_at,
            PayableEvent::Cancelled(e) => e.occurred_at,
            PayableEvent::Reversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Payable {
    type Command = PayableCommand;
    type Event = PayableEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PayableEvent::Accrued(e) => {
                self.id = e.payable_id;
                self.description = e.description.clone();
                self.batch_id = e.batch_id.clone();
                self.supplier_id = e.supplier_id;
                self.total = e.total;
                self.amount_paid = 0.0;
                self.due_date = e.due_date;
                self.status = PayableStatus::Pendente;
                self.created = true;
            }
            PayableEvent::PaymentMade(e) => {
                self.amount_paid = e.new_amount_paid;
                self.status = if self.amount_paid >= self.total - MONEY_EPSILON {
                    PayableStatus::Pago
                } else {
                    PayableStatus::Parcial
                };
            }
            PayableEvent::Cancelled(_) => {
                self.status = PayableStatus::Cancelado;
            }
            PayableEvent::Reversed(_) => {
                self.status = PayableStatus::Estornado;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PayableCommand::Accrue(cmd) => self.handle_accrue(cmd),
            PayableCommand::Pay(cmd) => self.handle_pay(cmd),
            PayableCommand::Cancel(cmd) => self.handle_cancel(cmd),
            PayableCommand::Reverse(cmd) => self.handle_reverse(cmd),
        }
    }
}

impl Payable {
    fn ensure_payable_id(&self, payable_id: PayableId) -> Result<(), DomainError> {
        if self.id != payable_id {
            return Err(DomainError::invariant("payable_id mismatch"));
        }
        Ok(())
    }

    fn handle_accrue(&self, cmd: &AccruePayable) -> Result<Vec<PayableEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("payable already accrued"));
        }
        self.ensure_payable_id(cmd.payable_id)?;
        if cmd.description.trim().is_empty() {
            return Err(DomainError::validation("payable description cannot be empty"));
        }
        if !(cmd.total.is_finite() && cmd.total > 0.0) {
            return Err(DomainError::validation("payable total must be positive"));
        }

        Ok(vec![PayableEvent::Accrued(PayableAccrued {
            payable_id: cmd.payable_id,
            description: cmd.description.clone(),
            batch_id: cmd.batch_id.clone(),
            supplier_id: cmd.supplier_id,
            total: cmd.total,
            due_date: cmd.due_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_pay(&self, cmd: &PayPayable) -> Result<Vec<PayableEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("payable {}", cmd.payable_id)));
        }
        self.ensure_payable_id(cmd.payable_id)?;
        match self.status {
            PayableStatus::Estornado => {
                return Err(DomainError::conflict("cannot pay a reversed payable"));
            }
            PayableStatus::Cancelado => {
                return Err(DomainError::conflict("cannot pay a cancelled payable"));
            }
            PayableStatus::Pendente | PayableStatus::Parcial | PayableStatus::Pago => {}
        }
        if !(cmd.amount.is_finite() && cmd.amount > 0.0) {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        let outstanding = self.outstanding();
        if cmd.amount > outstanding + MONEY_EPSILON {
            return Err(DomainError::Overpayment {
                attempted: cmd.amount,
                outstanding,
            });
        }

        Ok(vec![PayableEvent::PaymentMade(PayablePaymentMade {
            payable_id: cmd.payable_id,
            amount: cmd.amount,
            new_amount_paid: self.amount_paid + cmd.amount,
            payment_date: cmd.payment_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelPayable) -> Result<Vec<PayableEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("payable {}", cmd.payable_id)));
        }
        self.ensure_payable_id(cmd.payable_id)?;
        if self.status == PayableStatus::Cancelado {
            return Ok(vec![]);
        }
        if self.status != PayableStatus::Pendente || self.amount_paid > MONEY_EPSILON {
            // Money already moved; the correction path is reversal.
            return Err(DomainError::conflict(
                "only an unpaid PENDENTE payable can be cancelled",
            ));
        }

        Ok(vec![PayableEvent::Cancelled(PayableCancelled {
            payable_id: cmd.payable_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse(&self, cmd: &ReversePayable) -> Result<Vec<PayableEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("payable {}", cmd.payable_id)));
        }
        self.ensure_payable_id(cmd.payable_id)?;
        if matches!(self.status, PayableStatus::Estornado | PayableStatus::Cancelado) {
            // Idempotent no-op; a cancelled payable has nothing to compensate.
            return Ok(vec![]);
        }

        Ok(vec![PayableEvent::Reversed(PayableReversed {
            payable_id: cmd.payable_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
