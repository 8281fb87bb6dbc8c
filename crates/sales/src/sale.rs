use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use frigoerp_core::{
    Aggregate, AggregateRoot, ClientId, DomainError, SaleId, StockItemId, MONEY_EPSILON,
};
use frigoerp_events::Event;

/// Exit weighing above this ratio of the reconciled entry weight is
/// presumed a typo at the scale terminal, not real mass.
pub const MAX_EXIT_OVER_ENTRY: f64 = 1.10;

/// Sale lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    Pendente,
    Pago,
    Estornado,
}

/// How a payment arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Dinheiro,
    Pix,
    Cartao,
    Boleto,
    Transferencia,
}

/// Aggregate root: Sale.
#[derive(Debug, Clone, PartialEq)]
pub struct Sale {
    id: SaleId,
    client_id: Option<ClientId>,
    item_ids: Vec<StockItemId>,
    /// Reconciled cold-storage weight of the allocated parts (kg).
    entry_weight: f64,
    /// Independently measured weight at dispatch (kg).
    exit_weight: f64,
    price_per_kg: f64,
    extra_costs: f64,
    amount_paid: f64,
    due_date: Option<NaiveDate>,
    status: SaleStatus,
    version: u64,
    created: bool,
}

impl Sale {
    /// Empty, not-yet-opened instance for rehydration.
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            client_id: None,
            item_ids: Vec::new(),
            entry_weight: 0.0,
            exit_weight: 0.0,
            price_per_kg: 0.0,
            extra_costs: 0.0,
            amount_paid: 0.0,
            due_date: None,
            status: SaleStatus::Pendente,
            version: 0,
            created: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.created
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn item_ids(&self) -> &[StockItemId] {
        &self.item_ids
    }

    pub fn exit_weight(&self) -> f64 {
        self.exit_weight
    }

    pub fn price_per_kg(&self) -> f64 {
        self.price_per_kg
    }

    pub fn amount_paid(&self) -> f64 {
        self.amount_paid
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    /// Total receivable: exit weight times price, plus extras.
    pub fn total_due(&self) -> f64 {
        self.exit_weight * self.price_per_kg + self.extra_costs
    }

    /// Remaining balance the client still owes.
    pub fn outstanding(&self) -> f64 {
        (self.total_due() - self.amount_paid).max(0.0)
    }

    /// Weight lost between cold-storage entry and dispatch (kg). Reported,
    /// not constrained beyond the open-time sanity bound.
    pub fn breakage(&self) -> f64 {
        self.entry_weight - self.exit_weight
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenSale - allocation of stock items to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenSale {
    pub sale_id: SaleId,
    pub client_id: ClientId,
    pub item_ids: Vec<StockItemId>,
    pub entry_weight: f64,
    pub exit_weight: f64,
    pub price_per_kg: f64,
    pub extra_costs: f64,
    pub due_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApplyPayment - a partial or full payment, possibly discounted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyPayment {
    pub sale_id: SaleId,
    pub amount_received: f64,
    pub discount: f64,
    pub method: PaymentMethod,
    pub payment_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseSale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseSale {
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SaleCommand {
    Open(OpenSale),
    ApplyPayment(ApplyPayment),
    Reverse(ReverseSale),
}

/// Event: SaleOpened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleOpened {
    pub sale_id: SaleId,
    pub client_id: ClientId,
    pub item_ids: Vec<StockItemId>,
    pub entry_weight: f64,
    pub exit_weight: f64,
    pub price_per_kg: f64,
    pub extra_costs: f64,
    pub due_date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentApplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentApplied {
    pub sale_id: SaleId,
    pub amount_received: f64,
    pub discount: f64,
    pub method: PaymentMethod,
    pub payment_date: NaiveDate,
    pub new_amount_paid: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleReversed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleReversed {
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SaleEvent {
    Opened(SaleOpened),
    PaymentApplied(PaymentApplied),
    Reversed(SaleReversed),
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::Opened(_) => "sales.sale.opened",
            SaleEvent::PaymentApplied(_) => "sales.sale.payment_applied",
            SaleEvent::Reversed(_) => "sales.sale.reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::Opened(e) => e.occurred_at,
            SaleEvent::PaymentApplied(e) => e.occurred_at,
            SaleEvent::Reversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::Opened(e) => {
                self.id = e.sale_id;
                self.client_id = Some(e.client_id);
                self.item_ids = e.item_ids.clone();
                self.entry_weight = e.entry_weight;
                self.exit_weight = e.exit_weight;
                self.price_per_kg = e.price_per_kg;
                self.extra_costs = e.extra_costs;
                self.amount_paid = 0.0;
                self.due_date = Some(e.due_date);
                self.status = SaleStatus::Pendente;
                self.created = true;
            }
            SaleEvent::PaymentApplied(e) => {
                self.amount_paid = e.new_amount_paid;
                if self.amount_paid >= self.total_due() - MONEY_EPSILON {
                    self.status = SaleStatus::Pago;
                }
            }
            SaleEvent::Reversed(_) => {
                self.status = SaleStatus::Estornado;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::Open(cmd) => self.handle_open(cmd),
            SaleCommand::ApplyPayment(cmd) => self.handle_apply_payment(cmd),
            SaleCommand::Reverse(cmd) => self.handle_reverse(cmd),
        }
    }
}

impl Sale {
    fn ensure_sale_id(&self, sale_id: SaleId) -> Result<(), DomainError> {
        if self.id != sale_id {
            return Err(DomainError::invariant("sale_id mismatch"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sale already opened"));
        }
        self.ensure_sale_id(cmd.sale_id)?;
        if cmd.item_ids.is_empty() {
            return Err(DomainError::validation(
                "a sale must allocate at least one stock item",
            ));
        }
        if !(cmd.exit_weight.is_finite() && cmd.exit_weight > 0.0) {
            return Err(DomainError::validation("exit weight must be positive"));
        }
        if !(cmd.entry_weight.is_finite() && cmd.entry_weight > 0.0) {
            return Err(DomainError::validation("entry weight must be positive"));
        }
        if !(cmd.price_per_kg.is_finite() && cmd.price_per_kg > 0.0) {
            return Err(DomainError::validation("price per kg must be positive"));
        }
        if !(cmd.extra_costs.is_finite() && cmd.extra_costs >= 0.0) {
            return Err(DomainError::validation("extra costs must be non-negative"));
        }
        // Breakage is expected (exit below entry); an exit weighing far above
        // entry can only be a mistyped figure.
        if cmd.exit_weight > cmd.entry_weight * MAX_EXIT_OVER_ENTRY {
            return Err(DomainError::validation(format!(
                "exit weight {:.2} implausibly above entry weight {:.2}",
                cmd.exit_weight, cmd.entry_weight
            )));
        }

        Ok(vec![SaleEvent::Opened(SaleOpened {
            sale_id: cmd.sale_id,
            client_id: cmd.client_id,
            item_ids: cmd.item_ids.clone(),
            entry_weight: cmd.entry_weight,
            exit_weight: cmd.exit_weight,
            price_per_kg: cmd.price_per_kg,
            extra_costs: cmd.extra_costs,
            due_date: cmd.due_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_apply_payment(&self, cmd: &ApplyPayment) -> Result<Vec<SaleEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("sale {}", cmd.sale_id)));
        }
        self.ensure_sale_id(cmd.sale_id)?;
        if self.status == SaleStatus::Estornado {
            return Err(DomainError::conflict("cannot pay a reversed sale"));
        }
        if !(cmd.amount_received.is_finite() && cmd.amount_received >= 0.0) {
            return Err(DomainError::validation(
                "received amount must be non-negative",
            ));
        }
        if !(cmd.discount.is_finite() && cmd.discount >= 0.0) {
            return Err(DomainError::validation("discount must be non-negative"));
        }
        let settled = cmd.amount_received + cmd.discount;
        if settled <= 0.0 {
            return Err(DomainError::validation(
                "payment must settle a positive amount",
            ));
        }
        let outstanding = self.outstanding();
        if settled > outstanding + MONEY_EPSILON {
            return Err(DomainError::Overpayment {
                attempted: settled,
                outstanding,
            });
        }

        Ok(vec![SaleEvent::PaymentApplied(PaymentApplied {
            sale_id: cmd.sale_id,
            amount_received: cmd.amount_received,
            discount: cmd.discount,
            method: cmd.method,
            payment_date: cmd.payment_date,
            new_amount_paid: self.amount_paid + settled,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse(&self, cmd: &ReverseSale) -> Result<Vec<SaleEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("sale {}", cmd.sale_id)));
        }
        self.ensure_sale_id(cmd.sale_id)?;
        if self.status == SaleStatus::Estornado {
            // Idempotent no-op: callers may retry a partially applied cascade.
            return Ok(vec![]);
        }

        Ok(vec![SaleEvent::Reversed(SaleReversed {
            sale_id: cmd.sale_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
