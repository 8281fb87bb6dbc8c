use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use frigoerp_core::{
    Aggregate, AggregateRoot, BatchId, DomainError, PayableId, SaleId, TransactionId,
};
use frigoerp_events::Event;

/// The cash ledger is a singleton; every entry lives on this stream.
pub const CASH_LEDGER_STREAM: &str = "ledger-cash";

/// Direction of a cash movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn inverse(&self) -> Direction {
        match self {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
        }
    }

    /// Contribution of an amount to the cash balance.
    pub fn signed(&self, amount: f64) -> f64 {
        match self {
            Direction::In => amount,
            Direction::Out => -amount,
        }
    }
}

/// What a cash movement was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionCategory {
    Sale,
    Purchase,
    Discount,
    Reversal,
    Operational,
}

/// The entity a ledger entry settles or compensates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityRef {
    Sale(SaleId),
    Payable(PayableId),
    Batch(BatchId),
}

/// One immutable entry in the cash ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub date: NaiveDate,
    pub description: String,
    pub direction: Direction,
    pub category: TransactionCategory,
    pub amount: f64,
    pub related: Option<EntityRef>,
    /// Set only on compensating entries, pointing at the entry they undo.
    pub reversal_of: Option<TransactionId>,
}

/// Filters for the balance fold.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BalanceFilter {
    /// Include entries dated on or before this day.
    pub as_of: Option<NaiveDate>,
    pub category: Option<TransactionCategory>,
    pub direction: Option<Direction>,
    pub related_to: Option<EntityRef>,
}

/// Aggregate root: the cash ledger.
///
/// State is the full entry list plus the set of reversed entry ids; both
/// derive from the stream. There is no update or delete anywhere - a
/// reversal appends an inverse entry and the original stays for audit.
#[derive(Debug, Clone, PartialEq)]
pub struct CashLedger {
    id: String,
    entries: Vec<Transaction>,
    by_id: BTreeMap<TransactionId, usize>,
    reversed: BTreeSet<TransactionId>,
    version: u64,
}

impl Default for CashLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl CashLedger {
    pub fn new() -> Self {
        Self {
            id: CASH_LEDGER_STREAM.to_string(),
            entries: Vec::new(),
            by_id: BTreeMap::new(),
            reversed: BTreeSet::new(),
            version: 0,
        }
    }

    pub fn entries(&self) -> &[Transaction] {
        &self.entries
    }

    pub fn entry(&self, id: TransactionId) -> Option<&Transaction> {
        self.by_id.get(&id).map(|idx| &self.entries[*idx])
    }

    pub fn is_reversed(&self, id: TransactionId) -> bool {
        self.reversed.contains(&id)
    }

    /// Active (non-reversed, non-compensating) entries referencing an entity.
    ///
    /// This is how cascades discover the payments of a sale or payable: the
    /// ledger's references are the single source of truth, nothing is
    /// duplicated on the entities.
    pub fn active_entries_for<'a>(
        &'a self,
        related: &'a EntityRef,
    ) -> impl Iterator<Item = &'a Transaction> {
        self.entries.iter().filter(move |tx| {
            tx.related.as_ref() == Some(related)
                && tx.reversal_of.is_none()
                && !self.reversed.contains(&tx.id)
        })
    }

    /// Pure fold: Σ(IN) - Σ(OUT) over entries that are neither reversed
    /// originals nor the compensating entries that undid them. Excluding the
    /// pair (rather than netting it) keeps category- and entity-filtered
    /// balances honest.
    pub fn balance(&self, filter: &BalanceFilter) -> f64 {
        self.entries
            .iter()
            .filter(|tx| tx.reversal_of.is_none() && !self.reversed.contains(&tx.id))
            .filter(|tx| filter.as_of.is_none_or(|d| tx.date <= d))
            .filter(|tx| filter.category.is_none_or(|c| tx.category == c))
            .filter(|tx| filter.direction.is_none_or(|d| tx.direction == d))
            .filter(|tx| {
                filter
                    .related_to
                    .as_ref()
                    .is_none_or(|r| tx.related.as_ref() == Some(r))
            })
            .map(|tx| tx.direction.signed(tx.amount))
            .sum()
    }
}

impl AggregateRoot for CashLedger {
    type Id = String;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AppendTransaction - the only write primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendTransaction {
    pub tx: Transaction,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReverseTransaction - append the compensating entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseTransaction {
    pub transaction_id: TransactionId,
    /// Id assigned to the compensating entry.
    pub reversal_id: TransactionId,
    pub date: NaiveDate,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerCommand {
    Append(AppendTransaction),
    Reverse(ReverseTransaction),
}

/// Event: TransactionAppended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionAppended {
    pub tx: Transaction,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransactionReversed - carries the full compensating entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionReversed {
    pub original_id: TransactionId,
    pub reversal: Transaction,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Appended(TransactionAppended),
    Reversed(TransactionReversed),
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::Appended(_) => "ledger.cash.transaction_appended",
            LedgerEvent::Reversed(_) => "ledger.cash.transaction_reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::Appended(e) => e.occurred_at,
            LedgerEvent::Reversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for CashLedger {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::Appended(e) => {
                self.by_id.insert(e.tx.id, self.entries.len());
                self.entries.push(e.tx.clone());
            }
            LedgerEvent::Reversed(e) => {
                self.reversed.insert(e.original_id);
                self.by_id.insert(e.reversal.id, self.entries.len());
                self.entries.push(e.reversal.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::Append(cmd) => self.handle_append(cmd),
            LedgerCommand::Reverse(cmd) => self.handle_reverse(cmd),
        }
    }
}

impl CashLedger {
    fn handle_append(&self, cmd: &AppendTransaction) -> Result<Vec<LedgerEvent>, DomainError> {
        let tx = &cmd.tx;
        if !(tx.amount.is_finite() && tx.amount > 0.0) {
            return Err(DomainError::validation(
                "transaction amount must be positive",
            ));
        }
        if tx.description.trim().is_empty() {
            return Err(DomainError::validation(
                "transaction description cannot be empty",
            ));
        }
        // Compensating entries only enter through Reverse; a hand-built one
        // would corrupt the reversed-pair exclusion in the balance fold.
        if tx.category == TransactionCategory::Reversal || tx.reversal_of.is_some() {
            return Err(DomainError::invariant(
                "reversal entries are appended via ReverseTransaction",
            ));
        }
        if self.by_id.contains_key(&tx.id) {
            return Err(DomainError::conflict(format!(
                "transaction {} already appended",
                tx.id
            )));
        }

        Ok(vec![LedgerEvent::Appended(TransactionAppended {
            tx: tx.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reverse(&self, cmd: &ReverseTransaction) -> Result<Vec<LedgerEvent>, DomainError> {
        let original = self.entry(cmd.transaction_id).ok_or_else(|| {
            DomainError::not_found(format!("transaction {}", cmd.transaction_id))
        })?;
        if self.reversed.contains(&cmd.transaction_id) {
            return Err(DomainError::AlreadyReversed(cmd.transaction_id.to_string()));
        }
        if original.reversal_of.is_some() {
            return Err(DomainError::invariant(
                "a compensating entry cannot itself be reversed",
            ));
        }

        let reversal = Transaction {
            id: cmd.reversal_id,
            date: cmd.date,
            description: format!("Estorno: {}", original.description),
            direction: original.direction.inverse(),
            category: TransactionCategory::Reversal,
            amount: original.amount,
            related: original.related.clone(),
            reversal_of: Some(original.id),
        };

        Ok(vec![LedgerEvent::Reversed(TransactionReversed {
            original_id: cmd.transaction_id,
            reversal,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 20).unwrap()
    }

    fn tx(direction: Direction, category: TransactionCategory, amount: f64) -> Transaction {
        Transaction {
            id: TransactionId::new(),
            date: test_date(),
            description: "movimento".to_string(),
            direction,
            category,
            amount,
            related: None,
            reversal_of: None,
        }
    }

    fn append(ledger: &mut CashLedger, transaction: Transaction) -> TransactionId {
        let id = transaction.id;
        let events = ledger
            .handle(&LedgerCommand::Append(AppendTransaction {
                tx: transaction,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            ledger.apply(e);
        }
        id
    }

    #[test]
    fn balance_is_in_minus_out() {
        let mut ledger = CashLedger::new();
        append(&mut ledger, tx(Direction::In, TransactionCategory::Sale, 5000.0));
        append(
            &mut ledger,
            tx(Direction::Out, TransactionCategory::Purchase, 1800.0),
        );
        append(
            &mut ledger,
            tx(Direction::Out, TransactionCategory::Operational, 200.0),
        );
        let balance = ledger.balance(&BalanceFilter::default());
        assert!((balance - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn reversal_appends_an_inverse_entry_and_keeps_the_original() {
        let mut ledger = CashLedger::new();
        let original = append(&mut ledger, tx(Direction::In, TransactionCategory::Sale, 3000.0));

        let events = ledger
            .handle(&LedgerCommand::Reverse(ReverseTransaction {
                transaction_id: original,
                reversal_id: TransactionId::new(),
                date: test_date(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            ledger.apply(e);
        }

        assert_eq!(ledger.entries().len(), 2);
        assert!(ledger.is_reversed(original));
        let reversal = &ledger.entries()[1];
        assert_eq!(reversal.direction, Direction::Out);
        assert_eq!(reversal.category, TransactionCategory::Reversal);
        assert_eq!(reversal.reversal_of, Some(original));
        assert!(reversal.description.starts_with("Estorno:"));
        // The pair nets out of the balance.
        assert!(ledger.balance(&BalanceFilter::default()).abs() < 1e-9);
    }

    #[test]
    fn reversing_twice_is_rejected() {
        let mut ledger = CashLedger::new();
        let original = append(&mut ledger, tx(Direction::In, TransactionCategory::Sale, 100.0));
        let events = ledger
            .handle(&LedgerCommand::Reverse(ReverseTransaction {
                transaction_id: original,
                reversal_id: TransactionId::new(),
                date: test_date(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            ledger.apply(e);
        }

        let err = ledger
            .handle(&LedgerCommand::Reverse(ReverseTransaction {
                transaction_id: original,
                reversal_id: TransactionId::new(),
                date: test_date(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyReversed(_)));
    }

    #[test]
    fn reversing_an_unknown_transaction_is_not_found() {
        let ledger = CashLedger::new();
        let err = ledger
            .handle(&LedgerCommand::Reverse(ReverseTransaction {
                transaction_id: TransactionId::new(),
                reversal_id: TransactionId::new(),
                date: test_date(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn hand_built_reversal_entries_are_rejected() {
        let ledger = CashLedger::new();
        let forged = tx(Direction::Out, TransactionCategory::Reversal, 10.0);
        let err = ledger
            .handle(&LedgerCommand::Append(AppendTransaction {
                tx: forged,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn filtered_balance_excludes_reversed_pairs() {
        let mut ledger = CashLedger::new();
        let sale_ref = EntityRef::Sale(frigoerp_core::SaleId::new());
        let mut t = tx(Direction::In, TransactionCategory::Sale, 3000.0);
        t.related = Some(sale_ref.clone());
        let original = append(&mut ledger, t);
        append(&mut ledger, tx(Direction::In, TransactionCategory::Sale, 450.0));

        let sale_balance = ledger.balance(&BalanceFilter {
            category: Some(TransactionCategory::Sale),
            ..Default::default()
        });
        assert!((sale_balance - 3450.0).abs() < 1e-9);

        let events = ledger
            .handle(&LedgerCommand::Reverse(ReverseTransaction {
                transaction_id: original,
                reversal_id: TransactionId::new(),
                date: test_date(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            ledger.apply(e);
        }

        // The reversed sale entry no longer counts toward SALE revenue.
        let sale_balance = ledger.balance(&BalanceFilter {
            category: Some(TransactionCategory::Sale),
            ..Default::default()
        });
        assert!((sale_balance - 450.0).abs() < 1e-9);
        assert!(ledger
            .active_entries_for(&sale_ref)
            .next()
            .is_none());
    }

    proptest! {
        /// Reversing every entry drives the balance back to zero, whatever
        /// the mix of directions and amounts.
        #[test]
        fn full_reversal_restores_zero_balance(
            amounts in prop::collection::vec((prop::bool::ANY, 1.0f64..10_000.0), 1..20)
        ) {
            let mut ledger = CashLedger::new();
            let mut ids = Vec::new();
            for (incoming, amount) in amounts {
                let direction = if incoming { Direction::In } else { Direction::Out };
                ids.push(append(&mut ledger, tx(direction, TransactionCategory::Operational, amount)));
            }
            for id in ids {
                let events = ledger
                    .handle(&LedgerCommand::Reverse(ReverseTransaction {
                        transaction_id: id,
                        reversal_id: TransactionId::new(),
                        date: test_date(),
                        occurred_at: test_time(),
                    }))
                    .unwrap();
                for e in &events {
                    ledger.apply(e);
                }
            }
            prop_assert!(ledger.balance(&BalanceFilter::default()).abs() < 1e-6);
        }
    }
}
