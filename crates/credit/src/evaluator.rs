use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use frigoerp_core::{SaleId, MONEY_EPSILON};

/// Receivables overdue longer than this hard-block the client.
pub const HARD_BLOCK_OVERDUE_DAYS: i64 = 10;

/// Lifetime paid volume qualifying for the AAA override.
pub const HIGH_VOLUME_THRESHOLD: f64 = 50_000.0;

/// Credit-limit usage caps for the ladder.
const USAGE_WARNING: f64 = 0.80;
const USAGE_LOW: f64 = 0.50;

/// Credit tier, best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditTier {
    #[serde(rename = "AAA")]
    Aaa,
    A,
    B,
    C,
    F,
}

impl CreditTier {
    pub fn star_rating(&self) -> u8 {
        match self {
            CreditTier::Aaa => 5,
            CreditTier::A => 4,
            CreditTier::B => 3,
            CreditTier::C => 2,
            CreditTier::F => 1,
        }
    }
}

impl core::fmt::Display for CreditTier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            CreditTier::Aaa => "AAA",
            CreditTier::A => "A",
            CreditTier::B => "B",
            CreditTier::C => "C",
            CreditTier::F => "F",
        };
        f.write_str(label)
    }
}

/// One active (non-reversed) receivable of the client, derived from a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivableSnapshot {
    pub sale_id: SaleId,
    pub total_due: f64,
    pub amount_paid: f64,
    pub due_date: NaiveDate,
}

impl ReceivableSnapshot {
    pub fn outstanding(&self) -> f64 {
        (self.total_due - self.amount_paid).max(0.0)
    }

    pub fn is_open(&self) -> bool {
        self.outstanding() > MONEY_EPSILON
    }

    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        if self.is_open() {
            (today - self.due_date).num_days().max(0)
        } else {
            0
        }
    }
}

/// The evaluator's verdict. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditAssessment {
    pub tier: CreditTier,
    pub star_rating: u8,
    pub reason: String,
}

impl CreditAssessment {
    fn new(tier: CreditTier, reason: impl Into<String>) -> Self {
        Self {
            tier,
            star_rating: tier.star_rating(),
            reason: reason.into(),
        }
    }
}

/// Derive the client's tier from their receivable history.
///
/// Rule ladder, worst condition first:
/// 1. any receivable overdue more than 10 days → F (hard block);
/// 2. outstanding balance above the credit limit → C;
/// 3. any overdue receivable → at most C;
/// 4. limit usage above 80% → at most A;
/// 5. high lifetime volume, nothing overdue, usage at most 50% → AAA;
/// 6. otherwise A with history, B without.
pub fn evaluate(
    credit_limit: f64,
    receivables: &[ReceivableSnapshot],
    today: NaiveDate,
) -> CreditAssessment {
    let outstanding: f64 = receivables.iter().map(ReceivableSnapshot::outstanding).sum();
    let lifetime_paid: f64 = receivables.iter().map(|r| r.amount_paid).sum();
    let max_days_overdue = receivables
        .iter()
        .map(|r| r.days_overdue(today))
        .max()
        .unwrap_or(0);
    let usage = if credit_limit > 0.0 {
        outstanding / credit_limit
    } else if outstanding > MONEY_EPSILON {
        f64::INFINITY
    } else {
        0.0
    };

    if max_days_overdue > HARD_BLOCK_OVERDUE_DAYS {
        return CreditAssessment::new(
            CreditTier::F,
            format!("titulo vencido ha {max_days_overdue} dias: cliente bloqueado"),
        );
    }
    if outstanding > credit_limit + MONEY_EPSILON {
        return CreditAssessment::new(
            CreditTier::C,
            format!(
                "saldo devedor {outstanding:.2} acima do limite de credito {credit_limit:.2}"
            ),
        );
    }
    if max_days_overdue > 0 {
        return CreditAssessment::new(
            CreditTier::C,
            format!("titulo vencido ha {max_days_overdue} dias"),
        );
    }
    if usage > USAGE_WARNING {
        return CreditAssessment::new(
            CreditTier::A,
            format!("uso do limite em {:.0}%", usage * 100.0),
        );
    }
    if lifetime_paid >= HIGH_VOLUME_THRESHOLD && usage <= USAGE_LOW {
        return CreditAssessment::new(
            CreditTier::Aaa,
            format!("volume historico de {lifetime_paid:.2} sem atrasos"),
        );
    }
    if receivables.is_empty() {
        return CreditAssessment::new(CreditTier::B, "sem historico de compras");
    }
    CreditAssessment::new(CreditTier::A, "historico em dia")
}
