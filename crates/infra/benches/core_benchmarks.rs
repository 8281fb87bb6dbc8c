//! Hot-path benchmarks: stream append and the balance fold.

use chrono::{NaiveDate, Utc};
use criterion::{criterion_group, criterion_main, Criterion};

use frigoerp_core::{Aggregate, ExpectedVersion, TransactionId};
use frigoerp_infra::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use frigoerp_ledger::{
    AppendTransaction, BalanceFilter, CashLedger, Direction, LedgerCommand, Transaction,
    TransactionCategory, CASH_LEDGER_STREAM,
};

fn sample_tx(n: u64) -> Transaction {
    Transaction {
        id: TransactionId::new(),
        date: NaiveDate::from_ymd_opt(2026, 3, 15).unwrap(),
        description: format!("movimento {n}"),
        direction: if n % 2 == 0 {
            Direction::In
        } else {
            Direction::Out
        },
        category: TransactionCategory::Operational,
        amount: 100.0 + n as f64,
        related: None,
        reversal_of: None,
    }
}

fn ledger_with_entries(n: u64) -> CashLedger {
    let mut ledger = CashLedger::new();
    for i in 0..n {
        let events = ledger
            .handle(&LedgerCommand::Append(AppendTransaction {
                tx: sample_tx(i),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            ledger.apply(e);
        }
    }
    ledger
}

fn bench_store_append(c: &mut Criterion) {
    c.bench_function("event_store_append_100", |b| {
        b.iter(|| {
            let store = InMemoryEventStore::new();
            let ledger = CashLedger::new();
            for i in 0..100u64 {
                let events = ledger
                    .handle(&LedgerCommand::Append(AppendTransaction {
                        tx: sample_tx(i),
                        occurred_at: Utc::now(),
                    }))
                    .unwrap();
                let uncommitted: Vec<UncommittedEvent> = events
                    .iter()
                    .map(|e| {
                        UncommittedEvent::from_typed(
                            CASH_LEDGER_STREAM,
                            "ledger.cash",
                            uuid::Uuid::now_v7(),
                            e,
                        )
                        .unwrap()
                    })
                    .collect();
                store
                    .append(uncommitted, ExpectedVersion::Any)
                    .unwrap();
            }
        })
    });
}

fn bench_balance_fold(c: &mut Criterion) {
    let ledger = ledger_with_entries(1_000);
    c.bench_function("balance_fold_1000", |b| {
        b.iter(|| ledger.balance(&BalanceFilter::default()))
    });
}

criterion_group!(benches, bench_store_append, bench_balance_fold);
criterion_main!(benches);
