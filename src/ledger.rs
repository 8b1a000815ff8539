//! Balance reconciliation core: every transaction mutation is expressed as a
//! pair of balance changes, so create/update/delete all reduce to applying
//! or reversing the same deltas inside the request's database transaction.

use chrono::{DateTime, Utc};

use crate::domain::Transaction;

/// A single signed adjustment to one category's running balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceChange {
    pub category: i64,
    pub delta: f64,
}

/// The money-moving fields of a transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transfer {
    pub amount: f64,
    pub source: i64,
    pub destination: i64,
}

impl Transfer {
    pub fn of(transaction: &Transaction) -> Transfer {
        Transfer {
            amount: transaction.amount,
            source: transaction.source,
            destination: transaction.destination,
        }
    }
}

/// Partial-update fields for a transaction; `None` keeps the stored value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransferPatch {
    pub amount: Option<f64>,
    pub source: Option<i64>,
    pub destination: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Balance changes for recording a transfer: the source pays, the
/// destination receives.
pub fn apply(transfer: Transfer) -> [BalanceChange; 2] {
    [
        BalanceChange {
            category: transfer.source,
            delta: -transfer.amount,
        },
        BalanceChange {
            category: transfer.destination,
            delta: transfer.amount,
        },
    ]
}

/// Exact inverse of [`apply`].
pub fn reverse(transfer: Transfer) -> [BalanceChange; 2] {
    apply(Transfer {
        amount: -transfer.amount,
        ..transfer
    })
}

/// Merge a patch over a stored transaction. The caller reverses the stored
/// transfer and applies the merged one, so unset fields are never
/// double-applied.
pub fn merge(stored: &Transaction, patch: TransferPatch) -> (Transfer, DateTime<Utc>) {
    let transfer = Transfer {
        amount: patch.amount.unwrap_or(stored.amount),
        source: patch.source.unwrap_or(stored.source),
        destination: patch.destination.unwrap_or(stored.destination),
    };
    (transfer, patch.timestamp.unwrap_or(stored.timestamp))
}

/// Direction-agnostic sum of the amounts touching `category`. Income and
/// expense categories are one-directional endpoints, so no sign flip is
/// wanted here.
pub fn turnover(transactions: &[Transaction], category: i64) -> f64 {
    transactions
        .iter()
        .filter(|transaction| {
            transaction.source == category || transaction.destination == category
        })
        .map(|transaction| transaction.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::TimeZone;

    use super::*;

    fn transaction(id: i64, amount: f64, source: i64, destination: i64, day: u32) -> Transaction {
        Transaction {
            id,
            amount,
            source,
            destination,
            timestamp: Utc.with_ymd_and_hms(2025, 8, day, 12, 0, 0).unwrap(),
            user_id: 1,
        }
    }

    fn run(balances: &mut HashMap<i64, f64>, changes: [BalanceChange; 2]) {
        for change in changes {
            *balances.entry(change.category).or_insert(0.0) += change.delta;
        }
    }

    #[test]
    fn apply_moves_amount_from_source_to_destination() {
        let mut balances = HashMap::from([(1, 0.0), (2, 50.0)]);
        let transfer = Transfer {
            amount: 100.0,
            source: 1,
            destination: 2,
        };

        run(&mut balances, apply(transfer));

        assert_eq!(balances[&1], -100.0);
        assert_eq!(balances[&2], 150.0);
    }

    #[test]
    fn apply_then_reverse_nets_to_zero() {
        let mut balances = HashMap::from([(1, 0.0), (2, 50.0)]);
        let transfer = Transfer {
            amount: 100.0,
            source: 1,
            destination: 2,
        };

        run(&mut balances, apply(transfer));
        run(&mut balances, reverse(transfer));

        assert_eq!(balances[&1], 0.0);
        assert_eq!(balances[&2], 50.0);
    }

    #[test]
    fn merge_keeps_unset_fields() {
        let stored = transaction(7, 40.0, 1, 2, 3);
        let (transfer, timestamp) = merge(
            &stored,
            TransferPatch {
                amount: Some(60.0),
                ..TransferPatch::default()
            },
        );

        assert_eq!(transfer.amount, 60.0);
        assert_eq!(transfer.source, 1);
        assert_eq!(transfer.destination, 2);
        assert_eq!(timestamp, stored.timestamp);
    }

    #[test]
    fn update_via_reverse_and_merged_apply_does_not_double_count() {
        let mut balances = HashMap::from([(1, 0.0), (2, 0.0), (3, 0.0)]);
        let stored = transaction(7, 40.0, 1, 2, 3);
        run(&mut balances, apply(Transfer::of(&stored)));

        // Retarget the destination; amount and source stay as stored.
        let (merged, _) = merge(
            &stored,
            TransferPatch {
                destination: Some(3),
                ..TransferPatch::default()
            },
        );
        run(&mut balances, reverse(Transfer::of(&stored)));
        run(&mut balances, apply(merged));

        assert_eq!(balances[&1], -40.0);
        assert_eq!(balances[&2], 0.0);
        assert_eq!(balances[&3], 40.0);
    }

    #[test]
    fn turnover_counts_both_directions_without_sign_flip() {
        let transactions = vec![
            transaction(1, 100.0, 1, 2, 1),
            transaction(2, 30.0, 2, 3, 2),
            transaction(3, 5.0, 4, 5, 3),
        ];

        assert_eq!(turnover(&transactions, 2), 130.0);
        assert_eq!(turnover(&transactions, 1), 100.0);
        assert_eq!(turnover(&transactions, 9), 0.0);
    }

    #[test]
    fn turnover_over_adjacent_periods_adds_up() {
        use crate::period::month_period;
        use chrono::NaiveDate;

        let transactions = vec![
            transaction(1, 10.0, 1, 2, 5),
            transaction(2, 20.0, 1, 2, 30),
            Transaction {
                timestamp: Utc.with_ymd_and_hms(2025, 9, 2, 8, 0, 0).unwrap(),
                ..transaction(3, 40.0, 1, 2, 1)
            },
        ];

        let today = NaiveDate::from_ymd_opt(2025, 8, 15).unwrap();
        let in_period = |offset: i32| {
            let (from, until) = month_period(today, offset).unwrap().utc_range();
            transactions
                .iter()
                .filter(|t| t.timestamp >= from && t.timestamp < until)
                .cloned()
                .collect::<Vec<_>>()
        };

        let august = turnover(&in_period(0), 2);
        let september = turnover(&in_period(1), 2);
        assert_eq!(august, 30.0);
        assert_eq!(september, 40.0);
        assert_eq!(august + september, turnover(&transactions, 2));
    }
}
