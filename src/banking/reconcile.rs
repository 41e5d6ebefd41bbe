use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::income::{BankIncomeRecorder, IncomeEntry};
use crate::{
    db::{
        income::{IncomeKind, SourceKind},
        tx::{EntryCategory, TransactionRecord, TransactionType},
        LedgerStore,
    },
    error::LedgerResult,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Discrepancy {
    pub request_id: Uuid,
    pub account_id: Uuid,
    /// Net charge according to the transaction journal.
    pub expected: Decimal,
    /// Net withdrawal-charge income booked for the request.
    pub recorded: Decimal,
    pub repaired: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub checked: usize,
    pub discrepancies: Vec<Discrepancy>,
    pub repaired: usize,
}

/// Net fee actually kept on a request: charge debits minus charge refunds.
pub fn net_charge(records: &[TransactionRecord]) -> Decimal {
    records
        .iter()
        .filter(|r| r.category == EntryCategory::Charge)
        .map(|r| match r.transaction_type {
            TransactionType::Deposit => -r.amount,
            TransactionType::Withdrawal | TransactionType::Transfer => r.amount,
        })
        .sum()
}

/// Compares withdrawal-charge income against the committed transaction
/// journal. Income is booked after the ledger commits, so a failed write
/// shows up here as a request whose journal and income disagree.
#[derive(Clone)]
pub struct IncomeReconciler {
    store: Arc<dyn LedgerStore>,
    income: BankIncomeRecorder,
}

impl IncomeReconciler {
    pub fn new(store: Arc<dyn LedgerStore>, income: BankIncomeRecorder) -> Self {
        Self { store, income }
    }

    /// With `repair`, appends a correcting record for each difference.
    pub async fn run(&self, repair: bool) -> LedgerResult<ReconciliationReport> {
        let requests = self.store.approved_withdrawals().await?;
        let mut report = ReconciliationReport {
            checked: requests.len(),
            ..ReconciliationReport::default()
        };

        for request in requests {
            let journal = self.store.transactions_for_request(request.id).await?;
            let expected = net_charge(&journal);
            let recorded = self.income.net_for_source(request.id).await?;
            if expected == recorded {
                continue;
            }

            tracing::warn!(
                request_id = %request.id,
                %expected,
                %recorded,
                "withdrawal charge income out of balance"
            );
            let mut discrepancy = Discrepancy {
                request_id: request.id,
                account_id: request.account_id,
                expected,
                recorded,
                repaired: false,
            };
            if repair {
                let customer_id = self
                    .store
                    .find_account(request.account_id)
                    .await?
                    .map(|a| a.customer_id);
                let mut entry = IncomeEntry::new(
                    IncomeKind::WithdrawalCharge,
                    expected - recorded,
                    request.id,
                    SourceKind::Reconciliation,
                );
                entry.account_id = Some(request.account_id);
                entry.customer_id = customer_id;
                self.income.record(entry).await?;
                discrepancy.repaired = true;
                report.repaired += 1;
            }
            report.discrepancies.push(discrepancy);
        }

        tracing::info!(
            checked = report.checked,
            discrepancies = report.discrepancies.len(),
            repaired = report.repaired,
            "income reconciliation finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn charge(kind: TransactionType, amount: Decimal) -> TransactionRecord {
        TransactionRecord::completed(
            Uuid::new_v4(),
            amount,
            kind,
            EntryCategory::Charge,
            "withdrawal charge",
            "CHG-1",
            None,
        )
    }

    #[test]
    fn refunded_charge_nets_to_zero() {
        let journal = [
            charge(TransactionType::Withdrawal, dec!(5)),
            charge(TransactionType::Deposit, dec!(5)),
        ];
        assert_eq!(net_charge(&journal), Decimal::ZERO);
    }

    #[test]
    fn principal_records_are_ignored() {
        let principal = TransactionRecord::completed(
            Uuid::new_v4(),
            dec!(30),
            TransactionType::Withdrawal,
            EntryCategory::Principal,
            "cash",
            "WR-1",
            None,
        );
        assert_eq!(net_charge(&[principal, charge(TransactionType::Withdrawal, dec!(5))]), dec!(5));
    }
}
