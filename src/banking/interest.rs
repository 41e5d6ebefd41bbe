use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use uuid::Uuid;

use super::income::{BankIncomeRecorder, IncomeEntry};
use crate::{
    db::{
        income::{BankIncomeRecord, IncomeKind, SourceKind},
        LedgerStore, StoreError,
    },
    error::{LedgerError, LedgerResult},
};

const DAYS_PER_YEAR: Decimal = Decimal::from_parts(365, 0, 0, false, 0);
const ONE_HUNDRED: Decimal = Decimal::from_parts(100, 0, 0, false, 0);
/// Fractional digits kept on accrued interest.
pub const INTEREST_SCALE: u32 = 4;

/// Simple daily interest on an outstanding balance at an annual percentage rate.
pub fn daily_interest(balance: Decimal, annual_rate: Decimal) -> Decimal {
    (balance.abs() * (annual_rate / ONE_HUNDRED) / DAYS_PER_YEAR)
        .round_dp_with_strategy(INTEREST_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestRun {
    pub records: Vec<BankIncomeRecord>,
    pub total: Decimal,
    /// Loans that already had interest booked for the run date.
    pub skipped: Vec<Uuid>,
}

/// Accrues one day of interest on every active loan as bank income.
///
/// Each `(loan, date)` pair is booked at most once; rerunning a date only
/// fills in loans that are still missing.
#[derive(Clone)]
pub struct DailyInterestJob {
    store: Arc<dyn LedgerStore>,
    income: BankIncomeRecorder,
}

impl DailyInterestJob {
    pub fn new(store: Arc<dyn LedgerStore>, income: BankIncomeRecorder) -> Self {
        Self { store, income }
    }

    pub async fn run(&self, date: NaiveDate) -> LedgerResult<InterestRun> {
        let loans = self.store.active_loans().await?;
        tracing::info!(%date, loans = loans.len(), "starting daily interest accrual");

        let mut run = InterestRun::default();
        for position in loans {
            let loan = &position.loan;
            let interest = daily_interest(position.balance, loan.annual_rate);
            if interest <= Decimal::ZERO {
                continue;
            }

            let entry = IncomeEntry::new(IncomeKind::LoanInterest, interest, loan.id, SourceKind::Loan)
                .for_account(loan.account_id, loan.customer_id)
                .accrued_on(date);
            match self.income.record(entry).await {
                Ok(record) => {
                    run.total += record.amount;
                    run.records.push(record);
                }
                Err(LedgerError::Storage(err)) if err.is_accrual_conflict() => {
                    tracing::warn!(loan_id = %loan.id, %date, "interest already accrued, skipping");
                    run.skipped.push(loan.id);
                }
                Err(err) => {
                    tracing::error!(loan_id = %loan.id, %date, "interest accrual failed: {err}");
                    return Err(err);
                }
            }
        }

        tracing::info!(
            %date,
            created = run.records.len(),
            skipped = run.skipped.len(),
            total = %run.total,
            "daily interest accrual finished"
        );
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        account::{Account, Loan, LoanStatus},
        income::{DateRange, IncomeStats},
        IncomeStore, MemoryStore,
    };
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    /// Rejects every append with a conflict that is not an accrual duplicate.
    struct ClashingIds;

    #[async_trait]
    impl IncomeStore for ClashingIds {
        async fn append_income(&self, record: &BankIncomeRecord) -> Result<(), StoreError> {
            Err(StoreError::conflict("bank income", record.id.to_string()))
        }

        async fn income_stats(&self, _range: &DateRange) -> Result<IncomeStats, StoreError> {
            Ok(IncomeStats::default())
        }

        async fn income_page(
            &self,
            _range: &DateRange,
            _skip: u64,
            _take: u64,
        ) -> Result<(Vec<BankIncomeRecord>, u64), StoreError> {
            Ok((Vec::new(), 0))
        }

        async fn income_for_source(&self, _source_id: Uuid) -> Result<Vec<BankIncomeRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn other_conflicts_fail_the_run() {
        let store = MemoryStore::new();
        let (account_id, customer_id) = (Uuid::new_v4(), Uuid::new_v4());
        store
            .add_account(Account {
                id: account_id,
                account_number: "ACC-7".into(),
                customer_id,
                balance: dec!(1000.00),
            })
            .await;
        store
            .add_loan(Loan {
                id: Uuid::new_v4(),
                account_id,
                customer_id,
                annual_rate: dec!(12),
                status: LoanStatus::Active,
            })
            .await;
        let job = DailyInterestJob::new(Arc::new(store), BankIncomeRecorder::new(Arc::new(ClashingIds)));

        let result = job.run(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()).await;

        assert!(matches!(
            result,
            Err(LedgerError::Storage(StoreError::Conflict { entity: "bank income", .. }))
        ));
    }

    #[test]
    fn twelve_percent_on_a_thousand() {
        assert_eq!(daily_interest(dec!(1000.00), dec!(12)), dec!(0.3288));
    }

    #[test]
    fn negative_balances_accrue_on_magnitude() {
        assert_eq!(daily_interest(dec!(-1000.00), dec!(12)), dec!(0.3288));
    }

    #[test]
    fn zero_rate_accrues_nothing() {
        assert_eq!(daily_interest(dec!(5000), dec!(0)), Decimal::ZERO);
    }
}
