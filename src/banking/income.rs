use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    db::{
        income::{BankIncomeRecord, DateRange, IncomeKind, IncomeStats, SourceKind},
        request::MAX_PAGE_SIZE,
        IncomeStore,
    },
    error::{LedgerError, LedgerResult},
};

/// One income event to append.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomeEntry {
    pub kind: IncomeKind,
    pub amount: Decimal,
    pub source_id: Uuid,
    pub source_kind: SourceKind,
    pub account_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub accrual_date: Option<NaiveDate>,
}

impl IncomeEntry {
    pub fn new(kind: IncomeKind, amount: Decimal, source_id: Uuid, source_kind: SourceKind) -> Self {
        Self {
            kind,
            amount,
            source_id,
            source_kind,
            account_id: None,
            customer_id: None,
            accrual_date: None,
        }
    }

    pub fn for_account(mut self, account_id: Uuid, customer_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self.customer_id = Some(customer_id);
        self
    }

    pub fn accrued_on(mut self, date: NaiveDate) -> Self {
        self.accrual_date = Some(date);
        self
    }
}

/// Append-only journal of fees and interest the bank earns.
///
/// Corrections are new records with the opposite sign and the same
/// `source_id`; nothing is ever updated in place.
#[derive(Clone)]
pub struct BankIncomeRecorder {
    store: Arc<dyn IncomeStore>,
}

impl BankIncomeRecorder {
    pub fn new(store: Arc<dyn IncomeStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, entry: IncomeEntry) -> LedgerResult<BankIncomeRecord> {
        if entry.amount.is_zero() {
            return Err(LedgerError::validation("income amount must be non-zero"));
        }

        let record = BankIncomeRecord {
            id: Uuid::new_v4(),
            kind: entry.kind,
            amount: entry.amount,
            source_id: entry.source_id,
            source_kind: entry.source_kind,
            account_id: entry.account_id,
            customer_id: entry.customer_id,
            accrual_date: entry.accrual_date,
            created_at: Utc::now(),
        };
        self.store.append_income(&record).await?;

        tracing::info!(
            kind = record.kind.as_str(),
            amount = %record.amount,
            source_id = %record.source_id,
            "bank income recorded"
        );
        Ok(record)
    }

    /// Records income after a committed ledger mutation. Failures are logged
    /// and swallowed; the reconciler picks up whatever is missing.
    pub async fn record_best_effort(&self, entry: IncomeEntry) -> Option<BankIncomeRecord> {
        let source_id = entry.source_id;
        let amount = entry.amount;
        match self.record(entry).await {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::error!(
                    %source_id,
                    %amount,
                    "failed to record bank income, ledger change kept: {err}"
                );
                None
            }
        }
    }

    pub async fn stats(&self, range: &DateRange) -> LedgerResult<IncomeStats> {
        Ok(self.store.income_stats(range).await?)
    }

    /// Newest-first page of records in `range` and the total count in `range`.
    pub async fn recent_page(
        &self,
        range: &DateRange,
        skip: u64,
        take: u64,
    ) -> LedgerResult<(Vec<BankIncomeRecord>, u64)> {
        if take == 0 || take > u64::from(MAX_PAGE_SIZE) {
            return Err(LedgerError::validation(format!(
                "take must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(self.store.income_page(range, skip, take).await?)
    }

    /// Net income recorded against one source.
    pub async fn net_for_source(&self, source_id: Uuid) -> LedgerResult<Decimal> {
        let records = self.store.income_for_source(source_id).await?;
        Ok(records.iter().map(|r| r.amount).sum())
    }
}
