use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{
    account::{Account, Customer, LoanPosition, User},
    error::StoreError,
    income::{BankIncomeRecord, DateRange, IncomeStats},
    request::{RequestFilter, RequestPage, RequestSummary, ReversalMark, Settlement, WithdrawalRequest},
    tx::TransactionRecord,
};

/// Accounts, requests and the transaction journal.
///
/// Reads on this trait run outside any transaction. Anything that mutates a
/// balance goes through [`LedgerTx`] obtained from [`LedgerStore::begin`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError>;

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn insert_request(&self, request: &WithdrawalRequest) -> Result<(), StoreError>;

    async fn find_request(&self, id: Uuid) -> Result<Option<RequestSummary>, StoreError>;

    async fn list_requests(&self, filter: &RequestFilter) -> Result<RequestPage, StoreError>;

    /// Approved withdrawal requests, oldest first.
    async fn approved_withdrawals(&self) -> Result<Vec<WithdrawalRequest>, StoreError>;

    async fn transactions_for_request(&self, request_id: Uuid) -> Result<Vec<TransactionRecord>, StoreError>;

    async fn active_loans(&self) -> Result<Vec<LoanPosition>, StoreError>;
}

/// One storage transaction. Dropping it without [`LedgerTx::commit`] discards
/// every write made through it.
#[async_trait]
pub trait LedgerTx: Send {
    /// Loads a request and holds it locked until the transaction ends.
    async fn lock_request(&mut self, id: Uuid) -> Result<Option<WithdrawalRequest>, StoreError>;

    /// Loads an account and holds it locked until the transaction ends.
    async fn lock_account(&mut self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Adds `delta` to the balance and returns the new balance.
    async fn adjust_balance(&mut self, account_id: Uuid, delta: Decimal) -> Result<Decimal, StoreError>;

    async fn insert_transaction(&mut self, record: &TransactionRecord) -> Result<(), StoreError>;

    /// Moves a pending request to its settled status. Returns `false` when the
    /// request was no longer pending.
    async fn settle_request(&mut self, id: Uuid, settlement: &Settlement) -> Result<bool, StoreError>;

    /// Flags an approved request as reversed. Returns `false` when it was
    /// already reversed or is not approved.
    async fn mark_reversed(&mut self, id: Uuid, mark: &ReversalMark) -> Result<bool, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Append-only bank income journal.
#[async_trait]
pub trait IncomeStore: Send + Sync {
    /// Appends one record. Loan interest is unique per `(source_id, accrual_date)`;
    /// a duplicate yields [`StoreError::Conflict`].
    async fn append_income(&self, record: &BankIncomeRecord) -> Result<(), StoreError>;

    async fn income_stats(&self, range: &DateRange) -> Result<IncomeStats, StoreError>;

    /// Records in `range`, newest first, plus the total count in `range`.
    async fn income_page(
        &self,
        range: &DateRange,
        skip: u64,
        take: u64,
    ) -> Result<(Vec<BankIncomeRecord>, u64), StoreError>;

    async fn income_for_source(&self, source_id: Uuid) -> Result<Vec<BankIncomeRecord>, StoreError>;
}
