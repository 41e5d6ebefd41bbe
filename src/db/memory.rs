use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    account::{Account, Customer, Loan, LoanPosition, LoanStatus, User},
    error::{StoreError, LOAN_ACCRUAL},
    income::{BankIncomeRecord, DateRange, IncomeKind, IncomeStats},
    request::{
        RequestFilter, RequestKind, RequestPage, RequestStatus, RequestSummary, ReversalMark,
        Settlement, StatusCounts, WithdrawalRequest,
    },
    store::{IncomeStore, LedgerStore, LedgerTx},
    tx::TransactionRecord,
};

#[derive(Debug, Default, Clone)]
struct LedgerState {
    accounts: HashMap<Uuid, Account>,
    customers: HashMap<Uuid, Customer>,
    users: HashMap<Uuid, User>,
    loans: Vec<Loan>,
    requests: Vec<WithdrawalRequest>,
    transactions: Vec<TransactionRecord>,
}

impl LedgerState {
    fn summarize(&self, request: &WithdrawalRequest) -> RequestSummary {
        let account = self.accounts.get(&request.account_id);
        RequestSummary {
            request: request.clone(),
            account_number: account.map(|a| a.account_number.clone()).unwrap_or_default(),
            customer_name: account
                .and_then(|a| self.customers.get(&a.customer_id))
                .map(|c| c.full_name.clone()),
        }
    }
}

/// Process-local store backing both traits.
///
/// A ledger transaction holds the whole ledger lock for its lifetime and works
/// on a private copy that replaces the shared state on commit, so transactions
/// are serialized and a dropped transaction leaves no trace.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    ledger: Arc<Mutex<LedgerState>>,
    income: Arc<Mutex<Vec<BankIncomeRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_customer(&self, customer: Customer) {
        self.ledger.lock().await.customers.insert(customer.id, customer);
    }

    pub async fn add_account(&self, account: Account) {
        self.ledger.lock().await.accounts.insert(account.id, account);
    }

    pub async fn add_user(&self, user: User) {
        self.ledger.lock().await.users.insert(user.id, user);
    }

    pub async fn add_loan(&self, loan: Loan) {
        self.ledger.lock().await.loans.push(loan);
    }

    pub async fn balance(&self, account_id: Uuid) -> Option<Decimal> {
        self.ledger.lock().await.accounts.get(&account_id).map(|a| a.balance)
    }

    pub async fn transactions(&self) -> Vec<TransactionRecord> {
        self.ledger.lock().await.transactions.clone()
    }

    pub async fn income_records(&self) -> Vec<BankIncomeRecord> {
        self.income.lock().await.clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>, StoreError> {
        let guard = self.ledger.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn find_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.ledger.lock().await.accounts.get(&id).cloned())
    }

    async fn find_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        Ok(self.ledger.lock().await.customers.get(&id).cloned())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.ledger.lock().await.users.get(&id).cloned())
    }

    async fn insert_request(&self, request: &WithdrawalRequest) -> Result<(), StoreError> {
        let mut state = self.ledger.lock().await;
        if state.requests.iter().any(|r| r.id == request.id) {
            return Err(StoreError::conflict("withdrawal request", request.id.to_string()));
        }
        state.requests.push(request.clone());
        Ok(())
    }

    async fn find_request(&self, id: Uuid) -> Result<Option<RequestSummary>, StoreError> {
        let state = self.ledger.lock().await;
        Ok(state
            .requests
            .iter()
            .find(|r| r.id == id)
            .map(|r| state.summarize(r)))
    }

    async fn list_requests(&self, filter: &RequestFilter) -> Result<RequestPage, StoreError> {
        let state = self.ledger.lock().await;

        let mut counts = StatusCounts::default();
        for request in &state.requests {
            counts.add(request.status);
        }

        let matching: Vec<RequestSummary> = state
            .requests
            .iter()
            .rev()
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .filter(|r| filter.kind.map_or(true, |k| r.kind == k))
            .map(|r| state.summarize(r))
            .filter(|s| filter.search.as_deref().map_or(true, |needle| s.matches(needle)))
            .collect();

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .collect();

        Ok(RequestPage { items, total, counts })
    }

    async fn approved_withdrawals(&self) -> Result<Vec<WithdrawalRequest>, StoreError> {
        Ok(self
            .ledger
            .lock()
            .await
            .requests
            .iter()
            .filter(|r| r.status == RequestStatus::Approved && r.kind == RequestKind::Withdrawal)
            .cloned()
            .collect())
    }

    async fn transactions_for_request(&self, request_id: Uuid) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self
            .ledger
            .lock()
            .await
            .transactions
            .iter()
            .filter(|t| t.request_id == Some(request_id))
            .cloned()
            .collect())
    }

    async fn active_loans(&self) -> Result<Vec<LoanPosition>, StoreError> {
        let state = self.ledger.lock().await;
        Ok(state
            .loans
            .iter()
            .filter(|loan| loan.status == LoanStatus::Active)
            .filter_map(|loan| {
                state.accounts.get(&loan.account_id).map(|account| LoanPosition {
                    loan: loan.clone(),
                    balance: account.balance,
                })
            })
            .collect())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_request(&mut self, id: Uuid) -> Result<Option<WithdrawalRequest>, StoreError> {
        Ok(self.working.requests.iter().find(|r| r.id == id).cloned())
    }

    async fn lock_account(&mut self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.working.accounts.get(&id).cloned())
    }

    async fn adjust_balance(&mut self, account_id: Uuid, delta: Decimal) -> Result<Decimal, StoreError> {
        let account = self
            .working
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| StoreError::Unavailable(format!("account {account_id} vanished mid-transaction")))?;
        account.balance += delta;
        Ok(account.balance)
    }

    async fn insert_transaction(&mut self, record: &TransactionRecord) -> Result<(), StoreError> {
        self.working.transactions.push(record.clone());
        Ok(())
    }

    async fn settle_request(&mut self, id: Uuid, settlement: &Settlement) -> Result<bool, StoreError> {
        let Some(request) = self
            .working
            .requests
            .iter_mut()
            .find(|r| r.id == id && r.status == RequestStatus::Pending)
        else {
            return Ok(false);
        };
        request.status = settlement.status;
        request.approved_by = Some(settlement.actor);
        request.settled_at = Some(settlement.at);
        request.charge_applied = settlement.charge_applied;
        if settlement.status == RequestStatus::Rejected {
            request.rejection_reason = settlement.reason.clone();
        }
        Ok(true)
    }

    async fn mark_reversed(&mut self, id: Uuid, mark: &ReversalMark) -> Result<bool, StoreError> {
        let Some(request) = self
            .working
            .requests
            .iter_mut()
            .find(|r| r.id == id && r.status == RequestStatus::Approved && !r.is_reversed)
        else {
            return Ok(false);
        };
        request.is_reversed = true;
        request.reversed_by = Some(mark.actor);
        request.reversed_at = Some(mark.at);
        request.reversal_reason = Some(mark.reason.clone());
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl IncomeStore for MemoryStore {
    async fn append_income(&self, record: &BankIncomeRecord) -> Result<(), StoreError> {
        let mut records = self.income.lock().await;
        if let Some(date) = record.accrual_date {
            let duplicate = records.iter().any(|r| {
                r.kind == IncomeKind::LoanInterest
                    && record.kind == IncomeKind::LoanInterest
                    && r.source_id == record.source_id
                    && r.accrual_date == Some(date)
            });
            if duplicate {
                return Err(StoreError::conflict(
                    LOAN_ACCRUAL,
                    format!("{}@{date}", record.source_id),
                ));
            }
        }
        records.push(record.clone());
        Ok(())
    }

    async fn income_stats(&self, range: &DateRange) -> Result<IncomeStats, StoreError> {
        let records = self.income.lock().await;
        Ok(IncomeStats::from_records(
            records.iter().filter(|r| range.contains(r.created_at)),
        ))
    }

    async fn income_page(
        &self,
        range: &DateRange,
        skip: u64,
        take: u64,
    ) -> Result<(Vec<BankIncomeRecord>, u64), StoreError> {
        let records = self.income.lock().await;
        let matching: Vec<&BankIncomeRecord> = records
            .iter()
            .rev()
            .filter(|r| range.contains(r.created_at))
            .collect();
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(skip as usize)
            .take(take as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn income_for_source(&self, source_id: Uuid) -> Result<Vec<BankIncomeRecord>, StoreError> {
        Ok(self
            .income
            .lock()
            .await
            .iter()
            .filter(|r| r.source_id == source_id)
            .cloned()
            .collect())
    }
}
