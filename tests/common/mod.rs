#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use backoffice_ledger::{
    banking::{Actor, ChargeCalculator, LedgerServices, NewWithdrawal},
    db::{
        account::{Account, Customer, Loan, LoanStatus, User, UserRole},
        income::{BankIncomeRecord, DateRange, IncomeStats},
        request::RequestKind,
        IncomeStore, MemoryStore, StoreError,
    },
};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A seeded back office: one customer with one account, and a user per role.
pub struct Bank {
    pub store: MemoryStore,
    pub services: LedgerServices,
    pub account_id: Uuid,
    pub customer_id: Uuid,
    pub teller: Actor,
    pub manager: Actor,
    pub admin: Actor,
}

impl Bank {
    pub async fn new(balance: Decimal) -> Self {
        let store = MemoryStore::new();
        let income: Arc<dyn IncomeStore> = Arc::new(store.clone());
        Self::seeded(store, income, balance).await
    }

    /// Same seed, but bank income goes to `income` instead of the memory store.
    pub async fn with_income_store(balance: Decimal, income: Arc<dyn IncomeStore>) -> Self {
        Self::seeded(MemoryStore::new(), income, balance).await
    }

    async fn seeded(store: MemoryStore, income: Arc<dyn IncomeStore>, balance: Decimal) -> Self {
        let customer_id = Uuid::new_v4();
        store
            .add_customer(Customer {
                id: customer_id,
                full_name: "Grace Hopper".into(),
            })
            .await;
        let account_id = add_account(&store, customer_id, "ACC-1001", balance).await;

        let teller = add_user(&store, "Tom Teller", UserRole::Teller).await;
        let manager = add_user(&store, "Mina Manager", UserRole::Manager).await;
        let admin = add_user(&store, "Ada Admin", UserRole::Admin).await;

        let services = LedgerServices::new(Arc::new(store.clone()), income, ChargeCalculator::default());
        Self {
            store,
            services,
            account_id,
            customer_id,
            teller,
            manager,
            admin,
        }
    }

    pub async fn balance(&self) -> Decimal {
        self.store.balance(self.account_id).await.unwrap()
    }

    pub async fn add_loan(&self, annual_rate: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        self.store
            .add_loan(Loan {
                id,
                account_id: self.account_id,
                customer_id: self.customer_id,
                annual_rate,
                status: LoanStatus::Active,
            })
            .await;
        id
    }

    /// Creates a pending request as the teller and returns its id.
    pub async fn request(&self, kind: RequestKind, amount: Decimal) -> Uuid {
        self.services
            .workflow
            .create(new_request(self.account_id, kind, amount), &self.teller)
            .await
            .unwrap()
            .request
            .id
    }
}

pub async fn add_account(store: &MemoryStore, customer_id: Uuid, number: &str, balance: Decimal) -> Uuid {
    let id = Uuid::new_v4();
    store
        .add_account(Account {
            id,
            account_number: number.into(),
            customer_id,
            balance,
        })
        .await;
    id
}

pub async fn add_user(store: &MemoryStore, name: &str, role: UserRole) -> Actor {
    let id = Uuid::new_v4();
    store
        .add_user(User {
            id,
            full_name: name.into(),
            role,
        })
        .await;
    Actor::new(id, role)
}

pub fn new_request(account_id: Uuid, kind: RequestKind, amount: Decimal) -> NewWithdrawal {
    NewWithdrawal {
        account_id,
        amount,
        kind,
        description: None,
        reference: None,
        to_account_number: (kind == RequestKind::Transfer).then(|| "ACC-2002".to_string()),
        to_customer_name: (kind == RequestKind::Transfer).then(|| "Alan Turing".to_string()),
    }
}

/// Income store that can be taken offline; writes and reads fail while it is.
#[derive(Clone, Default)]
pub struct SwitchableIncome {
    pub inner: MemoryStore,
    offline: Arc<AtomicBool>,
}

impl SwitchableIncome {
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("income journal offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl IncomeStore for SwitchableIncome {
    async fn append_income(&self, record: &BankIncomeRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner.append_income(record).await
    }

    async fn income_stats(&self, range: &DateRange) -> Result<IncomeStats, StoreError> {
        self.check()?;
        self.inner.income_stats(range).await
    }

    async fn income_page(
        &self,
        range: &DateRange,
        skip: u64,
        take: u64,
    ) -> Result<(Vec<BankIncomeRecord>, u64), StoreError> {
        self.check()?;
        self.inner.income_page(range, skip, take).await
    }

    async fn income_for_source(&self, source_id: Uuid) -> Result<Vec<BankIncomeRecord>, StoreError> {
        self.check()?;
        self.inner.income_for_source(source_id).await
    }
}
