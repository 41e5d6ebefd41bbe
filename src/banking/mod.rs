//! Withdrawal authorization, the ledger it mutates, and bank income.

pub mod authorization;
pub mod charge;
pub mod income;
pub mod interest;
pub mod ledger;
pub mod reconcile;

use std::sync::Arc;

pub use authorization::{Actor, AuthorizationWorkflow, NewWithdrawal};
pub use charge::ChargeCalculator;
pub use income::{BankIncomeRecorder, IncomeEntry};
pub use interest::DailyInterestJob;
pub use ledger::LedgerMutator;
pub use reconcile::IncomeReconciler;

use crate::db::{IncomeStore, LedgerStore};

/// Every ledger component, wired over the same pair of stores.
#[derive(Clone)]
pub struct LedgerServices {
    pub workflow: AuthorizationWorkflow,
    pub income: BankIncomeRecorder,
    pub interest: DailyInterestJob,
    pub reconciler: IncomeReconciler,
}

impl LedgerServices {
    pub fn new(ledger: Arc<dyn LedgerStore>, income: Arc<dyn IncomeStore>, charges: ChargeCalculator) -> Self {
        let recorder = BankIncomeRecorder::new(income);
        let mutator = LedgerMutator::new(ledger.clone(), charges);
        Self {
            workflow: AuthorizationWorkflow::new(ledger.clone(), mutator, recorder.clone()),
            interest: DailyInterestJob::new(ledger.clone(), recorder.clone()),
            reconciler: IncomeReconciler::new(ledger, recorder.clone()),
            income: recorder,
        }
    }
}
