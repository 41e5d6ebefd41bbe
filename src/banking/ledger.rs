use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use super::charge::ChargeCalculator;
use crate::{
    db::{
        request::{RequestKind, WithdrawalRequest},
        tx::{EntryCategory, TransactionRecord, TransactionType},
        LedgerStore, LedgerTx,
    },
    error::{LedgerError, LedgerResult},
};

pub const CHARGE_DESCRIPTION: &str = "withdrawal charge";

/// A debit to post against one account.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerPosting {
    pub account_id: Uuid,
    pub amount: Decimal,
    pub kind: RequestKind,
    pub description: String,
    pub reference: String,
    pub request_id: Option<Uuid>,
}

impl LedgerPosting {
    pub fn for_request(request: &WithdrawalRequest) -> Self {
        Self {
            account_id: request.account_id,
            amount: request.amount,
            kind: request.kind,
            description: request.ledger_description(),
            reference: request.reference.clone(),
            request_id: Some(request.id),
        }
    }
}

/// Balance after a posting and the records it wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEffect {
    pub balance: Decimal,
    pub charge: Decimal,
    pub records: Vec<TransactionRecord>,
}

/// Applies balance changes together with their transaction records.
///
/// The `*_in` forms write through a caller-owned transaction so the caller
/// can bundle other writes with them. The plain forms open and commit their
/// own.
#[derive(Clone)]
pub struct LedgerMutator {
    store: Arc<dyn LedgerStore>,
    charges: ChargeCalculator,
}

impl LedgerMutator {
    pub fn new(store: Arc<dyn LedgerStore>, charges: ChargeCalculator) -> Self {
        Self { store, charges }
    }

    pub fn charges(&self) -> &ChargeCalculator {
        &self.charges
    }

    pub async fn apply(&self, posting: &LedgerPosting) -> LedgerResult<LedgerEffect> {
        let mut tx = self.store.begin().await?;
        tx.lock_account(posting.account_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("account", posting.account_id))?;
        let effect = self.apply_in(&mut *tx, posting).await?;
        tx.commit().await?;
        Ok(effect)
    }

    /// Debits the principal and, for withdrawals, the flat charge.
    pub async fn apply_in(&self, tx: &mut dyn LedgerTx, posting: &LedgerPosting) -> LedgerResult<LedgerEffect> {
        ensure_positive(posting.amount)?;

        let principal = TransactionRecord::completed(
            posting.account_id,
            posting.amount,
            match posting.kind {
                RequestKind::Withdrawal => TransactionType::Withdrawal,
                RequestKind::Transfer => TransactionType::Transfer,
            },
            EntryCategory::Principal,
            posting.description.clone(),
            posting.reference.clone(),
            posting.request_id,
        );
        let mut balance = tx.adjust_balance(posting.account_id, -posting.amount).await?;
        tx.insert_transaction(&principal).await?;
        let mut records = vec![principal];

        let charge = self.charges.fee_for(posting.kind);
        if charge > Decimal::ZERO {
            let fee = TransactionRecord::completed(
                posting.account_id,
                charge,
                TransactionType::Withdrawal,
                EntryCategory::Charge,
                CHARGE_DESCRIPTION,
                format!("CHG-{}", posting.reference),
                posting.request_id,
            );
            balance = tx.adjust_balance(posting.account_id, -charge).await?;
            tx.insert_transaction(&fee).await?;
            records.push(fee);
        }

        tracing::info!(
            account_id = %posting.account_id,
            reference = %posting.reference,
            amount = %posting.amount,
            %charge,
            %balance,
            "ledger debit applied"
        );
        Ok(LedgerEffect {
            balance,
            charge,
            records,
        })
    }

    pub async fn reverse(&self, posting: &LedgerPosting, reason: &str, charge: Decimal) -> LedgerResult<LedgerEffect> {
        let mut tx = self.store.begin().await?;
        tx.lock_account(posting.account_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("account", posting.account_id))?;
        let effect = self.reverse_in(&mut *tx, posting, reason, charge).await?;
        tx.commit().await?;
        Ok(effect)
    }

    /// Credits back a previous [`LedgerMutator::apply_in`]. `charge` is the fee
    /// that was actually debited, so a later fee change cannot skew the refund.
    pub async fn reverse_in(
        &self,
        tx: &mut dyn LedgerTx,
        posting: &LedgerPosting,
        reason: &str,
        charge: Decimal,
    ) -> LedgerResult<LedgerEffect> {
        ensure_positive(posting.amount)?;

        let principal = TransactionRecord::completed(
            posting.account_id,
            posting.amount,
            TransactionType::Deposit,
            EntryCategory::Principal,
            format!("Reversal: {} ({reason})", posting.description),
            format!("REV-{}", posting.reference),
            posting.request_id,
        );
        let mut balance = tx.adjust_balance(posting.account_id, posting.amount).await?;
        tx.insert_transaction(&principal).await?;
        let mut records = vec![principal];

        let refunded = if posting.kind == RequestKind::Withdrawal && charge > Decimal::ZERO {
            let fee = TransactionRecord::completed(
                posting.account_id,
                charge,
                TransactionType::Deposit,
                EntryCategory::Charge,
                format!("Reversal: {CHARGE_DESCRIPTION}"),
                format!("REV-CHG-{}", posting.reference),
                posting.request_id,
            );
            balance = tx.adjust_balance(posting.account_id, charge).await?;
            tx.insert_transaction(&fee).await?;
            records.push(fee);
            charge
        } else {
            Decimal::ZERO
        };

        tracing::info!(
            account_id = %posting.account_id,
            reference = %posting.reference,
            amount = %posting.amount,
            charge = %refunded,
            %balance,
            "ledger debit reversed"
        );
        Ok(LedgerEffect {
            balance,
            charge: refunded,
            records,
        })
    }
}

fn ensure_positive(amount: Decimal) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation("amount must be greater than zero"));
    }
    Ok(())
}
