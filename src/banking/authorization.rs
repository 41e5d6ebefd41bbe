use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{
    charge::{MONEY_LIMIT, MONEY_SCALE},
    income::{BankIncomeRecorder, IncomeEntry},
    ledger::{LedgerEffect, LedgerMutator, LedgerPosting},
};
use crate::{
    db::{
        account::UserRole,
        income::{BankIncomeRecord, IncomeKind, SourceKind},
        request::{
            RequestFilter, RequestKind, RequestPage, RequestStatus, RequestSummary, ReversalMark,
            Settlement, WithdrawalRequest,
        },
        LedgerStore,
    },
    error::{LedgerError, LedgerResult},
};

/// Authenticated caller of a workflow operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: Uuid, role: UserRole) -> Self {
        Self { id, role }
    }

    pub fn require(&self, allowed: bool, action: &'static str) -> LedgerResult<()> {
        if allowed {
            return Ok(());
        }
        tracing::warn!(actor = %self.id, role = self.role.as_str(), action, "forbidden");
        Err(LedgerError::Forbidden {
            role: self.role.as_str(),
            action,
        })
    }

    pub fn require_authorizer(&self, action: &'static str) -> LedgerResult<()> {
        self.require(self.role.can_authorize(), action)
    }

    pub fn require_admin(&self, action: &'static str) -> LedgerResult<()> {
        self.require(self.role == UserRole::Admin, action)
    }
}

/// Input for a new request, already parsed from the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWithdrawal {
    pub account_id: Uuid,
    pub amount: Decimal,
    pub kind: RequestKind,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub to_account_number: Option<String>,
    pub to_customer_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Approval {
    pub request: WithdrawalRequest,
    pub effect: LedgerEffect,
    /// `None` when no fee applied or recording it failed.
    pub income: Option<BankIncomeRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reversal {
    pub request: WithdrawalRequest,
    pub effect: LedgerEffect,
    pub income: Option<BankIncomeRecord>,
}

/// Lifecycle of withdrawal and transfer requests.
///
/// `Pending` moves once to `Approved` or `Rejected`; an approved request can be
/// reversed once. Approval and reversal change the request row and the ledger
/// in the same storage transaction. Fee income is booked after commit and
/// never fails the operation.
#[derive(Clone)]
pub struct AuthorizationWorkflow {
    store: Arc<dyn LedgerStore>,
    ledger: LedgerMutator,
    income: BankIncomeRecorder,
}

impl AuthorizationWorkflow {
    pub fn new(store: Arc<dyn LedgerStore>, ledger: LedgerMutator, income: BankIncomeRecorder) -> Self {
        Self {
            store,
            ledger,
            income,
        }
    }

    pub async fn create(&self, new: NewWithdrawal, requester: &Actor) -> LedgerResult<RequestSummary> {
        if new.amount <= Decimal::ZERO {
            return Err(LedgerError::validation("amount must be greater than zero"));
        }
        if new.amount.normalize().scale() > MONEY_SCALE {
            return Err(LedgerError::validation(format!(
                "amount may have at most {MONEY_SCALE} decimal places"
            )));
        }
        if new.amount >= MONEY_LIMIT {
            return Err(LedgerError::validation(format!("amount must be below {MONEY_LIMIT}")));
        }

        let account = self
            .store
            .find_account(new.account_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("account", new.account_id))?;
        let customer = self.store.find_customer(account.customer_id).await?;

        let id = Uuid::new_v4();
        let request = WithdrawalRequest {
            id,
            account_id: account.id,
            amount: new.amount,
            kind: new.kind,
            description: non_blank(new.description),
            reference: non_blank(new.reference).unwrap_or_else(|| WithdrawalRequest::default_reference(id)),
            to_account_number: non_blank(new.to_account_number),
            to_customer_name: non_blank(new.to_customer_name),
            status: RequestStatus::Pending,
            charge_applied: Decimal::ZERO,
            requested_by: requester.id,
            approved_by: None,
            settled_at: None,
            rejection_reason: None,
            is_reversed: false,
            reversed_by: None,
            reversed_at: None,
            reversal_reason: None,
            created_at: Utc::now(),
        };
        self.store.insert_request(&request).await?;

        tracing::info!(
            request_id = %request.id,
            account_id = %request.account_id,
            kind = request.kind.as_str(),
            amount = %request.amount,
            requested_by = %requester.id,
            "withdrawal request created"
        );
        Ok(RequestSummary {
            request,
            account_number: account.account_number,
            customer_name: customer.map(|c| c.full_name),
        })
    }

    pub async fn approve(&self, request_id: Uuid, actor: &Actor) -> LedgerResult<Approval> {
        actor.require_authorizer("approve withdrawal requests")?;

        let mut tx = self.store.begin().await?;
        let mut request = tx
            .lock_request(request_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("withdrawal request", request_id))?;
        if !request.is_pending() {
            return Err(LedgerError::invalid_state(format!(
                "request is already {}",
                request.status.as_str()
            )));
        }
        let account = tx
            .lock_account(request.account_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("account", request.account_id))?;
        if account.balance < request.amount {
            tracing::warn!(
                %request_id,
                balance = %account.balance,
                amount = %request.amount,
                "approval refused, insufficient funds"
            );
            return Err(LedgerError::insufficient_funds(request.amount, account.balance));
        }

        let settlement = Settlement {
            status: RequestStatus::Approved,
            actor: actor.id,
            at: Utc::now(),
            charge_applied: self.ledger.charges().fee_for(request.kind),
            reason: None,
        };
        if !tx.settle_request(request_id, &settlement).await? {
            return Err(LedgerError::invalid_state("request is no longer pending"));
        }
        let effect = self
            .ledger
            .apply_in(&mut *tx, &LedgerPosting::for_request(&request))
            .await?;
        tx.commit().await?;

        request.status = RequestStatus::Approved;
        request.approved_by = Some(actor.id);
        request.settled_at = Some(settlement.at);
        request.charge_applied = effect.charge;
        tracing::info!(%request_id, approver = %actor.id, balance = %effect.balance, "withdrawal request approved");

        let income = if request.kind == RequestKind::Withdrawal && effect.charge > Decimal::ZERO {
            let entry = IncomeEntry::new(
                IncomeKind::WithdrawalCharge,
                effect.charge,
                request.id,
                SourceKind::WithdrawalRequest,
            )
            .for_account(account.id, account.customer_id);
            self.income.record_best_effort(entry).await
        } else {
            None
        };

        Ok(Approval {
            request,
            effect,
            income,
        })
    }

    pub async fn reject(&self, request_id: Uuid, actor: &Actor, reason: Option<String>) -> LedgerResult<WithdrawalRequest> {
        actor.require_authorizer("reject withdrawal requests")?;

        let mut tx = self.store.begin().await?;
        let mut request = tx
            .lock_request(request_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("withdrawal request", request_id))?;
        if !request.is_pending() {
            return Err(LedgerError::invalid_state(format!(
                "request is already {}",
                request.status.as_str()
            )));
        }

        let settlement = Settlement {
            status: RequestStatus::Rejected,
            actor: actor.id,
            at: Utc::now(),
            charge_applied: Decimal::ZERO,
            reason: non_blank(reason),
        };
        if !tx.settle_request(request_id, &settlement).await? {
            return Err(LedgerError::invalid_state("request is no longer pending"));
        }
        tx.commit().await?;

        request.status = RequestStatus::Rejected;
        request.approved_by = Some(actor.id);
        request.settled_at = Some(settlement.at);
        request.rejection_reason = settlement.reason;
        tracing::info!(%request_id, approver = %actor.id, "withdrawal request rejected");
        Ok(request)
    }

    pub async fn reverse(&self, request_id: Uuid, actor: &Actor, reason: &str) -> LedgerResult<Reversal> {
        actor.require_authorizer("reverse withdrawal requests")?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::validation("a reversal reason is required"));
        }

        let mut tx = self.store.begin().await?;
        let mut request = tx
            .lock_request(request_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("withdrawal request", request_id))?;
        if request.status != RequestStatus::Approved {
            return Err(LedgerError::invalid_state("only approved requests can be reversed"));
        }
        if request.is_reversed {
            return Err(LedgerError::invalid_state("request is already reversed"));
        }
        let account = tx
            .lock_account(request.account_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("account", request.account_id))?;

        let mark = ReversalMark {
            actor: actor.id,
            at: Utc::now(),
            reason: reason.to_string(),
        };
        if !tx.mark_reversed(request_id, &mark).await? {
            return Err(LedgerError::invalid_state("request is already reversed"));
        }
        let effect = self
            .ledger
            .reverse_in(
                &mut *tx,
                &LedgerPosting::for_request(&request),
                reason,
                request.charge_applied,
            )
            .await?;
        tx.commit().await?;

        request.is_reversed = true;
        request.reversed_by = Some(actor.id);
        request.reversed_at = Some(mark.at);
        request.reversal_reason = Some(mark.reason);
        tracing::info!(%request_id, actor = %actor.id, balance = %effect.balance, "withdrawal request reversed");

        let income = if effect.charge > Decimal::ZERO {
            let entry = IncomeEntry::new(
                IncomeKind::WithdrawalCharge,
                -effect.charge,
                request.id,
                SourceKind::WithdrawalRequest,
            )
            .for_account(account.id, account.customer_id);
            self.income.record_best_effort(entry).await
        } else {
            None
        };

        Ok(Reversal {
            request,
            effect,
            income,
        })
    }

    pub async fn get(&self, request_id: Uuid) -> LedgerResult<RequestSummary> {
        self.store
            .find_request(request_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("withdrawal request", request_id))
    }

    pub async fn list(&self, filter: &RequestFilter) -> LedgerResult<RequestPage> {
        Ok(self.store.list_requests(filter).await?)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tellers_cannot_authorize() {
        let teller = Actor::new(Uuid::new_v4(), UserRole::Teller);
        let err = teller.require_authorizer("approve withdrawal requests").unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden { role: "teller", .. }));
    }

    #[test]
    fn managers_authorize_but_are_not_admins() {
        let manager = Actor::new(Uuid::new_v4(), UserRole::Manager);
        assert!(manager.require_authorizer("approve withdrawal requests").is_ok());
        assert!(manager.require_admin("run interest accrual").is_err());
    }

    #[test]
    fn blank_strings_become_none() {
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(Some(" x ".into())), Some("x".into()));
    }
}
