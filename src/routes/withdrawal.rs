use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{auth::AuthService, utils};
use crate::{
    banking::{LedgerServices, NewWithdrawal},
    db::request::{RequestFilter, RequestKind, RequestSummary, StatusCounts, WithdrawalRequest},
    error::LedgerError,
};

type AppState = (Arc<AuthService>, Arc<LedgerServices>);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWithdrawal {
    pub account_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub to_account_number: Option<String>,
    pub to_customer_name: Option<String>,
}

impl TryFrom<CreateWithdrawal> for NewWithdrawal {
    type Error = LedgerError;

    fn try_from(body: CreateWithdrawal) -> Result<Self, Self::Error> {
        let account_id = body
            .account_id
            .ok_or_else(|| LedgerError::validation("accountId is required"))?;
        let amount = body
            .amount
            .ok_or_else(|| LedgerError::validation("amount is required"))?;
        let raw_kind = body
            .kind
            .ok_or_else(|| LedgerError::validation("type is required"))?;
        let kind = raw_kind
            .trim()
            .to_lowercase()
            .parse::<RequestKind>()
            .map_err(|_| LedgerError::validation(format!("type must be withdrawal or transfer, got {raw_kind}")))?;

        Ok(Self {
            account_id,
            amount,
            kind,
            description: body.description,
            reference: body.reference,
            to_account_number: body.to_account_number,
            to_customer_name: body.to_customer_name,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReasonBody {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub data: Vec<RequestSummary>,
    pub pagination: Pagination,
    pub counts: StatusCounts,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub message: String,
    pub request: WithdrawalRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<Decimal>,
}

fn log_failure(action: &'static str, request_id: Option<Uuid>) -> impl FnOnce(LedgerError) -> LedgerError {
    move |err| {
        match &err {
            LedgerError::Storage(_) => tracing::error!(?request_id, "Failed to {action}: {err}"),
            _ => tracing::warn!(?request_id, "Refused to {action}: {err}"),
        }
        err
    }
}

async fn create_request(
    headers: HeaderMap,
    State((service, ledger)): State<AppState>,
    payload: Result<Json<CreateWithdrawal>, JsonRejection>,
) -> Result<impl IntoResponse, LedgerError> {
    tracing::info!("Starting withdrawal request creation");

    let actor = utils::authenticate(&headers, &service).await?;
    let Json(body) = payload.map_err(|rejection| LedgerError::validation(rejection.body_text()))?;
    let new = NewWithdrawal::try_from(body)?;

    let summary = ledger
        .workflow
        .create(new, &actor)
        .await
        .map_err(log_failure("create withdrawal request", None))?;
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn approve_request(
    headers: HeaderMap,
    State((service, ledger)): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = utils::authenticate(&headers, &service).await?;

    let approval = ledger
        .workflow
        .approve(request_id, &actor)
        .await
        .map_err(log_failure("approve withdrawal request", Some(request_id)))?;
    Ok(Json(ActionResponse {
        message: "Withdrawal request approved".to_string(),
        request: approval.request,
        balance: Some(approval.effect.balance),
    }))
}

async fn reject_request(
    headers: HeaderMap,
    State((service, ledger)): State<AppState>,
    Path(request_id): Path<Uuid>,
    body: Option<Json<ReasonBody>>,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = utils::authenticate(&headers, &service).await?;
    let reason = body.and_then(|Json(body)| body.reason);

    let request = ledger
        .workflow
        .reject(request_id, &actor, reason)
        .await
        .map_err(log_failure("reject withdrawal request", Some(request_id)))?;
    Ok(Json(ActionResponse {
        message: "Withdrawal request rejected".to_string(),
        request,
        balance: None,
    }))
}

async fn reverse_request(
    headers: HeaderMap,
    State((service, ledger)): State<AppState>,
    Path(request_id): Path<Uuid>,
    payload: Result<Json<ReasonBody>, JsonRejection>,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = utils::authenticate(&headers, &service).await?;
    let Json(body) = payload.map_err(|rejection| LedgerError::validation(rejection.body_text()))?;
    let reason = body.reason.unwrap_or_default();

    let reversal = ledger
        .workflow
        .reverse(request_id, &actor, &reason)
        .await
        .map_err(log_failure("reverse withdrawal request", Some(request_id)))?;
    Ok(Json(ActionResponse {
        message: "Withdrawal request reversed".to_string(),
        request: reversal.request,
        balance: Some(reversal.effect.balance),
    }))
}

async fn get_request(
    headers: HeaderMap,
    State((service, ledger)): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, LedgerError> {
    utils::authenticate(&headers, &service).await?;

    let summary = ledger
        .workflow
        .get(request_id)
        .await
        .map_err(log_failure("load withdrawal request", Some(request_id)))?;
    Ok(Json(summary))
}

async fn list_requests(
    headers: HeaderMap,
    State((service, ledger)): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, LedgerError> {
    utils::authenticate(&headers, &service).await?;
    let Query(query) = query.map_err(|rejection| LedgerError::validation(rejection.body_text()))?;

    let filter = RequestFilter::new(
        query.page,
        query.limit,
        query.search,
        query.status.as_deref(),
        query.kind.as_deref(),
    )?;
    let page = ledger
        .workflow
        .list(&filter)
        .await
        .map_err(log_failure("list withdrawal requests", None))?;

    let limit = u64::from(filter.limit);
    Ok(Json(ListResponse {
        data: page.items,
        pagination: Pagination {
            page: filter.page,
            limit: filter.limit,
            total: page.total,
            total_pages: page.total.div_ceil(limit),
        },
        counts: page.counts,
    }))
}

pub fn withdrawal_routes(service: Arc<AuthService>, ledger: Arc<LedgerServices>) -> Router {
    Router::new()
        .route("/withdrawal-requests", post(create_request).get(list_requests))
        .route("/withdrawal-requests/:id", get(get_request))
        .route("/withdrawal-requests/:id/approve", post(approve_request))
        .route("/withdrawal-requests/:id/reject", post(reject_request))
        .route("/withdrawal-requests/:id/reverse", post(reverse_request))
        .with_state((service, ledger))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> CreateWithdrawal {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn create_body_requires_account_amount_and_type() {
        for json in [
            r#"{"amount": 10, "type": "withdrawal"}"#,
            r#"{"accountId": "7d1e3c1a-9a55-4c39-9a3c-0d4c8b1c2f10", "type": "withdrawal"}"#,
            r#"{"accountId": "7d1e3c1a-9a55-4c39-9a3c-0d4c8b1c2f10", "amount": 10}"#,
        ] {
            assert!(matches!(NewWithdrawal::try_from(body(json)), Err(LedgerError::Validation(_))));
        }
    }

    #[test]
    fn create_body_parses_transfer() {
        let new = NewWithdrawal::try_from(body(
            r#"{"accountId": "7d1e3c1a-9a55-4c39-9a3c-0d4c8b1c2f10", "amount": "12.50",
                "type": "Transfer", "toAccountNumber": "ACC-9", "toCustomerName": "Ada"}"#,
        ))
        .unwrap();

        assert_eq!(new.kind, RequestKind::Transfer);
        assert_eq!(new.amount, Decimal::new(1250, 2));
        assert_eq!(new.to_account_number.as_deref(), Some("ACC-9"));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = NewWithdrawal::try_from(body(
            r#"{"accountId": "7d1e3c1a-9a55-4c39-9a3c-0d4c8b1c2f10", "amount": 1, "type": "loan"}"#,
        ));
        assert!(result.is_err());
    }
}
