use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{auth::AuthService, utils};
use crate::{
    banking::LedgerServices,
    db::{
        income::{BankIncomeRecord, DateRange},
        request::DEFAULT_PAGE_SIZE,
    },
    error::LedgerError,
};

type AppState = (Arc<AuthService>, Arc<LedgerServices>);

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl RangeQuery {
    fn range(&self) -> Result<DateRange, LedgerError> {
        DateRange::new(self.from, self.to)
    }
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub data: Vec<BankIncomeRecord>,
    pub total: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct InterestBody {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileBody {
    pub repair: Option<bool>,
}

async fn income_stats(
    headers: HeaderMap,
    State((service, ledger)): State<AppState>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = utils::authenticate(&headers, &service).await?;
    actor.require_authorizer("view bank income")?;
    let Query(query) = query.map_err(|rejection| LedgerError::validation(rejection.body_text()))?;

    let stats = ledger.income.stats(&query.range()?).await?;
    Ok(Json(stats))
}

async fn income_records(
    headers: HeaderMap,
    State((service, ledger)): State<AppState>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = utils::authenticate(&headers, &service).await?;
    actor.require_authorizer("view bank income")?;
    let Query(query) = query.map_err(|rejection| LedgerError::validation(rejection.body_text()))?;

    let page = query.page.unwrap_or(1);
    if page == 0 {
        return Err(LedgerError::validation("page must be at least 1"));
    }
    let take = u64::from(query.limit.unwrap_or(DEFAULT_PAGE_SIZE));
    let skip = u64::from(page - 1) * take;

    let (data, total) = ledger.income.recent_page(&query.range()?, skip, take).await?;
    Ok(Json(RecordsResponse { data, total }))
}

async fn run_daily_interest(
    headers: HeaderMap,
    State((service, ledger)): State<AppState>,
    body: Option<Json<InterestBody>>,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = utils::authenticate(&headers, &service).await?;
    actor.require_admin("run interest accrual")?;

    let date = body
        .and_then(|Json(body)| body.date)
        .unwrap_or_else(|| Utc::now().date_naive());
    tracing::info!(%date, actor = %actor.id, "Daily interest requested");

    let run = ledger.interest.run(date).await.map_err(|err| {
        tracing::error!(%date, "Daily interest accrual failed: {err}");
        err
    })?;
    Ok(Json(run))
}

async fn reconcile_income(
    headers: HeaderMap,
    State((service, ledger)): State<AppState>,
    body: Option<Json<ReconcileBody>>,
) -> Result<impl IntoResponse, LedgerError> {
    let actor = utils::authenticate(&headers, &service).await?;
    actor.require_admin("reconcile bank income")?;

    let repair = body.and_then(|Json(body)| body.repair).unwrap_or(false);
    let report = ledger.reconciler.run(repair).await?;
    Ok(Json(report))
}

pub fn income_routes(service: Arc<AuthService>, ledger: Arc<LedgerServices>) -> Router {
    Router::new()
        .route("/bank-income/stats", get(income_stats))
        .route("/bank-income/records", get(income_records))
        .route("/bank-income/daily-interest", post(run_daily_interest))
        .route("/bank-income/reconcile", post(reconcile_income))
        .with_state((service, ledger))
}
