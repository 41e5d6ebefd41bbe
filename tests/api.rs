mod common;

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use backoffice_ledger::{
    banking::Actor,
    db::request::RequestKind,
    routes::{app_router, auth::AuthService},
};
use common::Bank;
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "api-test-secret";

struct TestApp {
    bank: Bank,
    auth: Arc<AuthService>,
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let bank = Bank::new(dec!(100.00)).await;
        let auth = Arc::new(AuthService::new(Arc::new(bank.store.clone()), SECRET.into()));
        let router = app_router(auth.clone(), bank.services.clone());
        Self { bank, auth, router }
    }

    fn token(&self, actor: &Actor) -> String {
        self.auth.issue_token(actor.id, Duration::from_secs(300)).unwrap()
    }

    async fn send(&self, method: Method, uri: &str, actor: Option<&Actor>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(actor) = actor {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", self.token(actor)));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

#[tokio::test]
async fn create_returns_created_request() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/v1/withdrawal-requests",
            Some(&app.bank.teller),
            Some(json!({
                "accountId": app.bank.account_id,
                "amount": "30.00",
                "type": "withdrawal",
                "description": "Cash at counter"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["type"], "withdrawal");
    assert_eq!(body["accountNumber"], "ACC-1001");
    assert_eq!(body["customerName"], "Grace Hopper");
    assert!(body["reference"].as_str().unwrap().starts_with("WR-"));
}

#[tokio::test]
async fn create_without_amount_is_a_validation_error() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/v1/withdrawal-requests",
            Some(&app.bank.teller),
            Some(json!({ "accountId": app.bank.account_id, "type": "withdrawal" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = TestApp::new().await;

    let (status, body) = app.send(Method::GET, "/v1/withdrawal-requests", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn teller_cannot_approve() {
    let app = TestApp::new().await;
    let id = app.bank.request(RequestKind::Withdrawal, dec!(30.00)).await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/v1/withdrawal-requests/{id}/approve"),
            Some(&app.bank.teller),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(app.bank.balance().await, dec!(100.00));
}

#[tokio::test]
async fn approve_and_reverse_round_trip_the_balance() {
    let app = TestApp::new().await;
    let id = app.bank.request(RequestKind::Withdrawal, dec!(30.00)).await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/v1/withdrawal-requests/{id}/approve"),
            Some(&app.bank.manager),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["status"], "approved");
    assert_eq!(app.bank.balance().await, dec!(65.00));

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/v1/withdrawal-requests/{id}/reverse"),
            Some(&app.bank.manager),
            Some(json!({ "reason": "duplicate payout" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["isReversed"], true);
    assert_eq!(app.bank.balance().await, dec!(100.00));

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/v1/withdrawal-requests/{id}/reverse"),
            Some(&app.bank.manager),
            Some(json!({ "reason": "again" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_STATE");
}

#[tokio::test]
async fn reject_accepts_an_empty_body() {
    let app = TestApp::new().await;
    let id = app.bank.request(RequestKind::Transfer, dec!(10.00)).await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/v1/withdrawal-requests/{id}/reject"),
            Some(&app.bank.admin),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["status"], "rejected");
}

#[tokio::test]
async fn insufficient_funds_is_a_bad_request() {
    let app = TestApp::new().await;
    let id = app.bank.request(RequestKind::Withdrawal, dec!(500.00)).await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/v1/withdrawal-requests/{id}/approve"),
            Some(&app.bank.manager),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INSUFFICIENT_FUNDS");
}

#[tokio::test]
async fn unknown_request_is_not_found() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/v1/withdrawal-requests/{}", Uuid::new_v4()),
            Some(&app.bank.teller),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn list_reports_pagination_and_counts() {
    let app = TestApp::new().await;
    for _ in 0..3 {
        app.bank.request(RequestKind::Withdrawal, dec!(1.00)).await;
    }
    let id = app.bank.request(RequestKind::Withdrawal, dec!(1.00)).await;
    app.bank.services.workflow.approve(id, &app.bank.manager).await.unwrap();

    let (status, body) = app
        .send(
            Method::GET,
            "/v1/withdrawal-requests?page=1&limit=2&status=all",
            Some(&app.bank.teller),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["total"], 4);
    assert_eq!(body["pagination"]["totalPages"], 2);
    assert_eq!(body["counts"]["pending"], 3);
    assert_eq!(body["counts"]["approved"], 1);
}

#[tokio::test]
async fn bad_status_filter_is_rejected() {
    let app = TestApp::new().await;

    let (status, _) = app
        .send(
            Method::GET,
            "/v1/withdrawal-requests?status=frozen",
            Some(&app.bank.teller),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn income_endpoints_enforce_roles() {
    let app = TestApp::new().await;

    let (teller_stats, _) = app
        .send(Method::GET, "/v1/bank-income/stats", Some(&app.bank.teller), None)
        .await;
    let (manager_interest, _) = app
        .send(
            Method::POST,
            "/v1/bank-income/daily-interest",
            Some(&app.bank.manager),
            Some(json!({})),
        )
        .await;

    assert_eq!(teller_stats, StatusCode::FORBIDDEN);
    assert_eq!(manager_interest, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn income_stats_and_interest_run() {
    let app = TestApp::new().await;
    app.bank.add_loan(dec!(12)).await;

    let (status, run) = app
        .send(
            Method::POST,
            "/v1/bank-income/daily-interest",
            Some(&app.bank.admin),
            Some(json!({ "date": "2024-03-01" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["records"].as_array().unwrap().len(), 1);

    let id = app.bank.request(RequestKind::Withdrawal, dec!(30.00)).await;
    app.bank.services.workflow.approve(id, &app.bank.manager).await.unwrap();

    let (status, stats) = app
        .send(Method::GET, "/v1/bank-income/stats", Some(&app.bank.manager), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["totalCount"], 2);
    assert_eq!(stats["breakdownByKind"]["withdrawal_charge"]["count"], 1);
    assert_eq!(stats["breakdownByKind"]["loan_interest"]["count"], 1);

    let (status, records) = app
        .send(
            Method::GET,
            "/v1/bank-income/records?page=1&limit=1",
            Some(&app.bank.manager),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(records["total"], 2);
    assert_eq!(records["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn reconcile_reports_clean_books() {
    let app = TestApp::new().await;
    let id = app.bank.request(RequestKind::Withdrawal, dec!(30.00)).await;
    app.bank.services.workflow.approve(id, &app.bank.manager).await.unwrap();

    let (status, report) = app
        .send(
            Method::POST,
            "/v1/bank-income/reconcile",
            Some(&app.bank.admin),
            Some(json!({ "repair": false })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["checked"], 1);
    assert_eq!(report["discrepancies"].as_array().unwrap().len(), 0);
}
