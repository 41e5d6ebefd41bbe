use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::LedgerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
}

impl LedgerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidState(_) | Self::InsufficientFunds { .. } | Self::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Storage(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let message = match &self {
            // storage details stay in the logs
            Self::Storage(err) => {
                tracing::error!("Storage failure: {err}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ApiError {
            code: self.code(),
            message,
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoreError;
    use rstest::rstest;
    use rust_decimal::Decimal;

    #[rstest]
    #[case(LedgerError::Unauthenticated, StatusCode::UNAUTHORIZED)]
    #[case(LedgerError::Forbidden { role: "teller", action: "approve" }, StatusCode::FORBIDDEN)]
    #[case(LedgerError::not_found("account", "x"), StatusCode::NOT_FOUND)]
    #[case(LedgerError::invalid_state("request is already approved"), StatusCode::BAD_REQUEST)]
    #[case(LedgerError::insufficient_funds(Decimal::TEN, Decimal::ONE), StatusCode::BAD_REQUEST)]
    #[case(LedgerError::validation("amount is required"), StatusCode::BAD_REQUEST)]
    #[case(LedgerError::Storage(StoreError::Unavailable("down".into())), StatusCode::INTERNAL_SERVER_ERROR)]
    fn errors_map_to_statuses(#[case] err: LedgerError, #[case] status: StatusCode) {
        assert_eq!(err.into_response().status(), status);
    }
}
