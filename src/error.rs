use rust_decimal::Decimal;
use thiserror::Error;

use crate::db::StoreError;

/// Errors returned by the ledger components. Translated to HTTP statuses only
/// in `routes::error`.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("missing or invalid credentials")]
    Unauthenticated,

    #[error("role {role} may not {action}")]
    Forbidden { role: &'static str, action: &'static str },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    InvalidState(String),

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("{0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds {
            required,
            available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn insufficient_funds_names_both_amounts() {
        let err = LedgerError::insufficient_funds(dec!(150.00), dec!(100.00));
        assert!(err.to_string().contains("required 150.00"));
        assert!(err.to_string().contains("available 100.00"));
    }

    #[test]
    fn not_found_names_entity() {
        let err = LedgerError::not_found("account", "abc");
        assert_eq!(err.to_string(), "account not found: abc");
    }
}
