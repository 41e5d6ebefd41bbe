use thiserror::Error;

/// Conflict entity for a second interest accrual on the same loan and date.
pub const LOAN_ACCRUAL: &str = "loan interest accrual";

/// Failures raised by the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("duplicate {entity}: {key}")]
    Conflict { entity: &'static str, key: String },

    #[error("invalid value for {field}: {value}")]
    InvalidEnumValue { field: &'static str, value: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn invalid_enum(field: &'static str, value: &str) -> Self {
        Self::InvalidEnumValue {
            field,
            value: value.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, key: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            key: key.into(),
        }
    }

    pub fn is_accrual_conflict(&self) -> bool {
        matches!(self, Self::Conflict { entity, .. } if *entity == LOAN_ACCRUAL)
    }
}
