use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StoreError;

/// Immutable ledger fact. Written once, never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub category: EntryCategory,
    pub status: TransactionStatus,
    pub reference_id: String,
    pub description: String,
    pub request_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn completed(
        account_id: Uuid,
        amount: Decimal,
        transaction_type: TransactionType,
        category: EntryCategory,
        description: impl Into<String>,
        reference_id: impl Into<String>,
        request_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            amount,
            transaction_type,
            category,
            status: TransactionStatus::Completed,
            reference_id: reference_id.into(),
            description: description.into(),
            request_id,
            created_at: Utc::now(),
        }
    }

    /// Balance effect of this record: deposits credit, everything else debits.
    pub fn signed_amount(&self) -> Decimal {
        match self.transaction_type {
            TransactionType::Deposit => self.amount,
            TransactionType::Withdrawal | TransactionType::Transfer => -self.amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Transfer => "transfer",
        }
    }
}

impl FromStr for TransactionType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "transfer" => Ok(Self::Transfer),
            other => Err(StoreError::invalid_enum("transaction_type", other)),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a record moves the requested principal or the fee charged on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryCategory {
    Principal,
    Charge,
}

impl EntryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Principal => "principal",
            Self::Charge => "charge",
        }
    }
}

impl FromStr for EntryCategory {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "principal" => Ok(Self::Principal),
            "charge" => Ok(Self::Charge),
            other => Err(StoreError::invalid_enum("category", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(StoreError::invalid_enum("status", other)),
        }
    }
}
