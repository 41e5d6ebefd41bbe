use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StoreError;

// Rows owned by the customer/account back office. This crate only reads them,
// except for the balance column which the ledger mutates.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub account_number: String,
    pub customer_id: Uuid,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: Uuid,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Teller,
    Manager,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Teller => "teller",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }

    /// Roles allowed to approve, reject and reverse withdrawal requests.
    pub fn can_authorize(&self) -> bool {
        matches!(self, Self::Manager | Self::Admin)
    }
}

impl FromStr for UserRole {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "teller" => Ok(Self::Teller),
            "manager" => Ok(Self::Manager),
            "admin" => Ok(Self::Admin),
            other => Err(StoreError::invalid_enum("role", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: Uuid,
    pub account_id: Uuid,
    pub customer_id: Uuid,
    /// Annual rate in percent, e.g. `12` for 12%.
    pub annual_rate: Decimal,
    pub status: LoanStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Closed,
    Defaulted,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Defaulted => "defaulted",
        }
    }
}

impl FromStr for LoanStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            "defaulted" => Ok(Self::Defaulted),
            other => Err(StoreError::invalid_enum("loan_status", other)),
        }
    }
}

/// An active loan joined with the balance of the account it is booked on.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanPosition {
    pub loan: Loan,
    pub balance: Decimal,
}
