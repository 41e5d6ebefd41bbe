use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StoreError;
use crate::error::LedgerError;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub description: Option<String>,
    pub reference: String,
    pub to_account_number: Option<String>,
    pub to_customer_name: Option<String>,
    pub status: RequestStatus,
    pub charge_applied: Decimal,
    pub requested_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub settled_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub is_reversed: bool,
    pub reversed_by: Option<Uuid>,
    pub reversed_at: Option<DateTime<Utc>>,
    pub reversal_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WithdrawalRequest {
    /// Reference used when the requester did not supply one.
    pub fn default_reference(id: Uuid) -> String {
        let simple = id.simple().to_string();
        format!("WR-{}", simple[..8].to_uppercase())
    }

    /// Text written on the principal transaction record.
    pub fn ledger_description(&self) -> String {
        if let Some(description) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            return description.to_string();
        }
        match self.kind {
            RequestKind::Withdrawal => format!("Withdrawal {}", self.reference),
            RequestKind::Transfer => match (&self.to_account_number, &self.to_customer_name) {
                (Some(number), Some(name)) => format!("Transfer to {number} ({name})"),
                (Some(number), None) => format!("Transfer to {number}"),
                _ => format!("Transfer {}", self.reference),
            },
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Withdrawal,
    Transfer,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Withdrawal => "withdrawal",
            Self::Transfer => "transfer",
        }
    }
}

impl FromStr for RequestKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "withdrawal" => Ok(Self::Withdrawal),
            "transfer" => Ok(Self::Transfer),
            other => Err(StoreError::invalid_enum("type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl FromStr for RequestStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(StoreError::invalid_enum("status", other)),
        }
    }
}

/// Outcome written when a pending request is approved or rejected.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub status: RequestStatus,
    pub actor: Uuid,
    pub at: DateTime<Utc>,
    pub charge_applied: Decimal,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReversalMark {
    pub actor: Uuid,
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// Validated listing filter.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFilter {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub status: Option<RequestStatus>,
    pub kind: Option<RequestKind>,
}

impl Default for RequestFilter {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            search: None,
            status: None,
            kind: None,
        }
    }
}

impl RequestFilter {
    pub fn new(
        page: Option<u32>,
        limit: Option<u32>,
        search: Option<String>,
        status: Option<&str>,
        kind: Option<&str>,
    ) -> Result<Self, LedgerError> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(LedgerError::validation("page must be at least 1"));
        }
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(LedgerError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        let status = match status.filter(|s| !s.is_empty() && *s != "all") {
            Some(raw) => Some(
                raw.parse::<RequestStatus>()
                    .map_err(|_| LedgerError::validation(format!("unknown status: {raw}")))?,
            ),
            None => None,
        };
        let kind = match kind.filter(|k| !k.is_empty() && *k != "all") {
            Some(raw) => Some(
                raw.parse::<RequestKind>()
                    .map_err(|_| LedgerError::validation(format!("unknown type: {raw}")))?,
            ),
            None => None,
        };
        let search = search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(Self {
            page,
            limit,
            search,
            status,
            kind,
        })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    #[serde(flatten)]
    pub request: WithdrawalRequest,
    pub account_number: String,
    pub customer_name: Option<String>,
}

impl RequestSummary {
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        let request = &self.request;
        [
            Some(request.reference.as_str()),
            request.description.as_deref(),
            request.to_account_number.as_deref(),
            request.to_customer_name.as_deref(),
            Some(self.account_number.as_str()),
            self.customer_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: u64,
    pub approved: u64,
    pub pending: u64,
    pub rejected: u64,
}

impl StatusCounts {
    pub fn add(&mut self, status: RequestStatus) {
        self.total += 1;
        match status {
            RequestStatus::Approved => self.approved += 1,
            RequestStatus::Pending => self.pending += 1,
            RequestStatus::Rejected => self.rejected += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestPage {
    pub items: Vec<RequestSummary>,
    /// Number of requests matching the filter, across all pages.
    pub total: u64,
    /// Status breakdown over every request in the store.
    pub counts: StatusCounts,
}
