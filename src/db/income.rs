use std::{collections::BTreeMap, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StoreError;
use crate::error::LedgerError;

/// Revenue recognized (positive) or reversed (negative) by the bank itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankIncomeRecord {
    pub id: Uuid,
    pub kind: IncomeKind,
    pub amount: Decimal,
    pub source_id: Uuid,
    pub source_kind: SourceKind,
    pub account_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub accrual_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeKind {
    WithdrawalCharge,
    LoanInterest,
    TransferFee,
    Other,
}

impl IncomeKind {
    pub const ALL: [IncomeKind; 4] = [
        Self::WithdrawalCharge,
        Self::LoanInterest,
        Self::TransferFee,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WithdrawalCharge => "withdrawal_charge",
            Self::LoanInterest => "loan_interest",
            Self::TransferFee => "transfer_fee",
            Self::Other => "other",
        }
    }
}

impl FromStr for IncomeKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "withdrawal_charge" => Ok(Self::WithdrawalCharge),
            "loan_interest" => Ok(Self::LoanInterest),
            "transfer_fee" => Ok(Self::TransferFee),
            "other" => Ok(Self::Other),
            other => Err(StoreError::invalid_enum("income_kind", other)),
        }
    }
}

/// What produced an income record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    WithdrawalRequest,
    Loan,
    Reconciliation,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WithdrawalRequest => "withdrawal_request",
            Self::Loan => "loan",
            Self::Reconciliation => "reconciliation",
        }
    }
}

impl FromStr for SourceKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "withdrawal_request" => Ok(Self::WithdrawalRequest),
            "loan" => Ok(Self::Loan),
            "reconciliation" => Ok(Self::Reconciliation),
            other => Err(StoreError::invalid_enum("source_kind", other)),
        }
    }
}

/// Inclusive time window; either bound may be left open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Result<Self, LedgerError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(LedgerError::validation("`from` must not be after `to`"));
            }
        }
        Ok(Self { from, to })
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn from(&self) -> Option<DateTime<Utc>> {
        self.from
    }

    pub fn to(&self) -> Option<DateTime<Utc>> {
        self.to
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindTotal {
    pub amount: Decimal,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeStats {
    pub total_amount: Decimal,
    pub total_count: u64,
    pub breakdown_by_kind: BTreeMap<IncomeKind, KindTotal>,
}

impl IncomeStats {
    /// Folds records into totals. Every kind appears in the breakdown, even at zero.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a BankIncomeRecord>) -> Self {
        let mut stats = Self {
            breakdown_by_kind: IncomeKind::ALL
                .into_iter()
                .map(|kind| (kind, KindTotal::default()))
                .collect(),
            ..Self::default()
        };
        for record in records {
            stats.total_amount += record.amount;
            stats.total_count += 1;
            let entry = stats.breakdown_by_kind.entry(record.kind).or_default();
            entry.amount += record.amount;
            entry.count += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn record(kind: IncomeKind, amount: Decimal) -> BankIncomeRecord {
        BankIncomeRecord {
            id: Uuid::new_v4(),
            kind,
            amount,
            source_id: Uuid::new_v4(),
            source_kind: SourceKind::WithdrawalRequest,
            account_id: None,
            customer_id: None,
            accrual_date: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn inverted_range_is_rejected() {
        let now = Utc::now();
        assert!(DateRange::new(Some(now), Some(now - Duration::days(1))).is_err());
        assert!(DateRange::new(Some(now), Some(now)).is_ok());
    }

    #[test]
    fn open_range_contains_everything() {
        assert!(DateRange::all().contains(Utc::now()));
    }

    #[test]
    fn stats_net_out_reversals() {
        let records = [
            record(IncomeKind::WithdrawalCharge, dec!(5)),
            record(IncomeKind::WithdrawalCharge, dec!(-5)),
            record(IncomeKind::LoanInterest, dec!(0.3288)),
        ];

        let stats = IncomeStats::from_records(&records);

        assert_eq!(stats.total_amount, dec!(0.3288));
        assert_eq!(stats.total_count, 3);
        let charges = stats.breakdown_by_kind[&IncomeKind::WithdrawalCharge];
        assert_eq!(charges.amount, dec!(0));
        assert_eq!(charges.count, 2);
        assert_eq!(stats.breakdown_by_kind[&IncomeKind::Other], KindTotal::default());
    }
}
