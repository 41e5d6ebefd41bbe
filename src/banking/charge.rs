use rust_decimal::Decimal;

use crate::db::request::RequestKind;

/// Fractional digits kept on balances and ledger amounts (`NUMERIC(18, 2)`).
pub const MONEY_SCALE: u32 = 2;
/// Exclusive upper bound of a ledger amount, 10^16.
pub const MONEY_LIMIT: Decimal = Decimal::from_parts(1_874_919_424, 2_328_306, 0, false, 0);

/// Flat fee debited on top of every approved withdrawal.
pub const DEFAULT_WITHDRAWAL_CHARGE: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// Fee schedule for withdrawal requests.
///
/// Withdrawals carry a flat charge; transfers are free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChargeCalculator {
    withdrawal_charge: Decimal,
}

impl Default for ChargeCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_WITHDRAWAL_CHARGE)
    }
}

impl ChargeCalculator {
    pub fn new(withdrawal_charge: Decimal) -> Self {
        Self { withdrawal_charge }
    }

    pub fn fee_for(&self, kind: RequestKind) -> Decimal {
        match kind {
            RequestKind::Withdrawal => self.withdrawal_charge,
            RequestKind::Transfer => Decimal::ZERO,
        }
    }
}
