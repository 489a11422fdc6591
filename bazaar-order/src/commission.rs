use bazaar_core::Money;

use crate::error::OrderError;

/// 10%.
pub const DEFAULT_COMMISSION_RATE_BPS: u32 = 1000;

const MAX_RATE_BPS: u32 = 10_000;

/// Platform commission and seller share of one line total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    pub commission: Money,
    pub seller_share: Money,
}

/// Splits line totals at a fixed rate. Commission is rounded half-up to the
/// minor unit and the seller gets the exact remainder, so the two parts always
/// add back up to the line total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionCalculator {
    rate_bps: u32,
}

impl CommissionCalculator {
    pub fn new(rate_bps: u32) -> Result<Self, OrderError> {
        if rate_bps > MAX_RATE_BPS {
            return Err(OrderError::Validation(format!(
                "commission rate {} bps exceeds {} bps",
                rate_bps, MAX_RATE_BPS
            )));
        }
        Ok(Self { rate_bps })
    }

    pub fn rate_bps(&self) -> u32 {
        self.rate_bps
    }

    pub fn split(&self, line_total: Money) -> CommissionSplit {
        let commission = line_total.apply_basis_points(self.rate_bps);
        CommissionSplit {
            commission,
            seller_share: line_total - commission,
        }
    }
}

impl Default for CommissionCalculator {
    fn default() -> Self {
        Self { rate_bps: DEFAULT_COMMISSION_RATE_BPS }
    }
}
