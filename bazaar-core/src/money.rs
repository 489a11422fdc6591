use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// An amount in currency minor units (e.g. cents).
///
/// Integer arithmetic only; the money path never touches floating point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `self * quantity`, `None` on overflow.
    pub fn checked_mul(self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Rounds `self * bps / 10_000` half-up (away from zero for negatives).
    pub fn apply_basis_points(self, bps: u32) -> Money {
        let scaled = i128::from(self.0) * i128::from(bps);
        let half = 5_000i128;
        let rounded = if scaled >= 0 {
            (scaled + half) / 10_000
        } else {
            (scaled - half) / 10_000
        };
        Money(rounded as i64)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basis_points_round_half_up() {
        assert_eq!(Money::from_minor(200).apply_basis_points(1000), Money::from_minor(20));
        assert_eq!(Money::from_minor(5).apply_basis_points(1000), Money::from_minor(1));
        assert_eq!(Money::from_minor(4).apply_basis_points(1000), Money::from_minor(0));
        assert_eq!(Money::from_minor(15).apply_basis_points(1000), Money::from_minor(2));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor(25_050).to_string(), "250.50");
        assert_eq!(Money::from_minor(-7).to_string(), "-0.07");
    }

    #[test]
    fn test_checked_mul_overflow() {
        assert_eq!(Money::from_minor(i64::MAX).checked_mul(2), None);
        assert_eq!(Money::from_minor(100).checked_mul(3), Some(Money::from_minor(300)));
    }
}
