//! Money amounts in integer cents.

use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Zero money.
    pub const ZERO: Money = Money { cents: 0 };

    /// Creates a new Money amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a whole-unit value.
    pub const fn from_units(units: i64) -> Self {
        Self { cents: units * 100 }
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self::ZERO
    }

    /// Returns the amount in cents.
    pub const fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the whole-unit portion.
    pub const fn units(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after whole units).
    pub const fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    pub const fn is_positive(&self) -> bool {
        self.cents > 0
    }

    pub const fn is_zero(&self) -> bool {
        self.cents == 0
    }

    pub const fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity.
    pub const fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents * quantity as i64,
        }
    }

    /// Returns the given share of this amount, expressed in basis points
    /// (1/100 of a percent), rounded half away from zero to the nearest cent.
    pub const fn basis_points(&self, bps: u32) -> Money {
        let scaled = self.cents as i128 * bps as i128;
        let rounded = if scaled >= 0 {
            (scaled + 5_000) / 10_000
        } else {
            (scaled - 5_000) / 10_000
        };
        Money {
            cents: rounded as i64,
        }
    }

    /// Parses a non-negative decimal amount such as `12`, `12.5` or `$12.50`.
    ///
    /// More than two decimal places is rejected rather than rounded.
    pub fn parse(input: &str) -> Option<Money> {
        let input = input.trim();
        let input = input.strip_prefix('$').unwrap_or(input);
        let (units, fraction) = match input.split_once('.') {
            Some((units, fraction)) => (units, fraction),
            None => (input, ""),
        };
        if units.is_empty() && fraction.is_empty() {
            return None;
        }
        if fraction.len() > 2 || !units.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit())
        {
            return None;
        }

        let units: i64 = if units.is_empty() { 0 } else { units.parse().ok()? };
        let cents: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().ok()? * 10,
            _ => fraction.parse().ok()?,
        };
        Some(Money::from_cents(units.checked_mul(100)?.checked_add(cents)?))
    }

    /// Absolute difference between two amounts.
    pub const fn abs_diff(&self, other: Money) -> Money {
        Money {
            cents: (self.cents - other.cents).abs(),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.units().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.units(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents - rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.cents -= rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_from_cents() {
        let money = Money::from_cents(1234);
        assert_eq!(money.cents(), 1234);
        assert_eq!(money.units(), 12);
        assert_eq!(money.cents_part(), 34);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "$12.34");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.multiply(3).cents(), 3000);
    }

    #[test]
    fn test_basis_points_rounds_to_nearest_cent() {
        assert_eq!(Money::from_units(650).basis_points(1_000), Money::from_units(65));
        // 10% of 0.05 = 0.005 -> 0.01
        assert_eq!(Money::from_cents(5).basis_points(1_000).cents(), 1);
        // 15% of 19.99 = 2.9985 -> 3.00
        assert_eq!(Money::from_cents(1999).basis_points(1_500).cents(), 300);
        assert_eq!(Money::from_units(100).basis_points(0), Money::ZERO);
    }

    #[test]
    fn test_sum_and_abs_diff() {
        let total: Money = [Money::from_cents(100), Money::from_cents(250)]
            .into_iter()
            .sum();
        assert_eq!(total.cents(), 350);
        assert_eq!(Money::from_cents(100).abs_diff(Money::from_cents(350)).cents(), 250);
    }

    #[test]
    fn test_parse_decimal_amounts() {
        assert_eq!(Money::parse("12"), Some(Money::from_units(12)));
        assert_eq!(Money::parse(" 12.5 "), Some(Money::from_cents(1250)));
        assert_eq!(Money::parse("$0.05"), Some(Money::from_cents(5)));
        assert_eq!(Money::parse(".75"), Some(Money::from_cents(75)));
        assert_eq!(Money::parse("1.234"), None);
        assert_eq!(Money::parse("-3"), None);
        assert_eq!(Money::parse("abc"), None);
        assert_eq!(Money::parse(""), None);
    }

    #[test]
    fn test_serializes_as_cents() {
        let json = serde_json::to_string(&Money::from_cents(58_500)).unwrap();
        assert_eq!(json, "58500");
    }
}
