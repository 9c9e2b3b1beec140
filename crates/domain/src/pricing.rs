//! Tiered discount policy.
//!
//! Tiers are evaluated from the highest threshold down so the first match is
//! always the largest applicable discount.

use common::Money;
use serde::{Deserialize, Serialize};

/// A discount rate in basis points (1/100 of a percent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct DiscountRate(u32);

impl DiscountRate {
    pub const NONE: DiscountRate = DiscountRate(0);

    /// Creates a rate from whole percent.
    pub const fn from_percent(percent: u32) -> Self {
        Self(percent * 100)
    }

    /// Creates a rate from basis points, capped at 100%.
    pub const fn from_basis_points(bps: u32) -> Self {
        if bps > 10_000 { Self(10_000) } else { Self(bps) }
    }

    pub const fn basis_points(&self) -> u32 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Discount amount for the given (undiscounted) subtotal.
    pub const fn of(&self, subtotal: Money) -> Money {
        subtotal.basis_points(self.0)
    }
}

impl std::fmt::Display for DiscountRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "{}%", self.0 / 100)
        } else {
            write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
        }
    }
}

/// One row of the discount table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountTier {
    /// Minimum subtotal (inclusive) for the tier to apply.
    pub threshold: Money,
    pub rate: DiscountRate,
    pub label: &'static str,
}

/// Discount tiers, sorted by descending threshold.
pub const DISCOUNT_TIERS: [DiscountTier; 3] = [
    DiscountTier {
        threshold: Money::from_units(2_000),
        rate: DiscountRate::from_percent(20),
        label: "20% (purchase of $2,000 or more)",
    },
    DiscountTier {
        threshold: Money::from_units(1_000),
        rate: DiscountRate::from_percent(15),
        label: "15% (purchase of $1,000 or more)",
    },
    DiscountTier {
        threshold: Money::from_units(500),
        rate: DiscountRate::from_percent(10),
        label: "10% (purchase of $500 or more)",
    },
];

/// Returns the highest tier whose threshold the subtotal reaches.
pub fn tier_for(subtotal: Money) -> Option<&'static DiscountTier> {
    DISCOUNT_TIERS.iter().find(|tier| subtotal >= tier.threshold)
}

/// Rate selected by the tier table, zero when no tier applies.
pub fn tier_rate(subtotal: Money) -> DiscountRate {
    tier_for(subtotal).map_or(DiscountRate::NONE, |tier| tier.rate)
}

/// Discount amount selected by the tier table.
pub fn tier_discount(subtotal: Money) -> Money {
    tier_rate(subtotal).of(subtotal)
}
