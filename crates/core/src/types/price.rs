//! Shopping cost amounts using decimal arithmetic.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A money amount in the family's currency.
///
/// Clients send plain JSON numbers. A zero cost carries the meaning "not
/// set" during merges, so [`Cost::is_unset`] is the test merge rules use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cost(Decimal);

impl Cost {
    /// The zero (unset) cost.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a cost from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a cost from a whole number of currency units.
    #[must_use]
    pub fn from_units(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the cost is zero and therefore treated as "not recorded".
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.0.is_zero()
    }

    /// Pick `incoming` unless it is unset, in which case keep `self`.
    #[must_use]
    pub fn or_keep(self, incoming: Self) -> Self {
        if incoming.is_unset() { self } else { incoming }
    }
}

impl Add for Cost {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Cost {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "¥{:.1}", self.0)
    }
}

impl From<Decimal> for Cost {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_or_keep_prefers_non_zero_incoming() {
        let stored = Cost::from_units(12);
        assert_eq!(stored.or_keep(Cost::ZERO), stored);
        assert_eq!(stored.or_keep(Cost::from_units(8)), Cost::from_units(8));
        assert_eq!(Cost::ZERO.or_keep(Cost::ZERO), Cost::ZERO);
    }

    #[test]
    fn test_deserialize_json_numbers() {
        let cost: Cost = serde_json::from_str("12").unwrap();
        assert_eq!(cost, Cost::from_units(12));
        let cost: Cost = serde_json::from_str("3.5").unwrap();
        assert_eq!(cost.amount(), Decimal::new(35, 1));
    }

    #[test]
    fn test_sum_and_display() {
        let total: Cost = [Cost::from_units(3), Cost::new(Decimal::new(45, 1))]
            .into_iter()
            .sum();
        assert_eq!(total.to_string(), "¥7.5");
    }
}
