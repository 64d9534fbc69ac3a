//! Tiered purchase discount.
//!
//! Amounts are minor units (cents) at this boundary. The two conditional bonuses
//! look at the amount in whole currency units, obtained by integer division
//! ([`Amount::whole`]), so `99_750` is checked as `997`.
//!
//! Percentages are basis points throughout, which keeps the rounding exact:
//! the discount is `amount * rate` rounded to the nearest cent, ties away from
//! zero.

use std::fmt;
use std::sync::LazyLock;

use crate::Amount;

/// A percentage in basis points (`500` = 5%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Percent(u32);

impl Percent {
    pub const ZERO: Percent = Percent(0);

    pub const fn from_basis_points(bp: u32) -> Self {
        Percent(bp)
    }

    pub const fn from_whole(percent: u32) -> Self {
        Percent(percent * 100)
    }

    pub const fn basis_points(self) -> u32 {
        self.0
    }

    /// `0.18` for 18%.
    pub fn as_fraction(self) -> f64 {
        f64::from(self.0) / 10_000.0
    }

    pub fn saturating_add(self, rhs: Percent) -> Percent {
        Percent(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            write!(f, "{whole}%")
        } else {
            write!(f, "{whole}.{frac:02}%")
        }
    }
}

/// Base rate applied from `floor` (inclusive) up to the next tier's floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    pub floor: Amount,
    pub rate: Percent,
}

/// Extra rate granted when the amount is strictly above `above`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bonus {
    pub above: Amount,
    pub rate: Percent,
}

/// Result of a discount computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discount {
    pub discount: Amount,
    pub final_amount: Amount,
    pub percent: Percent,
}

/// Discount configuration: base tiers, conditional bonuses and the overall cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountPolicy {
    /// Amounts below the lowest floor get no base discount.
    pub tiers: Vec<Tier>,
    /// Whole-unit amount is prime.
    pub prime_bonus: Bonus,
    /// Whole-unit amount ends in 5.
    pub ends_in_five_bonus: Bonus,
    pub cap: Percent,
}

const fn tier(floor: i64, percent: u32) -> Tier {
    Tier {
        floor: Amount::from_minor(floor),
        rate: Percent::from_whole(percent),
    }
}

/// Canonical table, minor units:
/// `20000..=50000` 5%, `50001..=80000` 7%, `80001..=120000` 10%, `120001..` 15%.
const DEFAULT_TIERS: [Tier; 4] = [
    tier(20_000, 5),
    tier(50_001, 7),
    tier(80_001, 10),
    tier(120_001, 15),
];

static DEFAULT_POLICY: LazyLock<DiscountPolicy> = LazyLock::new(DiscountPolicy::default);

impl Default for DiscountPolicy {
    fn default() -> Self {
        Self {
            tiers: DEFAULT_TIERS.to_vec(),
            prime_bonus: Bonus {
                above: Amount::from_minor(50_000),
                rate: Percent::from_whole(8),
            },
            ends_in_five_bonus: Bonus {
                above: Amount::from_minor(90_000),
                rate: Percent::from_whole(10),
            },
            cap: Percent::from_whole(20),
        }
    }
}

impl DiscountPolicy {
    /// Rate of the highest tier whose floor is at or below `amount`.
    pub fn base_rate(&self, amount: Amount) -> Percent {
        self.tiers
            .iter()
            .filter(|t| t.floor <= amount)
            .max_by_key(|t| t.floor)
            .map_or(Percent::ZERO, |t| t.rate)
    }

    /// Sum of the conditional bonuses that apply to `amount`.
    pub fn bonus_rate(&self, amount: Amount) -> Percent {
        let whole = amount.whole();
        let mut rate = Percent::ZERO;
        if amount > self.prime_bonus.above && is_prime(whole) {
            rate = rate.saturating_add(self.prime_bonus.rate);
        }
        if amount > self.ends_in_five_bonus.above && whole % 10 == 5 {
            rate = rate.saturating_add(self.ends_in_five_bonus.rate);
        }
        rate
    }

    /// Base plus bonuses, capped.
    pub fn rate(&self, amount: Amount) -> Percent {
        self.base_rate(amount)
            .saturating_add(self.bonus_rate(amount))
            .min(self.cap)
    }

    pub fn calculate(&self, amount: Amount) -> Discount {
        let percent = self.rate(amount);
        let discount = if amount.is_positive() {
            Amount::from_minor(round_share(amount.minor(), percent))
        } else {
            Amount::ZERO
        };
        Discount {
            discount,
            // discount never exceeds a positive amount, so this cannot underflow
            final_amount: Amount::from_minor(amount.minor() - discount.minor()),
            percent,
        }
    }
}

/// `amount * percent`, nearest integer, ties away from zero. `amount` is positive.
fn round_share(amount: i64, percent: Percent) -> i64 {
    let scaled = i128::from(amount) * i128::from(percent.basis_points());
    let rounded = (scaled + 5_000) / 10_000;
    // bounded by `amount` while the rate stays at or below 100%
    i64::try_from(rounded).unwrap_or(amount).min(amount)
}

/// Discount for `amount` under the canonical policy.
pub fn calculate_discount(amount: Amount) -> Discount {
    DEFAULT_POLICY.calculate(amount)
}

/// Trial division up to the integer square root.
pub fn is_prime(n: i64) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }
    let mut i = 3;
    while i <= n / i {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}
