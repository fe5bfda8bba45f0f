//! The `MoneyValue` type and its checked arithmetic.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::currency::Currency;
use crate::error::MoneyError;

/// An immutable amount of a single currency, stored in minor units.
///
/// Every binary operation checks that both operands share a currency and
/// fails with [`MoneyError::MismatchedCurrency`] otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoneyValue {
    amount: i128,
    currency: Currency,
}

impl MoneyValue {
    /// Create a value from an amount in minor units (satoshi, wei, cents).
    pub const fn from_minor(amount: i128, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub const fn zero(currency: Currency) -> Self {
        Self::from_minor(0, currency)
    }

    /// One major unit of `currency`.
    pub fn one(currency: Currency) -> Self {
        Self::from_minor(currency.scale(), currency)
    }

    /// Parse a minor-unit integer string such as `"1500"`.
    pub fn create_minor(minor: &str, currency: Currency) -> Option<Self> {
        minor
            .trim()
            .parse::<i128>()
            .ok()
            .map(|amount| Self::from_minor(amount, currency))
    }

    /// Parse a major-unit decimal string such as `"0.015"`.
    ///
    /// Returns `None` when the string is not a number or carries more
    /// fractional digits than the currency can represent.
    pub fn create_major(major: &str, currency: Currency) -> Option<Self> {
        let decimal = Decimal::from_str(major.trim()).ok()?;
        Self::from_major(decimal, currency)
    }

    /// Convert a major-unit decimal exactly, or `None` if it does not fit.
    pub fn from_major(major: Decimal, currency: Currency) -> Option<Self> {
        let normalized = major.normalize();
        let scale = normalized.scale();
        let precision = currency.precision();
        if scale > precision {
            return None;
        }
        let factor = 10i128.checked_pow(precision - scale)?;
        normalized
            .mantissa()
            .checked_mul(factor)
            .map(|amount| Self::from_minor(amount, currency))
    }

    /// Amount in minor units.
    pub fn amount(&self) -> i128 {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    pub fn is_negative(&self) -> bool {
        self.amount < 0
    }

    /// The amount as an exact major-unit decimal, if it fits `Decimal`'s
    /// 96-bit mantissa.
    pub fn to_major_decimal(&self) -> Option<Decimal> {
        Decimal::try_from_i128_with_scale(self.amount, self.currency.precision()).ok()
    }

    pub fn try_negate(&self) -> Result<Self, MoneyError> {
        self.amount
            .checked_neg()
            .map(|amount| Self::from_minor(amount, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    // ── Arithmetic ────────────────────────────────────────────────────────────

    pub fn try_add(&self, other: &Self) -> Result<Self, MoneyError> {
        self.ensure_comparable(other)?;
        self.amount
            .checked_add(other.amount)
            .map(|amount| Self::from_minor(amount, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    pub fn try_sub(&self, other: &Self) -> Result<Self, MoneyError> {
        self.ensure_comparable(other)?;
        self.amount
            .checked_sub(other.amount)
            .map(|amount| Self::from_minor(amount, self.currency))
            .ok_or(MoneyError::Overflow)
    }

    /// Multiply two major-unit quantities: `(a * b) / 10^precision`,
    /// truncated toward zero.
    pub fn try_mul(&self, other: &Self) -> Result<Self, MoneyError> {
        self.ensure_comparable(other)?;
        let product = self
            .amount
            .checked_mul(other.amount)
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::from_minor(product / self.currency.scale(), self.currency))
    }

    /// Divide two major-unit quantities: `(a * 10^precision) / b`, truncated
    /// toward zero.
    pub fn try_div(&self, other: &Self) -> Result<Self, MoneyError> {
        self.ensure_comparable(other)?;
        if other.amount == 0 {
            return Err(MoneyError::DivideByZero);
        }
        let scaled = self
            .amount
            .checked_mul(self.currency.scale())
            .ok_or(MoneyError::Overflow)?;
        Ok(Self::from_minor(scaled / other.amount, self.currency))
    }

    pub fn try_cmp(&self, other: &Self) -> Result<Ordering, MoneyError> {
        self.ensure_comparable(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    pub fn try_max(&self, other: &Self) -> Result<Self, MoneyError> {
        Ok(match self.try_cmp(other)? {
            Ordering::Less => *other,
            _ => *self,
        })
    }

    pub fn try_min(&self, other: &Self) -> Result<Self, MoneyError> {
        Ok(match self.try_cmp(other)? {
            Ordering::Greater => *other,
            _ => *self,
        })
    }

    /// Ratio of `self` to `other`, rounded to four decimal places.
    pub fn percentage_in(&self, other: &Self) -> Result<Decimal, MoneyError> {
        self.ensure_comparable(other)?;
        if other.amount == 0 {
            return Err(MoneyError::DivideByZero);
        }
        let x = Decimal::try_from_i128_with_scale(self.amount, 0).map_err(|_| MoneyError::Overflow)?;
        let y = Decimal::try_from_i128_with_scale(other.amount, 0).map_err(|_| MoneyError::Overflow)?;
        x.checked_div(y)
            .map(|ratio| ratio.round_dp(4))
            .ok_or(MoneyError::Overflow)
    }

    // ── Display ───────────────────────────────────────────────────────────────

    /// Round for presentation. Lossy: never feed the result back into a
    /// calculation that moves funds.
    pub fn displayable_rounding(
        &self,
        decimal_places: u32,
        strategy: RoundingStrategy,
    ) -> Result<Self, MoneyError> {
        if decimal_places >= self.currency.precision() {
            return Ok(*self);
        }
        let major = self.to_major_decimal().ok_or(MoneyError::Overflow)?;
        let rounded = major.round_dp_with_strategy(decimal_places, strategy);
        Self::from_major(rounded, self.currency).ok_or(MoneyError::Overflow)
    }

    /// True if the value is at least one unit of the currency's display
    /// precision. An account can still hold dust below that.
    pub fn has_positive_displayable_balance(&self) -> bool {
        let hidden = self.currency.precision() - self.currency.display_precision();
        self.amount >= 10i128.pow(hidden)
    }

    /// Render at display precision with a fixed number of decimals, e.g.
    /// `"12.35 USD"`.
    pub fn display_string(&self) -> String {
        let places = self.currency.display_precision();
        // Amounts past Decimal's range cannot be rounded; they are truncated
        // by the shift below instead.
        let rounded = match self.displayable_rounding(places, RoundingStrategy::MidpointNearestEven) {
            Ok(rounded) => rounded,
            Err(_) => *self,
        };
        let shift = self.currency.precision() - places;
        let amount = rounded.amount / 10i128.pow(shift);
        format!(
            "{} {}",
            format_fixed(amount, places, false),
            self.currency.code()
        )
    }

    fn ensure_comparable(&self, other: &Self) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::MismatchedCurrency {
                lhs: self.currency,
                rhs: other.currency,
            });
        }
        Ok(())
    }
}

/// Format `amount` minor units with `places` decimals, optionally dropping
/// trailing zeros.
fn format_fixed(amount: i128, places: u32, trim: bool) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let magnitude = amount.unsigned_abs();
    let scale = 10u128.pow(places);
    let whole = magnitude / scale;
    let fraction = magnitude % scale;
    if places == 0 || (trim && fraction == 0) {
        return format!("{sign}{whole}");
    }
    let digits = format!("{fraction:0width$}", width = places as usize);
    let digits = if trim { digits.trim_end_matches('0') } else { digits.as_str() };
    format!("{sign}{whole}.{digits}")
}

impl fmt::Display for MoneyValue {
    /// Full precision with trailing zeros removed, e.g. `"0.05 BTC"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            format_fixed(self.amount, self.currency.precision(), true),
            self.currency.code()
        )
    }
}
