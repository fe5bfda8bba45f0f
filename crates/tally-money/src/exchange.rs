//! Currency conversion through explicit exchange rates.
//!
//! No implicit conversion exists anywhere in the crate: the caller always
//! supplies the rate, and the rate's currency decides the result's currency.

use crate::currency::Currency;
use crate::error::MoneyError;
use crate::value::MoneyValue;

/// Divide rounding half-to-even. `denominator` must be positive.
fn div_round_half_even(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = (numerator % denominator).unsigned_abs();
    let step = numerator.signum();
    match (remainder * 2).cmp(&denominator.unsigned_abs()) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + step,
        std::cmp::Ordering::Equal if quotient % 2 == 0 => quotient,
        std::cmp::Ordering::Equal => quotient + step,
    }
}

impl MoneyValue {
    /// Convert using `rate`: the price of one major unit of `self`'s
    /// currency, denominated in the target currency.
    ///
    /// Same-currency conversion returns `self`. A zero operand yields zero in
    /// the target currency without touching the rate.
    pub fn convert(&self, rate: &MoneyValue) -> Result<MoneyValue, MoneyError> {
        let target = rate.currency();
        if self.currency() == target {
            return Ok(*self);
        }
        if self.is_zero() || rate.is_zero() {
            return Ok(MoneyValue::zero(target));
        }
        let product = self
            .amount()
            .checked_mul(rate.amount())
            .ok_or(MoneyError::Overflow)?;
        Ok(MoneyValue::from_minor(
            div_round_half_even(product, self.currency().scale()),
            target,
        ))
    }

    /// Inverse of [`convert`](Self::convert): `rate` is the price of one major
    /// unit of `target`, denominated in `self`'s currency.
    pub fn convert_inverse(&self, rate: &MoneyValue, target: Currency) -> Result<MoneyValue, MoneyError> {
        if rate.currency() != self.currency() {
            return Err(MoneyError::MismatchedCurrency {
                lhs: self.currency(),
                rhs: rate.currency(),
            });
        }
        if self.currency() == target {
            return Ok(*self);
        }
        if self.is_zero() {
            return Ok(MoneyValue::zero(target));
        }
        if rate.is_zero() {
            return Err(MoneyError::DivideByZero);
        }
        let scaled = self
            .amount()
            .checked_mul(target.scale())
            .ok_or(MoneyError::Overflow)?;
        let (numerator, denominator) = if rate.is_negative() {
            (scaled.checked_neg().ok_or(MoneyError::Overflow)?, -rate.amount())
        } else {
            (scaled, rate.amount())
        };
        Ok(MoneyValue::from_minor(
            div_round_half_even(numerator, denominator),
            target,
        ))
    }
}

/// A quoted exchange: `base` is worth `quote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoneyValuePair {
    pub base: MoneyValue,
    pub quote: MoneyValue,
}

impl MoneyValuePair {
    pub fn new(base: MoneyValue, quote: MoneyValue) -> Self {
        Self { base, quote }
    }

    /// A pair quoting one major unit of `base` at `quote`.
    pub fn exchange_rate(base: Currency, quote: MoneyValue) -> Self {
        Self::new(MoneyValue::one(base), quote)
    }

    /// Swap sides.
    pub fn inverse(&self) -> Self {
        Self::new(self.quote, self.base)
    }

    /// Convert `value` from the base currency to the quote currency.
    ///
    /// A value already in the quote currency is returned unchanged; any
    /// other currency fails with [`MoneyError::MismatchedCurrency`].
    pub fn convert(&self, value: &MoneyValue) -> Result<MoneyValue, MoneyError> {
        let target = self.quote.currency();
        if value.currency() == target {
            return Ok(*value);
        }
        if value.currency() != self.base.currency() {
            return Err(MoneyError::MismatchedCurrency {
                lhs: value.currency(),
                rhs: self.base.currency(),
            });
        }
        if value.is_zero() || self.quote.is_zero() {
            return Ok(MoneyValue::zero(target));
        }
        if self.base.is_zero() {
            return Err(MoneyError::DivideByZero);
        }
        let product = value
            .amount()
            .checked_mul(self.quote.amount())
            .ok_or(MoneyError::Overflow)?;
        let (numerator, denominator) = if self.base.is_negative() {
            (product.checked_neg().ok_or(MoneyError::Overflow)?, -self.base.amount())
        } else {
            (product, self.base.amount())
        };
        Ok(MoneyValue::from_minor(
            div_round_half_even(numerator, denominator),
            target,
        ))
    }
}
