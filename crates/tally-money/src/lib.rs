//! # tally-money
//! Currency-tagged fixed-point amounts.
//!
//! Amounts are held in minor units as `i128`. Arithmetic between values of
//! different currencies is a typed error, never a silent coercion, and
//! overflow is reported rather than wrapped.

pub mod currency;
pub mod error;
pub mod exchange;
pub mod value;

pub use currency::{CryptoCurrency, Currency, FiatCurrency, MAX_PRECISION};
pub use error::MoneyError;
pub use exchange::MoneyValuePair;
pub use rust_decimal::{Decimal, RoundingStrategy};
pub use value::MoneyValue;
