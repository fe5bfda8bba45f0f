//! Money error types.
use thiserror::Error;

use crate::currency::Currency;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// Operands carry different currencies.
    #[error("mismatched currencies: {lhs} and {rhs}")]
    MismatchedCurrency { lhs: Currency, rhs: Currency },

    #[error("division by zero")]
    DivideByZero,

    /// Result does not fit the minor-unit range.
    #[error("arithmetic overflow")]
    Overflow,
}
