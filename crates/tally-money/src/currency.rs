//! Currency descriptors.
//!
//! A currency is identified by its code and minor-unit precision. Two values
//! share a currency only when every field matches, so a token that reuses a
//! ticker with a different precision is still a distinct currency.

use std::fmt;

/// Largest supported minor-unit precision. Keeps `10^precision` well inside
/// the `i128` range.
pub const MAX_PRECISION: u32 = 30;

/// An on-chain asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CryptoCurrency {
    code: &'static str,
    precision: u32,
    display_precision: u32,
}

impl CryptoCurrency {
    pub const BTC: Self = Self::new("BTC", 8, 8);
    pub const ETH: Self = Self::new("ETH", 18, 8);

    /// Describe a crypto asset.
    ///
    /// # Panics
    /// If `precision` exceeds [`MAX_PRECISION`]. For the associated constants
    /// this is checked at compile time.
    pub const fn new(code: &'static str, precision: u32, display_precision: u32) -> Self {
        assert!(precision <= MAX_PRECISION, "precision out of range");
        Self { code, precision, display_precision }
    }
}

/// A government-issued currency used for display and conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiatCurrency {
    code: &'static str,
    precision: u32,
}

impl FiatCurrency {
    pub const USD: Self = Self::new("USD", 2);
    pub const EUR: Self = Self::new("EUR", 2);
    pub const GBP: Self = Self::new("GBP", 2);

    /// Describe a fiat currency. Fiat display precision equals its precision.
    pub const fn new(code: &'static str, precision: u32) -> Self {
        assert!(precision <= MAX_PRECISION, "precision out of range");
        Self { code, precision }
    }
}

/// Either a crypto asset or a fiat currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Currency {
    Crypto(CryptoCurrency),
    Fiat(FiatCurrency),
}

impl Currency {
    pub const BTC: Self = Self::Crypto(CryptoCurrency::BTC);
    pub const ETH: Self = Self::Crypto(CryptoCurrency::ETH);
    pub const USD: Self = Self::Fiat(FiatCurrency::USD);
    pub const EUR: Self = Self::Fiat(FiatCurrency::EUR);
    pub const GBP: Self = Self::Fiat(FiatCurrency::GBP);

    const KNOWN: [Self; 5] = [Self::BTC, Self::ETH, Self::USD, Self::EUR, Self::GBP];

    /// Look up one of the built-in currencies by code (case-insensitive).
    pub fn from_code(code: &str) -> Option<Self> {
        Self::KNOWN
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code.trim()))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Crypto(c) => c.code,
            Self::Fiat(f) => f.code,
        }
    }

    /// Number of decimal places in one major unit.
    pub fn precision(&self) -> u32 {
        match self {
            Self::Crypto(c) => c.precision,
            Self::Fiat(f) => f.precision,
        }
    }

    /// Decimal places shown to users.
    pub fn display_precision(&self) -> u32 {
        match self {
            Self::Crypto(c) => c.display_precision.min(c.precision),
            Self::Fiat(f) => f.precision,
        }
    }

    /// Minor units per major unit (`10^precision`).
    pub fn scale(&self) -> i128 {
        10i128.pow(self.precision())
    }

    pub fn is_crypto(&self) -> bool {
        matches!(self, Self::Crypto(_))
    }

    pub fn is_fiat(&self) -> bool {
        matches!(self, Self::Fiat(_))
    }
}

impl From<CryptoCurrency> for Currency {
    fn from(c: CryptoCurrency) -> Self {
        Self::Crypto(c)
    }
}

impl From<FiatCurrency> for Currency {
    fn from(f: FiatCurrency) -> Self {
        Self::Fiat(f)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
