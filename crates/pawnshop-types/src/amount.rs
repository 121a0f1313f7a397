//! Fixed-precision atomic amounts - no floating point on the settlement path.
//!
//! Every on-chain quantity (prices, token ids, timestamps) is an
//! [`AtomicAmount`]. Decimal strings only enter through
//! [`Currency::parse_currency`], which is reserved for user input fields, and
//! only leave through [`Currency::format_currency`] for display.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{PawnError, Result};

/// Decimal places of the network's standard unit (1 ALGO = 10^6 microALGO).
pub const STANDARD_DECIMALS: u32 = 6;

/// Integer-denominated on-chain value.
///
/// # Examples
///
/// ```
/// use pawnshop_types::{AtomicAmount, Currency};
///
/// let algo = Currency::algo();
/// let price = algo.parse_currency("100.5").unwrap();
/// assert_eq!(price, AtomicAmount::new(100_500_000));
/// assert_eq!(algo.format_currency(price, 2), "100.50");
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AtomicAmount(u64);

impl AtomicAmount {
    /// Zero.
    pub const ZERO: Self = AtomicAmount(0);
    /// Largest representable value.
    pub const MAX: Self = AtomicAmount(u64::MAX);

    /// Create from a raw atomic value.
    #[inline]
    pub const fn new(value: u64) -> Self {
        AtomicAmount(value)
    }

    /// Raw atomic value.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Parse a plain non-negative integer such as a token id or timestamp.
    ///
    /// No decimal scaling is applied.
    pub fn parse_integer(field: &str, s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PawnError::invalid_input(
                field,
                format!("'{}' is not a non-negative integer", s),
            ));
        }
        s.parse::<u64>()
            .map(AtomicAmount)
            .map_err(|_| PawnError::invalid_input(field, format!("'{}' is out of range", s)))
    }

    /// Checked addition - `None` on overflow.
    #[inline]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(AtomicAmount)
    }

    /// Checked subtraction - `None` if the result would be negative.
    #[inline]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(AtomicAmount)
    }

    /// Saturating subtraction, floors at zero.
    #[inline]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        AtomicAmount(self.0.saturating_sub(rhs.0))
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AtomicAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AtomicAmount {
    fn from(value: u64) -> Self {
        AtomicAmount(value)
    }
}

/// A display unit: symbol plus the number of decimals between the standard
/// unit and the atomic unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    pub symbol: String,
    pub decimals: u32,
}

impl Currency {
    pub fn new(symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
        }
    }

    /// The Algorand standard unit.
    pub fn algo() -> Self {
        Self::new("ALGO", STANDARD_DECIMALS)
    }

    fn scale(&self) -> Result<u64> {
        10u64.checked_pow(self.decimals).ok_or_else(|| {
            PawnError::internal(format!("{} decimals do not fit in 64 bits", self.decimals))
        })
    }

    /// Parse a human decimal string like `"50.25"` or `"100"` into atomic units.
    ///
    /// At most `decimals` fractional digits are accepted; signs, exponents and
    /// empty parts are rejected.
    pub fn parse_currency(&self, s: &str) -> Result<AtomicAmount> {
        let field = self.symbol.as_str();
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (s, ""),
        };
        let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !digits(whole) || !digits(frac) || (s.ends_with('.')) {
            return Err(PawnError::invalid_input(
                field,
                format!("'{}' is not a decimal amount", s),
            ));
        }
        if frac.len() > self.decimals as usize {
            return Err(PawnError::invalid_input(
                field,
                format!("too many decimal places in '{}' (max {})", s, self.decimals),
            ));
        }

        let overflow = || PawnError::invalid_input(field, format!("'{}' is out of range", s));
        let whole_val: u64 = whole.parse().map_err(|_| overflow())?;
        let frac_val: u64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = self.decimals as usize);
            padded.parse().map_err(|_| overflow())?
        };

        whole_val
            .checked_mul(self.scale()?)
            .and_then(|v| v.checked_add(frac_val))
            .map(AtomicAmount)
            .ok_or_else(overflow)
    }

    /// Format atomic units with exactly `precision` fractional digits.
    ///
    /// Digits beyond the currency's decimals are zero; digits below
    /// `precision` are truncated, never rounded.
    pub fn format_currency(&self, amount: AtomicAmount, precision: u32) -> String {
        let decimals = self.decimals as usize;
        let raw = format!("{:0>width$}", amount.value(), width = decimals + 1);
        let (whole, frac) = raw.split_at(raw.len() - decimals);
        if precision == 0 {
            return whole.to_string();
        }
        let mut frac: String = frac.chars().take(precision as usize).collect();
        while frac.len() < precision as usize {
            frac.push('0');
        }
        format!("{}.{}", whole, frac)
    }

    /// Format for people: full precision, trailing zeros stripped, symbol appended.
    pub fn to_display_string(&self, amount: AtomicAmount) -> String {
        let s = self.format_currency(amount, self.decimals);
        let s = if s.contains('.') {
            s.trim_end_matches('0').trim_end_matches('.')
        } else {
            s.as_str()
        };
        format!("{} {}", s, self.symbol)
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::algo()
    }
}
