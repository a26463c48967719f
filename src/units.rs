//! Conversion between wei and the 18-decimal MON display unit

use std::fmt;
use std::str::FromStr;

use ethers::types::U256;
use ethers::utils::WEI_IN_ETHER;

use crate::error::{ClientResult, GameClientError};

/// Number of fractional digits in the display unit
pub const DECIMALS: usize = 18;

/// A monetary quantity in wei.
///
/// The integer form is authoritative. The decimal form produced by
/// [`Amount::to_display`] parses back to the same value through
/// [`Amount::parse`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(U256);

impl Amount {
    pub fn from_wei(wei: impl Into<U256>) -> Self {
        Amount(wei.into())
    }

    pub fn wei(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Decimal MON string with trailing fractional zeros removed
    pub fn to_display(&self) -> String {
        to_decimal_string(self.0)
    }

    /// Parse a decimal MON string such as `"3"` or `"0.25"`
    pub fn parse(input: &str) -> ClientResult<Self> {
        parse_amount(input).map(Amount)
    }

    /// Convert a floating point MON value through its shortest decimal form
    pub fn from_f64(value: f64) -> ClientResult<Self> {
        if !value.is_finite() {
            return Err(GameClientError::invalid_amount(
                value.to_string(),
                "not a finite number",
            ));
        }
        if value.is_sign_negative() && value != 0.0 {
            return Err(GameClientError::invalid_amount(
                value.to_string(),
                "negative amounts are not allowed",
            ));
        }
        Self::parse(&value.abs().to_string())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display())
    }
}

impl FromStr for Amount {
    type Err = GameClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl serde::Serialize for Amount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<U256> for Amount {
    fn from(wei: U256) -> Self {
        Amount(wei)
    }
}

impl From<Amount> for U256 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Format wei as a decimal MON string
pub fn to_decimal_string(wei: U256) -> String {
    let (whole, fraction) = wei.div_mod(WEI_IN_ETHER);
    if fraction.is_zero() {
        return whole.to_string();
    }
    let fraction = format!("{:0>width$}", fraction.to_string(), width = DECIMALS);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// Parse a decimal MON string into wei without going through floating point
pub fn parse_amount(input: &str) -> ClientResult<U256> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(GameClientError::invalid_amount(input, "empty amount"));
    }
    if trimmed.starts_with('-') {
        return Err(GameClientError::invalid_amount(
            input,
            "negative amounts are not allowed",
        ));
    }
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(GameClientError::invalid_amount(input, "no digits"));
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(GameClientError::invalid_amount(input, "not a decimal number"));
    }
    if fraction.len() > DECIMALS {
        return Err(GameClientError::invalid_amount(
            input,
            format!("more than {DECIMALS} fractional digits"),
        ));
    }

    let overflow = || GameClientError::invalid_amount(input, "amount does not fit in 256 bits");
    let whole = if whole.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(whole).map_err(|_| overflow())?
    };
    let fraction = if fraction.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(&format!("{:0<width$}", fraction, width = DECIMALS))
            .map_err(|_| overflow())?
    };

    whole
        .checked_mul(WEI_IN_ETHER)
        .and_then(|scaled| scaled.checked_add(fraction))
        .ok_or_else(overflow)
}
