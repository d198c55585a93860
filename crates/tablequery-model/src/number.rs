//! Decimal handling for `N` and `NS` attribute values.
//!
//! Numbers travel as text so no precision is lost on the wire. They are
//! validated against the storage limits below and parsed into
//! [`BigDecimal`] whenever they need to be compared, so `"6"`, `"6.0"` and
//! `"6e0"` all denote the same value.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;

/// Maximum number of significant digits a number may carry.
pub const MAX_SIGNIFICANT_DIGITS: usize = 38;

/// Largest decimal exponent of the leading significant digit.
pub const MAX_MAGNITUDE: i64 = 125;

/// Smallest decimal exponent of the leading significant digit.
pub const MIN_MAGNITUDE: i64 = -130;

/// Why a number string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberError {
    /// Not a decimal literal (empty, stray characters, whitespace, NaN...).
    Malformed,
    /// More than [`MAX_SIGNIFICANT_DIGITS`] significant digits.
    TooPrecise,
    /// Magnitude above [`MAX_MAGNITUDE`].
    Overflow,
    /// Magnitude below [`MIN_MAGNITUDE`].
    Underflow,
}

impl fmt::Display for NumberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => {
                f.write_str("The parameter cannot be converted to a numeric value")
            }
            Self::TooPrecise => write!(
                f,
                "Attempting to store more than {MAX_SIGNIFICANT_DIGITS} significant digits in a Number"
            ),
            Self::Overflow => f.write_str(
                "Number overflow. Attempting to store a number with magnitude larger than supported range",
            ),
            Self::Underflow => f.write_str(
                "Number underflow. Attempting to store a number with magnitude smaller than supported range",
            ),
        }
    }
}

impl std::error::Error for NumberError {}

/// Check that `text` is a decimal literal within the supported precision and
/// magnitude.
///
/// Accepted shape: optional sign, digits with at most one decimal point, and an
/// optional `e`/`E` exponent. Zero is valid with any exponent.
pub fn validate_number(text: &str) -> Result<(), NumberError> {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(pos) => {
            let exponent = unsigned[pos + 1..]
                .parse::<i64>()
                .map_err(|_| NumberError::Malformed)?;
            (&unsigned[..pos], exponent)
        }
        None => (unsigned, 0),
    };

    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(NumberError::Malformed);
    }
    if !int_part
        .bytes()
        .chain(frac_part.bytes())
        .all(|b| b.is_ascii_digit())
    {
        return Err(NumberError::Malformed);
    }

    let digits = format!("{int_part}{frac_part}");
    let without_leading = digits.trim_start_matches('0');
    let significant = without_leading.trim_end_matches('0');
    if significant.is_empty() {
        return Ok(());
    }
    if significant.len() > MAX_SIGNIFICANT_DIGITS {
        return Err(NumberError::TooPrecise);
    }

    let leading_zeros = i64::try_from(digits.len() - without_leading.len()).unwrap_or(i64::MAX);
    let int_len = i64::try_from(int_part.len()).unwrap_or(i64::MAX);
    let magnitude = exponent
        .saturating_add(int_len)
        .saturating_sub(leading_zeros)
        .saturating_sub(1);
    if magnitude > MAX_MAGNITUDE {
        return Err(NumberError::Overflow);
    }
    if magnitude < MIN_MAGNITUDE {
        return Err(NumberError::Underflow);
    }
    Ok(())
}

/// Validate and parse a number string.
pub fn parse_number(text: &str) -> Result<BigDecimal, NumberError> {
    validate_number(text)?;
    BigDecimal::from_str(text).map_err(|_| NumberError::Malformed)
}

/// Canonical text for a number, identical for every spelling of one value.
///
/// Falls back to the raw text when it does not parse, so hashing never fails.
#[must_use]
pub fn canonical_number(text: &str) -> String {
    match BigDecimal::from_str(text) {
        Ok(value) => value.normalized().to_string(),
        Err(_) => text.to_owned(),
    }
}
