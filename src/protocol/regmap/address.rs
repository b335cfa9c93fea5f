//! Address token normalization.
//!
//! Accepted forms:
//! - `4xxxx` references: the digit `4` followed by at least four more digits
//!   (`40001`, `400123`). The configured base is subtracted; a reference below
//!   the base is an error. Shorter numbers such as `4000` are plain indices.
//! - `0x`/`0X` prefixed hexadecimal indices.
//! - Plain zero-based decimal indices.
use once_cell::sync::Lazy;
use regex::Regex;

use super::error::AddressError;

static FOUR_X_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^4[0-9]{4,}$").expect("4xxxx pattern is a valid regex"));

/// Convert an address token into a zero-based register index.
pub fn normalize(token: &str, four_base: u32) -> Result<u16, AddressError> {
    let trimmed = token.trim();
    let malformed = || AddressError::Malformed {
        token: token.to_string(),
    };

    if FOUR_X_REFERENCE.is_match(trimmed) {
        let value = parse_digits(trimmed, 10).ok_or_else(malformed)?;
        if value < u64::from(four_base) {
            return Err(AddressError::BelowBase { value, four_base });
        }
        return to_register(value - u64::from(four_base));
    }

    let value = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => parse_digits(hex, 16),
        None => parse_digits(trimmed, 10),
    }
    .ok_or_else(malformed)?;

    to_register(value)
}

/// Parses a run of digits in `radix`. Signs, separators and empty input are
/// rejected; overflow saturates so that it surfaces as an out-of-range index.
fn parse_digits(digits: &str, radix: u32) -> Option<u64> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    Some(u64::from_str_radix(digits, radix).unwrap_or(u64::MAX))
}

fn to_register(value: u64) -> Result<u16, AddressError> {
    u16::try_from(value).map_err(|_| AddressError::OutOfRange { value })
}
