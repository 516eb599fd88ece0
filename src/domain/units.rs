//! Conversion between human decimal strings and integer base units.
//!
//! Everything truncates: excess fractional digits are dropped, never rounded.

use crate::error::LendError;
use alloy_primitives::U256;

/// Decimals of every 1e18-scaled protocol value (prices, fees, health).
pub const WAD_DECIMALS: u8 = 18;

fn split_decimal(s: &str) -> Result<(&str, &str), LendError> {
    let invalid = || LendError::InvalidNumber(s.to_string());
    let trimmed = s.trim();
    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return Err(invalid());
    }
    Ok((int_part, frac_part))
}

/// Parse `s` and scale it by `10^decimals`.
pub fn to_base_units(s: &str, decimals: u8) -> Result<U256, LendError> {
    let (int_part, frac_part) = split_decimal(s)?;
    let overflow = || LendError::InvalidNumber(format!("{} overflows 256 bits", s));

    let frac_len = frac_part.len().min(decimals as usize);
    let mut digits = String::with_capacity(int_part.len() + decimals as usize);
    digits.push_str(int_part);
    digits.push_str(&frac_part[..frac_len]);
    for _ in frac_len..decimals as usize {
        digits.push('0');
    }
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 10).map_err(|_| overflow())
}

/// Signed variant used for collateral/debt deltas.
pub fn to_signed_base_units(s: &str, decimals: u8) -> Result<i128, LendError> {
    let trimmed = s.trim();
    let (negative, magnitude) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let value = to_base_units(magnitude, decimals)?;
    let value = i128::try_from(value)
        .map_err(|_| LendError::InvalidNumber(format!("{} overflows 128 bits", s)))?;
    Ok(if negative { -value } else { value })
}

/// Format base units as a decimal string: `1.5`, `1.0`, `0.000001`.
pub fn from_base_units(value: U256, decimals: u8) -> String {
    format_digits(&value.to_string(), decimals)
}

pub fn from_signed_base_units(value: i128, decimals: u8) -> String {
    let formatted = format_digits(&value.unsigned_abs().to_string(), decimals);
    if value < 0 {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

fn format_digits(digits: &str, decimals: u8) -> String {
    let decimals = decimals as usize;
    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits.to_string()
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');
    if frac_part.is_empty() {
        format!("{}.0", int_part)
    } else {
        format!("{}.{}", int_part, frac_part)
    }
}

/// Cut the fractional part of `s` to at most `max_decimals` digits.
pub fn format_bounded(s: &str, max_decimals: u8) -> Result<String, LendError> {
    let trimmed = s.trim();
    let unsigned = trimmed.strip_prefix('-').unwrap_or(trimmed);
    split_decimal(unsigned)?;
    Ok(match trimmed.split_once('.') {
        None => trimmed.to_string(),
        Some((int_part, frac_part)) => {
            let int_part = match int_part {
                "" => "0",
                "-" => "-0",
                digits => digits,
            };
            let keep = frac_part.len().min(max_decimals as usize);
            if keep == 0 {
                int_part.to_string()
            } else {
                format!("{}.{}", int_part, &frac_part[..keep])
            }
        }
    })
}
