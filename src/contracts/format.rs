use ethers::abi::Token;
use ethers::types::U256;
use ethers::utils::{format_units, parse_units};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::error::{AppError, Result};

/// How a raw read result becomes display text.
///
/// Scaling is done on the integer value; floats never enter the path, so a
/// display string is exact up to the configured fraction digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultTransform {
    /// `raw / 10^decimals`, every significant fraction digit kept.
    Units { decimals: u32 },
    /// Like `Units`, with thousands separators and a rounded fraction.
    GroupedUnits {
        decimals: u32,
        max_fraction_digits: u32,
    },
    /// The first token as-is.
    Raw,
}

impl ResultTransform {
    pub fn apply(&self, tokens: &[Token]) -> Result<String> {
        let first = tokens
            .first()
            .ok_or_else(|| AppError::Abi("call returned no values".to_string()))?;
        match self {
            ResultTransform::Units { decimals } => format_token_amount(expect_uint(first)?, *decimals),
            ResultTransform::GroupedUnits {
                decimals,
                max_fraction_digits,
            } => {
                let plain = format_token_amount(expect_uint(first)?, *decimals)?;
                Ok(group_amount(&plain, *max_fraction_digits))
            }
            ResultTransform::Raw => Ok(match first {
                Token::Uint(value) | Token::Int(value) => value.to_string(),
                Token::Address(address) => format!("{:?}", address),
                Token::Bool(value) => value.to_string(),
                Token::String(value) => value.clone(),
                Token::Bytes(bytes) | Token::FixedBytes(bytes) => {
                    format!("0x{}", hex::encode(bytes))
                }
                other => other.to_string(),
            }),
        }
    }
}

fn expect_uint(token: &Token) -> Result<U256> {
    match token {
        Token::Uint(value) => Ok(*value),
        other => Err(AppError::Abi(format!(
            "expected an unsigned integer result, got {}",
            other
        ))),
    }
}

/// Exact `value / 10^decimals` without trailing zeros, e.g. `1000`, `0.1`.
pub fn format_token_amount(value: U256, decimals: u32) -> Result<String> {
    let formatted = format_units(value, decimals)
        .map_err(|e| AppError::Internal(format!("format units: {}", e)))?;
    Ok(trim_fraction(&formatted))
}

fn trim_fraction(formatted: &str) -> String {
    if !formatted.contains('.') {
        return formatted.to_string();
    }
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

// Thousands separators on the integer part, fraction rounded half away from zero.
fn group_amount(plain: &str, max_fraction_digits: u32) -> String {
    let rounded = match Decimal::from_str(plain) {
        Ok(value) => value
            .round_dp_with_strategy(max_fraction_digits, RoundingStrategy::MidpointAwayFromZero)
            .normalize()
            .to_string(),
        // Beyond 28 significant digits; truncating the fraction is the best we can do.
        Err(_) => match plain.split_once('.') {
            Some((int, frac)) => {
                let keep = frac.len().min(max_fraction_digits as usize);
                trim_fraction(&format!("{}.{}", int, &frac[..keep]))
            }
            None => plain.to_string(),
        },
    };

    let (int, frac) = match rounded.split_once('.') {
        Some((int, frac)) => (int.to_string(), Some(frac.to_string())),
        None => (rounded.clone(), None),
    };

    let digits: Vec<char> = int.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    match frac {
        Some(frac) if !frac.is_empty() => format!("{}.{}", grouped, frac),
        _ => grouped,
    }
}

/// Parses a user-entered native amount (e.g. `"0.1"`) into base units.
pub fn parse_native_amount(raw: &str, decimals: u32) -> Result<U256> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidAmount("amount is empty".to_string()));
    }
    let value = Decimal::from_str(trimmed).map_err(|_| {
        if looks_numeric(trimmed) {
            AppError::InvalidAmount(format!("'{}' is too large", trimmed))
        } else {
            AppError::InvalidAmount(format!("'{}' is not a number", trimmed))
        }
    })?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AppError::InvalidAmount(format!(
            "'{}' must not be negative",
            trimmed
        )));
    }
    if value.scale() > decimals {
        return Err(AppError::InvalidAmount(format!(
            "'{}' has more than {} decimal places",
            trimmed, decimals
        )));
    }

    let units = parse_units(value.abs().to_string(), decimals)
        .map_err(|e| AppError::InvalidAmount(format!("'{}': {}", trimmed, e)))?;
    Ok(units.into())
}

/// Plain decimal notation: digits with at most one point.
fn looks_numeric(raw: &str) -> bool {
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1
}
