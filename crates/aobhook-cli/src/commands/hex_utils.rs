//! Hex address parsing and formatting utilities.

use anyhow::Result;

/// Parse a signed offset: hex with a `0x` prefix, otherwise decimal.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(parse_offset("0x10").unwrap(), 16);
/// assert_eq!(parse_offset("-0x10").unwrap(), -16);
/// assert_eq!(parse_offset("-3").unwrap(), -3);
/// ```
pub fn parse_offset(s: &str) -> Result<i64> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|e| anyhow::anyhow!("Invalid offset '{}': {}", s, e))?;

    Ok(if negative { -magnitude } else { magnitude })
}

/// Format an address as a hex string with 0x prefix.
pub fn format_hex_address(addr: u64) -> String {
    format!("0x{:X}", addr)
}
