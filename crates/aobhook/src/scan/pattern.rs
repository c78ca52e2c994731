use std::fmt;
use std::str::FromStr;

use crate::diag;
use crate::error::{Diagnostic, Result};

/// A byte signature with wildcard positions, e.g. `48 8D 0D ?? ?? ?? ??`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    tokens: Vec<Option<u8>>,
}

impl Pattern {
    /// Parses whitespace separated hex bytes; `?` and `??` are wildcards.
    pub fn parse(text: &str) -> Result<Self> {
        let mut tokens = Vec::new();
        for token in text.split_whitespace() {
            if token == "??" || token == "?" {
                tokens.push(None);
                continue;
            }
            tokens.push(Some(parse_byte(token, text)?));
        }

        if tokens.is_empty() {
            return Err(diag!(InvalidPattern, "Pattern is empty"));
        }
        Ok(Self { tokens })
    }

    pub fn from_tokens(tokens: Vec<Option<u8>>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &[Option<u8>] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Position and value of the first concrete byte.
    pub fn anchor(&self) -> Option<(usize, u8)> {
        self.tokens
            .iter()
            .enumerate()
            .find_map(|(i, token)| token.map(|b| (i, b)))
    }

    pub fn matches_at(&self, haystack: &[u8], start: usize) -> bool {
        haystack.len().saturating_sub(start) >= self.tokens.len()
            && self
                .tokens
                .iter()
                .zip(&haystack[start..])
                .all(|(&token, &byte)| token.is_none_or(|b| b == byte))
    }
}

impl FromStr for Pattern {
    type Err = Diagnostic;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match token {
                Some(value) => write!(f, "{:02X}", value)?,
                None => f.write_str("??")?,
            }
        }
        Ok(())
    }
}

/// Parses a replacement byte string such as `90 90 EB 05`. Wildcards are
/// rejected.
pub fn parse_bytes(text: &str) -> Result<Vec<u8>> {
    let bytes = text
        .split_whitespace()
        .map(|token| parse_byte(token, text))
        .collect::<Result<Vec<u8>>>()?;
    if bytes.is_empty() {
        return Err(diag!(InvalidPattern, "Byte string is empty"));
    }
    Ok(bytes)
}

fn parse_byte(token: &str, text: &str) -> Result<u8> {
    if token.len() > 2 {
        return Err(diag!(
            InvalidPattern,
            "Token '{}' in '{}' is longer than one byte",
            token,
            text
        ));
    }
    u8::from_str_radix(token, 16)
        .map_err(|e| diag!(InvalidPattern, "Invalid token '{}' in '{}': {}", token, text, e))
}
