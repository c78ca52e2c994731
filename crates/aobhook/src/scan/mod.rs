//! Byte signature parsing and scanning.

mod matcher;
mod pattern;
mod scanner;

pub use matcher::{PatternMatcher, WildcardMatcher};
pub use pattern::{Pattern, parse_bytes};
pub use scanner::{RipRelative, Scanner, Target};
