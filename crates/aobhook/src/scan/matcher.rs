use memchr::memchr;

use crate::scan::Pattern;

/// Finds a pattern inside one contiguous byte range.
pub trait PatternMatcher {
    /// Offset of the first match in `haystack`.
    fn find(&self, haystack: &[u8], pattern: &Pattern) -> Option<usize>;

    /// Offsets of every match in `haystack`, overlapping matches included.
    fn find_all(&self, haystack: &[u8], pattern: &Pattern) -> Vec<usize> {
        let mut results = Vec::new();
        let mut from = 0;
        while from < haystack.len() {
            match self.find(&haystack[from..], pattern) {
                Some(offset) => {
                    results.push(from + offset);
                    from += offset + 1;
                }
                None => break,
            }
        }
        results
    }
}

/// Wildcard matcher that uses `memchr` to jump between occurrences of the
/// pattern's first concrete byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct WildcardMatcher;

impl PatternMatcher for WildcardMatcher {
    fn find(&self, haystack: &[u8], pattern: &Pattern) -> Option<usize> {
        if pattern.is_empty() || haystack.len() < pattern.len() {
            return None;
        }
        let last_start = haystack.len() - pattern.len();

        let Some((anchor_at, anchor)) = pattern.anchor() else {
            return Some(0);
        };

        let mut from = anchor_at;
        let last_anchor = last_start + anchor_at;
        while from <= last_anchor {
            let pos = from + memchr(anchor, &haystack[from..=last_anchor])?;
            let start = pos - anchor_at;
            if pattern.matches_at(haystack, start) {
                return Some(start);
            }
            from = pos + 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(haystack: &[u8], pattern: &str) -> Option<usize> {
        WildcardMatcher.find(haystack, &Pattern::parse(pattern).unwrap())
    }

    #[test]
    fn test_find_first_match() {
        let haystack = [0x90, 0x48, 0x8D, 0x0D, 0x48, 0x8D, 0x05, 0x00];
        assert_eq!(find(&haystack, "48 8D"), Some(1));
        assert_eq!(find(&haystack, "48 8D 05"), Some(4));
        assert_eq!(find(&haystack, "48 8D 15"), None);
    }

    #[test]
    fn test_leading_wildcards() {
        let haystack = [0x01, 0x02, 0xE8, 0x10, 0xE8];
        assert_eq!(find(&haystack, "?? ?? E8"), Some(0));
        assert_eq!(find(&haystack, "?? E8 ?? E8"), Some(1));
        assert_eq!(find(&haystack, "?? ?? ?? E8 ??"), None);
    }

    #[test]
    fn test_match_at_end() {
        let haystack = [0x00, 0x00, 0xC3];
        assert_eq!(find(&haystack, "00 C3"), Some(1));
        assert_eq!(find(&haystack, "C3 ??"), None);
    }

    #[test]
    fn test_all_wildcards() {
        assert_eq!(find(&[1, 2, 3], "?? ??"), Some(0));
        assert_eq!(find(&[1], "?? ??"), None);
    }

    #[test]
    fn test_anchor_rejected_then_found() {
        let haystack = [0x55, 0x00, 0x55, 0x48, 0x89, 0xE5];
        assert_eq!(find(&haystack, "55 48 ?? E5"), Some(2));
    }

    #[test]
    fn test_find_all_overlapping() {
        let pattern = Pattern::parse("AA AA").unwrap();
        let haystack = [0xAA, 0xAA, 0xAA, 0x00, 0xAA, 0xAA];
        assert_eq!(WildcardMatcher.find_all(&haystack, &pattern), vec![0, 1, 4]);
        assert!(WildcardMatcher.find_all(&[], &pattern).is_empty());
    }
}
