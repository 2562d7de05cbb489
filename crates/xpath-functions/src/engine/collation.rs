use crate::engine::runtime::{Error, ErrorCode, StaticContext};
use std::collections::HashMap;
use std::sync::Arc;

pub use crate::consts::{CODEPOINT_URI, SIMPLE_ACCENT_URI, SIMPLE_CASE_ACCENT_URI, SIMPLE_CASE_URI};

/// A collation compares strings through a collation key. Substring matching
/// (`contains`, `substring-before`, ...) is expressed on keys, so a collation
/// only needs `key` to take part in every string-match function.
pub trait Collation: Send + Sync {
    fn uri(&self) -> &str;

    fn key(&self, s: &str) -> String {
        s.to_string()
    }

    fn compare(&self, a: &str, b: &str) -> core::cmp::Ordering {
        self.key(a).cmp(&self.key(b))
    }

    fn equals(&self, a: &str, b: &str) -> bool {
        self.compare(a, b).is_eq()
    }

    /// Byte span of the first substring of `haystack` that collates equal to `needle`.
    fn find(&self, haystack: &str, needle: &str) -> Option<(usize, usize)> {
        if needle.is_empty() {
            return Some((0, 0));
        }
        let target = self.key(needle);
        let bounds: Vec<usize> = char_bounds(haystack);
        for (i, &start) in bounds.iter().enumerate() {
            for &end in &bounds[i + 1..] {
                let k = self.key(&haystack[start..end]);
                if k == target {
                    return Some((start, end));
                }
                // keys never shrink as the window grows
                if k.len() > target.len() {
                    break;
                }
            }
        }
        None
    }

    fn starts_with(&self, haystack: &str, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        let target = self.key(needle);
        char_bounds(haystack)
            .into_iter()
            .skip(1)
            .map(|end| self.key(&haystack[..end]))
            .take_while(|k| k.len() <= target.len())
            .any(|k| k == target)
    }

    fn ends_with(&self, haystack: &str, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        let target = self.key(needle);
        char_bounds(haystack)
            .into_iter()
            .rev()
            .skip(1)
            .map(|start| self.key(&haystack[start..]))
            .take_while(|k| k.len() <= target.len())
            .any(|k| k == target)
    }
}

fn char_bounds(s: &str) -> Vec<usize> {
    s.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .collect()
}

pub struct CodepointCollation;

impl Collation for CodepointCollation {
    fn uri(&self) -> &str {
        CODEPOINT_URI
    }
    fn compare(&self, a: &str, b: &str) -> core::cmp::Ordering {
        a.cmp(b)
    }
    fn equals(&self, a: &str, b: &str) -> bool {
        a == b
    }
    fn find(&self, haystack: &str, needle: &str) -> Option<(usize, usize)> {
        haystack.find(needle).map(|i| (i, i + needle.len()))
    }
    fn starts_with(&self, haystack: &str, needle: &str) -> bool {
        haystack.starts_with(needle)
    }
    fn ends_with(&self, haystack: &str, needle: &str) -> bool {
        haystack.ends_with(needle)
    }
}

/// Case-insensitive collation
pub struct SimpleCaseCollation;

impl Collation for SimpleCaseCollation {
    fn uri(&self) -> &str {
        SIMPLE_CASE_URI
    }
    fn key(&self, s: &str) -> String {
        s.to_lowercase()
    }
}

/// Accent-insensitive collation (NFD, combining marks removed)
pub struct SimpleAccentCollation;

impl Collation for SimpleAccentCollation {
    fn uri(&self) -> &str {
        SIMPLE_ACCENT_URI
    }
    fn key(&self, s: &str) -> String {
        strip_marks(s)
    }
}

pub struct SimpleCaseAccentCollation;

impl Collation for SimpleCaseAccentCollation {
    fn uri(&self) -> &str {
        SIMPLE_CASE_ACCENT_URI
    }
    fn key(&self, s: &str) -> String {
        strip_marks(s).to_lowercase()
    }
}

fn strip_marks(s: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    use unicode_normalization::char::canonical_combining_class as ccc;
    s.nfd().filter(|&ch| ccc(ch) == 0).collect()
}

/// Registry of available collations, keyed by URI.
pub struct CollationRegistry {
    by_uri: HashMap<String, Arc<dyn Collation>>,
}

impl Default for CollationRegistry {
    fn default() -> Self {
        let mut reg = Self {
            by_uri: HashMap::new(),
        };
        reg.insert(Arc::new(CodepointCollation));
        reg.insert(Arc::new(SimpleCaseCollation));
        reg.insert(Arc::new(SimpleAccentCollation));
        reg.insert(Arc::new(SimpleCaseAccentCollation));
        reg
    }
}

impl CollationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uri: &str) -> Option<Arc<dyn Collation>> {
        self.by_uri.get(uri).cloned()
    }

    pub fn codepoint(&self) -> Arc<dyn Collation> {
        self.get(CODEPOINT_URI)
            .unwrap_or_else(|| Arc::new(CodepointCollation))
    }

    pub fn insert(&mut self, collation: Arc<dyn Collation>) {
        self.by_uri.insert(collation.uri().to_string(), collation);
    }
}

/// Resolve an explicit collation argument; `None` selects the default collation.
pub fn resolve_collation(sc: &StaticContext, uri: Option<&str>) -> Result<Arc<dyn Collation>, Error> {
    match uri {
        None => Ok(sc.default_collation()),
        Some(u) => sc.collations.get(u).ok_or_else(|| {
            Error::from_code(ErrorCode::FOCH0002, format!("unknown collation URI: {u}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_find_returns_original_span() {
        let c = SimpleCaseCollation;
        assert_eq!(c.find("Hello World", "WORLD"), Some((6, 11)));
        assert!(c.starts_with("Hello", "hE"));
        assert!(c.ends_with("Hello", "LLO"));
        assert!(!c.ends_with("Hello", "x"));
    }

    #[test]
    fn accent_collation_ignores_marks() {
        let c = SimpleAccentCollation;
        assert!(c.equals("café", "cafe"));
        assert_eq!(c.find("un caf\u{e9} noir", "cafe"), Some((3, 8)));
    }

    #[test]
    fn unknown_collation_is_foch0002() {
        let sc = StaticContext::default();
        let err = resolve_collation(&sc, Some("urn:nope")).err().unwrap();
        assert_eq!(err.code_enum(), ErrorCode::FOCH0002);
    }
}
