//! Pattern matching capability used by `matches`, `replace`, `tokenize` and
//! the analyze-string iterator.
//!
//! A [`RegexProvider`] compiles a pattern and flag string into a
//! [`CompiledRegex`]. Call sites with literal patterns compile once during
//! static checking; dynamic patterns go through the provider's cache.
use crate::engine::runtime::{Error, ErrorCode};
use lru::LruCache;
use smallvec::SmallVec;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Byte spans of group 0 and every capturing group of a match.
pub type GroupSpans = SmallVec<[Option<(usize, usize)>; 4]>;

pub trait CompiledRegex: Send + Sync {
    fn pattern(&self) -> &str;
    fn flags(&self) -> &str;
    fn is_match(&self, text: &str) -> Result<bool, Error>;
    fn find_at(&self, text: &str, start: usize) -> Result<Option<(usize, usize)>, Error>;
    fn captures_at(&self, text: &str, start: usize) -> Result<Option<GroupSpans>, Error>;
    /// Number of capturing groups, not counting group 0.
    fn group_count(&self) -> usize;

    fn matches_empty(&self) -> Result<bool, Error> {
        self.is_match("")
    }
}

pub trait RegexProvider: Send + Sync {
    fn compile(&self, pattern: &str, flags: &str) -> Result<Arc<dyn CompiledRegex>, Error>;
}

/// Backreference-capable provider based on fancy-regex, with an LRU cache of
/// compiled patterns keyed by (pattern, flags).
pub struct FancyRegexProvider {
    cache: Mutex<LruCache<(String, String), Arc<FancyCompiled>>>,
}

impl Default for FancyRegexProvider {
    fn default() -> Self {
        Self::with_capacity(NonZeroUsize::new(128).unwrap_or(NonZeroUsize::MIN))
    }
}

impl FancyRegexProvider {
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn build_with_flags(pattern: &str, flags: &str) -> Result<fancy_regex::Regex, Error> {
        let stripped;
        let source = if flags.contains('x') {
            stripped = strip_free_spacing(pattern);
            stripped.as_str()
        } else {
            pattern
        };
        let mut builder = fancy_regex::RegexBuilder::new(source);
        for ch in flags.chars() {
            match ch {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                // whitespace already stripped; `#` stays literal
                'x' => {}
                _ => {
                    return Err(Error::from_code(
                        ErrorCode::FORX0001,
                        format!("unsupported regex flag: {ch}"),
                    ));
                }
            }
        }
        builder.build().map_err(|e| {
            Error::from_code(ErrorCode::FORX0002, format!("invalid regex pattern: {pattern}"))
                .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
        })
    }
}

impl RegexProvider for FancyRegexProvider {
    fn compile(&self, pattern: &str, flags: &str) -> Result<Arc<dyn CompiledRegex>, Error> {
        let flags = validate_regex_flags(flags)?;
        reject_backref_in_char_class(pattern)?;
        let key = (pattern.to_string(), flags);
        if let Ok(mut cache) = self.cache.lock()
            && let Some(hit) = cache.get(&key)
        {
            return Ok(hit.clone());
        }
        tracing::trace!(pattern, flags = %key.1, "compiling regex");
        let regex = Self::build_with_flags(pattern, &key.1)?;
        let compiled = Arc::new(FancyCompiled {
            pattern: key.0.clone(),
            flags: key.1.clone(),
            regex,
        });
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, compiled.clone());
        }
        Ok(compiled)
    }
}

pub struct FancyCompiled {
    pattern: String,
    flags: String,
    regex: fancy_regex::Regex,
}

impl CompiledRegex for FancyCompiled {
    fn pattern(&self) -> &str {
        &self.pattern
    }

    fn flags(&self) -> &str {
        &self.flags
    }

    fn is_match(&self, text: &str) -> Result<bool, Error> {
        Ok(self.regex.is_match(text)?)
    }

    fn find_at(&self, text: &str, start: usize) -> Result<Option<(usize, usize)>, Error> {
        Ok(self
            .regex
            .find_from_pos(text, start)?
            .map(|m| (m.start(), m.end())))
    }

    fn captures_at(&self, text: &str, start: usize) -> Result<Option<GroupSpans>, Error> {
        let Some(caps) = self.regex.captures_from_pos(text, start)? else {
            return Ok(None);
        };
        Ok(Some(
            (0..caps.len())
                .map(|i| caps.get(i).map(|m| (m.start(), m.end())))
                .collect(),
        ))
    }

    fn group_count(&self) -> usize {
        self.regex.captures_len().saturating_sub(1)
    }
}

/// Validate and deduplicate an XPath flag string (`i`, `m`, `s`, `x`).
pub fn validate_regex_flags(flags: &str) -> Result<String, Error> {
    let mut out = String::with_capacity(flags.len());
    for ch in flags.chars() {
        match ch {
            'i' | 'm' | 's' | 'x' => {
                if !out.contains(ch) {
                    out.push(ch);
                }
            }
            _ => {
                return Err(Error::from_code(
                    ErrorCode::FORX0001,
                    format!("unsupported regex flag: {ch}"),
                ));
            }
        }
    }
    Ok(out)
}

/// The `x` flag: drop whitespace outside character class expressions.
/// Escapes are copied as a unit so `\[` does not open a class.
pub fn strip_free_spacing(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    let mut depth = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '[' => {
                depth += 1;
                out.push(c);
            }
            ']' if depth > 0 => {
                depth -= 1;
                out.push(c);
            }
            ' ' | '\t' | '\n' | '\r' if depth == 0 => {}
            _ => out.push(c),
        }
    }
    out
}

/// Back-references such as `[\1]` are not allowed inside a character class.
pub fn reject_backref_in_char_class(pattern: &str) -> Result<(), Error> {
    let bytes = pattern.as_bytes();
    let mut i = 0;
    let mut depth = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                if depth > 0 && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                    return Err(Error::from_code(
                        ErrorCode::FORX0002,
                        "back-reference not allowed in character class",
                    ));
                }
                i += 2;
                continue;
            }
            b'[' => depth += 1,
            b']' if depth > 0 => depth -= 1,
            _ => {}
        }
        i += 1;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplacementPart {
    Literal(String),
    Group(usize),
}

/// Parsed `$replacement` argument of `fn:replace`.
///
/// `$N` refers to a captured group (`$0` is the whole match); digits are
/// consumed greedily while the group number exists. `\$` and `\\` are the
/// only escapes. A group beyond the pattern's groups expands to nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    parts: Vec<ReplacementPart>,
}

impl Replacement {
    pub fn parse(template: &str, group_count: usize) -> Result<Self, Error> {
        let mut parts = Vec::new();
        let mut lit = String::new();
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(e @ ('\\' | '$')) => lit.push(e),
                    _ => {
                        return Err(Error::from_code(
                            ErrorCode::FORX0004,
                            "'\\' in replacement must be followed by '\\' or '$'",
                        ));
                    }
                },
                '$' => {
                    let Some(first) = chars.next().and_then(|d| d.to_digit(10)) else {
                        return Err(Error::from_code(
                            ErrorCode::FORX0004,
                            "'$' in replacement must be followed by a digit",
                        ));
                    };
                    let mut n = first as usize;
                    while let Some(d) = chars.peek().and_then(|d| d.to_digit(10)) {
                        let next = n * 10 + d as usize;
                        if next > group_count {
                            break;
                        }
                        n = next;
                        chars.next();
                    }
                    if !lit.is_empty() {
                        parts.push(ReplacementPart::Literal(std::mem::take(&mut lit)));
                    }
                    parts.push(ReplacementPart::Group(n));
                }
                other => lit.push(other),
            }
        }
        if !lit.is_empty() {
            parts.push(ReplacementPart::Literal(lit));
        }
        Ok(Self { parts })
    }

    pub fn expand(&self, text: &str, groups: &GroupSpans, out: &mut String) {
        for part in &self.parts {
            match part {
                ReplacementPart::Literal(s) => out.push_str(s),
                ReplacementPart::Group(n) => {
                    if let Some(Some((s, e))) = groups.get(*n) {
                        out.push_str(&text[*s..*e]);
                    }
                }
            }
        }
    }
}

fn reject_empty_match(regex: &dyn CompiledRegex) -> Result<(), Error> {
    if regex.matches_empty()? {
        return Err(Error::from_code(
            ErrorCode::FORX0003,
            format!("pattern '{}' matches a zero-length string", regex.pattern()),
        ));
    }
    Ok(())
}

/// Replace every non-overlapping match of `regex` in `text`.
pub fn replace_all(
    regex: &dyn CompiledRegex,
    text: &str,
    replacement: &Replacement,
) -> Result<String, Error> {
    reject_empty_match(regex)?;
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    while pos <= text.len() {
        let Some(groups) = regex.captures_at(text, pos)? else {
            break;
        };
        let Some(Some((start, end))) = groups.first().copied() else {
            break;
        };
        if start == end {
            return Err(Error::from_code(
                ErrorCode::FORX0003,
                "pattern matched a zero-length string",
            ));
        }
        out.push_str(&text[pos..start]);
        replacement.expand(text, &groups, &mut out);
        pos = end;
    }
    if pos < text.len() {
        out.push_str(&text[pos..]);
    }
    Ok(out)
}

/// One run of the input as seen by [`analyze_string`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexRun {
    Match {
        text: String,
        /// Captured groups 1..n; `None` for a group that did not participate.
        groups: Vec<Option<String>>,
    },
    NonMatch(String),
}

/// Splits `text` into alternating matching and non-matching runs.
pub struct AnalyzeString<'t> {
    regex: Arc<dyn CompiledRegex>,
    text: &'t str,
    pos: usize,
    pending: Option<RegexRun>,
    done: bool,
}

/// Analyze `text` against `regex`. Patterns matching the empty string are
/// rejected with `FORX0003`.
pub fn analyze_string(regex: Arc<dyn CompiledRegex>, text: &str) -> Result<AnalyzeString<'_>, Error> {
    reject_empty_match(regex.as_ref())?;
    Ok(AnalyzeString {
        regex,
        text,
        pos: 0,
        pending: None,
        done: false,
    })
}

impl Iterator for AnalyzeString<'_> {
    type Item = Result<RegexRun, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(run) = self.pending.take() {
            return Some(Ok(run));
        }
        if self.done {
            return None;
        }
        let groups = match self.regex.captures_at(self.text, self.pos) {
            Ok(g) => g,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let Some((start, end)) = groups.as_ref().and_then(|g| g.first().copied().flatten()) else {
            self.done = true;
            let rest = &self.text[self.pos..];
            self.pos = self.text.len();
            return (!rest.is_empty()).then(|| Ok(RegexRun::NonMatch(rest.to_string())));
        };
        if start == end {
            self.done = true;
            return Some(Err(Error::from_code(
                ErrorCode::FORX0003,
                "pattern matched a zero-length string",
            )));
        }
        let groups = groups.unwrap_or_default();
        let matched = RegexRun::Match {
            text: self.text[start..end].to_string(),
            groups: groups
                .iter()
                .skip(1)
                .map(|g| g.map(|(s, e)| self.text[s..e].to_string()))
                .collect(),
        };
        let before = &self.text[self.pos..start];
        self.pos = end;
        if before.is_empty() {
            Some(Ok(matched))
        } else {
            self.pending = Some(matched);
            Some(Ok(RegexRun::NonMatch(before.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(p: &str, f: &str) -> Arc<dyn CompiledRegex> {
        FancyRegexProvider::default().compile(p, f).unwrap()
    }

    #[test]
    fn replacement_groups_are_greedy_while_defined() {
        let re = compile("(a)(b)", "");
        let r = Replacement::parse("[$2$1$12]", re.group_count()).unwrap();
        assert_eq!(replace_all(re.as_ref(), "xaby", &r).unwrap(), "x[baa2]y");
    }

    #[test]
    fn replacement_rejects_bad_escapes() {
        for bad in ["$", "\\n", "a$x"] {
            let err = Replacement::parse(bad, 1).unwrap_err();
            assert_eq!(err.code_enum(), ErrorCode::FORX0004, "{bad}");
        }
    }

    #[test]
    fn whole_match_group_zero() {
        let re = compile("[0-9]+", "");
        let r = Replacement::parse("<$0>", re.group_count()).unwrap();
        assert_eq!(replace_all(re.as_ref(), "a1b22", &r).unwrap(), "a<1>b<22>");
    }

    #[test]
    fn free_spacing_keeps_classes_and_escapes() {
        assert_eq!(strip_free_spacing("a b\t#\nc"), "ab#c");
        assert_eq!(strip_free_spacing("[a b] c"), "[a b]c");
        assert_eq!(strip_free_spacing("\\[ x ]"), "\\[x]");
        let re = FancyRegexProvider::default().compile("a # b", "x").unwrap();
        assert!(re.is_match("a#b").unwrap());
        assert!(!re.is_match("ab").unwrap());
    }

    #[test]
    fn unknown_flag_is_forx0001() {
        let err = FancyRegexProvider::default().compile("a", "q").err().unwrap();
        assert_eq!(err.code_enum(), ErrorCode::FORX0001);
    }

    #[test]
    fn backref_in_class_is_rejected() {
        assert!(reject_backref_in_char_class(r"(a)[\1]").is_err());
        assert!(reject_backref_in_char_class(r"(a)\1[\d]").is_ok());
    }

    #[test]
    fn analyze_string_alternates_runs() {
        let re = compile("(\\d)(x)?", "");
        let runs: Vec<_> = analyze_string(re, "a1b2x")
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            runs,
            vec![
                RegexRun::NonMatch("a".into()),
                RegexRun::Match {
                    text: "1".into(),
                    groups: vec![Some("1".into()), None]
                },
                RegexRun::NonMatch("b".into()),
                RegexRun::Match {
                    text: "2x".into(),
                    groups: vec![Some("2".into()), Some("x".into())]
                },
            ]
        );
    }

    #[test]
    fn analyze_string_rejects_empty_matching_pattern() {
        let re = compile("a*", "");
        assert_eq!(
            analyze_string(re, "aaa").err().unwrap().code_enum(),
            ErrorCode::FORX0003
        );
    }
}
