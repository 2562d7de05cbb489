use super::common::{AtomicIter, Invocation};
use super::sequences::window;
use crate::engine::call::StaticState;
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequenceStream};
use itertools::Itertools;
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;

/// Collation-aware substring matching; one implementation for all five.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOp {
    Contains,
    StartsWith,
    EndsWith,
    SubstringBefore,
    SubstringAfter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringOp {
    String,
    Concat,
    StringJoin,
    StringLength,
    Substring,
    NormalizeSpace,
    UpperCase,
    LowerCase,
    Translate,
    StringToCodepoints,
    CodepointsToString,
    NormalizeUnicode,
    Compare,
}

pub(crate) fn evaluate_match<N: XdmNode>(
    op: MatchOp,
    inv: &Invocation<'_, N>,
) -> Result<XdmAtomicValue, Error> {
    let s = inv.string(0)?;
    let t = inv.string(1)?;
    let collation = inv.collation(2)?;
    Ok(match op {
        MatchOp::Contains => XdmAtomicValue::Boolean(collation.find(&s, &t).is_some()),
        MatchOp::StartsWith => XdmAtomicValue::Boolean(collation.starts_with(&s, &t)),
        MatchOp::EndsWith => XdmAtomicValue::Boolean(collation.ends_with(&s, &t)),
        MatchOp::SubstringBefore => XdmAtomicValue::String(match collation.find(&s, &t) {
            Some((start, _)) => s[..start].to_string(),
            None => String::new(),
        }),
        MatchOp::SubstringAfter => XdmAtomicValue::String(match collation.find(&s, &t) {
            Some((_, end)) => s[end..].to_string(),
            None => String::new(),
        }),
    })
}

/// String value of the context item, for the zero-argument forms.
fn context_string<N: XdmNode>(inv: &Invocation<'_, N>) -> Result<String, Error> {
    Ok(item_string(inv.context_item()?))
}

fn item_string<N: XdmNode>(item: XdmItem<N>) -> String {
    match item {
        XdmItem::Node(n) => n.string_value(),
        XdmItem::Atomic(XdmAtomicValue::String(s) | XdmAtomicValue::UntypedAtomic(s)) => s,
        XdmItem::Atomic(a) => a.string_value(),
    }
}

/// The string argument at `i`, or the context item's string value for the
/// zero-argument form.
fn string_or_context<N: XdmNode>(inv: &Invocation<'_, N>, i: usize) -> Result<String, Error> {
    if inv.arity() > i {
        inv.string(i)
    } else {
        context_string(inv)
    }
}

fn is_xpath_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_xml_char(cp: u32) -> bool {
    matches!(cp, 0x9 | 0xA | 0xD | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10_FFFF)
}

pub(crate) fn evaluate<N: XdmNode>(
    op: StringOp,
    inv: &Invocation<'_, N>,
) -> Result<Option<XdmAtomicValue>, Error> {
    let s = match op {
        StringOp::String => {
            let item = if inv.arity() == 0 {
                Some(inv.context_item()?)
            } else {
                inv.item(0)?
            };
            item.map(item_string).unwrap_or_default()
        }
        StringOp::Concat => {
            let mut out = String::new();
            for i in 0..inv.arity() {
                if let Some(v) = inv.atomic(i)? {
                    match v {
                        XdmAtomicValue::String(s) | XdmAtomicValue::UntypedAtomic(s) => {
                            out.push_str(&s);
                        }
                        other => out.push_str(&other.string_value()),
                    }
                }
            }
            out
        }
        StringOp::StringJoin => {
            let separator = inv.string(1)?;
            AtomicIter::new(inv.cursor(0)?)
                .map_ok(|v| match v {
                    XdmAtomicValue::String(s) => s,
                    other => other.string_value(),
                })
                .collect::<Result<Vec<_>, _>>()?
                .join(&separator)
        }
        StringOp::StringLength => {
            let n = string_or_context(inv, 0)?.chars().count();
            return Ok(Some(XdmAtomicValue::Integer(
                i64::try_from(n).unwrap_or(i64::MAX),
            )));
        }
        StringOp::Substring => {
            let s = inv.string(0)?;
            let start = inv.double(1)?;
            let length = if inv.arity() > 2 { Some(inv.double(2)?) } else { None };
            match window(start, length) {
                Some((skip, take)) => s
                    .chars()
                    .skip(skip)
                    .take(take.unwrap_or(usize::MAX))
                    .collect(),
                None => String::new(),
            }
        }
        StringOp::NormalizeSpace => string_or_context(inv, 0)?
            .split(is_xpath_space)
            .filter(|w| !w.is_empty())
            .join(" "),
        StringOp::UpperCase => inv.string(0)?.to_uppercase(),
        StringOp::LowerCase => inv.string(0)?.to_lowercase(),
        StringOp::Translate => {
            let s = inv.string(0)?;
            match inv.call.state() {
                Some(StaticState::Translate(map)) => translate(&s, map),
                _ => translate(&s, &translation_map(&inv.string(1)?, &inv.string(2)?)),
            }
        }
        StringOp::CodepointsToString => {
            let mut out = String::new();
            for v in AtomicIter::new(inv.cursor(0)?) {
                let cp = match v? {
                    XdmAtomicValue::Integer(i) => i,
                    other => {
                        return Err(Error::from_code(
                            ErrorCode::XPTY0004,
                            format!("codepoints-to-string() expects integers, got {}", other.atomic_type()),
                        ));
                    }
                };
                let ch = u32::try_from(cp)
                    .ok()
                    .filter(|c| is_xml_char(*c))
                    .and_then(char::from_u32)
                    .ok_or_else(|| {
                        Error::from_code(
                            ErrorCode::FOCH0001,
                            format!("{cp} is not a valid XML character"),
                        )
                    })?;
                out.push(ch);
            }
            out
        }
        StringOp::NormalizeUnicode => {
            let s = inv.string(0)?;
            let form = if inv.arity() > 1 {
                inv.string(1)?.trim().to_uppercase()
            } else {
                "NFC".to_string()
            };
            match form.as_str() {
                "" => s,
                "NFC" => s.nfc().collect(),
                "NFD" => s.nfd().collect(),
                "NFKC" => s.nfkc().collect(),
                "NFKD" => s.nfkd().collect(),
                other => {
                    return Err(Error::from_code(
                        ErrorCode::FOCH0003,
                        format!("unsupported normalization form: {other}"),
                    ));
                }
            }
        }
        StringOp::Compare => {
            let (Some(a), Some(b)) = (inv.opt_string(0)?, inv.opt_string(1)?) else {
                return Ok(None);
            };
            let ord = inv.collation(2)?.compare(&a, &b);
            return Ok(Some(XdmAtomicValue::Integer(ord as i64)));
        }
        StringOp::StringToCodepoints => {
            return Err(Error::from_code(
                ErrorCode::XPTY0004,
                "string-to-codepoints() produces a sequence",
            ));
        }
    };
    Ok(Some(XdmAtomicValue::String(s)))
}

pub(crate) fn string_to_codepoints<N: XdmNode>(
    inv: &Invocation<'_, N>,
) -> Result<XdmSequenceStream<N>, Error> {
    let Some(s) = inv.opt_string(0)? else {
        return Ok(XdmSequenceStream::empty());
    };
    Ok(XdmSequenceStream::from_vec(
        s.chars()
            .map(|c| XdmItem::Atomic(XdmAtomicValue::Integer(i64::from(u32::from(c)))))
            .collect(),
    ))
}

/// Character map for `translate`: the first occurrence of a character in
/// `from` wins; characters beyond the length of `to` map to deletion.
pub fn translation_map(from: &str, to: &str) -> HashMap<char, Option<char>> {
    let mut map = HashMap::new();
    let mut replacements = to.chars();
    for c in from.chars() {
        let r = replacements.next();
        map.entry(c).or_insert(r);
    }
    map
}

fn translate(s: &str, map: &HashMap<char, Option<char>>) -> String {
    s.chars()
        .filter_map(|c| match map.get(&c) {
            Some(r) => *r,
            None => Some(c),
        })
        .collect()
}
