use super::common::Invocation;
use crate::engine::call::StaticState;
use crate::engine::regex::{CompiledRegex, Replacement, replace_all};
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{SequenceCursor, XdmAtomicValue, XdmItem, XdmItemResult, XdmSequenceStream};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegexOp {
    Matches,
    Replace,
    Tokenize,
}

pub(crate) fn evaluate<N: XdmNode>(op: RegexOp, inv: &Invocation<'_, N>) -> Result<XdmAtomicValue, Error> {
    let text = inv.string(0)?;
    match op {
        RegexOp::Matches => {
            let regex = inv.regex(1, 2)?;
            Ok(XdmAtomicValue::Boolean(regex.is_match(&text)?))
        }
        RegexOp::Replace => {
            let regex = inv.regex(1, 3)?;
            let out = match inv.call.state() {
                Some(StaticState::Regex {
                    replacement: Some(r),
                    ..
                }) => replace_all(regex.as_ref(), &text, r)?,
                _ => {
                    let r = Replacement::parse(&inv.string(2)?, regex.group_count())?;
                    replace_all(regex.as_ref(), &text, &r)?
                }
            };
            Ok(XdmAtomicValue::String(out))
        }
        RegexOp::Tokenize => Err(Error::from_code(
            ErrorCode::XPTY0004,
            "tokenize() produces a sequence",
        )),
    }
}

pub(crate) fn tokenize<N: XdmNode>(inv: &Invocation<'_, N>) -> Result<XdmSequenceStream<N>, Error> {
    let text = inv.string(0)?;
    let regex = inv.regex(1, 2)?;
    if regex.matches_empty()? {
        return Err(Error::from_code(
            ErrorCode::FORX0003,
            format!("pattern '{}' matches a zero-length string", regex.pattern()),
        ));
    }
    if text.is_empty() {
        return Ok(XdmSequenceStream::empty());
    }
    Ok(XdmSequenceStream::new(TokenizeCursor {
        regex,
        text: Arc::from(text),
        pos: 0,
        done: false,
    }))
}

/// Substrings between the matches of a pattern, produced on demand.
pub struct TokenizeCursor {
    regex: Arc<dyn CompiledRegex>,
    text: Arc<str>,
    pos: usize,
    done: bool,
}

impl<N: 'static> SequenceCursor<N> for TokenizeCursor {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        if self.done {
            return None;
        }
        let token = match self.regex.find_at(&self.text, self.pos) {
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
            Ok(Some((start, end))) => {
                let token = self.text[self.pos..start].to_string();
                self.pos = end;
                token
            }
            Ok(None) => {
                self.done = true;
                self.text[self.pos..].to_string()
            }
        };
        Some(Ok(XdmItem::Atomic(XdmAtomicValue::String(token))))
    }

    fn has_next(&self) -> Option<bool> {
        Some(!self.done)
    }

    fn boxed_clone(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(Self {
            regex: self.regex.clone(),
            text: self.text.clone(),
            pos: self.pos,
            done: self.done,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::runtime::{DynamicContextBuilder, ErrorCode};
    use crate::evaluator::evaluate_expr;
    use crate::model::simple::SimpleNode;
    use crate::xdm::{XdmAtomicValue, XdmItem};
    use rstest::rstest;

    fn strings(expr: &str) -> Vec<String> {
        let ctx = DynamicContextBuilder::new().build();
        evaluate_expr::<SimpleNode>(expr, &ctx)
            .unwrap()
            .into_iter()
            .map(|i| match i {
                XdmItem::Atomic(a) => a.string_value(),
                XdmItem::Node(n) => panic!("unexpected node {n:?}"),
            })
            .collect()
    }

    #[rstest]
    #[case("tokenize('The cat sat', '\\s+')", &["The", "cat", "sat"])]
    #[case("tokenize('1, 15, 24, 50', ',\\s*')", &["1", "15", "24", "50"])]
    #[case("tokenize('1,15,,24,50,', ',')", &["1", "15", "", "24", "50", ""])]
    #[case("tokenize('', ',')", &[])]
    #[case("replace('abracadabra', 'bra', '*')", &["a*cada*"])]
    #[case("replace('abracadabra', 'a(.)', 'a$1$1')", &["abbraccaddabbra"])]
    #[case("replace('darted', '^(.*?)d(.*)$', '$1c$2')", &["carted"])]
    #[case("replace('AAA', 'a', 'b', 'i')", &["bbb"])]
    #[case("matches('abracadabra', '^a.*a$')", &["true"])]
    #[case("matches('abracadabra', '^bra')", &["false"])]
    fn regex_functions(#[case] expr: &str, #[case] expected: &[&str]) {
        assert_eq!(strings(expr), expected);
    }

    #[test]
    fn dynamic_pattern_matching_empty_is_rejected() {
        let ctx = DynamicContextBuilder::new()
            .with_variable(
                crate::xdm::ExpandedName::new(None, "p"),
                vec![XdmItem::Atomic(XdmAtomicValue::from("x*"))],
            )
            .build();
        let sc = crate::engine::runtime::StaticContextBuilder::new()
            .with_variable(crate::xdm::ExpandedName::new(None, "p"))
            .build();
        let libs = crate::engine::library::FunctionLibraryList::standard();
        let compiled = crate::compile_xpath::<SimpleNode>("tokenize('abc', $p)", &sc, &libs).unwrap();
        let err = compiled.evaluate(&ctx).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::FORX0003);
    }
}
