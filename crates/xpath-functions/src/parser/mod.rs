use crate::engine::runtime::{Error, ErrorCode};
use pest::Parser;
use pest::iterators::Pair;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

pub mod ast;

#[derive(pest_derive::Parser)]
#[grammar = "xpath_subset.pest"]
pub struct XPathParser;

fn syntax_error(message: impl Into<String>) -> Error {
    Error::static_err(ErrorCode::XPST0003, message)
}

impl XPathParser {
    /// Parse `input` into the AST. Syntax errors are `XPST0003`.
    pub fn parse_to_ast(input: &str) -> Result<ast::Expr, Error> {
        let mut pairs = Self::parse(Rule::xpath, input).map_err(|e| {
            let message = format!("syntax error: {}", e.variant.message());
            syntax_error(message)
                .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
        })?;
        let expr = pairs
            .next()
            .and_then(|xpath| xpath.into_inner().next())
            .ok_or_else(|| syntax_error("empty expression"))?;
        Self::build_expr(expr)
    }

    fn build_expr(pair: Pair<Rule>) -> Result<ast::Expr, Error> {
        match pair.as_rule() {
            Rule::expr => {
                let mut parts = pair
                    .into_inner()
                    .map(Self::build_expr)
                    .collect::<Result<Vec<_>, _>>()?;
                if parts.len() == 1 {
                    return parts.pop().ok_or_else(|| syntax_error("empty expression"));
                }
                Ok(ast::Expr::Sequence(parts))
            }
            Rule::expr_single => Self::build_expr(Self::only_child(pair)?),
            Rule::unary_expr => {
                let mut negative = false;
                let mut operand = None;
                for p in pair.into_inner() {
                    match p.as_rule() {
                        Rule::sign => negative ^= p.as_str() == "-",
                        _ => operand = Some(Self::build_expr(p)?),
                    }
                }
                let operand = operand.ok_or_else(|| syntax_error("missing operand"))?;
                Ok(if negative {
                    ast::Expr::Negate(Box::new(operand))
                } else {
                    operand
                })
            }
            Rule::integer_literal => {
                let s = pair.as_str();
                match s.parse::<i64>() {
                    Ok(v) => Ok(ast::Expr::Literal(ast::Literal::Integer(v))),
                    Err(_) => Decimal::from_str(s)
                        .map(|d| ast::Expr::Literal(ast::Literal::Decimal(d)))
                        .map_err(|_| {
                            Error::static_err(
                                ErrorCode::FOAR0002,
                                format!("integer literal {s} is out of range"),
                            )
                        }),
                }
            }
            Rule::decimal_literal => {
                let s = pair.as_str();
                let normalized = if s.starts_with('.') {
                    format!("0{s}")
                } else {
                    s.trim_end_matches('.').to_string()
                };
                Decimal::from_str(&normalized)
                    .map(|d| ast::Expr::Literal(ast::Literal::Decimal(d)))
                    .map_err(|_| {
                        Error::static_err(
                            ErrorCode::FOAR0002,
                            format!("decimal literal {s} is out of range"),
                        )
                    })
            }
            Rule::double_literal => {
                let s = pair.as_str();
                s.parse::<f64>()
                    .map(|v| ast::Expr::Literal(ast::Literal::Double(v)))
                    .map_err(|_| syntax_error(format!("invalid double literal {s}")))
            }
            Rule::string_literal => {
                let s = match pair.into_inner().next() {
                    Some(content) => match content.as_rule() {
                        Rule::dbl_string_inner => content.as_str().replace("\"\"", "\""),
                        _ => content.as_str().replace("''", "'"),
                    },
                    None => String::new(),
                };
                Ok(ast::Expr::Literal(ast::Literal::String(s)))
            }
            Rule::var_ref => Ok(ast::Expr::VarRef(qname_from_str(
                Self::only_child(pair)?.as_str(),
            ))),
            Rule::parenthesized_expr => match pair.into_inner().next() {
                Some(inner) => Self::build_expr(inner),
                None => Ok(ast::Expr::Sequence(Vec::new())),
            },
            Rule::context_item_expr => Ok(ast::Expr::ContextItem),
            Rule::function_call => {
                let mut inners = pair.into_inner();
                let name = inners
                    .next()
                    .ok_or_else(|| syntax_error("missing function name"))?;
                let name = qname_from_str(name.as_str());
                let args = inners.map(Self::build_expr).collect::<Result<Vec<_>, _>>()?;
                Ok(ast::Expr::FunctionCall { name, args })
            }
            other => Err(syntax_error(format!("unexpected {other:?}"))),
        }
    }

    fn only_child(pair: Pair<Rule>) -> Result<Pair<Rule>, Error> {
        let rule = pair.as_rule();
        pair.into_inner()
            .next()
            .ok_or_else(|| syntax_error(format!("empty {rule:?}")))
    }
}

fn qname_from_str(s: &str) -> ast::QName {
    match s.split_once(':') {
        Some((prefix, local)) => ast::QName {
            prefix: Some(prefix.to_string()),
            local: local.to_string(),
        },
        None => ast::QName {
            prefix: None,
            local: s.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::ast::{Expr, Literal, QName};
    use super::*;
    use rstest::rstest;

    fn q(prefix: Option<&str>, local: &str) -> QName {
        QName {
            prefix: prefix.map(str::to_string),
            local: local.to_string(),
        }
    }

    #[rstest]
    #[case("42", Expr::Literal(Literal::Integer(42)))]
    #[case("1.50", Expr::Literal(Literal::Decimal(Decimal::new(150, 2))))]
    #[case(".5", Expr::Literal(Literal::Decimal(Decimal::new(5, 1))))]
    #[case("1e3", Expr::Literal(Literal::Double(1000.0)))]
    #[case("'it''s'", Expr::Literal(Literal::String("it's".into())))]
    #[case("\"say \"\"hi\"\"\"", Expr::Literal(Literal::String("say \"hi\"".into())))]
    #[case("()", Expr::Sequence(vec![]))]
    #[case(".", Expr::ContextItem)]
    #[case("$fn:x", Expr::VarRef(q(Some("fn"), "x")))]
    #[case("--1", Expr::Literal(Literal::Integer(1)))]
    fn parses_primaries(#[case] src: &str, #[case] expected: Expr) {
        assert_eq!(XPathParser::parse_to_ast(src).unwrap(), expected);
    }

    #[test]
    fn parses_calls_and_sequences() {
        let ast = XPathParser::parse_to_ast("xs:double('1') (: comment :), -count((1, 2))").unwrap();
        assert_eq!(
            ast,
            Expr::Sequence(vec![
                Expr::FunctionCall {
                    name: q(Some("xs"), "double"),
                    args: vec![Expr::Literal(Literal::String("1".into()))],
                },
                Expr::Negate(Box::new(Expr::FunctionCall {
                    name: q(None, "count"),
                    args: vec![Expr::Sequence(vec![
                        Expr::Literal(Literal::Integer(1)),
                        Expr::Literal(Literal::Integer(2)),
                    ])],
                })),
            ])
        );
    }

    #[rstest]
    #[case("count(")]
    #[case("1 2")]
    #[case("'unterminated")]
    #[case("")]
    fn syntax_errors_are_static(#[case] src: &str) {
        let err = XPathParser::parse_to_ast(src).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPST0003);
        assert!(err.is_static());
    }
}
