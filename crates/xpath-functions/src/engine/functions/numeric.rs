use super::common::Invocation;
use crate::engine::call::StaticState;
use crate::engine::cast::cast_atomic;
use crate::engine::decimal_format::DecimalFormatSymbols;
use crate::engine::expr::atomize_one;
use crate::engine::runtime::{Error, ErrorCode, StaticContext};
use crate::model::XdmNode;
use crate::xdm::{AtomicType, ExpandedName, XdmAtomicValue};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericOp {
    Number,
    Abs,
    Floor,
    Ceiling,
    Round,
    RoundHalfToEven,
    FormatNumber,
}

pub(crate) fn evaluate<N: XdmNode>(
    op: NumericOp,
    inv: &Invocation<'_, N>,
) -> Result<Option<XdmAtomicValue>, Error> {
    match op {
        NumericOp::Number => {
            let v = if inv.arity() == 0 {
                Some(atomize_one(inv.context_item()?)?)
            } else {
                inv.atomic(0)?
            };
            Ok(Some(XdmAtomicValue::Double(to_double(v, inv))))
        }
        NumericOp::FormatNumber => format(inv).map(|s| Some(XdmAtomicValue::String(s))),
        _ => {
            let Some(n) = inv.number(0)? else {
                return Ok(None);
            };
            let r = match op {
                NumericOp::Abs => n.abs()?,
                NumericOp::Floor => n.floor(),
                NumericOp::Ceiling => n.ceiling(),
                NumericOp::Round => n.round(),
                _ => {
                    let precision = if inv.arity() > 1 { inv.integer(1)? } else { 0 };
                    n.round_half_to_even(precision)?
                }
            };
            Ok(Some(r.into_atomic()))
        }
    }
}

/// `fn:number` semantics: anything that does not cast to a double is NaN.
fn to_double<N: XdmNode>(v: Option<XdmAtomicValue>, inv: &Invocation<'_, N>) -> f64 {
    match v {
        Some(XdmAtomicValue::Double(d)) => d,
        Some(v) => match cast_atomic(v, AtomicType::Double, &inv.ctx.static_ctx.namespaces) {
            Ok(XdmAtomicValue::Double(d)) => d,
            _ => f64::NAN,
        },
        None => f64::NAN,
    }
}

fn format<N: XdmNode>(inv: &Invocation<'_, N>) -> Result<String, Error> {
    let value = inv.atomic(0)?.unwrap_or(XdmAtomicValue::Double(f64::NAN));
    let (symbols, picture) = match inv.call.state() {
        Some(StaticState::DecimalFormat { symbols, picture }) => (symbols.clone(), picture.clone()),
        _ => {
            let symbols = if inv.arity() > 2 {
                decimal_format(inv.ctx.static_ctx, &inv.string(2)?)?
            } else {
                inv.ctx.static_ctx.decimal_formats.default_format()
            };
            (symbols, None)
        }
    };
    let picture = match picture {
        Some(p) => p,
        None => inv.call.picture(&inv.string(1)?, &symbols)?,
    };
    picture.format(&value, &symbols)
}

/// Look up a decimal format by its lexical QName (`name`, `p:name` or
/// `Q{uri}name`).
pub(crate) fn decimal_format(sc: &StaticContext, name: &str) -> Result<Arc<DecimalFormatSymbols>, Error> {
    let name = name.trim();
    let unknown = || {
        Error::from_code(
            ErrorCode::FODF1280,
            format!("unknown decimal format '{name}'"),
        )
    };
    let expanded = if let Some(rest) = name.strip_prefix("Q{") {
        let (uri, local) = rest.split_once('}').ok_or_else(unknown)?;
        ExpandedName::new((!uri.is_empty()).then(|| uri.to_string()), local)
    } else if let Some((prefix, local)) = name.split_once(':') {
        let uri = sc.namespaces.resolve(prefix).ok_or_else(unknown)?;
        ExpandedName::ns(uri, local)
    } else {
        ExpandedName::new(None, name)
    };
    sc.decimal_formats.get(Some(&expanded)).ok_or_else(unknown)
}

#[cfg(test)]
mod tests {
    use crate::engine::decimal_format::{DecimalFormatManager, DecimalFormatSymbols};
    use crate::engine::library::FunctionLibraryList;
    use crate::engine::runtime::{DynamicContextBuilder, ErrorCode, StaticContextBuilder};
    use crate::evaluator::evaluate_expr;
    use crate::model::simple::SimpleNode;
    use crate::xdm::{ExpandedName, XdmAtomicValue, XdmItem};
    use crate::compile_xpath;
    use rstest::rstest;
    use std::sync::Arc;

    fn eval(expr: &str) -> XdmAtomicValue {
        let ctx = DynamicContextBuilder::new().build();
        match evaluate_expr::<SimpleNode>(expr, &ctx).unwrap().as_slice() {
            [XdmItem::Atomic(a)] => a.clone(),
            other => panic!("{expr}: unexpected {other:?}"),
        }
    }

    #[rstest]
    #[case("round(2.5)", "3")]
    #[case("round(-2.5)", "-2")]
    #[case("round-half-to-even(2.5)", "2")]
    #[case("round-half-to-even(3.567812e0, 2)", "3.57")]
    #[case("floor(-1.5)", "-2")]
    #[case("ceiling(1.2)", "2")]
    #[case("abs(-3)", "3")]
    #[case("number('12')", "12")]
    #[case("number('x')", "NaN")]
    #[case("number(true())", "1")]
    fn numeric_functions(#[case] expr: &str, #[case] expected: &str) {
        assert_eq!(eval(expr).string_value(), expected);
    }

    #[test]
    fn named_decimal_format_is_resolved_statically() {
        let mut formats = DecimalFormatManager::new();
        formats
            .register(
                Some(ExpandedName::ns("urn:fmt", "de")),
                DecimalFormatSymbols {
                    decimal_separator: ',',
                    grouping_separator: '.',
                    ..DecimalFormatSymbols::default()
                },
            )
            .unwrap();
        let sc = StaticContextBuilder::new()
            .with_namespace("f", "urn:fmt")
            .with_decimal_formats(Arc::new(formats))
            .build();
        let libs = FunctionLibraryList::<SimpleNode>::standard();
        let expr = compile_xpath("format-number(1234.5, '#.##0,00', 'f:de')", &sc, &libs).unwrap();
        let out = expr.evaluate(&DynamicContextBuilder::new().build()).unwrap();
        assert_eq!(out, vec![XdmItem::Atomic(XdmAtomicValue::from("1.234,50"))]);

        let err = compile_xpath::<SimpleNode>("format-number(1, '0', 'f:none')", &sc, &libs).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::FODF1280);
        assert!(err.is_static());
    }
}
