//! `sum`, `avg`, `count`, `min` and `max`.
//!
//! Each is a single forward pass over its input. For `sum` and `avg` the
//! first value fixes the accumulation mode (numeric or one of the two
//! duration kinds); every later value must agree with it.
use super::common::{AtomicIter, Invocation};
use crate::engine::compare::compare_atomic;
use crate::engine::numeric::{Number, NumericKind, parse_double_lexical};
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::XdmAtomicValue;
use core::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

pub(crate) fn evaluate<N: XdmNode>(
    op: AggregateOp,
    inv: &Invocation<'_, N>,
) -> Result<Option<XdmAtomicValue>, Error> {
    match op {
        AggregateOp::Count => count(inv).map(Some),
        AggregateOp::Sum => match accumulate(inv)? {
            Some(total) => Ok(Some(total.finish(None)?)),
            None if inv.arity() > 1 => inv.atomic(1),
            None => Ok(Some(XdmAtomicValue::Integer(0))),
        },
        AggregateOp::Avg => match accumulate(inv)? {
            Some(total) => {
                let n = total.count;
                Ok(Some(total.finish(Some(n))?))
            }
            None => Ok(None),
        },
        AggregateOp::Min => extreme(inv, Ordering::Less),
        AggregateOp::Max => extreme(inv, Ordering::Greater),
    }
}

fn count<N: XdmNode>(inv: &Invocation<'_, N>) -> Result<XdmAtomicValue, Error> {
    let mut cursor = inv.cursor(0)?;
    let n = match cursor.last_position() {
        Some(n) => n,
        None => {
            let mut n = 0usize;
            while let Some(item) = cursor.next_item() {
                item?;
                n += 1;
            }
            n
        }
    };
    i64::try_from(n)
        .map(XdmAtomicValue::Integer)
        .map_err(|_| Error::from_code(ErrorCode::FOAR0002, "count exceeds the integer range"))
}

#[derive(Clone, Copy)]
enum Acc {
    Numeric(Number),
    YearMonth(i64),
    DayTime(i128),
}

struct Total {
    acc: Acc,
    count: usize,
}

impl Total {
    /// The sum, or the mean when `divisor` is given.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn finish(self, divisor: Option<usize>) -> Result<XdmAtomicValue, Error> {
        let overflow = || Error::from_code(ErrorCode::FOAR0002, "duration overflow");
        Ok(match (self.acc, divisor) {
            (Acc::Numeric(n), None) => n.into_atomic(),
            (Acc::Numeric(n), Some(d)) => n.div_count(d)?.into_atomic(),
            (Acc::YearMonth(m), d) => {
                let m = match d {
                    Some(d) => (m as f64 / d as f64).round() as i64,
                    None => m,
                };
                XdmAtomicValue::YearMonthDuration(i32::try_from(m).map_err(|_| overflow())?)
            }
            (Acc::DayTime(ms), d) => {
                let ms = match d {
                    Some(d) => (ms as f64 / d as f64).round() as i128,
                    None => ms,
                };
                XdmAtomicValue::DayTimeDuration(i64::try_from(ms).map_err(|_| overflow())?)
            }
        })
    }
}

fn as_number(v: XdmAtomicValue) -> Result<Option<Number>, Error> {
    Ok(match v {
        XdmAtomicValue::UntypedAtomic(s) => Some(Number::Double(parse_double_lexical(&s)?)),
        other => Number::from_atomic(&other),
    })
}

fn mixed(expected: &str, got: &XdmAtomicValue) -> Error {
    Error::from_code(
        ErrorCode::FORG0006,
        format!(
            "input to sum/avg mixes {expected} and {} values",
            got.atomic_type()
        ),
    )
}

/// Running total of argument 0; `None` for an empty input.
fn accumulate<N: XdmNode>(inv: &Invocation<'_, N>) -> Result<Option<Total>, Error> {
    let mut values = AtomicIter::new(inv.cursor(0)?);
    let Some(first) = values.next().transpose()? else {
        return Ok(None);
    };
    let acc = match first {
        XdmAtomicValue::YearMonthDuration(m) => Acc::YearMonth(i64::from(m)),
        XdmAtomicValue::DayTimeDuration(ms) => Acc::DayTime(i128::from(ms)),
        other => match as_number(other.clone())? {
            Some(n) => Acc::Numeric(n),
            None => {
                return Err(Error::from_code(
                    ErrorCode::FORG0006,
                    format!("cannot sum values of type {}", other.atomic_type()),
                ));
            }
        },
    };
    let mut total = Total { acc, count: 1 };
    if matches!(&total.acc, Acc::Numeric(n) if n.is_nan()) {
        return Ok(Some(total));
    }
    for v in values {
        let v = v?;
        total.count += 1;
        total.acc = match (total.acc, v) {
            (Acc::YearMonth(a), XdmAtomicValue::YearMonthDuration(b)) => {
                Acc::YearMonth(a + i64::from(b))
            }
            (Acc::DayTime(a), XdmAtomicValue::DayTimeDuration(b)) => Acc::DayTime(a + i128::from(b)),
            (Acc::YearMonth(_) | Acc::DayTime(_), other) => return Err(mixed("duration", &other)),
            (Acc::Numeric(a), other) => match as_number(other.clone())? {
                Some(b) => Acc::Numeric(a.add(b)?),
                None => return Err(mixed("numeric", &other)),
            },
        };
        // NaN absorbs everything after it
        if matches!(&total.acc, Acc::Numeric(n) if n.is_nan()) {
            return Ok(Some(total));
        }
    }
    Ok(Some(total))
}

/// `min` (`want == Less`) or `max` (`want == Greater`).
fn extreme<N: XdmNode>(
    inv: &Invocation<'_, N>,
    want: Ordering,
) -> Result<Option<XdmAtomicValue>, Error> {
    let collation = inv.collation(1)?;
    let mut best: Option<XdmAtomicValue> = None;
    let mut kind: Option<NumericKind> = None;
    for v in AtomicIter::new(inv.cursor(0)?) {
        let v = match v? {
            XdmAtomicValue::UntypedAtomic(s) => XdmAtomicValue::Double(parse_double_lexical(&s)?),
            XdmAtomicValue::AnyUri(s) => XdmAtomicValue::String(s),
            other => other,
        };
        if let Some(n) = Number::from_atomic(&v) {
            if n.is_nan() {
                return Ok(Some(v));
            }
            kind = Some(kind.map_or(n.kind(), |k| k.promote(n.kind())));
        } else if matches!(v, XdmAtomicValue::QName { .. }) {
            return Err(Error::from_code(
                ErrorCode::FORG0006,
                format!("{}() is not defined for xs:QName", inv.name()),
            ));
        }
        best = Some(match best {
            None => v,
            Some(b) => match compare_atomic(&v, &b, collation.as_ref())? {
                Some(ord) if ord == want => v,
                _ => b,
            },
        });
    }
    Ok(match (best, kind) {
        (Some(v), Some(k)) => Number::from_atomic(&v).map(|n| n.promote_to(k).into_atomic()),
        (best, _) => best,
    })
}

#[cfg(test)]
mod tests {
    use crate::engine::runtime::DynamicContextBuilder;
    use crate::evaluator::evaluate_expr;
    use crate::model::simple::SimpleNode;
    use crate::xdm::{XdmAtomicValue, XdmItem};
    use rust_decimal::Decimal;

    fn one(expr: &str) -> XdmAtomicValue {
        let ctx = DynamicContextBuilder::new().build();
        let out = evaluate_expr::<SimpleNode>(expr, &ctx).unwrap();
        assert_eq!(out.len(), 1, "{expr}");
        match out.into_iter().next() {
            Some(XdmItem::Atomic(a)) => a,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn integer_sum_stays_integer() {
        assert_eq!(one("sum((1, 2, 3))"), XdmAtomicValue::Integer(6));
    }

    #[test]
    fn avg_of_integers_is_decimal() {
        assert_eq!(one("avg((1, 2))"), XdmAtomicValue::Decimal(Decimal::new(15, 1)));
    }

    #[test]
    fn duration_average_rounds_to_whole_months() {
        assert_eq!(
            one("avg((xs:yearMonthDuration('P1M'), xs:yearMonthDuration('P2M')))"),
            XdmAtomicValue::YearMonthDuration(2)
        );
    }

    #[test]
    fn max_promotes_to_widest_numeric_type() {
        assert_eq!(one("max((1, 2.5e0, 2))"), XdmAtomicValue::Double(2.5));
        assert_eq!(one("min((3, 1.5))"), XdmAtomicValue::Decimal(Decimal::new(15, 1)));
    }

    #[test]
    fn min_of_strings_uses_collation() {
        assert_eq!(one("min(('b', 'a', 'c'))"), XdmAtomicValue::from("a"));
    }

    #[test]
    fn nan_wins() {
        assert!(one("min((1, xs:double('NaN'), 0))").is_nan());
        assert!(one("sum((1, xs:double('NaN'), 2))").is_nan());
    }
}
