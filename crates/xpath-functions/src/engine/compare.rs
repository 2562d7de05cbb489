//! Value comparison of atomic values, as used by `distinct-values`,
//! `index-of`, `min` and `max`.
use crate::engine::collation::Collation;
use crate::engine::numeric::Number;
use crate::engine::runtime::{Error, ErrorCode};
use crate::xdm::XdmAtomicValue;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use core::cmp::Ordering;

fn instant(date: NaiveDate, time: NaiveTime, tz: Option<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    tz.unwrap_or_else(|| Utc.fix())
        .from_local_datetime(&date.and_time(time))
        .single()
}

// Reference date for comparing xs:time values.
fn time_anchor() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1972, 12, 31)
}

fn as_text(v: &XdmAtomicValue) -> Option<&str> {
    match v {
        XdmAtomicValue::String(s) | XdmAtomicValue::UntypedAtomic(s) | XdmAtomicValue::AnyUri(s) => {
            Some(s)
        }
        _ => None,
    }
}

/// Orders two atomic values. `Ok(None)` means the values are comparable
/// but unordered (a NaN operand); incomparable types are `FORG0006`.
pub fn compare_atomic(
    a: &XdmAtomicValue,
    b: &XdmAtomicValue,
    collation: &dyn Collation,
) -> Result<Option<Ordering>, Error> {
    use XdmAtomicValue as V;
    if let (Some(x), Some(y)) = (Number::from_atomic(a), Number::from_atomic(b)) {
        return Ok(x.compare(&y));
    }
    if let (Some(x), Some(y)) = (as_text(a), as_text(b)) {
        return Ok(Some(collation.compare(x, y)));
    }
    let ord = match (a, b) {
        (V::Boolean(x), V::Boolean(y)) => Some(x.cmp(y)),
        (V::DateTime(x), V::DateTime(y)) => Some(x.cmp(y)),
        (V::Date { date: d1, tz: t1 }, V::Date { date: d2, tz: t2 }) => {
            instant(*d1, NaiveTime::MIN, *t1)
                .zip(instant(*d2, NaiveTime::MIN, *t2))
                .map(|(x, y)| x.cmp(&y))
        }
        (V::Time { time: x, tz: t1 }, V::Time { time: y, tz: t2 }) => time_anchor()
            .and_then(|d| instant(d, *x, *t1).zip(instant(d, *y, *t2)))
            .map(|(x, y)| x.cmp(&y)),
        (V::YearMonthDuration(x), V::YearMonthDuration(y)) => Some(x.cmp(y)),
        (V::DayTimeDuration(x), V::DayTimeDuration(y)) => Some(x.cmp(y)),
        _ => {
            return Err(Error::from_code(
                ErrorCode::FORG0006,
                format!(
                    "cannot compare {} with {}",
                    a.atomic_type(),
                    b.atomic_type()
                ),
            ));
        }
    };
    Ok(ord)
}

/// Equality for `distinct-values` and `index-of`: values of incomparable
/// types are simply unequal, and NaN equals NaN only when `nan_equal`.
pub fn atomic_equal(
    a: &XdmAtomicValue,
    b: &XdmAtomicValue,
    collation: &dyn Collation,
    nan_equal: bool,
) -> bool {
    if a.is_nan() || b.is_nan() {
        return nan_equal && a.is_nan() && b.is_nan();
    }
    match (a, b) {
        (
            XdmAtomicValue::QName { ns_uri: n1, local: l1, .. },
            XdmAtomicValue::QName { ns_uri: n2, local: l2, .. },
        ) => n1 == n2 && l1 == l2,
        _ => matches!(compare_atomic(a, b, collation), Ok(Some(Ordering::Equal))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::collation::{CodepointCollation, SimpleCaseCollation};
    use rust_decimal::Decimal;

    #[test]
    fn numerics_compare_across_types() {
        let r = compare_atomic(
            &XdmAtomicValue::Integer(2),
            &XdmAtomicValue::Decimal(Decimal::new(25, 1)),
            &CodepointCollation,
        )
        .unwrap();
        assert_eq!(r, Some(Ordering::Less));
        assert!(atomic_equal(
            &XdmAtomicValue::Integer(1),
            &XdmAtomicValue::Double(1.0),
            &CodepointCollation,
            false
        ));
    }

    #[test]
    fn strings_use_collation() {
        assert!(atomic_equal(
            &XdmAtomicValue::from("ABC"),
            &XdmAtomicValue::from("abc"),
            &SimpleCaseCollation,
            false
        ));
    }

    #[test]
    fn nan_equality_is_opt_in() {
        let nan = XdmAtomicValue::Double(f64::NAN);
        assert!(!atomic_equal(&nan, &nan, &CodepointCollation, false));
        assert!(atomic_equal(&nan, &nan, &CodepointCollation, true));
    }

    #[test]
    fn mixed_types_are_incomparable() {
        let err = compare_atomic(
            &XdmAtomicValue::Integer(1),
            &XdmAtomicValue::from("1"),
            &CodepointCollation,
        )
        .unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::FORG0006);
        assert!(!atomic_equal(
            &XdmAtomicValue::Integer(1),
            &XdmAtomicValue::from("1"),
            &CodepointCollation,
            true
        ));
    }
}
