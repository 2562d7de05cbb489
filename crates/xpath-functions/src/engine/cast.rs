//! Casting between atomic types (`xs:T(...)` constructors, `cast as`, and
//! the implicit untypedAtomic conversion performed by argument coercion).
use crate::engine::numeric::{
    decimal_from_f64, parse_decimal_lexical, parse_double_lexical, parse_integer_lexical,
};
use crate::engine::runtime::{Error, ErrorCode, NamespaceBindings};
use crate::xdm::{AtomicType, XdmAtomicValue};
use chrono::{FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;

fn invalid(target: AtomicType, s: &str) -> Error {
    Error::from_code(
        ErrorCode::FORG0001,
        format!("invalid lexical form for {target}: '{s}'"),
    )
}

fn not_castable(value: &XdmAtomicValue, target: AtomicType) -> Error {
    Error::from_code(
        ErrorCode::XPTY0004,
        format!("cannot cast {} to {target}", value.atomic_type()),
    )
}

fn is_textual(v: &XdmAtomicValue) -> bool {
    matches!(v, XdmAtomicValue::String(_) | XdmAtomicValue::UntypedAtomic(_))
}

/// Cast `value` to `target`. QName casts resolve prefixes against `ns`.
pub fn cast_atomic(
    value: XdmAtomicValue,
    target: AtomicType,
    ns: &NamespaceBindings,
) -> Result<XdmAtomicValue, Error> {
    use XdmAtomicValue as V;
    if value.atomic_type() == target {
        return Ok(value);
    }
    match target {
        AtomicType::String => Ok(V::String(value.string_value())),
        AtomicType::UntypedAtomic => Ok(V::UntypedAtomic(value.string_value())),
        AtomicType::AnyUri => match value {
            V::String(s) | V::UntypedAtomic(s) => Ok(V::AnyUri(s.trim().to_string())),
            other => Err(not_castable(&other, target)),
        },
        AtomicType::Boolean => to_boolean(value),
        AtomicType::Integer => to_integer(value),
        AtomicType::Decimal => to_decimal(value),
        AtomicType::Double => to_double(value).map(V::Double),
        #[allow(clippy::cast_possible_truncation)]
        AtomicType::Float => to_double(value).map(|d| V::Float(d as f32)),
        AtomicType::QName => match value {
            V::String(s) | V::UntypedAtomic(s) => parse_qname(s.trim(), ns),
            other => Err(not_castable(&other, target)),
        },
        AtomicType::DateTime => match value {
            V::Date { date, tz } => {
                let offset = tz.unwrap_or_else(utc);
                date.and_hms_opt(0, 0, 0)
                    .and_then(|ndt| offset.from_local_datetime(&ndt).single())
                    .map(V::DateTime)
                    .ok_or_else(|| invalid(target, &date.to_string()))
            }
            v if is_textual(&v) => parse_date_time(v.string_value().trim()),
            other => Err(not_castable(&other, target)),
        },
        AtomicType::Date => match value {
            V::DateTime(dt) => Ok(V::Date {
                date: dt.date_naive(),
                tz: Some(*dt.offset()),
            }),
            v if is_textual(&v) => parse_date(v.string_value().trim()),
            other => Err(not_castable(&other, target)),
        },
        AtomicType::Time => match value {
            V::DateTime(dt) => Ok(V::Time {
                time: dt.time(),
                tz: Some(*dt.offset()),
            }),
            v if is_textual(&v) => parse_time(v.string_value().trim()),
            other => Err(not_castable(&other, target)),
        },
        AtomicType::YearMonthDuration => match value {
            v if is_textual(&v) => {
                let s = v.string_value();
                match parse_duration(s.trim()) {
                    Some(Duration { months, millis: 0, day_time: false, .. }) => i32::try_from(months)
                        .map(V::YearMonthDuration)
                        .map_err(|_| Error::from_code(ErrorCode::FOAR0002, "duration overflow")),
                    _ => Err(invalid(target, &s)),
                }
            }
            other => Err(not_castable(&other, target)),
        },
        AtomicType::DayTimeDuration => match value {
            v if is_textual(&v) => {
                let s = v.string_value();
                match parse_duration(s.trim()) {
                    Some(Duration { months: 0, millis, year_month: false, .. }) => {
                        Ok(V::DayTimeDuration(millis))
                    }
                    _ => Err(invalid(target, &s)),
                }
            }
            other => Err(not_castable(&other, target)),
        },
        AtomicType::AnyAtomic | AtomicType::Numeric => Err(Error::from_code(
            ErrorCode::XPTY0004,
            format!("{target} is not a valid cast target"),
        )),
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

fn to_boolean(value: XdmAtomicValue) -> Result<XdmAtomicValue, Error> {
    use XdmAtomicValue as V;
    let b = match &value {
        V::Integer(i) => *i != 0,
        V::Decimal(d) => !d.is_zero(),
        V::Double(d) => !(d.is_nan() || *d == 0.0),
        V::Float(f) => !(f.is_nan() || *f == 0.0),
        V::String(s) | V::UntypedAtomic(s) => match s.trim() {
            "true" | "1" => true,
            "false" | "0" => false,
            _ => return Err(invalid(AtomicType::Boolean, s)),
        },
        _ => return Err(not_castable(&value, AtomicType::Boolean)),
    };
    Ok(V::Boolean(b))
}

fn to_integer(value: XdmAtomicValue) -> Result<XdmAtomicValue, Error> {
    use XdmAtomicValue as V;
    let overflow = || Error::from_code(ErrorCode::FOAR0002, "value out of xs:integer range");
    let i = match &value {
        V::Boolean(b) => i64::from(*b),
        V::Decimal(d) => d.trunc().to_i64().ok_or_else(overflow)?,
        V::Double(d) => integer_from_f64(*d)?,
        V::Float(f) => integer_from_f64(f64::from(*f))?,
        V::String(s) | V::UntypedAtomic(s) => parse_integer_lexical(s)?,
        _ => return Err(not_castable(&value, AtomicType::Integer)),
    };
    Ok(V::Integer(i))
}

fn integer_from_f64(d: f64) -> Result<i64, Error> {
    if !d.is_finite() {
        return Err(Error::from_code(
            ErrorCode::FOCA0002,
            format!("cannot cast {d} to xs:integer"),
        ));
    }
    decimal_from_f64(d.trunc())?
        .to_i64()
        .ok_or_else(|| Error::from_code(ErrorCode::FOAR0002, "value out of xs:integer range"))
}

fn to_decimal(value: XdmAtomicValue) -> Result<XdmAtomicValue, Error> {
    use XdmAtomicValue as V;
    let d = match &value {
        V::Boolean(b) => rust_decimal::Decimal::from(i64::from(*b)),
        V::Integer(i) => rust_decimal::Decimal::from(*i),
        V::Double(d) => decimal_from_f64(*d)?,
        V::Float(f) => decimal_from_f64(f64::from(*f))?,
        V::String(s) | V::UntypedAtomic(s) => parse_decimal_lexical(s)?,
        _ => return Err(not_castable(&value, AtomicType::Decimal)),
    };
    Ok(V::Decimal(d))
}

#[allow(clippy::cast_precision_loss)]
fn to_double(value: XdmAtomicValue) -> Result<f64, Error> {
    use XdmAtomicValue as V;
    match &value {
        V::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        V::Integer(i) => Ok(*i as f64),
        V::Decimal(d) => Ok(d.to_f64().unwrap_or(f64::NAN)),
        V::Double(d) => Ok(*d),
        V::Float(f) => Ok(f64::from(*f)),
        V::String(s) | V::UntypedAtomic(s) => parse_double_lexical(s),
        _ => Err(not_castable(&value, AtomicType::Double)),
    }
}

fn is_ncname(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_alphabetic())
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn parse_qname(s: &str, ns: &NamespaceBindings) -> Result<XdmAtomicValue, Error> {
    let (prefix, local) = match s.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, s),
    };
    if !is_ncname(local) || prefix.is_some_and(|p| !is_ncname(p)) {
        return Err(invalid(AtomicType::QName, s));
    }
    let ns_uri = match prefix {
        Some(p) => Some(
            ns.resolve(p)
                .ok_or_else(|| {
                    Error::from_code(
                        ErrorCode::FORG0001,
                        format!("no namespace bound to prefix '{p}'"),
                    )
                })?
                .to_string(),
        ),
        None => None,
    };
    Ok(XdmAtomicValue::QName {
        ns_uri,
        prefix: prefix.map(str::to_string),
        local: local.to_string(),
    })
}

/// Splits a trailing `Z` or `±hh:mm` timezone off a date/time lexical.
fn split_tz(s: &str) -> Result<(&str, Option<FixedOffset>), ()> {
    if let Some(body) = s.strip_suffix('Z') {
        return Ok((body, Some(utc())));
    }
    if s.len() > 6 {
        let (body, tz) = s.split_at(s.len() - 6);
        let bytes = tz.as_bytes();
        if matches!(bytes[0], b'+' | b'-') && bytes[3] == b':' {
            let h: i32 = tz[1..3].parse().map_err(|_| ())?;
            let m: i32 = tz[4..6].parse().map_err(|_| ())?;
            if h > 14 || m > 59 {
                return Err(());
            }
            let secs = (h * 60 + m) * 60;
            let secs = if bytes[0] == b'-' { -secs } else { secs };
            return FixedOffset::east_opt(secs).map(|o| (body, Some(o))).ok_or(());
        }
    }
    Ok((s, None))
}

fn naive_date(s: &str) -> Option<NaiveDate> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let mut parts = body.splitn(3, '-');
    let (y, m, d) = (parts.next()?, parts.next()?, parts.next()?);
    let all_digits = [y, m, d]
        .iter()
        .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    if !all_digits || y.len() < 4 || m.len() != 2 || d.len() != 2 {
        return None;
    }
    let year: i32 = y.parse().ok()?;
    let year = if negative { -year } else { year };
    NaiveDate::from_ymd_opt(year, m.parse().ok()?, d.parse().ok()?)
}

fn naive_time(s: &str) -> Option<(NaiveTime, bool)> {
    if s == "24:00:00" || s.strip_prefix("24:00:00.").is_some_and(|f| f.bytes().all(|b| b == b'0')) {
        return Some((NaiveTime::MIN, true));
    }
    if s.len() < 8 || s.as_bytes()[2] != b':' || s.as_bytes()[5] != b':' {
        return None;
    }
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f").ok().map(|t| (t, false))
}

fn parse_date(s: &str) -> Result<XdmAtomicValue, Error> {
    let bad = || invalid(AtomicType::Date, s);
    let (body, tz) = split_tz(s).map_err(|()| bad())?;
    let date = naive_date(body).ok_or_else(bad)?;
    Ok(XdmAtomicValue::Date { date, tz })
}

fn parse_time(s: &str) -> Result<XdmAtomicValue, Error> {
    let bad = || invalid(AtomicType::Time, s);
    let (body, tz) = split_tz(s).map_err(|()| bad())?;
    let (time, _) = naive_time(body).ok_or_else(bad)?;
    Ok(XdmAtomicValue::Time { time, tz })
}

/// A dateTime without a timezone is taken to be in UTC.
fn parse_date_time(s: &str) -> Result<XdmAtomicValue, Error> {
    let bad = || invalid(AtomicType::DateTime, s);
    let (body, tz) = split_tz(s).map_err(|()| bad())?;
    let (d, t) = body.split_once('T').ok_or_else(bad)?;
    let date = naive_date(d).ok_or_else(bad)?;
    let (time, next_day) = naive_time(t).ok_or_else(bad)?;
    let date = if next_day { date.succ_opt().ok_or_else(bad)? } else { date };
    tz.unwrap_or_else(utc)
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(XdmAtomicValue::DateTime)
        .ok_or_else(bad)
}

struct Duration {
    months: i64,
    millis: i64,
    year_month: bool,
    day_time: bool,
}

/// `-?PnYnMnDTnHnMn.nS`; returns `None` for anything outside that shape.
fn parse_duration(s: &str) -> Option<Duration> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let body = body.strip_prefix('P')?;
    let (date_part, time_part) = match body.split_once('T') {
        Some((d, t)) if !t.is_empty() => (d, Some(t)),
        Some(_) => return None,
        None => (body, None),
    };
    let mut out = Duration {
        months: 0,
        millis: 0,
        year_month: false,
        day_time: false,
    };
    let mut seen_any = false;
    let mut order = 0;
    let mut num = String::new();
    for c in date_part.chars() {
        if c.is_ascii_digit() {
            num.push(c);
            continue;
        }
        let n: i64 = num.parse().ok()?;
        num.clear();
        let rank = match c {
            'Y' => 1,
            'M' => 2,
            'D' => 3,
            _ => return None,
        };
        if rank <= order {
            return None;
        }
        order = rank;
        seen_any = true;
        match c {
            'Y' => {
                out.months = out.months.checked_add(n.checked_mul(12)?)?;
                out.year_month = true;
            }
            'M' => {
                out.months = out.months.checked_add(n)?;
                out.year_month = true;
            }
            _ => {
                out.millis = out.millis.checked_add(n.checked_mul(86_400_000)?)?;
                out.day_time = true;
            }
        }
    }
    if !num.is_empty() {
        return None;
    }
    if let Some(t) = time_part {
        let mut order = 0;
        for c in t.chars() {
            if c.is_ascii_digit() || c == '.' {
                num.push(c);
                continue;
            }
            let rank = match c {
                'H' => 1,
                'M' => 2,
                'S' => 3,
                _ => return None,
            };
            if rank <= order || num.is_empty() {
                return None;
            }
            order = rank;
            let millis = if c == 'S' {
                let d = parse_decimal_lexical(&num).ok()?;
                (d * rust_decimal::Decimal::from(1000)).trunc().to_i64()?
            } else {
                let n: i64 = num.parse().ok()?;
                n.checked_mul(if c == 'H' { 3_600_000 } else { 60_000 })?
            };
            num.clear();
            out.millis = out.millis.checked_add(millis)?;
            out.day_time = true;
            seen_any = true;
        }
        if !num.is_empty() {
            return None;
        }
    }
    if !seen_any {
        return None;
    }
    if negative {
        out.months = -out.months;
        out.millis = -out.millis;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn cast(v: XdmAtomicValue, t: AtomicType) -> Result<XdmAtomicValue, Error> {
        cast_atomic(v, t, &crate::engine::runtime::StaticContext::default().namespaces)
    }

    #[rstest]
    #[case("12", AtomicType::Integer, "12")]
    #[case(" 1.50 ", AtomicType::Decimal, "1.5")]
    #[case("1e3", AtomicType::Double, "1000")]
    #[case("1", AtomicType::Boolean, "true")]
    #[case("2024-02-29", AtomicType::Date, "2024-02-29")]
    #[case("2024-02-29T10:00:00+01:00", AtomicType::DateTime, "2024-02-29T10:00:00+01:00")]
    #[case("13:20:00.5Z", AtomicType::Time, "13:20:00.5Z")]
    #[case("P1Y2M", AtomicType::YearMonthDuration, "P1Y2M")]
    #[case("P1DT2H0.5S", AtomicType::DayTimeDuration, "P1DT2H0.5S")]
    #[case("xs:integer", AtomicType::QName, "xs:integer")]
    fn string_casts(#[case] input: &str, #[case] target: AtomicType, #[case] expected: &str) {
        let v = cast(XdmAtomicValue::UntypedAtomic(input.into()), target).unwrap();
        assert_eq!(v.atomic_type(), target);
        assert_eq!(v.string_value(), expected);
    }

    #[rstest]
    #[case("abc", AtomicType::Integer)]
    #[case("2024-02-30", AtomicType::Date)]
    #[case("P1Y2D", AtomicType::YearMonthDuration)]
    #[case("P", AtomicType::DayTimeDuration)]
    #[case("nope:x", AtomicType::QName)]
    fn invalid_lexical_forms(#[case] input: &str, #[case] target: AtomicType) {
        let err = cast(XdmAtomicValue::String(input.into()), target).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::FORG0001);
    }

    #[test]
    fn nan_to_integer_is_foca0002() {
        let err = cast(XdmAtomicValue::Double(f64::NAN), AtomicType::Integer).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::FOCA0002);
    }

    #[test]
    fn double_truncates_to_integer() {
        assert_eq!(
            cast(XdmAtomicValue::Double(-2.7), AtomicType::Integer).unwrap(),
            XdmAtomicValue::Integer(-2)
        );
    }

    #[test]
    fn date_to_boolean_is_type_error() {
        let d = cast(XdmAtomicValue::from("2020-01-01"), AtomicType::Date).unwrap();
        let err = cast(d, AtomicType::Boolean).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
    }
}
