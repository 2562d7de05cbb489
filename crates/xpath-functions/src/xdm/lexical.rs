use super::XdmAtomicValue;
use chrono::{Datelike, FixedOffset, NaiveTime, Timelike};

pub(super) fn canonical(v: &XdmAtomicValue) -> String {
    match v {
        XdmAtomicValue::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
        XdmAtomicValue::String(s) | XdmAtomicValue::UntypedAtomic(s) | XdmAtomicValue::AnyUri(s) => {
            s.clone()
        }
        XdmAtomicValue::Integer(i) => i.to_string(),
        XdmAtomicValue::Decimal(d) => {
            let n = d.normalize();
            if n.is_zero() { "0".to_string() } else { n.to_string() }
        }
        XdmAtomicValue::Double(d) => format_double(*d),
        XdmAtomicValue::Float(f) => format_float(*f),
        XdmAtomicValue::QName { prefix, local, .. } => match prefix {
            Some(p) if !p.is_empty() => format!("{p}:{local}"),
            _ => local.clone(),
        },
        XdmAtomicValue::DateTime(dt) => {
            let d = dt.date_naive();
            format!(
                "{}T{}{}",
                format_date(d.year(), d.month(), d.day()),
                format_time(&dt.time()),
                format_tz(Some(*dt.offset()))
            )
        }
        XdmAtomicValue::Date { date, tz } => format!(
            "{}{}",
            format_date(date.year(), date.month(), date.day()),
            format_tz(*tz)
        ),
        XdmAtomicValue::Time { time, tz } => format!("{}{}", format_time(time), format_tz(*tz)),
        XdmAtomicValue::YearMonthDuration(m) => format_year_month(*m),
        XdmAtomicValue::DayTimeDuration(ms) => format_day_time(*ms),
    }
}

/// Canonical `xs:double` form: plain notation for magnitudes in [1e-6, 1e6),
/// otherwise scientific with at least one fraction digit in the mantissa.
pub fn format_double(d: f64) -> String {
    if d.is_nan() {
        return "NaN".into();
    }
    if d.is_infinite() {
        return if d > 0.0 { "INF".into() } else { "-INF".into() };
    }
    if d == 0.0 {
        return if d.is_sign_negative() { "-0".into() } else { "0".into() };
    }
    let abs = d.abs();
    if (1e-6..1e6).contains(&abs) {
        format!("{d}")
    } else {
        scientific(&format!("{d:E}"))
    }
}

pub fn format_float(f: f32) -> String {
    if f.is_nan() {
        return "NaN".into();
    }
    if f.is_infinite() {
        return if f > 0.0 { "INF".into() } else { "-INF".into() };
    }
    if f == 0.0 {
        return if f.is_sign_negative() { "-0".into() } else { "0".into() };
    }
    let abs = f.abs();
    if (1e-6..1e6).contains(&abs) {
        format!("{f}")
    } else {
        scientific(&format!("{f:E}"))
    }
}

fn scientific(raw: &str) -> String {
    match raw.split_once('E') {
        Some((mantissa, exp)) if !mantissa.contains('.') => format!("{mantissa}.0E{exp}"),
        _ => raw.to_string(),
    }
}

fn format_date(year: i32, month: u32, day: u32) -> String {
    if year < 0 {
        format!("-{:04}-{month:02}-{day:02}", -year)
    } else {
        format!("{year:04}-{month:02}-{day:02}")
    }
}

fn format_time(t: &NaiveTime) -> String {
    let mut s = format!("{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second());
    let nanos = t.nanosecond() % 1_000_000_000;
    if nanos > 0 {
        let frac = format!("{nanos:09}");
        s.push('.');
        s.push_str(frac.trim_end_matches('0'));
    }
    s
}

pub(crate) fn format_tz(tz: Option<FixedOffset>) -> String {
    let Some(tz) = tz else {
        return String::new();
    };
    let secs = tz.local_minus_utc();
    if secs == 0 {
        return "Z".into();
    }
    let sign = if secs < 0 { '-' } else { '+' };
    let mins = secs.unsigned_abs() / 60;
    format!("{sign}{:02}:{:02}", mins / 60, mins % 60)
}

fn format_year_month(months: i32) -> String {
    if months == 0 {
        return "P0M".into();
    }
    let sign = if months < 0 { "-" } else { "" };
    let m = months.unsigned_abs();
    let (y, rem) = (m / 12, m % 12);
    let mut s = format!("{sign}P");
    if y > 0 {
        s.push_str(&format!("{y}Y"));
    }
    if rem > 0 {
        s.push_str(&format!("{rem}M"));
    }
    s
}

fn format_day_time(ms: i64) -> String {
    if ms == 0 {
        return "PT0S".into();
    }
    let sign = if ms < 0 { "-" } else { "" };
    let mut rest = ms.unsigned_abs();
    let days = rest / 86_400_000;
    rest %= 86_400_000;
    let hours = rest / 3_600_000;
    rest %= 3_600_000;
    let minutes = rest / 60_000;
    rest %= 60_000;
    let (secs, millis) = (rest / 1000, rest % 1000);
    let mut s = format!("{sign}P");
    if days > 0 {
        s.push_str(&format!("{days}D"));
    }
    if hours > 0 || minutes > 0 || secs > 0 || millis > 0 {
        s.push('T');
        if hours > 0 {
            s.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            s.push_str(&format!("{minutes}M"));
        }
        if secs > 0 || millis > 0 {
            if millis > 0 {
                let frac = format!("{millis:03}");
                s.push_str(&format!("{secs}.{}S", frac.trim_end_matches('0')));
            } else {
                s.push_str(&format!("{secs}S"));
            }
        }
    }
    s
}
