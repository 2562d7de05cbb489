//! Numeric tower helpers: type promotion, overflow-aware arithmetic and an
//! exact decimal digit representation used for rounding and formatting.
use crate::engine::runtime::{Error, ErrorCode};
use crate::xdm::XdmAtomicValue;
use core::cmp::Ordering;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum NumericKind {
    Integer,
    Decimal,
    Float,
    Double,
}

impl NumericKind {
    pub fn promote(self, other: NumericKind) -> NumericKind {
        self.max(other)
    }
}

/// A value of one of the four primitive numeric types.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    Integer(i64),
    Decimal(Decimal),
    Float(f32),
    Double(f64),
}

impl Number {
    pub fn from_atomic(a: &XdmAtomicValue) -> Option<Number> {
        Some(match a {
            XdmAtomicValue::Integer(i) => Number::Integer(*i),
            XdmAtomicValue::Decimal(d) => Number::Decimal(*d),
            XdmAtomicValue::Float(f) => Number::Float(*f),
            XdmAtomicValue::Double(d) => Number::Double(*d),
            _ => return None,
        })
    }

    pub fn into_atomic(self) -> XdmAtomicValue {
        match self {
            Number::Integer(i) => XdmAtomicValue::Integer(i),
            Number::Decimal(d) => XdmAtomicValue::Decimal(d),
            Number::Float(f) => XdmAtomicValue::Float(f),
            Number::Double(d) => XdmAtomicValue::Double(d),
        }
    }

    pub fn kind(&self) -> NumericKind {
        match self {
            Number::Integer(_) => NumericKind::Integer,
            Number::Decimal(_) => NumericKind::Decimal,
            Number::Float(_) => NumericKind::Float,
            Number::Double(_) => NumericKind::Double,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Integer(i) => *i as f64,
            Number::Decimal(d) => d.to_f64().unwrap_or(f64::NAN),
            Number::Float(f) => f64::from(*f),
            Number::Double(d) => *d,
        }
    }

    pub fn is_nan(&self) -> bool {
        match self {
            Number::Float(f) => f.is_nan(),
            Number::Double(d) => d.is_nan(),
            _ => false,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn promote_to(self, kind: NumericKind) -> Number {
        if self.kind() >= kind {
            return self;
        }
        match (self, kind) {
            (Number::Integer(i), NumericKind::Decimal) => Number::Decimal(Decimal::from(i)),
            (Number::Integer(i), NumericKind::Float) => Number::Float(i as f32),
            (Number::Decimal(d), NumericKind::Float) => Number::Float(d.to_f32().unwrap_or(f32::NAN)),
            (Number::Float(f), NumericKind::Double) => Number::Double(f64::from(f)),
            (n, NumericKind::Double) => Number::Double(n.to_f64()),
            (n, _) => n,
        }
    }

    /// Addition with type promotion. Integer overflow widens to decimal;
    /// decimal overflow is `FOAR0002`.
    pub fn add(self, other: Number) -> Result<Number, Error> {
        let kind = self.kind().promote(other.kind());
        Ok(match (self.promote_to(kind), other.promote_to(kind)) {
            (Number::Integer(a), Number::Integer(b)) => match a.checked_add(b) {
                Some(v) => Number::Integer(v),
                None => Number::Decimal(decimal_add(Decimal::from(a), Decimal::from(b))?),
            },
            (Number::Decimal(a), Number::Decimal(b)) => Number::Decimal(decimal_add(a, b)?),
            (Number::Float(a), Number::Float(b)) => Number::Float(a + b),
            (a, b) => Number::Double(a.to_f64() + b.to_f64()),
        })
    }

    /// Division by an item count; integer sums produce decimals.
    #[allow(clippy::cast_precision_loss)]
    pub fn div_count(self, count: usize) -> Result<Number, Error> {
        if count == 0 {
            return Err(Error::from_code(ErrorCode::FOAR0001, "division by zero"));
        }
        let overflow = || Error::from_code(ErrorCode::FOAR0002, "decimal overflow");
        Ok(match self {
            Number::Integer(i) => Number::Decimal(
                Decimal::from(i)
                    .checked_div(Decimal::from(count))
                    .ok_or_else(overflow)?,
            ),
            Number::Decimal(d) => {
                Number::Decimal(d.checked_div(Decimal::from(count)).ok_or_else(overflow)?)
            }
            Number::Float(f) => Number::Float(f / count as f32),
            Number::Double(d) => Number::Double(d / count as f64),
        })
    }

    pub fn compare(&self, other: &Number) -> Option<Ordering> {
        let kind = self.kind().promote(other.kind());
        match (self.promote_to(kind), other.promote_to(kind)) {
            (Number::Integer(a), Number::Integer(b)) => Some(a.cmp(&b)),
            (Number::Decimal(a), Number::Decimal(b)) => Some(a.cmp(&b)),
            (a, b) => a.to_f64().partial_cmp(&b.to_f64()),
        }
    }

    pub fn abs(self) -> Result<Number, Error> {
        Ok(match self {
            Number::Integer(i) => Number::Integer(
                i.checked_abs()
                    .ok_or_else(|| Error::from_code(ErrorCode::FOAR0002, "integer overflow"))?,
            ),
            Number::Decimal(d) => Number::Decimal(d.abs()),
            Number::Float(f) => Number::Float(f.abs()),
            Number::Double(d) => Number::Double(d.abs()),
        })
    }

    pub fn floor(self) -> Number {
        match self {
            Number::Decimal(d) => Number::Decimal(d.floor()),
            Number::Float(f) => Number::Float(f.floor()),
            Number::Double(d) => Number::Double(d.floor()),
            n @ Number::Integer(_) => n,
        }
    }

    pub fn ceiling(self) -> Number {
        match self {
            Number::Decimal(d) => Number::Decimal(d.ceil()),
            Number::Float(f) => Number::Float(f.ceil()),
            Number::Double(d) => Number::Double(d.ceil()),
            n @ Number::Integer(_) => n,
        }
    }

    /// `fn:round`: halves round towards positive infinity.
    #[allow(clippy::cast_possible_truncation)]
    pub fn round(self) -> Number {
        match self {
            Number::Decimal(d) => {
                let strategy = if d.is_sign_negative() {
                    RoundingStrategy::MidpointTowardZero
                } else {
                    RoundingStrategy::MidpointAwayFromZero
                };
                Number::Decimal(d.round_dp_with_strategy(0, strategy))
            }
            Number::Float(f) => Number::Float(round_half_up(f64::from(f)) as f32),
            Number::Double(d) => Number::Double(round_half_up(d)),
            n @ Number::Integer(_) => n,
        }
    }

    /// `fn:round-half-to-even` at `precision` fraction digits (negative
    /// precision rounds to tens, hundreds, ...).
    pub fn round_half_to_even(self, precision: i64) -> Result<Number, Error> {
        let precision = i32::try_from(precision.clamp(-400, 400)).unwrap_or(0);
        Ok(match self {
            Number::Integer(i) if precision >= 0 => Number::Integer(i),
            Number::Integer(i) => Number::Integer(round_integer_half_even(i, precision)),
            Number::Decimal(d) => Number::Decimal(round_decimal_half_even(d, precision)?),
            Number::Double(d) => Number::Double(round_double_half_even(d, precision)),
            #[allow(clippy::cast_possible_truncation)]
            Number::Float(f) => {
                if !f.is_finite() || f == 0.0 {
                    Number::Float(f)
                } else {
                    let mut digits = DecimalDigits::from_f32(f.abs());
                    digits.round_half_even(precision);
                    Number::Float(f.signum() * digits.to_f64() as f32)
                }
            }
        })
    }
}

fn decimal_add(a: Decimal, b: Decimal) -> Result<Decimal, Error> {
    a.checked_add(b)
        .ok_or_else(|| Error::from_code(ErrorCode::FOAR0002, "decimal overflow"))
}

fn round_half_up(x: f64) -> f64 {
    // above 2^52 every double is integral
    if !x.is_finite() || x.fract() == 0.0 || x.abs() >= 4_503_599_627_370_496.0 {
        return x;
    }
    let r = (x + 0.5).floor();
    if r == 0.0 && x < 0.0 { -0.0 } else { r }
}

fn round_integer_half_even(i: i64, precision: i32) -> i64 {
    let k = precision.unsigned_abs();
    if k > 18 {
        return 0;
    }
    let factor = 10_i128.pow(k);
    let v = i128::from(i);
    let q = v.div_euclid(factor);
    let r = v.rem_euclid(factor);
    let twice = r * 2;
    let q = match twice.cmp(&factor) {
        Ordering::Less => q,
        Ordering::Greater => q + 1,
        Ordering::Equal => {
            if q % 2 == 0 {
                q
            } else {
                q + 1
            }
        }
    };
    i64::try_from(q * factor).unwrap_or(i)
}

fn round_decimal_half_even(d: Decimal, precision: i32) -> Result<Decimal, Error> {
    if precision >= 0 {
        let dp = u32::try_from(precision).unwrap_or(u32::MAX).min(28);
        return Ok(d.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven));
    }
    let k = precision.unsigned_abs();
    if k > 28 {
        return Ok(Decimal::ZERO);
    }
    let factor = Decimal::from_i128_with_scale(10_i128.pow(k), 0);
    let overflow = || Error::from_code(ErrorCode::FOAR0002, "decimal overflow");
    let scaled = d.checked_div(factor).ok_or_else(overflow)?;
    scaled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .checked_mul(factor)
        .ok_or_else(overflow)
}

fn round_double_half_even(d: f64, precision: i32) -> f64 {
    if !d.is_finite() || d == 0.0 {
        return d;
    }
    let mut digits = DecimalDigits::from_f64(d.abs());
    digits.round_half_even(precision);
    let r = digits.to_f64();
    if d < 0.0 { -r } else { r }
}

/// Nearest integer, ties to even; used for `subsequence` and `substring` positions.
pub fn round_half_to_even_f64(x: f64) -> f64 {
    x.round_ties_even()
}

/// Exact non-negative decimal: `0.d1d2d3... × 10^exponent`.
///
/// `digits` holds ASCII digits without leading or trailing zeros; an empty
/// digit string is zero. Doubles and floats enter through their shortest
/// round-trip representation, so `0.1` is exactly one tenth here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalDigits {
    digits: Vec<u8>,
    exponent: i32,
}

impl DecimalDigits {
    pub fn zero() -> Self {
        Self {
            digits: Vec::new(),
            exponent: 0,
        }
    }

    fn from_parts(digits: Vec<u8>, exponent: i32) -> Self {
        let mut d = Self { digits, exponent };
        d.normalize();
        d
    }

    pub fn from_u128(n: u128) -> Self {
        let digits = n.to_string().into_bytes();
        let exponent = i32::try_from(digits.len()).unwrap_or(i32::MAX);
        Self::from_parts(digits, exponent)
    }

    pub fn from_decimal(d: Decimal) -> Self {
        let digits = d.mantissa().unsigned_abs().to_string().into_bytes();
        let len = i32::try_from(digits.len()).unwrap_or(i32::MAX);
        let scale = i32::try_from(d.scale()).unwrap_or(0);
        Self::from_parts(digits, len - scale)
    }

    pub fn from_f64(x: f64) -> Self {
        Self::from_scientific(&format!("{:e}", x.abs()))
    }

    pub fn from_f32(x: f32) -> Self {
        Self::from_scientific(&format!("{:e}", x.abs()))
    }

    /// Parses Rust's shortest `{:e}` output, e.g. `1.2345e6`.
    fn from_scientific(s: &str) -> Self {
        let (mantissa, exp) = s.split_once('e').unwrap_or((s, "0"));
        let exp: i32 = exp.parse().unwrap_or(0);
        let digits: Vec<u8> = mantissa.bytes().filter(u8::is_ascii_digit).collect();
        Self::from_parts(digits, exp + 1)
    }

    /// Absolute value of a numeric atomic; `None` for NaN, infinities and non-numerics.
    pub fn from_atomic(a: &XdmAtomicValue) -> Option<Self> {
        match a {
            XdmAtomicValue::Integer(i) => Some(Self::from_u128(u128::from(i.unsigned_abs()))),
            XdmAtomicValue::Decimal(d) => Some(Self::from_decimal(*d)),
            XdmAtomicValue::Double(d) if d.is_finite() => Some(Self::from_f64(*d)),
            XdmAtomicValue::Float(f) if f.is_finite() => Some(Self::from_f32(*f)),
            _ => None,
        }
    }

    fn normalize(&mut self) {
        let lead = self.digits.iter().take_while(|&&d| d == b'0').count();
        if lead > 0 {
            self.digits.drain(..lead);
            self.exponent -= i32::try_from(lead).unwrap_or(0);
        }
        while self.digits.last() == Some(&b'0') {
            self.digits.pop();
        }
        if self.digits.is_empty() {
            self.exponent = 0;
        }
    }

    pub fn is_zero(&self) -> bool {
        self.digits.is_empty()
    }

    /// Multiply by `10^places`.
    pub fn shift(&mut self, places: i32) {
        if !self.is_zero() {
            self.exponent += places;
        }
    }

    /// Round half-to-even, keeping `fraction_digits` digits after the point.
    pub fn round_half_even(&mut self, fraction_digits: i32) {
        let len = i32::try_from(self.digits.len()).unwrap_or(i32::MAX);
        let keep = self.exponent.saturating_add(fraction_digits);
        if keep >= len {
            return;
        }
        if keep < 0 {
            *self = Self::zero();
            return;
        }
        let keep = usize::try_from(keep).unwrap_or(0);
        let first_dropped = self.digits[keep];
        let rest_nonzero = self.digits[keep + 1..].iter().any(|&d| d != b'0');
        let previous_odd = keep > 0 && (self.digits[keep - 1] - b'0') % 2 == 1;
        let round_up = match first_dropped.cmp(&b'5') {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => rest_nonzero || previous_odd,
        };
        self.digits.truncate(keep);
        if round_up {
            let mut i = keep;
            loop {
                if i == 0 {
                    self.digits.insert(0, b'1');
                    self.exponent += 1;
                    break;
                }
                i -= 1;
                if self.digits[i] == b'9' {
                    self.digits[i] = b'0';
                } else {
                    self.digits[i] += 1;
                    break;
                }
            }
        }
        self.normalize();
    }

    /// Digits before the decimal point, without leading zeros.
    pub fn whole_part(&self) -> String {
        if self.exponent <= 0 {
            return String::new();
        }
        let exp = usize::try_from(self.exponent).unwrap_or(0);
        let mut s: String = self.digits[..exp.min(self.digits.len())]
            .iter()
            .map(|&b| b as char)
            .collect();
        s.extend(std::iter::repeat_n('0', exp.saturating_sub(self.digits.len())));
        s
    }

    /// Digits after the decimal point, without trailing zeros.
    pub fn fraction_part(&self) -> String {
        let len = i32::try_from(self.digits.len()).unwrap_or(i32::MAX);
        if self.exponent >= len {
            return String::new();
        }
        let zeros = usize::try_from(-self.exponent).unwrap_or(0);
        let start = usize::try_from(self.exponent.max(0)).unwrap_or(0);
        let mut s: String = std::iter::repeat_n('0', zeros).collect();
        s.extend(self.digits[start..].iter().map(|&b| b as char));
        s
    }

    pub fn to_f64(&self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        let digits: String = self.digits.iter().map(|&b| b as char).collect();
        format!("0.{digits}e{}", self.exponent)
            .parse()
            .unwrap_or(f64::NAN)
    }
}

fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Lexical check shared by the numeric parsers: `sign? digits ('.' digits)? exponent?`.
fn numeric_shape(s: &str, allow_point: bool, allow_exp: bool) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exp) = match body.find(['e', 'E']) {
        Some(i) if allow_exp => (&body[..i], Some(&body[i + 1..])),
        Some(_) => return false,
        None => (body, None),
    };
    let (int, frac) = match mantissa.split_once('.') {
        Some(_) if !allow_point => return false,
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    let digits_ok = |t: &str| t.bytes().all(|b| b.is_ascii_digit());
    if !(digits_ok(int) && digits_ok(frac)) || int.len() + frac.len() == 0 {
        return false;
    }
    match exp {
        None => true,
        Some(e) => {
            let e = e.strip_prefix(['+', '-']).unwrap_or(e);
            !e.is_empty() && digits_ok(e)
        }
    }
}

/// `xs:double` lexical space (`INF`, `-INF`, `NaN` included).
pub fn parse_double_lexical(s: &str) -> Result<f64, Error> {
    let t = s.trim_matches(is_xml_space);
    match t {
        "INF" => return Ok(f64::INFINITY),
        "-INF" => return Ok(f64::NEG_INFINITY),
        "NaN" => return Ok(f64::NAN),
        _ => {}
    }
    if !numeric_shape(t, true, true) {
        return Err(Error::from_code(
            ErrorCode::FORG0001,
            format!("invalid lexical form for xs:double: '{s}'"),
        ));
    }
    t.parse::<f64>().map_err(|_| {
        Error::from_code(ErrorCode::FORG0001, format!("invalid xs:double: '{s}'"))
    })
}

pub fn parse_decimal_lexical(s: &str) -> Result<Decimal, Error> {
    let t = s.trim_matches(is_xml_space);
    if !numeric_shape(t, true, false) {
        return Err(Error::from_code(
            ErrorCode::FORG0001,
            format!("invalid lexical form for xs:decimal: '{s}'"),
        ));
    }
    let t = t.strip_prefix('+').unwrap_or(t);
    let t = if t.ends_with('.') { &t[..t.len() - 1] } else { t };
    let t = if t.starts_with('.') || t.starts_with("-.") {
        std::borrow::Cow::Owned(t.replacen('.', "0.", 1))
    } else {
        std::borrow::Cow::Borrowed(t)
    };
    t.parse::<Decimal>().map_err(|_| {
        Error::from_code(ErrorCode::FOAR0002, format!("xs:decimal out of range: '{s}'"))
    })
}

pub fn parse_integer_lexical(s: &str) -> Result<i64, Error> {
    let t = s.trim_matches(is_xml_space);
    if !numeric_shape(t, false, false) {
        return Err(Error::from_code(
            ErrorCode::FORG0001,
            format!("invalid lexical form for xs:integer: '{s}'"),
        ));
    }
    t.parse::<i64>().map_err(|_| {
        Error::from_code(ErrorCode::FOAR0002, format!("xs:integer out of range: '{s}'"))
    })
}

/// `xs:decimal` from a double; NaN and infinities cannot be represented.
pub fn decimal_from_f64(d: f64) -> Result<Decimal, Error> {
    if !d.is_finite() {
        return Err(Error::from_code(
            ErrorCode::FORG0001,
            format!("cannot convert {d} to xs:decimal"),
        ));
    }
    Decimal::from_f64(d)
        .ok_or_else(|| Error::from_code(ErrorCode::FOAR0002, "value out of xs:decimal range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn integer_overflow_widens_to_decimal() {
        let r = Number::Integer(i64::MAX).add(Number::Integer(1)).unwrap();
        assert_eq!(
            r,
            Number::Decimal(Decimal::from(i64::MAX) + Decimal::ONE)
        );
    }

    #[test]
    fn digits_from_double_use_shortest_form() {
        let d = DecimalDigits::from_f64(0.1 + 0.2);
        assert_eq!(d.fraction_part(), "30000000000000004");
        let d = DecimalDigits::from_f64(1234567.5);
        assert_eq!(d.whole_part(), "1234567");
        assert_eq!(d.fraction_part(), "5");
    }

    #[rstest]
    #[case(1.005, 2, "1", "")]
    #[case(2.5, 0, "2", "")]
    #[case(3.5, 0, "4", "")]
    #[case(0.125, 2, "", "12")]
    #[case(9.995, 2, "10", "")]
    #[case(9.9949, 2, "9", "99")]
    #[case(0.4, -1, "", "")]
    fn half_even_on_decimal_digits(
        #[case] v: f64,
        #[case] places: i32,
        #[case] whole: &str,
        #[case] frac: &str,
    ) {
        let mut d = DecimalDigits::from_f64(v);
        d.round_half_even(places);
        assert_eq!(d.whole_part(), whole);
        assert_eq!(d.fraction_part(), frac);
    }

    #[rstest]
    #[case(12345, -2, 12300)]
    #[case(1250, -2, 1200)]
    #[case(1350, -2, 1400)]
    #[case(-1250, -2, -1200)]
    fn integer_negative_precision(#[case] v: i64, #[case] p: i32, #[case] expected: i64) {
        assert_eq!(round_integer_half_even(v, p), expected);
    }

    #[test]
    fn round_goes_towards_positive_infinity() {
        assert_eq!(Number::Double(-2.5).round(), Number::Double(-2.0));
        assert_eq!(Number::Double(2.5).round(), Number::Double(3.0));
        let neg = Number::Double(-0.3).round();
        assert!(matches!(neg, Number::Double(z) if z == 0.0 && z.is_sign_negative()));
        assert_eq!(
            Number::Decimal(Decimal::new(-25, 1)).round(),
            Number::Decimal(Decimal::new(-2, 0))
        );
    }

    #[rstest]
    #[case(" 12 ", Some(12.0))]
    #[case("-1.5e3", Some(-1500.0))]
    #[case(".5", Some(0.5))]
    #[case("INF", Some(f64::INFINITY))]
    #[case("inf", None)]
    #[case("1e", None)]
    #[case("", None)]
    fn double_lexical(#[case] s: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_double_lexical(s).ok(), expected);
    }

    #[test]
    fn decimal_lexical_forms() {
        assert_eq!(parse_decimal_lexical("1.").unwrap(), Decimal::ONE);
        assert_eq!(parse_decimal_lexical("-.5").unwrap(), Decimal::new(-5, 1));
        assert!(parse_decimal_lexical("1e3").is_err());
    }
}
