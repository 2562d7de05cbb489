//! Picture-string compiler and renderer behind `fn:format-number`.
//!
//! A picture is compiled once per (picture, symbol set) pair into a
//! [`DecimalPicture`] holding one or two [`SubPicture`]s; rendering then only
//! performs decimal rounding, padding, grouping and digit remapping.
use crate::engine::decimal_format::DecimalFormatSymbols;
use crate::engine::numeric::DecimalDigits;
use crate::engine::runtime::{Error, ErrorCode};
use crate::xdm::XdmAtomicValue;
use smallvec::SmallVec;

/// Where grouping separators go in the integer part, counted in digits
/// leftwards from the decimal point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grouping {
    None,
    /// A separator every `n` digits.
    Regular(usize),
    /// Separators at exactly these offsets.
    Positions(SmallVec<[usize; 4]>),
}

impl Grouping {
    fn separator_before(&self, digits_to_the_right: usize) -> bool {
        match self {
            Grouping::None => false,
            Grouping::Regular(n) => digits_to_the_right % n == 0,
            Grouping::Positions(p) => p.contains(&digits_to_the_right),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubPicture {
    pub prefix: String,
    pub suffix: String,
    pub min_whole_digits: usize,
    pub max_whole_digits: usize,
    pub min_fraction_digits: usize,
    pub max_fraction_digits: usize,
    pub is_percent: bool,
    pub is_per_mille: bool,
    pub whole_grouping: Grouping,
    /// Offsets counted rightwards from the decimal point.
    pub fraction_grouping: SmallVec<[usize; 4]>,
}

fn picture_error(msg: impl Into<String>) -> Error {
    Error::from_code(ErrorCode::FODF1310, msg)
}

// Scan phases: prefix, whole digit signs, whole zero digits, fraction zero
// digits (after the separator), fraction digit signs, suffix.
const PREFIX: u8 = 0;
const WHOLE_DIGITS: u8 = 1;
const WHOLE_ZEROS: u8 = 2;
const FRACTION_ZEROS: u8 = 3;
const FRACTION_DIGITS: u8 = 4;
const SUFFIX: u8 = 5;

impl SubPicture {
    pub fn parse(picture: &str, symbols: &DecimalFormatSymbols) -> Result<Self, Error> {
        let mut phase = PREFIX;
        let (mut min_whole, mut max_whole, mut min_frac, mut max_frac) = (0usize, 0, 0, 0);
        let mut whole_marks: SmallVec<[usize; 4]> = SmallVec::new();
        let mut frac_marks: SmallVec<[usize; 4]> = SmallVec::new();
        let (mut prefix, mut suffix) = (String::new(), String::new());
        let (mut is_percent, mut is_per_mille) = (false, false);
        let misplaced = |c: char| {
            picture_error(format!(
                "active character '{c}' follows a passive character in picture '{picture}'"
            ))
        };

        for c in picture.chars() {
            if c == symbols.digit {
                phase = match phase {
                    PREFIX | WHOLE_DIGITS => {
                        max_whole += 1;
                        WHOLE_DIGITS
                    }
                    WHOLE_ZEROS => {
                        return Err(picture_error(format!(
                            "digit sign follows a zero-digit sign in the integer part of '{picture}'"
                        )));
                    }
                    FRACTION_ZEROS | FRACTION_DIGITS => {
                        max_frac += 1;
                        FRACTION_DIGITS
                    }
                    _ => return Err(misplaced(c)),
                };
            } else if symbols.digit_value(c).is_some() {
                phase = match phase {
                    PREFIX | WHOLE_DIGITS | WHOLE_ZEROS => {
                        min_whole += 1;
                        max_whole += 1;
                        WHOLE_ZEROS
                    }
                    FRACTION_ZEROS => {
                        min_frac += 1;
                        max_frac += 1;
                        FRACTION_ZEROS
                    }
                    FRACTION_DIGITS => {
                        return Err(picture_error(format!(
                            "zero-digit sign follows a digit sign in the fractional part of '{picture}'"
                        )));
                    }
                    _ => return Err(misplaced(c)),
                };
            } else if c == symbols.grouping_separator {
                match phase {
                    PREFIX | WHOLE_DIGITS | WHOLE_ZEROS => {
                        whole_marks.push(max_whole);
                        if phase == PREFIX {
                            phase = WHOLE_DIGITS;
                        }
                    }
                    FRACTION_ZEROS | FRACTION_DIGITS => frac_marks.push(max_frac),
                    _ => return Err(misplaced(c)),
                }
            } else if c == symbols.decimal_separator {
                phase = match phase {
                    PREFIX | WHOLE_DIGITS | WHOLE_ZEROS => FRACTION_ZEROS,
                    FRACTION_ZEROS | FRACTION_DIGITS => {
                        return Err(picture_error(format!(
                            "more than one decimal separator in '{picture}'"
                        )));
                    }
                    _ => return Err(misplaced(c)),
                };
            } else {
                if c == symbols.percent || c == symbols.per_mille {
                    if is_percent || is_per_mille {
                        return Err(picture_error(format!(
                            "more than one percent or per-mille sign in '{picture}'"
                        )));
                    }
                    is_percent = c == symbols.percent;
                    is_per_mille = c == symbols.per_mille;
                }
                if phase == PREFIX {
                    prefix.push(c);
                } else {
                    phase = SUFFIX;
                    suffix.push(c);
                }
            }
        }

        if max_whole + max_frac == 0 {
            return Err(picture_error(format!(
                "picture '{picture}' contains no digit or zero-digit sign"
            )));
        }
        if whole_marks.windows(2).any(|w| w[0] == w[1]) || frac_marks.windows(2).any(|w| w[0] == w[1]) {
            return Err(picture_error(format!(
                "adjacent grouping separators in '{picture}'"
            )));
        }
        if whole_marks.last() == Some(&max_whole) || frac_marks.first() == Some(&0) {
            return Err(picture_error(format!(
                "grouping separator adjacent to the decimal separator in '{picture}'"
            )));
        }
        if frac_marks.last() == Some(&max_frac) {
            return Err(picture_error(format!(
                "grouping separator at the end of the fractional part of '{picture}'"
            )));
        }

        if min_whole == 0 && max_frac == 0 {
            min_whole = 1;
        }

        Ok(Self {
            prefix,
            suffix,
            min_whole_digits: min_whole,
            max_whole_digits: max_whole,
            min_fraction_digits: min_frac,
            max_fraction_digits: max_frac,
            is_percent,
            is_per_mille,
            whole_grouping: Self::collapse(&whole_marks, max_whole),
            fraction_grouping: frac_marks,
        })
    }

    /// Turns left-to-right marks into offsets from the decimal point and
    /// detects the evenly spaced case.
    fn collapse(marks: &[usize], max_whole: usize) -> Grouping {
        if marks.is_empty() {
            return Grouping::None;
        }
        let offsets: SmallVec<[usize; 4]> = marks.iter().rev().map(|m| max_whole - m).collect();
        let first = offsets[0];
        if offsets.iter().enumerate().all(|(i, &o)| o == first * (i + 1)) {
            Grouping::Regular(first)
        } else {
            Grouping::Positions(offsets)
        }
    }

    fn render(
        &self,
        mut digits: DecimalDigits,
        minus: bool,
        symbols: &DecimalFormatSymbols,
    ) -> String {
        if self.is_percent {
            digits.shift(2);
        } else if self.is_per_mille {
            digits.shift(3);
        }
        digits.round_half_even(i32::try_from(self.max_fraction_digits).unwrap_or(i32::MAX));
        let mut whole = digits.whole_part();
        let mut fraction = digits.fraction_part();
        if fraction.len() < self.min_fraction_digits {
            fraction.extend(std::iter::repeat_n('0', self.min_fraction_digits - fraction.len()));
        }
        if whole.len() < self.min_whole_digits {
            let pad = "0".repeat(self.min_whole_digits - whole.len());
            whole.insert_str(0, &pad);
        }
        if whole.is_empty() && fraction.is_empty() {
            whole.push('0');
        }

        let mut out = String::with_capacity(self.prefix.len() + whole.len() + fraction.len() + 8);
        if minus {
            out.push(symbols.minus_sign);
        }
        out.push_str(&self.prefix);
        let len = whole.len();
        for (i, b) in whole.bytes().enumerate() {
            if i > 0 && self.whole_grouping.separator_before(len - i) {
                out.push(symbols.grouping_separator);
            }
            out.push(symbols.map_digit(b));
        }
        if !fraction.is_empty() {
            out.push(symbols.decimal_separator);
            for (i, b) in fraction.bytes().enumerate() {
                if i > 0 && self.fraction_grouping.contains(&i) {
                    out.push(symbols.grouping_separator);
                }
                out.push(symbols.map_digit(b));
            }
        }
        out.push_str(&self.suffix);
        out
    }
}

/// A compiled picture string: the positive sub-picture and an optional
/// explicit negative one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalPicture {
    pub positive: SubPicture,
    pub negative: Option<SubPicture>,
}

impl DecimalPicture {
    pub fn compile(picture: &str, symbols: &DecimalFormatSymbols) -> Result<Self, Error> {
        let mut parts = picture.split(symbols.pattern_separator);
        let positive = SubPicture::parse(parts.next().unwrap_or_default(), symbols)?;
        let negative = parts
            .next()
            .map(|p| SubPicture::parse(p, symbols))
            .transpose()?;
        if parts.next().is_some() {
            return Err(picture_error(format!(
                "more than one pattern separator in '{picture}'"
            )));
        }
        Ok(Self { positive, negative })
    }

    pub fn format(
        &self,
        value: &XdmAtomicValue,
        symbols: &DecimalFormatSymbols,
    ) -> Result<String, Error> {
        let negative = match value {
            XdmAtomicValue::Double(d) if d.is_nan() => return Ok(symbols.nan.clone()),
            XdmAtomicValue::Float(f) if f.is_nan() => return Ok(symbols.nan.clone()),
            XdmAtomicValue::Integer(i) => *i < 0,
            XdmAtomicValue::Decimal(d) => d.is_sign_negative() && !d.is_zero(),
            XdmAtomicValue::Double(d) => *d < 0.0,
            XdmAtomicValue::Float(f) => *f < 0.0,
            other => {
                return Err(Error::from_code(
                    ErrorCode::XPTY0004,
                    format!("format-number expects a numeric value, got {}", other.atomic_type()),
                ));
            }
        };
        let (sub, minus) = match (&self.negative, negative) {
            (Some(n), true) => (n, false),
            (None, true) => (&self.positive, true),
            _ => (&self.positive, false),
        };
        let Some(digits) = DecimalDigits::from_atomic(value) else {
            // only infinities remain
            let mut out = String::new();
            if minus {
                out.push(symbols.minus_sign);
            }
            out.push_str(&sub.prefix);
            out.push_str(&symbols.infinity);
            out.push_str(&sub.suffix);
            return Ok(out);
        };
        Ok(sub.render(digits, minus, symbols))
    }
}

/// Format `value` against an already compiled picture.
pub fn format_number(
    value: &XdmAtomicValue,
    picture: &DecimalPicture,
    symbols: &DecimalFormatSymbols,
) -> Result<String, Error> {
    picture.format(value, symbols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use smallvec::smallvec;

    fn fmt(v: XdmAtomicValue, picture: &str) -> String {
        let symbols = DecimalFormatSymbols::default();
        DecimalPicture::compile(picture, &symbols)
            .unwrap()
            .format(&v, &symbols)
            .unwrap()
    }

    #[test]
    fn phases_collect_digit_counts() {
        let p = SubPicture::parse("$#,##0.00#", &DecimalFormatSymbols::default()).unwrap();
        assert_eq!(p.prefix, "$");
        assert_eq!((p.min_whole_digits, p.max_whole_digits), (1, 4));
        assert_eq!((p.min_fraction_digits, p.max_fraction_digits), (2, 3));
        assert_eq!(p.whole_grouping, Grouping::Regular(3));
    }

    #[test]
    fn uneven_grouping_keeps_positions() {
        let p = SubPicture::parse("#,##,##0", &DecimalFormatSymbols::default()).unwrap();
        assert_eq!(p.whole_grouping, Grouping::Positions(smallvec![3, 5]));
        assert_eq!(fmt(XdmAtomicValue::Integer(1_234_567), "#,##,##0"), "12,34,567");
    }

    #[test]
    fn regular_and_positional_grouping_agree() {
        let symbols = DecimalFormatSymbols::default();
        let regular = SubPicture::parse("#,###,###,##0", &symbols).unwrap();
        assert_eq!(regular.whole_grouping, Grouping::Regular(3));
        let positional = SubPicture {
            whole_grouping: Grouping::Positions(smallvec![3, 6, 9]),
            ..regular.clone()
        };
        for v in [0_u128, 7, 999, 1000, 65_536, 1_234_567, 999_999_999, 4_294_967_296] {
            let a = regular.render(DecimalDigits::from_u128(v), false, &symbols);
            let b = positional.render(DecimalDigits::from_u128(v), false, &symbols);
            assert_eq!(a, b, "{v}");
        }
    }

    #[rstest]
    #[case("#,##0.00", "1,234,567.50")]
    #[case("0.00", "1234567.50")]
    #[case("#", "1234568")]
    #[case("#,###.#", "1,234,567.5")]
    #[case("000,000,000.000", "001,234,567.500")]
    fn grouping_and_padding(#[case] picture: &str, #[case] expected: &str) {
        assert_eq!(fmt(XdmAtomicValue::Double(1_234_567.5), picture), expected);
    }

    #[rstest]
    #[case("##0.##", "")]
    #[case("#.#.#", "more than one decimal separator")]
    #[case("0#", "digit sign follows")]
    #[case("#.0#0", "zero-digit sign follows")]
    #[case("#,,##0", "adjacent grouping")]
    #[case("#,.00", "adjacent to the decimal")]
    #[case("#.00,", "end of the fractional part")]
    #[case("0.0,0#,%", "end of the fractional part")]
    #[case("0.0,0", "")]
    #[case("%#0%", "more than one percent")]
    #[case("#a0", "active character")]
    #[case("abc", "no digit")]
    #[case("#;#;#", "more than one pattern separator")]
    fn picture_errors(#[case] picture: &str, #[case] fragment: &str) {
        let res = DecimalPicture::compile(picture, &DecimalFormatSymbols::default());
        if fragment.is_empty() {
            assert!(res.is_ok());
        } else {
            let err = res.unwrap_err();
            assert_eq!(err.code_enum(), ErrorCode::FODF1310);
            assert!(err.message.contains(fragment), "{}", err.message);
        }
    }

    #[test]
    fn negative_sub_picture_and_implicit_minus() {
        assert_eq!(fmt(XdmAtomicValue::Integer(-6), "000"), "-006");
        assert_eq!(fmt(XdmAtomicValue::Integer(-6), "000;(000)"), "(006)");
        assert_eq!(fmt(XdmAtomicValue::Integer(6), "000;(000)"), "006");
    }

    #[test]
    fn percent_and_per_mille_scale() {
        assert_eq!(fmt(XdmAtomicValue::Double(0.14), "01%"), "14%");
        assert_eq!(fmt(XdmAtomicValue::Double(0.4857), "###.###%"), "48.57%");
        assert_eq!(fmt(XdmAtomicValue::Double(0.0123), "#0\u{2030}"), "12\u{2030}");
    }

    #[test]
    fn rounding_is_decimal_half_even() {
        assert_eq!(fmt(XdmAtomicValue::Double(1.005), "0.00"), "1.00");
        assert_eq!(fmt(XdmAtomicValue::Double(1.015), "0.00"), "1.02");
        assert_eq!(fmt(XdmAtomicValue::Double(0.125), "0.00"), "0.12");
    }

    #[test]
    fn special_values_use_symbol_strings() {
        assert_eq!(fmt(XdmAtomicValue::Double(f64::NAN), "#;(#)"), "NaN");
        assert_eq!(fmt(XdmAtomicValue::Double(f64::INFINITY), "$#"), "$Infinity");
        assert_eq!(fmt(XdmAtomicValue::Double(f64::NEG_INFINITY), "#"), "-Infinity");
    }

    #[test]
    fn zero_without_integer_digits() {
        assert_eq!(fmt(XdmAtomicValue::Double(0.0), "#.##"), "0");
        assert_eq!(fmt(XdmAtomicValue::Double(0.5), "#.##"), ".5");
        assert_eq!(fmt(XdmAtomicValue::Double(0.0), "#"), "0");
    }

    #[test]
    fn large_values_are_exact() {
        assert_eq!(
            fmt(XdmAtomicValue::Double(1e25), "#,###"),
            "10,000,000,000,000,000,000,000"
        );
    }

    #[test]
    fn digit_family_is_remapped() {
        let symbols = DecimalFormatSymbols {
            zero_digit: '\u{0660}',
            ..DecimalFormatSymbols::default()
        };
        let pic = DecimalPicture::compile("\u{0660}.\u{0660}\u{0660}", &symbols).unwrap();
        let out = pic.format(&XdmAtomicValue::Double(3.5), &symbols).unwrap();
        assert_eq!(out, "\u{0663}.\u{0665}\u{0660}");
    }
}
