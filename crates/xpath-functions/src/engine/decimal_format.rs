use crate::engine::runtime::{Error, ErrorCode};
use crate::xdm::ExpandedName;
use std::collections::HashMap;
use std::sync::Arc;

/// Characters and strings controlling `format-number`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalFormatSymbols {
    pub decimal_separator: char,
    pub grouping_separator: char,
    pub digit: char,
    /// First digit of the family used for output (`0`-`9` by default).
    pub zero_digit: char,
    pub pattern_separator: char,
    pub percent: char,
    pub per_mille: char,
    pub minus_sign: char,
    pub infinity: String,
    pub nan: String,
}

impl Default for DecimalFormatSymbols {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            grouping_separator: ',',
            digit: '#',
            zero_digit: '0',
            pattern_separator: ';',
            percent: '%',
            per_mille: '\u{2030}',
            minus_sign: '-',
            infinity: "Infinity".to_string(),
            nan: "NaN".to_string(),
        }
    }
}

impl DecimalFormatSymbols {
    /// Value of `c` within the zero-digit family, if it belongs to it.
    pub fn digit_value(&self, c: char) -> Option<u32> {
        let offset = (c as u32).checked_sub(self.zero_digit as u32)?;
        (offset <= 9).then_some(offset)
    }

    /// Maps an ASCII digit onto the configured digit family.
    pub fn map_digit(&self, ascii: u8) -> char {
        char::from_u32(self.zero_digit as u32 + u32::from(ascii - b'0')).unwrap_or(ascii as char)
    }

    /// Characters with a role in picture strings must be pairwise distinct,
    /// and the zero digit must start a run of ten numeric characters.
    pub fn validate(&self) -> Result<(), Error> {
        let zero_ok = (0..10).all(|i| {
            char::from_u32(self.zero_digit as u32 + i).is_some_and(char::is_numeric)
        });
        if !zero_ok {
            return Err(Error::static_err(
                ErrorCode::XTSE1300,
                format!("'{}' is not a zero digit", self.zero_digit),
            ));
        }
        let roles = [
            ("decimal-separator", self.decimal_separator),
            ("grouping-separator", self.grouping_separator),
            ("digit", self.digit),
            ("pattern-separator", self.pattern_separator),
            ("percent", self.percent),
            ("per-mille", self.per_mille),
        ];
        for (i, (name_a, a)) in roles.iter().enumerate() {
            if self.digit_value(*a).is_some() {
                return Err(Error::static_err(
                    ErrorCode::XTSE1300,
                    format!("{name_a} '{a}' conflicts with the zero-digit family"),
                ));
            }
            if let Some((name_b, _)) = roles[i + 1..].iter().find(|(_, b)| b == a) {
                return Err(Error::static_err(
                    ErrorCode::XTSE1300,
                    format!("{name_a} and {name_b} share the character '{a}'"),
                ));
            }
        }
        Ok(())
    }
}

/// Default and named decimal formats available to `format-number`.
#[derive(Debug, Clone, Default)]
pub struct DecimalFormatManager {
    default: Arc<DecimalFormatSymbols>,
    named: HashMap<ExpandedName, Arc<DecimalFormatSymbols>>,
}

impl DecimalFormatManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named format, or replace the default one when `name` is `None`.
    pub fn register(
        &mut self,
        name: Option<ExpandedName>,
        symbols: DecimalFormatSymbols,
    ) -> Result<(), Error> {
        symbols.validate()?;
        let symbols = Arc::new(symbols);
        match name {
            Some(n) => {
                self.named.insert(n, symbols);
            }
            None => self.default = symbols,
        }
        Ok(())
    }

    pub fn default_format(&self) -> Arc<DecimalFormatSymbols> {
        self.default.clone()
    }

    pub fn get(&self, name: Option<&ExpandedName>) -> Option<Arc<DecimalFormatSymbols>> {
        match name {
            None => Some(self.default.clone()),
            Some(n) => self.named.get(n).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_symbols_are_valid() {
        assert!(DecimalFormatSymbols::default().validate().is_ok());
    }

    #[test]
    fn shared_characters_are_rejected() {
        let mut m = DecimalFormatManager::new();
        let bad = DecimalFormatSymbols {
            grouping_separator: '.',
            ..DecimalFormatSymbols::default()
        };
        let err = m
            .register(Some(ExpandedName::new(None, "de")), bad)
            .unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XTSE1300);
    }

    #[test]
    fn arabic_indic_digits() {
        let s = DecimalFormatSymbols {
            zero_digit: '\u{0660}',
            ..DecimalFormatSymbols::default()
        };
        assert!(s.validate().is_ok());
        assert_eq!(s.map_digit(b'7'), '\u{0667}');
        assert_eq!(s.digit_value('\u{0663}'), Some(3));
        assert_eq!(s.digit_value('3'), None);
    }
}
