use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use core::fmt;
use rust_decimal::Decimal;

mod lexical;
mod stream;
mod types;

pub use lexical::{format_double, format_float};
pub use stream::{
    ConcatCursor, EmptyCursor, SequenceCursor, VecCursor, XdmItemResult, XdmSequenceStream,
};
pub use types::{AtomicType, ItemType, Occurrence, SequenceType};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedName {
    pub ns_uri: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn new(ns_uri: Option<String>, local: impl Into<String>) -> Self {
        Self {
            ns_uri,
            local: local.into(),
        }
    }

    /// Name in the given namespace.
    pub fn ns(ns_uri: &str, local: impl Into<String>) -> Self {
        Self::new(Some(ns_uri.to_string()), local)
    }

    pub fn is_in(&self, ns_uri: &str) -> bool {
        self.ns_uri.as_deref() == Some(ns_uri)
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ns_uri.as_deref() {
            Some(crate::consts::FNS) => write!(f, "fn:{}", self.local),
            Some(crate::consts::XS) => write!(f, "xs:{}", self.local),
            Some(crate::consts::ERR_NS) => write!(f, "err:{}", self.local),
            Some(ns) => write!(f, "Q{{{ns}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// Atomic values of the XDM subset the function library operates on.
///
/// Durations are stored canonically: year-month durations as total months,
/// day-time durations as total milliseconds (both may be negative).
#[derive(Debug, Clone, PartialEq)]
pub enum XdmAtomicValue {
    Boolean(bool),
    String(String),
    UntypedAtomic(String),
    AnyUri(String),
    Integer(i64),
    Decimal(Decimal),
    Double(f64),
    Float(f32),
    QName {
        ns_uri: Option<String>,
        prefix: Option<String>,
        local: String,
    },
    DateTime(DateTime<FixedOffset>),
    Date {
        date: NaiveDate,
        tz: Option<FixedOffset>,
    },
    Time {
        time: NaiveTime,
        tz: Option<FixedOffset>,
    },
    YearMonthDuration(i32),
    DayTimeDuration(i64),
}

impl XdmAtomicValue {
    pub fn atomic_type(&self) -> AtomicType {
        match self {
            Self::Boolean(_) => AtomicType::Boolean,
            Self::String(_) => AtomicType::String,
            Self::UntypedAtomic(_) => AtomicType::UntypedAtomic,
            Self::AnyUri(_) => AtomicType::AnyUri,
            Self::Integer(_) => AtomicType::Integer,
            Self::Decimal(_) => AtomicType::Decimal,
            Self::Double(_) => AtomicType::Double,
            Self::Float(_) => AtomicType::Float,
            Self::QName { .. } => AtomicType::QName,
            Self::DateTime(_) => AtomicType::DateTime,
            Self::Date { .. } => AtomicType::Date,
            Self::Time { .. } => AtomicType::Time,
            Self::YearMonthDuration(_) => AtomicType::YearMonthDuration,
            Self::DayTimeDuration(_) => AtomicType::DayTimeDuration,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Integer(_) | Self::Decimal(_) | Self::Double(_) | Self::Float(_)
        )
    }

    pub fn is_duration(&self) -> bool {
        matches!(self, Self::YearMonthDuration(_) | Self::DayTimeDuration(_))
    }

    pub fn is_nan(&self) -> bool {
        match self {
            Self::Double(d) => d.is_nan(),
            Self::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    /// Canonical lexical representation (the result of `xs:string($v)`).
    pub fn string_value(&self) -> String {
        lexical::canonical(self)
    }
}

impl From<bool> for XdmAtomicValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i64> for XdmAtomicValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for XdmAtomicValue {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<&str> for XdmAtomicValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for XdmAtomicValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

pub type XdmSequence<N> = Vec<XdmItem<N>>;

#[derive(Debug, Clone, PartialEq)]
pub enum XdmItem<N> {
    Node(N),
    Atomic(XdmAtomicValue),
}

impl<N> XdmItem<N> {
    pub fn as_atomic(&self) -> Option<&XdmAtomicValue> {
        match self {
            XdmItem::Atomic(a) => Some(a),
            XdmItem::Node(_) => None,
        }
    }
}

impl<N> From<XdmAtomicValue> for XdmItem<N> {
    fn from(a: XdmAtomicValue) -> Self {
        XdmItem::Atomic(a)
    }
}

impl<N> fmt::Display for XdmItem<N>
where
    N: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XdmItem::Node(n) => write!(f, "{n:?}"),
            XdmItem::Atomic(a) => f.write_str(&a.string_value()),
        }
    }
}
