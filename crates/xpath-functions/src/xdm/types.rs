use core::fmt;

/// Atomic types known to the library. `AnyAtomic` and `Numeric` are the
/// abstract supertypes used in function signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicType {
    AnyAtomic,
    Numeric,
    UntypedAtomic,
    String,
    Boolean,
    Decimal,
    Integer,
    Double,
    Float,
    AnyUri,
    QName,
    Date,
    DateTime,
    Time,
    YearMonthDuration,
    DayTimeDuration,
}

impl AtomicType {
    /// Resolve the local name of a constructible `xs:` type.
    pub fn from_local(local: &str) -> Option<Self> {
        Some(match local {
            "untypedAtomic" => Self::UntypedAtomic,
            "string" => Self::String,
            "boolean" => Self::Boolean,
            "decimal" => Self::Decimal,
            "integer" => Self::Integer,
            "double" => Self::Double,
            "float" => Self::Float,
            "anyURI" => Self::AnyUri,
            "QName" => Self::QName,
            "date" => Self::Date,
            "dateTime" => Self::DateTime,
            "time" => Self::Time,
            "yearMonthDuration" => Self::YearMonthDuration,
            "dayTimeDuration" => Self::DayTimeDuration,
            _ => return None,
        })
    }

    pub fn local_name(self) -> &'static str {
        match self {
            Self::AnyAtomic => "anyAtomicType",
            Self::Numeric => "numeric",
            Self::UntypedAtomic => "untypedAtomic",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Decimal => "decimal",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Float => "float",
            Self::AnyUri => "anyURI",
            Self::QName => "QName",
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::Time => "time",
            Self::YearMonthDuration => "yearMonthDuration",
            Self::DayTimeDuration => "dayTimeDuration",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Numeric | Self::Decimal | Self::Integer | Self::Double | Self::Float
        )
    }

    /// `self` is `other` or derived from it.
    pub fn is_subtype_of(self, other: AtomicType) -> bool {
        if self == other || other == Self::AnyAtomic {
            return true;
        }
        match other {
            Self::Numeric => self.is_numeric(),
            Self::Decimal => self == Self::Integer,
            _ => false,
        }
    }
}

impl fmt::Display for AtomicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "xs:{}", self.local_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    /// `empty-sequence()`; only meaningful with `Occurrence::ZeroOrOne`.
    Empty,
    Item,
    Node,
    Atomic(AtomicType),
}

impl ItemType {
    pub fn is_subtype_of(self, other: ItemType) -> bool {
        match (self, other) {
            (ItemType::Empty, _) | (_, ItemType::Item) => true,
            (ItemType::Node, ItemType::Node) => true,
            (ItemType::Atomic(a), ItemType::Atomic(b)) => a.is_subtype_of(b),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occurrence {
    ExactlyOne,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Occurrence {
    pub fn min(self) -> usize {
        match self {
            Self::ExactlyOne | Self::OneOrMore => 1,
            Self::ZeroOrOne | Self::ZeroOrMore => 0,
        }
    }

    pub fn max(self) -> Option<usize> {
        match self {
            Self::ExactlyOne | Self::ZeroOrOne => Some(1),
            Self::ZeroOrMore | Self::OneOrMore => None,
        }
    }

    pub fn allows(self, count: usize) -> bool {
        count >= self.min() && self.max().is_none_or(|m| count <= m)
    }

    /// Every cardinality `self` permits is also permitted by `other`.
    pub fn is_subsumed_by(self, other: Occurrence) -> bool {
        self.min() >= other.min()
            && match (self.max(), other.max()) {
                (_, None) => true,
                (Some(a), Some(b)) => a <= b,
                (None, Some(_)) => false,
            }
    }

    fn indicator(self) -> &'static str {
        match self {
            Self::ExactlyOne => "",
            Self::ZeroOrOne => "?",
            Self::ZeroOrMore => "*",
            Self::OneOrMore => "+",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequenceType {
    pub item: ItemType,
    pub occurrence: Occurrence,
}

impl SequenceType {
    pub const EMPTY: SequenceType = SequenceType {
        item: ItemType::Empty,
        occurrence: Occurrence::ZeroOrOne,
    };

    pub const ANY: SequenceType = SequenceType {
        item: ItemType::Item,
        occurrence: Occurrence::ZeroOrMore,
    };

    pub const fn atomic(t: AtomicType, occurrence: Occurrence) -> Self {
        Self {
            item: ItemType::Atomic(t),
            occurrence,
        }
    }

    pub const fn item(occurrence: Occurrence) -> Self {
        Self {
            item: ItemType::Item,
            occurrence,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.item == ItemType::Empty
    }

    pub fn satisfies(&self, required: &SequenceType) -> bool {
        if self.is_empty() {
            return required.occurrence.min() == 0;
        }
        self.item.is_subtype_of(required.item)
            && self.occurrence.is_subsumed_by(required.occurrence)
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item {
            ItemType::Empty => return f.write_str("empty-sequence()"),
            ItemType::Item => f.write_str("item()")?,
            ItemType::Node => f.write_str("node()")?,
            ItemType::Atomic(a) => write!(f, "{a}")?,
        }
        f.write_str(self.occurrence.indicator())
    }
}
