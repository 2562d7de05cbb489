//! Built-in functions of the `fn:` namespace, grouped into families.
//!
//! Every family is one module with one op enum; a bound call carries a
//! [`Family`] value and [`invoke`] dispatches on it.
use crate::engine::runtime::Error;
use crate::engine::signatures::{Folding, SignatureTable};
use crate::model::XdmNode;
use crate::xdm::{AtomicType as T, Occurrence as O, SequenceType as S, XdmAtomicValue, XdmSequenceStream};

pub mod aggregates;
pub mod boolean;
pub(crate) mod common;
pub mod context;
pub mod diagnostics;
pub mod numeric;
pub mod regex;
pub mod sequences;
pub mod strings;

pub use aggregates::AggregateOp;
pub use boolean::BooleanOp;
pub(crate) use common::Invocation;
pub use context::ContextOp;
pub use diagnostics::DiagnosticOp;
pub use numeric::NumericOp;
pub use regex::RegexOp;
pub use sequences::{ExistenceOp, SequenceOp};
pub use strings::{MatchOp, StringOp};

/// Opcode of a built-in function: the implementing family plus the
/// operation within it. Fixed at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Aggregate(AggregateOp),
    Existence(ExistenceOp),
    Sequence(SequenceOp),
    StringMatch(MatchOp),
    String(StringOp),
    Regex(RegexOp),
    Numeric(NumericOp),
    Boolean(BooleanOp),
    Context(ContextOp),
    Diagnostic(DiagnosticOp),
}

/// What a family produced: a single optional atomic value or a sequence.
pub(crate) enum Outcome<N> {
    One(Option<XdmAtomicValue>),
    Many(XdmSequenceStream<N>),
}

pub(crate) fn invoke<N: XdmNode>(family: Family, inv: &Invocation<'_, N>) -> Result<Outcome<N>, Error> {
    Ok(match family {
        Family::Aggregate(op) => Outcome::One(aggregates::evaluate(op, inv)?),
        Family::Existence(op) => Outcome::One(Some(XdmAtomicValue::Boolean(sequences::exists(op, inv)?))),
        Family::Sequence(op) => Outcome::Many(sequences::iterate(op, inv)?),
        Family::StringMatch(op) => Outcome::One(Some(strings::evaluate_match(op, inv)?)),
        Family::String(StringOp::StringToCodepoints) => Outcome::Many(strings::string_to_codepoints(inv)?),
        Family::String(op) => Outcome::One(strings::evaluate(op, inv)?),
        Family::Regex(RegexOp::Tokenize) => Outcome::Many(regex::tokenize(inv)?),
        Family::Regex(op) => Outcome::One(Some(regex::evaluate(op, inv)?)),
        Family::Numeric(op) => Outcome::One(numeric::evaluate(op, inv)?),
        Family::Boolean(op) => Outcome::One(Some(XdmAtomicValue::Boolean(boolean::evaluate(op, inv)?))),
        Family::Context(op) => Outcome::One(Some(context::evaluate(op, inv)?)),
        Family::Diagnostic(DiagnosticOp::Trace) => Outcome::Many(diagnostics::trace(inv)?),
        Family::Diagnostic(DiagnosticOp::Error) => return Err(diagnostics::error(inv)?),
    })
}

const ANY: S = S::ANY;
const ITEM: S = S::item(O::ExactlyOne);
const ITEM_OPT: S = S::item(O::ZeroOrOne);
const ITEM_PLUS: S = S::item(O::OneOrMore);
const NODE: S = S {
    item: crate::xdm::ItemType::Node,
    occurrence: O::ExactlyOne,
};
const ATOMIC: S = S::atomic(T::AnyAtomic, O::ExactlyOne);
const ATOMIC_OPT: S = S::atomic(T::AnyAtomic, O::ZeroOrOne);
const ATOMIC_STAR: S = S::atomic(T::AnyAtomic, O::ZeroOrMore);
const STR: S = S::atomic(T::String, O::ExactlyOne);
const STR_OPT: S = S::atomic(T::String, O::ZeroOrOne);
const STR_STAR: S = S::atomic(T::String, O::ZeroOrMore);
const INT: S = S::atomic(T::Integer, O::ExactlyOne);
const INT_OPT: S = S::atomic(T::Integer, O::ZeroOrOne);
const INT_STAR: S = S::atomic(T::Integer, O::ZeroOrMore);
const DBL: S = S::atomic(T::Double, O::ExactlyOne);
const NUM_OPT: S = S::atomic(T::Numeric, O::ZeroOrOne);
const BOOL: S = S::atomic(T::Boolean, O::ExactlyOne);
const QNAME_OPT: S = S::atomic(T::QName, O::ZeroOrOne);

pub(crate) fn register_system_functions(t: &mut SignatureTable) {
    use Family as F;

    // ===== Aggregates =====
    t.define("sum", 1, Some(2), F::Aggregate(AggregateOp::Sum))
        .arg(ATOMIC_STAR)
        .arg(ATOMIC_OPT)
        .returns(ATOMIC_OPT);
    t.define("avg", 1, Some(1), F::Aggregate(AggregateOp::Avg))
        .arg_or_empty(ATOMIC_STAR)
        .returns(ATOMIC_OPT);
    t.define("count", 1, Some(1), F::Aggregate(AggregateOp::Count))
        .arg_or(ANY, 0_i64)
        .returns(INT);
    for (name, op) in [("min", AggregateOp::Min), ("max", AggregateOp::Max)] {
        t.define(name, 1, Some(2), F::Aggregate(op))
            .arg_or_empty(ATOMIC_STAR)
            .arg(STR)
            .returns(ATOMIC_OPT);
    }

    // ===== Existence and sequences =====
    t.define("exists", 1, Some(1), F::Existence(ExistenceOp::Exists))
        .arg_or(ANY, false)
        .returns(BOOL);
    t.define("empty", 1, Some(1), F::Existence(ExistenceOp::Empty))
        .arg_or(ANY, true)
        .returns(BOOL);
    t.define("remove", 2, Some(2), F::Sequence(SequenceOp::Remove))
        .arg_or_empty(ANY)
        .arg(INT)
        .returns(ANY);
    t.define("subsequence", 2, Some(3), F::Sequence(SequenceOp::Subsequence))
        .arg_or_empty(ANY)
        .arg(DBL)
        .arg(DBL)
        .returns(ANY);
    t.define("reverse", 1, Some(1), F::Sequence(SequenceOp::Reverse))
        .arg_or_empty(ANY)
        .returns(ANY);
    t.define("insert-before", 3, Some(3), F::Sequence(SequenceOp::InsertBefore))
        .arg(ANY)
        .arg(INT)
        .arg(ANY)
        .returns(ANY);
    t.define("index-of", 2, Some(3), F::Sequence(SequenceOp::IndexOf))
        .arg_or_empty(ATOMIC_STAR)
        .arg(ATOMIC)
        .arg(STR)
        .returns(INT_STAR);
    t.define("distinct-values", 1, Some(2), F::Sequence(SequenceOp::DistinctValues))
        .arg_or_empty(ATOMIC_STAR)
        .arg(STR)
        .returns(ATOMIC_STAR);
    t.define("exactly-one", 1, Some(1), F::Sequence(SequenceOp::ExactlyOne))
        .arg(ANY)
        .returns(ITEM);
    t.define("one-or-more", 1, Some(1), F::Sequence(SequenceOp::OneOrMore))
        .arg(ANY)
        .returns(ITEM_PLUS);
    t.define("zero-or-one", 1, Some(1), F::Sequence(SequenceOp::ZeroOrOne))
        .arg(ANY)
        .returns(ITEM_OPT);
    t.define("unordered", 1, Some(1), F::Sequence(SequenceOp::Unordered))
        .arg_or_empty(ANY)
        .returns(ANY);

    // ===== Collation-aware substring matching =====
    for (name, op) in [
        ("contains", MatchOp::Contains),
        ("starts-with", MatchOp::StartsWith),
        ("ends-with", MatchOp::EndsWith),
    ] {
        t.define(name, 2, Some(3), F::StringMatch(op))
            .arg(STR_OPT)
            .arg_or(STR_OPT, true)
            .arg(STR)
            .returns(BOOL);
    }
    t.define("substring-before", 2, Some(3), F::StringMatch(MatchOp::SubstringBefore))
        .arg_or(STR_OPT, "")
        .arg_or(STR_OPT, "")
        .arg(STR)
        .returns(STR);
    t.define("substring-after", 2, Some(3), F::StringMatch(MatchOp::SubstringAfter))
        .arg_or(STR_OPT, "")
        .arg(STR_OPT)
        .arg(STR)
        .returns(STR);

    // ===== Strings =====
    t.define("string", 0, Some(1), F::String(StringOp::String))
        .arg(ITEM_OPT)
        .folding(Folding::NeverAtArity(0))
        .returns(STR);
    t.define("concat", 2, None, F::String(StringOp::Concat))
        .arg(ATOMIC_OPT)
        .arg(ATOMIC_OPT)
        .returns(STR);
    t.define("string-join", 1, Some(2), F::String(StringOp::StringJoin))
        .arg(STR_STAR)
        .arg(STR)
        .returns(STR);
    t.define("string-length", 0, Some(1), F::String(StringOp::StringLength))
        .arg_or(STR_OPT, 0_i64)
        .folding(Folding::NeverAtArity(0))
        .returns(INT);
    t.define("substring", 2, Some(3), F::String(StringOp::Substring))
        .arg_or(STR_OPT, "")
        .arg(DBL)
        .arg(DBL)
        .returns(STR);
    t.define("normalize-space", 0, Some(1), F::String(StringOp::NormalizeSpace))
        .arg_or(STR_OPT, "")
        .folding(Folding::NeverAtArity(0))
        .returns(STR);
    for (name, op) in [("upper-case", StringOp::UpperCase), ("lower-case", StringOp::LowerCase)] {
        t.define(name, 1, Some(1), F::String(op))
            .arg_or(STR_OPT, "")
            .returns(STR);
    }
    t.define("translate", 3, Some(3), F::String(StringOp::Translate))
        .arg_or(STR_OPT, "")
        .arg(STR)
        .arg(STR)
        .returns(STR);
    t.define("string-to-codepoints", 1, Some(1), F::String(StringOp::StringToCodepoints))
        .arg_or_empty(STR_OPT)
        .returns(INT_STAR);
    t.define("codepoints-to-string", 1, Some(1), F::String(StringOp::CodepointsToString))
        .arg_or(INT_STAR, "")
        .returns(STR);
    t.define("normalize-unicode", 1, Some(2), F::String(StringOp::NormalizeUnicode))
        .arg_or(STR_OPT, "")
        .arg(STR)
        .returns(STR);
    t.define("compare", 2, Some(3), F::String(StringOp::Compare))
        .arg_or_empty(STR_OPT)
        .arg_or_empty(STR_OPT)
        .arg(STR)
        .returns(INT_OPT);

    // ===== Regular expressions =====
    t.define("matches", 2, Some(3), F::Regex(RegexOp::Matches))
        .arg(STR_OPT)
        .arg(STR)
        .arg(STR)
        .returns(BOOL);
    t.define("replace", 3, Some(4), F::Regex(RegexOp::Replace))
        .arg_or(STR_OPT, "")
        .arg(STR)
        .arg(STR)
        .arg(STR)
        .returns(STR);
    t.define("tokenize", 2, Some(3), F::Regex(RegexOp::Tokenize))
        .arg_or_empty(STR_OPT)
        .arg(STR)
        .arg(STR)
        .returns(STR_STAR);

    // ===== Numerics =====
    t.define("number", 0, Some(1), F::Numeric(NumericOp::Number))
        .arg_or(ATOMIC_OPT, f64::NAN)
        .folding(Folding::NeverAtArity(0))
        .returns(DBL);
    for (name, op) in [
        ("abs", NumericOp::Abs),
        ("floor", NumericOp::Floor),
        ("ceiling", NumericOp::Ceiling),
        ("round", NumericOp::Round),
    ] {
        t.define(name, 1, Some(1), F::Numeric(op))
            .arg_or_empty(NUM_OPT)
            .returns(NUM_OPT);
    }
    t.define("round-half-to-even", 1, Some(2), F::Numeric(NumericOp::RoundHalfToEven))
        .arg_or_empty(NUM_OPT)
        .arg(INT)
        .returns(NUM_OPT);
    t.define("format-number", 2, Some(3), F::Numeric(NumericOp::FormatNumber))
        .arg(NUM_OPT)
        .arg(STR)
        .arg(STR)
        .returns(STR);

    // ===== Booleans =====
    t.define("true", 0, Some(0), F::Boolean(BooleanOp::True)).returns(BOOL);
    t.define("false", 0, Some(0), F::Boolean(BooleanOp::False)).returns(BOOL);
    t.define("not", 1, Some(1), F::Boolean(BooleanOp::Not))
        .arg_or(ANY, true)
        .returns(BOOL);
    t.define("boolean", 1, Some(1), F::Boolean(BooleanOp::Boolean))
        .arg_or(ANY, false)
        .returns(BOOL);

    // ===== Focus and environment =====
    t.define("position", 0, Some(0), F::Context(ContextOp::Position))
        .folding(Folding::Never)
        .returns(INT);
    t.define("last", 0, Some(0), F::Context(ContextOp::Last))
        .folding(Folding::Never)
        .returns(INT);
    t.define("lang", 1, Some(2), F::Context(ContextOp::Lang))
        .arg(STR_OPT)
        .arg(NODE)
        .folding(Folding::Never)
        .returns(BOOL);
    t.define("function-available", 1, Some(2), F::Context(ContextOp::FunctionAvailable))
        .arg(STR)
        .arg(INT)
        .folding(Folding::Never)
        .returns(BOOL);
    t.define("default-collation", 0, Some(0), F::Context(ContextOp::DefaultCollation))
        .folding(Folding::Never)
        .returns(STR);
    t.define("current-dateTime", 0, Some(0), F::Context(ContextOp::CurrentDateTime))
        .folding(Folding::Never)
        .returns(S::atomic(T::DateTime, O::ExactlyOne));
    t.define("current-date", 0, Some(0), F::Context(ContextOp::CurrentDate))
        .folding(Folding::Never)
        .returns(S::atomic(T::Date, O::ExactlyOne));

    // ===== Diagnostics =====
    t.define("error", 0, Some(3), F::Diagnostic(DiagnosticOp::Error))
        .arg(QNAME_OPT)
        .arg(STR)
        .arg(ANY)
        .folding(Folding::Never)
        .returns(S::EMPTY);
    t.define("trace", 2, Some(2), F::Diagnostic(DiagnosticOp::Trace))
        .arg(ANY)
        .arg(STR)
        .folding(Folding::Never)
        .returns(ANY);
}
