//! Compiled expression tree and the call-site abstraction.
//!
//! Function calls are trait objects ([`FunctionCall`]) so that the system,
//! user and vendor libraries can each bind their own call representation
//! while sharing one evaluation protocol.
use crate::engine::cast::cast_atomic;
use crate::engine::functions::sequences::RemoveCursor;
use crate::engine::library::FunctionLibraryList;
use crate::engine::numeric::Number;
use crate::engine::runtime::{CallCtx, Error, ErrorCode, NamespaceBindings, StaticContext};
use crate::engine::signatures::FunctionSignature;
use crate::model::XdmNode;
use crate::xdm::{
    AtomicType, ExpandedName, ItemType, Occurrence, SequenceCursor, SequenceType, XdmAtomicValue,
    XdmItem, XdmItemResult, XdmSequence, XdmSequenceStream,
};
use core::fmt;
use std::collections::VecDeque;
use std::sync::Arc;

/// Environment of the static-check pass.
pub struct CheckContext<'a, N> {
    pub static_ctx: &'a StaticContext,
    pub libraries: &'a FunctionLibraryList<N>,
}

/// A bound function call.
pub trait FunctionCall<N>: fmt::Debug + Send + Sync {
    fn name(&self) -> &ExpandedName;

    fn arguments(&self) -> &[Expr<N>];

    /// The declared signature, for calls bound to a built-in function.
    fn signature(&self) -> Option<&'static FunctionSignature> {
        None
    }

    fn static_type(&self) -> SequenceType;

    /// Check and coerce the arguments; may replace the call by another
    /// expression (a folded literal, a cheaper rewrite).
    fn type_check(self: Box<Self>, cx: &CheckContext<'_, N>) -> Result<Expr<N>, Error>;

    fn evaluate_item(&self, ctx: &CallCtx<'_, N>) -> Result<Option<XdmItem<N>>, Error>;

    fn iterate(&self, ctx: &CallCtx<'_, N>) -> Result<XdmSequenceStream<N>, Error>;

    fn effective_boolean_value(&self, ctx: &CallCtx<'_, N>) -> Result<bool, Error>;
}

#[derive(Debug)]
pub enum Expr<N> {
    Literal(XdmSequence<N>),
    Sequence(Vec<Expr<N>>),
    ContextItem,
    Variable(ExpandedName),
    Negate(Box<Expr<N>>),
    Call(Box<dyn FunctionCall<N>>),
    Cast {
        operand: Box<Expr<N>>,
        target: AtomicType,
    },
    /// Function conversion rules applied to an argument whose static type
    /// does not already match.
    Coerce {
        operand: Box<Expr<N>>,
        required: SequenceType,
        role: Arc<str>,
    },
    /// All items but the first.
    Tail(Box<Expr<N>>),
}

impl<N: XdmNode> Expr<N> {
    pub fn literal(value: impl Into<XdmAtomicValue>) -> Self {
        Expr::Literal(vec![XdmItem::Atomic(value.into())])
    }

    pub fn empty() -> Self {
        Expr::Literal(Vec::new())
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Literal(_))
    }

    pub fn is_empty_literal(&self) -> bool {
        matches!(self, Expr::Literal(v) if v.is_empty())
    }

    /// The single atomic value of a one-item literal.
    pub fn as_atomic_literal(&self) -> Option<&XdmAtomicValue> {
        match self {
            Expr::Literal(v) if v.len() == 1 => v[0].as_atomic(),
            _ => None,
        }
    }

    pub fn static_type(&self) -> SequenceType {
        match self {
            Expr::Literal(items) => literal_type(items),
            Expr::ContextItem => SequenceType::item(Occurrence::ExactlyOne),
            Expr::Sequence(_) | Expr::Variable(_) => SequenceType::ANY,
            Expr::Negate(_) => SequenceType::atomic(AtomicType::Numeric, Occurrence::ZeroOrOne),
            Expr::Call(c) => c.static_type(),
            Expr::Cast { operand, target } => {
                let occurrence = if operand.static_type().occurrence == Occurrence::ExactlyOne {
                    Occurrence::ExactlyOne
                } else {
                    Occurrence::ZeroOrOne
                };
                SequenceType::atomic(*target, occurrence)
            }
            Expr::Coerce { required, .. } => *required,
            Expr::Tail(operand) => SequenceType {
                item: operand.static_type().item,
                occurrence: Occurrence::ZeroOrMore,
            },
        }
    }

    /// Static-check pass, bottom-up.
    pub fn type_check(self, cx: &CheckContext<'_, N>) -> Result<Expr<N>, Error> {
        Ok(match self {
            Expr::Sequence(parts) => {
                let parts = parts
                    .into_iter()
                    .map(|p| p.type_check(cx))
                    .collect::<Result<Vec<_>, _>>()?;
                if parts.iter().all(Expr::is_literal) {
                    Expr::Literal(
                        parts
                            .into_iter()
                            .flat_map(|p| match p {
                                Expr::Literal(v) => v,
                                _ => Vec::new(),
                            })
                            .collect(),
                    )
                } else {
                    Expr::Sequence(parts)
                }
            }
            Expr::Negate(operand) => {
                let operand = operand.type_check(cx)?;
                if let Expr::Literal(items) = &operand
                    && items.len() <= 1
                    && let Ok(v) = negate(items.first().cloned())
                {
                    return Ok(Expr::Literal(v.map(XdmItem::Atomic).into_iter().collect()));
                }
                Expr::Negate(Box::new(operand))
            }
            Expr::Cast { operand, target } => {
                let operand = operand.type_check(cx)?;
                if let Expr::Literal(items) = &operand {
                    let folded = match items.as_slice() {
                        [] => Ok(Vec::new()),
                        [item] => atomize_one(item.clone())
                            .and_then(|v| cast_atomic(v, target, &cx.static_ctx.namespaces))
                            .map(|v| vec![XdmItem::Atomic(v)]),
                        _ => Err(too_many("cast operand")),
                    };
                    return folded.map(Expr::Literal).map_err(Error::into_static);
                }
                Expr::Cast {
                    operand: Box::new(operand),
                    target,
                }
            }
            Expr::Coerce {
                operand,
                required,
                role,
            } => coerce_argument(operand.type_check(cx)?, required, role)?,
            Expr::Tail(operand) => Expr::Tail(Box::new(operand.type_check(cx)?)),
            Expr::Call(call) => call.type_check(cx)?,
            other @ (Expr::Literal(_) | Expr::ContextItem | Expr::Variable(_)) => other,
        })
    }

    pub fn iterate(&self, ctx: &CallCtx<'_, N>) -> Result<XdmSequenceStream<N>, Error> {
        match self {
            Expr::Literal(items) => Ok(XdmSequenceStream::from_vec(items.clone())),
            Expr::Sequence(parts) => {
                let streams = parts
                    .iter()
                    .map(|p| p.iterate(ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(XdmSequenceStream::new(crate::xdm::ConcatCursor::new(streams)))
            }
            Expr::ContextItem => ctx
                .dyn_ctx
                .context_item
                .clone()
                .map(XdmSequenceStream::single)
                .ok_or_else(|| Error::from_code(ErrorCode::XPDY0002, "context item is undefined")),
            Expr::Variable(name) => ctx
                .dyn_ctx
                .variables
                .get(name)
                .cloned()
                .map(XdmSequenceStream::from_vec)
                .ok_or_else(|| {
                    Error::from_code(ErrorCode::XPDY0002, format!("variable ${name} is not bound"))
                }),
            Expr::Call(call) => call.iterate(ctx),
            Expr::Coerce {
                operand,
                required,
                role,
            } => Ok(XdmSequenceStream::new(CoerceCursor::new(
                operand.iterate(ctx)?.into_cursor(),
                *required,
                role.clone(),
            ))),
            Expr::Tail(operand) => Ok(XdmSequenceStream::new(RemoveCursor::new(
                operand.iterate(ctx)?.into_cursor(),
                1,
            ))),
            Expr::Negate(_) | Expr::Cast { .. } => Ok(self
                .evaluate_item(ctx)?
                .map_or_else(XdmSequenceStream::empty, XdmSequenceStream::single)),
        }
    }

    /// Evaluate an expression expected to produce at most one item.
    pub fn evaluate_item(&self, ctx: &CallCtx<'_, N>) -> Result<Option<XdmItem<N>>, Error> {
        match self {
            Expr::Call(call) => call.evaluate_item(ctx),
            Expr::Negate(operand) => Ok(negate(operand.evaluate_item(ctx)?)?.map(XdmItem::Atomic)),
            Expr::Cast { operand, target } => match operand.evaluate_item(ctx)? {
                Some(item) => {
                    let v = atomize_one(item)?;
                    Ok(Some(XdmItem::Atomic(cast_atomic(
                        v,
                        *target,
                        &ctx.static_ctx.namespaces,
                    )?)))
                }
                None => Ok(None),
            },
            _ => {
                let mut cursor = self.iterate(ctx)?.into_cursor();
                first_of_at_most_one(cursor.as_mut())
            }
        }
    }

    pub fn effective_boolean_value(&self, ctx: &CallCtx<'_, N>) -> Result<bool, Error> {
        match self {
            Expr::Call(call) => call.effective_boolean_value(ctx),
            _ => ebv(self.iterate(ctx)?.into_cursor().as_mut()),
        }
    }
}

fn literal_type<N>(items: &[XdmItem<N>]) -> SequenceType {
    let Some(first) = items.first() else {
        return SequenceType::EMPTY;
    };
    let item_of = |i: &XdmItem<N>| match i {
        XdmItem::Node(_) => ItemType::Node,
        XdmItem::Atomic(a) => ItemType::Atomic(a.atomic_type()),
    };
    let first_type = item_of(first);
    let item = if items.iter().all(|i| item_of(i) == first_type) {
        first_type
    } else if items.iter().all(|i| matches!(i, XdmItem::Atomic(_))) {
        ItemType::Atomic(AtomicType::AnyAtomic)
    } else {
        ItemType::Item
    };
    let occurrence = if items.len() == 1 {
        Occurrence::ExactlyOne
    } else {
        Occurrence::OneOrMore
    };
    SequenceType { item, occurrence }
}

fn too_many(what: &str) -> Error {
    Error::from_code(
        ErrorCode::XPTY0004,
        format!("{what}: a sequence of more than one item is not allowed"),
    )
}

/// First item of a cursor, failing if a second one follows.
pub(crate) fn first_of_at_most_one<N>(
    cursor: &mut dyn SequenceCursor<N>,
) -> Result<Option<XdmItem<N>>, Error> {
    let Some(first) = cursor.next_item().transpose()? else {
        return Ok(None);
    };
    if cursor.next_item().transpose()?.is_some() {
        return Err(too_many("expression"));
    }
    Ok(Some(first))
}

/// Atomize an item that must produce exactly one atomic value.
pub(crate) fn atomize_one<N: XdmNode>(item: XdmItem<N>) -> Result<XdmAtomicValue, Error> {
    match item {
        XdmItem::Atomic(a) => Ok(a),
        XdmItem::Node(n) => {
            let mut values = n.typed_value();
            if values.len() == 1 {
                Ok(values.remove(0))
            } else {
                Err(Error::from_code(
                    ErrorCode::XPTY0004,
                    "node does not atomize to a single value",
                ))
            }
        }
    }
}

pub(crate) fn atomize_into<N: XdmNode>(item: XdmItem<N>, out: &mut VecDeque<XdmAtomicValue>) {
    match item {
        XdmItem::Atomic(a) => out.push_back(a),
        XdmItem::Node(n) => out.extend(n.typed_value()),
    }
}

fn negate<N: XdmNode>(item: Option<XdmItem<N>>) -> Result<Option<XdmAtomicValue>, Error> {
    let v = match item {
        Some(i) => Some(atomize_one(i)?),
        None => None,
    };
    negate_atomic(v)
}

fn negate_atomic(v: Option<XdmAtomicValue>) -> Result<Option<XdmAtomicValue>, Error> {
    let Some(v) = v else {
        return Ok(None);
    };
    let v = match v {
        XdmAtomicValue::UntypedAtomic(s) => {
            XdmAtomicValue::Double(crate::engine::numeric::parse_double_lexical(&s)?)
        }
        other => other,
    };
    let n = Number::from_atomic(&v).ok_or_else(|| {
        Error::from_code(
            ErrorCode::XPTY0004,
            format!("unary minus is not defined for {}", v.atomic_type()),
        )
    })?;
    let negated = match n {
        Number::Integer(i) => Number::Integer(
            i.checked_neg()
                .ok_or_else(|| Error::from_code(ErrorCode::FOAR0002, "integer overflow"))?,
        ),
        Number::Decimal(d) => Number::Decimal(-d),
        Number::Float(f) => Number::Float(-f),
        Number::Double(d) => Number::Double(-d),
    };
    Ok(Some(negated.into_atomic()))
}

/// Effective boolean value of a sequence. Stops after the second item.
pub fn ebv<N>(cursor: &mut dyn SequenceCursor<N>) -> Result<bool, Error> {
    let Some(first) = cursor.next_item().transpose()? else {
        return Ok(false);
    };
    let atomic = match first {
        XdmItem::Node(_) => return Ok(true),
        XdmItem::Atomic(a) => a,
    };
    if cursor.next_item().transpose()?.is_some() {
        return Err(Error::from_code(
            ErrorCode::FORG0006,
            "effective boolean value is not defined for a sequence of two or more atomic values",
        ));
    }
    atomic_ebv(&atomic)
}

pub(crate) fn atomic_ebv(v: &XdmAtomicValue) -> Result<bool, Error> {
    use XdmAtomicValue as V;
    Ok(match v {
        V::Boolean(b) => *b,
        V::String(s) | V::UntypedAtomic(s) | V::AnyUri(s) => !s.is_empty(),
        V::Integer(i) => *i != 0,
        V::Decimal(d) => !d.is_zero(),
        V::Double(d) => !(d.is_nan() || *d == 0.0),
        V::Float(f) => !(f.is_nan() || *f == 0.0),
        other => {
            return Err(Error::from_code(
                ErrorCode::FORG0006,
                format!("effective boolean value is not defined for {}", other.atomic_type()),
            ));
        }
    })
}

/// Convert one atomic value to the required atomic type under the function
/// conversion rules: untypedAtomic is cast, numerics are promoted and
/// anyURI is promoted to string.
pub(crate) fn convert_atomic(
    v: XdmAtomicValue,
    target: AtomicType,
    role: &str,
) -> Result<XdmAtomicValue, Error> {
    let source = v.atomic_type();
    if source == AtomicType::UntypedAtomic {
        return match target {
            AtomicType::AnyAtomic | AtomicType::UntypedAtomic => Ok(v),
            AtomicType::Numeric => cast_atomic(v, AtomicType::Double, &NamespaceBindings::default()),
            AtomicType::QName => Err(mismatch(source, target, role)),
            t => cast_atomic(v, t, &NamespaceBindings::default()),
        };
    }
    if source.is_subtype_of(target) {
        return Ok(v);
    }
    match (source, target) {
        (AtomicType::Integer | AtomicType::Decimal, AtomicType::Float)
        | (AtomicType::Integer | AtomicType::Decimal | AtomicType::Float, AtomicType::Double)
        | (AtomicType::AnyUri, AtomicType::String) => {
            cast_atomic(v, target, &NamespaceBindings::default())
        }
        _ => Err(mismatch(source, target, role)),
    }
}

fn mismatch(source: AtomicType, target: AtomicType, role: &str) -> Error {
    Error::from_code(
        ErrorCode::XPTY0004,
        format!("required type {target} for {role}, supplied value has type {source}"),
    )
}

/// Wrap `arg` in a coercion unless its static type already satisfies
/// `required`. Literal arguments are converted immediately, so their
/// errors are static.
pub(crate) fn coerce_argument<N: XdmNode>(
    arg: Expr<N>,
    required: SequenceType,
    role: Arc<str>,
) -> Result<Expr<N>, Error> {
    if arg.static_type().satisfies(&required) {
        return Ok(arg);
    }
    match arg {
        Expr::Literal(items) => {
            let mut cursor = CoerceCursor::new(
                XdmSequenceStream::from_vec(items).into_cursor(),
                required,
                role,
            );
            let mut out = Vec::new();
            while let Some(item) = cursor.next_item() {
                out.push(item.map_err(Error::into_static)?);
            }
            Ok(Expr::Literal(out))
        }
        other => Ok(Expr::Coerce {
            operand: Box::new(other),
            required,
            role,
        }),
    }
}

/// Lazily applies the function conversion rules and checks cardinality.
pub struct CoerceCursor<N> {
    inner: Box<dyn SequenceCursor<N>>,
    required: SequenceType,
    role: Arc<str>,
    pending: VecDeque<XdmItem<N>>,
    produced: usize,
    done: bool,
}

impl<N> CoerceCursor<N> {
    pub fn new(inner: Box<dyn SequenceCursor<N>>, required: SequenceType, role: Arc<str>) -> Self {
        Self {
            inner,
            required,
            role,
            pending: VecDeque::new(),
            produced: 0,
            done: false,
        }
    }

    fn cardinality_error(&self) -> Error {
        Error::from_code(
            ErrorCode::XPTY0004,
            format!(
                "required cardinality of {} is {}",
                self.role, self.required
            ),
        )
    }
}

impl<N: XdmNode> CoerceCursor<N> {
    fn convert(&mut self, item: XdmItem<N>) -> Result<(), Error> {
        match self.required.item {
            ItemType::Item => self.pending.push_back(item),
            ItemType::Node => match item {
                XdmItem::Node(_) => self.pending.push_back(item),
                XdmItem::Atomic(a) => {
                    return Err(Error::from_code(
                        ErrorCode::XPTY0004,
                        format!(
                            "required type node() for {}, supplied value has type {}",
                            self.role,
                            a.atomic_type()
                        ),
                    ));
                }
            },
            ItemType::Empty => return Err(self.cardinality_error()),
            ItemType::Atomic(target) => {
                let mut values = VecDeque::new();
                atomize_into(item, &mut values);
                for v in values {
                    let v = convert_atomic(v, target, &self.role)?;
                    self.pending.push_back(XdmItem::Atomic(v));
                }
            }
        }
        Ok(())
    }
}

impl<N: XdmNode> SequenceCursor<N> for CoerceCursor<N> {
    fn next_item(&mut self) -> Option<XdmItemResult<N>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                self.produced += 1;
                if self
                    .required
                    .occurrence
                    .max()
                    .is_some_and(|max| self.produced > max)
                {
                    self.done = true;
                    self.pending.clear();
                    return Some(Err(self.cardinality_error()));
                }
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }
            match self.inner.next_item() {
                None => {
                    self.done = true;
                    if self.produced < self.required.occurrence.min() {
                        return Some(Err(self.cardinality_error()));
                    }
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(item)) => {
                    if let Err(e) = self.convert(item) {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }
        }
    }

    fn boxed_clone(&self) -> Box<dyn SequenceCursor<N>> {
        Box::new(CoerceCursor {
            inner: self.inner.boxed_clone(),
            required: self.required,
            role: self.role.clone(),
            pending: self.pending.clone(),
            produced: self.produced,
            done: self.done,
        })
    }
}
