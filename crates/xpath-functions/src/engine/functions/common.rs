use crate::engine::call::{StaticState, SystemFunctionCall};
use crate::engine::collation::{Collation, resolve_collation};
use crate::engine::expr::{Expr, atomize_one};
use crate::engine::numeric::Number;
use crate::engine::regex::CompiledRegex;
use crate::engine::runtime::{CallCtx, Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{
    ExpandedName, SequenceCursor, XdmAtomicValue, XdmItem, XdmItemResult, XdmSequenceStream,
};
use std::sync::Arc;

/// One evaluation of a bound system function: the call site plus the
/// dynamic environment. Argument accessors evaluate lazily, so a family only
/// pulls the arguments it needs.
pub(crate) struct Invocation<'a, N> {
    pub ctx: CallCtx<'a, N>,
    pub call: &'a SystemFunctionCall<N>,
}

impl<N: XdmNode> Invocation<'_, N> {
    pub fn arity(&self) -> usize {
        self.call.args().len()
    }

    pub fn name(&self) -> &ExpandedName {
        crate::engine::expr::FunctionCall::name(self.call)
    }

    pub fn arg(&self, i: usize) -> Option<&Expr<N>> {
        self.call.args().get(i)
    }

    pub fn stream(&self, i: usize) -> Result<XdmSequenceStream<N>, Error> {
        match self.arg(i) {
            Some(e) => e.iterate(&self.ctx),
            None => Ok(XdmSequenceStream::empty()),
        }
    }

    pub fn cursor(&self, i: usize) -> Result<Box<dyn SequenceCursor<N>>, Error> {
        Ok(self.stream(i)?.into_cursor())
    }

    pub fn item(&self, i: usize) -> Result<Option<XdmItem<N>>, Error> {
        match self.arg(i) {
            Some(e) => e.evaluate_item(&self.ctx),
            None => Ok(None),
        }
    }

    pub fn atomic(&self, i: usize) -> Result<Option<XdmAtomicValue>, Error> {
        self.item(i)?.map(atomize_one).transpose()
    }

    /// String value of an optional argument; absent or empty is `""`.
    pub fn string(&self, i: usize) -> Result<String, Error> {
        Ok(self.opt_string(i)?.unwrap_or_default())
    }

    pub fn opt_string(&self, i: usize) -> Result<Option<String>, Error> {
        Ok(self.atomic(i)?.map(|v| match v {
            XdmAtomicValue::String(s) | XdmAtomicValue::UntypedAtomic(s) => s,
            other => other.string_value(),
        }))
    }

    pub fn number(&self, i: usize) -> Result<Option<Number>, Error> {
        match self.atomic(i)? {
            None => Ok(None),
            Some(v) => Number::from_atomic(&v).map(Some).ok_or_else(|| {
                Error::from_code(
                    ErrorCode::XPTY0004,
                    format!("{}() expects a numeric argument, got {}", self.name(), v.atomic_type()),
                )
            }),
        }
    }

    pub fn integer(&self, i: usize) -> Result<i64, Error> {
        match self.atomic(i)? {
            Some(XdmAtomicValue::Integer(n)) => Ok(n),
            Some(other) => Err(Error::from_code(
                ErrorCode::XPTY0004,
                format!("{}() expects an integer, got {}", self.name(), other.atomic_type()),
            )),
            None => Err(Error::from_code(
                ErrorCode::XPTY0004,
                format!("{}() expects an integer, got an empty sequence", self.name()),
            )),
        }
    }

    pub fn double(&self, i: usize) -> Result<f64, Error> {
        Ok(self.number(i)?.map_or(f64::NAN, |n| n.to_f64()))
    }

    pub fn context_item(&self) -> Result<XdmItem<N>, Error> {
        self.ctx.dyn_ctx.context_item.clone().ok_or_else(|| {
            Error::from_code(
                ErrorCode::XPDY0002,
                format!("context item is undefined in {}()", self.name()),
            )
        })
    }

    /// Collation for the collation argument at index `i`; the default
    /// collation when the argument is absent.
    pub fn collation(&self, i: usize) -> Result<Arc<dyn Collation>, Error> {
        if let Some(StaticState::Collation(c)) = self.call.state() {
            return Ok(c.clone());
        }
        if self.arity() > i {
            let uri = self.string(i)?;
            resolve_collation(self.ctx.static_ctx, Some(&uri))
        } else {
            Ok(self.ctx.static_ctx.default_collation())
        }
    }

    /// The compiled pattern of argument `pattern_at` with flags from
    /// `flags_at`: precompiled when both were literals.
    pub fn regex(&self, pattern_at: usize, flags_at: usize) -> Result<Arc<dyn CompiledRegex>, Error> {
        if let Some(StaticState::Regex { regex, .. }) = self.call.state() {
            return Ok(regex.clone());
        }
        let pattern = self.string(pattern_at)?;
        let flags = self.string(flags_at)?;
        self.ctx.static_ctx.regex.compile(&pattern, &flags)
    }
}

/// Atomic values of an argument cursor, in order.
pub(crate) struct AtomicIter<N> {
    inner: Box<dyn SequenceCursor<N>>,
}

impl<N> AtomicIter<N> {
    pub fn new(inner: Box<dyn SequenceCursor<N>>) -> Self {
        Self { inner }
    }
}

impl<N: XdmNode> Iterator for AtomicIter<N> {
    type Item = Result<XdmAtomicValue, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next_item()
            .map(|r: XdmItemResult<N>| r.and_then(atomize_one))
    }
}
