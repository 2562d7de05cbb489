//! Call sites bound to built-in `fn:` functions.
//!
//! A [`SystemFunctionCall`] owns its argument expressions and a reference to
//! the static signature. During the static check it coerces its arguments,
//! applies empty-argument short-circuits and rewrites, attaches pre-compiled
//! state (regex, collation, translation map, decimal format) and folds itself
//! when every argument is a literal.
use crate::engine::collation::{Collation, resolve_collation};
use crate::engine::decimal_format::DecimalFormatSymbols;
use crate::engine::expr::{CheckContext, Expr, FunctionCall, coerce_argument, ebv};
use crate::engine::format_number::DecimalPicture;
use crate::engine::functions::{
    self, AggregateOp, BooleanOp, ContextOp, Family, Invocation, NumericOp, Outcome, RegexOp,
    SequenceOp, StringOp,
};
use crate::engine::regex::{CompiledRegex, Replacement};
use crate::engine::runtime::{CallCtx, DynamicContext, Error, ErrorCode, StaticContext};
use crate::engine::signatures::{FunctionSignature, IfEmpty};
use crate::model::XdmNode;
use crate::xdm::{
    ExpandedName, Occurrence, SequenceType, XdmAtomicValue, XdmItem, XdmSequenceStream,
};
use core::fmt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

/// State computed once from literal arguments during the static check.
pub(crate) enum StaticState {
    Regex {
        regex: Arc<dyn CompiledRegex>,
        replacement: Option<Replacement>,
    },
    Collation(Arc<dyn Collation>),
    /// `translate` map: `None` deletes the character.
    Translate(HashMap<char, Option<char>>),
    DecimalFormat {
        symbols: Arc<DecimalFormatSymbols>,
        picture: Option<Arc<DecimalPicture>>,
    },
}

type PictureCache = Option<(String, Arc<DecimalFormatSymbols>, Arc<DecimalPicture>)>;

pub struct SystemFunctionCall<N> {
    signature: &'static FunctionSignature,
    args: Vec<Expr<N>>,
    state: OnceLock<StaticState>,
    /// Last picture compiled at run time, reused while picture and symbols repeat.
    picture_cache: Mutex<PictureCache>,
}

impl<N> fmt::Debug for SystemFunctionCall<N>
where
    Expr<N>: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemFunctionCall")
            .field("name", &self.signature.name)
            .field("family", &self.signature.family)
            .field("args", &self.args)
            .field("prepared", &self.state.get().is_some())
            .finish()
    }
}

impl<N: XdmNode> SystemFunctionCall<N> {
    pub fn new(signature: &'static FunctionSignature, args: Vec<Expr<N>>) -> Self {
        Self {
            signature,
            args,
            state: OnceLock::new(),
            picture_cache: Mutex::new(None),
        }
    }

    pub fn family(&self) -> Family {
        self.signature.family
    }

    pub(crate) fn args(&self) -> &[Expr<N>] {
        &self.args
    }

    pub(crate) fn state(&self) -> Option<&StaticState> {
        self.state.get()
    }

    /// Compiled picture for a run-time picture string.
    pub(crate) fn picture(
        &self,
        picture: &str,
        symbols: &Arc<DecimalFormatSymbols>,
    ) -> Result<Arc<DecimalPicture>, Error> {
        if let Ok(cache) = self.picture_cache.lock()
            && let Some((p, s, compiled)) = cache.as_ref()
            && p == picture
            && Arc::ptr_eq(s, symbols)
        {
            return Ok(compiled.clone());
        }
        let compiled = Arc::new(DecimalPicture::compile(picture, symbols)?);
        if let Ok(mut cache) = self.picture_cache.lock() {
            *cache = Some((picture.to_string(), symbols.clone(), compiled.clone()));
        }
        Ok(compiled)
    }

    fn literal_string(&self, i: usize) -> Option<String> {
        self.args.get(i)?.as_atomic_literal().map(XdmAtomicValue::string_value)
    }

    /// Whether argument `i` is absent or a literal.
    fn is_static_arg(&self, i: usize) -> bool {
        self.args.get(i).is_none_or(Expr::is_literal)
    }

    fn prepare(&self, sc: &StaticContext) -> Result<(), Error> {
        let state = match self.family() {
            Family::Regex(op) => self.prepare_regex(op, sc)?,
            Family::String(StringOp::Translate) => self.prepare_translate(),
            Family::Numeric(NumericOp::FormatNumber) => self.prepare_decimal_format(sc)?,
            family => match collation_arg(family) {
                Some(i) if self.args.len() > i => {
                    let uri = self.literal_string(i);
                    match uri {
                        Some(u) => Some(StaticState::Collation(resolve_collation(sc, Some(&u))?)),
                        None => None,
                    }
                }
                Some(_) => Some(StaticState::Collation(sc.default_collation())),
                None => None,
            },
        };
        if let Some(state) = state {
            let _ = self.state.set(state);
        }
        Ok(())
    }

    fn prepare_regex(&self, op: RegexOp, sc: &StaticContext) -> Result<Option<StaticState>, Error> {
        let flags_at = match op {
            RegexOp::Matches | RegexOp::Tokenize => 2,
            RegexOp::Replace => 3,
        };
        if !self.is_static_arg(1) || !self.is_static_arg(flags_at) {
            return Ok(None);
        }
        let (Some(pattern), flags) = (self.literal_string(1), self.literal_string(flags_at)) else {
            return Ok(None);
        };
        let regex = sc.regex.compile(&pattern, flags.as_deref().unwrap_or(""))?;
        if op != RegexOp::Matches && regex.matches_empty()? {
            return Err(Error::from_code(
                ErrorCode::FORX0003,
                format!("pattern '{pattern}' matches a zero-length string"),
            ));
        }
        let replacement = match (op, self.literal_string(2)) {
            (RegexOp::Replace, Some(template)) => {
                Some(Replacement::parse(&template, regex.group_count())?)
            }
            _ => None,
        };
        Ok(Some(StaticState::Regex { regex, replacement }))
    }

    fn prepare_translate(&self) -> Option<StaticState> {
        let from = self.literal_string(1)?;
        let to = self.literal_string(2)?;
        Some(StaticState::Translate(functions::strings::translation_map(&from, &to)))
    }

    fn prepare_decimal_format(&self, sc: &StaticContext) -> Result<Option<StaticState>, Error> {
        if !self.is_static_arg(2) {
            return Ok(None);
        }
        let symbols = match self.literal_string(2) {
            Some(name) => functions::numeric::decimal_format(sc, &name)?,
            None => sc.decimal_formats.default_format(),
        };
        let picture = match self.literal_string(1) {
            Some(p) => Some(Arc::new(DecimalPicture::compile(&p, &symbols)?)),
            None => None,
        };
        Ok(Some(StaticState::DecimalFormat { symbols, picture }))
    }

    fn invocation<'a>(&'a self, ctx: &CallCtx<'a, N>) -> Invocation<'a, N> {
        Invocation { ctx: *ctx, call: self }
    }

    fn try_fold(&self, sc: &StaticContext) -> Option<Expr<N>> {
        let dyn_ctx = DynamicContext::<N>::default();
        let ctx = CallCtx::new(&dyn_ctx, sc);
        let folded = self.iterate(&ctx).and_then(|s| s.materialize());
        match folded {
            Ok(items) => {
                debug!(function = %self.signature.name, "constant-folded call");
                Some(Expr::Literal(items))
            }
            Err(e) => {
                debug!(function = %self.signature.name, error = %e, "call not folded");
                None
            }
        }
    }
}

/// Index of the collation argument for collation-sensitive families.
fn collation_arg(family: Family) -> Option<usize> {
    match family {
        Family::StringMatch(_)
        | Family::String(StringOp::Compare)
        | Family::Sequence(SequenceOp::IndexOf) => Some(2),
        Family::Sequence(SequenceOp::DistinctValues)
        | Family::Aggregate(AggregateOp::Min | AggregateOp::Max) => Some(1),
        _ => None,
    }
}

impl<N: XdmNode> FunctionCall<N> for SystemFunctionCall<N> {
    fn name(&self) -> &ExpandedName {
        &self.signature.name
    }

    fn arguments(&self) -> &[Expr<N>] {
        &self.args
    }

    fn signature(&self) -> Option<&'static FunctionSignature> {
        Some(self.signature)
    }

    fn static_type(&self) -> SequenceType {
        self.signature.result
    }

    fn type_check(mut self: Box<Self>, cx: &CheckContext<'_, N>) -> Result<Expr<N>, Error> {
        let sig = self.signature;
        let args = std::mem::take(&mut self.args);
        let mut checked = Vec::with_capacity(args.len());
        for (i, arg) in args.into_iter().enumerate() {
            let arg = arg.type_check(cx)?;
            let role: Arc<str> = Arc::from(format!("argument {} of {}()", i + 1, sig.name));
            let required = sig
                .arg(i)
                .map_or(SequenceType::item(Occurrence::ZeroOrMore), |spec| spec.required);
            checked.push(coerce_argument(arg, required, role)?);
        }
        self.args = checked;

        // literal patterns and pictures must fail at compile time even when
        // another argument short-circuits the call
        self.prepare(cx.static_ctx).map_err(Error::into_static)?;

        for (i, arg) in self.args.iter().enumerate() {
            if arg.is_empty_literal()
                && let Some(if_empty) = sig.arg(i).and_then(|spec| spec.if_empty.as_ref())
            {
                debug!(function = %sig.name, argument = i + 1, "empty argument short-circuits call");
                return Ok(match if_empty {
                    IfEmpty::Value(v) => Expr::literal(v.clone()),
                    IfEmpty::EmptySequence => Expr::empty(),
                });
            }
        }

        if self.family() == Family::Sequence(SequenceOp::Remove)
            && self.args[1].as_atomic_literal() == Some(&XdmAtomicValue::Integer(1))
        {
            debug!("remove($seq, 1) rewritten to tail");
            let mut args = std::mem::take(&mut self.args);
            return Ok(Expr::Tail(Box::new(args.swap_remove(0))));
        }

        if self.family() == Family::Context(ContextOp::FunctionAvailable)
            && self.args.iter().all(Expr::is_literal)
        {
            let name = self.literal_string(0).unwrap_or_default();
            let arity = match self.args.get(1).and_then(Expr::as_atomic_literal) {
                Some(XdmAtomicValue::Integer(n)) => Some(*n),
                _ => None,
            };
            let available =
                functions::context::function_available(&name, arity, cx.static_ctx, cx.libraries)
                    .map_err(Error::into_static)?;
            debug!(function = %name, available, "function-available folded");
            return Ok(Expr::literal(available));
        }

        if sig.can_fold(self.args.len())
            && self.args.iter().all(Expr::is_literal)
            && let Some(literal) = self.try_fold(cx.static_ctx)
        {
            return Ok(literal);
        }
        Ok(Expr::Call(self))
    }

    fn evaluate_item(&self, ctx: &CallCtx<'_, N>) -> Result<Option<XdmItem<N>>, Error> {
        match functions::invoke(self.family(), &self.invocation(ctx))? {
            Outcome::One(v) => Ok(v.map(XdmItem::Atomic)),
            Outcome::Many(stream) => {
                let mut cursor = stream.into_cursor();
                crate::engine::expr::first_of_at_most_one(cursor.as_mut())
            }
        }
    }

    fn iterate(&self, ctx: &CallCtx<'_, N>) -> Result<XdmSequenceStream<N>, Error> {
        Ok(match functions::invoke(self.family(), &self.invocation(ctx))? {
            Outcome::One(Some(v)) => XdmSequenceStream::single(XdmItem::Atomic(v)),
            Outcome::One(None) => XdmSequenceStream::empty(),
            Outcome::Many(stream) => stream,
        })
    }

    fn effective_boolean_value(&self, ctx: &CallCtx<'_, N>) -> Result<bool, Error> {
        let inv = self.invocation(ctx);
        match self.family() {
            Family::Existence(op) => functions::sequences::exists(op, &inv),
            Family::Boolean(op @ (BooleanOp::Not | BooleanOp::Boolean)) => {
                functions::boolean::evaluate(op, &inv)
            }
            _ => match functions::invoke(self.family(), &inv)? {
                Outcome::One(None) => Ok(false),
                Outcome::One(Some(XdmAtomicValue::Boolean(b))) => Ok(b),
                Outcome::One(Some(v)) => crate::engine::expr::atomic_ebv(&v),
                Outcome::Many(stream) => ebv(stream.into_cursor().as_mut()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::library::FunctionLibraryList;
    use crate::engine::signatures::lookup;
    use crate::model::simple::SimpleNode;

    fn check(local: &str, args: Vec<Expr<SimpleNode>>) -> Result<Expr<SimpleNode>, Error> {
        let sc = StaticContext::default();
        let libs = FunctionLibraryList::<SimpleNode>::standard();
        let cx = CheckContext {
            static_ctx: &sc,
            libraries: &libs,
        };
        let call = SystemFunctionCall::new(lookup(local).unwrap(), args);
        Box::new(call).type_check(&cx)
    }

    fn var(local: &str) -> Expr<SimpleNode> {
        Expr::Variable(ExpandedName::new(None, local))
    }

    #[test]
    fn empty_argument_folds_to_declared_result() {
        let e = check("string-length", vec![Expr::empty()]).unwrap();
        assert_eq!(e.as_atomic_literal(), Some(&XdmAtomicValue::Integer(0)));
        let e = check("avg", vec![Expr::empty()]).unwrap();
        assert!(e.is_empty_literal());
    }

    #[test]
    fn remove_first_becomes_tail() {
        let e = check("remove", vec![var("s"), Expr::literal(1_i64)]).unwrap();
        assert!(matches!(e, Expr::Tail(_)));
        let e = check("remove", vec![var("s"), Expr::literal(2_i64)]).unwrap();
        assert!(matches!(e, Expr::Call(_)));
    }

    #[test]
    fn literal_calls_fold() {
        let e = check("upper-case", vec![Expr::literal("abc")]).unwrap();
        assert_eq!(e.as_atomic_literal(), Some(&XdmAtomicValue::from("ABC")));
    }

    #[test]
    fn failing_fold_keeps_the_call() {
        let e = check("exactly-one", vec![Expr::empty()]).unwrap();
        assert!(matches!(e, Expr::Call(_)));
    }

    #[test]
    fn literal_regex_is_checked_statically() {
        let err = check(
            "matches",
            vec![var("s"), Expr::literal("(a"), Expr::literal("")],
        )
        .unwrap_err();
        assert!(err.is_static());
        let err = check("tokenize", vec![var("s"), Expr::literal("a*")]).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::FORX0003);
    }

    #[test]
    fn context_functions_never_fold() {
        let e = check("position", vec![]).unwrap();
        assert!(matches!(e, Expr::Call(_)));
        let e = check("string", vec![]).unwrap();
        assert!(matches!(e, Expr::Call(_)));
    }
}
