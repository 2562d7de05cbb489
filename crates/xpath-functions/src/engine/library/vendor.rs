//! Host-registered extension functions.
//!
//! Extensions are plain closures over fully evaluated argument sequences,
//! registered per name with an arity range. They never fold.
use super::{Arity, Binding, FunctionLibrary, ResolveError};
use crate::consts::{EXT_NS, FNS, XS};
use crate::engine::expr::{CheckContext, Expr, FunctionCall, ebv, first_of_at_most_one};
use crate::engine::regex::{CompiledRegex, RegexRun, analyze_string};
use crate::engine::runtime::{CallCtx, Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{
    ExpandedName, SequenceType, XdmAtomicValue, XdmItem, XdmSequence, XdmSequenceStream,
};
use core::cmp::Ordering;
use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

pub type FunctionImpl<N> =
    Arc<dyn Fn(&CallCtx<N>, &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error> + Send + Sync>;

// (min_arity, max_arity, impl); max None is variadic
type FunctionOverload<N> = (Arity, Option<Arity>, FunctionImpl<N>);

pub struct VendorFunctionLibrary<N> {
    fns: HashMap<ExpandedName, Vec<FunctionOverload<N>>>,
}

impl<N> Default for VendorFunctionLibrary<N> {
    fn default() -> Self {
        Self { fns: HashMap::new() }
    }
}

/// Higher min first; for equal mins the smaller max first, so the most
/// specific overload wins when ranges overlap.
fn by_specificity<N>(a: &FunctionOverload<N>, b: &FunctionOverload<N>) -> Ordering {
    b.0.cmp(&a.0).then_with(|| match (&a.1, &b.1) {
        (Some(amax), Some(bmax)) => amax.cmp(bmax),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    })
}

impl<N: XdmNode> VendorFunctionLibrary<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The extension functions shipped with this crate, in [`EXT_NS`].
    pub fn with_standard_extensions() -> Self {
        let mut lib = Self::new();
        lib.insert(
            ExpandedName::ns(EXT_NS, "analyze-string"),
            2,
            Some(3),
            Arc::new(ext_analyze_string::<N>),
        );
        lib.insert(
            ExpandedName::ns(EXT_NS, "regex-groups"),
            2,
            Some(3),
            Arc::new(ext_regex_groups::<N>),
        );
        lib
    }

    /// Register a function by ExpandedName with an arity range.
    /// If `max_arity` is None, the function is variadic starting at `min_arity`.
    pub fn register_range(
        &mut self,
        name: ExpandedName,
        min_arity: Arity,
        max_arity: Option<Arity>,
        func: FunctionImpl<N>,
    ) -> Result<(), Error> {
        if name.is_in(FNS) || name.is_in(XS) {
            return Err(Error::static_err(
                ErrorCode::XPST0017,
                format!("cannot register {name}(): namespace is reserved"),
            ));
        }
        self.insert(name, min_arity, max_arity, func);
        Ok(())
    }

    fn insert(
        &mut self,
        name: ExpandedName,
        min_arity: Arity,
        max_arity: Option<Arity>,
        func: FunctionImpl<N>,
    ) {
        let overloads = self.fns.entry(name).or_default();
        overloads.push((min_arity, max_arity, func));
        overloads.sort_by(by_specificity);
    }

    /// Convenience: register a function in a namespace with an arity range.
    pub fn register_ns_range<F>(
        &mut self,
        ns_uri: &str,
        local: &str,
        min_arity: Arity,
        max_arity: Option<Arity>,
        f: F,
    ) -> Result<(), Error>
    where
        F: 'static
            + Send
            + Sync
            + Fn(&CallCtx<N>, &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error>,
    {
        self.register_range(ExpandedName::ns(ns_uri, local), min_arity, max_arity, Arc::new(f))
    }

    /// Convenience: register a fixed-arity function in a namespace.
    pub fn register_ns<F>(&mut self, ns_uri: &str, local: &str, arity: Arity, f: F) -> Result<(), Error>
    where
        F: 'static
            + Send
            + Sync
            + Fn(&CallCtx<N>, &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error>,
    {
        self.register_ns_range(ns_uri, local, arity, Some(arity), f)
    }

    fn resolve(&self, name: &ExpandedName, arity: Arity) -> Option<Result<&FunctionImpl<N>, ResolveError>> {
        let cands = self.fns.get(name)?;
        if let Some((_, _, f)) = cands
            .iter()
            .find(|(min, max, _)| arity >= *min && max.is_none_or(|m| arity <= m))
        {
            return Some(Ok(f));
        }
        let mut available: Vec<Arity> = cands
            .iter()
            .flat_map(|(min, max, _)| *min..=max.unwrap_or(*min))
            .collect();
        available.sort_unstable();
        available.dedup();
        Some(Err(ResolveError::WrongArity {
            name: name.clone(),
            arity,
            available,
        }))
    }
}

impl<N: XdmNode> FunctionLibrary<N> for VendorFunctionLibrary<N> {
    fn is_available(&self, name: &ExpandedName, arity: Option<Arity>) -> bool {
        match arity {
            Some(a) => matches!(self.resolve(name, a), Some(Ok(_))),
            None => self.fns.contains_key(name),
        }
    }

    fn bind(&self, name: &ExpandedName, args: Vec<Expr<N>>) -> Result<Binding<N>, ResolveError> {
        match self.resolve(name, args.len()) {
            None => Ok(Binding::NotMine(args)),
            Some(Err(e)) => Err(e),
            Some(Ok(f)) => {
                trace!(function = %name, arity = args.len(), "bound extension function");
                Ok(Binding::Bound(Expr::Call(Box::new(VendorFunctionCall {
                    name: name.clone(),
                    func: f.clone(),
                    args,
                }))))
            }
        }
    }
}

pub struct VendorFunctionCall<N> {
    name: ExpandedName,
    func: FunctionImpl<N>,
    args: Vec<Expr<N>>,
}

impl<N> fmt::Debug for VendorFunctionCall<N>
where
    Expr<N>: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorFunctionCall")
            .field("name", &self.name)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl<N: XdmNode> FunctionCall<N> for VendorFunctionCall<N> {
    fn name(&self) -> &ExpandedName {
        &self.name
    }

    fn arguments(&self) -> &[Expr<N>] {
        &self.args
    }

    fn static_type(&self) -> SequenceType {
        SequenceType::ANY
    }

    fn type_check(mut self: Box<Self>, cx: &CheckContext<'_, N>) -> Result<Expr<N>, Error> {
        self.args = std::mem::take(&mut self.args)
            .into_iter()
            .map(|a| a.type_check(cx))
            .collect::<Result<_, _>>()?;
        Ok(Expr::Call(self))
    }

    fn evaluate_item(&self, ctx: &CallCtx<'_, N>) -> Result<Option<XdmItem<N>>, Error> {
        let mut cursor = self.iterate(ctx)?.into_cursor();
        first_of_at_most_one(cursor.as_mut())
    }

    fn iterate(&self, ctx: &CallCtx<'_, N>) -> Result<XdmSequenceStream<N>, Error> {
        let args = self
            .args
            .iter()
            .map(|a| a.iterate(ctx)?.materialize())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(XdmSequenceStream::from_vec((self.func)(ctx, &args)?))
    }

    fn effective_boolean_value(&self, ctx: &CallCtx<'_, N>) -> Result<bool, Error> {
        ebv(self.iterate(ctx)?.into_cursor().as_mut())
    }
}

fn string_arg<N: XdmNode>(args: &[XdmSequence<N>], i: usize) -> Result<String, Error> {
    match args.get(i).map(Vec::as_slice) {
        None | Some([]) => Ok(String::new()),
        Some([XdmItem::Atomic(a)]) => Ok(a.string_value()),
        Some([XdmItem::Node(n)]) => Ok(n.string_value()),
        Some(_) => Err(Error::from_code(
            ErrorCode::XPTY0004,
            format!(
                "argument {} must be a single string, not a sequence",
                i + 1
            ),
        )),
    }
}

fn regex_args<N: XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<(String, Arc<dyn CompiledRegex>), Error> {
    let text = string_arg(args, 0)?;
    let regex = ctx
        .static_ctx
        .regex
        .compile(&string_arg(args, 1)?, &string_arg(args, 2)?)?;
    Ok((text, regex))
}

fn string_item<N>(s: String) -> XdmItem<N> {
    XdmItem::Atomic(XdmAtomicValue::String(s))
}

/// `ext:analyze-string($input, $pattern[, $flags])`: the matching and
/// non-matching runs of `$input`, in order.
fn ext_analyze_string<N: XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let (text, regex) = regex_args(ctx, args)?;
    analyze_string(regex, &text)?
        .map(|run| {
            run.map(|r| match r {
                RegexRun::Match { text, .. } | RegexRun::NonMatch(text) => string_item(text),
            })
        })
        .collect()
}

/// `ext:regex-groups($input, $pattern[, $flags])`: the whole first match
/// followed by its captured groups; a group that did not participate is
/// the empty string. Empty when nothing matches.
fn ext_regex_groups<N: XdmNode>(
    ctx: &CallCtx<N>,
    args: &[XdmSequence<N>],
) -> Result<XdmSequence<N>, Error> {
    let (text, regex) = regex_args(ctx, args)?;
    for run in analyze_string(regex, &text)? {
        if let RegexRun::Match { text, groups } = run? {
            let mut out = vec![string_item(text)];
            out.extend(groups.into_iter().map(|g| string_item(g.unwrap_or_default())));
            return Ok(out);
        }
    }
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_xpath;
    use crate::engine::library::FunctionLibraryList;
    use crate::engine::runtime::{DynamicContextBuilder, StaticContextBuilder};
    use crate::model::simple::SimpleNode;
    use rstest::rstest;

    fn libs() -> FunctionLibraryList<SimpleNode> {
        FunctionLibraryList::standard()
            .with_vendor_functions(Arc::new(VendorFunctionLibrary::with_standard_extensions()))
    }

    fn strings(expr: &str) -> Vec<String> {
        let sc = StaticContextBuilder::new().with_namespace("ext", EXT_NS).build();
        let compiled = compile_xpath(expr, &sc, &libs()).unwrap();
        compiled
            .evaluate(&DynamicContextBuilder::new().build())
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[rstest]
    #[case("ext:analyze-string('a1b22c', '[0-9]+')", &["a", "1", "b", "22", "c"])]
    #[case("ext:analyze-string('', 'x')", &[])]
    #[case("ext:regex-groups('key=value', '(\\w+)=(\\w+)')", &["key=value", "key", "value"])]
    #[case("ext:regex-groups('ab', '(x)?b')", &["b", ""])]
    #[case("ext:regex-groups('ab', 'z')", &[])]
    fn shipped_extensions(#[case] expr: &str, #[case] expected: &[&str]) {
        assert_eq!(strings(expr), expected);
    }

    #[rstest]
    #[case("analyze-string", 1, false)]
    #[case("analyze-string", 2, true)]
    #[case("analyze-string", 3, true)]
    #[case("regex-groups", 2, true)]
    #[case("regex-groups", 3, true)]
    #[case("regex-groups", 4, false)]
    fn standard_extensions_are_registered(#[case] local: &str, #[case] arity: Arity, #[case] available: bool) {
        let lib = VendorFunctionLibrary::<SimpleNode>::with_standard_extensions();
        assert_eq!(lib.is_available(&ExpandedName::ns(EXT_NS, local), Some(arity)), available);
        assert!(lib.is_available(&ExpandedName::ns(EXT_NS, local), None));
    }

    #[test]
    fn most_specific_overload_wins() {
        let mut lib = VendorFunctionLibrary::<SimpleNode>::new();
        lib.register_ns_range("urn:v", "f", 0, None, |_, _| {
            Ok(vec![string_item("variadic".to_string())])
        })
        .unwrap();
        lib.register_ns("urn:v", "f", 1, |_, _| Ok(vec![string_item("one".to_string())]))
            .unwrap();
        assert!(lib.register_ns(crate::consts::FNS, "count", 1, |_, _| Ok(vec![])).is_err());

        let libs = FunctionLibraryList::standard().with_vendor_functions(Arc::new(lib));
        let sc = StaticContextBuilder::new().with_namespace("v", "urn:v").build();
        let ctx = DynamicContextBuilder::new().build();
        let run = |src: &str| {
            compile_xpath(src, &sc, &libs)
                .unwrap()
                .evaluate(&ctx)
                .unwrap()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        };
        assert_eq!(run("v:f(1)"), ["one"]);
        assert_eq!(run("v:f(1, 2, 3)"), ["variadic"]);
    }
}
