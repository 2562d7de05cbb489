use super::{Arity, Binding, FunctionLibrary, ResolveError};
use crate::compiler::{XPathExpression, compile_xpath};
use crate::consts::{FNS, XS};
use crate::engine::expr::{
    CheckContext, CoerceCursor, Expr, FunctionCall, coerce_argument, ebv, first_of_at_most_one,
};
use crate::engine::library::FunctionLibraryList;
use crate::engine::runtime::{CallCtx, DynamicContext, Error, ErrorCode, StaticContext};
use crate::model::XdmNode;
use crate::xdm::{ExpandedName, SequenceType, XdmItem, XdmSequenceStream};
use core::fmt;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};

/// A compiled user-defined function.
pub struct UserFunction<N> {
    name: ExpandedName,
    params: Vec<(ExpandedName, SequenceType)>,
    result: SequenceType,
    body: XPathExpression<N>,
}

impl<N: XdmNode> UserFunction<N> {
    /// `body` must have been compiled with every parameter in scope.
    pub fn new(
        name: ExpandedName,
        params: Vec<(ExpandedName, SequenceType)>,
        result: SequenceType,
        body: XPathExpression<N>,
    ) -> Self {
        Self {
            name,
            params,
            result,
            body,
        }
    }

    /// Compile `body` against `sc` extended with the parameters.
    pub fn compile(
        name: ExpandedName,
        params: Vec<(ExpandedName, SequenceType)>,
        result: SequenceType,
        body: &str,
        sc: &StaticContext,
        libs: &FunctionLibraryList<N>,
    ) -> Result<Self, Error> {
        let mut sc = sc.clone();
        sc.in_scope_variables
            .extend(params.iter().map(|(p, _)| p.clone()));
        let body = compile_xpath(body, &sc, libs)?;
        Ok(Self::new(name, params, result, body))
    }

    pub fn name(&self) -> &ExpandedName {
        &self.name
    }

    pub fn arity(&self) -> Arity {
        self.params.len()
    }
}

/// User functions keyed by name and arity. Registration may happen while
/// other expressions are being compiled against the same library.
pub struct ExecutableFunctionLibrary<N> {
    functions: RwLock<HashMap<(ExpandedName, Arity), Arc<UserFunction<N>>>>,
}

impl<N> Default for ExecutableFunctionLibrary<N> {
    fn default() -> Self {
        Self {
            functions: RwLock::new(HashMap::new()),
        }
    }
}

impl<N: XdmNode> ExecutableFunctionLibrary<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f`, replacing any function with the same name and arity.
    /// Calls bound earlier keep the definition they were bound to.
    pub fn add_function(&self, f: UserFunction<N>) -> Result<(), Error> {
        if f.name.is_in(FNS) || f.name.is_in(XS) {
            return Err(Error::static_err(
                ErrorCode::XPST0017,
                format!("cannot define {}(): namespace is reserved", f.name),
            ));
        }
        let key = (f.name.clone(), f.arity());
        let mut functions = self.functions.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = functions.insert(key, Arc::new(f)) {
            debug!(function = %old.name, arity = old.arity(), "user function redefined");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<N: XdmNode> FunctionLibrary<N> for ExecutableFunctionLibrary<N> {
    fn is_available(&self, name: &ExpandedName, arity: Option<Arity>) -> bool {
        let functions = self.functions.read().unwrap_or_else(PoisonError::into_inner);
        match arity {
            Some(a) => functions.contains_key(&(name.clone(), a)),
            None => functions.keys().any(|(n, _)| n == name),
        }
    }

    fn bind(&self, name: &ExpandedName, args: Vec<Expr<N>>) -> Result<Binding<N>, ResolveError> {
        let functions = self.functions.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(f) = functions.get(&(name.clone(), args.len())) {
            trace!(function = %name, arity = args.len(), "bound user function");
            return Ok(Binding::Bound(Expr::Call(Box::new(UserFunctionCall {
                function: f.clone(),
                args,
            }))));
        }
        let mut available: Vec<Arity> = functions
            .keys()
            .filter(|(n, _)| n == name)
            .map(|(_, a)| *a)
            .collect();
        if available.is_empty() {
            return Ok(Binding::NotMine(args));
        }
        available.sort_unstable();
        Err(ResolveError::WrongArity {
            name: name.clone(),
            arity: args.len(),
            available,
        })
    }
}

/// A call bound to one definition of a user function.
pub struct UserFunctionCall<N> {
    function: Arc<UserFunction<N>>,
    args: Vec<Expr<N>>,
}

impl<N> fmt::Debug for UserFunctionCall<N>
where
    Expr<N>: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserFunctionCall")
            .field("name", &self.function.name)
            .field("args", &self.args)
            .finish()
    }
}

impl<N: XdmNode> FunctionCall<N> for UserFunctionCall<N> {
    fn name(&self) -> &ExpandedName {
        &self.function.name
    }

    fn arguments(&self) -> &[Expr<N>] {
        &self.args
    }

    fn static_type(&self) -> SequenceType {
        self.function.result
    }

    fn type_check(mut self: Box<Self>, cx: &CheckContext<'_, N>) -> Result<Expr<N>, Error> {
        let args = std::mem::take(&mut self.args);
        let mut checked = Vec::with_capacity(args.len());
        for (i, (arg, (_, required))) in args.into_iter().zip(&self.function.params).enumerate() {
            let role: Arc<str> = Arc::from(format!("argument {} of {}()", i + 1, self.function.name));
            checked.push(coerce_argument(arg.type_check(cx)?, *required, role)?);
        }
        self.args = checked;
        Ok(Expr::Call(self))
    }

    fn evaluate_item(&self, ctx: &CallCtx<'_, N>) -> Result<Option<XdmItem<N>>, Error> {
        let mut cursor = self.iterate(ctx)?.into_cursor();
        first_of_at_most_one(cursor.as_mut())
    }

    fn iterate(&self, ctx: &CallCtx<'_, N>) -> Result<XdmSequenceStream<N>, Error> {
        // the body sees its parameters and nothing else of the caller's focus
        let mut inner = DynamicContext::<N> {
            functions: ctx.dyn_ctx.functions.clone(),
            now: ctx.dyn_ctx.now,
            timezone_override: ctx.dyn_ctx.timezone_override,
            ..DynamicContext::default()
        };
        for (arg, (param, _)) in self.args.iter().zip(&self.function.params) {
            inner
                .variables
                .insert(param.clone(), arg.iterate(ctx)?.materialize()?);
        }
        let body = &self.function.body;
        let out = body
            .expr()
            .iterate(&CallCtx::new(&inner, body.static_context()))?;
        let role: Arc<str> = Arc::from(format!("result of {}()", self.function.name));
        Ok(XdmSequenceStream::new(CoerceCursor::new(
            out.into_cursor(),
            self.function.result,
            role,
        )))
    }

    fn effective_boolean_value(&self, ctx: &CallCtx<'_, N>) -> Result<bool, Error> {
        ebv(self.iterate(ctx)?.into_cursor().as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runtime::{DynamicContextBuilder, StaticContextBuilder};
    use crate::model::simple::SimpleNode;
    use crate::xdm::{AtomicType, Occurrence, XdmAtomicValue};

    fn define(
        libs: &FunctionLibraryList<SimpleNode>,
        body: &str,
    ) -> UserFunction<SimpleNode> {
        let sc = StaticContext::default();
        UserFunction::compile(
            ExpandedName::ns("urn:test", "f"),
            vec![(
                ExpandedName::new(None, "x"),
                SequenceType::atomic(AtomicType::String, Occurrence::ExactlyOne),
            )],
            SequenceType::atomic(AtomicType::AnyAtomic, Occurrence::ExactlyOne),
            body,
            &sc,
            libs,
        )
        .unwrap()
    }

    #[test]
    fn redefinition_does_not_affect_bound_calls() {
        let user = Arc::new(ExecutableFunctionLibrary::<SimpleNode>::new());
        let libs = FunctionLibraryList::standard().with_user_functions(user.clone());
        user.add_function(define(&libs, "upper-case($x)")).unwrap();

        let sc = StaticContextBuilder::new().with_namespace("t", "urn:test").build();
        let first = compile_xpath("t:f('ab')", &sc, &libs).unwrap();
        user.add_function(define(&libs, "string-length($x)")).unwrap();
        let second = compile_xpath("t:f('ab')", &sc, &libs).unwrap();
        assert_eq!(user.len(), 1);

        let ctx = DynamicContextBuilder::new().build();
        assert_eq!(
            first.evaluate(&ctx).unwrap(),
            vec![XdmItem::Atomic(XdmAtomicValue::from("AB"))]
        );
        assert_eq!(
            second.evaluate(&ctx).unwrap(),
            vec![XdmItem::Atomic(XdmAtomicValue::Integer(2))]
        );
    }

    #[test]
    fn wrong_arity_and_reserved_namespace() {
        let user = Arc::new(ExecutableFunctionLibrary::<SimpleNode>::new());
        let libs = FunctionLibraryList::standard().with_user_functions(user.clone());
        user.add_function(define(&libs, "$x")).unwrap();
        let sc = StaticContextBuilder::new().with_namespace("t", "urn:test").build();
        let err = compile_xpath("t:f(1, 2)", &sc, &libs).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPST0017);

        let reserved = UserFunction::compile(
            ExpandedName::ns(FNS, "mine"),
            vec![],
            SequenceType::ANY,
            "1",
            &StaticContext::default(),
            &libs,
        )
        .unwrap();
        assert!(user.add_function(reserved).is_err());
    }
}
