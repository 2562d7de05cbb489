//! Lowering of the parsed AST: names are expanded, calls are bound through
//! the library chain and the whole tree is statically checked.
use crate::engine::expr::{CheckContext, Expr};
use crate::engine::library::FunctionLibraryList;
use crate::engine::runtime::{CallCtx, DynamicContext, Error, ErrorCode, StaticContext};
use crate::model::XdmNode;
use crate::parser::{XPathParser, ast};
use crate::xdm::{ExpandedName, XdmAtomicValue, XdmItem, XdmSequence, XdmSequenceStream};
use core::fmt;
use std::sync::Arc;
use tracing::trace;

/// A compiled, statically checked expression. Holds the static context it
/// was compiled against; may be evaluated any number of times and from
/// several threads.
pub struct XPathExpression<N> {
    expr: Expr<N>,
    static_ctx: Arc<StaticContext>,
}

impl<N> fmt::Debug for XPathExpression<N>
where
    Expr<N>: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XPathExpression")
            .field("expr", &self.expr)
            .finish_non_exhaustive()
    }
}

impl<N: XdmNode> XPathExpression<N> {
    pub fn expr(&self) -> &Expr<N> {
        &self.expr
    }

    pub fn static_context(&self) -> &StaticContext {
        &self.static_ctx
    }

    pub fn evaluate(&self, dyn_ctx: &DynamicContext<N>) -> Result<XdmSequence<N>, Error> {
        self.evaluate_stream(dyn_ctx)?.materialize()
    }

    pub fn evaluate_stream(&self, dyn_ctx: &DynamicContext<N>) -> Result<XdmSequenceStream<N>, Error> {
        self.expr.iterate(&CallCtx::new(dyn_ctx, &self.static_ctx))
    }

    /// The first item only; later items are never computed.
    pub fn evaluate_first(&self, dyn_ctx: &DynamicContext<N>) -> Result<Option<XdmItem<N>>, Error> {
        self.evaluate_stream(dyn_ctx)?
            .into_cursor()
            .next_item()
            .transpose()
    }

    pub fn effective_boolean_value(&self, dyn_ctx: &DynamicContext<N>) -> Result<bool, Error> {
        self.expr
            .effective_boolean_value(&CallCtx::new(dyn_ctx, &self.static_ctx))
    }
}

/// Compile `src` against a static context and a library chain.
pub fn compile_xpath<N: XdmNode>(
    src: &str,
    static_ctx: &StaticContext,
    libraries: &FunctionLibraryList<N>,
) -> Result<XPathExpression<N>, Error> {
    let ast = XPathParser::parse_to_ast(src)?;
    let lowering = Lowering {
        static_ctx,
        libraries,
    };
    let expr = lowering.lower(ast)?;
    let cx = CheckContext {
        static_ctx,
        libraries,
    };
    let expr = expr.type_check(&cx)?;
    trace!(expression = src, folded = expr.is_literal(), "compiled expression");
    Ok(XPathExpression {
        expr,
        static_ctx: Arc::new(static_ctx.clone()),
    })
}

struct Lowering<'a, N> {
    static_ctx: &'a StaticContext,
    libraries: &'a FunctionLibraryList<N>,
}

impl<N: XdmNode> Lowering<'_, N> {
    fn lower(&self, e: ast::Expr) -> Result<Expr<N>, Error> {
        Ok(match e {
            ast::Expr::Literal(lit) => Expr::literal(match lit {
                ast::Literal::Integer(i) => XdmAtomicValue::Integer(i),
                ast::Literal::Decimal(d) => XdmAtomicValue::Decimal(d),
                ast::Literal::Double(d) => XdmAtomicValue::Double(d),
                ast::Literal::String(s) => XdmAtomicValue::String(s),
            }),
            ast::Expr::Sequence(parts) if parts.is_empty() => Expr::empty(),
            ast::Expr::Sequence(parts) => Expr::Sequence(
                parts
                    .into_iter()
                    .map(|p| self.lower(p))
                    .collect::<Result<_, _>>()?,
            ),
            ast::Expr::ContextItem => Expr::ContextItem,
            ast::Expr::Negate(operand) => Expr::Negate(Box::new(self.lower(*operand)?)),
            ast::Expr::VarRef(q) => {
                let name = self.expand(&q, None)?;
                if !self.static_ctx.in_scope_variables.contains(&name) {
                    return Err(Error::static_err(
                        ErrorCode::XPST0008,
                        format!("variable ${name} is not declared"),
                    ));
                }
                Expr::Variable(name)
            }
            ast::Expr::FunctionCall { name, args } => {
                let default_ns = self.static_ctx.default_function_namespace.as_deref();
                let name = self.expand(&name, default_ns)?;
                let args = args
                    .into_iter()
                    .map(|a| self.lower(a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.libraries.bind(&name, args)?
            }
        })
    }

    /// Expand a lexical QName; unprefixed names go into `default_ns`.
    fn expand(&self, q: &ast::QName, default_ns: Option<&str>) -> Result<ExpandedName, Error> {
        let ns = match &q.prefix {
            Some(prefix) => Some(self.static_ctx.namespaces.resolve(prefix).ok_or_else(|| {
                Error::static_err(
                    ErrorCode::XPST0081,
                    format!("namespace prefix '{prefix}' is not declared"),
                )
            })?),
            None => default_ns,
        };
        Ok(ExpandedName::new(ns.map(str::to_string), q.local.clone()))
    }
}
