//! Convenience entry points: compile against the default static context
//! (plus the variables bound in the dynamic context) and evaluate.
use crate::compiler::{XPathExpression, compile_xpath};
use crate::engine::library::FunctionLibraryList;
use crate::engine::runtime::{DynamicContext, Error, StaticContext};
use crate::model::XdmNode;
use crate::xdm::{XdmItem, XdmSequence, XdmSequenceStream};

fn compile_for<N: XdmNode>(expr: &str, dyn_ctx: &DynamicContext<N>) -> Result<XPathExpression<N>, Error> {
    let mut sc = StaticContext::default();
    sc.in_scope_variables
        .extend(dyn_ctx.variables.keys().cloned());
    match &dyn_ctx.functions {
        Some(libs) => compile_xpath(expr, &sc, libs),
        None => compile_xpath(expr, &sc, &FunctionLibraryList::standard()),
    }
}

/// Convenience: compile+evaluate a string using default static context.
pub fn evaluate_expr<N: XdmNode>(expr: &str, dyn_ctx: &DynamicContext<N>) -> Result<XdmSequence<N>, Error> {
    compile_for(expr, dyn_ctx)?.evaluate(dyn_ctx)
}

pub fn evaluate_stream_expr<N: XdmNode>(
    expr: &str,
    dyn_ctx: &DynamicContext<N>,
) -> Result<XdmSequenceStream<N>, Error> {
    compile_for(expr, dyn_ctx)?.evaluate_stream(dyn_ctx)
}

pub fn evaluate_first_expr<N: XdmNode>(
    expr: &str,
    dyn_ctx: &DynamicContext<N>,
) -> Result<Option<XdmItem<N>>, Error> {
    compile_for(expr, dyn_ctx)?.evaluate_first(dyn_ctx)
}
