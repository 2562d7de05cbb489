use super::{Arity, Binding, FunctionLibrary, ResolveError};
use crate::consts::FNS;
use crate::engine::call::SystemFunctionCall;
use crate::engine::expr::Expr;
use crate::engine::signatures::lookup;
use crate::model::XdmNode;
use crate::xdm::ExpandedName;
use tracing::trace;

/// The built-in functions of the `fn:` namespace. Owns that namespace: an
/// unknown local name there is an error, not a fall-through.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFunctionLibrary;

impl<N: XdmNode> FunctionLibrary<N> for SystemFunctionLibrary {
    fn is_available(&self, name: &ExpandedName, arity: Option<Arity>) -> bool {
        name.is_in(FNS)
            && lookup(&name.local).is_some_and(|sig| arity.is_none_or(|a| sig.accepts(a)))
    }

    fn bind(&self, name: &ExpandedName, args: Vec<Expr<N>>) -> Result<Binding<N>, ResolveError> {
        if !name.is_in(FNS) {
            return Ok(Binding::NotMine(args));
        }
        let sig = lookup(&name.local).ok_or_else(|| ResolveError::Unknown(name.clone()))?;
        if !sig.accepts(args.len()) {
            return Err(ResolveError::WrongArity {
                name: name.clone(),
                arity: args.len(),
                available: sig.arities(),
            });
        }
        trace!(function = %name, arity = args.len(), family = ?sig.family, "bound system function");
        Ok(Binding::Bound(Expr::Call(Box::new(SystemFunctionCall::new(sig, args)))))
    }
}
