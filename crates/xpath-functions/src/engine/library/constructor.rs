use super::{Arity, Binding, FunctionLibrary, ResolveError};
use crate::consts::XS;
use crate::engine::expr::Expr;
use crate::model::XdmNode;
use crate::xdm::{AtomicType, ExpandedName};
use tracing::trace;

/// Constructor functions `xs:T($arg)`: sugar for `$arg cast as xs:T?`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstructorFunctionLibrary;

impl<N: XdmNode> FunctionLibrary<N> for ConstructorFunctionLibrary {
    fn is_available(&self, name: &ExpandedName, arity: Option<Arity>) -> bool {
        name.is_in(XS)
            && AtomicType::from_local(&name.local).is_some()
            && arity.is_none_or(|a| a == 1)
    }

    fn bind(&self, name: &ExpandedName, mut args: Vec<Expr<N>>) -> Result<Binding<N>, ResolveError> {
        if !name.is_in(XS) {
            return Ok(Binding::NotMine(args));
        }
        let target =
            AtomicType::from_local(&name.local).ok_or_else(|| ResolveError::Unknown(name.clone()))?;
        if args.len() != 1 {
            return Err(ResolveError::WrongArity {
                name: name.clone(),
                arity: args.len(),
                available: vec![1],
            });
        }
        trace!(function = %name, "bound constructor function");
        let operand = Box::new(args.remove(0));
        Ok(Binding::Bound(Expr::Cast { operand, target }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::simple::SimpleNode;

    #[test]
    fn constructor_binds_to_cast() {
        let lib = ConstructorFunctionLibrary;
        let name = ExpandedName::ns(XS, "double");
        let bound = FunctionLibrary::<SimpleNode>::bind(&lib, &name, vec![Expr::literal("1")]);
        assert!(matches!(
            bound,
            Ok(Binding::Bound(Expr::Cast {
                target: AtomicType::Double,
                ..
            }))
        ));
        let err = FunctionLibrary::<SimpleNode>::bind(&lib, &ExpandedName::ns(XS, "nope"), vec![])
            .err();
        assert_eq!(err, Some(ResolveError::Unknown(ExpandedName::ns(XS, "nope"))));
        assert!(!FunctionLibrary::<SimpleNode>::is_available(&lib, &name, Some(2)));
    }
}
