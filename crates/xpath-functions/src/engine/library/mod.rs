//! Compile-time function resolution.
//!
//! A call `name#arity` is offered to each [`FunctionLibrary`] of a
//! [`FunctionLibraryList`] in order. A library either binds it, hands the
//! arguments back untouched (the name is outside its namespace) or fails
//! with a [`ResolveError`] when it owns the namespace but has no matching
//! function.
use crate::consts::FNS;
use crate::engine::expr::Expr;
use crate::engine::runtime::{Error, ErrorCode};
use crate::xdm::ExpandedName;
use core::fmt;

mod constructor;
mod executable;
mod list;
mod system;
mod vendor;

pub use constructor::ConstructorFunctionLibrary;
pub use executable::{ExecutableFunctionLibrary, UserFunction, UserFunctionCall};
pub use list::FunctionLibraryList;
pub use system::SystemFunctionLibrary;
pub use vendor::{FunctionImpl, VendorFunctionCall, VendorFunctionLibrary};

pub type Arity = usize;

/// Outcome of offering a call to one library.
pub enum Binding<N> {
    Bound(Expr<N>),
    /// Not this library's namespace; the arguments are returned for the next one.
    NotMine(Vec<Expr<N>>),
}

/// Error type returned by function resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No function with this name exists in a namespace the library owns.
    Unknown(ExpandedName),
    /// Function exists, but not for the requested arity. Provides known arities.
    WrongArity {
        name: ExpandedName,
        arity: Arity,
        available: Vec<Arity>,
    },
}

pub trait FunctionLibrary<N>: Send + Sync {
    /// Whether a function with this name exists; `None` accepts any arity.
    /// Never binds anything.
    fn is_available(&self, name: &ExpandedName, arity: Option<Arity>) -> bool;

    fn bind(&self, name: &ExpandedName, args: Vec<Expr<N>>) -> Result<Binding<N>, ResolveError>;
}

fn display_name(name: &ExpandedName) -> String {
    if name.is_in(FNS) {
        name.local.clone()
    } else {
        name.to_string()
    }
}

fn arity_words(n: Arity) -> String {
    match n {
        0 => "no arguments".to_string(),
        1 => "one argument".to_string(),
        2 => "two arguments".to_string(),
        3 => "three arguments".to_string(),
        n => format!("{n} arguments"),
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Unknown(name) => write!(f, "unknown function {name}()"),
            ResolveError::WrongArity {
                name,
                arity,
                available,
            } => {
                write!(
                    f,
                    "function {}() cannot be called with {}",
                    display_name(name),
                    arity_words(*arity)
                )?;
                if !available.is_empty() {
                    let list: Vec<String> = available.iter().map(ToString::to_string).collect();
                    write!(f, " (expected {})", list.join(" or "))?;
                }
                Ok(())
            }
        }
    }
}

impl From<ResolveError> for Error {
    fn from(e: ResolveError) -> Self {
        Error::static_err(ErrorCode::XPST0017, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_errors_share_a_code_but_not_a_message() {
        let unknown: Error = ResolveError::Unknown(ExpandedName::ns(FNS, "cont")).into();
        assert_eq!(unknown.code_enum(), ErrorCode::XPST0017);
        assert_eq!(unknown.message, "unknown function fn:cont()");
        assert!(unknown.is_static());

        let arity: Error = ResolveError::WrongArity {
            name: ExpandedName::ns(FNS, "contains"),
            arity: 1,
            available: vec![2, 3],
        }
        .into();
        assert_eq!(arity.code_enum(), ErrorCode::XPST0017);
        assert!(arity
            .message
            .starts_with("function contains() cannot be called with one argument"));
    }
}
