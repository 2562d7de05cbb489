use super::{
    Arity, Binding, ConstructorFunctionLibrary, ExecutableFunctionLibrary, FunctionLibrary,
    ResolveError, SystemFunctionLibrary, VendorFunctionLibrary,
};
use crate::engine::expr::Expr;
use crate::model::XdmNode;
use crate::xdm::ExpandedName;
use std::sync::Arc;
use tracing::trace;

/// Ordered chain of libraries. The first library that binds a call wins.
///
/// [`standard`](Self::standard) holds the `fn:` functions followed by the
/// `xs:` constructors; user and vendor libraries are appended after them,
/// conventionally in that order.
pub struct FunctionLibraryList<N> {
    libraries: Vec<Arc<dyn FunctionLibrary<N>>>,
}

impl<N> Clone for FunctionLibraryList<N> {
    fn clone(&self) -> Self {
        Self {
            libraries: self.libraries.clone(),
        }
    }
}

impl<N> Default for FunctionLibraryList<N> {
    fn default() -> Self {
        Self {
            libraries: Vec::new(),
        }
    }
}

impl<N: XdmNode> FunctionLibraryList<N> {
    /// An empty chain; every call fails to bind.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        Self::new()
            .with_library(Arc::new(SystemFunctionLibrary))
            .with_library(Arc::new(ConstructorFunctionLibrary))
    }

    pub fn with_library(mut self, library: Arc<dyn FunctionLibrary<N>>) -> Self {
        self.libraries.push(library);
        self
    }

    pub fn with_user_functions(self, library: Arc<ExecutableFunctionLibrary<N>>) -> Self {
        self.with_library(library)
    }

    pub fn with_vendor_functions(self, library: Arc<VendorFunctionLibrary<N>>) -> Self {
        self.with_library(library)
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// True if any library in the chain has `name` with this arity (`None`
    /// for any arity). Answered without binding.
    pub fn is_available(&self, name: &ExpandedName, arity: Option<Arity>) -> bool {
        self.libraries
            .iter()
            .any(|lib| lib.is_available(name, arity))
    }

    pub fn bind(&self, name: &ExpandedName, mut args: Vec<Expr<N>>) -> Result<Expr<N>, ResolveError> {
        for (i, lib) in self.libraries.iter().enumerate() {
            match lib.bind(name, args)? {
                Binding::Bound(expr) => return Ok(expr),
                Binding::NotMine(returned) => args = returned,
            }
            trace!(function = %name, library = i, "not claimed, trying next library");
        }
        Err(ResolveError::Unknown(name.clone()))
    }
}
